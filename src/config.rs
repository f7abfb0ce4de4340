//! Obfuscator and scheduler configuration
//!
//! Configuration can be set programmatically or loaded from environment
//! variables; command-line flags override both.
//!
//! # Environment Variables
//!
//! All environment variables use the `TASKFOG_` prefix:
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `TASKFOG_WORKERS` | Number of worker threads | 2 |
//! | `TASKFOG_GLOBAL_LOCK` | Globals lock strategy (`shared`/`per_worker`) | shared |
//! | `TASKFOG_INLINE_DEPTH` | Max nested inline task executions while waiting | 32 |
//! | `TASKFOG_SEED` | Load balancer RNG seed | random |
//! | `TASKFOG_ENTRY` | Entry point function | main |
//! | `TASKFOG_CALL_STYLE` | Call site rewrite (`inline`/`hoisted`) | inline |
//! | `TASKFOG_LOCK_SCOPE` | Globals lock span (`statement`/`line`) | statement |
//! | `TASKFOG_NAMING` | Overload symbol naming (`signature`/`first-letter`) | signature |
//! | `TASKFOG_WEIGHT` | Task weight metric (`lines`/`statements`) | lines |
//!
//! # Example
//!
//! ```rust
//! use taskfog::config::{CallStyle, ObfuscatorConfig, SchedulerConfig};
//!
//! let config = ObfuscatorConfig::builder()
//!     .entry_point("run")
//!     .call_style(CallStyle::Hoisted)
//!     .build();
//! assert_eq!(config.entry_point, "run");
//!
//! let scheduler = SchedulerConfig::builder().num_workers(4).seed(7).build();
//! assert_eq!(scheduler.num_workers, 4);
//! ```

use std::env;
use thiserror::Error;

/// Default worker count baked into generated programs.
pub const DEFAULT_WORKERS: usize = 2;

/// Default bound on nested inline task execution inside one wait.
pub const DEFAULT_MAX_INLINE_DEPTH: usize = 32;

macro_rules! config_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => [$($text:literal),+]),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Parse from a configuration string (case-insensitive).
            pub fn parse(s: &str) -> Option<Self> {
                let s = s.trim().to_ascii_lowercase();
                $(if [$($text),+].contains(&s.as_str()) {
                    return Some($name::$variant);
                })+
                None
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => [$($text),+][0]),+
                }
            }
        }
    };
}

config_enum! {
    /// How a call to a registered function is rewritten.
    CallStyle {
        /// One expression at the call site: enqueue, wait, read, release.
        #[default]
        Inline => ["inline"],
        /// Enqueue before the enclosing statement; release in the epilogue.
        Hoisted => ["hoisted", "legacy"],
    }
}

config_enum! {
    /// Extent of the critical section around a global variable access.
    LockScope {
        /// The enclosing statement or controlling expression.
        #[default]
        Statement => ["statement", "stmt"],
        /// The whole physical source line, once per line.
        Line => ["line"],
    }
}

config_enum! {
    /// How generated symbols of overloaded functions are named.
    Naming {
        /// `add__int_int`, from the resolved parameter types.
        #[default]
        Signature => ["signature"],
        /// `add_ii`, name plus the first letter of each parameter type.
        FirstLetter => ["first-letter", "first_letter", "legacy"],
    }
}

config_enum! {
    /// Static cost proxy added to a worker's load counter per task.
    WeightMetric {
        /// Source lines of the function definition.
        #[default]
        Lines => ["lines"],
        /// Count of operators, calls, references and control statements.
        Statements => ["statements"],
    }
}

config_enum! {
    /// Which mutex guards global state touched by tasks.
    GlobalLockStrategy {
        /// One mutex shared by every worker.
        #[default]
        Shared => ["shared"],
        /// One mutex per worker slot; workers do not exclude each other.
        PerWorker => ["per_worker", "per-worker"],
    }
}

/// Configuration error.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Rewrite configuration.
#[derive(Debug, Clone)]
pub struct ObfuscatorConfig {
    /// Function that keeps its signature and bootstraps the scheduler.
    pub entry_point: String,
    pub call_style: CallStyle,
    pub lock_scope: LockScope,
    pub naming: Naming,
    pub weight: WeightMetric,
    /// Worker count the generated bootstrap starts the scheduler with.
    pub workers: usize,
    /// File name of the generated declaration unit.
    pub records_header: String,
}

impl Default for ObfuscatorConfig {
    fn default() -> Self {
        Self {
            entry_point: "main".to_string(),
            call_style: CallStyle::default(),
            lock_scope: LockScope::default(),
            naming: Naming::default(),
            weight: WeightMetric::default(),
            workers: DEFAULT_WORKERS,
            records_header: "taskfog_records.hpp".to_string(),
        }
    }
}

impl ObfuscatorConfig {
    pub fn builder() -> ObfuscatorConfigBuilder {
        ObfuscatorConfigBuilder::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Unset variables keep their defaults; unparsable ones are logged and
    /// ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("TASKFOG_ENTRY") {
            if !val.trim().is_empty() {
                config.entry_point = val.trim().to_string();
            }
        }
        if let Some(val) = parse_env("TASKFOG_CALL_STYLE", CallStyle::parse) {
            config.call_style = val;
        }
        if let Some(val) = parse_env("TASKFOG_LOCK_SCOPE", LockScope::parse) {
            config.lock_scope = val;
        }
        if let Some(val) = parse_env("TASKFOG_NAMING", Naming::parse) {
            config.naming = val;
        }
        if let Some(val) = parse_env("TASKFOG_WEIGHT", WeightMetric::parse) {
            config.weight = val;
        }
        if let Some(val) = parse_env("TASKFOG_WORKERS", |s| s.parse::<usize>().ok()) {
            config.workers = val;
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "workers".into(),
                message: "must be at least 1".into(),
            });
        }
        if !is_identifier(&self.entry_point) {
            return Err(ConfigError::InvalidValue {
                field: "entry_point".into(),
                message: format!("'{}' is not a C identifier", self.entry_point),
            });
        }
        Ok(())
    }
}

/// Builder for [`ObfuscatorConfig`].
#[derive(Debug, Default)]
pub struct ObfuscatorConfigBuilder {
    config: ObfuscatorConfig,
}

impl ObfuscatorConfigBuilder {
    pub fn entry_point(mut self, name: impl Into<String>) -> Self {
        self.config.entry_point = name.into();
        self
    }

    pub fn call_style(mut self, style: CallStyle) -> Self {
        self.config.call_style = style;
        self
    }

    pub fn lock_scope(mut self, scope: LockScope) -> Self {
        self.config.lock_scope = scope;
        self
    }

    pub fn naming(mut self, naming: Naming) -> Self {
        self.config.naming = naming;
        self
    }

    pub fn weight(mut self, weight: WeightMetric) -> Self {
        self.config.weight = weight;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn records_header(mut self, name: impl Into<String>) -> Self {
        self.config.records_header = name.into();
        self
    }

    pub fn build(self) -> ObfuscatorConfig {
        self.config
    }
}

/// Runtime scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of worker threads.
    /// Default: 2.
    pub num_workers: usize,

    /// Which mutex guards globals.
    /// Default: shared.
    pub global_lock: GlobalLockStrategy,

    /// Nested inline executions allowed while a thread waits on a result.
    /// Beyond this the waiter only spins.
    /// Default: 32.
    pub max_inline_depth: usize,

    /// Seed for the load balancer's random choice.
    /// Default: none (seeded from the OS).
    pub seed: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            num_workers: DEFAULT_WORKERS,
            global_lock: GlobalLockStrategy::default(),
            max_inline_depth: DEFAULT_MAX_INLINE_DEPTH,
            seed: None,
        }
    }
}

impl SchedulerConfig {
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(val) = parse_env("TASKFOG_WORKERS", |s| s.parse::<usize>().ok()) {
            if val > 0 {
                config.num_workers = val;
            }
        }
        if let Some(val) = parse_env("TASKFOG_GLOBAL_LOCK", GlobalLockStrategy::parse) {
            config.global_lock = val;
        }
        if let Some(val) = parse_env("TASKFOG_INLINE_DEPTH", |s| s.parse::<usize>().ok()) {
            config.max_inline_depth = val;
        }
        if let Some(val) = parse_env("TASKFOG_SEED", |s| s.parse::<u64>().ok()) {
            config.seed = Some(val);
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "num_workers".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Builder for [`SchedulerConfig`].
#[derive(Debug, Default)]
pub struct SchedulerConfigBuilder {
    config: SchedulerConfig,
}

impl SchedulerConfigBuilder {
    pub fn num_workers(mut self, n: usize) -> Self {
        self.config.num_workers = n;
        self
    }

    pub fn global_lock(mut self, strategy: GlobalLockStrategy) -> Self {
        self.config.global_lock = strategy;
        self
    }

    pub fn max_inline_depth(mut self, depth: usize) -> Self {
        self.config.max_inline_depth = depth;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn build(self) -> SchedulerConfig {
        self.config
    }
}

fn parse_env<T>(var: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let raw = env::var(var).ok()?;
    let parsed = parse(&raw);
    if parsed.is_none() {
        tracing::warn!(var, value = %raw, "ignoring unparsable environment variable");
    }
    parsed
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ObfuscatorConfig::default();
        assert_eq!(config.entry_point, "main");
        assert_eq!(config.call_style, CallStyle::Inline);
        assert_eq!(config.lock_scope, LockScope::Statement);
        assert_eq!(config.workers, 2);

        let scheduler = SchedulerConfig::default();
        assert_eq!(scheduler.num_workers, 2);
        assert_eq!(scheduler.global_lock, GlobalLockStrategy::Shared);
        assert!(scheduler.seed.is_none());
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!(CallStyle::parse("Hoisted"), Some(CallStyle::Hoisted));
        assert_eq!(Naming::parse("first-letter"), Some(Naming::FirstLetter));
        assert_eq!(GlobalLockStrategy::parse("per-worker"), Some(GlobalLockStrategy::PerWorker));
        assert_eq!(LockScope::parse("paragraph"), None);
        assert_eq!(WeightMetric::Statements.as_str(), "statements");
    }

    #[test]
    fn test_validation() {
        assert!(ObfuscatorConfig::builder().entry_point("2main").build().validate().is_err());
        assert!(ObfuscatorConfig::builder().workers(0).build().validate().is_err());
        assert!(SchedulerConfig::builder().num_workers(0).build().validate().is_err());
        assert!(SchedulerConfig::builder().num_workers(3).build().validate().is_ok());
    }
}
