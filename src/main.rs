//! taskfog CLI
//!
//! ```text
//! taskfog [OPTIONS] <COMMAND>
//!
//! Commands:
//!   obfuscate  Rewrite C sources into task-based form
//!   registry   List the functions that would become tasks
//!
//! Options:
//!   -v, --verbose  Debug logging (RUST_LOG overrides)
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use taskfog::config::{CallStyle, LockScope, Naming, ObfuscatorConfig, WeightMetric};
use taskfog::pipeline::{Obfuscator, OutputTarget};
use taskfog::registry::FieldKind;

#[derive(Parser)]
#[command(name = "taskfog")]
#[command(version)]
#[command(about = "Turns C function calls into load-balanced worker tasks", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite C sources into task-based form
    ///
    /// Writes the rewritten units together with taskfog_records.hpp and
    /// taskfog_runtime.hpp. Link the result against the taskfog static
    /// library.
    Obfuscate(ObfuscateArgs),

    /// List the functions that would become tasks
    Registry(RewriteArgs),
}

#[derive(Args)]
struct ObfuscateArgs {
    #[command(flatten)]
    rewrite: RewriteArgs,

    /// Directory for the rewritten sources
    #[arg(short, long, value_name = "DIR", conflicts_with = "in_place")]
    out_dir: Option<PathBuf>,

    /// Overwrite the inputs
    #[arg(long)]
    in_place: bool,
}

#[derive(Args)]
struct RewriteArgs {
    /// Source files or directories
    #[arg(value_name = "INPUTS", required = true)]
    inputs: Vec<PathBuf>,

    /// Function that bootstraps the scheduler [env: TASKFOG_ENTRY]
    #[arg(long, value_name = "NAME")]
    entry: Option<String>,

    /// Worker threads started by the rewritten program [env: TASKFOG_WORKERS]
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// How calls are rewritten [env: TASKFOG_CALL_STYLE]
    #[arg(long, value_enum)]
    call_style: Option<CallStyle>,

    /// Extent of each critical section around globals [env: TASKFOG_LOCK_SCOPE]
    #[arg(long, value_enum)]
    lock_scope: Option<LockScope>,

    /// How overloads are told apart [env: TASKFOG_NAMING]
    #[arg(long, value_enum)]
    naming: Option<Naming>,

    /// Static task weight metric [env: TASKFOG_WEIGHT]
    #[arg(long, value_enum)]
    weight: Option<WeightMetric>,
}

impl RewriteArgs {
    /// Environment first, flags on top.
    fn config(&self) -> ObfuscatorConfig {
        let mut config = ObfuscatorConfig::from_env();
        if let Some(entry) = &self.entry {
            config.entry_point = entry.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(style) = self.call_style {
            config.call_style = style;
        }
        if let Some(scope) = self.lock_scope {
            config.lock_scope = scope;
        }
        if let Some(naming) = self.naming {
            config.naming = naming;
        }
        if let Some(weight) = self.weight {
            config.weight = weight;
        }
        config
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Obfuscate(args) => cmd_obfuscate(&args),
        Commands::Registry(args) => cmd_registry(&args),
    }
}

fn cmd_obfuscate(args: &ObfuscateArgs) -> Result<()> {
    let target = match (&args.out_dir, args.in_place) {
        (Some(dir), false) => OutputTarget::Directory(dir.clone()),
        (None, true) => OutputTarget::InPlace,
        _ => bail!("choose an output: --out-dir <DIR> or --in-place"),
    };

    let obfuscator = Obfuscator::new(args.rewrite.config()).context("invalid configuration")?;
    let report = obfuscator
        .run(&args.rewrite.inputs)
        .context("obfuscation failed")?;
    let written = report.write(&target).context("failed to write output")?;

    for diagnostic in &report.diagnostics {
        eprintln!("warning: {}", diagnostic);
    }
    let stats = report.stats();
    info!(
        functions = stats.functions,
        calls = stats.calls,
        guarded = stats.guarded_sections,
        unguarded_lines = stats.unguarded_lines,
        "done"
    );
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

fn cmd_registry(args: &RewriteArgs) -> Result<()> {
    let obfuscator = Obfuscator::new(args.config()).context("invalid configuration")?;
    let report = obfuscator.run(&args.inputs).context("obfuscation failed")?;

    println!("Collected functions:");
    for function in report.registry.functions() {
        println!(
            "  {:<24} {:<24} weight {:<4} {}",
            function.legacy_key,
            function.symbol,
            function.weight,
            function.signature
        );
        for field in &function.record_fields {
            let role = match field.kind {
                FieldKind::Param => "param",
                FieldKind::ReturnValue => "return",
                FieldKind::Done => "done",
            };
            println!("      {:<7} {}", role, field.ty.declare(&field.name));
        }
    }
    for diagnostic in &report.diagnostics {
        eprintln!("warning: {}", diagnostic);
    }
    Ok(())
}
