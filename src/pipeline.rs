//! End-to-end obfuscation run
//!
//! ```text
//! inputs → discover → parse → SymbolTable + Registry → Transformer → DeclarationUnit
//! ```
//!
//! [`Obfuscator::run`] works purely in memory and returns an
//! [`ObfuscationReport`]; [`ObfuscationReport::write`] puts the result on
//! disk.

use crate::config::{ConfigError, ObfuscatorConfig};
use crate::emit::{DeclarationUnit, RUNTIME_HEADER, RUNTIME_HEADER_NAME};
use crate::parser::resolve::SymbolTable;
use crate::parser::{ParseError, SourceUnit};
use crate::registry::{Registry, RegistryDiagnostic};
use crate::transform::{RewriteStats, RewrittenUnit, TransformError, Transformer};
use rustc_hash::FxHashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Extensions picked up when an input is a directory.
pub const SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx", "h", "hpp"];

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no source files found in the given inputs")]
    NoInputs,

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    fn io(path: &Path, source: io::Error) -> Self {
        PipelineError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A non-fatal problem found during a run.
#[derive(Debug, Clone, Error)]
pub enum Diagnostic {
    /// The unit was left out of the registry and copied unchanged.
    #[error("{unit}: {error}; unit left unchanged")]
    Unparsable { unit: String, error: ParseError },

    #[error(transparent)]
    Registry(#[from] RegistryDiagnostic),
}

/// One discovered input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path below the input it was found under; used to lay out `--out-dir`.
    pub relative: PathBuf,
}

/// Where [`ObfuscationReport::write`] puts its files.
#[derive(Debug, Clone)]
pub enum OutputTarget {
    /// Mirror the input layout below this directory.
    Directory(PathBuf),
    /// Overwrite the inputs; headers go next to them.
    InPlace,
}

#[derive(Debug)]
pub struct ObfuscationReport {
    /// Rewritten units, in input order. Unparsable units are absent.
    pub units: Vec<RewrittenUnit>,
    /// The file each entry of `units` came from.
    pub files: Vec<SourceFile>,
    /// Units copied through unchanged, with their original text.
    pub untouched: Vec<(SourceFile, String)>,
    pub diagnostics: Vec<Diagnostic>,
    pub registry: Registry,
    /// Text of the generated declaration unit.
    pub records_header: String,
    pub records_header_name: String,
}

impl ObfuscationReport {
    pub fn stats(&self) -> RewriteStats {
        let mut total = RewriteStats::default();
        for unit in &self.units {
            total += unit.stats;
        }
        total
    }

    /// Write every unit plus both headers; returns the paths written.
    ///
    /// Headers are written into every directory that receives a rewritten
    /// unit, so the quoted include resolves without extra search paths.
    pub fn write(&self, target: &OutputTarget) -> Result<Vec<PathBuf>, PipelineError> {
        let destination = |file: &SourceFile| match target {
            OutputTarget::Directory(dir) => dir.join(&file.relative),
            OutputTarget::InPlace => file.path.clone(),
        };

        let mut written = Vec::new();
        let mut header_dirs: Vec<PathBuf> = Vec::new();
        let mut seen_dirs = FxHashSet::default();

        for (unit, file) in self.units.iter().zip(&self.files) {
            let path = destination(file);
            write_file(&path, &unit.text)?;
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            if seen_dirs.insert(dir.clone()) {
                header_dirs.push(dir);
            }
            written.push(path);
        }

        if let OutputTarget::Directory(_) = target {
            for (file, text) in &self.untouched {
                let path = destination(file);
                write_file(&path, text)?;
                written.push(path);
            }
        }

        for dir in header_dirs {
            let records = dir.join(&self.records_header_name);
            write_file(&records, &self.records_header)?;
            let runtime = dir.join(RUNTIME_HEADER_NAME);
            write_file(&runtime, RUNTIME_HEADER)?;
            written.push(records);
            written.push(runtime);
        }

        info!(files = written.len(), "wrote obfuscated sources");
        Ok(written)
    }
}

fn write_file(path: &Path, text: &str) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
    }
    fs::write(path, text).map_err(|e| PipelineError::io(path, e))
}

pub struct Obfuscator {
    config: ObfuscatorConfig,
}

impl Obfuscator {
    pub fn new(config: ObfuscatorConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ObfuscatorConfig {
        &self.config
    }

    /// Expand directories into the source files below them, sorted by path.
    pub fn discover(inputs: &[PathBuf]) -> Result<Vec<SourceFile>, PipelineError> {
        let mut files = Vec::new();
        for input in inputs {
            let meta = fs::metadata(input).map_err(|e| PipelineError::io(input, e))?;
            if meta.is_dir() {
                let mut found = Vec::new();
                walk(input, &mut found)?;
                found.sort();
                for path in found {
                    let relative = path.strip_prefix(input).map(Path::to_path_buf).unwrap_or_else(|_| path.clone());
                    files.push(SourceFile { path, relative });
                }
            } else {
                let relative = input.file_name().map(PathBuf::from).unwrap_or_else(|| input.clone());
                files.push(SourceFile {
                    path: input.clone(),
                    relative,
                });
            }
        }
        Ok(files)
    }

    /// Discover, read and obfuscate `inputs`.
    pub fn run(&self, inputs: &[PathBuf]) -> Result<ObfuscationReport, PipelineError> {
        let files = Self::discover(inputs)?;
        if files.is_empty() {
            return Err(PipelineError::NoInputs);
        }
        let mut sources = Vec::with_capacity(files.len());
        for file in files {
            let text = fs::read_to_string(&file.path).map_err(|e| PipelineError::io(&file.path, e))?;
            sources.push((file, text));
        }
        self.run_sources(sources)
    }

    /// Obfuscate already loaded sources. Unit names are the file paths.
    pub fn run_sources(&self, sources: Vec<(SourceFile, String)>) -> Result<ObfuscationReport, PipelineError> {
        let mut units = Vec::new();
        let mut files = Vec::new();
        let mut untouched = Vec::new();
        let mut diagnostics = Vec::new();

        for (file, text) in sources {
            let name = file.path.display().to_string();
            match SourceUnit::parse(name.clone(), text.as_str()) {
                Ok(unit) => {
                    debug!(unit = %name, nodes = unit.program.nodes.len(), "parsed unit");
                    units.push(unit);
                    files.push(file);
                }
                Err(error) => {
                    warn!(unit = %name, %error, "unit excluded from obfuscation");
                    diagnostics.push(Diagnostic::Unparsable { unit: name, error });
                    untouched.push((file, text));
                }
            }
        }

        let symbols = SymbolTable::from_programs(units.iter().map(|u| &u.program));
        let registry = Registry::build(&units, &self.config);
        diagnostics.extend(registry.diagnostics().iter().cloned().map(Diagnostic::Registry));
        info!(units = units.len(), functions = registry.len(), "collected functions");

        let transformer = Transformer::new(&registry, &symbols, &self.config);
        let mut rewritten = Vec::with_capacity(units.len());
        for (index, unit) in units.iter().enumerate() {
            let result = transformer.transform_unit(index, unit).map_err(|err| {
                warn!(unit = %unit.name, %err, "unit could not be rewritten");
                err
            })?;
            rewritten.push(result);
        }

        let records_header = DeclarationUnit::new(&registry, &units, &self.config).render();

        Ok(ObfuscationReport {
            units: rewritten,
            files,
            untouched,
            diagnostics,
            registry,
            records_header,
            records_header_name: self.config.records_header.clone(),
        })
    }
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> Result<(), PipelineError> {
    let entries = fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| PipelineError::io(&path, e))?;
        if file_type.is_dir() {
            walk(&path, found)?;
        } else if has_source_extension(&path) {
            found.push(path);
        }
    }
    Ok(())
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str, text: &str) -> (SourceFile, String) {
        (
            SourceFile {
                path: PathBuf::from(name),
                relative: PathBuf::from(name),
            },
            text.to_string(),
        )
    }

    #[test]
    fn test_source_extensions() {
        assert!(has_source_extension(Path::new("a/b.c")));
        assert!(has_source_extension(Path::new("x.hpp")));
        assert!(!has_source_extension(Path::new("notes.txt")));
        assert!(!has_source_extension(Path::new("Makefile")));
    }

    #[test]
    fn test_unparsable_unit_is_reported_not_fatal() {
        let obfuscator = Obfuscator::new(ObfuscatorConfig::default()).unwrap();
        let report = obfuscator
            .run_sources(vec![
                source("good.c", "int inc(int x) { return x + 1; }\nint main() { return inc(1); }\n"),
                source("bad.c", "int broken( { \n"),
            ])
            .unwrap();

        assert_eq!(report.units.len(), 1);
        assert_eq!(report.untouched.len(), 1);
        assert!(matches!(report.diagnostics[0], Diagnostic::Unparsable { ref unit, .. } if unit == "bad.c"));
        assert_eq!(report.registry.len(), 1);
        assert_eq!(report.stats().functions, 1);
        assert_eq!(report.stats().calls, 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ObfuscatorConfig::builder().workers(0).build();
        assert!(matches!(Obfuscator::new(config), Err(PipelineError::Config(_))));
    }
}
