//! Program transformer
//!
//! Rewrites one parsed unit into its task-based form:
//!
//! ```text
//! int funcA(int x) { return x + 1; }
//!   ↓
//! void funcA(int tf_worker_slot, int tf_record_index) {
//!     { { funcA_pool.at(tf_record_index).return_var = (funcA_pool.at(tf_record_index).x + 1);
//!         goto tf_epilogue; } }
//!     tf_epilogue:; taskfog::finish(funcA_pool, tf_record_index); }
//! ```
//!
//! (shown on several lines here; the real output keeps each rewritten piece
//! on the line it came from).
//!
//! Unit-level changes:
//! - registered definitions and their prototypes get the task signature;
//! - every body that calls a registered function or touches globals is
//!   rewritten (the entry point also starts and stops the scheduler);
//! - struct definitions move to the declaration unit and leave blank lines;
//! - the declaration unit is included ahead of everything else, followed by a
//!   `#line 1` directive so diagnostics keep the original numbering.

pub mod errors;
mod expressions;
mod rewriter;
mod splice;
mod statements;

pub use errors::TransformError;
pub use splice::{blank, splice, wrap_lines};

use crate::config::ObfuscatorConfig;
use crate::parser::ast::{AstNode, Span};
use crate::parser::resolve::SymbolTable;
use crate::parser::SourceUnit;
use crate::registry::{RegisteredFunction, Registry};
use rewriter::{FunctionRewriter, Mode};
use std::ops::AddAssign;
use tracing::debug;

/// Counters for one rewritten unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    /// Definitions given the task signature.
    pub functions: usize,
    pub prototypes: usize,
    /// Call sites turned into task calls.
    pub calls: usize,
    /// Critical sections inserted around shared-state accesses.
    pub guarded_sections: usize,
    /// Lines that touch globals but could not be wrapped (line scope only).
    pub unguarded_lines: usize,
}

impl AddAssign for RewriteStats {
    fn add_assign(&mut self, other: Self) {
        self.functions += other.functions;
        self.prototypes += other.prototypes;
        self.calls += other.calls;
        self.guarded_sections += other.guarded_sections;
        self.unguarded_lines += other.unguarded_lines;
    }
}

#[derive(Debug, Clone)]
pub struct RewrittenUnit {
    pub name: String,
    pub text: String,
    pub stats: RewriteStats,
}

/// Signature every task function is given.
pub fn task_signature(function: &RegisteredFunction) -> String {
    format!("void {}(int tf_worker_slot, int tf_record_index)", function.symbol)
}

/// Rewrites units against one registry.
pub struct Transformer<'a> {
    registry: &'a Registry,
    symbols: &'a SymbolTable,
    config: &'a ObfuscatorConfig,
}

impl<'a> Transformer<'a> {
    pub fn new(registry: &'a Registry, symbols: &'a SymbolTable, config: &'a ObfuscatorConfig) -> Self {
        Self {
            registry,
            symbols,
            config,
        }
    }

    /// Rewrite unit `unit_index` (its position in the slice the registry was
    /// built from).
    pub fn transform_unit(&self, unit_index: usize, unit: &SourceUnit) -> Result<RewrittenUnit, TransformError> {
        let mut parts: Vec<(Span, String)> = Vec::new();
        let mut stats = RewriteStats::default();

        for node in &unit.program.nodes {
            match node {
                AstNode::FunctionDef { header, body, span } => {
                    let mode = match self.registry.definition(unit_index, *span) {
                        Some(function) => Mode::Task(function),
                        None if header.name == self.config.entry_point => Mode::Entry,
                        None => Mode::Opaque,
                    };

                    let mut rewriter = FunctionRewriter::new(
                        &unit.source,
                        &unit.name,
                        unit_index,
                        self.registry,
                        self.symbols,
                        self.config,
                        header,
                        body,
                        mode,
                    );
                    let text = rewriter.rewrite_body(body);
                    if let Some(err) = rewriter.errors.into_iter().next() {
                        return Err(err);
                    }
                    stats += rewriter.stats;

                    if let Mode::Task(function) = mode {
                        let declarator = Span::new(span.start, header.params_span.end, span.line, span.column);
                        parts.push((declarator, task_signature(function)));
                        stats.functions += 1;
                    }
                    parts.push((body.span(), text));
                }

                AstNode::FunctionDecl { header, span } => {
                    if let Some(function) = self.registry.declared(unit_index, header) {
                        let declarator = Span::new(span.start, header.params_span.end, span.line, span.column);
                        parts.push((declarator, task_signature(function)));
                        stats.prototypes += 1;
                    }
                }

                AstNode::StructDef { span, .. } => parts.push((*span, blank(unit.text(*span)))),

                _ => {}
            }
        }

        let whole = Span::new(0, unit.source.len(), 1, 1);
        let body = splice(&unit.source, whole, &parts);
        let text = format!(
            "#include \"{}\"\n#line 1 \"{}\"\n{}",
            self.config.records_header,
            unit.name.replace('\\', "\\\\").replace('"', "\\\""),
            body
        );

        debug!(
            unit = %unit.name,
            functions = stats.functions,
            calls = stats.calls,
            guarded = stats.guarded_sections,
            "rewrote unit"
        );
        Ok(RewrittenUnit {
            name: unit.name.clone(),
            text,
            stats,
        })
    }
}
