//! Per-function rewrite state
//!
//! A [`FunctionRewriter`] walks one function body and produces its new text.
//! Statement handling lives in `statements.rs`, expression and call handling
//! in `expressions.rs`; this file holds the shared state, the generated
//! snippets and the scaffolding wrapped around a finished body.
//!
//! Every snippet is emitted without line breaks so that line numbers in the
//! output match the input.

use super::errors::TransformError;
use super::splice::wrap_lines;
use super::RewriteStats;
use crate::config::{CallStyle, LockScope, ObfuscatorConfig};
use crate::parser::ast::{AstNode, FunctionHeader, Span};
use crate::parser::resolve::{FunctionBindings, SymbolTable};
use crate::registry::{FieldKind, RegisteredFunction, Registry};
use tracing::{debug, warn};

/// Opens a critical section on the calling worker's globals lock.
pub(crate) const GUARD: &str = "taskfog::GlobalsGuard tf_guard(tf_worker_slot);";

/// How the function being rewritten is itself invoked.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Mode<'a> {
    /// Registered: runs as a task, arguments come from its record.
    Task(&'a RegisteredFunction),
    /// The entry point: keeps its signature and owns the scheduler.
    Entry,
    /// Anything else with a body; runs synchronously in whatever slot calls it.
    Opaque,
}

pub(crate) struct FunctionRewriter<'a> {
    pub(crate) source: &'a str,
    pub(crate) unit_name: &'a str,
    /// Position of the unit in the slice the registry was built from.
    pub(crate) unit_index: usize,
    pub(crate) registry: &'a Registry,
    pub(crate) symbols: &'a SymbolTable,
    pub(crate) config: &'a ObfuscatorConfig,
    pub(crate) header: &'a FunctionHeader,
    pub(crate) mode: Mode<'a>,
    pub(crate) bindings: FunctionBindings,
    /// Nesting of contexts where an expression may run zero or many times,
    /// or must run after an earlier part of the same statement.
    pub(crate) conditional: usize,
    /// Set when the expression being rendered reads or writes shared state.
    pub(crate) touched_globals: bool,
    /// Statements to emit before the statement being rendered.
    pub(crate) prelude: Vec<String>,
    /// Pool of each hoisted call site, by `tf_idx_N`.
    pub(crate) hoisted: Vec<String>,
    /// Source lines with a shared-state access, for line-scoped locking.
    pub(crate) guarded_lines: Vec<usize>,
    pub(crate) has_return: bool,
    pub(crate) stats: RewriteStats,
    pub(crate) errors: Vec<TransformError>,
}

impl<'a> FunctionRewriter<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        source: &'a str,
        unit_name: &'a str,
        unit_index: usize,
        registry: &'a Registry,
        symbols: &'a SymbolTable,
        config: &'a ObfuscatorConfig,
        header: &'a FunctionHeader,
        body: &AstNode,
        mode: Mode<'a>,
    ) -> Self {
        Self {
            source,
            unit_name,
            unit_index,
            registry,
            symbols,
            config,
            header,
            mode,
            bindings: FunctionBindings::resolve(header, body, symbols),
            conditional: 0,
            touched_globals: false,
            prelude: Vec::new(),
            hoisted: Vec::new(),
            guarded_lines: Vec::new(),
            has_return: false,
            stats: RewriteStats::default(),
            errors: Vec::new(),
        }
    }

    pub(crate) fn text(&self, span: Span) -> &'a str {
        &self.source[span.start..span.end]
    }

    pub(crate) fn statement_scoped(&self) -> bool {
        self.config.lock_scope == LockScope::Statement
    }

    /// Hoisting needs an epilogue to release indices, which opaque
    /// functions do not get.
    pub(crate) fn hoisting(&self) -> bool {
        self.config.call_style == CallStyle::Hoisted && !matches!(self.mode, Mode::Opaque) && self.conditional == 0
    }

    /// `{ guard; text }`
    pub(crate) fn guarded_block(&mut self, text: &str) -> String {
        self.stats.guarded_sections += 1;
        format!("{{ {} {} }}", GUARD, text)
    }

    /// Immediately invoked guarded lambda yielding `text`'s value.
    pub(crate) fn guarded_value(&mut self, text: &str) -> String {
        self.stats.guarded_sections += 1;
        format!("[&]{{ {} return ({}); }}()", GUARD, text)
    }

    /// `[&](G_record &tf_rec) { tf_rec.a = (arg); ... }`
    pub(crate) fn record_fill(callee: &RegisteredFunction, args: &[String]) -> String {
        let assignments: Vec<String> = callee
            .record_fields
            .iter()
            .filter(|f| f.kind == FieldKind::Param)
            .zip(args)
            .map(|(field, arg)| format!("tf_rec.{} = ({});", field.name, arg))
            .collect();
        if assignments.is_empty() {
            format!("[&]({} &) {{}}", callee.record_type())
        } else {
            format!("[&]({} &tf_rec) {{ {} }}", callee.record_type(), assignments.join(" "))
        }
    }

    /// Replacement text for a call to a registered function.
    pub(crate) fn task_call(&mut self, callee: &RegisteredFunction, args: &[String]) -> String {
        self.stats.calls += 1;
        let fill = Self::record_fill(callee, args);
        let pool = callee.pool_name();
        let id = callee.enum_name();

        if !callee.returns_value() {
            return format!("taskfog::call_detached({}, {}, {}, {})", pool, id, callee.weight, fill);
        }

        if self.hoisting() {
            let n = self.hoisted.len();
            self.prelude.push(format!(
                "taskfog::call_hoisted({}, tf_idx_{}, {}, {}, tf_worker_slot, {});",
                pool, n, id, callee.weight, fill
            ));
            self.hoisted.push(pool.clone());
            return format!("{}.at(tf_idx_{}).return_var", pool, n);
        }

        format!(
            "taskfog::call_and_wait({}, {}, {}, tf_worker_slot, {})",
            pool, id, callee.weight, fill
        )
    }

    /// Rewrite `body` and wrap it in the scaffolding its mode needs.
    pub(crate) fn rewrite_body(&mut self, body: &AstNode) -> String {
        let mut inner = self.statement(body, false);

        if !self.guarded_lines.is_empty() {
            self.guarded_lines.sort_unstable();
            self.guarded_lines.dedup();
            let open = format!("{{ {} ", GUARD);
            let (wrapped, skipped) = wrap_lines(&inner, body.span().line, &self.guarded_lines, &open, " }");
            for line in &skipped {
                warn!(
                    unit = self.unit_name,
                    line,
                    "line touches globals but cannot be wrapped as a whole; left unguarded"
                );
            }
            self.stats.guarded_sections += self.guarded_lines.len() - skipped.len();
            self.stats.unguarded_lines += skipped.len();
            inner = wrapped;
        }

        let hoisted_decls = if self.hoisted.is_empty() {
            String::new()
        } else {
            let vars: Vec<String> = (0..self.hoisted.len()).map(|i| format!("tf_idx_{} = -1", i)).collect();
            format!("int {}; ", vars.join(", "))
        };
        let releases: String = self
            .hoisted
            .iter()
            .enumerate()
            .map(|(i, pool)| format!("taskfog::release_hoisted({}, tf_idx_{}); ", pool, i))
            .collect();
        let label = if self.has_return { "tf_epilogue:; " } else { "" };

        match self.mode {
            Mode::Task(function) => {
                let finish = if function.returns_value() {
                    format!("taskfog::finish({}, tf_record_index); ", function.pool_name())
                } else {
                    String::new()
                };
                debug!(symbol = %function.symbol, calls = self.stats.calls, "rewrote task function");
                format!("{{ {}{} {}{}{}}}", hoisted_decls, inner, label, releases, finish)
            }
            Mode::Entry => {
                let returns = !self.header.return_type.is_void();
                let exit_decl = if returns {
                    format!("{}{{}}; ", self.header.return_type.declare("tf_exit"))
                } else {
                    String::new()
                };
                let exit = if returns { "return tf_exit; " } else { "" };
                debug!(entry = %self.header.name, calls = self.stats.calls, "rewrote entry point");
                format!(
                    "{{ const int tf_worker_slot = TASKFOG_ENTRY_SLOT; taskfog_initialize(); {}{}{} {}{}taskfog_teardown(); {}}}",
                    exit_decl, hoisted_decls, inner, label, releases, exit
                )
            }
            Mode::Opaque => {
                if self.stats.calls == 0 && self.stats.guarded_sections == 0 {
                    return inner;
                }
                format!("{{ const int tf_worker_slot = taskfog::current_slot(); {} }}", inner)
            }
        }
    }

    pub(crate) fn error(&mut self, err: TransformError) {
        self.errors.push(err);
    }
}
