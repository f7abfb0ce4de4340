//! Statement rewriting
//!
//! Each statement is rendered from its own source text with rewritten
//! sub-expressions spliced in. Two things happen at statement granularity:
//!
//! - hoisted call preludes are emitted right before the statement (inside a
//!   new block when the statement is an unbraced branch or loop body);
//! - under statement-scoped locking, a statement or controlling expression
//!   that touches shared state is wrapped in a critical section.
//!
//! Returns are turned into record writes plus a jump to the epilogue.

use super::rewriter::{FunctionRewriter, Mode, GUARD};
use super::splice::splice;
use crate::parser::ast::*;

impl FunctionRewriter<'_> {
    /// Render `node`. `unbraced` marks the body of an `if`/loop written
    /// without braces, where a prelude needs a block of its own.
    pub(crate) fn statement(&mut self, node: &AstNode, unbraced: bool) -> String {
        let outer = std::mem::take(&mut self.prelude);
        let text = self.statement_text(node);
        let prelude = std::mem::replace(&mut self.prelude, outer);

        if prelude.is_empty() {
            text
        } else if unbraced {
            format!("{{ {} {} }}", prelude.join(" "), text)
        } else {
            format!("{} {}", prelude.join(" "), text)
        }
    }

    fn statement_text(&mut self, node: &AstNode) -> String {
        match node {
            AstNode::Block { statements, span } => {
                let parts: Vec<(Span, String)> = statements
                    .iter()
                    .map(|s| (s.span(), self.statement(s, false)))
                    .collect();
                splice(self.source, *span, &parts)
            }

            AstNode::VarDecl { .. } | AstNode::DeclGroup { .. } => {
                let mut parts = Vec::new();
                self.declaration_parts(node, &mut parts);
                splice(self.source, node.span(), &parts)
            }

            AstNode::Return { expr, span } => self.return_statement(expr.as_deref(), *span),

            AstNode::If {
                condition,
                then_branch,
                else_branch,
                span,
            } => {
                let mut parts = vec![
                    (condition.span(), self.header(condition, false)),
                    (then_branch.span(), self.statement(then_branch, true)),
                ];
                if let Some(else_branch) = else_branch {
                    parts.push((else_branch.span(), self.statement(else_branch, true)));
                }
                splice(self.source, *span, &parts)
            }

            AstNode::While { condition, body, span } => {
                let parts = vec![
                    (condition.span(), self.header(condition, true)),
                    (body.span(), self.statement(body, true)),
                ];
                splice(self.source, *span, &parts)
            }

            AstNode::DoWhile { body, condition, span } => {
                let parts = vec![
                    (body.span(), self.statement(body, true)),
                    (condition.span(), self.header(condition, true)),
                ];
                splice(self.source, *span, &parts)
            }

            AstNode::For {
                init,
                condition,
                increment,
                body,
                span,
            } => {
                let mut parts = Vec::new();
                if let Some(init) = init {
                    match init.as_ref() {
                        AstNode::VarDecl { .. } | AstNode::DeclGroup { .. } => self.declaration_parts(init, &mut parts),
                        expr => parts.push((expr.span(), self.header(expr, false))),
                    }
                }
                if let Some(condition) = condition {
                    parts.push((condition.span(), self.header(condition, true)));
                }
                if let Some(increment) = increment {
                    parts.push((increment.span(), self.header(increment, true)));
                }
                parts.push((body.span(), self.statement(body, true)));
                splice(self.source, *span, &parts)
            }

            AstNode::Switch { expr, cases, span } => {
                let mut parts = vec![(expr.span(), self.header(expr, false))];
                for case in cases {
                    for statement in case.statements() {
                        parts.push((statement.span(), self.statement(statement, false)));
                    }
                }
                splice(self.source, *span, &parts)
            }

            AstNode::ExpressionStatement { expr, span } => {
                let (text, touched) = self.tracked(expr);
                let statement = splice(self.source, *span, &[(expr.span(), text)]);
                if touched && self.statement_scoped() {
                    self.guarded_block(&statement)
                } else {
                    statement
                }
            }

            _ => self.text(node.span()).to_string(),
        }
    }

    /// Rewritten initializers of a declaration, as splice parts.
    fn declaration_parts(&mut self, node: &AstNode, parts: &mut Vec<(Span, String)>) {
        match node {
            AstNode::VarDecl {
                init: Some(init),
                storage,
                ..
            } => {
                let is_static = *storage == StorageClass::Static;
                // A static initializer runs once; its calls must not be hoisted
                // in front of every pass over the declaration.
                self.conditional += usize::from(is_static);
                let text = self.initializer(init, is_static);
                self.conditional -= usize::from(is_static);
                parts.push((init.span(), text));
            }
            AstNode::DeclGroup { decls, .. } => {
                // Later declarators may read earlier ones, which do not exist
                // yet where a prelude would go.
                for (index, decl) in decls.iter().enumerate() {
                    let later = usize::from(index > 0);
                    self.conditional += later;
                    self.declaration_parts(decl, parts);
                    self.conditional -= later;
                }
            }
            _ => {}
        }
    }

    fn initializer(&mut self, init: &AstNode, is_static: bool) -> String {
        if let AstNode::InitList { items, span } = init {
            let parts: Vec<(Span, String)> = items
                .iter()
                .map(|item| (item.span(), self.initializer(item, is_static)))
                .collect();
            return splice(self.source, *span, &parts);
        }

        let (text, touched) = self.tracked(init);
        if touched && !is_static && self.statement_scoped() {
            self.guarded_value(&text)
        } else {
            text
        }
    }

    /// Controlling expression of a statement. `repeated` marks expressions
    /// that run once per iteration.
    pub(crate) fn header(&mut self, expr: &AstNode, repeated: bool) -> String {
        self.conditional += usize::from(repeated);
        let (text, touched) = self.tracked(expr);
        self.conditional -= usize::from(repeated);

        if touched && self.statement_scoped() {
            self.guarded_value(&text)
        } else {
            text
        }
    }

    fn return_statement(&mut self, expr: Option<&AstNode>, span: Span) -> String {
        let (value, touched) = match expr {
            Some(expr) => {
                let (text, touched) = self.tracked(expr);
                (Some(text), touched)
            }
            None => (None, false),
        };
        let guard = touched && self.statement_scoped();

        let mode = self.mode;
        let target = match mode {
            Mode::Task(function) if function.returns_value() => {
                format!("{}.at(tf_record_index).return_var", function.pool_name())
            }
            Mode::Entry if !self.header.return_type.is_void() => "tf_exit".to_string(),
            Mode::Task(_) | Mode::Entry => String::new(),
            Mode::Opaque => {
                let statement = match (expr, value) {
                    (Some(expr), Some(text)) => splice(self.source, span, &[(expr.span(), text)]),
                    _ => self.text(span).to_string(),
                };
                return if guard {
                    self.guarded_block(&statement)
                } else {
                    statement
                };
            }
        };

        self.has_return = true;
        let store = match value {
            Some(text) if target.is_empty() => format!("({});", text),
            Some(text) => format!("{} = ({});", target, text),
            None => String::new(),
        };
        let store = if guard {
            self.stats.guarded_sections += 1;
            format!("{{ {} {} }} ", GUARD, store)
        } else if store.is_empty() {
            store
        } else {
            format!("{} ", store)
        };
        format!("{{ {}goto tf_epilogue; }}", store)
    }
}
