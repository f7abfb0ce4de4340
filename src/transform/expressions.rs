//! Expression rewriting
//!
//! - parameter references of a task function become record field accesses;
//! - references to globals and static locals are noted so the enclosing
//!   statement can be guarded;
//! - calls that resolve to a registered function become task calls.
//!
//! Right operands of `&&`/`||`, ternary arms and `sizeof` operands may run
//! zero times, so calls inside them are never hoisted. Neither are calls in
//! the right operand of `,`: a prelude would run before the left operand's
//! side effects.

use super::errors::TransformError;
use super::rewriter::{FunctionRewriter, Mode};
use super::splice::splice;
use crate::config::LockScope;
use crate::parser::ast::*;
use crate::parser::resolve::BindingKind;
use crate::registry::CallTarget;

impl FunctionRewriter<'_> {
    /// Render `node` and report whether it touched shared state.
    pub(crate) fn tracked(&mut self, node: &AstNode) -> (String, bool) {
        let outer = std::mem::replace(&mut self.touched_globals, false);
        let text = self.expression(node);
        let touched = self.touched_globals;
        self.touched_globals = outer || touched;
        (text, touched)
    }

    pub(crate) fn expression(&mut self, node: &AstNode) -> String {
        match node {
            AstNode::Variable(name, span) => self.variable(name, *span),

            AstNode::FunctionCall {
                name, args, span, ..
            } => self.call(node, name, args, *span),

            AstNode::BinaryOp {
                op, left, right, span, ..
            } if op.is_short_circuit() => {
                let left_text = self.expression(left);
                let right_text = self.conditionally(right);
                splice(self.source, *span, &[(left.span(), left_text), (right.span(), right_text)])
            }

            AstNode::Comma { left, right, span } => {
                let left_text = self.expression(left);
                let right_text = self.conditionally(right);
                splice(self.source, *span, &[(left.span(), left_text), (right.span(), right_text)])
            }

            AstNode::TernaryOp {
                condition,
                true_expr,
                false_expr,
                span,
            } => {
                let parts = [
                    (condition.span(), self.expression(condition)),
                    (true_expr.span(), self.conditionally(true_expr)),
                    (false_expr.span(), self.conditionally(false_expr)),
                ];
                splice(self.source, *span, &parts)
            }

            AstNode::SizeofExpr { expr, span } => {
                let text = self.conditionally(expr);
                splice(self.source, *span, &[(expr.span(), text)])
            }

            _ => self.children(node),
        }
    }

    fn conditionally(&mut self, node: &AstNode) -> String {
        self.conditional += 1;
        let text = self.expression(node);
        self.conditional -= 1;
        text
    }

    /// `node`'s text with every child expression rewritten.
    fn children(&mut self, node: &AstNode) -> String {
        let parts: Vec<(Span, String)> = node
            .children()
            .into_iter()
            .map(|child| (child.span(), self.expression(child)))
            .collect();
        splice(self.source, node.span(), &parts)
    }

    fn variable(&mut self, name: &str, span: Span) -> String {
        let kind = self.bindings.kind(span);
        match (kind, self.mode) {
            (BindingKind::Param(_), Mode::Task(function)) => {
                format!("{}.at(tf_record_index).{}", function.pool_name(), name)
            }
            (kind, _) if kind.is_shared_state() => {
                self.touched_globals = true;
                if self.config.lock_scope == LockScope::Line {
                    self.guarded_lines.push(span.line);
                }
                self.text(span).to_string()
            }
            _ => self.text(span).to_string(),
        }
    }

    fn call(&mut self, node: &AstNode, name: &str, args: &[AstNode], span: Span) -> String {
        let arg_types: Vec<Option<Type>> = args
            .iter()
            .map(|arg| self.bindings.expr_type(arg, self.symbols))
            .collect();

        let registry = self.registry;
        match registry.resolve_call(self.unit_index, name, &arg_types) {
            CallTarget::Registered(id) => {
                let callee = registry.get(id);
                let rendered: Vec<String> = args.iter().map(|arg| self.expression(arg)).collect();
                self.task_call(callee, &rendered)
            }
            CallTarget::Opaque => self.children(node),
            CallTarget::NoMatch { candidates } => {
                self.error(TransformError::NoMatchingOverload {
                    unit: self.unit_name.to_string(),
                    span,
                    name: name.to_string(),
                    candidates,
                });
                self.children(node)
            }
            CallTarget::Ambiguous { candidates } => {
                self.error(TransformError::AmbiguousCall {
                    unit: self.unit_name.to_string(),
                    span,
                    name: name.to_string(),
                    candidates,
                });
                self.children(node)
            }
        }
    }
}
