//! Errors raised while rewriting a unit
//!
//! A call that names a registered function but cannot be matched to exactly
//! one of its definitions would be rewritten into the wrong task, so the
//! whole unit is rejected instead.

use crate::parser::ast::Span;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransformError {
    /// No definition of `name` accepts the call's arguments
    #[error("{unit}:{span}: no definition of '{name}' matches this call ({candidates} candidates)")]
    NoMatchingOverload {
        unit: String,
        span: Span,
        name: String,
        candidates: usize,
    },

    /// Several definitions of `name` accept the call's arguments
    #[error("{unit}:{span}: call to '{name}' is ambiguous between {candidates} definitions")]
    AmbiguousCall {
        unit: String,
        span: Span,
        name: String,
        candidates: usize,
    },
}

impl TransformError {
    pub fn span(&self) -> Span {
        match self {
            TransformError::NoMatchingOverload { span, .. } | TransformError::AmbiguousCall { span, .. } => *span,
        }
    }
}
