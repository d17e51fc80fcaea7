//! Probe error taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire-level error discriminant carried in `ProbeReply::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeErrorKind {
    SelectorNotFound,
    UnsupportedExpression,
    BadRequest,
}

/// Errors raised while serving a probe request.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The selector resolved to zero nodes in this frame.
    #[error("no element matches selector '{selector}'")]
    SelectorNotFound { selector: String },

    /// `evaluate` received an expression outside the supported surface.
    #[error("unsupported expression: {0}")]
    UnsupportedExpression(String),

    /// Malformed or inapplicable request payload.
    #[error("bad probe request: {0}")]
    BadRequest(String),
}

impl ProbeError {
    pub fn selector_not_found(selector: impl Into<String>) -> Self {
        Self::SelectorNotFound {
            selector: selector.into(),
        }
    }

    pub fn kind(&self) -> ProbeErrorKind {
        match self {
            ProbeError::SelectorNotFound { .. } => ProbeErrorKind::SelectorNotFound,
            ProbeError::UnsupportedExpression(_) => ProbeErrorKind::UnsupportedExpression,
            ProbeError::BadRequest(_) => ProbeErrorKind::BadRequest,
        }
    }
}
