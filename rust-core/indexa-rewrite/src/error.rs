// SPDX-License-Identifier: PMPL-1.0-or-later
//! Rewrite error types.

use thiserror::Error;

/// Errors that can occur while rewriting a predicate tree.
#[derive(Error, Debug)]
pub enum RewriteError {
    /// The index lookup returned more fields than the key threshold allows.
    #[error("failed to expand unfielded term: index key threshold exceeded")]
    KeyThresholdExceeded,

    /// A numeric value cannot be represented as a number literal.
    #[error("unable to encode numeric literal: {0}")]
    NumericLiteral(String),

    /// A range comparison carries a literal that cannot be folded into an interval.
    #[error("unsupported range literal: {0}")]
    UnsupportedLiteral(String),

    /// No substitution or copy rule exists for this node shape.
    #[error("unsupported node shape: {0}")]
    UnsupportedShape(String),

    /// A connective was requested with no children to hold.
    #[error("cannot combine an empty list of children")]
    EmptyJunction,

    #[error("unknown container type: {0}")]
    UnknownContainer(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RewriteError {
    /// Whether the enclosing query must be aborted rather than planned around.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RewriteError::KeyThresholdExceeded
                | RewriteError::NumericLiteral(_)
                | RewriteError::UnsupportedLiteral(_)
        )
    }
}
