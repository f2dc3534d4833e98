//! Error types for the Validado core library
//!
//! This module defines the error handling system for Validado, using thiserror
//! for ergonomic error definitions and anyhow for flexible error contexts.
//! Structural errors (malformed shapes, cyclic dependencies) are programmer
//! errors and carry no trace; data-quality errors carry the trace collected up
//! to the point of failure so callers can present targeted correction guidance.

use crate::trace::Trace;
use crate::types::{FieldFailure, SkippedField};
use thiserror::Error;

/// Main error type for Validado operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed step configuration, detected lazily at first `create()` call
    #[error("Shape error in '{class_id}': {message}")]
    Shape {
        class_id: String,
        message: String,
    },

    /// Cyclic field dependencies rejected by the single-pass engine
    #[error("Cyclic field dependencies in shape '{class_id}': {}", .members.join(", "))]
    CyclicDependency {
        class_id: String,
        members: Vec<String>,
    },

    /// Convergent engine exhausted its pass budget without stabilizing
    #[error("Shape '{class_id}' did not converge after {passes} pass(es); unstable fields: {}", .unstable.join(", "))]
    Convergence {
        class_id: String,
        passes: usize,
        unstable: Vec<String>,
    },

    /// Discriminator value with no registered branch shape
    #[error("Unknown discriminator value '{value}' for field '{field}'")]
    UnknownDiscriminator {
        field: String,
        value: String,
    },

    /// A single field reached a terminal validation failure (fail-fast mode)
    #[error("Validation failed for field '{}' at {} step: {}", .failure.field, .failure.step_kind, .failure.message)]
    FieldValidation {
        failure: FieldFailure,
        trace: Trace,
    },

    /// One or more fields failed validation (collect-all mode)
    #[error("Validation failed for {} field(s) ({} skipped)", .failures.len(), .skipped.len())]
    AggregateValidation {
        failures: Vec<FieldFailure>,
        skipped: Vec<SkippedField>,
        trace: Trace,
    },

    /// Generic internal error with context
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an internal error from a plain message
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// The trace collected before this error was raised, if any
    ///
    /// Only data-quality errors carry a trace; structural errors return `None`.
    pub fn trace(&self) -> Option<&Trace> {
        match self {
            Error::FieldValidation { trace, .. } | Error::AggregateValidation { trace, .. } => {
                Some(trace)
            }
            _ => None,
        }
    }

    /// Whether this error represents a data-quality problem the caller can
    /// correct by fixing the input, as opposed to a structural defect
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Error::FieldValidation { .. } | Error::AggregateValidation { .. }
        )
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal {
            message: err.to_string(),
            source: Some(err),
        }
    }
}
