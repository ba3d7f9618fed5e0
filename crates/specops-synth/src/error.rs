//! Synthesis error types

use specops_model::SpecError;

/// Errors raised while synthesizing requests for one operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    /// Schema uses a construct the generator cannot satisfy
    #[error("unsupported schema shape at {field}: {reason}")]
    UnsupportedSchemaShape { field: String, reason: String },

    /// Constraint conflicts and other model errors
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// Operation handle or operationId not in the specification
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
}

impl SynthesisError {
    /// Create unsupported-shape error
    pub fn unsupported(field: impl ToString, reason: impl Into<String>) -> Self {
        Self::UnsupportedSchemaShape {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Create conflicting-constraints error
    pub fn conflict(field: impl ToString, reason: impl Into<String>) -> Self {
        Self::Spec(SpecError::conflict(field.to_string(), reason))
    }

    /// Whether this is a constraint conflict
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Spec(SpecError::ConflictingConstraints { .. }))
    }
}

/// Result alias for synthesis operations
pub type SynthResult<T> = Result<T, SynthesisError>;
