//! Coverage error types

use crate::state::CoverageState;

/// Errors raised while recording coverage
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoverageError {
    /// Transition outside the forward-only lifecycle
    #[error("illegal coverage transition: {from} -> {to}")]
    IllegalTransition { from: CoverageState, to: CoverageState },

    /// Match result names an operation this tracker does not know
    #[error("operation not declared in tracked specification: #{0}")]
    UnknownOperation(usize),
}

impl CoverageError {
    /// Create illegal-transition error
    #[inline]
    #[must_use]
    pub fn illegal(from: CoverageState, to: CoverageState) -> Self {
        Self::IllegalTransition { from, to }
    }
}

/// Result alias for coverage operations
pub type CoverageResult<T> = Result<T, CoverageError>;
