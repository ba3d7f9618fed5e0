//! Error types for SpecOps sessions

use crate::session::SessionId;
use specops_coverage::CoverageError;
use specops_model::SpecError;
use specops_synth::SynthesisError;

/// Main session error type
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Specification could not be loaded
    #[error("specification error: {0}")]
    Spec(#[from] SpecError),

    /// Request synthesis failed
    #[error("synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    /// Coverage bookkeeping failed
    #[error("coverage error: {0}")]
    Coverage(#[from] CoverageError),

    /// Configuration file invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// Reading a file failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// No session under this id
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),
}

impl SessionError {
    /// Create configuration error
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether the error stems from the specification document itself
    #[inline]
    #[must_use]
    pub fn is_spec_error(&self) -> bool {
        matches!(self, Self::Spec(_))
    }
}

impl From<toml::de::Error> for SessionError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

/// Result alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;
