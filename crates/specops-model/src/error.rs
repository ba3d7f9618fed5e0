//! Specification error taxonomy
//!
//! [`SpecError`] is fatal to loading (or merging) a document, never to the
//! process. Every variant carries enough context to point an analyst at the
//! offending part of the document.

/// Errors raised while loading a specification or merging its schemas
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecError {
    /// Document could not be parsed or violates structural rules
    #[error("malformed document: {0}")]
    Malformed(String),

    /// Document version marker missing or not supported
    #[error("unsupported specification version: {0}")]
    UnsupportedVersion(String),

    /// `$ref` target missing or outside the document
    #[error("unresolvable reference: {pointer}")]
    UnresolvableReference { pointer: String },

    /// Schema constraints that no value can satisfy
    #[error("conflicting constraints at {field}: {reason}")]
    ConflictingConstraints { field: String, reason: String },
}

impl SpecError {
    /// Create malformed-document error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Create unresolvable-reference error
    pub fn unresolvable(pointer: impl Into<String>) -> Self {
        Self::UnresolvableReference {
            pointer: pointer.into(),
        }
    }

    /// Create conflicting-constraints error
    pub fn conflict(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConflictingConstraints {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias for specification operations
pub type SpecResult<T> = Result<T, SpecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            SpecError::malformed("paths is not an object").to_string(),
            "malformed document: paths is not an object"
        );
        assert_eq!(
            SpecError::unresolvable("#/components/schemas/Missing").to_string(),
            "unresolvable reference: #/components/schemas/Missing"
        );
        assert_eq!(
            SpecError::conflict("body.name", "type string conflicts with integer").to_string(),
            "conflicting constraints at body.name: type string conflicts with integer"
        );
    }
}
