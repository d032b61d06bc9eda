//! Shared error types
//!
//! `ValidationError` is produced by the parameter validator and the segment
//! compiler; `ModelError` is the only error the external model collaborator
//! is allowed to raise.

use thiserror::Error;

use crate::model::{DeviceId, ModelVariant};

/// A rejected request field
///
/// Always names the offending field (dotted path for nested fields, e.g.
/// `post_processing.speed`) and the constraint it violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {constraint}")]
pub struct ValidationError {
    pub field: String,
    pub constraint: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            constraint: constraint.into(),
        }
    }

    /// Prefix the field path, used when validating nested objects
    pub fn nested(self, parent: &str) -> Self {
        Self {
            field: format!("{}.{}", parent, self.field),
            constraint: self.constraint,
        }
    }
}

/// Errors raised by the external model collaborator
#[derive(Debug, Error)]
pub enum ModelError {
    /// Loading a model variant onto its device failed
    #[error("failed to load {variant} on {device}: {message}")]
    Load {
        variant: ModelVariant,
        device: DeviceId,
        message: String,
    },

    /// The model raised while generating
    #[error("generation failed: {0}")]
    Generation(String),

    /// The model does not implement the requested capability
    #[error("{0} is not supported by this model")]
    Unsupported(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("text", "is required");
        assert_eq!(err.to_string(), "text: is required");
    }

    #[test]
    fn test_nested_field_path() {
        let err = ValidationError::new("speed", "must be within [0.5, 2.0]").nested("post_processing");
        assert_eq!(err.field, "post_processing.speed");
    }
}
