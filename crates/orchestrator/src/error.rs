//! Orchestrator error taxonomy
//!
//! Lower layers raise their own typed errors; this is the only place they
//! are folded into the user-visible categories.

use thiserror::Error;
use voicegate_core::{AudioId, ModelError, ValidationError};
use voicegate_pipeline::{AudioError, MarkupError, PipelineError};

/// Coarse error category, one per user-visible failure class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Client-caused, names the offending field
    Validation,
    /// Reference audio or job missing, including expired jobs
    NotFound,
    /// Dialogue markup could not be compiled
    Markup,
    /// The model raised while loading or generating
    Generation,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Markup => "markup",
            ErrorKind::Generation => "generation",
            ErrorKind::Internal => "internal",
        }
    }
}

#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Reference audio not found: {0}")]
    ReferenceNotFound(AudioId),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid markup: {0}")]
    Markup(#[from] MarkupError),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SynthesisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SynthesisError::Validation(_) => ErrorKind::Validation,
            SynthesisError::ReferenceNotFound(_) | SynthesisError::JobNotFound(_) => {
                ErrorKind::NotFound
            }
            SynthesisError::Markup(_) => ErrorKind::Markup,
            SynthesisError::Generation(_) => ErrorKind::Generation,
            SynthesisError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to show a client
    ///
    /// Generation and internal failures are reported generically; the
    /// detail is only logged.
    pub fn client_message(&self) -> String {
        match self.kind() {
            ErrorKind::Generation => "generation failed".to_string(),
            ErrorKind::Internal => "internal error".to_string(),
            _ => self.to_string(),
        }
    }

    /// The offending field, for validation errors
    pub fn field(&self) -> Option<&str> {
        match self {
            SynthesisError::Validation(e) => Some(&e.field),
            _ => None,
        }
    }
}

impl From<ModelError> for SynthesisError {
    fn from(err: ModelError) -> Self {
        SynthesisError::Generation(err.to_string())
    }
}

impl From<AudioError> for SynthesisError {
    fn from(err: AudioError) -> Self {
        SynthesisError::Internal(err.to_string())
    }
}

impl From<PipelineError> for SynthesisError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(e) => e.into(),
            PipelineError::Markup(e) => e.into(),
            PipelineError::Audio(e) => e.into(),
            PipelineError::Model(e) => e.into(),
            e @ PipelineError::VariantNotHosted { .. } => SynthesisError::Internal(e.to_string()),
        }
    }
}
