//! Error taxonomy for templates, pipelines, and model backends.
//!
//! Construction-time problems (`TemplateError`, `PipelineError`) are kept apart
//! from run-time failures (`ChainError`) so a pipeline that builds is known to
//! be well-formed before any model is called.
use std::time::Duration;

use thiserror::Error;

/// Errors raised while parsing a prompt template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// Unbalanced or invalid brace usage in the pattern.
    #[error("template '{template}': {reason} at byte {offset}")]
    Malformed {
        template: String,
        offset: usize,
        reason: &'static str,
    },

    /// The pattern references a field that was not declared.
    #[error("template '{template}' uses undeclared placeholder {{{field}}}")]
    UndeclaredPlaceholder { template: String, field: String },

    /// A declared field never appears in the pattern.
    #[error("template '{template}' declares field '{field}' but never uses it")]
    UnusedField { template: String, field: String },

    /// The same field was declared twice.
    #[error("template '{template}' declares field '{field}' more than once")]
    DuplicateField { template: String, field: String },
}

/// Errors raised while assembling a pipeline from steps.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("pipeline has no steps")]
    Empty,

    /// A step template needs a field nothing upstream provides.
    #[error("step {step} ('{template}') needs field '{field}' which no input or earlier step provides")]
    UnboundField {
        step: usize,
        template: String,
        field: String,
    },

    /// A step output would silently replace an existing bundle key.
    #[error("step {step} output key '{key}' collides with an existing bundle key")]
    OutputCollision { step: usize, key: String },

    #[error("step {step} has an empty output key")]
    EmptyOutputKey { step: usize },
}

/// Failures reported by a model backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not be reached at all.
    #[error("{backend} is unavailable: {reason}")]
    Unavailable { backend: String, reason: String },

    /// No response arrived within the configured duration.
    #[error("{backend} did not respond within {}s", .after.as_secs_f64())]
    Timeout { backend: String, after: Duration },

    /// The backend answered but refused the request.
    #[error("{backend} rejected the request with status {status}: {message}")]
    Rejected {
        backend: String,
        status: u16,
        message: String,
    },

    /// The backend answered with something that is not a usable completion.
    #[error("{backend} returned an invalid response: {reason}")]
    InvalidResponse { backend: String, reason: String },

    /// A local model command exited unsuccessfully.
    #[error("model command '{command}' failed with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
}

impl BackendError {
    /// Whether a later attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable { .. } | Self::Timeout { .. } => true,
            Self::Rejected { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::InvalidResponse { .. } | Self::CommandFailed { .. } => false,
        }
    }
}

/// Failures of a pipeline run.
#[derive(Debug, Error)]
pub enum ChainError {
    /// A required field is absent from the bundle.
    #[error("missing field '{field}' required by {context}")]
    MissingField { field: String, context: String },

    /// The initial bundle already holds a key a non-overwriting step writes.
    #[error("input field '{key}' would be overwritten by step {step}")]
    OutputCollision { step: usize, key: String },

    #[error(transparent)]
    Backend(#[from] BackendError),
}
