use crate::types::RequestStatus;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by the comic pipeline and its components.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Low-level HTTP transport failure (connection refused, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON parsing failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// A pipeline stage failed with a descriptive message.
    #[error("Stage '{stage}' failed: {message}")]
    StageFailed { stage: String, message: String },

    /// A brief was rejected before any request was allocated.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No tracked request exists for the identifier.
    #[error("Request not found: {0}")]
    NotFound(String),

    /// A lifecycle transition that the state machine does not allow.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    /// An upstream call returned successfully but carried no usable output.
    #[error("Empty output from {0}")]
    EmptyOutput(String),

    /// A single upstream attempt exceeded its time budget.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid configuration detected at startup.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// HTTP error with status code, response body, and optional Retry-After hint.
    ///
    /// Returned by [`Backend`](crate::backend::Backend) and
    /// [`ImageBackend`](crate::image::ImageBackend) implementations when the
    /// provider returns a non-success status code.
    #[error("HTTP {status}: {body}")]
    HttpError {
        /// HTTP status code (e.g. 429, 500, 503).
        status: u16,
        /// Response body text.
        body: String,
        /// Parsed `Retry-After` header value, if present.
        retry_after: Option<Duration>,
    },

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
