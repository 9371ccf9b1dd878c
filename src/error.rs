// Error types for the canvas-cache library.
// Covers cache argument/merge errors and Canvas API transport errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanvasError {
    /// A single-fetch call was made without an identity argument.
    #[error("{operation}() missing required identity argument")]
    MissingArgument { operation: &'static str },

    /// An identity argument of an unsupported shape was passed.
    #[error("identity argument must be an integer id or a Canvas object, got {found:?}")]
    InvalidArgument { found: String },

    /// Two parameter sets disagree on a non-exempt scalar key.
    #[error("cannot merge parameter {key:?}: {previous:?} conflicts with {incoming:?}")]
    ParameterConflict {
        key: String,
        previous: String,
        incoming: String,
    },

    #[error("Canvas API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Authentication failed: invalid or expired access token")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded, retry after {retry_after}")]
    RateLimited { retry_after: String },

    #[error("Missing CANVAS_ACCESS_TOKEN environment variable")]
    MissingToken,

    #[error("Missing CANVAS_BASE_URL environment variable")]
    MissingBaseUrl,

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CanvasError>;
