//! Error types for the builder layer.

use thiserror::Error;

/// Errors that can occur while emitting output.
#[derive(Error, Debug)]
pub enum BuildError {
    /// A value failed to serialize to JSON.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A scope was closed without a matching open.
    #[error("Scope underflow: {0}")]
    ScopeUnderflow(String),

    /// A capture frame was popped without a matching push.
    #[error("Capture underflow")]
    CaptureUnderflow,
}
