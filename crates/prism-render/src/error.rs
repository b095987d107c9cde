//! Error types for the render layer.

use prism_cache::CacheError;
use prism_core::BuildError;
use thiserror::Error;

/// Errors that can occur while rendering a template.
#[derive(Error, Debug)]
pub enum RenderError {
    /// No partial registered under the requested name.
    #[error("Partial not found: {0}")]
    PartialNotFound(String),

    /// The host environment failed to render a partial.
    #[error("Render error: {0}")]
    Render(String),

    /// Cache store failure.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Emission failure.
    #[error("Build error: {0}")]
    Build(#[from] BuildError),
}
