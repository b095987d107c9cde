//! Core emission primitives for the Prism render pipeline.
//!
//! This crate provides:
//! - `OutputSink` - Frame-based serialized output buffer
//! - `JsonBuilder` - Incremental JSON document builder
//! - `BuildError` - Emission error type
//!
//! Higher layers (fragment caching, partial dispatch) live in
//! `prism-render`; storage seams live in `prism-cache`.

mod builder;
mod error;
mod sink;

pub use builder::*;
pub use error::*;
pub use sink::*;
