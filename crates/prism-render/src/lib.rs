//! Fragment-cached JSON template rendering.
//!
//! This crate provides:
//! - `JsonTemplate` - JSON builder facade with fragment cache gates
//! - `RenderEnv` / `PartialRegistry` - Host environment seam
//! - `RenderRequest` / `Locals` - Normalized partial invocations
//! - `KeyedItems` - Canonical-key-to-item mapping for batch caching
//!
//! # Example
//!
//! ```
//! use prism_cache::{CacheOptions, MemoryStore};
//! use prism_render::{JsonTemplate, PartialRegistry};
//!
//! let registry = PartialRegistry::new();
//! let store = MemoryStore::new();
//!
//! let mut json = JsonTemplate::new(&registry).with_store(&store);
//! json.cache("greeting", &CacheOptions::new(), |json| {
//!     json.set("hello", "world")
//! })
//! .unwrap();
//!
//! assert_eq!(json.finish(), r#"{"hello":"world"}"#);
//! ```

mod batch;
mod env;
mod error;
mod request;
mod template;

pub use batch::*;
pub use env::*;
pub use error::*;
pub use request::*;
pub use template::*;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        locals, GateStats, JsonTemplate, KeyedItems, Locals, PartialRegistry, RenderEnv,
        RenderError, RenderRequest,
    };
    pub use prism_cache::{CacheOptions, CacheStatus, KeyDescriptor, MemoryStore};
    pub use prism_core::JsonBuilder;
}
