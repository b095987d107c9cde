//! Fragment caching infrastructure for the Prism render pipeline.
//!
//! This crate provides:
//! - `KeyDescriptor` / `expand_cache_key` - Canonical cache key derivation
//! - `CacheOptions` - Per-call cache configuration
//! - `CacheStore` / `BatchCacheStore` - Store seams (single and batch fetch)
//! - `StoredFragment` - Serialized fragment entry with TTL bookkeeping
//! - `MemoryStore` - In-memory store for development and testing
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use prism_cache::{CacheOptions, CacheStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! let options = CacheOptions::new().expires_in(Duration::from_secs(600));
//!
//! let (value, status) = store
//!     .fetch("prism/people/1", &options, &mut || Ok("{\"name\":\"Ada\"}".to_string()))
//!     .unwrap();
//! assert_eq!(value, "{\"name\":\"Ada\"}");
//! assert_eq!(status.to_string(), "MISS");
//! ```

mod error;
mod key;
mod memory;
mod options;
mod store;

pub use error::*;
pub use key::*;
pub use memory::*;
pub use options::*;
pub use store::*;
