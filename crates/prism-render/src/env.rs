//! Host render environment seam.

use std::collections::HashMap;

use prism_cache::{CacheOptions, KeyDescriptor};

use crate::{JsonTemplate, Locals, RenderError};

/// Host environment the template renders against.
///
/// The environment resolves named partials and owns the caching-enabled
/// flag. The two digest-naming methods are optional capabilities: the
/// modern two-argument form is consulted first, then the legacy
/// one-argument form; environments without either return `None` from both
/// and the key descriptor is used verbatim.
pub trait RenderEnv {
    /// Render the named partial, emitting into the given template.
    fn render_partial(
        &self,
        name: &str,
        locals: &Locals,
        json: &mut JsonTemplate<'_>,
    ) -> Result<(), RenderError>;

    /// Whether fragment caching is enabled.
    fn caching_enabled(&self) -> bool {
        true
    }

    /// Modern digest-naming capability (two-argument form).
    fn cache_fragment_name(
        &self,
        _key: &KeyDescriptor,
        _options: &CacheOptions,
    ) -> Option<KeyDescriptor> {
        None
    }

    /// Legacy digest-naming capability (one-argument form).
    fn fragment_name_with_digest(&self, _key: &KeyDescriptor) -> Option<KeyDescriptor> {
        None
    }
}

type PartialFn =
    Box<dyn for<'a> Fn(&mut JsonTemplate<'a>, &Locals) -> Result<(), RenderError> + Send + Sync>;

/// Closure-backed partial registry.
///
/// The simplest useful [`RenderEnv`]: partial bodies are Rust closures
/// registered under a name. Used by the CLI and throughout the tests.
pub struct PartialRegistry {
    partials: HashMap<String, PartialFn>,
    caching: bool,
}

impl Default for PartialRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialRegistry {
    /// Create an empty registry with caching enabled.
    pub fn new() -> Self {
        Self {
            partials: HashMap::new(),
            caching: true,
        }
    }

    /// Set the caching-enabled flag.
    pub fn with_caching(mut self, enabled: bool) -> Self {
        self.caching = enabled;
        self
    }

    /// Register a partial body under a name.
    pub fn register<F>(&mut self, name: impl Into<String>, body: F)
    where
        F: for<'a> Fn(&mut JsonTemplate<'a>, &Locals) -> Result<(), RenderError>
            + Send
            + Sync
            + 'static,
    {
        self.partials.insert(name.into(), Box::new(body));
    }

    /// Number of registered partials.
    pub fn len(&self) -> usize {
        self.partials.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.partials.is_empty()
    }
}

impl RenderEnv for PartialRegistry {
    fn render_partial(
        &self,
        name: &str,
        locals: &Locals,
        json: &mut JsonTemplate<'_>,
    ) -> Result<(), RenderError> {
        tracing::trace!(partial = name, "render partial");
        let body = self
            .partials
            .get(name)
            .ok_or_else(|| RenderError::PartialNotFound(name.to_string()))?;
        body(json, locals)
    }

    fn caching_enabled(&self) -> bool {
        self.caching
    }
}
