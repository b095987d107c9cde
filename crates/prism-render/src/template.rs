//! Fragment-cached JSON template facade.

use prism_cache::{
    expand_cache_key, CacheError, CacheOptions, CacheStatus, CacheStore, KeyDescriptor, KeyRule,
    FRAGMENT_NAMESPACE,
};
use prism_core::JsonBuilder;
use serde::Serialize;
use serde_json::Value;

use crate::{Locals, RenderEnv, RenderError, RenderRequest};

/// Counters for cache gate outcomes.
#[derive(Debug, Default, Clone, Copy)]
pub struct GateStats {
    /// Fragments served from the store.
    pub hits: usize,
    /// Fragments computed and stored.
    pub misses: usize,
    /// Gate invocations with caching disabled.
    pub bypasses: usize,
}

/// JSON template with fragment caching and partial dispatch.
///
/// Wraps a [`JsonBuilder`] with a host render environment and an optional
/// backing store. Emission methods mirror the builder; the cache gates and
/// partial dispatch are the value this layer adds.
pub struct JsonTemplate<'e> {
    pub(crate) json: JsonBuilder,
    pub(crate) env: &'e dyn RenderEnv,
    pub(crate) store: Option<&'e dyn CacheStore>,
    pub(crate) stats: GateStats,
}

impl<'e> JsonTemplate<'e> {
    /// Create a template rendering against the given environment, with no
    /// backing store (caching bypassed).
    pub fn new(env: &'e dyn RenderEnv) -> Self {
        Self {
            json: JsonBuilder::new(),
            env,
            store: None,
            stats: GateStats::default(),
        }
    }

    /// Attach a backing fragment store.
    pub fn with_store(mut self, store: &'e dyn CacheStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Gate outcome counters for this template.
    pub fn stats(&self) -> GateStats {
        self.stats
    }

    /// Direct access to the underlying builder.
    pub fn builder(&mut self) -> &mut JsonBuilder {
        &mut self.json
    }

    /// Consume the template and return the completed document.
    pub fn finish(self) -> String {
        self.json.finish()
    }

    // ---- emission (delegated to the builder) ----

    /// Write an attribute name; the next emission becomes its value.
    pub fn attr(&mut self, key: &str) -> Result<(), RenderError> {
        Ok(self.json.attr(key)?)
    }

    /// Set an attribute to a serialized value.
    pub fn set<V: Serialize + ?Sized>(&mut self, key: &str, value: &V) -> Result<(), RenderError> {
        Ok(self.json.set(key, value)?)
    }

    /// Emit a serialized value at the current position.
    pub fn element<V: Serialize + ?Sized>(&mut self, value: &V) -> Result<(), RenderError> {
        Ok(self.json.element(value)?)
    }

    /// Copy the named members of `source` as attributes.
    pub fn extract(&mut self, source: &Value, keys: &[&str]) -> Result<(), RenderError> {
        Ok(self.json.extract(source, keys)?)
    }

    /// Emit an object at the current position, its pairs produced by `f`.
    pub fn object<F>(&mut self, f: F) -> Result<(), RenderError>
    where
        F: FnOnce(&mut Self) -> Result<(), RenderError>,
    {
        self.json.begin_object();
        f(self)?;
        Ok(self.json.end_object()?)
    }

    /// Set an attribute to an object, its pairs produced by `f`.
    pub fn set_with<F>(&mut self, key: &str, f: F) -> Result<(), RenderError>
    where
        F: FnOnce(&mut Self) -> Result<(), RenderError>,
    {
        self.json.attr(key)?;
        self.object(f)
    }

    /// Emit an array of serialized values at the current position.
    pub fn array<V: Serialize>(&mut self, items: &[V]) -> Result<(), RenderError> {
        Ok(self.json.array(items)?)
    }

    /// Set an attribute to an array of serialized values.
    pub fn set_array<V: Serialize>(&mut self, key: &str, items: &[V]) -> Result<(), RenderError> {
        Ok(self.json.set_array(key, items)?)
    }

    /// Emit an array with one object per item, pairs produced by `f`.
    pub fn array_with<F>(&mut self, items: &[Value], mut f: F) -> Result<(), RenderError>
    where
        F: FnMut(&mut Self, &Value) -> Result<(), RenderError>,
    {
        self.json.begin_array();
        for item in items {
            self.json.begin_object();
            f(self, item)?;
            self.json.end_object()?;
        }
        Ok(self.json.end_array()?)
    }

    /// Emit an array of objects holding the named members of each item.
    pub fn array_extract(&mut self, items: &[Value], keys: &[&str]) -> Result<(), RenderError> {
        self.array_with(items, |json, item| json.extract(item, keys))
    }

    /// Run `block` against an isolated frame and return its serialized
    /// text without touching the live output.
    pub fn capture<F>(&mut self, block: F) -> Result<String, RenderError>
    where
        F: FnOnce(&mut Self) -> Result<(), RenderError>,
    {
        self.json.push_capture(false);
        let result = block(self);
        let text = self.json.pop_capture();
        result?;
        Ok(text?)
    }

    // ---- fragment caching ----

    /// Cache the output of `block` under the derived canonical key.
    ///
    /// With caching disabled (environment flag off, or no store attached)
    /// the block runs directly against the live output. Otherwise the
    /// fragment is fetched from the store, the block being invoked inside
    /// a capture only on miss; a hit is merged back into the live builder
    /// state, a fresh computation is spliced as captured.
    pub fn cache<K, F>(
        &mut self,
        key: K,
        options: &CacheOptions,
        block: F,
    ) -> Result<CacheStatus, RenderError>
    where
        K: Into<KeyDescriptor>,
        F: FnOnce(&mut Self) -> Result<(), RenderError>,
    {
        let store = match self.store {
            Some(store) if self.env.caching_enabled() => store,
            _ => {
                block(self)?;
                self.stats.bypasses += 1;
                return Ok(CacheStatus::Bypass);
            }
        };

        let key = self.canonical_key(key.into(), options);
        let mut block_slot = Some(block);
        let mut inner_err: Option<RenderError> = None;

        let result = store.fetch(&key, options, &mut || {
            let block = block_slot
                .take()
                .ok_or_else(|| CacheError::Compute("fragment block invoked twice".to_string()))?;
            self.capture(block).map_err(|e| {
                let message = e.to_string();
                inner_err = Some(e);
                CacheError::Compute(message)
            })
        });

        match result {
            Ok((value, status)) => {
                match status {
                    CacheStatus::Hit => {
                        self.stats.hits += 1;
                        self.json.merge_cached(&value);
                    }
                    _ => {
                        self.stats.misses += 1;
                        self.json.splice_fresh(&value);
                    }
                }
                Ok(status)
            }
            Err(store_err) => Err(match inner_err.take() {
                Some(err) => err,
                None => store_err.into(),
            }),
        }
    }

    /// Cache the block only when `condition` holds; otherwise the block
    /// runs directly with no store interaction at all.
    pub fn cache_if<K, F>(
        &mut self,
        condition: bool,
        key: K,
        options: &CacheOptions,
        block: F,
    ) -> Result<CacheStatus, RenderError>
    where
        K: Into<KeyDescriptor>,
        F: FnOnce(&mut Self) -> Result<(), RenderError>,
    {
        if condition {
            self.cache(key, options, block)
        } else {
            block(self)?;
            Ok(CacheStatus::Bypass)
        }
    }

    /// Derive the canonical store key for a descriptor.
    ///
    /// A literal key override and the version namespace are folded into
    /// the descriptor, the environment's digest-naming capability is
    /// consulted (modern form first, then legacy), and the result is
    /// expanded into the store's native key format.
    pub(crate) fn canonical_key(
        &self,
        mut descriptor: KeyDescriptor,
        options: &CacheOptions,
    ) -> String {
        if let Some(KeyRule::Literal(key)) = &options.key {
            descriptor = descriptor.prepend(key.clone());
        }
        if let Some(namespace) = &options.namespace {
            descriptor = descriptor.prepend(namespace.clone());
        }
        let named = self
            .env
            .cache_fragment_name(&descriptor, options)
            .or_else(|| self.env.fragment_name_with_digest(&descriptor))
            .unwrap_or(descriptor);
        expand_cache_key(&named, FRAGMENT_NAMESPACE)
    }

    // ---- partial dispatch ----

    /// Render a named partial with the given locals.
    ///
    /// The reserved `as` local becomes the per-member binding name and a
    /// `collection` local selects per-member rendering (see
    /// [`RenderRequest::from_name`]).
    pub fn partial(&mut self, name: &str, locals: Locals) -> Result<(), RenderError> {
        self.partial_with(RenderRequest::from_name(name, locals))
    }

    /// Render a normalized partial request.
    ///
    /// With both a binding name and a collection, the partial renders once
    /// per member into a JSON array, each member's locals carrying the
    /// full collection and the member under the binding name. Otherwise a
    /// single render. Either way the partial continues building into this
    /// template's document.
    pub fn partial_with(&mut self, request: RenderRequest) -> Result<(), RenderError> {
        let env = self.env;
        let RenderRequest {
            partial,
            locals,
            as_name,
            collection,
        } = request;

        match (as_name, collection) {
            (Some(as_name), Some(collection)) => {
                tracing::debug!(partial = %partial, members = collection.len(), "collection partial");
                self.json.begin_array();
                for member in &collection {
                    let mut member_locals = locals.clone();
                    member_locals
                        .insert("collection".to_string(), Value::Array(collection.clone()));
                    member_locals.insert(as_name.clone(), member.clone());
                    self.json.begin_object();
                    env.render_partial(&partial, &member_locals, self)?;
                    self.json.end_object()?;
                }
                Ok(self.json.end_array()?)
            }
            _ => {
                tracing::trace!(partial = %partial, "single partial");
                env.render_partial(&partial, &locals, self)
            }
        }
    }

    /// Emit a JSON array from `items`, rendering the named partial per
    /// member when a partial name is given, else serializing the items
    /// directly.
    pub fn array_partial(
        &mut self,
        items: &[Value],
        partial: Option<&str>,
        locals: Locals,
    ) -> Result<(), RenderError> {
        match partial {
            Some(name) => {
                let request =
                    RenderRequest::from_name(name, locals).with_collection(items.to_vec());
                self.partial_with(request)
            }
            None => self.array(items),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use prism_cache::{CacheStore, MemoryStore};
    use serde_json::json;

    use super::*;
    use crate::{locals, PartialRegistry};

    #[test]
    fn test_cache_miss_computes_and_stores() {
        let registry = PartialRegistry::new();
        let store = MemoryStore::new();

        let mut json = JsonTemplate::new(&registry).with_store(&store);
        let status = json
            .cache("people/1", &CacheOptions::new(), |json| {
                json.set("name", "Ada")
            })
            .unwrap();

        assert_eq!(status, CacheStatus::Miss);
        assert_eq!(json.finish(), r#"{"name":"Ada"}"#);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_second_render_is_a_pure_hit() {
        let registry = PartialRegistry::new();
        let store = MemoryStore::new();
        let computes = AtomicUsize::new(0);

        let mut outputs = Vec::new();
        for _ in 0..2 {
            let mut json = JsonTemplate::new(&registry).with_store(&store);
            json.cache("people/1", &CacheOptions::new(), |json| {
                computes.fetch_add(1, Ordering::SeqCst);
                json.set("name", "Ada")
            })
            .unwrap();
            outputs.push(json.finish());
        }

        assert_eq!(outputs[0], outputs[1]);
        assert_eq!(computes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disabled_caching_matches_direct_output() {
        let registry = PartialRegistry::new().with_caching(false);
        let store = MemoryStore::new();

        let mut json = JsonTemplate::new(&registry).with_store(&store);
        let status = json
            .cache("people/1", &CacheOptions::new(), |json| {
                json.set("name", "Ada")
            })
            .unwrap();

        assert_eq!(status, CacheStatus::Bypass);
        assert_eq!(json.finish(), r#"{"name":"Ada"}"#);
        assert!(store.is_empty());
    }

    #[test]
    fn test_no_store_is_a_bypass() {
        let registry = PartialRegistry::new();
        let mut json = JsonTemplate::new(&registry);
        let status = json
            .cache("people/1", &CacheOptions::new(), |json| {
                json.set("name", "Ada")
            })
            .unwrap();

        assert_eq!(status, CacheStatus::Bypass);
        assert_eq!(json.stats().bypasses, 1);
        assert_eq!(json.finish(), r#"{"name":"Ada"}"#);
    }

    #[test]
    fn test_cache_if_false_never_touches_the_store() {
        let registry = PartialRegistry::new();
        let store = MemoryStore::new();

        let mut json = JsonTemplate::new(&registry).with_store(&store);
        json.cache_if(false, "people/1", &CacheOptions::new(), |json| {
            json.set("x", &1)
        })
        .unwrap();

        assert!(store.is_empty());
        assert_eq!(json.finish(), r#"{"x":1}"#);
    }

    #[test]
    fn test_cache_if_true_behaves_as_cache() {
        let registry = PartialRegistry::new();
        let store = MemoryStore::new();

        let mut json = JsonTemplate::new(&registry).with_store(&store);
        let status = json
            .cache_if(true, "people/1", &CacheOptions::new(), |json| {
                json.set("x", &1)
            })
            .unwrap();

        assert_eq!(status, CacheStatus::Miss);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_cache_inside_attribute_position() {
        let registry = PartialRegistry::new();
        let store = MemoryStore::new();

        for _ in 0..2 {
            let mut json = JsonTemplate::new(&registry).with_store(&store);
            json.set("id", &7).unwrap();
            json.set_with("person", |json| {
                json.cache("people/7", &CacheOptions::new(), |json| {
                    json.set("name", "Ada")
                })?;
                Ok(())
            })
            .unwrap();
            assert_eq!(json.finish(), r#"{"id":7,"person":{"name":"Ada"}}"#);
        }
    }

    #[test]
    fn test_expired_fragment_is_recomputed() {
        let registry = PartialRegistry::new();
        let store = MemoryStore::new();
        let options = CacheOptions::new().expires_in(Duration::from_secs(60));

        let mut json = JsonTemplate::new(&registry).with_store(&store);
        json.cache("people/1", &options, |json| json.set("name", "Ada"))
            .unwrap();

        // Age the stored entry past its TTL.
        let key = "prism/people/1";
        let mut entry = store.read(key).unwrap().unwrap();
        entry.created_at -= 120;
        store.write(key, entry).unwrap();

        let mut json = JsonTemplate::new(&registry).with_store(&store);
        let status = json
            .cache("people/1", &options, |json| json.set("name", "Ada"))
            .unwrap();
        assert_eq!(status, CacheStatus::Miss);
    }

    #[test]
    fn test_resource_descriptor_strips_scheme_from_key() {
        let registry = PartialRegistry::new();
        let store = MemoryStore::new();

        let mut json = JsonTemplate::new(&registry).with_store(&store);
        json.cache(
            KeyDescriptor::Resource("https://example.com/people/5".into()),
            &CacheOptions::new(),
            |json| json.set("name", "Ada"),
        )
        .unwrap();

        assert!(store
            .read("prism/example.com/people/5")
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_canonical_key_is_stable() {
        let registry = PartialRegistry::new();
        let json = JsonTemplate::new(&registry);
        let options = CacheOptions::new().namespace("v2");

        let first = json.canonical_key(KeyDescriptor::from("people/1"), &options);
        let second = json.canonical_key(KeyDescriptor::from("people/1"), &options);
        assert_eq!(first, second);
        assert_eq!(first, "prism/v2/people/1");
    }

    struct DigestEnv {
        modern: bool,
        legacy: bool,
    }

    impl RenderEnv for DigestEnv {
        fn render_partial(
            &self,
            name: &str,
            _locals: &Locals,
            _json: &mut JsonTemplate<'_>,
        ) -> Result<(), RenderError> {
            Err(RenderError::PartialNotFound(name.to_string()))
        }

        fn cache_fragment_name(
            &self,
            key: &KeyDescriptor,
            _options: &CacheOptions,
        ) -> Option<KeyDescriptor> {
            self.modern.then(|| key.clone().prepend("modern"))
        }

        fn fragment_name_with_digest(&self, key: &KeyDescriptor) -> Option<KeyDescriptor> {
            self.legacy.then(|| key.clone().prepend("legacy"))
        }
    }

    #[test]
    fn test_digest_capability_precedence() {
        let options = CacheOptions::new();
        let descriptor = || KeyDescriptor::from("k");

        let both = DigestEnv { modern: true, legacy: true };
        let json = JsonTemplate::new(&both);
        assert_eq!(json.canonical_key(descriptor(), &options), "prism/modern/k");

        let legacy_only = DigestEnv { modern: false, legacy: true };
        let json = JsonTemplate::new(&legacy_only);
        assert_eq!(json.canonical_key(descriptor(), &options), "prism/legacy/k");

        let neither = DigestEnv { modern: false, legacy: false };
        let json = JsonTemplate::new(&neither);
        assert_eq!(json.canonical_key(descriptor(), &options), "prism/k");
    }

    #[test]
    fn test_partial_single_render() {
        let mut registry = PartialRegistry::new();
        registry.register("person", |json, locals| {
            let person = locals.get("person").cloned().unwrap_or(Value::Null);
            json.extract(&person, &["name"])
        });

        let mut json = JsonTemplate::new(&registry);
        json.partial("person", locals(json!({"person": {"name": "Ada"}})))
            .unwrap();
        assert_eq!(json.finish(), r#"{"name":"Ada"}"#);
    }

    #[test]
    fn test_partial_collection_renders_each_member() {
        let mut registry = PartialRegistry::new();
        registry.register("item", |json, locals| {
            let n = locals.get("n").cloned().unwrap_or(Value::Null);
            let total = locals
                .get("collection")
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0);
            json.set("n", &n)?;
            json.set("of", &total)
        });

        let mut json = JsonTemplate::new(&registry);
        json.partial("item", locals(json!({"collection": [1, 2, 3], "as": "n"})))
            .unwrap();
        assert_eq!(
            json.finish(),
            r#"[{"n":1,"of":3},{"n":2,"of":3},{"n":3,"of":3}]"#
        );
    }

    #[test]
    fn test_array_partial_without_partial_serializes_items() {
        let registry = PartialRegistry::new();
        let mut json = JsonTemplate::new(&registry);
        json.array_partial(&[json!(1), json!(2)], None, Locals::new())
            .unwrap();
        assert_eq!(json.finish(), "[1,2]");
    }

    #[test]
    fn test_array_partial_delegates_to_dispatch() {
        let mut registry = PartialRegistry::new();
        registry.register("n", |json, locals| {
            json.set("n", locals.get("n").unwrap_or(&Value::Null))
        });

        let mut json = JsonTemplate::new(&registry);
        json.array_partial(
            &[json!(1), json!(2)],
            Some("n"),
            locals(json!({"as": "n"})),
        )
        .unwrap();
        assert_eq!(json.finish(), r#"[{"n":1},{"n":2}]"#);
    }

    #[test]
    fn test_missing_partial_is_an_error() {
        let registry = PartialRegistry::new();
        let mut json = JsonTemplate::new(&registry);
        let err = json.partial("nope", Locals::new()).unwrap_err();
        assert!(matches!(err, RenderError::PartialNotFound(_)));
    }

    #[test]
    fn test_render_error_passes_through_the_gate() {
        let registry = PartialRegistry::new();
        let store = MemoryStore::new();

        let mut json = JsonTemplate::new(&registry).with_store(&store);
        let err = json
            .cache("people/1", &CacheOptions::new(), |json| {
                json.partial("nope", Locals::new())
            })
            .unwrap_err();

        assert!(matches!(err, RenderError::PartialNotFound(_)));
        assert!(store.is_empty());
    }
}
