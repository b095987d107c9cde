//! Collection-oriented batch fragment caching.

use std::collections::HashMap;

use prism_cache::{CacheError, CacheKeySource, CacheOptions};
use serde_json::Value;

use crate::{JsonTemplate, RenderError};

/// Insertion-ordered mapping from canonical cache key to source item.
///
/// Built freshly per batch invocation. Duplicate canonical keys are
/// last-write-wins: the later item replaces the earlier one, the key keeps
/// its first-insertion position. Callers wanting every item stored must
/// ensure key derivation is injective over the collection.
pub struct KeyedItems<'a> {
    keys: Vec<String>,
    map: HashMap<String, &'a Value>,
}

impl<'a> KeyedItems<'a> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            map: HashMap::new(),
        }
    }

    /// Insert a key/item pair (last write wins on duplicates).
    pub fn insert(&mut self, key: String, item: &'a Value) {
        if self.map.insert(key.clone(), item).is_none() {
            self.keys.push(key);
        }
    }

    /// Look up the item for a canonical key.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).copied()
    }

    /// Canonical keys in insertion order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterate key/item pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &'a Value)> + '_ {
        self.keys
            .iter()
            .filter_map(|key| self.map.get(key).map(|item| (key.as_str(), *item)))
    }
}

impl<'a> Default for KeyedItems<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'e> JsonTemplate<'e> {
    /// Cache one fragment per collection item, emitting a JSON array.
    ///
    /// With caching disabled this is plain array rendering via `block`.
    /// Otherwise the canonical key for every item is derived up front and
    /// the whole set is resolved through the store's batch fetch when it
    /// has one, or sequential per-key fetches when it does not; either way
    /// misses are computed via `block` inside an element capture. Fragment
    /// order follows the collection regardless of which keys hit.
    pub fn cache_collection<F>(
        &mut self,
        items: &[Value],
        mut options: CacheOptions,
        mut block: F,
    ) -> Result<(), RenderError>
    where
        F: FnMut(&mut Self, &Value) -> Result<(), RenderError>,
    {
        let store = match self.store {
            Some(store) if self.env.caching_enabled() => store,
            _ => {
                self.stats.bypasses += 1;
                return self.array_with(items, block);
            }
        };

        self.json.begin_array();

        let rule = options.take_key();
        let mut keyed = KeyedItems::new();
        for item in items {
            let descriptor = match &rule {
                Some(rule) => item.key_descriptor().prepend(rule.apply(item)),
                None => item.key_descriptor(),
            };
            keyed.insert(self.canonical_key(descriptor, &options), item);
        }

        let computed_before = self.stats.misses;
        let mut inner_err: Option<RenderError> = None;

        let fragments: Vec<String> = match store.as_batch() {
            Some(batch) => {
                let result = batch.fetch_multi(keyed.keys(), &options, &mut |key| {
                    let item = keyed
                        .get(key)
                        .ok_or_else(|| CacheError::Compute(format!("no item for key {key}")))?;
                    self.capture_element(item, &mut block).map_err(|e| {
                        let message = e.to_string();
                        inner_err = Some(e);
                        CacheError::Compute(message)
                    })
                });
                match result {
                    Ok(multi) => multi.into_ordered(),
                    Err(store_err) => {
                        return Err(match inner_err.take() {
                            Some(err) => err,
                            None => store_err.into(),
                        })
                    }
                }
            }
            None => {
                let mut out = Vec::with_capacity(keyed.len());
                for (key, item) in keyed.iter() {
                    let result = store.fetch(key, &options, &mut || {
                        self.capture_element(item, &mut block).map_err(|e| {
                            let message = e.to_string();
                            inner_err = Some(e);
                            CacheError::Compute(message)
                        })
                    });
                    match result {
                        Ok((value, _status)) => out.push(value),
                        Err(store_err) => {
                            return Err(match inner_err.take() {
                                Some(err) => err,
                                None => store_err.into(),
                            })
                        }
                    }
                }
                out
            }
        };

        let computed = self.stats.misses - computed_before;
        self.stats.hits += keyed.len() - computed;

        self.json.splice_raw(&fragments.join(","));
        Ok(self.json.end_array()?)
    }

    /// Compute one collection element: run `block` inside a continuing
    /// capture, wrapped as an object, and strip the leading element
    /// separator so stored fragments join cleanly.
    fn capture_element<F>(&mut self, item: &Value, block: &mut F) -> Result<String, RenderError>
    where
        F: FnMut(&mut Self, &Value) -> Result<(), RenderError>,
    {
        self.stats.misses += 1;
        self.json.push_capture(true);
        self.json.begin_object();
        let result = block(self, item);
        let closed = match result {
            Ok(()) => self.json.end_object().map_err(RenderError::from),
            Err(err) => Err(err),
        };
        let text = self.json.pop_capture();
        closed?;
        let text = text?;
        Ok(text.strip_prefix(',').unwrap_or(&text).to_string())
    }
}
