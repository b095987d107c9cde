//! In-memory fragment store for development and testing.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::{
    BatchCacheStore, CacheError, CacheOptions, CacheResult, CacheStore, MultiFetchResult,
    StoredFragment,
};

/// In-memory fragment store.
///
/// Honors TTL at read time and supports batch fetch. The mutex is released
/// around compute callbacks, so reentrant fetches from nested cache gates
/// do not deadlock.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredFragment>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.values().filter(|e| !e.is_expired()).count())
            .unwrap_or(0)
    }

    /// Whether the store holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    fn lock(&self) -> CacheResult<std::sync::MutexGuard<'_, HashMap<String, StoredFragment>>> {
        self.entries
            .lock()
            .map_err(|e| CacheError::Storage(e.to_string()))
    }
}

impl CacheStore for MemoryStore {
    fn read(&self, key: &str) -> CacheResult<Option<StoredFragment>> {
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some(fragment) if fragment.is_expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(fragment) => Ok(Some(fragment.clone())),
            None => Ok(None),
        }
    }

    fn write(&self, key: &str, fragment: StoredFragment) -> CacheResult<()> {
        self.lock()?.insert(key.to_string(), fragment);
        Ok(())
    }

    fn as_batch(&self) -> Option<&dyn BatchCacheStore> {
        Some(self)
    }
}

impl BatchCacheStore for MemoryStore {
    fn fetch_multi(
        &self,
        keys: &[String],
        options: &CacheOptions,
        compute: &mut dyn FnMut(&str) -> CacheResult<String>,
    ) -> CacheResult<MultiFetchResult> {
        let mut results = Vec::with_capacity(keys.len());
        let mut misses = 0usize;

        for key in keys {
            let cached = self.read(key)?;
            let value = match cached {
                Some(fragment) => fragment.content,
                None => {
                    misses += 1;
                    let content = compute(key)?;
                    self.write(
                        key,
                        StoredFragment::new(content.clone(), options.expires_in),
                    )?;
                    content
                }
            };
            results.push((key.clone(), value));
        }

        tracing::debug!(
            requested = keys.len(),
            misses,
            "batch fragment fetch"
        );
        Ok(MultiFetchResult::Mapped(results))
    }
}
