//! Store seams for fragment caching.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::{CacheOptions, CacheResult};

/// Status of a cache gate operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Fragment served from the store.
    Hit,
    /// Fragment computed and stored.
    Miss,
    /// Caching disabled, fragment computed directly.
    Bypass,
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hit => write!(f, "HIT"),
            Self::Miss => write!(f, "MISS"),
            Self::Bypass => write!(f, "BYPASS"),
        }
    }
}

/// A stored fragment entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFragment {
    /// The serialized fragment text.
    pub content: String,
    /// When the entry was created (seconds since epoch).
    pub created_at: u64,
    /// Time-to-live in seconds; `None` never expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_secs: Option<u64>,
}

impl StoredFragment {
    /// Create a new entry stamped now.
    pub fn new(content: impl Into<String>, ttl: Option<Duration>) -> Self {
        Self {
            content: content.into(),
            created_at: current_timestamp(),
            expires_in_secs: ttl.map(|d| d.as_secs()),
        }
    }

    /// Check if the entry has expired.
    pub fn is_expired(&self) -> bool {
        match self.expires_in_secs {
            Some(ttl) => current_timestamp() > self.created_at + ttl,
            None => false,
        }
    }

    /// Get remaining TTL in seconds; `None` never expires.
    pub fn remaining_ttl(&self) -> Option<u64> {
        self.expires_in_secs.map(|ttl| {
            let expires_at = self.created_at + ttl;
            expires_at.saturating_sub(current_timestamp())
        })
    }
}

/// Result of a batch fetch, either key-mapped or already ordered.
#[derive(Debug)]
pub enum MultiFetchResult {
    /// Key/value pairs in the order established by the fetch call.
    Mapped(Vec<(String, String)>),
    /// Values already in fetch order.
    Ordered(Vec<String>),
}

impl MultiFetchResult {
    /// Normalize into an ordered sequence of fragment strings.
    pub fn into_ordered(self) -> Vec<String> {
        match self {
            Self::Mapped(pairs) => pairs.into_iter().map(|(_, value)| value).collect(),
            Self::Ordered(values) => values,
        }
    }
}

/// Backing fragment store with fetch-or-compute semantics.
///
/// `compute` is invoked only on a miss; its result is stored under the key
/// and returned. Implementations must tolerate reentrant fetches from
/// inside the compute callback, since computing one fragment may cache
/// nested fragments of its own.
pub trait CacheStore {
    /// Read a stored entry.
    fn read(&self, key: &str) -> CacheResult<Option<StoredFragment>>;

    /// Store an entry.
    fn write(&self, key: &str, fragment: StoredFragment) -> CacheResult<()>;

    /// Fetch the fragment under `key`, computing and storing it on miss.
    fn fetch(
        &self,
        key: &str,
        options: &CacheOptions,
        compute: &mut dyn FnMut() -> CacheResult<String>,
    ) -> CacheResult<(String, CacheStatus)> {
        match self.read(key)? {
            Some(fragment) if !fragment.is_expired() => {
                tracing::debug!(key, status = %CacheStatus::Hit, "fragment fetch");
                Ok((fragment.content, CacheStatus::Hit))
            }
            _ => {
                tracing::debug!(key, status = %CacheStatus::Miss, "fragment fetch");
                let content = compute()?;
                self.write(key, StoredFragment::new(content.clone(), options.expires_in))?;
                Ok((content, CacheStatus::Miss))
            }
        }
    }

    /// Batch-fetch capability, if this store supports it.
    fn as_batch(&self) -> Option<&dyn BatchCacheStore> {
        None
    }
}

/// A store that can resolve many keys in one round trip.
pub trait BatchCacheStore: CacheStore {
    /// Fetch all `keys` as one logical unit: present keys are returned,
    /// missing keys are computed via `compute`, stored, and returned.
    fn fetch_multi(
        &self,
        keys: &[String],
        options: &CacheOptions,
        compute: &mut dyn FnMut(&str) -> CacheResult<String>,
    ) -> CacheResult<MultiFetchResult>;
}

/// Adapter hiding a store's batch capability.
///
/// Useful where the batch path must be avoided, and in tests of the
/// sequential fallback.
pub struct SingleFetch<S: CacheStore>(S);

impl<S: CacheStore> SingleFetch<S> {
    /// Wrap a store, exposing only single-key fetch.
    pub fn new(store: S) -> Self {
        Self(store)
    }

    /// Unwrap the inner store.
    pub fn into_inner(self) -> S {
        self.0
    }
}

impl<S: CacheStore> CacheStore for SingleFetch<S> {
    fn read(&self, key: &str) -> CacheResult<Option<StoredFragment>> {
        self.0.read(key)
    }

    fn write(&self, key: &str, fragment: StoredFragment) -> CacheResult<()> {
        self.0.write(key, fragment)
    }
}

// Helper to get current timestamp (seconds since epoch)
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_without_ttl_never_expires() {
        let fragment = StoredFragment::new("{}", None);
        assert!(!fragment.is_expired());
        assert_eq!(fragment.remaining_ttl(), None);
    }

    #[test]
    fn test_fragment_expiry() {
        let mut fragment = StoredFragment::new("{}", Some(Duration::from_secs(10)));
        assert!(!fragment.is_expired());

        fragment.created_at -= 60;
        assert!(fragment.is_expired());
        assert_eq!(fragment.remaining_ttl(), Some(0));
    }

    #[test]
    fn test_multi_fetch_normalization() {
        let mapped = MultiFetchResult::Mapped(vec![
            ("k1".into(), "a".into()),
            ("k2".into(), "b".into()),
        ]);
        assert_eq!(mapped.into_ordered(), vec!["a", "b"]);

        let ordered = MultiFetchResult::Ordered(vec!["a".into(), "b".into()]);
        assert_eq!(ordered.into_ordered(), vec!["a", "b"]);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(CacheStatus::Hit.to_string(), "HIT");
        assert_eq!(CacheStatus::Miss.to_string(), "MISS");
        assert_eq!(CacheStatus::Bypass.to_string(), "BYPASS");
    }
}
