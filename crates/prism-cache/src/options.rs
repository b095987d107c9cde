//! Per-call cache configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde_json::Value;

/// Rule deriving the per-item sub-key for batch caching.
pub enum KeyRule {
    /// Fixed sub-key applied to every item (a version tag, typically).
    Literal(String),
    /// Sub-key computed from each item.
    PerItem(Box<dyn Fn(&Value) -> String + Send + Sync>),
}

impl KeyRule {
    /// Evaluate the rule against an item.
    pub fn apply(&self, item: &Value) -> String {
        match self {
            Self::Literal(key) => key.clone(),
            Self::PerItem(f) => f(item),
        }
    }
}

impl fmt::Debug for KeyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(key) => f.debug_tuple("Literal").field(key).finish(),
            Self::PerItem(_) => f.write_str("PerItem(..)"),
        }
    }
}

/// Options accepted by the cache gates.
///
/// Recognized options are explicit fields; anything store-specific rides
/// along in `extra` untouched.
#[derive(Debug, Default)]
pub struct CacheOptions {
    /// Time-to-live for stored fragments.
    pub expires_in: Option<Duration>,
    /// Per-call key override or per-item key rule.
    pub key: Option<KeyRule>,
    /// Version tag folded into the key descriptor.
    pub namespace: Option<String>,
    /// Store-specific passthrough options.
    pub extra: BTreeMap<String, Value>,
}

impl CacheOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fragment time-to-live.
    pub fn expires_in(mut self, ttl: Duration) -> Self {
        self.expires_in = Some(ttl);
        self
    }

    /// Set a literal key override.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(KeyRule::Literal(key.into()));
        self
    }

    /// Set a per-item key rule.
    pub fn key_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.key = Some(KeyRule::PerItem(Box::new(f)));
        self
    }

    /// Set the version namespace tag.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Attach a store-specific passthrough option.
    pub fn extra(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Remove and return the key rule.
    ///
    /// The batch mapper consumes the rule before per-item derivation so it
    /// is not re-applied by the store layer.
    pub fn take_key(&mut self) -> Option<KeyRule> {
        self.key.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_style_options() {
        let options = CacheOptions::new()
            .expires_in(Duration::from_secs(600))
            .key("v1")
            .namespace("people");
        assert_eq!(options.expires_in, Some(Duration::from_secs(600)));
        assert!(matches!(options.key, Some(KeyRule::Literal(_))));
        assert_eq!(options.namespace.as_deref(), Some("people"));
    }

    #[test]
    fn test_take_key_consumes_rule() {
        let mut options = CacheOptions::new().key("v1");
        assert!(options.take_key().is_some());
        assert!(options.take_key().is_none());
    }

    #[test]
    fn test_key_rule_application() {
        let literal = KeyRule::Literal("v2".into());
        assert_eq!(literal.apply(&json!({"id": 1})), "v2");

        let per_item = KeyRule::PerItem(Box::new(|item| {
            format!("item-{}", item["id"])
        }));
        assert_eq!(per_item.apply(&json!({"id": 7})), "item-7");
    }
}
