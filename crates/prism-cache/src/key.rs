//! Cache key descriptors and canonical expansion.

use std::hash::{Hash, Hasher};

use serde_json::Value;

/// Namespace tag folded into every canonical fragment key.
pub const FRAGMENT_NAMESPACE: &str = "prism";

/// A cache key descriptor prior to canonical expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyDescriptor {
    /// A plain literal token.
    Token(String),
    /// A composite of tokens, expanded as a path.
    Parts(Vec<String>),
    /// A location-style reference that may carry a `scheme://` prefix.
    Resource(String),
}

impl KeyDescriptor {
    /// Resolve the descriptor to a path-like string.
    ///
    /// Resource references keep only the portion after the scheme
    /// separator, so a URL's scheme never enters the key.
    pub fn resolve(&self) -> String {
        match self {
            Self::Token(token) => token.clone(),
            Self::Parts(parts) => parts.join("/"),
            Self::Resource(location) => location
                .split_once("://")
                .map(|(_, rest)| rest.to_string())
                .unwrap_or_else(|| location.clone()),
        }
    }

    /// Prepend a token, turning the descriptor into a composite.
    pub fn prepend(self, part: impl Into<String>) -> Self {
        let part = part.into();
        match self {
            Self::Parts(mut parts) => {
                parts.insert(0, part);
                Self::Parts(parts)
            }
            other => Self::Parts(vec![part, other.resolve()]),
        }
    }
}

impl From<&str> for KeyDescriptor {
    fn from(token: &str) -> Self {
        Self::Token(token.to_string())
    }
}

impl From<String> for KeyDescriptor {
    fn from(token: String) -> Self {
        Self::Token(token)
    }
}

impl From<Vec<String>> for KeyDescriptor {
    fn from(parts: Vec<String>) -> Self {
        Self::Parts(parts)
    }
}

impl From<&[&str]> for KeyDescriptor {
    fn from(parts: &[&str]) -> Self {
        Self::Parts(parts.iter().map(|s| s.to_string()).collect())
    }
}

/// Expand a resolved descriptor into the store's native key format.
pub fn expand_cache_key(descriptor: &KeyDescriptor, namespace: &str) -> String {
    format!("{}/{}", namespace, descriptor.resolve())
}

/// Types that can supply their own cache key descriptor.
///
/// Collection items implement this so the batch mapper can derive a key
/// per item without a caller-supplied rule.
pub trait CacheKeySource {
    /// The descriptor identifying this value in the cache.
    fn key_descriptor(&self) -> KeyDescriptor;
}

impl CacheKeySource for str {
    fn key_descriptor(&self) -> KeyDescriptor {
        KeyDescriptor::Token(self.to_string())
    }
}

impl CacheKeySource for String {
    fn key_descriptor(&self) -> KeyDescriptor {
        KeyDescriptor::Token(self.clone())
    }
}

impl CacheKeySource for Value {
    /// Objects use their `cache_key` member when present, then `id`;
    /// anything else falls back to a content hash of the serialized value.
    fn key_descriptor(&self) -> KeyDescriptor {
        if let Value::Object(map) = self {
            if let Some(Value::String(key)) = map.get("cache_key") {
                return KeyDescriptor::Token(key.clone());
            }
            if let Some(id) = map.get("id") {
                return KeyDescriptor::Token(id.to_string());
            }
        }
        KeyDescriptor::Token(format!("{:x}", content_hash(&self.to_string())))
    }
}

// Simple non-cryptographic hash for key fallback
fn content_hash(s: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_resolves_verbatim() {
        assert_eq!(KeyDescriptor::from("v1").resolve(), "v1");
    }

    #[test]
    fn test_parts_resolve_as_path() {
        let descriptor = KeyDescriptor::Parts(vec!["v1".into(), "people/5".into()]);
        assert_eq!(descriptor.resolve(), "v1/people/5");
    }

    #[test]
    fn test_resource_strips_scheme_prefix() {
        let descriptor = KeyDescriptor::Resource("https://example.com/people/5".into());
        assert_eq!(descriptor.resolve(), "example.com/people/5");
    }

    #[test]
    fn test_resource_without_scheme_is_kept() {
        let descriptor = KeyDescriptor::Resource("people/5".into());
        assert_eq!(descriptor.resolve(), "people/5");
    }

    #[test]
    fn test_expand_prefixes_namespace() {
        let key = expand_cache_key(&KeyDescriptor::from("people/5"), FRAGMENT_NAMESPACE);
        assert_eq!(key, "prism/people/5");
    }

    #[test]
    fn test_prepend_builds_composite() {
        let descriptor = KeyDescriptor::from("people/5").prepend("v1");
        assert_eq!(descriptor.resolve(), "v1/people/5");
    }

    #[test]
    fn test_value_key_prefers_cache_key_member() {
        let item = json!({"cache_key": "people/5-123", "id": 5});
        assert_eq!(item.key_descriptor().resolve(), "people/5-123");
    }

    #[test]
    fn test_value_key_falls_back_to_id() {
        let item = json!({"id": 5, "name": "Ada"});
        assert_eq!(item.key_descriptor().resolve(), "5");
    }

    #[test]
    fn test_value_key_hash_fallback_is_deterministic() {
        let a = json!({"name": "Ada"});
        let b = json!({"name": "Ada"});
        assert_eq!(a.key_descriptor(), b.key_descriptor());
    }
}
