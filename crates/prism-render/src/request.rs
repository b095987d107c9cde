//! Normalized partial invocations.

use serde_json::Value;

/// Local variable bindings passed to a partial.
pub type Locals = serde_json::Map<String, Value>;

/// Build a locals map from a JSON object literal; any other value yields
/// an empty map.
pub fn locals(value: Value) -> Locals {
    match value {
        Value::Object(map) => map,
        _ => Locals::new(),
    }
}

/// Normalized form of a partial invocation.
///
/// Built either directly (the options form) or from a bare name plus
/// locals, where the reserved `as` local is lifted into the binding name
/// and a `collection` local is mirrored into the backing collection.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Target partial name.
    pub partial: String,
    /// Local variable bindings.
    pub locals: Locals,
    /// Per-member binding name for collection rendering.
    pub as_name: Option<String>,
    /// Backing collection for per-member rendering.
    pub collection: Option<Vec<Value>>,
}

impl RenderRequest {
    /// Create a request for a named partial.
    pub fn new(partial: impl Into<String>) -> Self {
        Self {
            partial: partial.into(),
            locals: Locals::new(),
            as_name: None,
            collection: None,
        }
    }

    /// Normalize the bare-name form: `as` is removed from the locals and
    /// becomes the binding name; `collection` is mirrored but stays in the
    /// locals.
    pub fn from_name(partial: impl Into<String>, mut locals: Locals) -> Self {
        let as_name = match locals.remove("as") {
            Some(Value::String(name)) => Some(name),
            _ => None,
        };
        let collection = match locals.get("collection") {
            Some(Value::Array(items)) => Some(items.clone()),
            _ => None,
        };
        Self {
            partial: partial.into(),
            locals,
            as_name,
            collection,
        }
    }

    /// Set the locals map.
    pub fn with_locals(mut self, locals: Locals) -> Self {
        self.locals = locals;
        self
    }

    /// Set the per-member binding name.
    pub fn each_as(mut self, name: impl Into<String>) -> Self {
        self.as_name = Some(name.into());
        self
    }

    /// Set the backing collection.
    pub fn with_collection(mut self, collection: Vec<Value>) -> Self {
        self.collection = Some(collection);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_name_lifts_as_binding() {
        let request = RenderRequest::from_name(
            "person",
            locals(json!({"as": "person", "role": "admin"})),
        );
        assert_eq!(request.as_name.as_deref(), Some("person"));
        assert!(!request.locals.contains_key("as"));
        assert_eq!(request.locals["role"], json!("admin"));
    }

    #[test]
    fn test_from_name_mirrors_collection() {
        let request = RenderRequest::from_name(
            "person",
            locals(json!({"collection": [1, 2, 3]})),
        );
        assert_eq!(request.collection, Some(vec![json!(1), json!(2), json!(3)]));
        // The collection local is mirrored, not moved.
        assert!(request.locals.contains_key("collection"));
    }

    #[test]
    fn test_builder_form() {
        let request = RenderRequest::new("person")
            .each_as("p")
            .with_collection(vec![json!(1)]);
        assert_eq!(request.partial, "person");
        assert_eq!(request.as_name.as_deref(), Some("p"));
        assert_eq!(request.collection.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_non_object_locals_are_empty() {
        assert!(locals(json!([1, 2])).is_empty());
    }
}
