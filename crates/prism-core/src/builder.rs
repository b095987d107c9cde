//! Incremental JSON document builder.

use serde::Serialize;
use serde_json::Value;

use crate::{BuildError, OutputSink};

/// Incremental JSON builder over an [`OutputSink`].
///
/// Emission is textual: attributes and elements are appended to the sink as
/// they are declared, with separator bookkeeping handled per container. The
/// fragment-caching layer relies on three properties of this builder:
/// captured frames are byte-faithful, spliced fragments participate in the
/// surrounding container's separator state, and the root document shape is
/// resolved at `finish` time.
#[derive(Debug, Default)]
pub struct JsonBuilder {
    sink: OutputSink,
    root_keyed: bool,
}

impl JsonBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            sink: OutputSink::new(),
            root_keyed: false,
        }
    }

    /// Write an attribute name at the current position. The next emission
    /// becomes its value.
    pub fn attr(&mut self, key: &str) -> Result<(), BuildError> {
        if self.sink.at_root() {
            self.root_keyed = true;
        }
        self.sink.entry_prefix();
        let name = serde_json::to_string(key)?;
        self.sink.write_raw(&name);
        self.sink.write_raw(":");
        self.sink.expect_value();
        Ok(())
    }

    /// Emit a serialized value at the current position.
    pub fn element<V: Serialize + ?Sized>(&mut self, value: &V) -> Result<(), BuildError> {
        self.sink.entry_prefix();
        let text = serde_json::to_string(value)?;
        self.sink.write_raw(&text);
        Ok(())
    }

    /// Set an attribute to a serialized value.
    pub fn set<V: Serialize + ?Sized>(&mut self, key: &str, value: &V) -> Result<(), BuildError> {
        self.attr(key)?;
        self.element(value)
    }

    /// Emit an object at the current position, its pairs produced by `f`.
    pub fn object<F>(&mut self, f: F) -> Result<(), BuildError>
    where
        F: FnOnce(&mut Self) -> Result<(), BuildError>,
    {
        self.begin_object();
        f(self)?;
        self.end_object()
    }

    /// Set an attribute to an object, its pairs produced by `f`.
    pub fn set_with<F>(&mut self, key: &str, f: F) -> Result<(), BuildError>
    where
        F: FnOnce(&mut Self) -> Result<(), BuildError>,
    {
        self.attr(key)?;
        self.object(f)
    }

    /// Copy the named members of `source` as attributes.
    pub fn extract(&mut self, source: &Value, keys: &[&str]) -> Result<(), BuildError> {
        for key in keys {
            let value = source.get(key).unwrap_or(&Value::Null);
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Emit an array of serialized values at the current position.
    pub fn array<V: Serialize>(&mut self, items: &[V]) -> Result<(), BuildError> {
        self.begin_array();
        for item in items {
            self.element(item)?;
        }
        self.end_array()
    }

    /// Set an attribute to an array of serialized values.
    pub fn set_array<V: Serialize>(&mut self, key: &str, items: &[V]) -> Result<(), BuildError> {
        self.attr(key)?;
        self.array(items)
    }

    /// Emit an array with one object per item, pairs produced by `f`.
    pub fn array_with<T, F>(&mut self, items: &[T], mut f: F) -> Result<(), BuildError>
    where
        F: FnMut(&mut Self, &T) -> Result<(), BuildError>,
    {
        self.begin_array();
        for item in items {
            self.begin_object();
            f(self, item)?;
            self.end_object()?;
        }
        self.end_array()
    }

    /// Emit an array of objects holding the named members of each item.
    pub fn array_extract(&mut self, items: &[Value], keys: &[&str]) -> Result<(), BuildError> {
        self.array_with(items, |builder, item| builder.extract(item, keys))
    }

    /// Open an object scope at the current position.
    pub fn begin_object(&mut self) {
        self.sink.entry_prefix();
        self.sink.open_container('{');
    }

    /// Close the innermost object scope.
    pub fn end_object(&mut self) -> Result<(), BuildError> {
        self.sink.close_container('}')
    }

    /// Open an array scope at the current position.
    pub fn begin_array(&mut self) {
        self.sink.entry_prefix();
        self.sink.open_container('[');
    }

    /// Close the innermost array scope.
    pub fn end_array(&mut self) -> Result<(), BuildError> {
        self.sink.close_container(']')
    }

    /// Push an isolated capture frame; emission goes to it until the
    /// matching [`pop_capture`](Self::pop_capture).
    ///
    /// A `continuing` frame behaves as if its enclosing container already
    /// holds entries, so the first emission carries its leading separator.
    pub fn push_capture(&mut self, continuing: bool) {
        self.sink.push_frame(continuing);
    }

    /// Pop the top capture frame and return its serialized text.
    pub fn pop_capture(&mut self) -> Result<String, BuildError> {
        self.sink.pop_frame()
    }

    /// Run `f` against an isolated frame and return its serialized text.
    pub fn capture<F, E>(&mut self, f: F) -> Result<String, E>
    where
        F: FnOnce(&mut Self) -> Result<(), E>,
        E: From<BuildError>,
    {
        self.sink.push_frame(false);
        let result = f(self);
        let text = self.sink.pop_frame();
        result?;
        Ok(text?)
    }

    /// Splice a freshly captured fragment into the current container.
    ///
    /// The fragment was captured under this builder's state moments ago and
    /// is trusted verbatim.
    pub fn splice_fresh(&mut self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        // A fragment leading with a quoted name is attribute pairs; spliced
        // at the root it decides the document shape.
        if self.sink.at_root() && fragment.starts_with('"') {
            self.root_keyed = true;
        }
        self.sink.entry_prefix();
        self.sink.write_raw(fragment);
    }

    /// Merge a cache-retrieved fragment into the current container.
    ///
    /// Stored fragments may carry a leading separator from the state they
    /// were captured under; it is stripped before splicing so the live
    /// container's own separator state applies.
    pub fn merge_cached(&mut self, fragment: &str) {
        let fragment = fragment.strip_prefix(',').unwrap_or(fragment);
        self.splice_fresh(fragment);
    }

    /// Append pre-joined raw text inside the current container.
    pub fn splice_raw(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.sink.write_raw(text);
        self.sink.mark_entry();
    }

    /// Consume the builder and return the completed document.
    ///
    /// Root-level attributes are wrapped as an object; a root-level value
    /// (for example a top-level array) is returned as-is.
    pub fn finish(self) -> String {
        let body = self.sink.into_output();
        if self.root_keyed {
            format!("{{{body}}}")
        } else if body.is_empty() {
            "{}".to_string()
        } else {
            body
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_builds_object_document() {
        let mut json = JsonBuilder::new();
        json.set("name", "Ada").unwrap();
        json.set("age", &36).unwrap();
        assert_eq!(json.finish(), r#"{"name":"Ada","age":36}"#);
    }

    #[test]
    fn test_nested_object_and_array() {
        let mut json = JsonBuilder::new();
        json.set_with("author", |json| {
            json.set("name", "Ada")?;
            json.set_array("tags", &["math", "engines"])
        })
        .unwrap();
        assert_eq!(
            json.finish(),
            r#"{"author":{"name":"Ada","tags":["math","engines"]}}"#
        );
    }

    #[test]
    fn test_root_array_document() {
        let mut json = JsonBuilder::new();
        json.array(&[1, 2, 3]).unwrap();
        assert_eq!(json.finish(), "[1,2,3]");
    }

    #[test]
    fn test_array_with_emits_object_per_item() {
        let people = [json!({"name": "Ada"}), json!({"name": "Grace"})];
        let mut json = JsonBuilder::new();
        json.array_with(&people, |json, person| json.extract(person, &["name"]))
            .unwrap();
        assert_eq!(json.finish(), r#"[{"name":"Ada"},{"name":"Grace"}]"#);
    }

    #[test]
    fn test_extract_missing_member_is_null() {
        let source = json!({"name": "Ada"});
        let mut json = JsonBuilder::new();
        json.extract(&source, &["name", "age"]).unwrap();
        assert_eq!(json.finish(), r#"{"name":"Ada","age":null}"#);
    }

    #[test]
    fn test_capture_returns_isolated_pairs() {
        let mut json = JsonBuilder::new();
        json.set("before", &1).unwrap();
        let captured = json.capture(|json| json.set("inner", &2)).unwrap();
        assert_eq!(captured, r#""inner":2"#);
        assert_eq!(json.finish(), r#"{"before":1}"#);
    }

    #[test]
    fn test_splice_fresh_respects_separator_state() {
        let mut json = JsonBuilder::new();
        json.set("a", &1).unwrap();
        json.splice_fresh(r#""b":2"#);
        assert_eq!(json.finish(), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn test_merge_cached_strips_stale_separator() {
        let mut json = JsonBuilder::new();
        json.merge_cached(r#","b":2"#);
        assert_eq!(json.finish(), r#"{"b":2}"#);
    }

    #[test]
    fn test_empty_document_is_an_object() {
        let json = JsonBuilder::new();
        assert_eq!(json.finish(), "{}");
    }

    #[test]
    fn test_escaped_keys_and_strings() {
        let mut json = JsonBuilder::new();
        json.set("quote\"key", "line\nbreak").unwrap();
        assert_eq!(json.finish(), "{\"quote\\\"key\":\"line\\nbreak\"}");
    }
}
