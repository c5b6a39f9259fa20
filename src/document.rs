//! Loosely typed wire documents.
//!
//! [`Document`] is the runtime's picture of data on the wire: what JSON or
//! XML deserializes into before any schema is applied, extended with the two
//! shapes transports add on top of JSON (byte buffers and live streams).
//! Generated models convert to and from [`DocumentMap`]s, and the cast
//! engine rewrites documents in place of ad-hoc `serde_json::Value` walking.
//!
//! Maps are ordered (`BTreeMap`) so serialized output and test assertions
//! are deterministic.

use std::collections::BTreeMap;

use crate::stream::ByteStream;

/// A string-keyed document object.
pub type DocumentMap = BTreeMap<String, Document>;

/// A dynamically typed wire value.
///
/// # Examples
///
/// ```
/// use keelson::{Document, DocumentMap};
///
/// let mut map = DocumentMap::new();
/// map.insert("name".to_string(), Document::from("tea"));
/// map.insert("size".to_string(), Document::from(42));
///
/// let doc = Document::Object(map);
/// assert_eq!(doc.kind(), "object");
/// assert_eq!(doc.get("size").and_then(Document::as_i64), Some(42));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Document {
    /// An explicit null.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A whole number.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// UTF-8 text.
    String(String),
    /// An opaque byte buffer.
    Bytes(Vec<u8>),
    /// A byte stream handle. Streams compare equal only when they share the
    /// same underlying handle.
    Stream(ByteStream),
    /// A sequence of documents.
    Array(Vec<Document>),
    /// A string-keyed map of documents.
    Object(DocumentMap),
}

impl Document {
    /// The kind name used in diagnostics for this value.
    ///
    /// Integers and floats both report `number`, mirroring how the wire
    /// formats treat them.
    pub fn kind(&self) -> &'static str {
        match self {
            Document::Null => "null",
            Document::Bool(_) => "boolean",
            Document::Integer(_) | Document::Float(_) => "number",
            Document::String(_) => "string",
            Document::Bytes(_) => "bytes",
            Document::Stream(_) => "stream",
            Document::Array(_) => "array",
            Document::Object(_) => "object",
        }
    }

    /// Returns `true` for [`Document::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Document::Null)
    }

    /// Returns the boolean value, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Document::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the integer value, if this is a whole number.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Document::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the numeric value as a float, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Document::Integer(value) => Some(*value as f64),
            Document::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the string slice, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Document::String(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the byte buffer, if this is one.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Document::Bytes(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the stream handle, if this is one.
    pub fn as_stream(&self) -> Option<&ByteStream> {
        match self {
            Document::Stream(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the element sequence, if this is an array.
    pub fn as_array(&self) -> Option<&[Document]> {
        match self {
            Document::Array(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the underlying map, if this is an object.
    pub fn as_object(&self) -> Option<&DocumentMap> {
        match self {
            Document::Object(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the underlying map mutably, if this is an object.
    pub fn as_object_mut(&mut self) -> Option<&mut DocumentMap> {
        match self {
            Document::Object(value) => Some(value),
            _ => None,
        }
    }

    /// Looks up a key on an object. Returns `None` for non-objects.
    pub fn get(&self, key: &str) -> Option<&Document> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Converts a JSON value into a document.
    ///
    /// Numbers that fit `i64` become [`Document::Integer`]; everything else
    /// numeric becomes [`Document::Float`].
    pub fn from_json(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Null => Document::Null,
            serde_json::Value::Bool(value) => Document::Bool(value),
            serde_json::Value::Number(value) => {
                if let Some(int) = value.as_i64() {
                    Document::Integer(int)
                } else {
                    Document::Float(value.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(value) => Document::String(value),
            serde_json::Value::Array(items) => {
                Document::Array(items.into_iter().map(Document::from_json).collect())
            }
            serde_json::Value::Object(map) => Document::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Document::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// Converts this document into a JSON value.
    ///
    /// Byte buffers render as arrays of numbers; streams have no JSON
    /// representation and render as null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Document::Null | Document::Stream(_) => serde_json::Value::Null,
            Document::Bool(value) => serde_json::Value::Bool(*value),
            Document::Integer(value) => serde_json::Value::from(*value),
            Document::Float(value) => serde_json::Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Document::String(value) => serde_json::Value::String(value.clone()),
            Document::Bytes(value) => {
                serde_json::Value::Array(value.iter().map(|b| serde_json::Value::from(*b)).collect())
            }
            Document::Array(items) => {
                serde_json::Value::Array(items.iter().map(Document::to_json).collect())
            }
            Document::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }

    /// Deep-merges `other` into this document.
    ///
    /// Objects merge key by key, recursing into values that are objects on
    /// both sides. Any other combination is replaced by `other`.
    pub fn merge(&mut self, other: &Document) {
        match (self, other) {
            (Document::Object(target), Document::Object(source)) => {
                for (key, value) in source {
                    match target.get_mut(key) {
                        Some(existing) => existing.merge(value),
                        None => {
                            target.insert(key.clone(), value.clone());
                        }
                    }
                }
            }
            (target, source) => *target = source.clone(),
        }
    }
}

impl From<bool> for Document {
    fn from(value: bool) -> Self {
        Document::Bool(value)
    }
}

impl From<i32> for Document {
    fn from(value: i32) -> Self {
        Document::Integer(i64::from(value))
    }
}

impl From<i64> for Document {
    fn from(value: i64) -> Self {
        Document::Integer(value)
    }
}

impl From<f64> for Document {
    fn from(value: f64) -> Self {
        Document::Float(value)
    }
}

impl From<&str> for Document {
    fn from(value: &str) -> Self {
        Document::String(value.to_string())
    }
}

impl From<String> for Document {
    fn from(value: String) -> Self {
        Document::String(value)
    }
}

impl From<Vec<u8>> for Document {
    fn from(value: Vec<u8>) -> Self {
        Document::Bytes(value)
    }
}

impl From<ByteStream> for Document {
    fn from(value: ByteStream) -> Self {
        Document::Stream(value)
    }
}

impl From<Vec<Document>> for Document {
    fn from(value: Vec<Document>) -> Self {
        Document::Array(value)
    }
}

impl From<DocumentMap> for Document {
    fn from(value: DocumentMap) -> Self {
        Document::Object(value)
    }
}

impl From<BTreeMap<String, String>> for Document {
    fn from(value: BTreeMap<String, String>) -> Self {
        Document::Object(
            value
                .into_iter()
                .map(|(key, text)| (key, Document::String(text)))
                .collect(),
        )
    }
}

impl<T: Into<Document>> From<Option<T>> for Document {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Document::Null)
    }
}

impl From<serde_json::Value> for Document {
    fn from(value: serde_json::Value) -> Self {
        Document::from_json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names() {
        assert_eq!(Document::Null.kind(), "null");
        assert_eq!(Document::Bool(true).kind(), "boolean");
        assert_eq!(Document::Integer(1).kind(), "number");
        assert_eq!(Document::Float(1.5).kind(), "number");
        assert_eq!(Document::String("x".into()).kind(), "string");
        assert_eq!(Document::Bytes(vec![1]).kind(), "bytes");
        assert_eq!(Document::Array(vec![]).kind(), "array");
        assert_eq!(Document::Object(DocumentMap::new()).kind(), "object");
    }

    #[test]
    fn json_round_trip() {
        let json: serde_json::Value = serde_json::json!({
            "name": "tea",
            "size": 42,
            "ratio": 0.5,
            "flags": [true, false],
            "nested": {"inner": null},
        });

        let doc = Document::from_json(json.clone());
        assert_eq!(doc.get("size").and_then(Document::as_i64), Some(42));
        assert_eq!(doc.get("ratio").and_then(Document::as_f64), Some(0.5));
        assert_eq!(doc.to_json(), json);
    }

    #[test]
    fn large_unsigned_numbers_become_floats() {
        let json = serde_json::json!(u64::MAX);
        let doc = Document::from_json(json);
        assert!(matches!(doc, Document::Float(_)));
    }

    #[test]
    fn merge_recurses_into_objects() {
        let mut base = Document::from_json(serde_json::json!({
            "retry": {"policy": "simple", "maxAttempts": 3},
            "timeout": 1000,
        }));
        let patch = Document::from_json(serde_json::json!({
            "retry": {"maxAttempts": 5},
            "extra": true,
        }));

        base.merge(&patch);

        assert_eq!(
            base.get("retry").and_then(|r| r.get("maxAttempts")).and_then(Document::as_i64),
            Some(5)
        );
        assert_eq!(
            base.get("retry").and_then(|r| r.get("policy")).and_then(Document::as_str),
            Some("simple")
        );
        assert_eq!(base.get("timeout").and_then(Document::as_i64), Some(1000));
        assert_eq!(base.get("extra").and_then(Document::as_bool), Some(true));
    }

    #[test]
    fn merge_replaces_mismatched_shapes() {
        let mut base = Document::from("text");
        base.merge(&Document::Integer(7));
        assert_eq!(base, Document::Integer(7));
    }

    #[test]
    fn streams_compare_by_handle() {
        let stream = ByteStream::from_bytes(vec![1, 2, 3]);
        let same = Document::Stream(stream.clone());
        let other = Document::Stream(ByteStream::from_bytes(vec![1, 2, 3]));

        assert_eq!(Document::Stream(stream.clone()), same);
        assert_ne!(Document::Stream(stream), other);
    }
}
