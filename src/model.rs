//! Model traits and validation for generated types.
//!
//! Generated SDK structs implement three traits: [`Validate`] runs the
//! declared validation rules, [`ModelObject`] serializes a model into a
//! wire-keyed [`DocumentMap`], and [`Model`] adds the schema and the
//! reverse mapping. The [`field`] module carries the accessor helpers
//! generated `from_map` and `to_map` bodies are built from, and the
//! `validate_*` assertions implement the rule set generated `validate`
//! bodies call into.
//!
//! # Examples
//!
//! A hand-written model the shape a generator emits:
//!
//! ```
//! use keelson::document::{Document, DocumentMap};
//! use keelson::error::Result;
//! use keelson::model::{field, validate_required, Model, ModelObject, Validate};
//! use keelson::schema::{FieldType, Schema};
//!
//! #[derive(Debug, Clone, Default, PartialEq)]
//! pub struct User {
//!     pub name: Option<String>,
//!     pub age: Option<i64>,
//! }
//!
//! static USER: Schema = Schema {
//!     type_name: "User",
//!     names: &[("name", "userName"), ("age", "age")],
//!     types: &[("name", FieldType::String), ("age", FieldType::Integer)],
//! };
//!
//! impl Validate for User {
//!     fn validate(&self) -> Result<()> {
//!         validate_required("name", self.name.as_ref())
//!     }
//! }
//!
//! impl ModelObject for User {
//!     fn to_map(&self, _without_stream: bool) -> DocumentMap {
//!         let mut map = DocumentMap::new();
//!         field::put(&mut map, "userName", self.name.clone());
//!         field::put(&mut map, "age", self.age);
//!         map
//!     }
//! }
//!
//! impl Model for User {
//!     fn schema() -> &'static Schema {
//!         &USER
//!     }
//!
//!     fn from_map(map: &DocumentMap) -> Result<Self> {
//!         Ok(User {
//!             name: field::string(map, &USER, "name")?,
//!             age: field::integer(map, &USER, "age")?,
//!         })
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let mut wire = DocumentMap::new();
//! wire.insert("userName".to_string(), Document::from("ada"));
//! wire.insert("age".to_string(), Document::from(36));
//!
//! let user = User::from_map(&wire)?;
//! user.validate()?;
//! assert_eq!(user.name.as_deref(), Some("ada"));
//! assert_eq!(user.to_map(false), wire);
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use crate::document::{Document, DocumentMap};
use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::stream::ByteStream;

/// Runs the validation rules declared for a value.
///
/// Leaf types validate trivially; models run their declared assertions and
/// recurse into nested models.
pub trait Validate {
    /// Checks the value against its declared rules.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// A type that serializes itself into a wire-keyed document.
pub trait ModelObject: Validate + fmt::Debug + Send + Sync {
    /// Serializes the model into a map keyed by wire names.
    ///
    /// With `without_stream` set, stream-typed fields are omitted so the
    /// result stays safely copyable.
    fn to_map(&self, without_stream: bool) -> DocumentMap;
}

/// A generated model with a schema and a wire mapping in both directions.
pub trait Model: ModelObject + Sized {
    /// The model's static schema.
    fn schema() -> &'static Schema;

    /// Rebuilds the model from a wire-keyed document.
    ///
    /// Absent and null entries become `None`; present entries must already
    /// have the declared type.
    fn from_map(map: &DocumentMap) -> Result<Self>;

    /// Deep-copies the model, leaving stream fields behind.
    fn copy_without_stream(&self) -> Result<Self> {
        Self::from_map(&self.to_map(true))
    }
}

macro_rules! leaf_validate {
    ($($ty:ty),* $(,)?) => {
        $(impl Validate for $ty {})*
    };
}

leaf_validate!(
    String, bool, u8, u16, u32, u64, i8, i16, i32, i64, f32, f64, ByteStream,
);

impl Validate for Document {
    fn validate(&self) -> Result<()> {
        match self {
            Document::Array(items) => validate_array(items),
            Document::Object(map) => validate_map(map),
            _ => Ok(()),
        }
    }
}

impl<T: Validate> Validate for Option<T> {
    fn validate(&self) -> Result<()> {
        match self {
            Some(value) => value.validate(),
            None => Ok(()),
        }
    }
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> Result<()> {
        validate_array(self)
    }
}

impl<T: Validate> Validate for BTreeMap<String, T> {
    fn validate(&self) -> Result<()> {
        validate_map(self)
    }
}

/// Validates every element of a slice.
pub fn validate_array<T: Validate>(items: &[T]) -> Result<()> {
    for item in items {
        item.validate()?;
    }
    Ok(())
}

/// Validates every value of a map.
pub fn validate_map<T: Validate>(map: &BTreeMap<String, T>) -> Result<()> {
    for value in map.values() {
        value.validate()?;
    }
    Ok(())
}

/// Fails when a required field is absent.
///
/// # Examples
///
/// ```
/// use keelson::model::validate_required;
///
/// assert!(validate_required("name", Some(&"ada".to_string())).is_ok());
///
/// let err = validate_required::<String>("name", None).unwrap_err();
/// assert_eq!(err.to_string(), "SDK.ValidateError: name is required.");
/// ```
pub fn validate_required<T>(name: &str, value: Option<&T>) -> Result<()> {
    match value {
        Some(_) => Ok(()),
        None => Err(Error::validation(format!("{name} is required."))),
    }
}

/// Fails when a present string is longer than `max` characters.
pub fn validate_max_length(name: &str, value: Option<&str>, max: usize) -> Result<()> {
    match value {
        Some(value) if value.chars().count() > max => Err(Error::validation(format!(
            "{name} is exceed max-length: {max}."
        ))),
        _ => Ok(()),
    }
}

/// Fails when a present string is shorter than `min` characters.
pub fn validate_min_length(name: &str, value: Option<&str>, min: usize) -> Result<()> {
    match value {
        Some(value) if value.chars().count() < min => Err(Error::validation(format!(
            "{name} is exceed min-length: {min}."
        ))),
        _ => Ok(()),
    }
}

/// Fails when a present number is above `max`.
pub fn validate_maximum<T>(name: &str, value: Option<T>, max: T) -> Result<()>
where
    T: PartialOrd + fmt::Display,
{
    match value {
        Some(value) if value > max => Err(Error::validation(format!(
            "{name} cannot be greater than {max}."
        ))),
        _ => Ok(()),
    }
}

/// Fails when a present number is below `min`.
pub fn validate_minimum<T>(name: &str, value: Option<T>, min: T) -> Result<()>
where
    T: PartialOrd + fmt::Display,
{
    match value {
        Some(value) if value < min => Err(Error::validation(format!(
            "{name} cannot be less than {min}."
        ))),
        _ => Ok(()),
    }
}

/// Fails when a present string does not match `pattern`.
///
/// The pattern is compiled on every call; generated validators run once
/// per model instance, so the rules stay declarative.
pub fn validate_pattern(name: &str, value: Option<&str>, pattern: &str) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    let matcher = regex::Regex::new(pattern)?;
    if matcher.is_match(value) {
        Ok(())
    } else {
        Err(Error::validation(format!("{name} is not match {pattern}.")))
    }
}

/// Accessors generated `from_map` and `to_map` bodies are composed of.
///
/// Getters resolve the field's wire name through the schema, treat absent
/// and null entries as `None`, and fail with a type mismatch naming the
/// field when the stored value has the wrong shape. Setters insert under
/// the wire name and skip `None` so sparse models stay sparse.
pub mod field {
    use super::*;

    fn wire<'m>(
        map: &'m DocumentMap,
        schema: &Schema,
        name: &str,
    ) -> Result<Option<&'m Document>> {
        let wire_name = schema
            .wire_name(name)
            .ok_or_else(|| Error::SchemaMismatch {
                type_name: schema.type_name.to_string(),
                field: name.to_string(),
            })?;
        Ok(match map.get(wire_name) {
            None | Some(Document::Null) => None,
            Some(value) => Some(value),
        })
    }

    fn mismatch(name: &str, expected: &'static str, actual: &Document) -> Error {
        Error::TypeMismatch {
            field: name.to_string(),
            expected,
            actual: actual.kind(),
        }
    }

    /// Reads a string field.
    pub fn string(map: &DocumentMap, schema: &Schema, name: &str) -> Result<Option<String>> {
        match wire(map, schema, name)? {
            None => Ok(None),
            Some(Document::String(value)) => Ok(Some(value.clone())),
            Some(other) => Err(mismatch(name, "string", other)),
        }
    }

    /// Reads an integer field, truncating a float that reached the wire.
    pub fn integer(map: &DocumentMap, schema: &Schema, name: &str) -> Result<Option<i64>> {
        match wire(map, schema, name)? {
            None => Ok(None),
            Some(Document::Integer(value)) => Ok(Some(*value)),
            Some(Document::Float(value)) => Ok(Some(*value as i64)),
            Some(other) => Err(mismatch(name, "number", other)),
        }
    }

    /// Reads a float field, widening integers.
    pub fn float(map: &DocumentMap, schema: &Schema, name: &str) -> Result<Option<f64>> {
        match wire(map, schema, name)? {
            None => Ok(None),
            Some(Document::Integer(value)) => Ok(Some(*value as f64)),
            Some(Document::Float(value)) => Ok(Some(*value)),
            Some(other) => Err(mismatch(name, "number", other)),
        }
    }

    /// Reads a boolean field.
    pub fn boolean(map: &DocumentMap, schema: &Schema, name: &str) -> Result<Option<bool>> {
        match wire(map, schema, name)? {
            None => Ok(None),
            Some(Document::Bool(value)) => Ok(Some(*value)),
            Some(other) => Err(mismatch(name, "boolean", other)),
        }
    }

    /// Reads a bytes field, accepting a string's UTF-8 bytes.
    pub fn bytes(map: &DocumentMap, schema: &Schema, name: &str) -> Result<Option<Vec<u8>>> {
        match wire(map, schema, name)? {
            None => Ok(None),
            Some(Document::Bytes(value)) => Ok(Some(value.clone())),
            Some(Document::String(value)) => Ok(Some(value.clone().into_bytes())),
            Some(other) => Err(mismatch(name, "bytes", other)),
        }
    }

    /// Reads a stream field. The returned handle shares the source.
    pub fn stream(map: &DocumentMap, schema: &Schema, name: &str) -> Result<Option<ByteStream>> {
        match wire(map, schema, name)? {
            None => Ok(None),
            Some(Document::Stream(value)) => Ok(Some(value.clone())),
            Some(other) => Err(mismatch(name, "stream", other)),
        }
    }

    /// Reads an untyped field as-is.
    pub fn any(map: &DocumentMap, schema: &Schema, name: &str) -> Result<Option<Document>> {
        Ok(wire(map, schema, name)?.cloned())
    }

    /// Reads a map field whose values are all strings.
    pub fn string_map(
        map: &DocumentMap,
        schema: &Schema,
        name: &str,
    ) -> Result<Option<BTreeMap<String, String>>> {
        match wire(map, schema, name)? {
            None => Ok(None),
            Some(Document::Object(entries)) => {
                let mut out = BTreeMap::new();
                for (key, value) in entries {
                    match value {
                        Document::String(value) => {
                            out.insert(key.clone(), value.clone());
                        }
                        other => return Err(mismatch(name, "string", other)),
                    }
                }
                Ok(Some(out))
            }
            Some(other) => Err(mismatch(name, "object", other)),
        }
    }

    /// Reads a map field with untyped values.
    pub fn document_map(
        map: &DocumentMap,
        schema: &Schema,
        name: &str,
    ) -> Result<Option<DocumentMap>> {
        match wire(map, schema, name)? {
            None => Ok(None),
            Some(Document::Object(entries)) => Ok(Some(entries.clone())),
            Some(other) => Err(mismatch(name, "object", other)),
        }
    }

    /// Reads an array field whose items are all strings.
    pub fn string_array(
        map: &DocumentMap,
        schema: &Schema,
        name: &str,
    ) -> Result<Option<Vec<String>>> {
        match wire(map, schema, name)? {
            None => Ok(None),
            Some(Document::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Document::String(value) => out.push(value.clone()),
                        other => return Err(mismatch(name, "string", other)),
                    }
                }
                Ok(Some(out))
            }
            Some(other) => Err(mismatch(name, "array", other)),
        }
    }

    /// Reads a nested model field.
    pub fn model<M: Model>(map: &DocumentMap, schema: &Schema, name: &str) -> Result<Option<M>> {
        match wire(map, schema, name)? {
            None => Ok(None),
            Some(Document::Object(entries)) => Ok(Some(M::from_map(entries)?)),
            Some(other) => Err(mismatch(name, "object", other)),
        }
    }

    /// Reads an array field of nested models.
    pub fn model_array<M: Model>(
        map: &DocumentMap,
        schema: &Schema,
        name: &str,
    ) -> Result<Option<Vec<M>>> {
        match wire(map, schema, name)? {
            None => Ok(None),
            Some(Document::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Document::Object(entries) => out.push(M::from_map(entries)?),
                        other => return Err(mismatch(name, "object", other)),
                    }
                }
                Ok(Some(out))
            }
            Some(other) => Err(mismatch(name, "array", other)),
        }
    }

    /// Writes a field, skipping `None`.
    pub fn put(map: &mut DocumentMap, wire_name: &str, value: Option<impl Into<Document>>) {
        if let Some(value) = value {
            map.insert(wire_name.to_string(), value.into());
        }
    }

    /// Writes a nested model field, skipping `None`.
    pub fn put_model<M: ModelObject>(
        map: &mut DocumentMap,
        wire_name: &str,
        value: Option<&M>,
        without_stream: bool,
    ) {
        if let Some(value) = value {
            map.insert(
                wire_name.to_string(),
                Document::Object(value.to_map(without_stream)),
            );
        }
    }

    /// Writes an array of nested models, skipping `None`.
    pub fn put_model_array<M: ModelObject>(
        map: &mut DocumentMap,
        wire_name: &str,
        value: Option<&[M]>,
        without_stream: bool,
    ) {
        if let Some(items) = value {
            let items = items
                .iter()
                .map(|item| Document::Object(item.to_map(without_stream)))
                .collect();
            map.insert(wire_name.to_string(), Document::Array(items));
        }
    }

    /// Writes a stream field unless streams are being left behind.
    pub fn put_stream(
        map: &mut DocumentMap,
        wire_name: &str,
        value: Option<&ByteStream>,
        without_stream: bool,
    ) {
        if without_stream {
            return;
        }
        if let Some(value) = value {
            map.insert(wire_name.to_string(), Document::Stream(value.clone()));
        }
    }

    /// Writes a string-valued map field, skipping `None`.
    pub fn put_string_map(
        map: &mut DocumentMap,
        wire_name: &str,
        value: Option<&BTreeMap<String, String>>,
    ) {
        if let Some(value) = value {
            map.insert(wire_name.to_string(), Document::from(value.clone()));
        }
    }
}
