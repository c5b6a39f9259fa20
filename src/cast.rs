//! Schema-driven coercion of wire documents into models.
//!
//! Servers are sloppy about scalar types: a numeric field arrives as
//! `"42"`, a boolean as `1`. [`coerce`] walks a model's schema over a raw
//! [`Document`] and repairs those mismatches field by field, producing a
//! wire-keyed map that [`Model::from_map`] accepts without surprises.
//! [`cast`] is the one-call composition of the two.
//!
//! Coercion is shallow where the schema is shallow: `any`, `bytes`, and
//! `stream` fields pass through untouched, map values are taken as-is,
//! and only model-typed fields and array items recurse.
//!
//! # Examples
//!
//! ```
//! use keelson::document::{Document, DocumentMap};
//! use keelson::error::Result;
//! use keelson::model::{field, Model, ModelObject, Validate};
//! use keelson::schema::{FieldType, Schema};
//!
//! #[derive(Debug, Default)]
//! struct Job {
//!     id: Option<i64>,
//!     done: Option<bool>,
//! }
//!
//! static JOB: Schema = Schema {
//!     type_name: "Job",
//!     names: &[("id", "jobId"), ("done", "done")],
//!     types: &[("id", FieldType::Integer), ("done", FieldType::Boolean)],
//! };
//!
//! impl Validate for Job {}
//!
//! impl ModelObject for Job {
//!     fn to_map(&self, _without_stream: bool) -> DocumentMap {
//!         let mut map = DocumentMap::new();
//!         field::put(&mut map, "jobId", self.id);
//!         field::put(&mut map, "done", self.done);
//!         map
//!     }
//! }
//!
//! impl Model for Job {
//!     fn schema() -> &'static Schema {
//!         &JOB
//!     }
//!
//!     fn from_map(map: &DocumentMap) -> Result<Self> {
//!         Ok(Job {
//!             id: field::integer(map, &JOB, "id")?,
//!             done: field::boolean(map, &JOB, "done")?,
//!         })
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! // The server stringified the id and sent the flag as a number.
//! let raw = Document::from_json(serde_json::json!({"jobId": "7", "done": 1}));
//!
//! let job: Job = keelson::cast(&raw)?;
//! assert_eq!(job.id, Some(7));
//! assert_eq!(job.done, Some(true));
//! # Ok(())
//! # }
//! ```

use crate::document::{Document, DocumentMap};
use crate::error::{Error, Result};
use crate::model::Model;
use crate::schema::{FieldType, Schema};

/// Coerces a raw document against `M`'s schema and builds the model.
///
/// Fails with [`Error::CannotCast`] when `raw` is not an object, and with
/// [`Error::TypeMismatch`] naming the offending field when a value cannot
/// be repaired to its declared type.
pub fn cast<M: Model>(raw: &Document) -> Result<M> {
    let schema = M::schema();
    let map = coerce(raw, schema)?;
    tracing::debug!(
        model = schema.type_name,
        fields = map.len(),
        "cast wire document into model"
    );
    M::from_map(&map)
}

/// Coerces a raw document into the wire-keyed shape a schema declares.
///
/// Fields the input lacks, and fields set to null, are skipped rather
/// than defaulted; the output only carries entries for values that were
/// present.
pub fn coerce(raw: &Document, schema: &Schema) -> Result<DocumentMap> {
    let Document::Object(entries) = raw else {
        return Err(Error::CannotCast);
    };

    let mut out = DocumentMap::new();
    for (name, wire_name) in schema.fields() {
        let field_type = schema
            .field_type(name)
            .ok_or_else(|| Error::SchemaMismatch {
                type_name: schema.type_name.to_string(),
                field: name.to_string(),
            })?;
        let value = match entries.get(wire_name) {
            None | Some(Document::Null) => continue,
            Some(value) => value,
        };
        out.insert(wire_name.to_string(), coerce_value(name, value, field_type)?);
    }
    Ok(out)
}

fn coerce_value(name: &str, value: &Document, field_type: &FieldType) -> Result<Document> {
    match field_type {
        FieldType::Any | FieldType::Bytes | FieldType::Stream => Ok(value.clone()),

        FieldType::String => match value {
            Document::String(_) => Ok(value.clone()),
            Document::Integer(number) => Ok(Document::String(number.to_string())),
            Document::Float(number) => Ok(Document::String(number.to_string())),
            Document::Bool(flag) => Ok(Document::String(flag.to_string())),
            other => Err(mismatch(name, field_type, other)),
        },

        FieldType::Boolean => match value {
            Document::Bool(_) => Ok(value.clone()),
            Document::Integer(1) => Ok(Document::Bool(true)),
            Document::Integer(0) => Ok(Document::Bool(false)),
            Document::Float(number) if *number == 1.0 => Ok(Document::Bool(true)),
            Document::Float(number) if *number == 0.0 => Ok(Document::Bool(false)),
            Document::String(text) if text == "true" => Ok(Document::Bool(true)),
            Document::String(text) if text == "false" => Ok(Document::Bool(false)),
            other => Err(mismatch(name, field_type, other)),
        },

        FieldType::Number | FieldType::Integer | FieldType::Float => match value {
            Document::Integer(_) | Document::Float(_) => Ok(value.clone()),
            Document::String(text) => Ok(parse_number(text)),
            other => Err(mismatch(name, field_type, other)),
        },

        FieldType::Array(item_type) => match value {
            Document::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(coerce_item(item, item_type)?);
                }
                Ok(Document::Array(out))
            }
            other => Err(mismatch(name, field_type, other)),
        },

        FieldType::Map(_) => match value {
            Document::Object(_) => Ok(value.clone()),
            other => Err(mismatch(name, field_type, other)),
        },

        FieldType::Model(model_schema) => Ok(Document::Object(coerce(value, model_schema)?)),
    }
}

fn coerce_item(item: &Document, item_type: &FieldType) -> Result<Document> {
    match item_type {
        FieldType::Model(model_schema) => Ok(Document::Object(coerce(item, model_schema)?)),
        _ => Ok(item.clone()),
    }
}

// Numeric strings never fail: anything unparseable becomes NaN, the way
// parseFloat behaves on the producing side of these payloads.
pub(crate) fn parse_number(raw: &str) -> Document {
    if !raw.is_empty() && raw.bytes().all(|byte| byte.is_ascii_digit()) {
        if let Ok(number) = raw.parse::<i64>() {
            return Document::Integer(number);
        }
    }
    if raw.bytes().all(|byte| byte.is_ascii_digit() || byte == b'.') {
        return Document::Float(raw.parse().unwrap_or(f64::NAN));
    }
    Document::Float(f64::NAN)
}

fn mismatch(name: &str, field_type: &FieldType, actual: &Document) -> Error {
    Error::TypeMismatch {
        field: name.to_string(),
        expected: field_type.expected_kind(),
        actual: actual.kind(),
    }
}
