//! Static field descriptors for generated models.
//!
//! Every generated model carries a [`Schema`]: two parallel tables mapping
//! each field to its wire name and to its [`FieldType`]. The cast engine and
//! the model helpers are driven entirely by these tables, so generated code
//! stays declarative and the runtime owns all of the conversion logic.
//!
//! Schemas are plain `static` data. Model fields reference other schemas by
//! `&'static` pointer, which keeps recursive and mutually recursive models
//! representable without allocation:
//!
//! ```
//! use keelson::schema::{FieldType, Schema};
//!
//! static CATEGORY: Schema = Schema {
//!     type_name: "Category",
//!     names: &[("name", "name"), ("parent", "parentCategory")],
//!     types: &[
//!         ("name", FieldType::String),
//!         ("parent", FieldType::Model(&CATEGORY)),
//!     ],
//! };
//!
//! assert_eq!(CATEGORY.wire_name("parent"), Some("parentCategory"));
//! ```

/// The shape a model field takes on the wire.
#[derive(Debug, Clone, Copy)]
pub enum FieldType {
    /// UTF-8 text.
    String,
    /// A number without declared width. Coerces like [`FieldType::Integer`]
    /// and [`FieldType::Float`]; the distinction only guides the generated
    /// struct field.
    Number,
    /// A whole number.
    Integer,
    /// A floating point number.
    Float,
    /// A boolean.
    Boolean,
    /// An opaque byte buffer. Never coerced.
    Bytes,
    /// A byte stream handle. Never coerced.
    Stream,
    /// Anything. Never coerced.
    Any,
    /// A homogeneous sequence of the given item type.
    Array(&'static FieldType),
    /// A string-keyed map with the given value type.
    Map(&'static FieldType),
    /// A nested model described by the given schema.
    Model(&'static Schema),
}

impl FieldType {
    /// The kind name used in mismatch diagnostics for this descriptor.
    ///
    /// Arrays report `array`; maps and models report `object`; primitives
    /// report their own name.
    pub fn expected_kind(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number | FieldType::Integer | FieldType::Float => "number",
            FieldType::Boolean => "boolean",
            FieldType::Bytes => "bytes",
            FieldType::Stream => "stream",
            FieldType::Any => "any",
            FieldType::Array(_) => "array",
            FieldType::Map(_) | FieldType::Model(_) => "object",
        }
    }
}

/// Field descriptor tables for one generated model.
///
/// `names` and `types` are parallel: generated code emits the same field keys
/// into both, in declaration order. Lookups that fall through one table but
/// not the other surface as [`Error::SchemaMismatch`](crate::Error::SchemaMismatch)
/// from the engines that walk the schema.
#[derive(Debug)]
pub struct Schema {
    /// Diagnostic name of the model, e.g. `"GetUserResponse"`.
    pub type_name: &'static str,
    /// Field name to wire name, in declaration order.
    pub names: &'static [(&'static str, &'static str)],
    /// Field name to wire shape, in declaration order.
    pub types: &'static [(&'static str, FieldType)],
}

impl Schema {
    /// Looks up the wire name for a field.
    pub fn wire_name(&self, field: &str) -> Option<&'static str> {
        self.names
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, wire)| *wire)
    }

    /// Looks up the type descriptor for a field.
    pub fn field_type(&self, field: &str) -> Option<&'static FieldType> {
        self.types
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, ty)| ty)
    }

    /// Iterates `(field, wire_name)` pairs in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &'static str)> {
        self.names.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static USER: Schema = Schema {
        type_name: "User",
        names: &[("name", "userName"), ("age", "age"), ("tags", "tags")],
        types: &[
            ("name", FieldType::String),
            ("age", FieldType::Number),
            ("tags", FieldType::Array(&FieldType::String)),
        ],
    };

    static NODE: Schema = Schema {
        type_name: "Node",
        names: &[("value", "value"), ("next", "next")],
        types: &[
            ("value", FieldType::Integer),
            ("next", FieldType::Model(&NODE)),
        ],
    };

    #[test]
    fn wire_name_lookup() {
        assert_eq!(USER.wire_name("name"), Some("userName"));
        assert_eq!(USER.wire_name("age"), Some("age"));
        assert_eq!(USER.wire_name("missing"), None);
    }

    #[test]
    fn field_type_lookup() {
        assert!(matches!(USER.field_type("name"), Some(FieldType::String)));
        assert!(matches!(
            USER.field_type("tags"),
            Some(FieldType::Array(FieldType::String))
        ));
        assert!(USER.field_type("missing").is_none());
    }

    #[test]
    fn self_referential_schema() {
        let Some(FieldType::Model(inner)) = NODE.field_type("next") else {
            panic!("expected model descriptor");
        };
        assert_eq!(inner.type_name, "Node");
    }

    #[test]
    fn expected_kind_vocabulary() {
        assert_eq!(FieldType::String.expected_kind(), "string");
        assert_eq!(FieldType::Integer.expected_kind(), "number");
        assert_eq!(FieldType::Float.expected_kind(), "number");
        assert_eq!(FieldType::Boolean.expected_kind(), "boolean");
        assert_eq!(FieldType::Array(&FieldType::Any).expected_kind(), "array");
        assert_eq!(FieldType::Map(&FieldType::String).expected_kind(), "object");
        assert_eq!(FieldType::Model(&USER).expected_kind(), "object");
    }

    #[test]
    fn fields_preserve_declaration_order() {
        let fields: Vec<_> = USER.fields().collect();
        assert_eq!(
            fields,
            vec![("name", "userName"), ("age", "age"), ("tags", "tags")]
        );
    }
}
