//! XML bodies for services that never moved to JSON.
//!
//! [`parse_xml`] reads a document into a [`DocumentMap`] shaped the way the
//! generated models expect it: attributes live under a `"$"` key, mixed text
//! under `"_"`, and repeated sibling elements collapse into an array. Every
//! scalar comes out as a string, so [`parse_xml`] optionally takes a
//! [`Schema`] and coerces the tree into the field types the model declares.
//! [`to_xml`] goes the other way and renders a map as a pretty-printed
//! document.
//!
//! ## Examples
//!
//! ```
//! use keelson::xml::parse_xml;
//! use keelson::Document;
//!
//! let body = "<Error><Code>Throttling</Code><Count>3</Count></Error>";
//! let parsed = parse_xml(body, None)?;
//! let error = parsed.get("Error").and_then(Document::as_object).unwrap();
//!
//! assert_eq!(error.get("Code"), Some(&Document::from("Throttling")));
//! // Without a schema every scalar stays a string.
//! assert_eq!(error.get("Count"), Some(&Document::from("3")));
//! # Ok::<(), keelson::Error>(())
//! ```

use quick_xml::events::Event;

use crate::document::{Document, DocumentMap};
use crate::error::{Error, Result};
use crate::schema::{FieldType, Schema};

/// Parses an XML document into a [`DocumentMap`] keyed by the root element.
///
/// With a [`Schema`] the parsed tree is passed through [`xml_cast`] so that
/// numeric and boolean strings become real numbers and booleans, wrapped
/// single elements become arrays, and nested models get their defaults.
///
/// # Errors
///
/// Returns [`Error::Xml`] when the document is not well formed and
/// [`Error::MalformedXml`] when it has no root element or ends with open
/// tags.
pub fn parse_xml(body: &str, schema: Option<&Schema>) -> Result<DocumentMap> {
    let parsed = parse_document(body)?;
    match schema {
        Some(schema) => Ok(xml_cast(&Document::Object(parsed), schema)),
        None => Ok(parsed),
    }
}

/// Renders a [`DocumentMap`] as a pretty-printed XML document.
///
/// Each entry of the map becomes a root-level element. Nested maps become
/// child elements, a `"$"` entry supplies attributes, `"_"` supplies element
/// text, and arrays repeat the enclosing tag per item. Scalars are escaped;
/// elements with no content render as `<name/>`.
///
/// ## Examples
///
/// ```
/// use keelson::xml::to_xml;
/// use keelson::Document;
///
/// let mut body = keelson::DocumentMap::new();
/// body.insert("Code".to_string(), Document::from("NoSuchKey"));
///
/// assert_eq!(
///     to_xml(&body),
///     "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<Code>NoSuchKey</Code>",
/// );
/// ```
pub fn to_xml(body: &DocumentMap) -> String {
    let mut out = String::from(XML_DECLARATION);
    for (name, value) in body {
        write_element(&mut out, name, value, 0);
    }
    out
}

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>";

/// Coerces a parsed XML tree into the shape a schema declares.
///
/// XML carries no types, so every scalar arrives as a string. This walks the
/// schema's fields and converts each present value to the declared type:
/// `"false"` and empty strings become `false`, numeric strings become
/// numbers (absent ones become NaN), a single element declared as an array
/// is wrapped, and nested models recurse. Absent fields of model type still
/// produce an object with default values, matching what generated response
/// models expect. Fields the schema does not describe are dropped.
///
/// The result is keyed by wire names and never fails; values that cannot be
/// represented in the declared type degrade to the type's empty value.
pub fn xml_cast(raw: &Document, schema: &Schema) -> DocumentMap {
    let empty = DocumentMap::new();
    let entries = raw.as_object().unwrap_or(&empty);
    let mut out = DocumentMap::new();
    for (name, wire_name) in schema.fields() {
        let Some(field_type) = schema.field_type(name) else {
            continue;
        };
        let value = entries.get(wire_name);
        match field_type {
            FieldType::Boolean => {
                let flag = match value {
                    value if is_falsy(value) => false,
                    Some(Document::String(text)) => text != "false",
                    _ => true,
                };
                out.insert(wire_name.to_string(), Document::Bool(flag));
            }
            FieldType::Number | FieldType::Integer | FieldType::Float => {
                out.insert(wire_name.to_string(), cast_number(value));
            }
            FieldType::String => {
                out.insert(wire_name.to_string(), cast_string(value));
            }
            FieldType::Array(item_type) => {
                let items: Vec<Document> = match value {
                    value if is_falsy(value) => Vec::new(),
                    Some(Document::Array(items)) => items.clone(),
                    Some(single) => vec![single.clone()],
                    None => Vec::new(),
                };
                let items = match item_type {
                    FieldType::Model(item_schema) => items
                        .iter()
                        .map(|item| Document::Object(xml_cast(item, item_schema)))
                        .collect(),
                    _ => items,
                };
                out.insert(wire_name.to_string(), Document::Array(items));
            }
            FieldType::Model(model_schema) => {
                let nested = xml_cast(value.unwrap_or(&Document::Null), model_schema);
                out.insert(wire_name.to_string(), Document::Object(nested));
            }
            FieldType::Map(_) => {
                let document = match value {
                    None | Some(Document::Null) => Document::Object(DocumentMap::new()),
                    Some(other) => other.clone(),
                };
                out.insert(wire_name.to_string(), document);
            }
            FieldType::Any | FieldType::Bytes | FieldType::Stream => {
                if let Some(value) = value {
                    if !value.is_null() {
                        out.insert(wire_name.to_string(), value.clone());
                    }
                }
            }
        }
    }
    out
}

fn is_falsy(value: Option<&Document>) -> bool {
    match value {
        None | Some(Document::Null) => true,
        Some(Document::Bool(flag)) => !flag,
        Some(Document::Integer(number)) => *number == 0,
        Some(Document::Float(number)) => *number == 0.0 || number.is_nan(),
        Some(Document::String(text)) => text.is_empty(),
        Some(_) => false,
    }
}

fn cast_number(value: Option<&Document>) -> Document {
    match value {
        None | Some(Document::Null) => Document::Float(f64::NAN),
        Some(Document::Integer(number)) => Document::Integer(*number),
        Some(Document::Float(number)) => Document::Float(*number),
        Some(Document::Bool(flag)) => Document::Integer(i64::from(*flag)),
        Some(Document::String(text)) if text.is_empty() => Document::Integer(0),
        Some(Document::String(text)) => crate::cast::parse_number(text),
        Some(_) => Document::Float(f64::NAN),
    }
}

fn cast_string(value: Option<&Document>) -> Document {
    let text = match value {
        Some(Document::String(text)) => text.clone(),
        Some(Document::Integer(number)) => number.to_string(),
        Some(Document::Float(number)) if !number.is_nan() => number.to_string(),
        Some(Document::Bool(flag)) => flag.to_string(),
        _ => String::new(),
    };
    Document::String(text)
}

// One element in flight while reading. Attributes and children land in maps
// so repeated siblings can fold into arrays as they arrive.
struct Frame {
    name: String,
    attributes: DocumentMap,
    children: DocumentMap,
    text: String,
}

impl Frame {
    fn open(start: &quick_xml::events::BytesStart) -> Result<Frame> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = DocumentMap::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(quick_xml::Error::from)?
                .into_owned();
            attributes.insert(key, Document::String(value));
        }
        Ok(Frame {
            name,
            attributes,
            children: DocumentMap::new(),
            text: String::new(),
        })
    }

    fn finish(self) -> (String, Document) {
        if self.attributes.is_empty() && self.children.is_empty() {
            return (self.name, Document::String(self.text));
        }
        let mut map = self.children;
        if !self.attributes.is_empty() {
            map.insert("$".to_string(), Document::Object(self.attributes));
        }
        if !self.text.is_empty() {
            map.insert("_".to_string(), Document::String(self.text));
        }
        (self.name, Document::Object(map))
    }
}

fn parse_document(body: &str) -> Result<DocumentMap> {
    let mut reader = quick_xml::Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut document = DocumentMap::new();
    let mut stack: Vec<Frame> = Vec::new();
    loop {
        match reader.read_event().map_err(quick_xml::Error::from)? {
            Event::Start(start) => stack.push(Frame::open(&start)?),
            Event::Empty(start) => {
                let (name, value) = Frame::open(&start)?.finish();
                place(&mut stack, &mut document, name, value);
            }
            Event::End(_) => {
                let Some(frame) = stack.pop() else { continue };
                let (name, value) = frame.finish();
                place(&mut stack, &mut document, name, value);
            }
            Event::Text(text) => {
                if let Some(frame) = stack.last_mut() {
                    let text = text.decode().map_err(quick_xml::Error::from)?;
                    frame.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::GeneralRef(reference) => {
                if let Some(frame) = stack.last_mut() {
                    push_reference(&mut frame.text, &reference);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(Error::MalformedXml("unexpected end of document".to_string()));
    }
    if document.is_empty() {
        return Err(Error::MalformedXml("missing root element".to_string()));
    }
    Ok(document)
}

fn place(stack: &mut [Frame], document: &mut DocumentMap, name: String, value: Document) {
    match stack.last_mut() {
        Some(parent) => merge_child(&mut parent.children, name, value),
        None => merge_child(document, name, value),
    }
}

// Second occurrence of a sibling name promotes the existing value to an
// array; later ones append.
fn merge_child(map: &mut DocumentMap, name: String, value: Document) {
    match map.get_mut(&name) {
        Some(Document::Array(items)) => items.push(value),
        Some(existing) => {
            let first = std::mem::take(existing);
            *existing = Document::Array(vec![first, value]);
        }
        None => {
            map.insert(name, value);
        }
    }
}

// Entity references arrive as their own events when the tokenizer splits
// them out of text. Predefined and character references resolve here;
// anything else is dropped.
fn push_reference(text: &mut String, reference: &[u8]) {
    match reference {
        b"lt" => text.push('<'),
        b"gt" => text.push('>'),
        b"amp" => text.push('&'),
        b"apos" => text.push('\''),
        b"quot" => text.push('"'),
        _ => {
            let name = String::from_utf8_lossy(reference);
            let code = if let Some(hex) = name.strip_prefix("#x") {
                u32::from_str_radix(hex, 16).ok()
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse().ok()
            } else {
                None
            };
            if let Some(resolved) = code.and_then(char::from_u32) {
                text.push(resolved);
            }
        }
    }
}

fn write_element(out: &mut String, name: &str, value: &Document, depth: usize) {
    if let Document::Array(items) = value {
        for item in items {
            write_element(out, name, item, depth);
        }
        return;
    }

    out.push('\n');
    out.push_str(&"  ".repeat(depth));
    out.push('<');
    out.push_str(name);

    let mut text = String::new();
    let mut children: Vec<(&String, &Document)> = Vec::new();
    if let Document::Object(entries) = value {
        for (key, child) in entries {
            match key.as_str() {
                "$" => {
                    if let Document::Object(attributes) = child {
                        for (attribute, attribute_value) in attributes {
                            out.push(' ');
                            out.push_str(attribute);
                            out.push_str("=\"");
                            out.push_str(&escape(&scalar_text(attribute_value)));
                            out.push('"');
                        }
                    }
                }
                "_" => text = scalar_text(child),
                _ => children.push((key, child)),
            }
        }
    } else {
        text = scalar_text(value);
    }

    if children.is_empty() && text.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    if children.is_empty() {
        out.push_str(&escape(&text));
        out.push_str("</");
        out.push_str(name);
        out.push('>');
        return;
    }
    if !text.is_empty() {
        out.push('\n');
        out.push_str(&"  ".repeat(depth + 1));
        out.push_str(&escape(&text));
    }
    for (child_name, child) in children {
        write_element(out, child_name, child, depth + 1);
    }
    out.push('\n');
    out.push_str(&"  ".repeat(depth));
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn escape(raw: &str) -> String {
    quick_xml::escape::escape(raw).into_owned()
}

fn scalar_text(value: &Document) -> String {
    match value {
        Document::String(text) => text.clone(),
        Document::Integer(number) => number.to_string(),
        Document::Float(number) => number.to_string(),
        Document::Bool(flag) => flag.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    static GRANT_LIST: Schema = Schema {
        type_name: "AccessControlList",
        names: &[("grant", "Grant")],
        types: &[("grant", FieldType::String)],
    };

    static OWNER: Schema = Schema {
        type_name: "Owner",
        names: &[("id", "ID"), ("display_name", "DisplayName")],
        types: &[("id", FieldType::String), ("display_name", FieldType::String)],
    };

    static ACL_POLICY: Schema = Schema {
        type_name: "AccessControlPolicy",
        names: &[("owner", "Owner"), ("access_control_list", "AccessControlList")],
        types: &[
            ("owner", FieldType::Model(&OWNER)),
            ("access_control_list", FieldType::Model(&GRANT_LIST)),
        ],
    };

    static ACL_RESPONSE: Schema = Schema {
        type_name: "GetBucketAclResponse",
        names: &[("access_control_policy", "root")],
        types: &[("access_control_policy", FieldType::Model(&ACL_POLICY))],
    };

    // Rendered form with keys in map order.
    const ACL_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>
<root>
  <AccessControlList>
    <Grant>public-read</Grant>
  </AccessControlList>
  <Owner>
    <DisplayName>1325847523475998</DisplayName>
    <ID>1325847523475998</ID>
  </Owner>
</root>";

    #[test]
    fn parses_a_listing_document() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://doc.oss-cn-hangzhou.aliyuncs.com">
  <Name>oss-example</Name>
  <Prefix></Prefix>
  <MaxKeys>100</MaxKeys>
  <IsTruncated>false</IsTruncated>
  <Contents>
    <Key>fun/movie/001.avi</Key>
    <Size>344606</Size>
  </Contents>
  <Contents>
    <Key>fun/movie/007.avi</Key>
    <Size>144606</Size>
  </Contents>
</ListBucketResult>"#;

        let parsed = parse_xml(body, None).unwrap();
        let result = parsed
            .get("ListBucketResult")
            .and_then(Document::as_object)
            .unwrap();

        let attributes = result.get("$").and_then(Document::as_object).unwrap();
        assert_eq!(
            attributes.get("xmlns"),
            Some(&Document::from("http://doc.oss-cn-hangzhou.aliyuncs.com")),
        );

        // Scalars stay strings without a schema, and empty elements parse as
        // empty strings.
        assert_eq!(result.get("Name"), Some(&Document::from("oss-example")));
        assert_eq!(result.get("Prefix"), Some(&Document::from("")));
        assert_eq!(result.get("MaxKeys"), Some(&Document::from("100")));
        assert_eq!(result.get("IsTruncated"), Some(&Document::from("false")));

        let contents = result.get("Contents").and_then(Document::as_array).unwrap();
        assert_eq!(contents.len(), 2);
        assert_eq!(
            contents[0].get("Key"),
            Some(&Document::from("fun/movie/001.avi")),
        );
        assert_eq!(contents[1].get("Size"), Some(&Document::from("144606")));
    }

    #[test]
    fn parses_with_a_schema() {
        let parsed = parse_xml(ACL_XML, Some(&ACL_RESPONSE)).unwrap();
        let expected = Document::from_json(json!({
            "root": {
                "Owner": {
                    "ID": "1325847523475998",
                    "DisplayName": "1325847523475998",
                },
                "AccessControlList": {
                    "Grant": "public-read",
                },
            },
        }));
        assert_eq!(Document::Object(parsed), expected);
    }

    #[test]
    fn schema_fills_missing_models_with_defaults() {
        let body = "<Error><Code>AccessDenied</Code></Error>";
        let parsed = parse_xml(body, Some(&ACL_RESPONSE)).unwrap();

        // The root element the schema expects is absent, so every nested
        // model comes back with default values.
        let expected = Document::from_json(json!({
            "root": {
                "Owner": { "ID": "", "DisplayName": "" },
                "AccessControlList": { "Grant": "" },
            },
        }));
        assert_eq!(Document::Object(parsed), expected);
    }

    #[test]
    fn rejects_documents_without_a_root() {
        assert!(parse_xml("ddsfadf", None).is_err());
        assert!(parse_xml("ddsfadf", Some(&ACL_RESPONSE)).is_err());
        assert!(parse_xml("", None).is_err());
    }

    #[test]
    fn rejects_unclosed_documents() {
        assert!(parse_xml("<a><b>1</b>", None).is_err());
        assert!(parse_xml("<a><b>1</a>", None).is_err());
    }

    #[test]
    fn renders_nested_maps() {
        let body = Document::from_json(json!({
            "root": {
                "AccessControlList": { "Grant": "public-read" },
                "Owner": {
                    "DisplayName": "1325847523475998",
                    "ID": "1325847523475998",
                },
            },
        }));
        assert_eq!(to_xml(body.as_object().unwrap()), ACL_XML);

        // And the output reads back as the same tree.
        let reparsed = parse_xml(ACL_XML, None).unwrap();
        assert_eq!(Document::Object(reparsed), body);
    }

    #[test]
    fn renders_attributes_text_and_escapes() {
        let body = Document::from_json(json!({
            "note": {
                "$": { "lang": "en" },
                "_": "a < b",
            },
        }));
        let rendered = to_xml(body.as_object().unwrap());
        assert_eq!(
            rendered,
            format!("{XML_DECLARATION}\n<note lang=\"en\">a &lt; b</note>"),
        );

        let reparsed = parse_xml(&rendered, None).unwrap();
        assert_eq!(&Document::Object(reparsed), &body);
    }

    #[test]
    fn renders_arrays_and_empty_elements() {
        let body = Document::from_json(json!({
            "list": {
                "Item": ["1", "2"],
                "Marker": "",
            },
        }));
        let rendered = to_xml(body.as_object().unwrap());
        assert_eq!(
            rendered,
            format!(
                "{XML_DECLARATION}\n<list>\n  <Item>1</Item>\n  <Item>2</Item>\n  <Marker/>\n</list>",
            ),
        );
    }

    static CAST_ITEM: Schema = Schema {
        type_name: "CastItem",
        names: &[("string", "string")],
        types: &[("string", FieldType::String)],
    };

    static CAST_MODEL: Schema = Schema {
        type_name: "CastModel",
        names: &[
            ("boolean", "boolean"),
            ("bool_str", "boolStr"),
            ("number", "number"),
            ("nan_number", "NaNNumber"),
            ("string", "string"),
            ("array", "array"),
            ("not_array", "notArray"),
            ("empty_array", "emptyArray"),
            ("class_array", "classArray"),
            ("class_map", "classMap"),
            ("map", "map"),
        ],
        types: &[
            ("boolean", FieldType::Boolean),
            ("bool_str", FieldType::Boolean),
            ("number", FieldType::Number),
            ("nan_number", FieldType::Number),
            ("string", FieldType::String),
            ("array", FieldType::Array(&FieldType::String)),
            ("not_array", FieldType::Array(&FieldType::String)),
            ("empty_array", FieldType::Array(&FieldType::String)),
            ("class_array", FieldType::Array(&FieldType::Model(&CAST_ITEM))),
            ("class_map", FieldType::Model(&CAST_ITEM)),
            ("map", FieldType::Map(&FieldType::String)),
        ],
    };

    #[test]
    fn casts_parsed_scalars_to_declared_types() {
        let raw = Document::from_json(json!({
            "boolean": false,
            "boolStr": "true",
            "number": 1,
            "NaNNumber": null,
            "string": "string",
            "array": ["string1", "string2"],
            "notArray": "string",
            "classArray": [{ "string": "str1" }, { "string": "str2" }],
            "classMap": "",
            "map": { "string": "string" },
        }));

        let out = xml_cast(&raw, &CAST_MODEL);

        assert_eq!(out.get("boolean"), Some(&Document::Bool(false)));
        assert_eq!(out.get("boolStr"), Some(&Document::Bool(true)));
        assert_eq!(out.get("number"), Some(&Document::from(1i64)));
        assert!(matches!(out.get("NaNNumber"), Some(Document::Float(n)) if n.is_nan()));
        assert_eq!(out.get("string"), Some(&Document::from("string")));
        assert_eq!(
            out.get("array"),
            Some(&Document::from(vec![
                Document::from("string1"),
                Document::from("string2"),
            ])),
        );
        // A single element where an array was declared gets wrapped, and an
        // absent one becomes empty.
        assert_eq!(
            out.get("notArray"),
            Some(&Document::from(vec![Document::from("string")])),
        );
        assert_eq!(out.get("emptyArray"), Some(&Document::Array(Vec::new())));

        let class_array = out.get("classArray").and_then(Document::as_array).unwrap();
        assert_eq!(class_array[0].get("string"), Some(&Document::from("str1")));
        assert_eq!(class_array[1].get("string"), Some(&Document::from("str2")));

        // A falsy value in a model position expands to the model's defaults.
        let class_map = out.get("classMap").and_then(Document::as_object).unwrap();
        assert_eq!(class_map.get("string"), Some(&Document::from("")));

        let map = out.get("map").and_then(Document::as_object).unwrap();
        assert_eq!(map.get("string"), Some(&Document::from("string")));
    }

    #[test]
    fn numeric_cast_follows_loose_rules() {
        assert_eq!(cast_number(Some(&Document::from("3.2"))), Document::Float(3.2));
        assert_eq!(cast_number(Some(&Document::from("42"))), Document::from(42i64));
        assert_eq!(cast_number(Some(&Document::from(""))), Document::from(0i64));
        assert_eq!(cast_number(Some(&Document::Bool(true))), Document::from(1i64));
        assert!(matches!(cast_number(None), Document::Float(n) if n.is_nan()));
        assert!(
            matches!(cast_number(Some(&Document::from("garbage"))), Document::Float(n) if n.is_nan())
        );
    }
}
