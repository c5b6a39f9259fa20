//! Form bodies: `application/x-www-form-urlencoded` strings and multipart
//! boundaries.
//!
//! ## Examples
//!
//! ```
//! use keelson::form::to_form_string;
//! use keelson::{Document, DocumentMap};
//!
//! let mut form = DocumentMap::new();
//! form.insert("name".to_string(), Document::from("Jack Ma"));
//! form.insert("age".to_string(), Document::from(48i64));
//!
//! assert_eq!(to_form_string(&form), "age=48&name=Jack%20Ma");
//! ```

use rand::Rng;

use crate::document::{Document, DocumentMap};
use crate::url::url_encode;

/// Renders a document map as an `application/x-www-form-urlencoded` body.
///
/// Keys and string values are percent-encoded. Arrays repeat the key once
/// per element; null, byte, and stream values are skipped, and nested maps
/// contribute the key with an empty value.
pub fn to_form_string(form: &DocumentMap) -> String {
    let mut pairs: Vec<String> = Vec::new();
    for (key, value) in form {
        append_pair(&mut pairs, key, value);
    }
    pairs.join("&")
}

fn append_pair(pairs: &mut Vec<String>, key: &str, value: &Document) {
    match value {
        Document::Null | Document::Bytes(_) | Document::Stream(_) => {}
        Document::Array(items) => {
            for item in items {
                append_pair(pairs, key, item);
            }
        }
        Document::Object(_) => pairs.push(format!("{}=", url_encode(key))),
        Document::String(text) => {
            pairs.push(format!("{}={}", url_encode(key), url_encode(text)));
        }
        Document::Integer(number) => pairs.push(format!("{}={}", url_encode(key), number)),
        Document::Float(number) => pairs.push(format!("{}={}", url_encode(key), number)),
        Document::Bool(flag) => pairs.push(format!("{}={}", url_encode(key), flag)),
    }
}

/// Generates a multipart boundary: `boundary` followed by twelve random
/// lowercase hex characters.
pub fn get_boundary() -> String {
    let mut rng = rand::thread_rng();
    let mut boundary = String::from("boundary");
    for _ in 0..12 {
        let digit = rng.gen_range(0..16u32);
        boundary.push(char::from_digit(digit, 16).unwrap_or('0'));
    }
    boundary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::ByteStream;

    #[test]
    fn encodes_keys_and_values() {
        let mut form = DocumentMap::new();
        form.insert("a key".to_string(), Document::from("a value"));
        form.insert("verbose".to_string(), Document::Bool(true));
        form.insert("page".to_string(), Document::from(3i64));

        assert_eq!(to_form_string(&form), "a%20key=a%20value&page=3&verbose=true");
    }

    #[test]
    fn skips_values_that_have_no_text_form() {
        let mut form = DocumentMap::new();
        form.insert("keep".to_string(), Document::from("yes"));
        form.insert("gone".to_string(), Document::Null);
        form.insert("binary".to_string(), Document::Bytes(vec![1, 2, 3]));
        form.insert(
            "upload".to_string(),
            Document::Stream(ByteStream::from_bytes("data")),
        );

        assert_eq!(to_form_string(&form), "keep=yes");
    }

    #[test]
    fn repeats_keys_for_array_values() {
        let mut form = DocumentMap::new();
        form.insert(
            "tag".to_string(),
            Document::from(vec![Document::from("a"), Document::from("b")]),
        );

        assert_eq!(to_form_string(&form), "tag=a&tag=b");
    }

    #[test]
    fn nested_maps_contribute_an_empty_value() {
        let mut form = DocumentMap::new();
        form.insert("nested".to_string(), Document::Object(DocumentMap::new()));

        assert_eq!(to_form_string(&form), "nested=");
    }

    #[test]
    fn empty_forms_render_empty() {
        assert_eq!(to_form_string(&DocumentMap::new()), "");
    }

    #[test]
    fn boundaries_are_boundary_plus_twelve_hex_chars() {
        let boundary = get_boundary();
        assert!(boundary.starts_with("boundary"));
        assert_eq!(boundary.len(), 20);
        assert!(boundary["boundary".len()..]
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        // Two draws almost never collide.
        assert_ne!(get_boundary(), get_boundary());
    }
}
