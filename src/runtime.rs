//! Runtime option models generated clients pass into each call.
//!
//! [`RuntimeOptions`] is the per-call tuning bag: transport knobs for
//! [`do_action`](crate::http::do_action), the legacy backoff triple, and a
//! typed [`RetryOptions`](crate::retry::RetryOptions) policy. It is a
//! model like any generated one, so it casts from loosely-typed wire maps
//! and serializes back. The older snake_case wire names of the backoff
//! triple are kept as generated code in the field relies on them.
//!
//! # Examples
//!
//! ```
//! use keelson::runtime::RuntimeOptions;
//! use keelson::model::{Model, ModelObject};
//!
//! let options = RuntimeOptions {
//!     autoretry: Some(true),
//!     max_attempts: Some(3),
//!     read_timeout: Some(3000),
//!     ..Default::default()
//! };
//!
//! let map = options.to_map(false);
//! assert!(map.contains_key("max_attempts"));
//! assert!(map.contains_key("readTimeout"));
//!
//! let back = RuntimeOptions::from_map(&map).unwrap();
//! assert_eq!(back.read_timeout, Some(3000));
//! ```

use std::collections::BTreeMap;

use crate::document::{Document, DocumentMap};
use crate::error::Result;
use crate::model::{field, Model, ModelObject, Validate};
use crate::retry::RetryOptions;
use crate::schema::{FieldType, Schema};
use crate::stream::ByteStream;

/// Headers and query parameters appended to every request of a call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtendsParameters {
    /// Extra request headers.
    pub headers: Option<BTreeMap<String, String>>,
    /// Extra query parameters.
    pub queries: Option<BTreeMap<String, String>>,
}

static EXTENDS_PARAMETERS: Schema = Schema {
    type_name: "ExtendsParameters",
    names: &[("headers", "headers"), ("queries", "queries")],
    types: &[
        ("headers", FieldType::Map(&FieldType::String)),
        ("queries", FieldType::Map(&FieldType::String)),
    ],
};

impl Validate for ExtendsParameters {}

impl ModelObject for ExtendsParameters {
    fn to_map(&self, _without_stream: bool) -> DocumentMap {
        let mut map = DocumentMap::new();
        field::put_string_map(&mut map, "headers", self.headers.as_ref());
        field::put_string_map(&mut map, "queries", self.queries.as_ref());
        map
    }
}

impl Model for ExtendsParameters {
    fn schema() -> &'static Schema {
        &EXTENDS_PARAMETERS
    }

    fn from_map(map: &DocumentMap) -> Result<Self> {
        Ok(ExtendsParameters {
            headers: field::string_map(map, &EXTENDS_PARAMETERS, "headers")?,
            queries: field::string_map(map, &EXTENDS_PARAMETERS, "queries")?,
        })
    }
}

/// One file in a multipart form upload.
#[derive(Debug, Clone, Default)]
pub struct FileField {
    /// Filename reported to the server.
    pub filename: Option<String>,
    /// MIME type of the part.
    pub content_type: Option<String>,
    /// The file content.
    pub content: Option<ByteStream>,
}

static FILE_FIELD: Schema = Schema {
    type_name: "FileField",
    names: &[
        ("filename", "filename"),
        ("content_type", "contentType"),
        ("content", "content"),
    ],
    types: &[
        ("filename", FieldType::String),
        ("content_type", FieldType::String),
        ("content", FieldType::Stream),
    ],
};

impl Validate for FileField {}

impl ModelObject for FileField {
    fn to_map(&self, without_stream: bool) -> DocumentMap {
        let mut map = DocumentMap::new();
        field::put(&mut map, "filename", self.filename.clone());
        field::put(&mut map, "contentType", self.content_type.clone());
        field::put_stream(&mut map, "content", self.content.as_ref(), without_stream);
        map
    }
}

impl Model for FileField {
    fn schema() -> &'static Schema {
        &FILE_FIELD
    }

    fn from_map(map: &DocumentMap) -> Result<Self> {
        Ok(FileField {
            filename: field::string(map, &FILE_FIELD, "filename")?,
            content_type: field::string(map, &FILE_FIELD, "content_type")?,
            content: field::stream(map, &FILE_FIELD, "content")?,
        })
    }
}

/// Per-call runtime tuning.
///
/// `max_attempts`, `backoff_policy`, and `backoff_period` feed the legacy
/// retry helpers; `retry_options` carries the typed policy. Everything is
/// optional, and absent fields stay off the wire.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    /// Typed retry policy.
    pub retry_options: Option<RetryOptions>,
    /// Legacy switch for the built-in retry loop.
    pub autoretry: Option<bool>,
    /// Skip TLS certificate verification.
    pub ignore_ssl: Option<bool>,
    /// Client key, PEM.
    pub key: Option<String>,
    /// Client certificate, PEM.
    pub cert: Option<String>,
    /// Trusted root certificates, PEM.
    pub ca: Option<String>,
    /// Legacy retry attempt bound.
    pub max_attempts: Option<i64>,
    /// Legacy backoff policy name.
    pub backoff_policy: Option<String>,
    /// Legacy backoff period in milliseconds.
    pub backoff_period: Option<i64>,
    /// Whole-exchange timeout in milliseconds.
    pub read_timeout: Option<i64>,
    /// Connection timeout in milliseconds.
    pub connect_timeout: Option<i64>,
    /// Proxy for plain HTTP requests.
    pub http_proxy: Option<String>,
    /// Proxy for HTTPS requests.
    pub https_proxy: Option<String>,
    /// Hosts excluded from proxying.
    pub no_proxy: Option<String>,
    /// Connection pool bound.
    pub max_idle_conns: Option<i64>,
    /// Keep connections alive between calls.
    pub keep_alive: Option<bool>,
    /// Headers and queries appended to every request.
    pub extends_parameters: Option<ExtendsParameters>,
}

static RUNTIME_OPTIONS: Schema = Schema {
    type_name: "RuntimeOptions",
    names: &[
        ("retry_options", "retryOptions"),
        ("autoretry", "autoretry"),
        ("ignore_ssl", "ignoreSSL"),
        ("key", "key"),
        ("cert", "cert"),
        ("ca", "ca"),
        ("max_attempts", "max_attempts"),
        ("backoff_policy", "backoff_policy"),
        ("backoff_period", "backoff_period"),
        ("read_timeout", "readTimeout"),
        ("connect_timeout", "connectTimeout"),
        ("http_proxy", "httpProxy"),
        ("https_proxy", "httpsProxy"),
        ("no_proxy", "noProxy"),
        ("max_idle_conns", "maxIdleConns"),
        ("keep_alive", "keepAlive"),
        ("extends_parameters", "extendsParameters"),
    ],
    types: &[
        ("retry_options", FieldType::Any),
        ("autoretry", FieldType::Boolean),
        ("ignore_ssl", FieldType::Boolean),
        ("key", FieldType::String),
        ("cert", FieldType::String),
        ("ca", FieldType::String),
        ("max_attempts", FieldType::Number),
        ("backoff_policy", FieldType::String),
        ("backoff_period", FieldType::Number),
        ("read_timeout", FieldType::Number),
        ("connect_timeout", FieldType::Number),
        ("http_proxy", FieldType::String),
        ("https_proxy", FieldType::String),
        ("no_proxy", FieldType::String),
        ("max_idle_conns", FieldType::Number),
        ("keep_alive", FieldType::Boolean),
        ("extends_parameters", FieldType::Model(&EXTENDS_PARAMETERS)),
    ],
};

impl Validate for RuntimeOptions {}

impl ModelObject for RuntimeOptions {
    fn to_map(&self, without_stream: bool) -> DocumentMap {
        let mut map = DocumentMap::new();
        if let Some(options) = &self.retry_options {
            if let Ok(value) = serde_json::to_value(options) {
                field::put(&mut map, "retryOptions", Some(Document::from_json(value)));
            }
        }
        field::put(&mut map, "autoretry", self.autoretry);
        field::put(&mut map, "ignoreSSL", self.ignore_ssl);
        field::put(&mut map, "key", self.key.clone());
        field::put(&mut map, "cert", self.cert.clone());
        field::put(&mut map, "ca", self.ca.clone());
        field::put(&mut map, "max_attempts", self.max_attempts);
        field::put(&mut map, "backoff_policy", self.backoff_policy.clone());
        field::put(&mut map, "backoff_period", self.backoff_period);
        field::put(&mut map, "readTimeout", self.read_timeout);
        field::put(&mut map, "connectTimeout", self.connect_timeout);
        field::put(&mut map, "httpProxy", self.http_proxy.clone());
        field::put(&mut map, "httpsProxy", self.https_proxy.clone());
        field::put(&mut map, "noProxy", self.no_proxy.clone());
        field::put(&mut map, "maxIdleConns", self.max_idle_conns);
        field::put(&mut map, "keepAlive", self.keep_alive);
        field::put_model(
            &mut map,
            "extendsParameters",
            self.extends_parameters.as_ref(),
            without_stream,
        );
        map
    }
}

impl Model for RuntimeOptions {
    fn schema() -> &'static Schema {
        &RUNTIME_OPTIONS
    }

    fn from_map(map: &DocumentMap) -> Result<Self> {
        let retry_options = match field::any(map, &RUNTIME_OPTIONS, "retry_options")? {
            Some(document) => Some(serde_json::from_value(document.to_json())?),
            None => None,
        };
        Ok(RuntimeOptions {
            retry_options,
            autoretry: field::boolean(map, &RUNTIME_OPTIONS, "autoretry")?,
            ignore_ssl: field::boolean(map, &RUNTIME_OPTIONS, "ignore_ssl")?,
            key: field::string(map, &RUNTIME_OPTIONS, "key")?,
            cert: field::string(map, &RUNTIME_OPTIONS, "cert")?,
            ca: field::string(map, &RUNTIME_OPTIONS, "ca")?,
            max_attempts: field::integer(map, &RUNTIME_OPTIONS, "max_attempts")?,
            backoff_policy: field::string(map, &RUNTIME_OPTIONS, "backoff_policy")?,
            backoff_period: field::integer(map, &RUNTIME_OPTIONS, "backoff_period")?,
            read_timeout: field::integer(map, &RUNTIME_OPTIONS, "read_timeout")?,
            connect_timeout: field::integer(map, &RUNTIME_OPTIONS, "connect_timeout")?,
            http_proxy: field::string(map, &RUNTIME_OPTIONS, "http_proxy")?,
            https_proxy: field::string(map, &RUNTIME_OPTIONS, "https_proxy")?,
            no_proxy: field::string(map, &RUNTIME_OPTIONS, "no_proxy")?,
            max_idle_conns: field::integer(map, &RUNTIME_OPTIONS, "max_idle_conns")?,
            keep_alive: field::boolean(map, &RUNTIME_OPTIONS, "keep_alive")?,
            extends_parameters: field::model(map, &RUNTIME_OPTIONS, "extends_parameters")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::cast;
    use crate::retry::{BackoffPolicy, RetryCondition};

    #[test]
    fn wire_names_mix_snake_and_camel() {
        let options = RuntimeOptions {
            max_attempts: Some(3),
            backoff_policy: Some("fixed".to_string()),
            backoff_period: Some(100),
            read_timeout: Some(3000),
            ignore_ssl: Some(true),
            ..Default::default()
        };
        let map = options.to_map(false);

        assert!(map.contains_key("max_attempts"));
        assert!(map.contains_key("backoff_policy"));
        assert!(map.contains_key("backoff_period"));
        assert!(map.contains_key("readTimeout"));
        assert!(map.contains_key("ignoreSSL"));
    }

    #[test]
    fn retry_options_round_trip_through_the_wire_shape() {
        let options = RuntimeOptions {
            retry_options: Some(RetryOptions {
                retryable: true,
                retry_condition: vec![RetryCondition {
                    max_attempts: 3,
                    backoff: Some(BackoffPolicy::Fixed { period: 1000 }),
                    exception: vec!["ThrottlingError".to_string()],
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        };

        let map = options.to_map(false);
        let Some(Document::Object(wire)) = map.get("retryOptions") else {
            panic!("expected retryOptions object");
        };
        assert_eq!(wire.get("retryable"), Some(&Document::Bool(true)));

        let back = RuntimeOptions::from_map(&map).unwrap();
        let retry = back.retry_options.unwrap();
        assert!(retry.retryable);
        assert_eq!(retry.retry_condition[0].max_attempts, 3);
        assert_eq!(
            retry.retry_condition[0].backoff,
            Some(BackoffPolicy::Fixed { period: 1000 }),
        );
    }

    #[test]
    fn casts_from_a_sloppy_wire_map() {
        let raw = Document::from_json(serde_json::json!({
            "autoretry": "true",
            "max_attempts": "3",
            "readTimeout": 3000,
            "retryOptions": {"retryable": true},
        }));

        let options: RuntimeOptions = cast(&raw).unwrap();
        assert_eq!(options.autoretry, Some(true));
        assert_eq!(options.max_attempts, Some(3));
        assert_eq!(options.read_timeout, Some(3000));
        assert!(options.retry_options.unwrap().retryable);
    }

    #[test]
    fn extends_parameters_nest() {
        let mut headers = BTreeMap::new();
        headers.insert("x-trace".to_string(), "on".to_string());
        let options = RuntimeOptions {
            extends_parameters: Some(ExtendsParameters {
                headers: Some(headers.clone()),
                queries: None,
            }),
            ..Default::default()
        };

        let map = options.to_map(false);
        let back = RuntimeOptions::from_map(&map).unwrap();
        assert_eq!(back.extends_parameters.unwrap().headers, Some(headers));
    }

    #[test]
    fn file_field_copy_leaves_the_stream_behind() {
        let file = FileField {
            filename: Some("report.csv".to_string()),
            content_type: Some("text/csv".to_string()),
            content: Some(ByteStream::from("a,b".to_string())),
        };

        let copy = file.copy_without_stream().unwrap();
        assert_eq!(copy.filename.as_deref(), Some("report.csv"));
        assert!(copy.content.is_none());

        let full = FileField::from_map(&file.to_map(false)).unwrap();
        assert!(full.content.is_some());
    }
}
