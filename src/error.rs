//! Error types for the SDK runtime.
//!
//! Every failure surface of the runtime funnels into [`Error`]: schema and
//! type mismatches raised while casting, validation failures from generated
//! `validate` implementations, wire-level errors decoded from response
//! bodies, and retry exhaustion. The taxonomy is part of the retry contract:
//! [`Error::kind`] and [`Error::code`] are the strings retry conditions
//! match against.

use crate::document::{Document, DocumentMap};
use crate::http::{Request, Response};

/// The error type for every fallible runtime operation.
///
/// Diagnostic messages on the casting and validation variants are stable:
/// generated SDKs and their tests match on them.
///
/// # Examples
///
/// ```
/// use keelson::Error;
///
/// let err = Error::TypeMismatch {
///     field: "title".to_string(),
///     expected: "array",
///     actual: "string",
/// };
///
/// assert_eq!(
///     err.to_string(),
///     "type of title is mismatch, expect array, but string"
/// );
/// assert_eq!(err.kind(), "TypeMismatchError");
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A schema's name and type tables fell out of sync.
    ///
    /// Generated code emits both tables from the same field list, so this
    /// indicates a broken generator rather than bad input data.
    #[error("schema for {type_name} has no descriptor for field {field}")]
    SchemaMismatch {
        /// The model whose schema is inconsistent.
        type_name: String,
        /// The field missing from one of the tables.
        field: String,
    },

    /// A wire value could not be coerced to its declared field type.
    #[error("type of {field} is mismatch, expect {expected}, but {actual}")]
    TypeMismatch {
        /// The model field being cast.
        field: String,
        /// The kind the descriptor calls for.
        expected: &'static str,
        /// The kind the wire value actually had.
        actual: &'static str,
    },

    /// A declared validation rule failed.
    #[error("{code}: {message}")]
    Validation {
        /// The stable validation error code.
        code: String,
        /// A sentence naming the field and the violated rule.
        message: String,
    },

    /// The value handed to the cast engine was not an object.
    #[error("can not cast to Map")]
    CannotCast,

    /// A validation pattern failed to compile.
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// The server answered with an error body.
    #[error(transparent)]
    Response(#[from] ResponseError),

    /// An attempt failed and the retry policy allows another.
    ///
    /// Carries the request that failed and the response, when one arrived.
    #[error("request failed with a retryable error")]
    Retryable {
        /// The request of the failed attempt.
        request: Box<Request>,
        /// The response of the failed attempt, if the server answered.
        response: Option<Box<Response>>,
    },

    /// An attempt failed and the retry policy is exhausted.
    #[error("request failed and retries are exhausted")]
    Unretryable {
        /// The request of the final attempt.
        request: Box<Request>,
    },

    /// Invalid runtime configuration, such as an unusable HTTP method.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A network-level failure from the transport.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// An XML payload could not be parsed.
    #[error("Invalid XML: {0}")]
    Xml(#[from] quick_xml::Error),

    /// An XML payload was well-formed fragments but not a document.
    #[error("Invalid XML: {0}")]
    MalformedXml(String),

    /// A JSON payload could not be parsed.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A date string did not match any supported layout.
    #[error("Invalid date: {0}")]
    DateParse(#[from] time::error::Parse),
}

/// The stable code carried by every validation failure.
pub const VALIDATE_ERROR_CODE: &str = "SDK.ValidateError";

impl Error {
    /// Builds the error for an attempt that may be retried.
    pub fn retryable(request: Request, response: Option<Response>) -> Self {
        Error::Retryable {
            request: Box::new(request),
            response: response.map(Box::new),
        }
    }

    /// Builds the error for an attempt whose retry budget is spent.
    pub fn unretryable(request: Request) -> Self {
        Error::Unretryable {
            request: Box::new(request),
        }
    }

    /// Builds a validation failure with the stable code.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            code: VALIDATE_ERROR_CODE.to_string(),
            message: message.into(),
        }
    }

    /// The taxonomy name retry conditions match against.
    ///
    /// Response errors report the name carried in their body, falling back
    /// to `ResponseError`.
    pub fn kind(&self) -> &str {
        match self {
            Error::SchemaMismatch { .. } => "SchemaMismatchError",
            Error::TypeMismatch { .. } => "TypeMismatchError",
            Error::Validation { .. } => "ValidationError",
            Error::CannotCast => "CastError",
            Error::Pattern(_) => "ValidationError",
            Error::Response(response) => response.kind.as_deref().unwrap_or("ResponseError"),
            Error::Retryable { .. } => "RetryableError",
            Error::Unretryable { .. } => "UnretryableError",
            Error::Configuration(_) => "ConfigurationError",
            Error::Network(_) => "NetworkError",
            Error::InvalidUrl(_) => "InvalidUrlError",
            Error::Xml(_) | Error::MalformedXml(_) => "XmlError",
            Error::Json(_) => "JsonError",
            Error::DateParse(_) => "DateParseError",
        }
    }

    /// The error code retry conditions match against, when one exists.
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Validation { code, .. } => Some(code),
            Error::Response(response) => response.code.as_deref(),
            _ => None,
        }
    }

    /// The HTTP status carried by a response error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Response(response) => response.status_code,
            _ => None,
        }
    }

    /// The server-requested delay in milliseconds, when one was sent.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Error::Response(response) => response.retry_after,
            _ => None,
        }
    }

    /// Returns `true` if this error is worth another attempt.
    ///
    /// Retryable markers always are; network errors are when they were
    /// timeouts or connection failures.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Retryable { .. } => true,
            Error::Network(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }
}

/// An error decoded from a server's error body.
///
/// [`ResponseError::from_map`] accepts the wire shape generated SDKs build
/// from error payloads: `code`, `message`, `description`, `retryAfter`, an
/// optional `name` overriding the taxonomy kind, and a `data` object whose
/// `statusCode` entry carries the HTTP status.
#[derive(Debug, Clone, Default)]
pub struct ResponseError {
    /// Overriding taxonomy name, when the body carried one.
    pub kind: Option<String>,
    /// The service error code.
    pub code: Option<String>,
    /// The service error message.
    pub message: String,
    /// A longer human-readable description.
    pub description: Option<String>,
    /// The HTTP status, taken from `data.statusCode`.
    pub status_code: Option<u16>,
    /// Server-requested retry delay in milliseconds.
    pub retry_after: Option<u64>,
    /// Access control details some services attach to denials.
    pub access_denied_detail: Option<DocumentMap>,
    /// The raw error body.
    pub data: Option<DocumentMap>,
}

impl ResponseError {
    /// Decodes an error-shaped document.
    pub fn from_map(map: &DocumentMap) -> Self {
        let data = map.get("data").and_then(Document::as_object).cloned();
        let status_code = data
            .as_ref()
            .and_then(|data| data.get("statusCode"))
            .and_then(numeric)
            .filter(|status| *status != 0)
            .map(|status| status as u16);

        ResponseError {
            kind: text(map, "name"),
            code: text(map, "code"),
            message: text(map, "message").unwrap_or_default(),
            description: text(map, "description"),
            status_code,
            retry_after: map.get("retryAfter").and_then(numeric).map(|ms| ms as u64),
            access_denied_detail: map
                .get("accessDeniedDetail")
                .and_then(Document::as_object)
                .cloned(),
            data,
        }
    }
}

fn text(map: &DocumentMap, key: &str) -> Option<String> {
    map.get(key).and_then(Document::as_str).map(str::to_string)
}

fn numeric(value: &Document) -> Option<i64> {
    match value {
        Document::Integer(number) => Some(*number),
        Document::Float(number) => Some(*number as i64),
        Document::String(number) => number.parse().ok(),
        _ => None,
    }
}

impl std::fmt::Display for ResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{}: {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ResponseError {}

/// A specialized `Result` type for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;
