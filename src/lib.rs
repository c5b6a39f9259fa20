//! # Keelson - runtime support for generated API clients
//!
//! Keelson is the library generated HTTP API clients link against. The
//! generator emits the models and the call sites; this crate supplies
//! everything those emissions lean on: a dynamic document value for
//! wire-shaped data, schema descriptors and a cast engine that coerce loose
//! payloads into typed models, validation assertions with stable messages,
//! a declarative retry policy, streaming bodies with server-sent-event
//! decoding, and the XML, form, URL, and date utilities service protocols
//! keep needing. HTTP itself rides on `reqwest`.
//!
//! ## Quick Start
//!
//! A hand-written model the shape a generator emits, cast from a loosely
//! typed payload:
//!
//! ```
//! use keelson::model::{field, Model, ModelObject, Validate};
//! use keelson::schema::{FieldType, Schema};
//! use keelson::{Document, DocumentMap, Result};
//!
//! #[derive(Debug, Clone, Default, PartialEq)]
//! pub struct Job {
//!     pub name: Option<String>,
//!     pub attempts: Option<i64>,
//! }
//!
//! static JOB: Schema = Schema {
//!     type_name: "Job",
//!     names: &[("name", "name"), ("attempts", "attempts")],
//!     types: &[("name", FieldType::String), ("attempts", FieldType::Integer)],
//! };
//!
//! impl Validate for Job {}
//!
//! impl ModelObject for Job {
//!     fn to_map(&self, _without_stream: bool) -> DocumentMap {
//!         let mut map = DocumentMap::new();
//!         field::put(&mut map, "name", self.name.clone());
//!         field::put(&mut map, "attempts", self.attempts);
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
//!             name: field::string(map, &JOB, "name")?,
//!             attempts: field::integer(map, &JOB, "attempts")?,
//!         })
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     // Numbers often arrive as strings; the cast engine fixes that up.
//!     let raw = Document::from_json(serde_json::json!({
//!         "name": "index-rebuild",
//!         "attempts": "3",
//!     }));
//!
//!     let job: Job = keelson::cast(&raw)?;
//!     assert_eq!(job.attempts, Some(3));
//!     job.validate()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Dynamic documents** - A `Document` value and JSON bridge for payloads
//!   whose shape is only known at generation time
//! - **Schema-directed casting** - Recursive coercion of wire documents into
//!   model shape, with mismatches named field by field
//! - **Model validation** - Required/length/range/pattern assertions with
//!   the exact messages generated SDK tests match on
//! - **Declarative retries** - Conditions matched on error kind and code,
//!   fixed through jittered exponential backoff, `Retry-After` awareness
//! - **Streaming bodies** - Replayable byte streams over `reqwest` plus an
//!   incremental server-sent-event decoder
//! - **XML and form interop** - Attribute-preserving XML parsing and
//!   rendering, urlencoded form bodies, multipart boundaries
//! - **Structured logging** - `tracing` on request, cast, and retry
//!   decisions
//!
//! ## Error Handling
//!
//! Errors carry a taxonomy name (`kind`) retry conditions match on, and
//! service error bodies decode into [`ResponseError`]:
//!
//! ```
//! use keelson::{Document, DocumentMap, Error, ResponseError};
//!
//! let mut body = DocumentMap::new();
//! body.insert("code".to_string(), Document::from("Throttling.User"));
//! body.insert("message".to_string(), Document::from("request rate too high"));
//!
//! let err = Error::from(ResponseError::from_map(&body));
//! assert_eq!(err.kind(), "ResponseError");
//! assert_eq!(err.code(), Some("Throttling.User"));
//! assert_eq!(err.to_string(), "Throttling.User: request rate too high");
//! ```
//!
//! ## Retry Policies
//!
//! A retry policy is data: conditions that match errors, each with an
//! attempt budget and a backoff curve. The decision helpers take the policy
//! and a context describing the attempt that just failed:
//!
//! ```
//! use keelson::retry::{self, BackoffPolicy, RetryCondition, RetryOptions, RetryPolicyContext};
//! use keelson::{DocumentMap, Error, ResponseError};
//!
//! let options = RetryOptions {
//!     retryable: true,
//!     retry_condition: vec![RetryCondition {
//!         max_attempts: 3,
//!         backoff: Some(BackoffPolicy::Fixed { period: 250 }),
//!         exception: vec!["ResponseError".to_string()],
//!         ..Default::default()
//!     }],
//!     ..Default::default()
//! };
//!
//! let failure = Error::from(ResponseError::from_map(&DocumentMap::new()));
//! let ctx = RetryPolicyContext::new(1).with_exception(failure);
//!
//! assert!(retry::should_retry(Some(&options), &ctx));
//! assert_eq!(retry::backoff_delay(&options, &ctx), 250);
//! ```

pub mod cast;
pub mod date;
pub mod document;
pub mod error;
pub mod form;
pub mod http;
pub mod model;
pub mod retry;
pub mod runtime;
pub mod schema;
pub mod stream;
pub mod url;
pub mod xml;

pub use cast::cast;
pub use document::{Document, DocumentMap};
pub use error::{Error, ResponseError, Result};
pub use http::{build_url, do_action, Request, Response};
pub use model::{Model, ModelObject, Validate};
pub use retry::{BackoffPolicy, RetryCondition, RetryOptions, RetryPolicyContext};
pub use runtime::{ExtendsParameters, FileField, RuntimeOptions};
pub use schema::{FieldType, Schema};
pub use stream::{ByteStream, SseDecoder, SseEvent, SseEventReader};
