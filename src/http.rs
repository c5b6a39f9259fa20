//! HTTP value objects and the transport call.
//!
//! Generated clients assemble a [`Request`] field by field, turn it into a
//! URL with [`build_url`], and hand it to [`do_action`] for a single
//! attempt over the wire. The [`Response`] keeps its body as a
//! [`ByteStream`] so callers choose between buffering and chunked reads.
//!
//! # Examples
//!
//! ```
//! use keelson::http::{build_url, Request};
//!
//! let mut request = Request::new();
//! request.headers.insert("host".to_string(), "api.example.com".to_string());
//! request.pathname = "/v2/status".to_string();
//! request.query.insert("detail".to_string(), "full".to_string());
//!
//! assert_eq!(build_url(&request), "http://api.example.com/v2/status?detail=full");
//! ```

use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use crate::error::{Error, Result};
use crate::runtime::RuntimeOptions;
use crate::stream::ByteStream;
use crate::url::url_encode;

/// An HTTP request under assembly.
///
/// The target host travels in the `host` header, the way generated code
/// fills these in. All fields are public; there is no builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// URL scheme, `http` unless overridden.
    pub protocol: String,
    /// Explicit port; omitted from the URL when `None`.
    pub port: Option<u16>,
    /// HTTP method, uppercased before sending.
    pub method: String,
    /// Path component, may already carry a query string.
    pub pathname: String,
    /// Query parameters appended to the URL.
    pub query: BTreeMap<String, String>,
    /// Request headers, including `host`.
    pub headers: BTreeMap<String, String>,
    /// Request body, when there is one.
    pub body: Option<ByteStream>,
}

impl Request {
    /// Creates an empty GET request over `http`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for Request {
    fn default() -> Self {
        Request {
            protocol: "http".to_string(),
            port: None,
            method: "GET".to_string(),
            pathname: String::new(),
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            body: None,
        }
    }
}

/// Renders a request into its full URL.
///
/// Query parameters are percent-encoded and appended with `?`, or with
/// `&` when the pathname already carries a query string. Every pair is
/// included, empty values too.
pub fn build_url(request: &Request) -> String {
    let host = request
        .headers
        .get("host")
        .map(String::as_str)
        .unwrap_or_default();
    let mut url = format!("{}://{}", request.protocol, host);
    if let Some(port) = request.port {
        url.push_str(&format!(":{port}"));
    }
    url.push_str(&request.pathname);

    if !request.query.is_empty() {
        url.push(if url.contains('?') { '&' } else { '?' });
        let query = request
            .query
            .iter()
            .map(|(key, value)| format!("{}={}", url_encode(key), url_encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        url.push_str(&query);
    }
    url
}

/// An HTTP response with its body left unread.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code.
    pub status_code: u16,
    /// Canonical reason phrase for the status.
    pub status_message: String,
    /// Response headers with lowercased names.
    pub headers: BTreeMap<String, String>,
    /// The response body.
    pub body: ByteStream,
}

impl Response {
    /// Captures the status line and headers, keeping the body streaming.
    pub fn new(response: reqwest::Response) -> Self {
        let status = response.status();
        let mut headers = BTreeMap::new();
        for (name, value) in response.headers() {
            headers.insert(
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }
        Response {
            status_code: status.as_u16(),
            status_message: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: ByteStream::from_response(response),
        }
    }

    /// The `retry-after` header in milliseconds, when present.
    ///
    /// Accepts both delta-seconds and HTTP-date forms; a date already in
    /// the past reads as zero.
    pub fn retry_after(&self) -> Option<u64> {
        let value = self.headers.get("retry-after")?;
        if let Ok(seconds) = value.trim().parse::<u64>() {
            return Some(seconds * 1000);
        }
        let when = httpdate::parse_http_date(value).ok()?;
        Some(
            when.duration_since(SystemTime::now())
                .map(|delay| delay.as_millis() as u64)
                .unwrap_or(0),
        )
    }

    /// Buffers the whole body.
    pub async fn read_bytes(&self) -> Result<Vec<u8>> {
        self.body.read_as_bytes().await
    }
}

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

fn shared_client() -> reqwest::Client {
    SHARED_CLIENT.get_or_init(reqwest::Client::new).clone()
}

fn client_for(runtime: Option<&RuntimeOptions>) -> Result<reqwest::Client> {
    let Some(runtime) = runtime else {
        return Ok(shared_client());
    };

    let ignore_ssl = runtime.ignore_ssl.unwrap_or(false);
    let connect_timeout = runtime.connect_timeout.filter(|ms| *ms > 0);
    let needs_custom = ignore_ssl
        || connect_timeout.is_some()
        || runtime.http_proxy.is_some()
        || runtime.https_proxy.is_some();
    if !needs_custom {
        return Ok(shared_client());
    }

    let mut builder = reqwest::Client::builder();
    if ignore_ssl {
        builder = builder.danger_accept_invalid_certs(true);
    }
    if let Some(ms) = connect_timeout {
        builder = builder.connect_timeout(Duration::from_millis(ms as u64));
    }
    let no_proxy = runtime
        .no_proxy
        .as_deref()
        .and_then(reqwest::NoProxy::from_string);
    if let Some(proxy) = &runtime.http_proxy {
        builder = builder.proxy(reqwest::Proxy::http(proxy)?.no_proxy(no_proxy.clone()));
    }
    if let Some(proxy) = &runtime.https_proxy {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?.no_proxy(no_proxy));
    }
    Ok(builder.build()?)
}

/// Performs one HTTP attempt.
///
/// The runtime options supply transport tuning: `read_timeout` bounds the
/// whole exchange, while `connect_timeout`, `ignore_ssl`, and the proxy
/// settings switch to a dedicated client. A body is sent only for methods
/// other than GET and HEAD. Retrying is the caller's loop; this function
/// sends exactly once.
pub async fn do_action(request: &Request, runtime: Option<&RuntimeOptions>) -> Result<Response> {
    let url = build_url(request);
    let method = http::Method::from_bytes(request.method.to_uppercase().as_bytes())
        .map_err(|_| Error::Configuration(format!("invalid HTTP method: {}", request.method)))?;
    let client = client_for(runtime)?;

    tracing::debug!(method = %method, url = %url, "sending request");

    let carries_body = !matches!(method, http::Method::GET | http::Method::HEAD);
    let mut builder = client.request(method, url.as_str());
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(read_timeout) = runtime.and_then(|r| r.read_timeout).filter(|ms| *ms > 0) {
        builder = builder.timeout(Duration::from_millis(read_timeout as u64));
    }
    if let Some(body) = &request.body {
        if carries_body {
            builder = builder.body(body.read_as_bytes().await?);
        }
    }

    let response = builder.send().await?;
    let response = Response::new(response);
    tracing::debug!(
        status = response.status_code,
        reason = %response.status_message,
        "received response"
    );
    Ok(response)
}
