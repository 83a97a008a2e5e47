//! Transport seam between the request pipeline and the BrainQuiz backend

mod http;

pub use self::http::HttpTransport;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use serde_json::{Value, json};

use crate::cache::ResponseCache;
use crate::error::{Error, Result};

/// Transport trait for backend communication
///
/// Implementations perform exactly one network exchange per call. They never
/// retry and never cache.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return the raw response
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse>;
}

/// A fully-resolved outbound request
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL including any query string
    pub url: String,
    /// Headers with lower-cased names
    pub headers: BTreeMap<String, String>,
    /// JSON body
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Create a request with no headers and no body
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Set a header; names are compared case-insensitively
    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Attach a JSON body
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// `true` for GET requests, the only ones eligible for caching
    #[must_use]
    pub fn is_read(&self) -> bool {
        self.method == Method::GET
    }

    /// Cache key covering the URL, method, headers and body
    #[must_use]
    pub fn cache_key(&self) -> String {
        let options = json!({
            "method": self.method.as_str(),
            "headers": self.headers,
            "body": self.body,
        });
        ResponseCache::build_key(&self.url, &options)
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Raw response as received from the wire
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// `Content-Type` header, if present
    pub content_type: Option<String>,
    /// Response body
    pub body: Bytes,
}

impl RawResponse {
    /// Convenience constructor for a JSON response
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            content_type: Some("application/json; charset=utf-8".to_string()),
            body: Bytes::from(body.to_string()),
        }
    }
}

/// Turn a raw response into the backend's JSON envelope
///
/// - A missing or non-JSON content type, or an unparseable body, is
///   [`Error::InvalidResponse`].
/// - A non-2xx status is [`Error::Server`] with the body's `message`, or
///   `Server error: <status>` when there is none.
/// - `success: false` on a 2xx status is [`Error::Rejected`].
pub fn interpret(response: RawResponse) -> Result<Value> {
    let is_json = response
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"));
    if !is_json {
        return Err(Error::InvalidResponse);
    }

    let data: Value = serde_json::from_slice(&response.body).map_err(|_| Error::InvalidResponse)?;

    if !(200..300).contains(&response.status) {
        let message = message_of(&data)
            .unwrap_or_else(|| format!("Server error: {}", response.status));
        return Err(Error::server(response.status, message));
    }

    if data.get("success").and_then(Value::as_bool) == Some(false) {
        let message = message_of(&data).unwrap_or_else(|| "Request failed".to_string());
        return Err(Error::Rejected(message));
    }

    Ok(data)
}

/// `true` when the envelope carries `success: true`
#[must_use]
pub fn is_logical_success(data: &Value) -> bool {
    data.get("success").and_then(Value::as_bool) == Some(true)
}

fn message_of(data: &Value) -> Option<String> {
    data.get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}
