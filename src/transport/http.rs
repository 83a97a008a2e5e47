//! HTTP transport over `reqwest`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Client,
    header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
use tracing::debug;

use super::{ApiRequest, RawResponse, Transport};
use crate::{Error, Result};

/// HTTP transport for the BrainQuiz backend
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a new HTTP transport with a per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self { client })
    }

    fn header_map(request: &ApiRequest) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = name
                .parse::<HeaderName>()
                .map_err(|_| Error::Validation(format!("Invalid header name: {name}")))?;
            // Don't echo the value, it may be a credential
            let value = value
                .parse::<HeaderValue>()
                .map_err(|_| Error::Validation(format!("Invalid value for header {name}")))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(Self::header_map(request)?);

        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{request}: {e}")))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("{request}: reading body failed: {e}")))?;

        debug!(%request, status, bytes = body.len(), "Response received");

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}
