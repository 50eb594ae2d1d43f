//! Transport layer for the rental booking REST API.
//!
//! Every endpoint dispatch is reduced to an [`ApiRequest`] and executed
//! through the [`Transport`] trait. The production implementation is
//! [`HttpTransport`] (reqwest); tests substitute a scripted transport so the
//! cache and session layers can be exercised without a network.

use async_trait::async_trait;
use reqwest::{header, Client, Method};
use serde_json::Value;
use tracing::debug;

use super::ApiError;

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// A fully-resolved request: endpoint path template already expanded, body
/// already built, and the session token (if any) attached by the dispatch
/// path. Transports only move bytes.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    /// Raw bearer credential. Sent as the `Authorization` value verbatim -
    /// the API expects no scheme prefix. `None` for anonymous requests.
    pub token: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            token: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<Value, ApiError>;
}

/// Transport backed by reqwest.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let url = self.url(&request.path);
        debug!(method = %request.method, url = %url, "Dispatching request");

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .header(header::CONTENT_TYPE, "application/json");

        if let Some(ref token) = request.token {
            builder = builder.header(header::AUTHORIZATION, token.as_str());
        }

        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::from_status(status, &text));
        }

        // Deletes and some status updates come back with an empty body.
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("{} ({})", e, request.path)))
    }
}
