//! # HTTP Retrieval Utilities
//!
//! An asynchronous API client wrapper around `reqwest`, with middleware for
//! exponential backoff retries and uniform JSON response handling.

use anyhow::Context;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use url::Url;

/// Retries applied to transient failures (connect errors, 5xx, 429).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Decoded response of a single request.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The deserialized body of a 2xx response. An empty body decodes as JSON
    /// `null`.
    pub data: Option<T>,
    /// The raw body of a non-2xx response.
    pub error_body: Option<String>,
    pub status: u16,
    pub success: bool,
}

impl<T> ApiResponse<T> {
    /// The server's `{ "message": ... }` for a failed request, falling back to
    /// a generic line with the status code.
    pub fn error_message(&self) -> String {
        self.error_body
            .as_deref()
            .and_then(|body| serde_json::from_str::<Value>(body).ok())
            .and_then(|json| json.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| format!("Request failed with status {}", self.status))
    }
}

/// HTTP client bound to one base URL and, optionally, one bearer token.
pub struct ApiClient {
    inner: ClientWithMiddleware,
    base_url: Url,
    auth_token: Option<String>,
}

impl ApiClient {
    /// Creates a client with the default retry policy.
    ///
    /// A missing trailing slash is added to `base_url` so that relative paths
    /// join below it rather than replacing its last segment.
    pub fn new(base_url: &str, auth_token: Option<String>) -> anyhow::Result<Self> {
        Self::with_retries(base_url, auth_token, DEFAULT_MAX_RETRIES)
    }

    pub fn with_retries(base_url: &str, auth_token: Option<String>, max_retries: u32) -> anyhow::Result<Self> {
        let normalized = if base_url.ends_with('/') { base_url.to_string() } else { format!("{base_url}/") };
        let url = Url::parse(&normalized).with_context(|| format!("Invalid base URL (must be absolute): {base_url}"))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
        let client = ClientBuilder::new(reqwest::Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { inner: client, base_url: url, auth_token })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Performs one request: joins `path` onto the base URL, appends `query`,
    /// injects the bearer token and serializes `body` as JSON.
    ///
    /// # Errors
    /// URL joining, transport failures (after retries) and undecodable 2xx
    /// bodies. Non-2xx statuses are not errors; see [`ApiResponse::success`].
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> anyhow::Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut full_url = self.base_url.join(path.trim_start_matches('/'))?;
        if !query.is_empty() {
            let mut pairs = full_url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        log::debug!("{} {}", method, full_url);

        let mut req = self.inner.request(method, full_url);

        if let Some(token) = &self.auth_token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        if let Some(b) = body {
            let json_body = serde_json::to_string(b)?;
            req = req.header(CONTENT_TYPE, "application/json").body(json_body);
        }

        let response: reqwest::Response = req.send().await?;
        let status = response.status();

        if status.is_success() {
            let text = response.text().await?;
            let raw = if text.trim().is_empty() { "null" } else { text.as_str() };
            let data = serde_json::from_str::<T>(raw)?;
            Ok(ApiResponse { data: Some(data), error_body: None, status: status.as_u16(), success: true })
        } else {
            let error_text = response.text().await.ok();
            Ok(ApiResponse { data: None, error_body: error_text, status: status.as_u16(), success: false })
        }
    }
}
