//! Low-level marketplace HTTP client
//!
//! Wraps `reqwest::Client` with bearer authentication, base-URL selection
//! (production vs. sandbox), and uniform response handling. Every exchange
//! comes back as an [`ApiResponse`]: the status code, the tagged decode of
//! the body, and the verbatim response text. A transport failure — no
//! status obtained at all — is the only error this client returns.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use marketlink_api::client::ApiClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = ApiClient::new("api-key-here", false);
//! let response = client.get("/inbox", &[("limit", "100".to_string())]).await?;
//! println!("HTTP {}", response.status);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use tracing::debug;

use marketlink_core::ports::marketplace::ApiResponse;

/// Base URL for the production marketplace shop API
const BASE_URL_PROD: &str = "https://shop-api.marketlink.dev";

/// Base URL for the marketplace sandbox
const BASE_URL_SANDBOX: &str = "https://sandbox.shop-api.marketlink.dev";

/// Request timeout applied to every call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent identifying this integration
const USER_AGENT: &str = concat!("marketlink/", env!("CARGO_PKG_VERSION"));

/// Authenticated HTTP client for the marketplace API
pub struct ApiClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests
    base_url: String,
    /// Bearer key issued by the marketplace
    api_key: String,
}

impl ApiClient {
    /// Creates a client against the production or sandbox environment
    ///
    /// # Arguments
    /// * `api_key` - Bearer key issued by the marketplace
    /// * `sandbox` - Talk to the sandbox instead of production
    pub fn new(api_key: impl Into<String>, sandbox: bool) -> Self {
        let base_url = if sandbox {
            BASE_URL_SANDBOX
        } else {
            BASE_URL_PROD
        };
        Self::with_base_url(api_key, base_url)
    }

    /// Creates a client with a custom base URL (useful for testing)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Returns the base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates an authenticated request builder for the given method and path
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, &url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
    }

    /// `GET` with query parameters
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<ApiResponse> {
        let builder = self.request(Method::GET, path).query(query);
        self.execute(builder, path).await
    }

    /// `POST` with an optional JSON body
    pub async fn post(&self, path: &str, payload: Option<&Value>) -> Result<ApiResponse> {
        let mut builder = self.request(Method::POST, path);
        if let Some(payload) = payload {
            builder = builder.json(payload);
        }
        self.execute(builder, path).await
    }

    /// `PATCH` with a JSON body
    pub async fn patch(&self, path: &str, payload: &Value) -> Result<ApiResponse> {
        let builder = self.request(Method::PATCH, path).json(payload);
        self.execute(builder, path).await
    }

    /// Sends the request and folds the response into an [`ApiResponse`]
    async fn execute(&self, builder: RequestBuilder, path: &str) -> Result<ApiResponse> {
        let response = builder
            .send()
            .await
            .with_context(|| format!("request to {path} failed before a status was obtained"))?;

        let status = response.status().as_u16();
        let raw = response
            .text()
            .await
            .with_context(|| format!("reading response body of {path} failed"))?;

        debug!(path, status, bytes = raw.len(), "marketplace API exchange");
        Ok(ApiResponse::new(status, raw))
    }
}

/// Percent-encodes one path segment.
///
/// External ids are caller-supplied strings; anything outside the
/// unreserved set is escaped so it cannot alter the request path.
#[must_use]
pub fn encode_path_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            other => {
                out.push('%');
                out.push_str(&format!("{other:02X}"));
            }
        }
    }
    out
}
