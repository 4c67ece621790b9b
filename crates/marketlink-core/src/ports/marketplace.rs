//! Marketplace API port (driven/secondary port)
//!
//! Interface to the marketplace REST API. The engines never interpret raw
//! HTTP; they see an [`ApiResponse`] whose status code drives control flow
//! and whose body is a tagged decode result, so "is this the expected
//! shape" checks happen in exactly one place.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because transport errors are adapter-specific;
//!   a returned `Err` means no status code was obtained at all.
//! - Payloads travel as `serde_json::Value`: the outbound payload is built
//!   by the typed mapper and the inbound documents are read through the
//!   typed [`crate::domain::OrderDocument`] view, so the port itself stays
//!   schema-agnostic.

use serde_json::Value;

use crate::domain::newtypes::{ExternalId, MarketOrderId};

// ============================================================================
// ApiResponse
// ============================================================================

/// Decode outcome for a response body
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// The body parsed as JSON
    Json(Value),
    /// The body was empty or not valid JSON; the raw text is kept on the
    /// response for diagnostics
    Malformed,
}

/// One marketplace API exchange: status code, tagged decoded body, raw text
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Tagged decode result
    pub body: Decoded,
    /// Verbatim response text
    pub raw: String,
}

impl ApiResponse {
    /// Builds a response, decoding the raw text once
    #[must_use]
    pub fn new(status: u16, raw: String) -> Self {
        let body = match serde_json::from_str(&raw) {
            Ok(value) => Decoded::Json(value),
            Err(_) => Decoded::Malformed,
        };
        Self { status, body, raw }
    }

    /// True for any 2xx status
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True for HTTP 404
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// True for HTTP 429
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    /// The decoded JSON body, if the body decoded
    #[must_use]
    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            Decoded::Json(value) => Some(value),
            Decoded::Malformed => None,
        }
    }
}

// ============================================================================
// IMarketplaceApi trait
// ============================================================================

/// Port trait for the marketplace REST API
///
/// Covers the endpoints the engines consume: the order-event inbox, order
/// detail, and product publishing. Implementations handle authentication,
/// base-URL selection, and JSON encoding.
#[async_trait::async_trait]
pub trait IMarketplaceApi: Send + Sync {
    /// Fetches one page of inbox events: `GET /inbox?limit=N`
    ///
    /// The response body is an array of event objects.
    async fn get_inbox(&self, limit: u32) -> anyhow::Result<ApiResponse>;

    /// Acknowledges inbox consumption up to an event id:
    /// `POST /inbox {lastMessageId}`
    async fn ack_inbox(&self, last_message_id: &str) -> anyhow::Result<ApiResponse>;

    /// Fetches one order document: `GET /orders/{id}`
    async fn get_order(&self, order_id: &MarketOrderId) -> anyhow::Result<ApiResponse>;

    /// Updates an existing listing: `PATCH /products/{externalId}`
    async fn update_product(
        &self,
        external_id: &ExternalId,
        payload: &Value,
    ) -> anyhow::Result<ApiResponse>;

    /// Creates a listing: `POST /products/{externalId}`
    async fn create_product(
        &self,
        external_id: &ExternalId,
        payload: &Value,
    ) -> anyhow::Result<ApiResponse>;

    /// Fetches a listing: `GET /products/{externalId}`
    async fn get_product(&self, external_id: &ExternalId) -> anyhow::Result<ApiResponse>;
}

// ============================================================================
// Tests
// ============================================================================
