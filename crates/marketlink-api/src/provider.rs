//! `IMarketplaceApi` port implementation
//!
//! Maps the port's endpoint methods onto the low-level [`ApiClient`]:
//! inbox polling and acknowledgment, order detail, and product
//! create/update/get. This is the only place request paths are spelled.

use serde_json::{json, Value};

use marketlink_core::domain::newtypes::{ExternalId, MarketOrderId};
use marketlink_core::ports::marketplace::{ApiResponse, IMarketplaceApi};

use crate::client::{encode_path_segment, ApiClient};

/// Marketplace API adapter over the authenticated HTTP client
pub struct MarketplaceClient {
    client: ApiClient,
}

impl MarketplaceClient {
    /// Wraps a configured [`ApiClient`]
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Returns the underlying client (e.g. to read the base URL)
    #[must_use]
    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl IMarketplaceApi for MarketplaceClient {
    async fn get_inbox(&self, limit: u32) -> anyhow::Result<ApiResponse> {
        self.client
            .get("/inbox", &[("limit", limit.to_string())])
            .await
    }

    async fn ack_inbox(&self, last_message_id: &str) -> anyhow::Result<ApiResponse> {
        let payload = json!({ "lastMessageId": last_message_id });
        self.client.post("/inbox", Some(&payload)).await
    }

    async fn get_order(&self, order_id: &MarketOrderId) -> anyhow::Result<ApiResponse> {
        let path = format!("/orders/{}", encode_path_segment(order_id.as_str()));
        self.client.get(&path, &[]).await
    }

    async fn update_product(
        &self,
        external_id: &ExternalId,
        payload: &Value,
    ) -> anyhow::Result<ApiResponse> {
        let path = format!("/products/{}", encode_path_segment(external_id.as_str()));
        self.client.patch(&path, payload).await
    }

    async fn create_product(
        &self,
        external_id: &ExternalId,
        payload: &Value,
    ) -> anyhow::Result<ApiResponse> {
        let path = format!("/products/{}", encode_path_segment(external_id.as_str()));
        self.client.post(&path, Some(payload)).await
    }

    async fn get_product(&self, external_id: &ExternalId) -> anyhow::Result<ApiResponse> {
        let path = format!("/products/{}", encode_path_segment(external_id.as_str()));
        self.client.get(&path, &[]).await
    }
}
