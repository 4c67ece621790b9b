//! Link store port (driven/secondary port)
//!
//! Durable storage for the idempotency layer: product links, order links,
//! and the resumable batch cursor. Lookup-by-external-id is the only
//! safeguard against duplicate order creation; it is deliberately not
//! protected against true concurrent writers (accepted race, see the
//! concurrency notes in the engine crate).

use crate::domain::link::{OrderLink, ProductLink};
use crate::domain::newtypes::{ExternalId, LinkId, MarketOrderId, OrderId, ProductId, VariantId};

/// Which rows a batch run enumerates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSelection {
    /// Every link row
    All,
    /// Only rows never synced or carrying an error
    Pending,
}

/// Port trait for the link store / idempotency layer
#[async_trait::async_trait]
pub trait ILinkStore: Send + Sync {
    // --- Product links ---

    /// Inserts a product link if no row exists for the (product, variant)
    /// pair. Returns true when a row was inserted (insert-or-ignore).
    async fn insert_product_link(
        &self,
        product: ProductId,
        variant: Option<VariantId>,
        external_id: &ExternalId,
    ) -> anyhow::Result<bool>;

    /// Records a successful push: insert the link if missing, otherwise
    /// update it with the payload hash, a fresh sync timestamp, and a
    /// cleared error.
    async fn upsert_product_link(
        &self,
        product: ProductId,
        variant: Option<VariantId>,
        external_id: &ExternalId,
        payload_hash: &str,
    ) -> anyhow::Result<()>;

    /// Deletes a stale no-variant link for a product that now has variants
    async fn delete_base_link(&self, product: ProductId) -> anyhow::Result<()>;

    /// Looks up a product link by its marketplace id
    async fn find_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> anyhow::Result<Option<ProductLink>>;

    /// Looks up a product link by the internal (product, variant) pair
    async fn find_by_product(
        &self,
        product: ProductId,
        variant: Option<VariantId>,
    ) -> anyhow::Result<Option<ProductLink>>;

    /// Returns up to `limit` links with id greater than `after`, ordered
    /// by id ascending
    async fn links_after(
        &self,
        after: i64,
        limit: u32,
        selection: LinkSelection,
    ) -> anyhow::Result<Vec<ProductLink>>;

    /// Records a successful sync attempt on an existing link
    async fn record_success(&self, link: LinkId, payload_hash: &str) -> anyhow::Result<()>;

    /// Records a failed sync attempt on an existing link
    async fn record_failure(&self, link: LinkId, message: &str) -> anyhow::Result<()>;

    // --- Cursor ---

    /// Reads the persisted batch cursor (0 when unset)
    async fn cursor(&self) -> anyhow::Result<i64>;

    /// Persists the batch cursor
    async fn set_cursor(&self, value: i64) -> anyhow::Result<()>;

    // --- Order links ---

    /// Looks up an order link by the marketplace order id
    async fn find_order_link(
        &self,
        external_order_id: &MarketOrderId,
    ) -> anyhow::Result<Option<OrderLink>>;

    /// Saves (insert or update) an order link
    async fn save_order_link(
        &self,
        order: OrderId,
        external_order_id: &MarketOrderId,
        status: &str,
    ) -> anyhow::Result<()>;
}
