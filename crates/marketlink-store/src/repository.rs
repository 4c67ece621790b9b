//! SQLite implementation of ILinkStore and IEventLog
//!
//! Concrete SQLite-based implementation of the link-store and sync-journal
//! ports defined in marketlink-core. Handles all domain type
//! serialization/deserialization and SQL query construction.
//!
//! ## Type Mapping
//!
//! | Domain Type        | SQL Type | Strategy                               |
//! |--------------------|----------|----------------------------------------|
//! | ProductId, LinkId  | INTEGER  | raw i64 via `.get()` / `::new()`       |
//! | VariantId          | INTEGER  | nullable; NULL and 0 both mean "none"  |
//! | ExternalId         | TEXT     | String via `.as_str()` / `::new()`     |
//! | MarketOrderId      | TEXT     | String via `.as_str()` / `::new()`     |
//! | DateTime<Utc>      | TEXT     | ISO 8601 via `to_rfc3339()`            |
//! | SyncCursor         | TEXT     | decimal string in the sync_state table |

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use marketlink_core::domain::link::{OrderLink, ProductLink};
use marketlink_core::domain::newtypes::{
    ExternalId, LinkId, MarketOrderId, OrderId, ProductId, VariantId,
};
use marketlink_core::ports::event_log::{IEventLog, SyncLogEntry};
use marketlink_core::ports::link_store::{ILinkStore, LinkSelection};

use crate::StoreError;

/// Key of the product batch cursor in the sync_state table
const CURSOR_KEY: &str = "product_cursor";

/// SQLite-based implementation of the link store and sync journal ports
///
/// Provides persistent storage for product links, order links, the batch
/// cursor, and the sync journal. All operations go through a connection
/// pool.
pub struct SqliteLinkStore {
    pool: SqlitePool,
}

impl SqliteLinkStore {
    /// Creates a new store instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Parse a DateTime<Utc> from an ISO 8601 string
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // SQLite default format, just in case rows were written by hand
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| {
            StoreError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

/// Parse an optional DateTime<Utc> from an optional string
fn parse_optional_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    match s {
        Some(ref val) if !val.is_empty() => parse_datetime(val).map(Some),
        _ => Ok(None),
    }
}

/// Normalizes a stored variant id: NULL and 0 both mean "no variant"
fn variant_from_column(raw: Option<i64>) -> Option<VariantId> {
    raw.filter(|v| *v > 0).map(VariantId::new)
}

// ============================================================================
// Row mapping functions
// ============================================================================

/// Reconstruct a ProductLink from a database row
fn product_link_from_row(row: &SqliteRow) -> Result<ProductLink, StoreError> {
    let id: i64 = row.get("id");
    let product_id: i64 = row.get("product_id");
    let variant_id: Option<i64> = row.get("variant_id");
    let external_id_str: String = row.get("external_id");
    let last_payload_hash: Option<String> = row.get("last_payload_hash");
    let last_synced_at_str: Option<String> = row.get("last_synced_at");
    let last_error: Option<String> = row.get("last_error");

    let external_id = ExternalId::new(external_id_str.clone()).map_err(|e| {
        StoreError::SerializationError(format!("Invalid external id '{}': {}", external_id_str, e))
    })?;

    Ok(ProductLink {
        id: LinkId::new(id),
        product_id: ProductId::new(product_id),
        variant_id: variant_from_column(variant_id),
        external_id,
        last_payload_hash,
        last_synced_at: parse_optional_datetime(last_synced_at_str)?,
        last_error: last_error.filter(|e| !e.is_empty()),
    })
}

/// Reconstruct an OrderLink from a database row
fn order_link_from_row(row: &SqliteRow) -> Result<OrderLink, StoreError> {
    let id: i64 = row.get("id");
    let order_id: i64 = row.get("order_id");
    let external_str: String = row.get("external_order_id");
    let last_status: String = row.get("last_status");
    let created_at_str: String = row.get("created_at");

    let external_order_id = MarketOrderId::new(external_str.clone()).map_err(|e| {
        StoreError::SerializationError(format!("Invalid order id '{}': {}", external_str, e))
    })?;

    Ok(OrderLink {
        id,
        order_id: OrderId::new(order_id),
        external_order_id,
        last_status,
        created_at: parse_datetime(&created_at_str)?,
    })
}

/// Reconstruct a SyncLogEntry from a database row
fn log_entry_from_row(row: &SqliteRow) -> Result<SyncLogEntry, StoreError> {
    let id: i64 = row.get("id");
    let category: String = row.get("category");
    let reference: String = row.get("reference");
    let message: String = row.get("message");
    let payload: Option<String> = row.get("payload");
    let created_at_str: String = row.get("created_at");

    Ok(SyncLogEntry {
        id,
        category,
        reference,
        message,
        payload,
        created_at: parse_datetime(&created_at_str)?,
    })
}

// ============================================================================
// ILinkStore implementation
// ============================================================================

#[async_trait::async_trait]
impl ILinkStore for SqliteLinkStore {
    // --- Product links ---

    async fn insert_product_link(
        &self,
        product: ProductId,
        variant: Option<VariantId>,
        external_id: &ExternalId,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO product_links \
             (product_id, variant_id, external_id, last_payload_hash, last_synced_at, last_error) \
             VALUES (?, ?, ?, NULL, NULL, NULL)",
        )
        .bind(product.get())
        .bind(variant.map(|v| v.get()))
        .bind(external_id.as_str())
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            tracing::trace!(%product, external_id = %external_id, "Inserted product link");
        }
        Ok(inserted)
    }

    async fn upsert_product_link(
        &self,
        product: ProductId,
        variant: Option<VariantId>,
        external_id: &ExternalId,
        payload_hash: &str,
    ) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();

        let updated = sqlx::query(
            "UPDATE product_links \
             SET external_id = ?, last_payload_hash = ?, last_synced_at = ?, last_error = NULL \
             WHERE product_id = ? AND COALESCE(variant_id, 0) = ?",
        )
        .bind(external_id.as_str())
        .bind(payload_hash)
        .bind(&now)
        .bind(product.get())
        .bind(variant.map_or(0, |v| v.get()))
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            sqlx::query(
                "INSERT INTO product_links \
                 (product_id, variant_id, external_id, last_payload_hash, last_synced_at, last_error) \
                 VALUES (?, ?, ?, ?, ?, NULL)",
            )
            .bind(product.get())
            .bind(variant.map(|v| v.get()))
            .bind(external_id.as_str())
            .bind(payload_hash)
            .bind(&now)
            .execute(&self.pool)
            .await?;
        }

        tracing::trace!(%product, external_id = %external_id, "Recorded product link success");
        Ok(())
    }

    async fn delete_base_link(&self, product: ProductId) -> anyhow::Result<()> {
        sqlx::query(
            "DELETE FROM product_links \
             WHERE product_id = ? AND COALESCE(variant_id, 0) = 0",
        )
        .bind(product.get())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> anyhow::Result<Option<ProductLink>> {
        let row = sqlx::query("SELECT * FROM product_links WHERE external_id = ?")
            .bind(external_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(product_link_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_product(
        &self,
        product: ProductId,
        variant: Option<VariantId>,
    ) -> anyhow::Result<Option<ProductLink>> {
        let row = sqlx::query(
            "SELECT * FROM product_links \
             WHERE product_id = ? AND COALESCE(variant_id, 0) = ?",
        )
        .bind(product.get())
        .bind(variant.map_or(0, |v| v.get()))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(product_link_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn links_after(
        &self,
        after: i64,
        limit: u32,
        selection: LinkSelection,
    ) -> anyhow::Result<Vec<ProductLink>> {
        let mut sql = String::from(
            "SELECT * FROM product_links \
             WHERE id > ? AND external_id != ''",
        );
        if selection == LinkSelection::Pending {
            sql.push_str(" AND (last_synced_at IS NULL OR last_error IS NOT NULL)");
        }
        sql.push_str(" ORDER BY id ASC LIMIT ?");

        let rows = sqlx::query(&sql)
            .bind(after)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        let mut links = Vec::with_capacity(rows.len());
        for row in &rows {
            links.push(product_link_from_row(row)?);
        }

        Ok(links)
    }

    async fn record_success(&self, link: LinkId, payload_hash: &str) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE product_links \
             SET last_payload_hash = ?, last_synced_at = ?, last_error = NULL \
             WHERE id = ?",
        )
        .bind(payload_hash)
        .bind(Utc::now().to_rfc3339())
        .bind(link.get())
        .execute(&self.pool)
        .await?;

        tracing::trace!(link = %link, "Recorded link success");
        Ok(())
    }

    async fn record_failure(&self, link: LinkId, message: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE product_links SET last_error = ? WHERE id = ?")
            .bind(message)
            .bind(link.get())
            .execute(&self.pool)
            .await?;

        tracing::trace!(link = %link, "Recorded link failure");
        Ok(())
    }

    // --- Cursor ---

    async fn cursor(&self) -> anyhow::Result<i64> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM sync_state WHERE key = ?")
                .bind(CURSOR_KEY)
                .fetch_optional(&self.pool)
                .await?;

        let cursor = value
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0)
            .max(0);
        Ok(cursor)
    }

    async fn set_cursor(&self, value: i64) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO sync_state (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(CURSOR_KEY)
        .bind(value.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // --- Order links ---

    async fn find_order_link(
        &self,
        external_order_id: &MarketOrderId,
    ) -> anyhow::Result<Option<OrderLink>> {
        let row = sqlx::query("SELECT * FROM order_links WHERE external_order_id = ?")
            .bind(external_order_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(order_link_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn save_order_link(
        &self,
        order: OrderId,
        external_order_id: &MarketOrderId,
        status: &str,
    ) -> anyhow::Result<()> {
        let updated = sqlx::query(
            "UPDATE order_links SET order_id = ?, last_status = ? \
             WHERE external_order_id = ?",
        )
        .bind(order.get())
        .bind(status)
        .bind(external_order_id.as_str())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            sqlx::query(
                "INSERT INTO order_links (order_id, external_order_id, last_status, created_at) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(order.get())
            .bind(external_order_id.as_str())
            .bind(status)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        }

        tracing::trace!(order = %order, external = %external_order_id, "Saved order link");
        Ok(())
    }
}

// ============================================================================
// IEventLog implementation
// ============================================================================

#[async_trait::async_trait]
impl IEventLog for SqliteLinkStore {
    async fn append(
        &self,
        category: &str,
        reference: &str,
        message: &str,
        payload: Option<&str>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO sync_log (category, reference, message, payload, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(category)
        .bind(reference)
        .bind(message)
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent(&self, limit: u32) -> anyhow::Result<Vec<SyncLogEntry>> {
        let rows = sqlx::query("SELECT * FROM sync_log ORDER BY id DESC LIMIT ?")
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(log_entry_from_row(row)?);
        }

        Ok(entries)
    }
}
