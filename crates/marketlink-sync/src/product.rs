//! Outbound product synchronization engine
//!
//! Publishes catalog products (one listing per variant) to the marketplace
//! and keeps the link store consistent with what was pushed.
//!
//! ## Batch flow
//!
//! 1. Enumerate link rows ordered by primary key, starting after the
//!    persisted cursor
//! 2. Per row: rebuild the payload, compare its canonical hash against the
//!    stored one — unchanged rows skip the network call entirely
//! 3. Push changed rows (`PATCH`, falling back to `POST` on 404)
//! 4. Persist the cursor after every row, so a killed process loses at
//!    most the rows after the last persisted cursor
//!
//! ## Failure policy
//!
//! A 429 ends the run cleanly at the persisted cursor (no inline retry —
//! the next scheduled run resumes where this one stopped). A mapping
//! failure is recorded on the link and the batch moves on. Anything else
//! is recorded and aborts the batch.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use marketlink_core::canonical::payload_hash;
use marketlink_core::config::SyncSettings;
use marketlink_core::domain::link::{derive_external_id, ProductLink};
use marketlink_core::domain::newtypes::{ExternalId, ProductId, VariantId};
use marketlink_core::error::SyncError;
use marketlink_core::mapper::map_product;
use marketlink_core::ports::catalog::{ICatalog, ProductRecord};
use marketlink_core::ports::event_log::IEventLog;
use marketlink_core::ports::link_store::{ILinkStore, LinkSelection};
use marketlink_core::ports::marketplace::{ApiResponse, IMarketplaceApi};

// ============================================================================
// Run report
// ============================================================================

/// Summary of one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductRunReport {
    /// Rows pushed over the network
    pub pushed: u64,
    /// Rows skipped because the payload hash was unchanged
    pub skipped: u64,
    /// Rows that failed mapping and were left with a recorded error
    pub failed: u64,
    /// Whether the run was cut short by a 429
    pub rate_limited: bool,
}

impl ProductRunReport {
    /// Total rows the run completed (cursor advanced past them)
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.pushed + self.skipped + self.failed
    }
}

/// Outcome of one completed row
enum RowOutcome {
    Pushed,
    Skipped,
}

// ============================================================================
// Run-scoped record cache
// ============================================================================

/// Catalog snapshots fetched during one run, at most once per product.
///
/// Owned by the run, not the engine: a later run must observe catalog
/// changes, so nothing here outlives the batch that created it.
struct RecordCache {
    records: HashMap<ProductId, Option<Arc<ProductRecord>>>,
}

impl RecordCache {
    fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }
}

// ============================================================================
// ProductSyncEngine
// ============================================================================

/// Outbound product synchronization engine
///
/// ## Dependencies
///
/// - `api`: marketplace transport (update/create listings)
/// - `store`: link store (links, hashes, cursor)
/// - `catalog`: catalog snapshots of the host commerce system
/// - `journal`: durable sync journal
pub struct ProductSyncEngine {
    api: Arc<dyn IMarketplaceApi>,
    store: Arc<dyn ILinkStore>,
    catalog: Arc<dyn ICatalog>,
    journal: Arc<dyn IEventLog>,
    settings: SyncSettings,
}

impl ProductSyncEngine {
    /// Creates an engine over the given ports
    pub fn new(
        api: Arc<dyn IMarketplaceApi>,
        store: Arc<dyn ILinkStore>,
        catalog: Arc<dyn ICatalog>,
        journal: Arc<dyn IEventLog>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            api,
            store,
            catalog,
            journal,
            settings,
        }
    }

    // ========================================================================
    // Link preparation
    // ========================================================================

    /// Creates link rows for the whole catalog.
    ///
    /// Products with variants get one link per variant (any stale
    /// no-variant link is deleted); products without variants get a single
    /// no-variant link. Insert-or-ignore semantics make this safe to
    /// re-run: existing rows and their sync state are left untouched.
    ///
    /// Returns the number of links inserted.
    pub async fn prepare_links(&self) -> Result<u64, SyncError> {
        let prefix = &self.settings.products.external_id_prefix;
        let mut inserted = 0u64;

        let products = self
            .catalog
            .product_ids()
            .await
            .map_err(|e| SyncError::Persistence(format!("catalog: {e:#}")))?;

        for product in products {
            let variants = self
                .catalog
                .variant_ids(product)
                .await
                .map_err(|e| SyncError::Persistence(format!("catalog: {e:#}")))?;

            if variants.is_empty() {
                let external = derive_external_id(prefix, product, None);
                if self
                    .store
                    .insert_product_link(product, None, &external)
                    .await
                    .map_err(|e| SyncError::Persistence(format!("{e:#}")))?
                {
                    inserted += 1;
                }
                continue;
            }

            // the product gained variants; its old no-variant link is stale
            self.store
                .delete_base_link(product)
                .await
                .map_err(|e| SyncError::Persistence(format!("{e:#}")))?;

            for variant in variants {
                let external = derive_external_id(prefix, product, Some(variant));
                if self
                    .store
                    .insert_product_link(product, Some(variant), &external)
                    .await
                    .map_err(|e| SyncError::Persistence(format!("{e:#}")))?
                {
                    inserted += 1;
                }
            }
        }

        info!(inserted, "Prepared product links");
        self.journal(
            "product_prepare",
            "-",
            &format!("prepared product links, inserted={inserted}"),
            None,
        )
        .await;

        Ok(inserted)
    }

    // ========================================================================
    // Single-product sync
    // ========================================================================

    /// Synchronizes one product immediately, outside any batch.
    ///
    /// With a variant id, only that listing is pushed. Without one, every
    /// variant of the product is pushed in turn (or the single no-variant
    /// listing for a simple product). Success persists the link with the
    /// payload hash and a cleared error.
    pub async fn sync_one(
        &self,
        product: ProductId,
        variant: Option<VariantId>,
    ) -> Result<(), SyncError> {
        let mut cache = RecordCache::new();

        if variant.is_some() {
            return self.sync_pair(product, variant, &mut cache).await;
        }

        let variants = self
            .catalog
            .variant_ids(product)
            .await
            .map_err(|e| SyncError::Persistence(format!("catalog: {e:#}")))?;

        if variants.is_empty() {
            return self.sync_pair(product, None, &mut cache).await;
        }

        debug!(%product, count = variants.len(), "Product has variants, syncing each");
        for v in variants {
            self.sync_pair(product, Some(v), &mut cache).await?;
        }
        Ok(())
    }

    // ========================================================================
    // Batch runs
    // ========================================================================

    /// Pushes every row that still needs a sync (never synced, or carrying
    /// an error), in pages of `batch_size`
    pub async fn sync_pending(&self, batch_size: u32) -> Result<ProductRunReport, SyncError> {
        self.run(batch_size, LinkSelection::Pending).await
    }

    /// Pushes every link row regardless of its state, in pages of
    /// `batch_size`
    pub async fn sync_all(&self, batch_size: u32) -> Result<ProductRunReport, SyncError> {
        self.run(batch_size, LinkSelection::All).await
    }

    async fn run(
        &self,
        batch_size: u32,
        selection: LinkSelection,
    ) -> Result<ProductRunReport, SyncError> {
        let batch_size = batch_size.max(1);
        let mut report = ProductRunReport::default();
        let mut cache = RecordCache::new();

        // resume after whatever the last aborted run completed
        let mut cursor = self
            .store
            .cursor()
            .await
            .map_err(|e| SyncError::Persistence(format!("{e:#}")))?;

        debug!(cursor, batch_size, ?selection, "Starting product batch run");

        loop {
            let rows = self
                .store
                .links_after(cursor, batch_size, selection)
                .await
                .map_err(|e| SyncError::Persistence(format!("{e:#}")))?;

            if rows.is_empty() {
                break;
            }
            let page_len = rows.len();

            for link in rows {
                match self.sync_link_row(&link, &mut cache).await {
                    Ok(RowOutcome::Pushed) => report.pushed += 1,
                    Ok(RowOutcome::Skipped) => report.skipped += 1,
                    Err(err) if err.is_rate_limited() => {
                        // clean resumable stop: the cursor already sits at
                        // the last completed row
                        warn!(link = %link.id, "Rate limited, ending run at cursor {cursor}");
                        self.journal(
                            "product_sync_rate_limited",
                            link.external_id.as_str(),
                            &format!("run stopped at cursor {cursor}: {err}"),
                            None,
                        )
                        .await;
                        report.rate_limited = true;
                        return Ok(report);
                    }
                    Err(SyncError::Mapping(message)) => {
                        // fatal to the item only; the row keeps its error
                        // and the batch moves on
                        report.failed += 1;
                        self.journal(
                            "product_sync_error",
                            link.external_id.as_str(),
                            &message,
                            None,
                        )
                        .await;
                    }
                    Err(err) => {
                        self.journal(
                            "product_sync_error",
                            link.external_id.as_str(),
                            &err.to_string(),
                            None,
                        )
                        .await;
                        return Err(err);
                    }
                }

                cursor = link.id.get();
                self.store
                    .set_cursor(cursor)
                    .await
                    .map_err(|e| SyncError::Persistence(format!("{e:#}")))?;
            }

            if page_len < batch_size as usize {
                break;
            }
        }

        // backlog drained; the next run starts from the top
        self.store
            .set_cursor(0)
            .await
            .map_err(|e| SyncError::Persistence(format!("{e:#}")))?;

        info!(
            pushed = report.pushed,
            skipped = report.skipped,
            failed = report.failed,
            "Product batch run drained"
        );
        Ok(report)
    }

    // ========================================================================
    // Row handling
    // ========================================================================

    /// Synchronizes one link row: hash-skip or push, recording the result
    async fn sync_link_row(
        &self,
        link: &ProductLink,
        cache: &mut RecordCache,
    ) -> Result<RowOutcome, SyncError> {
        let outcome = self.try_sync_link_row(link, cache).await;

        if let Err(err) = &outcome {
            if let Err(store_err) = self.store.record_failure(link.id, &err.to_string()).await {
                warn!(link = %link.id, error = %store_err, "Failed to record link failure");
            }
        }

        outcome
    }

    async fn try_sync_link_row(
        &self,
        link: &ProductLink,
        cache: &mut RecordCache,
    ) -> Result<RowOutcome, SyncError> {
        let record = self
            .cached_record(cache, link.product_id)
            .await?
            .ok_or_else(|| {
                SyncError::Mapping(format!(
                    "product {} no longer exists in the catalog",
                    link.product_id
                ))
            })?;

        let mut payload = map_product(&record, link.variant_id, &self.settings.products)?;
        // the row's external id is authoritative; it may predate the
        // current prefix configuration
        payload.external_id = link.external_id.as_str().to_string();

        let value = payload.to_value()?;
        let hash = payload_hash(&value);

        if link.last_payload_hash.as_deref() == Some(hash.as_str()) {
            debug!(link = %link.id, "Payload unchanged, skipping network call");
            self.store
                .record_success(link.id, &hash)
                .await
                .map_err(|e| SyncError::Persistence(format!("{e:#}")))?;
            return Ok(RowOutcome::Skipped);
        }

        self.push_listing(&link.external_id, &value).await?;

        self.store
            .record_success(link.id, &hash)
            .await
            .map_err(|e| SyncError::Persistence(format!("{e:#}")))?;

        Ok(RowOutcome::Pushed)
    }

    /// Maps and pushes one (product, variant) pair, upserting its link
    async fn sync_pair(
        &self,
        product: ProductId,
        variant: Option<VariantId>,
        cache: &mut RecordCache,
    ) -> Result<(), SyncError> {
        let record = self.cached_record(cache, product).await?.ok_or_else(|| {
            SyncError::Mapping(format!("product {product} not found in the catalog"))
        })?;

        let payload = map_product(&record, variant, &self.settings.products)?;
        let external = ExternalId::new(payload.external_id.clone())
            .map_err(|e| SyncError::Mapping(e.to_string()))?;
        let value = payload.to_value()?;

        match self.push_listing(&external, &value).await {
            Ok(response) => {
                info!(external = %external, status = response.status, "Listing synced");
                self.store
                    .upsert_product_link(product, variant, &external, &payload_hash(&value))
                    .await
                    .map_err(|e| SyncError::Persistence(format!("{e:#}")))?;
                Ok(())
            }
            Err(err) => {
                if let Ok(Some(link)) = self.store.find_by_product(product, variant).await {
                    if let Err(store_err) =
                        self.store.record_failure(link.id, &err.to_string()).await
                    {
                        warn!(link = %link.id, error = %store_err, "Failed to record link failure");
                    }
                }
                self.journal("product_sync_error", external.as_str(), &err.to_string(), None)
                    .await;
                Err(err)
            }
        }
    }

    /// Update-or-create: `PATCH /products/{id}`, falling back to `POST` on
    /// 404. Returns the successful response or the classified failure.
    async fn push_listing(
        &self,
        external: &ExternalId,
        payload: &Value,
    ) -> Result<ApiResponse, SyncError> {
        let mut response = self.api.update_product(external, payload).await?;

        if response.is_not_found() {
            debug!(external = %external, "Listing unknown to the marketplace, creating");
            response = self.api.create_product(external, payload).await?;
        }

        if response.is_success() {
            return Ok(response);
        }

        Err(SyncError::from_status(
            response.status,
            &response.raw,
            &format!("listing {external}"),
        ))
    }

    /// Catalog snapshot for a product, fetched at most once per run
    async fn cached_record(
        &self,
        cache: &mut RecordCache,
        product: ProductId,
    ) -> Result<Option<Arc<ProductRecord>>, SyncError> {
        if let Some(entry) = cache.records.get(&product) {
            return Ok(entry.clone());
        }

        let fetched = self
            .catalog
            .product_record(product)
            .await
            .map_err(|e| SyncError::Persistence(format!("catalog: {e:#}")))?
            .map(Arc::new);

        cache.records.insert(product, fetched.clone());
        Ok(fetched)
    }

    /// Best-effort journal append; a journal failure never fails a sync
    async fn journal(&self, category: &str, reference: &str, message: &str, payload: Option<&str>) {
        if let Err(err) = self
            .journal
            .append(category, reference, message, payload)
            .await
        {
            warn!(category, error = %err, "Failed to append journal entry");
        }
    }
}
