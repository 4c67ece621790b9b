//! Inbound order-event ingestion engine
//!
//! Polls the marketplace inbox page by page, classifies each event,
//! materializes new orders, and acknowledges the highest event id per
//! page. One bad event never takes down a page: per-event failures are
//! caught, journaled, and counted.
//!
//! ## Paging
//!
//! A run stops when a page comes back smaller than the requested limit
//! (backlog drained) or when `max_batches` pages were consumed (runtime
//! safety bound). Fetch and acknowledge both go through the bounded
//! rate-limit retry; exhausting that budget aborts the run.

use std::sync::Arc;

use tracing::{debug, info, warn};

use marketlink_core::config::SyncSettings;
use marketlink_core::domain::event::{AckTracker, EventKind, InboxEvent};
use marketlink_core::domain::newtypes::MarketOrderId;
use marketlink_core::domain::order_doc::OrderDocument;
use marketlink_core::error::SyncError;
use marketlink_core::ports::commerce::ICommerce;
use marketlink_core::ports::event_log::IEventLog;
use marketlink_core::ports::link_store::ILinkStore;
use marketlink_core::ports::marketplace::IMarketplaceApi;

use crate::materialize::OrderImporter;
use crate::retry::with_rate_limit_retry;

// ============================================================================
// Run report
// ============================================================================

/// Summary of one inbox run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboxReport {
    /// Pages fetched
    pub batches: u64,
    /// Events seen across all pages
    pub events: u64,
    /// Local orders created
    pub created: u64,
    /// Events ignored (duplicates, unknown types, already-linked status
    /// changes, events without an id)
    pub ignored: u64,
    /// Per-event failures caught and journaled
    pub exceptions: u64,
    /// Successful acknowledgments sent
    pub acknowledged: u64,
}

/// Outcome of one successfully handled event
enum EventOutcome {
    Created,
    Ignored,
}

// ============================================================================
// OrderSyncEngine
// ============================================================================

/// Inbound order-event ingestion engine
///
/// ## Dependencies
///
/// - `api`: marketplace transport (inbox, order detail, acknowledge)
/// - `store`: link store (order-link dedup gate)
/// - `commerce`: commerce primitives orders are materialized through
/// - `journal`: durable sync journal
pub struct OrderSyncEngine {
    api: Arc<dyn IMarketplaceApi>,
    store: Arc<dyn ILinkStore>,
    commerce: Arc<dyn ICommerce>,
    journal: Arc<dyn IEventLog>,
    settings: SyncSettings,
}

impl OrderSyncEngine {
    /// Creates an engine over the given ports
    pub fn new(
        api: Arc<dyn IMarketplaceApi>,
        store: Arc<dyn ILinkStore>,
        commerce: Arc<dyn ICommerce>,
        journal: Arc<dyn IEventLog>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            api,
            store,
            commerce,
            journal,
            settings,
        }
    }

    /// Processes the inbox with the configured page size and batch bound
    pub async fn process_inbox(&self) -> Result<InboxReport, SyncError> {
        self.process_inbox_with(
            self.settings.orders.inbox_limit,
            self.settings.orders.max_batches,
        )
        .await
    }

    /// Processes the inbox: fetch a page, handle every event, acknowledge
    /// the highest id, repeat.
    ///
    /// `limit` is clamped to the marketplace maximum of 100;
    /// `max_batches` bounds the number of pages one run may consume.
    pub async fn process_inbox_with(
        &self,
        limit: u32,
        max_batches: u32,
    ) -> Result<InboxReport, SyncError> {
        let limit = limit.clamp(1, 100);
        let max_batches = max_batches.max(1);
        let mut report = InboxReport::default();

        while report.batches < u64::from(max_batches) {
            let response =
                match with_rate_limit_retry("inbox fetch", || self.api.get_inbox(limit)).await {
                    Ok(response) => response,
                    Err(err) => {
                        self.journal(
                            "order_inbox_error",
                            "",
                            &format!("inbox fetch aborted the run: {err}"),
                            None,
                        )
                        .await;
                        return Err(err);
                    }
                };

            if !response.is_success() {
                self.journal(
                    "order_inbox_error",
                    "",
                    &format!("inbox fetch failed: HTTP {}", response.status),
                    Some(&response.raw),
                )
                .await;
                return Err(SyncError::from_status(
                    response.status,
                    &response.raw,
                    "inbox fetch",
                ));
            }

            let Some(events) = response.json().and_then(|v| v.as_array()).cloned() else {
                self.journal(
                    "order_inbox_error",
                    "",
                    "inbox response body is not an event array",
                    Some(&response.raw),
                )
                .await;
                return Err(SyncError::Api {
                    status: response.status,
                    body: response.raw,
                });
            };

            report.batches += 1;

            if events.is_empty() {
                debug!("Inbox empty, backlog drained");
                break;
            }

            let mut tracker = AckTracker::new();

            for value in &events {
                let Some(event) = InboxEvent::from_value(value) else {
                    continue;
                };
                report.events += 1;

                if let Some(id) = &event.id {
                    tracker.observe(id);
                }

                match self.handle_event(&event).await {
                    Ok(EventOutcome::Created) => report.created += 1,
                    Ok(EventOutcome::Ignored) => report.ignored += 1,
                    Err(err) => {
                        // one bad event must not abort the page
                        report.exceptions += 1;
                        self.journal(
                            "order_event_exception",
                            event.id.as_deref().unwrap_or(""),
                            &format!("event handling failed: {err}"),
                            Some(&value.to_string()),
                        )
                        .await;
                    }
                }
            }

            if let Some(ack_id) = tracker.ack_id() {
                let ack = match with_rate_limit_retry("inbox ack", || self.api.ack_inbox(ack_id))
                    .await
                {
                    Ok(ack) => ack,
                    Err(err) => {
                        self.journal(
                            "order_ack_error",
                            ack_id,
                            &format!("acknowledge aborted the run: {err}"),
                            None,
                        )
                        .await;
                        return Err(err);
                    }
                };

                if ack.is_success() {
                    report.acknowledged += 1;
                } else {
                    // the same events will be redelivered; the link-store
                    // dedup gate absorbs the repeats
                    self.journal(
                        "order_ack_error",
                        ack_id,
                        &format!("acknowledge failed: HTTP {}", ack.status),
                        Some(&ack.raw),
                    )
                    .await;
                }
            }

            if events.len() < limit as usize {
                break;
            }
        }

        info!(
            batches = report.batches,
            events = report.events,
            created = report.created,
            ignored = report.ignored,
            exceptions = report.exceptions,
            "Inbox run finished"
        );
        Ok(report)
    }

    // ========================================================================
    // Event handling
    // ========================================================================

    async fn handle_event(&self, event: &InboxEvent) -> Result<EventOutcome, SyncError> {
        match event.kind() {
            EventKind::OrderCreated => self.handle_order_created(event).await,
            EventKind::OrderStatusChanged => self.handle_status_changed(event).await,
            EventKind::Other => {
                self.journal(
                    "order_event_ignored",
                    event.id.as_deref().unwrap_or(""),
                    &format!("skipped event of type '{}'", event.event_type),
                    Some(&event.payload.to_string()),
                )
                .await;
                Ok(EventOutcome::Ignored)
            }
        }
    }

    /// New marketplace order: create it locally unless its external id is
    /// already linked (first writer wins)
    async fn handle_order_created(&self, event: &InboxEvent) -> Result<EventOutcome, SyncError> {
        let Some(external) = OrderDocument::new(&event.payload).external_id() else {
            self.journal(
                "order_event_no_id",
                event.id.as_deref().unwrap_or(""),
                &format!("event '{}' carries no order id", event.event_type),
                Some(&event.payload.to_string()),
            )
            .await;
            return Ok(EventOutcome::Ignored);
        };

        if self.is_linked(&external).await? {
            self.journal(
                "order_skipped_existing",
                external.as_str(),
                "order already exists locally, skipping creation event",
                None,
            )
            .await;
            return Ok(EventOutcome::Ignored);
        }

        self.create_from_marketplace(&external, "order_created").await
    }

    /// Status change: linked orders are left alone (no post-creation
    /// reconciliation); an unlinked one means we missed the creation
    /// event, so fall back to full creation
    async fn handle_status_changed(&self, event: &InboxEvent) -> Result<EventOutcome, SyncError> {
        let Some(external) = OrderDocument::new(&event.payload).external_id() else {
            self.journal(
                "order_event_no_id",
                event.id.as_deref().unwrap_or(""),
                &format!("event '{}' carries no order id", event.event_type),
                Some(&event.payload.to_string()),
            )
            .await;
            return Ok(EventOutcome::Ignored);
        };

        if self.is_linked(&external).await? {
            self.journal(
                "order_status_ignored_existing",
                external.as_str(),
                &format!(
                    "received '{}' for an existing order, no reconciliation",
                    event.event_type
                ),
                Some(&event.payload.to_string()),
            )
            .await;
            return Ok(EventOutcome::Ignored);
        }

        warn!(external = %external, "Status change for an unknown order, recovering missed creation");
        self.create_from_marketplace(&external, "order_created_from_status_event")
            .await
    }

    /// Fetches the order document and materializes the local order
    async fn create_from_marketplace(
        &self,
        external: &MarketOrderId,
        success_category: &str,
    ) -> Result<EventOutcome, SyncError> {
        let response = self.api.get_order(external).await?;

        if !response.is_success() {
            self.journal(
                "order_fetch_error",
                external.as_str(),
                &format!("order fetch failed: HTTP {}", response.status),
                Some(&response.raw),
            )
            .await;
            return Err(SyncError::from_status(
                response.status,
                &response.raw,
                &format!("order {external}"),
            ));
        }

        let Some(order_json) = response.json().cloned() else {
            self.journal(
                "order_fetch_error",
                external.as_str(),
                "order response body is not a JSON document",
                Some(&response.raw),
            )
            .await;
            return Err(SyncError::Api {
                status: response.status,
                body: response.raw,
            });
        };

        let doc = OrderDocument::new(&order_json);
        let importer = OrderImporter::new(
            self.store.as_ref(),
            self.commerce.as_ref(),
            self.journal.as_ref(),
            &self.settings,
        );
        let order = importer.import(&doc, external).await?;

        self.store
            .save_order_link(order, external, doc.status())
            .await
            .map_err(|e| SyncError::Persistence(format!("save_order_link: {e:#}")))?;

        self.journal(
            success_category,
            external.as_str(),
            &format!("created local order {order}"),
            None,
        )
        .await;

        Ok(EventOutcome::Created)
    }

    /// The dedup gate: is a local order already linked to this id
    async fn is_linked(&self, external: &MarketOrderId) -> Result<bool, SyncError> {
        let link = self
            .store
            .find_order_link(external)
            .await
            .map_err(|e| SyncError::Persistence(format!("find_order_link: {e:#}")))?;
        Ok(link.is_some())
    }

    /// Best-effort journal append; a journal failure never fails a run
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
