//! Product engine behavior: preparation, hash-skip, cursor resume,
//! create-fallback, and failure policy

use std::sync::Arc;

use marketlink_core::domain::newtypes::{ProductId, VariantId};
use marketlink_core::ports::link_store::{ILinkStore, LinkSelection};
use marketlink_sync::ProductSyncEngine;

use crate::common::{self, ext, InMemoryCatalog, ScriptedMarketplace};

async fn engine_with(
    catalog: Arc<InMemoryCatalog>,
    api: Arc<ScriptedMarketplace>,
) -> (ProductSyncEngine, Arc<marketlink_store::SqliteLinkStore>) {
    let store = common::link_store().await;
    let engine = ProductSyncEngine::new(
        api,
        store.clone(),
        catalog,
        store.clone(),
        common::settings(),
    );
    (engine, store)
}

// ============================================================================
// prepare_links
// ============================================================================

#[tokio::test]
async fn prepare_creates_one_link_per_simple_product() {
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.insert(common::product(1, "Chair", 1000));
    let (engine, store) = engine_with(catalog, Arc::new(ScriptedMarketplace::new())).await;

    let inserted = engine.prepare_links().await.unwrap();
    assert_eq!(inserted, 1);

    let links = store.links_after(0, 10, LinkSelection::All).await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].variant_id, None);
    assert_eq!(links[0].external_id.as_str(), "ps-1");
}

#[tokio::test]
async fn prepare_creates_one_link_per_variant_and_no_base_row() {
    let catalog = Arc::new(InMemoryCatalog::new());
    let record = common::with_variant(
        common::with_variant(common::product(2, "Shirt", 2000), 20, 2000),
        21,
        2100,
    );
    catalog.insert(record);
    let (engine, store) = engine_with(catalog, Arc::new(ScriptedMarketplace::new())).await;

    // a stale no-variant link from before the product had variants
    store
        .insert_product_link(ProductId::new(2), None, &ext("ps-2"))
        .await
        .unwrap();

    let inserted = engine.prepare_links().await.unwrap();
    assert_eq!(inserted, 2);

    let links = store.links_after(0, 10, LinkSelection::All).await.unwrap();
    assert_eq!(links.len(), 2);
    assert!(links.iter().all(|l| l.variant_id.is_some()));
}

#[tokio::test]
async fn prepare_twice_is_idempotent() {
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.insert(common::product(1, "Chair", 1000));
    catalog.insert(common::with_variant(common::product(2, "Shirt", 2000), 20, 2000));
    let (engine, store) = engine_with(catalog, Arc::new(ScriptedMarketplace::new())).await;

    assert_eq!(engine.prepare_links().await.unwrap(), 2);
    assert_eq!(engine.prepare_links().await.unwrap(), 0);

    let links = store.links_after(0, 10, LinkSelection::All).await.unwrap();
    assert_eq!(links.len(), 2);
}

// ============================================================================
// Batch runs
// ============================================================================

#[tokio::test]
async fn sync_pending_pushes_and_records_success() {
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.insert(common::product(1, "Chair", 1000));
    let api = Arc::new(ScriptedMarketplace::new());
    let (engine, store) = engine_with(catalog, api.clone()).await;

    engine.prepare_links().await.unwrap();
    let report = engine.sync_pending(10).await.unwrap();

    assert_eq!(report.pushed, 1);
    assert_eq!(report.skipped, 0);
    assert!(!report.rate_limited);
    assert_eq!(api.calls(), vec!["PATCH ps-1".to_string()]);

    let link = store
        .find_by_product(ProductId::new(1), None)
        .await
        .unwrap()
        .unwrap();
    assert!(link.last_payload_hash.is_some());
    assert!(link.last_synced_at.is_some());
    assert_eq!(link.last_error, None);
}

#[tokio::test]
async fn unchanged_payload_skips_network_but_advances() {
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.insert(common::product(1, "Chair", 1000));
    let api = Arc::new(ScriptedMarketplace::new());
    let (engine, store) = engine_with(catalog, api.clone()).await;

    engine.prepare_links().await.unwrap();
    engine.sync_all(10).await.unwrap();
    assert_eq!(api.calls().len(), 1);

    // nothing changed: the second full run must not touch the network
    let report = engine.sync_all(10).await.unwrap();
    assert_eq!(report.pushed, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(api.calls().len(), 1);

    // the run still completed and reset the cursor
    assert_eq!(store.cursor().await.unwrap(), 0);
}

#[tokio::test]
async fn changed_payload_is_pushed_again() {
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.insert(common::product(1, "Chair", 1000));
    let api = Arc::new(ScriptedMarketplace::new());
    let (engine, _store) = engine_with(catalog.clone(), api.clone()).await;

    engine.prepare_links().await.unwrap();
    engine.sync_all(10).await.unwrap();

    catalog.insert(common::product(1, "Chair", 1100));
    let report = engine.sync_all(10).await.unwrap();

    assert_eq!(report.pushed, 1);
    assert_eq!(api.calls().len(), 2);
}

#[tokio::test]
async fn rate_limit_stops_run_at_last_completed_row() {
    let catalog = Arc::new(InMemoryCatalog::new());
    for i in 1..=3 {
        catalog.insert(common::product(i, &format!("Product {i}"), 1000 * i));
    }
    let api = Arc::new(ScriptedMarketplace::new());
    api.script_update("ps-2", 429, "slow down");
    let (engine, store) = engine_with(catalog, api.clone()).await;

    engine.prepare_links().await.unwrap();
    let report = engine.sync_all(10).await.unwrap();

    assert!(report.rate_limited);
    assert_eq!(report.pushed, 1);

    // cursor sits at row 1; row 2 was not completed
    let links = store.links_after(0, 10, LinkSelection::All).await.unwrap();
    assert_eq!(store.cursor().await.unwrap(), links[0].id.get());

    // the next run resumes after row 1: row 1 gets no further call
    let report = engine.sync_all(10).await.unwrap();
    assert!(!report.rate_limited);
    assert_eq!(report.pushed, 2);

    let patches: Vec<String> = api
        .calls()
        .into_iter()
        .filter(|c| c == "PATCH ps-1")
        .collect();
    assert_eq!(patches.len(), 1, "row before the cursor was reprocessed");
    assert_eq!(store.cursor().await.unwrap(), 0);
}

#[tokio::test]
async fn server_error_aborts_batch_and_records_failure() {
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.insert(common::product(1, "Chair", 1000));
    catalog.insert(common::product(2, "Table", 5000));
    let api = Arc::new(ScriptedMarketplace::new());
    api.script_update("ps-1", 500, "boom");
    let (engine, store) = engine_with(catalog, api.clone()).await;

    engine.prepare_links().await.unwrap();
    let err = engine.sync_all(10).await.unwrap_err();
    assert!(matches!(
        err,
        marketlink_core::SyncError::Api { status: 500, .. }
    ));

    let link = store
        .find_by_product(ProductId::new(1), None)
        .await
        .unwrap()
        .unwrap();
    assert!(link.last_error.as_deref().unwrap().contains("500"));

    // row 2 was never attempted
    assert!(!api.calls().contains(&"PATCH ps-2".to_string()));
}

#[tokio::test]
async fn mapping_failure_skips_item_but_continues_batch() {
    let catalog = Arc::new(InMemoryCatalog::new());
    let mut imageless = common::product(1, "Chair", 1000);
    imageless.images.clear();
    catalog.insert(imageless);
    catalog.insert(common::product(2, "Table", 5000));
    let api = Arc::new(ScriptedMarketplace::new());
    let (engine, store) = engine_with(catalog, api.clone()).await;

    engine.prepare_links().await.unwrap();
    let report = engine.sync_all(10).await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.pushed, 1);
    assert!(api.calls().contains(&"PATCH ps-2".to_string()));
    assert!(!api.calls().contains(&"PATCH ps-1".to_string()));

    let link = store
        .find_by_product(ProductId::new(1), None)
        .await
        .unwrap()
        .unwrap();
    assert!(link.last_error.as_deref().unwrap().contains("images"));
}

#[tokio::test]
async fn not_found_falls_back_to_create() {
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.insert(common::product(1, "Chair", 1000));
    let api = Arc::new(ScriptedMarketplace::new());
    api.script_update("ps-1", 404, "unknown listing");
    api.script_create("ps-1", 201, "{}");
    let (engine, store) = engine_with(catalog, api.clone()).await;

    engine.prepare_links().await.unwrap();
    let report = engine.sync_pending(10).await.unwrap();

    assert_eq!(report.pushed, 1);
    assert_eq!(
        api.calls(),
        vec!["PATCH ps-1".to_string(), "POST ps-1".to_string()]
    );

    let link = store
        .find_by_product(ProductId::new(1), None)
        .await
        .unwrap()
        .unwrap();
    assert!(link.last_synced_at.is_some());
}

// ============================================================================
// sync_one
// ============================================================================

#[tokio::test]
async fn sync_one_pushes_every_variant() {
    let catalog = Arc::new(InMemoryCatalog::new());
    let record = common::with_variant(
        common::with_variant(common::product(2, "Shirt", 2000), 20, 2000),
        21,
        2100,
    );
    catalog.insert(record);
    let api = Arc::new(ScriptedMarketplace::new());
    let (engine, store) = engine_with(catalog, api.clone()).await;

    engine.sync_one(ProductId::new(2), None).await.unwrap();

    assert_eq!(
        api.calls(),
        vec!["PATCH ps-2-20".to_string(), "PATCH ps-2-21".to_string()]
    );

    // links were created lazily with hash and timestamp
    let link = store
        .find_by_product(ProductId::new(2), Some(VariantId::new(20)))
        .await
        .unwrap()
        .unwrap();
    assert!(link.last_synced_at.is_some());
}

#[tokio::test]
async fn sync_one_single_variant_only_touches_that_listing() {
    let catalog = Arc::new(InMemoryCatalog::new());
    let record = common::with_variant(
        common::with_variant(common::product(2, "Shirt", 2000), 20, 2000),
        21,
        2100,
    );
    catalog.insert(record);
    let api = Arc::new(ScriptedMarketplace::new());
    let (engine, _store) = engine_with(catalog, api.clone()).await;

    engine
        .sync_one(ProductId::new(2), Some(VariantId::new(21)))
        .await
        .unwrap();

    assert_eq!(api.calls(), vec!["PATCH ps-2-21".to_string()]);
}
