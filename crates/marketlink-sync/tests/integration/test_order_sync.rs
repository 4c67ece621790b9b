//! Order engine behavior: classification, dedup, paging, acknowledgment,
//! and order materialization

use std::sync::Arc;

use serde_json::json;

use marketlink_core::domain::newtypes::{OrderId, OrderStateId, ProductId, VariantId};
use marketlink_core::ports::event_log::IEventLog;
use marketlink_core::ports::link_store::ILinkStore;
use marketlink_sync::OrderSyncEngine;

use crate::common::{self, ext, market_order, InMemoryCommerce, ScriptedMarketplace};

struct Fixture {
    api: Arc<ScriptedMarketplace>,
    commerce: Arc<InMemoryCommerce>,
    store: Arc<marketlink_store::SqliteLinkStore>,
    engine: OrderSyncEngine,
}

async fn fixture() -> Fixture {
    let api = Arc::new(ScriptedMarketplace::new());
    let commerce = Arc::new(InMemoryCommerce::new());
    let store = common::link_store().await;
    let engine = OrderSyncEngine::new(
        api.clone(),
        store.clone(),
        commerce.clone(),
        store.clone(),
        common::settings(),
    );
    Fixture {
        api,
        commerce,
        store,
        engine,
    }
}

/// A minimal order document for external id `EX<n>`
fn order_doc(id: &str, status: &str, total: i64) -> serde_json::Value {
    json!({
        "id": id,
        "status": status,
        "buyer": {"email": "buyer@example.com", "firstName": "Jan", "lastName": "Kowalski"},
        "shippingAddress": {"street": "Long 1", "zipCode": "80-100", "city": "Gdansk", "countryCode": "PL"},
        "items": [{"externalProductId": "ps-7", "quantity": 2, "price": 900}],
        "summary": {"total": total}
    })
}

fn created_event(event_id: i64, order_id: &str) -> serde_json::Value {
    json!({"id": event_id, "type": "orderCreated", "payload": {"id": order_id}})
}

// ============================================================================
// Creation and dedup
// ============================================================================

#[tokio::test]
async fn order_created_event_materializes_and_acknowledges() {
    let f = fixture().await;
    f.commerce.set_price(7, None, 900);
    f.api
        .push_inbox_page(200, json!([created_event(41, "EX1")]));
    f.api.set_order("EX1", order_doc("EX1", "purchased", 2000));

    let report = f.engine.process_inbox_with(100, 10).await.unwrap();

    assert_eq!(report.batches, 1);
    assert_eq!(report.events, 1);
    assert_eq!(report.created, 1);
    assert_eq!(report.exceptions, 0);
    assert_eq!(report.acknowledged, 1);
    assert_eq!(f.api.acks(), vec!["41".to_string()]);

    let orders = f.commerce.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(
        f.commerce.cart_lines(orders[0].cart),
        vec![common::CartLine {
            product: ProductId::new(7),
            variant: None,
            quantity: 2
        }]
    );

    let link = f
        .store
        .find_order_link(&market_order("EX1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(link.order_id, orders[0].id);
    assert_eq!(link.last_status, "purchased");
}

#[tokio::test]
async fn duplicate_creation_events_yield_one_order() {
    let f = fixture().await;
    f.commerce.set_price(7, None, 900);
    f.api.push_inbox_page(
        200,
        json!([created_event(1, "EX1"), created_event(2, "EX1")]),
    );
    f.api.set_order("EX1", order_doc("EX1", "purchased", 2000));

    let report = f.engine.process_inbox_with(100, 10).await.unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.ignored, 1);
    assert_eq!(f.commerce.orders().len(), 1);

    let entries = f.store.recent(20).await.unwrap();
    assert!(entries
        .iter()
        .any(|e| e.category == "order_skipped_existing" && e.reference == "EX1"));
}

#[tokio::test]
async fn second_run_skips_already_linked_order() {
    let f = fixture().await;
    f.commerce.set_price(7, None, 900);
    f.api
        .push_inbox_page(200, json!([created_event(1, "EX1")]));
    f.api.set_order("EX1", order_doc("EX1", "purchased", 2000));
    f.engine.process_inbox_with(100, 10).await.unwrap();

    // the marketplace redelivers the event (e.g. the ack was lost)
    f.api
        .push_inbox_page(200, json!([created_event(1, "EX1")]));
    let report = f.engine.process_inbox_with(100, 10).await.unwrap();

    assert_eq!(report.created, 0);
    assert_eq!(report.ignored, 1);
    assert_eq!(f.commerce.orders().len(), 1);
}

// ============================================================================
// Status-change events
// ============================================================================

#[tokio::test]
async fn status_change_for_linked_order_is_ignored() {
    let f = fixture().await;
    f.store
        .save_order_link(OrderId::new(50), &market_order("EX1"), "pending")
        .await
        .unwrap();
    f.api.push_inbox_page(
        200,
        json!([{"id": 3, "type": "orderStatusChanged", "payload": {"id": "EX1", "status": "purchased"}}]),
    );

    let report = f.engine.process_inbox_with(100, 10).await.unwrap();

    assert_eq!(report.ignored, 1);
    assert_eq!(report.created, 0);
    assert!(f.commerce.orders().is_empty());

    let entries = f.store.recent(10).await.unwrap();
    assert!(entries
        .iter()
        .any(|e| e.category == "order_status_ignored_existing"));
}

#[tokio::test]
async fn status_change_for_unknown_order_recovers_missed_creation() {
    let f = fixture().await;
    f.commerce.set_price(7, None, 900);
    f.api.push_inbox_page(
        200,
        json!([{"id": 4, "type": "orderSellerStatusChanged", "payload": {"id": "EX9"}}]),
    );
    f.api.set_order("EX9", order_doc("EX9", "pending", 2000));

    let report = f.engine.process_inbox_with(100, 10).await.unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(f.commerce.orders().len(), 1);
    assert!(f
        .store
        .find_order_link(&market_order("EX9"))
        .await
        .unwrap()
        .is_some());

    let entries = f.store.recent(10).await.unwrap();
    assert!(entries
        .iter()
        .any(|e| e.category == "order_created_from_status_event"));
}

// ============================================================================
// Classification edges
// ============================================================================

#[tokio::test]
async fn unknown_event_types_are_logged_and_ignored() {
    let f = fixture().await;
    f.api.push_inbox_page(
        200,
        json!([{"id": 5, "type": "invoiceReady", "payload": {"id": "EX1"}}]),
    );

    let report = f.engine.process_inbox_with(100, 10).await.unwrap();

    assert_eq!(report.ignored, 1);
    assert_eq!(report.exceptions, 0);
    assert_eq!(f.api.acks(), vec!["5".to_string()]);

    let entries = f.store.recent(10).await.unwrap();
    assert!(entries.iter().any(|e| e.category == "order_event_ignored"));
}

#[tokio::test]
async fn event_without_order_id_is_ignored() {
    let f = fixture().await;
    f.api.push_inbox_page(
        200,
        json!([{"id": 6, "type": "orderCreated", "payload": {}}]),
    );

    let report = f.engine.process_inbox_with(100, 10).await.unwrap();

    assert_eq!(report.ignored, 1);
    assert!(f.commerce.orders().is_empty());

    let entries = f.store.recent(10).await.unwrap();
    assert!(entries.iter().any(|e| e.category == "order_event_no_id"));
}

#[tokio::test]
async fn one_bad_event_does_not_abort_the_page() {
    let f = fixture().await;
    f.commerce.set_price(7, None, 900);
    f.api.push_inbox_page(
        200,
        json!([created_event(10, "EXBAD"), created_event(11, "EX2")]),
    );
    f.api.set_order_failure("EXBAD", 500, "exploded");
    f.api.set_order("EX2", order_doc("EX2", "purchased", 2000));

    let report = f.engine.process_inbox_with(100, 10).await.unwrap();

    assert_eq!(report.exceptions, 1);
    assert_eq!(report.created, 1);
    // the page is still acknowledged at its maximum id
    assert_eq!(f.api.acks(), vec!["11".to_string()]);

    let entries = f.store.recent(20).await.unwrap();
    assert!(entries.iter().any(|e| e.category == "order_fetch_error"));
    assert!(entries
        .iter()
        .any(|e| e.category == "order_event_exception"));
}

// ============================================================================
// Acknowledgment id selection
// ============================================================================

#[tokio::test]
async fn numeric_ids_acknowledge_the_larger_one() {
    let f = fixture().await;
    f.api.push_inbox_page(
        200,
        json!([
            {"id": 10, "type": "x", "payload": {}},
            {"id": 3, "type": "x", "payload": {}}
        ]),
    );

    f.engine.process_inbox_with(100, 10).await.unwrap();
    assert_eq!(f.api.acks(), vec!["10".to_string()]);
}

#[tokio::test]
async fn opaque_ids_acknowledge_the_last_seen() {
    let f = fixture().await;
    f.api.push_inbox_page(
        200,
        json!([
            {"id": "evt-b", "type": "x", "payload": {}},
            {"id": "evt-a", "type": "x", "payload": {}}
        ]),
    );

    f.engine.process_inbox_with(100, 10).await.unwrap();
    assert_eq!(f.api.acks(), vec!["evt-a".to_string()]);
}

// ============================================================================
// Paging bounds
// ============================================================================

#[tokio::test]
async fn run_stops_when_page_is_smaller_than_limit() {
    let f = fixture().await;
    // one event, limit 2: drained after the first page
    f.api.push_inbox_page(200, json!([{"id": 1, "type": "x", "payload": {}}]));

    let report = f.engine.process_inbox_with(2, 10).await.unwrap();
    assert_eq!(report.batches, 1);
}

#[tokio::test]
async fn run_stops_at_max_batches() {
    let f = fixture().await;
    // three full pages at limit 1, but only two batches allowed
    for i in 1..=3 {
        f.api
            .push_inbox_page(200, json!([{"id": i, "type": "x", "payload": {}}]));
    }

    let report = f.engine.process_inbox_with(1, 2).await.unwrap();
    assert_eq!(report.batches, 2);
    assert_eq!(report.events, 2);
    assert_eq!(f.api.acks().len(), 2);
}

#[tokio::test]
async fn failed_inbox_fetch_aborts_the_run() {
    let f = fixture().await;
    f.api.push_inbox_page(500, "oops".into());

    let err = f.engine.process_inbox_with(100, 10).await.unwrap_err();
    assert!(matches!(
        err,
        marketlink_core::SyncError::Api { status: 500, .. }
    ));

    let entries = f.store.recent(10).await.unwrap();
    assert!(entries.iter().any(|e| e.category == "order_inbox_error"));
}

#[tokio::test]
async fn failed_ack_is_journaled_but_not_fatal() {
    let f = fixture().await;
    f.api.push_inbox_page(200, json!([{"id": 1, "type": "x", "payload": {}}]));
    f.api.set_ack_response(500, "ack broken");

    let report = f.engine.process_inbox_with(100, 10).await.unwrap();

    assert_eq!(report.acknowledged, 0);
    let entries = f.store.recent(10).await.unwrap();
    assert!(entries.iter().any(|e| e.category == "order_ack_error"));
}

// ============================================================================
// Materialization: states, totals, item resolution
// ============================================================================

#[tokio::test]
async fn marketplace_statuses_map_to_configured_states() {
    let cases = [
        ("purchased", common::STATE_PAID),
        ("pending", common::STATE_PENDING),
        ("cancelled", common::STATE_CANCELLED),
        ("somethingelse", common::STATE_DEFAULT),
    ];

    for (status, expected_state) in cases {
        let f = fixture().await;
        f.commerce.set_price(7, None, 900);
        f.api
            .push_inbox_page(200, json!([created_event(1, "EX1")]));
        f.api.set_order("EX1", order_doc("EX1", status, 2000));

        f.engine.process_inbox_with(100, 10).await.unwrap();

        let orders = f.commerce.orders();
        assert_eq!(
            orders[0].state,
            OrderStateId::new(expected_state),
            "status '{status}' mapped wrong"
        );
    }
}

#[tokio::test]
async fn shipping_is_the_non_negative_total_overhang() {
    // marketplace total 5000, items 4500 -> shipping 500
    let f = fixture().await;
    f.commerce.set_price(7, None, 900);
    f.api.push_inbox_page(200, json!([created_event(1, "EX1")]));
    f.api.set_order(
        "EX1",
        json!({
            "id": "EX1",
            "status": "purchased",
            "items": [{"externalProductId": "ps-7", "quantity": 5, "price": 900}],
            "summary": {"total": 5000}
        }),
    );
    f.engine.process_inbox_with(100, 10).await.unwrap();
    let totals = f.commerce.orders()[0].totals.unwrap();
    assert_eq!(totals.paid_minor, 5000);
    assert_eq!(totals.products_minor, Some(4500));
    assert_eq!(totals.shipping_minor, Some(500));

    // items equal the total -> shipping 0
    let f = fixture().await;
    f.commerce.set_price(7, None, 900);
    f.api.push_inbox_page(200, json!([created_event(1, "EX2")]));
    f.api.set_order(
        "EX2",
        json!({
            "id": "EX2",
            "status": "purchased",
            "items": [{"externalProductId": "ps-7", "quantity": 5, "price": 1000}],
            "summary": {"total": 5000}
        }),
    );
    f.engine.process_inbox_with(100, 10).await.unwrap();
    assert_eq!(f.commerce.orders()[0].totals.unwrap().shipping_minor, Some(0));

    // items above the total -> clamped at 0, never negative
    let f = fixture().await;
    f.commerce.set_price(7, None, 900);
    f.api.push_inbox_page(200, json!([created_event(1, "EX3")]));
    f.api.set_order(
        "EX3",
        json!({
            "id": "EX3",
            "status": "purchased",
            "items": [{"externalProductId": "ps-7", "quantity": 5, "price": 1100}],
            "summary": {"total": 5000}
        }),
    );
    f.engine.process_inbox_with(100, 10).await.unwrap();
    assert_eq!(f.commerce.orders()[0].totals.unwrap().shipping_minor, Some(0));
}

#[tokio::test]
async fn items_resolve_via_link_store_before_patterns() {
    let f = fixture().await;
    f.commerce.set_price(3, Some(30), 1500);
    // the link maps an opaque external id to a (product, variant) pair no
    // pattern could derive
    f.store
        .insert_product_link(ProductId::new(3), Some(VariantId::new(30)), &ext("legacy-listing"))
        .await
        .unwrap();

    f.api.push_inbox_page(200, json!([created_event(1, "EX1")]));
    f.api.set_order(
        "EX1",
        json!({
            "id": "EX1",
            "status": "purchased",
            "items": [{"externalProductId": "legacy-listing", "quantity": 1, "price": 1500}],
            "summary": {"total": 1500}
        }),
    );

    f.engine.process_inbox_with(100, 10).await.unwrap();

    let orders = f.commerce.orders();
    assert_eq!(
        f.commerce.cart_lines(orders[0].cart),
        vec![common::CartLine {
            product: ProductId::new(3),
            variant: Some(VariantId::new(30)),
            quantity: 1
        }]
    );
}

#[tokio::test]
async fn bare_numeric_reference_resolves_via_legacy_pattern() {
    let f = fixture().await;
    f.commerce.set_price(12, Some(345), 700);
    f.api.push_inbox_page(200, json!([created_event(1, "EX1")]));
    f.api.set_order(
        "EX1",
        json!({
            "id": "EX1",
            "status": "purchased",
            "items": [{"externalId": "12-345", "quantity": 3, "price": 700}],
            "summary": {"total": 2100}
        }),
    );

    f.engine.process_inbox_with(100, 10).await.unwrap();

    let orders = f.commerce.orders();
    assert_eq!(
        f.commerce.cart_lines(orders[0].cart),
        vec![common::CartLine {
            product: ProductId::new(12),
            variant: Some(VariantId::new(345)),
            quantity: 3
        }]
    );
}

#[tokio::test]
async fn unresolved_items_are_dropped_and_journaled() {
    let f = fixture().await;
    f.commerce.set_price(7, None, 900);
    f.api.push_inbox_page(200, json!([created_event(1, "EX1")]));
    f.api.set_order(
        "EX1",
        json!({
            "id": "EX1",
            "status": "purchased",
            "items": [
                {"externalProductId": "ps-7", "quantity": 2, "price": 900},
                {"externalProductId": "foreign-sku", "quantity": 1, "price": 100}
            ],
            "summary": {"total": 2000}
        }),
    );

    let report = f.engine.process_inbox_with(100, 10).await.unwrap();
    assert_eq!(report.created, 1);

    let orders = f.commerce.orders();
    assert_eq!(f.commerce.cart_lines(orders[0].cart).len(), 1);

    let entries = f.store.recent(20).await.unwrap();
    assert!(entries
        .iter()
        .any(|e| e.category == "order_item_unresolved" && e.message.contains("foreign-sku")));
}

#[tokio::test]
async fn missing_buyer_email_synthesizes_placeholder() {
    let f = fixture().await;
    f.commerce.set_price(7, None, 900);
    f.api.push_inbox_page(200, json!([created_event(1, "EX1")]));
    f.api.set_order(
        "EX1",
        json!({
            "id": "EX1",
            "status": "purchased",
            "items": [{"externalProductId": "ps-7", "quantity": 1, "price": 900}],
            "summary": {"total": 900}
        }),
    );

    f.engine.process_inbox_with(100, 10).await.unwrap();

    let emails = f.commerce.customer_emails();
    assert_eq!(emails.len(), 1);
    assert!(
        emails[0].starts_with("marketplace-") && emails[0].ends_with("@orders.invalid"),
        "got {}",
        emails[0]
    );
}

#[tokio::test]
async fn unknown_country_falls_back_to_default() {
    let f = fixture().await;
    f.commerce.set_price(7, None, 900);
    f.api.push_inbox_page(200, json!([created_event(1, "EX1")]));
    f.api.set_order(
        "EX1",
        json!({
            "id": "EX1",
            "status": "purchased",
            "shippingAddress": {"street": "Elm 5", "city": "Nowhere", "countryCode": "ZZ"},
            "items": [{"externalProductId": "ps-7", "quantity": 1, "price": 900}],
            "summary": {"total": 900}
        }),
    );

    f.engine.process_inbox_with(100, 10).await.unwrap();

    let addresses = f.commerce.addresses();
    // both delivery and billing resolved to the configured default country
    assert_eq!(addresses.len(), 2);
    assert!(addresses
        .iter()
        .all(|a| a.country == marketlink_core::domain::newtypes::CountryId::new(1)));
}

#[tokio::test]
async fn total_mismatch_against_cart_is_journaled() {
    let f = fixture().await;
    // cart computes 1800 but the marketplace reports 2500
    f.commerce.set_price(7, None, 900);
    f.api.push_inbox_page(200, json!([created_event(1, "EX1")]));
    f.api.set_order("EX1", order_doc("EX1", "purchased", 2500));

    f.engine.process_inbox_with(100, 10).await.unwrap();

    let orders = f.commerce.orders();
    // checkout validated against the cart's own total
    assert_eq!(orders[0].validated_minor, 1800);
    // the recorded totals carry the marketplace amount
    assert_eq!(orders[0].totals.unwrap().paid_minor, 2500);

    let entries = f.store.recent(20).await.unwrap();
    assert!(entries.iter().any(|e| e.category == "order_total_mismatch"));
}
