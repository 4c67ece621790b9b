//! End-to-end flows over a real HTTP client and a mock marketplace
//!
//! These tests wire the engines to the actual `marketlink-api` transport
//! (against wiremock) and the real SQLite link store, leaving only the
//! commerce side in memory.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use marketlink_api::{ApiClient, MarketplaceClient};
use marketlink_core::domain::newtypes::ProductId;
use marketlink_core::ports::link_store::ILinkStore;
use marketlink_sync::{OrderSyncEngine, ProductSyncEngine};

use crate::common::{self, ext, market_order, InMemoryCatalog, InMemoryCommerce};

async fn http_client(server: &MockServer) -> Arc<MarketplaceClient> {
    Arc::new(MarketplaceClient::new(ApiClient::with_base_url(
        "test-key",
        server.uri(),
    )))
}

#[tokio::test]
async fn inbound_order_flows_from_inbox_to_local_order() {
    let server = MockServer::start().await;

    // one creation event waiting in the inbox
    Mock::given(method("GET"))
        .and(path("/inbox"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 7, "type": "orderCreated", "payload": {"id": "EX1"}}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    // the order document behind it
    Mock::given(method("GET"))
        .and(path("/orders/EX1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "EX1",
            "status": "purchased",
            "buyer": {"email": "buyer@example.com", "firstName": "Jan", "lastName": "Kowalski"},
            "shippingAddress": {"street": "Long 1", "zipCode": "80-100", "city": "Gdansk", "countryCode": "PL"},
            "items": [{"externalProductId": "ps-7", "quantity": 2, "price": 900}],
            "summary": {"total": 2000}
        })))
        .expect(1)
        .mount(&server)
        .await;

    // the page must be acknowledged with the event's id
    Mock::given(method("POST"))
        .and(path("/inbox"))
        .and(body_json(json!({"lastMessageId": "7"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let api = http_client(&server).await;
    let store = common::link_store().await;
    let commerce = Arc::new(InMemoryCommerce::new());
    commerce.set_price(7, None, 900);

    // the listing was published earlier, so the link store resolves ps-7
    store
        .insert_product_link(ProductId::new(7), None, &ext("ps-7"))
        .await
        .unwrap();

    let engine = OrderSyncEngine::new(
        api,
        store.clone(),
        commerce.clone(),
        store.clone(),
        common::settings(),
    );
    let report = engine.process_inbox().await.unwrap();

    assert_eq!(report.batches, 1);
    assert_eq!(report.events, 1);
    assert_eq!(report.created, 1);
    assert_eq!(report.acknowledged, 1);

    // exactly one local order, 2 units of internal product 7
    let orders = commerce.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(
        commerce.cart_lines(orders[0].cart),
        vec![common::CartLine {
            product: ProductId::new(7),
            variant: None,
            quantity: 2
        }]
    );

    // marketplace-reported money: paid 2000, products 1800, shipping 200
    let totals = orders[0].totals.unwrap();
    assert_eq!(totals.paid_minor, 2000);
    assert_eq!(totals.products_minor, Some(1800));
    assert_eq!(totals.shipping_minor, Some(200));

    // linked for dedup
    let link = store
        .find_order_link(&market_order("EX1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(link.order_id, orders[0].id);

    // wiremock verifies the expected ack on drop
    server.verify().await;
}

#[tokio::test]
async fn outbound_listing_survives_the_create_fallback() {
    let server = MockServer::start().await;

    // the marketplace has never seen this listing
    Mock::given(method("PATCH"))
        .and(path("/products/ps-1"))
        .respond_with(ResponseTemplate::new(404).set_body_string("unknown listing"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/products/ps-1"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let api = http_client(&server).await;
    let store = common::link_store().await;
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.insert(common::product(1, "Oak Chair", 14900));

    let engine = ProductSyncEngine::new(
        api,
        store.clone(),
        catalog,
        store.clone(),
        common::settings(),
    );

    engine.prepare_links().await.unwrap();
    let report = engine.sync_pending(10).await.unwrap();
    assert_eq!(report.pushed, 1);

    let link = store
        .find_by_product(ProductId::new(1), None)
        .await
        .unwrap()
        .unwrap();
    assert!(link.last_synced_at.is_some());
    assert_eq!(link.last_error, None);

    server.verify().await;
}
