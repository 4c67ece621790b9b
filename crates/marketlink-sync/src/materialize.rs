//! Order materialization
//!
//! Turns a fetched marketplace order document into a local order through
//! the commerce primitives: customer, addresses, cart, checkout, totals,
//! and a final state transition. Item references are resolved best-effort;
//! an unresolvable line is journaled and dropped rather than failing the
//! whole order.

use tracing::{debug, info, warn};

use marketlink_core::config::SyncSettings;
use marketlink_core::domain::link::parse_external_ref;
use marketlink_core::domain::newtypes::{
    AddressId, CartId, CountryId, CustomerId, ExternalId, MarketOrderId, OrderId, ProductId,
    VariantId,
};
use marketlink_core::domain::order_doc::{AddressView, OrderDocument};
use marketlink_core::error::SyncError;
use marketlink_core::ports::commerce::{ICommerce, NewAddress, OrderTotals};
use marketlink_core::ports::event_log::IEventLog;
use marketlink_core::ports::link_store::ILinkStore;

/// Materializes marketplace orders into the commerce system
///
/// Borrowed by the order engine per run; holds no state of its own.
pub struct OrderImporter<'a> {
    store: &'a dyn ILinkStore,
    commerce: &'a dyn ICommerce,
    journal: &'a dyn IEventLog,
    settings: &'a SyncSettings,
}

impl<'a> OrderImporter<'a> {
    /// Creates an importer over the given ports
    pub fn new(
        store: &'a dyn ILinkStore,
        commerce: &'a dyn ICommerce,
        journal: &'a dyn IEventLog,
        settings: &'a SyncSettings,
    ) -> Self {
        Self {
            store,
            commerce,
            journal,
            settings,
        }
    }

    /// Creates the local order for a marketplace order document.
    ///
    /// The checkout primitive is validated against the cart's own computed
    /// total (so the commerce system never rejects the marketplace's money
    /// math); the marketplace-reported amounts are then written over the
    /// order's recorded totals, with shipping derived as
    /// `max(0, order total − sum of item totals)`. The final step forces
    /// the order into the state mapped from the marketplace status.
    pub async fn import(
        &self,
        doc: &OrderDocument<'_>,
        external: &MarketOrderId,
    ) -> Result<OrderId, SyncError> {
        let customer = self.derive_customer(doc).await?;

        let shipping_view = doc.shipping_address();
        let billing_view = doc.billing_address();

        let first_name = doc.buyer_first_name().unwrap_or("Marketplace");
        let last_name = doc.buyer_last_name().unwrap_or("Customer");

        let delivery = self
            .create_address(
                customer,
                "Marketplace delivery",
                shipping_view.as_ref(),
                first_name,
                last_name,
            )
            .await?;
        let billing = self
            .create_address(
                customer,
                "Marketplace billing",
                billing_view.as_ref(),
                first_name,
                last_name,
            )
            .await?;

        let cart = self
            .commerce
            .create_cart(customer, delivery, billing)
            .await
            .map_err(|e| SyncError::Persistence(format!("create_cart: {e:#}")))?;

        self.fill_cart(cart, doc, external).await?;

        // amounts reported by the marketplace, in minor units
        let order_total = doc.total_minor();
        let items_total = doc.items_total_minor();
        let shipping_total = match (order_total, items_total) {
            (Some(total), Some(items)) => Some((total - items).max(0)),
            _ => None,
        };

        let cart_total = self
            .commerce
            .cart_total_minor(cart)
            .await
            .map_err(|e| SyncError::Persistence(format!("cart_total: {e:#}")))?;

        if let Some(total) = order_total {
            if (total - cart_total).abs() > 1 {
                self.journal_entry(
                    "order_total_mismatch",
                    external.as_str(),
                    &format!(
                        "marketplace total {total} differs from cart total {cart_total}; \
                         checkout validated against the cart, totals overwritten afterwards"
                    ),
                    Some(&doc.raw().to_string()),
                )
                .await;
            }
        }

        let target_state = self.settings.orders.target_state(doc.status());

        // validate against the cart's own total so checkout never flags
        // the payment as inconsistent
        let order = self
            .commerce
            .create_order(
                cart,
                target_state,
                cart_total,
                &self.settings.orders.payment_method,
                external.as_str(),
            )
            .await
            .map_err(|e| SyncError::Persistence(format!("create_order: {e:#}")))?;

        let totals = OrderTotals {
            paid_minor: order_total.unwrap_or(cart_total),
            products_minor: items_total,
            shipping_minor: shipping_total,
        };
        self.commerce
            .overwrite_order_totals(order, &totals)
            .await
            .map_err(|e| SyncError::Persistence(format!("overwrite_order_totals: {e:#}")))?;

        let current = self
            .commerce
            .order_state(order)
            .await
            .map_err(|e| SyncError::Persistence(format!("order_state: {e:#}")))?;
        if current != target_state {
            debug!(%order, from = %current, to = %target_state, "Forcing order state");
            self.commerce
                .set_order_state(order, target_state)
                .await
                .map_err(|e| SyncError::Persistence(format!("set_order_state: {e:#}")))?;
        }

        info!(%order, external = %external, "Materialized marketplace order");
        Ok(order)
    }

    // ========================================================================
    // Customer and addresses
    // ========================================================================

    /// Finds or creates the buyer's customer account; synthesizes a unique
    /// placeholder email when the order carries none
    async fn derive_customer(&self, doc: &OrderDocument<'_>) -> Result<CustomerId, SyncError> {
        let email = match doc.buyer_email() {
            Some(email) => email.to_lowercase(),
            None => format!(
                "marketplace-{}@{}",
                uuid::Uuid::new_v4().simple(),
                self.settings.orders.placeholder_email_domain
            ),
        };

        if let Some(existing) = self
            .commerce
            .find_customer_by_email(&email)
            .await
            .map_err(|e| SyncError::Persistence(format!("find_customer: {e:#}")))?
        {
            return Ok(existing);
        }

        let first = doc.buyer_first_name().unwrap_or("Marketplace");
        let last = doc.buyer_last_name().unwrap_or("Customer");

        self.commerce
            .create_customer(&email, first, last)
            .await
            .map_err(|e| SyncError::Persistence(format!("create_customer: {e:#}")))
    }

    /// Builds and creates one address from a document view (or from
    /// nothing, when the marketplace sent no address block at all)
    async fn create_address(
        &self,
        customer: CustomerId,
        alias: &str,
        view: Option<&AddressView<'_>>,
        fallback_first: &str,
        fallback_last: &str,
    ) -> Result<AddressId, SyncError> {
        let country = self.resolve_country(view).await?;

        let request = NewAddress {
            customer,
            alias: alias.to_string(),
            first_name: view
                .and_then(|v| v.first_name())
                .unwrap_or(fallback_first)
                .to_string(),
            last_name: view
                .and_then(|v| v.last_name())
                .unwrap_or(fallback_last)
                .to_string(),
            // commerce systems tend to require a non-empty street line
            street: view
                .and_then(|v| v.street())
                .unwrap_or(" ")
                .to_string(),
            zip: view.and_then(|v| v.zip()).unwrap_or("").to_string(),
            city: view.and_then(|v| v.city()).unwrap_or("").to_string(),
            phone: view.and_then(|v| v.phone()).unwrap_or("").to_string(),
            country,
        };

        self.commerce
            .create_address(&request)
            .await
            .map_err(|e| SyncError::Persistence(format!("create_address: {e:#}")))
    }

    /// Country from the address block, falling back to the configured
    /// default; an unresolvable default is a configuration error
    async fn resolve_country(
        &self,
        view: Option<&AddressView<'_>>,
    ) -> Result<CountryId, SyncError> {
        if let Some(code) = view.and_then(|v| v.country()) {
            if let Some(country) = self
                .commerce
                .country_by_code(&code.to_uppercase())
                .await
                .map_err(|e| SyncError::Persistence(format!("country_by_code: {e:#}")))?
            {
                return Ok(country);
            }
            debug!(code, "Unknown country code, falling back to default");
        }

        let default_code = self.settings.orders.default_country.to_uppercase();
        self.commerce
            .country_by_code(&default_code)
            .await
            .map_err(|e| SyncError::Persistence(format!("country_by_code: {e:#}")))?
            .ok_or_else(|| {
                SyncError::Mapping(format!(
                    "default country {default_code} is not known to the commerce system"
                ))
            })
    }

    // ========================================================================
    // Cart lines
    // ========================================================================

    /// Adds one cart line per resolvable order item; unresolved items are
    /// journaled and dropped
    async fn fill_cart(
        &self,
        cart: CartId,
        doc: &OrderDocument<'_>,
        external: &MarketOrderId,
    ) -> Result<(), SyncError> {
        for item in doc.items() {
            let Some(reference) = item.reference() else {
                self.journal_entry(
                    "order_item_unresolved",
                    external.as_str(),
                    "order item carries no external reference; line dropped",
                    None,
                )
                .await;
                continue;
            };

            let Some((product, variant)) = self.resolve_item(reference).await else {
                self.journal_entry(
                    "order_item_unresolved",
                    external.as_str(),
                    &format!("no product resolves reference '{reference}'; line dropped"),
                    None,
                )
                .await;
                continue;
            };

            self.commerce
                .add_cart_line(cart, product, variant, item.quantity())
                .await
                .map_err(|e| SyncError::Persistence(format!("add_cart_line: {e:#}")))?;
        }

        Ok(())
    }

    /// Resolves an item's external reference: link store first, then the
    /// two legacy identifier patterns
    async fn resolve_item(&self, reference: &str) -> Option<(ProductId, Option<VariantId>)> {
        if let Ok(external) = ExternalId::new(reference) {
            match self.store.find_by_external_id(&external).await {
                Ok(Some(link)) => return Some((link.product_id, link.variant_id)),
                Ok(None) => {}
                Err(err) => {
                    warn!(reference, error = %err, "Link lookup failed, trying id patterns");
                }
            }
        }

        parse_external_ref(reference, &self.settings.products.external_id_prefix)
    }

    /// Best-effort journal append
    async fn journal_entry(
        &self,
        category: &str,
        reference: &str,
        message: &str,
        payload: Option<&str>,
    ) {
        if let Err(err) = self
            .journal
            .append(category, reference, message, payload)
            .await
        {
            warn!(category, error = %err, "Failed to append journal entry");
        }
    }
}
