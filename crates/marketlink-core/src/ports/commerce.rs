//! Commerce port (driven/secondary port)
//!
//! The order-side primitives of the host commerce system: customers,
//! addresses, carts, checkout, and order state transitions. The order
//! engine materializes marketplace orders exclusively through this trait.
//!
//! ## Design Notes
//!
//! - Creation methods return the new row ids; the engine never inspects
//!   commerce entities beyond what it created.
//! - `create_order` is the checkout primitive: it validates the payment
//!   against the amount the caller passes (the cart's own total, so
//!   checkout never rejects the marketplace's money math) and returns the
//!   created order. The marketplace-reported amounts are applied
//!   afterwards via `overwrite_order_totals`.

use serde::{Deserialize, Serialize};

use crate::domain::newtypes::{
    AddressId, CartId, CountryId, CustomerId, OrderId, OrderStateId, ProductId, VariantId,
};

// ============================================================================
// Commerce DTOs
// ============================================================================

/// Request to create a customer address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAddress {
    /// Owning customer
    pub customer: CustomerId,
    /// Address book label (e.g. "Marketplace delivery")
    pub alias: String,
    /// First name on the address
    pub first_name: String,
    /// Last name on the address
    pub last_name: String,
    /// Street line; a single space when the marketplace sent none
    pub street: String,
    /// Postal code
    pub zip: String,
    /// City
    pub city: String,
    /// Phone number
    pub phone: String,
    /// Resolved country
    pub country: CountryId,
}

/// Marketplace-reported amounts applied to a created order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    /// Amount the buyer actually paid, in minor units
    pub paid_minor: i64,
    /// Sum of the product lines, in minor units, when known
    pub products_minor: Option<i64>,
    /// Derived shipping amount, in minor units, when known
    pub shipping_minor: Option<i64>,
}

// ============================================================================
// ICommerce trait
// ============================================================================

/// Port trait for the commerce system's order-side primitives
#[async_trait::async_trait]
pub trait ICommerce: Send + Sync {
    /// Finds a customer by email
    async fn find_customer_by_email(&self, email: &str) -> anyhow::Result<Option<CustomerId>>;

    /// Creates a customer account
    async fn create_customer(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> anyhow::Result<CustomerId>;

    /// Resolves an ISO country code to the commerce system's country row
    async fn country_by_code(&self, iso_code: &str) -> anyhow::Result<Option<CountryId>>;

    /// Creates a customer address
    async fn create_address(&self, address: &NewAddress) -> anyhow::Result<AddressId>;

    /// Creates an empty cart bound to a customer and two addresses
    async fn create_cart(
        &self,
        customer: CustomerId,
        delivery: AddressId,
        billing: AddressId,
    ) -> anyhow::Result<CartId>;

    /// Adds one line to a cart (`variant` is `None` for simple products)
    async fn add_cart_line(
        &self,
        cart: CartId,
        product: ProductId,
        variant: Option<VariantId>,
        quantity: u32,
    ) -> anyhow::Result<()>;

    /// The cart's own computed total in minor units
    async fn cart_total_minor(&self, cart: CartId) -> anyhow::Result<i64>;

    /// Runs checkout over a cart, recording a payment of `amount_minor`
    /// under `payment_method` with the marketplace order id as the
    /// transaction reference, and places the order in `state`
    async fn create_order(
        &self,
        cart: CartId,
        state: OrderStateId,
        amount_minor: i64,
        payment_method: &str,
        transaction_id: &str,
    ) -> anyhow::Result<OrderId>;

    /// Overwrites the order's recorded totals (and its payment row) with
    /// marketplace-reported amounts
    async fn overwrite_order_totals(
        &self,
        order: OrderId,
        totals: &OrderTotals,
    ) -> anyhow::Result<()>;

    /// Current workflow state of an order
    async fn order_state(&self, order: OrderId) -> anyhow::Result<OrderStateId>;

    /// Forces an order into a workflow state
    async fn set_order_state(&self, order: OrderId, state: OrderStateId) -> anyhow::Result<()>;
}
