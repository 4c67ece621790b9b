//! Typed view over an inbound marketplace order document
//!
//! Marketplace order payloads spell the same field several ways depending
//! on API version and event source. Instead of chaining ad hoc lookups at
//! every call site, this module exposes named accessors with a fixed,
//! documented fallback order per field. The view borrows the raw JSON; it
//! never copies the document.
//!
//! Fallback orders:
//!
//! | Accessor            | Keys tried, in order                                   |
//! |---------------------|--------------------------------------------------------|
//! | `external_id`       | `id`, `orderId`                                        |
//! | `buyer_email`       | `buyer.email`, `user.email`                            |
//! | `buyer_first_name`  | `buyer.firstName`, `user.deliveryAddress.firstName`    |
//! | `buyer_last_name`   | `buyer.lastName`, `user.deliveryAddress.lastName`      |
//! | `shipping_address`  | `shippingAddress`, `deliveryAddress`, `user.deliveryAddress` |
//! | `billing_address`   | `billingAddress`, `invoiceAddress`, `user.invoiceAddress`, shipping |
//! | `total_minor`       | `summary.total`, `summary.totalToPay`, `totalPrice`    |
//! | item `reference`    | `externalProductId`, `externalId`                      |
//! | item `total_minor`  | `totalPrice`, `price × quantity`                       |
//! | address `street`    | `street`, `address`                                    |
//! | address `zip`       | `zipCode`, `zip`                                       |
//! | address `country`   | `countryCode`, `country`                               |

use serde_json::Value;

use super::newtypes::MarketOrderId;

/// Read-only view over a decoded order document
#[derive(Debug, Clone, Copy)]
pub struct OrderDocument<'a> {
    raw: &'a Value,
}

impl<'a> OrderDocument<'a> {
    /// Wraps a decoded order document
    #[must_use]
    pub fn new(raw: &'a Value) -> Self {
        Self { raw }
    }

    /// The underlying JSON, for journaling
    #[must_use]
    pub fn raw(&self) -> &'a Value {
        self.raw
    }

    /// Marketplace order id: `id`, then `orderId`
    #[must_use]
    pub fn external_id(&self) -> Option<MarketOrderId> {
        let raw = string_field(self.raw, "id").or_else(|| string_field(self.raw, "orderId"))?;
        MarketOrderId::new(raw).ok()
    }

    /// Marketplace status string (empty when absent)
    #[must_use]
    pub fn status(&self) -> &'a str {
        self.raw.get("status").and_then(Value::as_str).unwrap_or("")
    }

    /// Buyer email: `buyer.email`, then `user.email`
    #[must_use]
    pub fn buyer_email(&self) -> Option<&'a str> {
        nested_str(self.raw, &["buyer", "email"])
            .or_else(|| nested_str(self.raw, &["user", "email"]))
    }

    /// Buyer first name: `buyer.firstName`, then `user.deliveryAddress.firstName`
    #[must_use]
    pub fn buyer_first_name(&self) -> Option<&'a str> {
        nested_str(self.raw, &["buyer", "firstName"])
            .or_else(|| nested_str(self.raw, &["user", "deliveryAddress", "firstName"]))
    }

    /// Buyer last name: `buyer.lastName`, then `user.deliveryAddress.lastName`
    #[must_use]
    pub fn buyer_last_name(&self) -> Option<&'a str> {
        nested_str(self.raw, &["buyer", "lastName"])
            .or_else(|| nested_str(self.raw, &["user", "deliveryAddress", "lastName"]))
    }

    /// Delivery address: `shippingAddress`, `deliveryAddress`, `user.deliveryAddress`
    #[must_use]
    pub fn shipping_address(&self) -> Option<AddressView<'a>> {
        object_at(self.raw, &["shippingAddress"])
            .or_else(|| object_at(self.raw, &["deliveryAddress"]))
            .or_else(|| object_at(self.raw, &["user", "deliveryAddress"]))
            .map(AddressView::new)
    }

    /// Billing address: `billingAddress`, `invoiceAddress`,
    /// `user.invoiceAddress`, falling back to the delivery address
    #[must_use]
    pub fn billing_address(&self) -> Option<AddressView<'a>> {
        object_at(self.raw, &["billingAddress"])
            .or_else(|| object_at(self.raw, &["invoiceAddress"]))
            .or_else(|| object_at(self.raw, &["user", "invoiceAddress"]))
            .map(AddressView::new)
            .or_else(|| self.shipping_address())
    }

    /// Order lines (empty when absent or not an array)
    #[must_use]
    pub fn items(&self) -> Vec<ItemView<'a>> {
        self.raw
            .get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| item.is_object())
                    .map(ItemView::new)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Order total in minor units: `summary.total`, `summary.totalToPay`,
    /// `totalPrice`
    #[must_use]
    pub fn total_minor(&self) -> Option<i64> {
        nested_i64(self.raw, &["summary", "total"])
            .or_else(|| nested_i64(self.raw, &["summary", "totalToPay"]))
            .or_else(|| nested_i64(self.raw, &["totalPrice"]))
    }

    /// Sum of the line totals in minor units; `None` when no line carries
    /// an amount
    #[must_use]
    pub fn items_total_minor(&self) -> Option<i64> {
        let mut sum = 0i64;
        let mut found = false;
        for item in self.items() {
            if let Some(total) = item.total_minor() {
                sum += total;
                found = true;
            }
        }
        found.then_some(sum)
    }
}

/// Read-only view over one address block of an order document
#[derive(Debug, Clone, Copy)]
pub struct AddressView<'a> {
    raw: &'a Value,
}

impl<'a> AddressView<'a> {
    fn new(raw: &'a Value) -> Self {
        Self { raw }
    }

    /// First name on the address
    #[must_use]
    pub fn first_name(&self) -> Option<&'a str> {
        string_ref(self.raw, "firstName")
    }

    /// Last name on the address
    #[must_use]
    pub fn last_name(&self) -> Option<&'a str> {
        string_ref(self.raw, "lastName")
    }

    /// Street line: `street`, then `address`
    #[must_use]
    pub fn street(&self) -> Option<&'a str> {
        string_ref(self.raw, "street").or_else(|| string_ref(self.raw, "address"))
    }

    /// Postal code: `zipCode`, then `zip`
    #[must_use]
    pub fn zip(&self) -> Option<&'a str> {
        string_ref(self.raw, "zipCode").or_else(|| string_ref(self.raw, "zip"))
    }

    /// City name
    #[must_use]
    pub fn city(&self) -> Option<&'a str> {
        string_ref(self.raw, "city")
    }

    /// Phone number
    #[must_use]
    pub fn phone(&self) -> Option<&'a str> {
        string_ref(self.raw, "phone")
    }

    /// Country code: `countryCode`, then `country`
    #[must_use]
    pub fn country(&self) -> Option<&'a str> {
        string_ref(self.raw, "countryCode").or_else(|| string_ref(self.raw, "country"))
    }
}

/// Read-only view over one order line
#[derive(Debug, Clone, Copy)]
pub struct ItemView<'a> {
    raw: &'a Value,
}

impl<'a> ItemView<'a> {
    fn new(raw: &'a Value) -> Self {
        Self { raw }
    }

    /// External product reference: `externalProductId`, then `externalId`
    #[must_use]
    pub fn reference(&self) -> Option<&'a str> {
        string_ref(self.raw, "externalProductId").or_else(|| string_ref(self.raw, "externalId"))
    }

    /// Ordered quantity, clamped to at least 1
    #[must_use]
    pub fn quantity(&self) -> u32 {
        let qty = self
            .raw
            .get("quantity")
            .and_then(Value::as_i64)
            .unwrap_or(1);
        u32::try_from(qty.max(1)).unwrap_or(1)
    }

    /// Unit price in minor units, when present
    #[must_use]
    pub fn unit_price_minor(&self) -> Option<i64> {
        self.raw.get("price").and_then(Value::as_i64)
    }

    /// Line total in minor units: `totalPrice`, then `price × quantity`
    #[must_use]
    pub fn total_minor(&self) -> Option<i64> {
        if let Some(total) = self.raw.get("totalPrice").and_then(Value::as_i64) {
            return Some(total);
        }
        self.unit_price_minor()
            .map(|price| price * i64::from(self.quantity()))
    }
}

// ============================================================================
// Lookup helpers
// ============================================================================

/// String value at a nested key path
fn nested_str<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    current.as_str().map(str::trim).filter(|s| !s.is_empty())
}

/// Integer value at a nested key path
fn nested_i64(value: &Value, path: &[&str]) -> Option<i64> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    current.as_i64()
}

/// Object value at a nested key path
fn object_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    current.is_object().then_some(current)
}

/// Non-empty trimmed string field, tolerating numeric ids
fn string_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Non-empty trimmed borrowed string field
fn string_ref<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

// ============================================================================
// Tests
// ============================================================================
