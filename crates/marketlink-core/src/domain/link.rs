//! Link entities and external-id derivation
//!
//! A link is the persisted association between an internal entity and its
//! marketplace identity plus the last-sync state. Product links carry the
//! change-detection hash and error bookkeeping; order links are the dedup
//! gate for inbound order creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{ExternalId, LinkId, MarketOrderId, OrderId, ProductId, VariantId};

// ============================================================================
// ProductLink
// ============================================================================

/// Persisted product↔listing association with last-sync state
///
/// Invariant: at most one link per (product, variant) pair. The variant id
/// is `None` for products sold without variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLink {
    /// Link-store primary key; batch runs page in this order
    pub id: LinkId,
    /// Internal product id
    pub product_id: ProductId,
    /// Internal variant id, `None` for a product without variants
    pub variant_id: Option<VariantId>,
    /// Stable identifier of the listing on the marketplace
    pub external_id: ExternalId,
    /// SHA-256 hex digest of the last successfully pushed canonical payload
    pub last_payload_hash: Option<String>,
    /// When the listing was last confirmed in sync, `None` if never
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Message of the last failed attempt, cleared on success
    pub last_error: Option<String>,
}

impl ProductLink {
    /// Returns true if this link still needs a push: never synced, or the
    /// last attempt failed
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.last_synced_at.is_none() || self.last_error.is_some()
    }
}

// ============================================================================
// OrderLink
// ============================================================================

/// Persisted association between a local order and its marketplace order
///
/// Invariant: one link per external order id. Presence of a link is the
/// sole dedup gate for order creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLink {
    /// Link-store primary key
    pub id: i64,
    /// Local order created for the marketplace order
    pub order_id: OrderId,
    /// Marketplace order id this link dedups on
    pub external_order_id: MarketOrderId,
    /// Last marketplace status string observed for the order
    pub last_status: String,
    /// When the link (and the local order) was created
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// External-id derivation and resolution
// ============================================================================

/// Derives the stable external id for a (product, variant) pair:
/// `<prefix>-<product>` or `<prefix>-<product>-<variant>`.
#[must_use]
pub fn derive_external_id(
    prefix: &str,
    product: ProductId,
    variant: Option<VariantId>,
) -> ExternalId {
    let raw = match variant {
        Some(v) => format!("{prefix}-{product}-{v}"),
        None => format!("{prefix}-{product}"),
    };
    // prefix is validated non-empty by configuration, so this cannot fail
    ExternalId::new(raw).unwrap_or_else(|_| unreachable!("derived external id is never empty"))
}

/// Resolves an external reference back to internal ids without consulting
/// the link store.
///
/// Two legacy identifier patterns are recognized, tried in order:
/// 1. `<prefix>-<product>[-<variant>]`
/// 2. `<product>[-<variant>]` (bare numeric form used by early integrations)
///
/// Returns `None` when the reference matches neither pattern.
#[must_use]
pub fn parse_external_ref(
    reference: &str,
    prefix: &str,
) -> Option<(ProductId, Option<VariantId>)> {
    let reference = reference.trim();

    let numeric_part = match reference.strip_prefix(prefix) {
        Some(rest) => rest.strip_prefix('-')?,
        None => reference,
    };

    let mut parts = numeric_part.split('-');
    let product: i64 = parts.next()?.parse().ok()?;
    if product <= 0 {
        return None;
    }

    let variant = match parts.next() {
        Some(v) => {
            let v: i64 = v.parse().ok()?;
            if v <= 0 {
                return None;
            }
            Some(VariantId::new(v))
        }
        None => None,
    };

    // anything after the variant segment is not ours
    if parts.next().is_some() {
        return None;
    }

    Some((ProductId::new(product), variant))
}

// ============================================================================
// Tests
// ============================================================================
