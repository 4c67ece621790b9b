//! Catalog port (driven/secondary port)
//!
//! Read access to the merchant's product catalog. The engines and the
//! mapper consume catalog snapshots; the host commerce system implements
//! this trait over its own storage.
//!
//! ## Design Notes
//!
//! - [`ProductRecord`] is a port-level DTO, not a domain entity: it is the
//!   self-contained snapshot the pure mapper turns into a wire payload,
//!   so the mapper needs no further catalog access.
//! - Attribute groups are ordered; a group's position in the vector is its
//!   stable index, referenced by the variant-group attribute list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::newtypes::{ProductId, VariantId};

// ============================================================================
// Catalog snapshot DTOs
// ============================================================================

/// One catalog image, already resolved to an absolute URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    /// Absolute URL of the image
    pub url: String,
}

/// Marketplace category mapping for a product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMapping {
    /// Category id in the marketplace's own taxonomy
    pub id: String,
    /// Category display name (informational)
    pub name: String,
}

/// One attribute group a product varies on (e.g. Size, Color)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeGroup {
    /// Group id in the commerce system
    pub id: i64,
    /// Group display name
    pub name: String,
    /// Whether this group represents a color-like axis
    pub is_color: bool,
}

impl AttributeGroup {
    /// Color-like groups get the variant-group "thumbnail" slot: either
    /// flagged by the catalog or recognizable from the name.
    #[must_use]
    pub fn is_color_like(&self) -> bool {
        self.is_color || self.name.to_lowercase().contains("color")
    }
}

/// One sellable variant (combination) of a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    /// Variant id in the commerce system
    pub id: VariantId,
    /// Variant SKU; empty falls back to the product SKU
    pub sku: String,
    /// Variant EAN; empty falls back to the product EAN
    pub ean: String,
    /// Gross price in minor units for this variant
    pub price_minor: i64,
    /// Available stock for this variant
    pub stock: i64,
    /// Images assigned to this variant; empty falls back to the product images
    pub images: Vec<ProductImage>,
    /// One attribute value per attribute group, in group order
    pub attribute_values: Vec<String>,
}

/// Self-contained snapshot of one catalog product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Product id in the commerce system
    pub id: ProductId,
    /// Product display name
    pub name: String,
    /// Product description (HTML or plain text)
    pub description: String,
    /// Product-level SKU (reference)
    pub sku: String,
    /// Product-level EAN
    pub ean: String,
    /// Whether the product is enabled for sale
    pub active: bool,
    /// Gross price in minor units for the no-variant case
    pub price_minor: i64,
    /// Available stock for the no-variant case
    pub stock: i64,
    /// Shipping weight in grams
    pub weight_grams: i64,
    /// Last modification time; feeds the stable image cache-version
    pub updated_at: Option<DateTime<Utc>>,
    /// Product images, cover first
    pub images: Vec<ProductImage>,
    /// Marketplace category mapping, when one is configured
    pub category: Option<CategoryMapping>,
    /// Shipping tags for this product's carrier
    pub shipping_tags: Vec<String>,
    /// Attribute groups the product varies on, ordered; position = index
    pub attribute_groups: Vec<AttributeGroup>,
    /// All sellable variants; empty for a simple product
    pub variants: Vec<VariantRecord>,
}

impl ProductRecord {
    /// Looks up a variant by id
    #[must_use]
    pub fn variant(&self, id: VariantId) -> Option<&VariantRecord> {
        self.variants.iter().find(|v| v.id == id)
    }
}

// ============================================================================
// ICatalog trait
// ============================================================================

/// Port trait for catalog read access
#[async_trait::async_trait]
pub trait ICatalog: Send + Sync {
    /// All product ids, ordered ascending
    async fn product_ids(&self) -> anyhow::Result<Vec<ProductId>>;

    /// Variant ids of one product, ordered ascending; empty for a simple
    /// product
    async fn variant_ids(&self, product: ProductId) -> anyhow::Result<Vec<VariantId>>;

    /// Full snapshot of one product, or `None` when it no longer exists
    async fn product_record(&self, product: ProductId) -> anyhow::Result<Option<ProductRecord>>;
}
