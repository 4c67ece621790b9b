//! Product payload mapper
//!
//! Pure conversion from a catalog snapshot ([`ProductRecord`]) to the wire
//! payload the marketplace expects. Each variant of a product is published
//! as an independent listing; sibling variants are tied together through
//! the `externalVariantGroup` block.
//!
//! The mapper never touches configuration or storage beyond the
//! [`ProductSettings`] it is handed, so payload construction is fully
//! deterministic and testable in isolation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ProductSettings;
use crate::domain::link::derive_external_id;
use crate::domain::newtypes::VariantId;
use crate::error::SyncError;
use crate::ports::catalog::{ProductRecord, VariantRecord};

// ============================================================================
// Payload types
// ============================================================================

/// Listing availability on the marketplace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    /// Buyable
    Active,
    /// Hidden from buyers
    Inactive,
}

/// `dispatchTime` block: handling time before shipment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchTime {
    /// Lead time in days
    pub period: u32,
}

/// `packaging` block: shipment weight and carrier tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packaging {
    /// Weight in grams, at least 1
    pub weight: i64,
    /// Carrier shipping tags
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// One image reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadImage {
    /// Absolute https URL
    pub url: String,
}

/// One `externalCategories` entry (marketplace taxonomy reference)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCategory {
    /// Always `marketplace`: the id below is in the marketplace's taxonomy
    pub source: String,
    /// Single-element breadcrumb pointing at the mapped category
    pub breadcrumb: Vec<CategoryCrumb>,
}

/// One breadcrumb element of an external category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCrumb {
    /// Category id in the marketplace taxonomy
    pub id: String,
    /// Category display name
    pub name: String,
}

/// One `externalAttributes` entry (variant listing only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAttribute {
    /// Always `shop`: ids are the merchant's own attribute-group ids
    pub source: String,
    /// Attribute-group id
    pub id: String,
    /// Attribute-group display name
    pub name: String,
    /// Always `string`
    #[serde(rename = "type")]
    pub value_type: String,
    /// The variant's value for this group
    pub values: Vec<String>,
    /// Stable group index within the product
    pub index: u32,
}

/// One slot of the variant-group attribute list: either the stable group
/// index, or the literal `thumbnail` marker replacing a color-like group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariantGroupSlot {
    /// Named slot (`thumbnail`)
    Named(String),
    /// Index of an attribute group
    Index(u32),
}

/// `externalVariantGroup` block tying sibling variants together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalVariantGroup {
    /// Group id; the internal product id is stable across siblings
    pub id: String,
    /// Always `integration`
    pub source: String,
    /// Attribute slots buyers pick between; a color-like group is replaced
    /// by a leading `thumbnail` slot because the color is visible on the
    /// variant's own images
    pub attributes: Vec<VariantGroupSlot>,
}

/// Outbound listing payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPayload {
    pub external_id: String,
    pub status: ProductStatus,
    pub name: String,
    pub description: String,
    /// Gross price in minor units
    pub price: i64,
    pub stock: i64,
    pub ean: String,
    pub sku: String,
    pub dispatch_time: DispatchTime,
    pub packaging: Packaging,
    /// Required by the marketplace, never empty
    pub images: Vec<PayloadImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_categories: Option<Vec<ExternalCategory>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_attributes: Option<Vec<ExternalAttribute>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_variant_group: Option<ExternalVariantGroup>,
}

impl ProductPayload {
    /// The payload as a JSON value, ready for hashing or pushing
    pub fn to_value(&self) -> Result<Value, SyncError> {
        serde_json::to_value(self).map_err(|e| SyncError::Mapping(e.to_string()))
    }
}

// ============================================================================
// Mapping
// ============================================================================

/// Minimum usable length for a listing name
const MIN_NAME_CHARS: usize = 3;

/// Maps a catalog snapshot (and optionally one of its variants) to the
/// outbound listing payload.
///
/// # Errors
/// Returns [`SyncError::Mapping`] when the variant does not exist on the
/// record or when no image can be resolved — the marketplace rejects
/// listings without images, so we fail the item before the network call.
pub fn map_product(
    record: &ProductRecord,
    variant: Option<VariantId>,
    settings: &ProductSettings,
) -> Result<ProductPayload, SyncError> {
    let variant_record = match variant {
        Some(id) => Some(record.variant(id).ok_or_else(|| {
            SyncError::Mapping(format!("variant {id} not found on product {}", record.id))
        })?),
        None => None,
    };

    let external_id = derive_external_id(&settings.external_id_prefix, record.id, variant);

    let name = listing_name(record, variant_record);

    let (price_minor, stock) = match variant_record {
        Some(v) => (v.price_minor, v.stock),
        None => (record.price_minor, record.stock),
    };
    let price = price_minor.max(0);
    let stock = stock.max(0);

    let status = if record.active && stock > 0 {
        ProductStatus::Active
    } else {
        ProductStatus::Inactive
    };

    let ean = variant_record
        .map(|v| v.ean.trim())
        .filter(|e| !e.is_empty())
        .unwrap_or(record.ean.trim())
        .to_string();
    let sku = variant_record
        .map(|v| v.sku.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or(record.sku.trim())
        .to_string();

    let images = build_images(record, variant_record)?;

    let tags = shipping_tags(record, settings);
    let packaging = Packaging {
        weight: record.weight_grams.max(1),
        tags,
    };

    let external_categories = record.category.as_ref().map(|mapping| {
        vec![ExternalCategory {
            source: "marketplace".to_string(),
            breadcrumb: vec![CategoryCrumb {
                id: mapping.id.clone(),
                name: mapping.name.clone(),
            }],
        }]
    });

    let (external_attributes, external_variant_group) = match variant_record {
        Some(v) => (
            build_external_attributes(record, v),
            build_variant_group(record),
        ),
        None => (None, None),
    };

    Ok(ProductPayload {
        external_id: external_id.as_str().to_string(),
        status,
        name,
        description: record.description.clone(),
        price,
        stock,
        ean,
        sku,
        dispatch_time: DispatchTime {
            period: settings.dispatch_days.max(1),
        },
        packaging,
        images,
        external_categories,
        external_attributes,
        external_variant_group,
    })
}

/// Listing name: product name, SKU, or a generated placeholder; variants
/// get their attribute values appended.
fn listing_name(record: &ProductRecord, variant: Option<&VariantRecord>) -> String {
    let mut base = record.name.trim().to_string();
    if base.chars().count() < MIN_NAME_CHARS {
        let sku = record.sku.trim();
        base = if sku.chars().count() >= MIN_NAME_CHARS {
            sku.to_string()
        } else {
            format!("Product #{}", record.id)
        };
    }

    let Some(variant) = variant else {
        return base;
    };

    let suffix: Vec<&str> = variant
        .attribute_values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect();
    if suffix.is_empty() {
        return base;
    }

    let name = format!("{base} - {}", suffix.join(" - "));
    if name.chars().count() < MIN_NAME_CHARS {
        base
    } else {
        name
    }
}

/// Variant-assigned images when present, else the product's own; URLs are
/// forced to https and versioned with a cache parameter stable for the
/// record's last modification.
fn build_images(
    record: &ProductRecord,
    variant: Option<&VariantRecord>,
) -> Result<Vec<PayloadImage>, SyncError> {
    let source = match variant {
        Some(v) if !v.images.is_empty() => &v.images,
        _ => &record.images,
    };

    let cache_version = record.updated_at.map(|t| t.timestamp()).unwrap_or(0);

    let mut images = Vec::with_capacity(source.len());
    let mut seen = std::collections::HashSet::new();
    for image in source {
        let url = image.url.trim();
        if url.is_empty() || !seen.insert(url.to_string()) {
            continue;
        }

        let secured = if let Some(rest) = url.strip_prefix("http://") {
            format!("https://{rest}")
        } else {
            url.to_string()
        };

        let separator = if secured.contains('?') { '&' } else { '?' };
        images.push(PayloadImage {
            url: format!("{secured}{separator}v={cache_version}"),
        });
    }

    if images.is_empty() {
        return Err(SyncError::Mapping(format!(
            "product {} has no images; the marketplace requires at least one",
            record.id
        )));
    }

    Ok(images)
}

/// Product-level shipping tags, falling back to the configured defaults
fn shipping_tags(record: &ProductRecord, settings: &ProductSettings) -> Option<Vec<String>> {
    let cleaned: Vec<String> = record
        .shipping_tags
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    let tags = if cleaned.is_empty() {
        settings.default_shipping_tags.clone()
    } else {
        cleaned
    };

    (!tags.is_empty()).then_some(tags)
}

/// One entry per attribute group the variant carries a value for
fn build_external_attributes(
    record: &ProductRecord,
    variant: &VariantRecord,
) -> Option<Vec<ExternalAttribute>> {
    let mut attributes = Vec::new();
    for (index, group) in record.attribute_groups.iter().enumerate() {
        let Some(value) = variant.attribute_values.get(index) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        attributes.push(ExternalAttribute {
            source: "shop".to_string(),
            id: group.id.to_string(),
            name: group.name.clone(),
            value_type: "string".to_string(),
            values: vec![value.to_string()],
            index: index as u32,
        });
    }

    (!attributes.is_empty()).then_some(attributes)
}

/// Variant group over the product's attribute-group indexes; a color-like
/// group is folded into a leading `thumbnail` slot
fn build_variant_group(record: &ProductRecord) -> Option<ExternalVariantGroup> {
    if record.attribute_groups.is_empty() {
        return None;
    }

    let color_indexes: Vec<u32> = record
        .attribute_groups
        .iter()
        .enumerate()
        .filter(|(_, g)| g.is_color_like())
        .map(|(i, _)| i as u32)
        .collect();

    let all_indexes = 0..record.attribute_groups.len() as u32;

    let attributes: Vec<VariantGroupSlot> = if color_indexes.is_empty() {
        all_indexes.map(VariantGroupSlot::Index).collect()
    } else {
        std::iter::once(VariantGroupSlot::Named("thumbnail".to_string()))
            .chain(
                all_indexes
                    .filter(|i| !color_indexes.contains(i))
                    .map(VariantGroupSlot::Index),
            )
            .collect()
    };

    Some(ExternalVariantGroup {
        id: record.id.to_string(),
        source: "integration".to_string(),
        attributes,
    })
}

// ============================================================================
// Tests
// ============================================================================
