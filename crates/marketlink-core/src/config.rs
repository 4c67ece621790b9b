//! Configuration module for Marketlink.
//!
//! Provides the typed settings object the engines receive at construction,
//! replacing scattered per-call configuration reads. Maps to a YAML file
//! with loading, validation, and defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::newtypes::OrderStateId;

// ---------------------------------------------------------------------------
// Settings struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Marketlink.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSettings {
    pub api: ApiSettings,
    pub products: ProductSettings,
    pub orders: OrderSettings,
}

/// Marketplace API access settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Bearer key issued by the marketplace.
    pub api_key: String,
    /// Talk to the marketplace sandbox instead of production.
    pub sandbox: bool,
}

/// Outbound product synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSettings {
    /// Prefix of derived external ids (`<prefix>-<product>[-<variant>]`).
    pub external_id_prefix: String,
    /// Dispatch lead time sent with every listing, in days.
    pub dispatch_days: u32,
    /// Rows fetched per page during batch runs.
    pub batch_size: u32,
    /// Shipping tags for the default carrier, used when the catalog
    /// provides none for a product.
    pub default_shipping_tags: Vec<String>,
}

/// Inbound order ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSettings {
    /// Local state for orders the marketplace reports as paid.
    pub paid_state: OrderStateId,
    /// Local state for orders awaiting payment.
    pub pending_state: OrderStateId,
    /// Local state for cancelled orders.
    pub cancelled_state: OrderStateId,
    /// Local state for unrecognized marketplace statuses.
    pub default_state: OrderStateId,
    /// ISO country code used when an address carries no resolvable country.
    pub default_country: String,
    /// Domain of synthesized buyer emails when the order carries none.
    pub placeholder_email_domain: String,
    /// Payment method label recorded on created orders.
    pub payment_method: String,
    /// Events requested per inbox page (the marketplace caps this at 100).
    pub inbox_limit: u32,
    /// Upper bound on pages consumed per `process_inbox` run.
    pub max_batches: u32,
}

impl OrderSettings {
    /// Maps a marketplace status string to the configured local state.
    ///
    /// The table mirrors the statuses the marketplace is known to emit;
    /// anything unrecognized lands on the configured default state.
    #[must_use]
    pub fn target_state(&self, status: &str) -> OrderStateId {
        match status.trim().to_lowercase().as_str() {
            "purchased" | "paid" | "completed" => self.paid_state,
            "pending" | "new" | "awaiting_payment" => self.pending_state,
            "cancelled" | "canceled" => self.cancelled_state,
            _ => self.default_state,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl SyncSettings {
    /// Load settings from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: SyncSettings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    /// Try to load from `path`; fall back to [`SyncSettings::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/marketlink/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("marketlink")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for ProductSettings {
    fn default() -> Self {
        Self {
            external_id_prefix: "ps".to_string(),
            dispatch_days: 1,
            batch_size: 20,
            default_shipping_tags: Vec::new(),
        }
    }
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self {
            // order states are commerce-system row ids and have no
            // universal default; 0 fails validation until configured
            paid_state: OrderStateId::new(0),
            pending_state: OrderStateId::new(0),
            cancelled_state: OrderStateId::new(0),
            default_state: OrderStateId::new(0),
            default_country: "PL".to_string(),
            placeholder_email_domain: "orders.invalid".to_string(),
            payment_method: "Marketplace payment".to_string(),
            inbox_limit: 100,
            max_batches: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"products.batch_size"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl SyncSettings {
    /// Validate the settings and return all errors found.
    ///
    /// An empty vector means the settings are usable.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.api.api_key.trim().is_empty() {
            errors.push(ValidationError {
                field: "api.api_key".into(),
                message: "API key must not be empty".into(),
            });
        }

        if self.products.external_id_prefix.trim().is_empty() {
            errors.push(ValidationError {
                field: "products.external_id_prefix".into(),
                message: "external id prefix must not be empty".into(),
            });
        }

        if self.products.dispatch_days == 0 {
            errors.push(ValidationError {
                field: "products.dispatch_days".into(),
                message: "dispatch lead time must be at least 1 day".into(),
            });
        }

        if self.products.batch_size == 0 {
            errors.push(ValidationError {
                field: "products.batch_size".into(),
                message: "batch size must be at least 1".into(),
            });
        }

        if self.orders.inbox_limit == 0 || self.orders.inbox_limit > 100 {
            errors.push(ValidationError {
                field: "orders.inbox_limit".into(),
                message: "inbox limit must be between 1 and 100".into(),
            });
        }

        if self.orders.max_batches == 0 {
            errors.push(ValidationError {
                field: "orders.max_batches".into(),
                message: "max batches must be at least 1".into(),
            });
        }

        for (field, state) in [
            ("orders.paid_state", self.orders.paid_state),
            ("orders.pending_state", self.orders.pending_state),
            ("orders.cancelled_state", self.orders.cancelled_state),
            ("orders.default_state", self.orders.default_state),
        ] {
            if state.get() <= 0 {
                errors.push(ValidationError {
                    field: field.into(),
                    message: "order state must be a configured commerce state id".into(),
                });
            }
        }

        if self.orders.default_country.trim().is_empty() {
            errors.push(ValidationError {
                field: "orders.default_country".into(),
                message: "default country must not be empty".into(),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
