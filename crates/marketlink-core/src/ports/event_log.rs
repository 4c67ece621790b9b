//! Sync journal port (driven/secondary port)
//!
//! Durable record of sync activity. Every failure (and the successes worth
//! auditing) is journaled with a category, the id of the entity involved,
//! a message, and optionally the raw payload that triggered it. Journal
//! writes are best-effort from the engines' point of view: a failed append
//! must never take down a sync run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One journal entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    /// Journal row id
    pub id: i64,
    /// Short machine-readable category, e.g. `order_skipped_existing`
    pub category: String,
    /// Id of the entity involved (external id, order id, link id), or empty
    pub reference: String,
    /// Human-readable message
    pub message: String,
    /// Raw payload associated with the entry, when useful for diagnosis
    pub payload: Option<String>,
    /// When the entry was recorded
    pub created_at: DateTime<Utc>,
}

/// Port trait for the sync journal
#[async_trait::async_trait]
pub trait IEventLog: Send + Sync {
    /// Appends one entry
    async fn append(
        &self,
        category: &str,
        reference: &str,
        message: &str,
        payload: Option<&str>,
    ) -> anyhow::Result<()>;

    /// Returns the most recent entries, newest first
    async fn recent(&self, limit: u32) -> anyhow::Result<Vec<SyncLogEntry>>;
}
