//! Marketlink Store - Link persistence
//!
//! SQLite-based storage for:
//! - Product links (internal↔external identity + last-sync state)
//! - Order links (the dedup gate for inbound order creation)
//! - The resumable batch cursor
//! - The sync journal
//!
//! ## Architecture
//!
//! This crate implements the `ILinkStore` and `IEventLog` ports from
//! `marketlink-core` using SQLite as the storage backend. It is a driven
//! (secondary) adapter in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteLinkStore`] - Full `ILinkStore` + `IEventLog` implementation
//! - [`StoreError`] - Error types for store operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use marketlink_store::{DatabasePool, SqliteLinkStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/var/lib/marketlink/links.db")).await?;
//! let store = SqliteLinkStore::new(pool.pool().clone());
//! // Use store as ILinkStore / IEventLog...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteLinkStore;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Serialization or deserialization of domain types failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}
