//! Marketlink Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain model** - links, inbox events, identifier newtypes, the typed
//!   order-document view
//! - **Error taxonomy** - [`error::SyncError`], the classification the
//!   engines' control flow runs on
//! - **Port definitions** - Traits for adapters: `IMarketplaceApi`,
//!   `ILinkStore`, `ICatalog`, `ICommerce`, `IEventLog`
//! - **Payload mapping** - pure catalog-snapshot → wire-payload conversion
//!   plus canonical JSON hashing for change detection
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O. Ports define
//! trait interfaces that adapter crates implement (`marketlink-api` for the
//! marketplace transport, `marketlink-store` for persistence, the host
//! commerce system for catalog/checkout). The engines in `marketlink-sync`
//! orchestrate everything through the ports.

pub mod canonical;
pub mod config;
pub mod domain;
pub mod error;
pub mod mapper;
pub mod ports;

pub use error::SyncError;
