//! Marketlink API - Marketplace REST client
//!
//! Authenticated transport to the marketplace shop API. Implements the
//! `IMarketplaceApi` port from `marketlink-core`:
//!
//! - [`client::ApiClient`] - bearer-authenticated HTTP with production /
//!   sandbox base-URL selection and uniform `{status, decoded body, raw}`
//!   responses
//! - [`provider::MarketplaceClient`] - the endpoint surface the engines
//!   consume (inbox, orders, products)
//!
//! Status-code interpretation (2xx / 404 / 429 / other) is the engines'
//! concern; this crate only guarantees that every obtained response is
//! reported faithfully and that transport failures are distinguishable
//! from HTTP-level failures.

pub mod client;
pub mod provider;

pub use client::ApiClient;
pub use provider::MarketplaceClient;
