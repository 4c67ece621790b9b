//! Port definitions (hexagonal architecture)
//!
//! Traits the adapter crates implement: the marketplace API transport, the
//! link store, the catalog and commerce primitives of the host system, and
//! the sync journal. Engines depend only on these traits.

pub mod catalog;
pub mod commerce;
pub mod event_log;
pub mod link_store;
pub mod marketplace;

pub use catalog::{
    AttributeGroup, CategoryMapping, ICatalog, ProductImage, ProductRecord, VariantRecord,
};
pub use commerce::{ICommerce, NewAddress, OrderTotals};
pub use event_log::{IEventLog, SyncLogEntry};
pub use link_store::{ILinkStore, LinkSelection};
pub use marketplace::{ApiResponse, Decoded, IMarketplaceApi};
