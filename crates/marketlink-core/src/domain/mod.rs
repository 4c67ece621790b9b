//! Domain model for marketplace synchronization
//!
//! Entities and value types shared by the engines, the link store, and the
//! API adapter: identifier newtypes, link records, inbox events, and the
//! typed order-document view.

pub mod errors;
pub mod event;
pub mod link;
pub mod newtypes;
pub mod order_doc;

pub use errors::DomainError;
pub use event::{AckTracker, EventKind, InboxEvent};
pub use link::{derive_external_id, parse_external_ref, OrderLink, ProductLink};
pub use newtypes::{
    AddressId, CartId, CountryId, CustomerId, ExternalId, LinkId, MarketOrderId, OrderId,
    OrderStateId, ProductId, VariantId,
};
pub use order_doc::{AddressView, ItemView, OrderDocument};
