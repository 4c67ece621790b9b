//! Marketlink Sync - The two synchronization engines
//!
//! - [`product::ProductSyncEngine`] pushes catalog products outward:
//!   enumerate pending links, rebuild and diff payloads, update-or-create
//!   listings, persist results and the resumable cursor.
//! - [`order::OrderSyncEngine`] pulls marketplace orders inward: poll the
//!   event inbox, classify events, fetch order detail, materialize local
//!   orders through the commerce primitives, acknowledge processed events.
//!
//! ## Concurrency model
//!
//! Each run is one task awaiting one network call at a time; the engines
//! never issue concurrent requests. Suspension happens only at network
//! await points and at the explicit rate-limit backoff sleeps. There is no
//! cancellation primitive beyond dropping the future; `batch_size` and
//! `max_batches` are the only runtime bounds.
//!
//! The persisted cursor makes an aborted product run resumable: it is
//! written after every row, so on restart at most the rows beyond the last
//! persisted cursor are reprocessed (at-least-once, not exactly-once, per
//! row). Overlapping runs of the same engine are not mutually excluded —
//! the cursor and the link-existence checks are unlocked shared state.
//! Hash-skips make overlapping product runs harmless; order creation keeps
//! a narrow check-then-create window that is accepted and journaled when
//! it loses the race (the second writer hits the unique external-id
//! constraint).

pub mod materialize;
pub mod order;
pub mod product;
pub mod retry;

pub use materialize::OrderImporter;
pub use order::{InboxReport, OrderSyncEngine};
pub use product::{ProductRunReport, ProductSyncEngine};
