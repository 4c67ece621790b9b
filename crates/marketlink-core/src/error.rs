//! Synchronization error taxonomy
//!
//! Every failure mode the engines distinguish maps to one variant here.
//! The variants drive control flow: the product engine catches
//! `RateLimited` for a clean resumable stop and propagates everything
//! else; the order engine catches any error at the per-event layer.

use thiserror::Error;

/// Classified synchronization failure
#[derive(Debug, Error)]
pub enum SyncError {
    /// No HTTP status was obtained at all; fatal to the call
    #[error("transport failure: {0}")]
    Transport(String),

    /// HTTP 429; bounded retry, then fatal to the run
    #[error("rate limited by the marketplace: {context}")]
    RateLimited {
        /// What was being attempted when the limit hit
        context: String,
    },

    /// HTTP 404; meaningful only for product update (create fallback),
    /// a normal failure everywhere else
    #[error("not found on the marketplace: {context}")]
    NotFound {
        /// What was being looked up
        context: String,
    },

    /// Any other non-2xx status; carries the raw response body
    #[error("marketplace API error: HTTP {status}: {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Raw response body text
        body: String,
    },

    /// A payload precondition was violated (e.g. no resolvable image);
    /// fatal to that item only
    #[error("payload mapping failed: {0}")]
    Mapping(String),

    /// A state adapter call failed (link store, catalog, or commerce
    /// primitives); logged, best-effort continuation where feasible
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl SyncError {
    /// Builds the variant for a non-success HTTP status
    #[must_use]
    pub fn from_status(status: u16, raw_body: &str, context: &str) -> Self {
        match status {
            429 => Self::RateLimited {
                context: context.to_string(),
            },
            404 => Self::NotFound {
                context: context.to_string(),
            },
            _ => Self::Api {
                status,
                body: raw_body.to_string(),
            },
        }
    }

    /// Returns true for the rate-limit variant
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Returns true for the not-found variant
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<anyhow::Error> for SyncError {
    /// Port methods return `anyhow::Result`; at the engine boundary an
    /// adapter failure without a status code is a transport failure for
    /// API ports and a persistence failure for stores. Engines that know
    /// the source map explicitly; this blanket impl covers `?` on
    /// transport calls.
    fn from(err: anyhow::Error) -> Self {
        Self::Transport(format!("{err:#}"))
    }
}
