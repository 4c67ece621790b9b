//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including identifier validation failures and malformed wire data.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid external (marketplace-side) identifier
    #[error("Invalid external id: {0}")]
    InvalidExternalId(String),

    /// Invalid marketplace order identifier
    #[error("Invalid marketplace order id: {0}")]
    InvalidOrderId(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Inbound document is missing a required field
    #[error("Missing field in marketplace payload: {0}")]
    MissingField(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
