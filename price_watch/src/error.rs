//! Error types for price_watch
//!
//! The first group of variants is the run taxonomy: only `Authentication` is
//! fatal on its own; page, item and persistence failures are absorbed by the
//! component that hits them. The rest wrap transport and serialization errors.

use thiserror::Error;

/// Unified error type for price_watch operations
#[derive(Debug, Error)]
pub enum WatchError {
    /// Login to the reseller area failed; the run cannot obtain reseller prices
    #[error("Authentication failed: {0}")]
    Authentication(String),
    /// A listing page did not yield any items (timeout, bad status, empty page)
    #[error("Page {page} has no listing items: {detail}")]
    PageExtractionTimeout { page: usize, detail: String },
    /// A product detail page could not be read
    #[error("Detail page failed: {0}")]
    ItemDetail(String),
    /// The previous snapshot could not be read
    #[error("Could not read previous snapshot: {0}")]
    PersistenceRead(String),
    /// A notification channel could not deliver
    #[error("Delivery failed: {0}")]
    Delivery(String),
    /// A report renderer failed
    #[error("Report error: {0}")]
    Report(String),
    /// Invalid configuration (bad URL, missing credentials, ...)
    #[error("Configuration error: {0}")]
    Config(String),
    /// HTTP request failed (network error, timeout, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP error status code
    #[error("HTTP error: {0}")]
    HttpStatus(reqwest::StatusCode),
    /// Failed to (de)serialize JSON
    #[error("Parse error: {0}")]
    Json(#[from] serde_json::Error),
    /// Failed to write CSV
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for price_watch operations
pub type Result<T> = std::result::Result<T, WatchError>;
