//! Core error types for the ledger engine.
//!
//! Expected business conditions (incomplete lot coverage, unresolved entity
//! references during aggregation) are not errors. These types cover store
//! mutations addressed at unknown entities, invalid split data and settings
//! that fail to load.

use chrono::NaiveDate;
use thiserror::Error;

use crate::ledger::{CategoryId, EntryId, SecurityId, TransactionId};
use crate::lots::LotKey;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the ledger engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Ledger operation failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Stock split rejected: {0}")]
    Split(#[from] SplitError),

    #[error("Failed to load configuration: {0}")]
    ConfigIO(String),

    #[error("Invalid configuration value: {0}")]
    InvalidConfigValue(String),
}

/// Errors raised by the in-memory ledger store.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Transaction {0} not found")]
    TransactionNotFound(TransactionId),

    #[error("Ledger entry {0} not found")]
    EntryNotFound(EntryId),

    #[error("Security {0} not found")]
    SecurityNotFound(SecurityId),

    #[error("Category {0} not found")]
    CategoryNotFound(CategoryId),

    #[error("Lot {0} not found")]
    LotNotFound(LotKey),

    #[error("Lot {0} already exists")]
    DuplicateLot(LotKey),

    #[error("Ledger entry {0} has no transaction")]
    DetachedEntry(EntryId),

    #[error("Transaction {0} has no security")]
    MissingSecurity(TransactionId),
}

/// Errors raised while recording stock splits.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SplitError {
    #[error("Split ratio must be positive, got {shares_out} for {shares_in}")]
    NonPositiveRatio {
        shares_out: String,
        shares_in: String,
    },

    #[error("Security {security_id} already has a split on {date}")]
    DuplicateDate {
        security_id: SecurityId,
        date: NaiveDate,
    },
}

// === From implementations for common error types ===

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::ConfigIO(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidConfigValue(err.to_string())
    }
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}
