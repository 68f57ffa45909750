//! Ledgerflow Core - incremental change aggregation and tax-lot matching.
//!
//! Edits to an in-memory [`ledger::Ledger`] are made through a
//! [`changes::UnitOfWork`], which reports them to change recorders that
//! derive net change sets and per-account balance and share summaries.
//! The [`lots`] module allocates sales to purchases across stock splits.

pub mod changes;
pub mod constants;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod lots;
pub mod settings;
pub mod splits;

// Re-export the session entry points
pub use changes::{ChangeRecorder, CompositeRecorder, UnitOfWork};
pub use ledger::Ledger;
pub use settings::EngineSettings;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
