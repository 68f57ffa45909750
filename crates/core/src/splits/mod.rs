//! Stock splits - split ratios and the per-security split ledger.

mod split_ledger;
mod split_model;

pub use split_ledger::SplitLedger;
pub use split_model::*;
