//! Tax lots: which purchased shares back which sale.
//!
//! [`TaxLotMatcher`] allocates a sale's shares to purchase entries, adjusting
//! for every stock split between the purchase and sale dates.

mod lot_matcher;
mod lot_strategy;
mod lots_model;

#[cfg(test)]
mod lot_matcher_tests;

pub use lot_matcher::{is_missing_lots, remaining_shares_for_account, TaxLotMatcher};
pub use lot_strategy::{unit_price, LotAllocationStrategy};
pub use lots_model::*;
