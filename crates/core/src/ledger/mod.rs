//! Ledger module - transactions, ledger entries and the in-memory store that
//! keeps transfer legs, dates, securities and remaining-share caches consistent.

mod ledger_model;
mod ledger_store;

#[cfg(test)]
mod ledger_store_tests;

pub use ledger_model::*;
pub use ledger_store::Ledger;
