use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::EntryId;

/// Identity of a lot: the (purchase, sale) pair it links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotKey {
    pub purchase: EntryId,
    pub sale: EntryId,
}

impl LotKey {
    pub fn new(purchase: EntryId, sale: EntryId) -> Self {
        LotKey { purchase, sale }
    }
}

impl fmt::Display for LotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.purchase, self.sale)
    }
}

/// Shares of one purchase consumed by one sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lot {
    pub purchase: EntryId,
    pub sale: EntryId,
    /// Shares as of the purchase date, not adjusted for splits.
    pub purchase_shares: Decimal,
    /// The same shares as of the sale date, adjusted for splits.
    pub adjusted_shares: Decimal,
}

impl Lot {
    pub fn new(purchase: EntryId, sale: EntryId) -> Self {
        Lot {
            purchase,
            sale,
            purchase_shares: Decimal::ZERO,
            adjusted_shares: Decimal::ZERO,
        }
    }

    pub fn key(&self) -> LotKey {
        LotKey::new(self.purchase, self.sale)
    }

    /// True if the lot holds no shares.
    pub fn is_empty(&self) -> bool {
        self.adjusted_shares.is_zero()
    }
}

/// Outcome of matching one sale against its candidate purchases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LotAllocation {
    /// Lots created by this allocation.
    pub created: Vec<LotKey>,
    /// Pre-existing lots that received more shares.
    pub updated: Vec<LotKey>,
    /// Sale shares (in sale-date terms) no candidate could cover.
    pub unallocated: Decimal,
}

impl LotAllocation {
    pub fn is_complete(&self) -> bool {
        self.unallocated.is_zero()
    }
}
