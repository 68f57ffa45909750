//! Date-ordered split history of one security.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::{SplitBoundary, SplitRatio, StockSplit};
use crate::constants::ADJUSTED_SHARE_SCALE;
use crate::errors::SplitError;
use crate::ledger::SecurityId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitLedger {
    security_id: SecurityId,
    /// Sorted by date, at most one split per date.
    splits: Vec<StockSplit>,
}

impl SplitLedger {
    pub fn new(security_id: SecurityId) -> Self {
        SplitLedger {
            security_id,
            splits: Vec::new(),
        }
    }

    pub fn security_id(&self) -> SecurityId {
        self.security_id
    }

    pub fn splits(&self) -> &[StockSplit] {
        &self.splits
    }

    pub fn split_on(&self, date: NaiveDate) -> Option<&StockSplit> {
        self.splits
            .binary_search_by_key(&date, |split| split.date)
            .ok()
            .map(|index| &self.splits[index])
    }

    /// Records a split, keeping the history in date order.
    pub fn insert(&mut self, date: NaiveDate, ratio: SplitRatio) -> Result<&StockSplit, SplitError> {
        match self.splits.binary_search_by_key(&date, |split| split.date) {
            Ok(_) => Err(SplitError::DuplicateDate {
                security_id: self.security_id,
                date,
            }),
            Err(index) => {
                self.splits.insert(index, StockSplit { date, ratio });
                Ok(&self.splits[index])
            }
        }
    }

    pub fn remove(&mut self, date: NaiveDate) -> Option<StockSplit> {
        let index = self
            .splits
            .binary_search_by_key(&date, |split| split.date)
            .ok()?;
        Some(self.splits.remove(index))
    }

    /// Compounded ratio of every split in the interval. An empty interval
    /// (`to` before `from`) is the identity.
    pub fn ratio_between(
        &self,
        from: NaiveDate,
        to: Option<NaiveDate>,
        boundary: SplitBoundary,
    ) -> SplitRatio {
        self.splits
            .iter()
            .filter(|split| boundary.contains(split.date, from, to))
            .fold(SplitRatio::identity(), |ratio, split| {
                ratio.compound(&split.ratio)
            })
    }

    /// Expresses `shares` held on `from` in terms of shares on `to`.
    ///
    /// The result keeps `ADJUSTED_SHARE_SCALE` places so that
    /// [`SplitLedger::revert_split`] recovers the original quantity.
    pub fn apply_split(
        &self,
        shares: Decimal,
        from: NaiveDate,
        to: Option<NaiveDate>,
        boundary: SplitBoundary,
    ) -> Decimal {
        self.convert(shares, from, to, boundary, |ratio, shares| {
            round(ratio.apply(shares), ADJUSTED_SHARE_SCALE, RoundingStrategy::MidpointNearestEven)
        })
    }

    /// Expresses `shares` held on `to` in terms of shares on `from`, rounded to
    /// `scale` places.
    pub fn revert_split(
        &self,
        shares: Decimal,
        from: NaiveDate,
        to: Option<NaiveDate>,
        boundary: SplitBoundary,
        scale: u32,
    ) -> Decimal {
        self.convert(shares, from, to, boundary, |ratio, shares| {
            round(ratio.revert(shares), scale, RoundingStrategy::MidpointNearestEven)
        })
    }

    /// Largest quantity held on `to` that `shares` held on `from` can back.
    /// Like [`SplitLedger::apply_split`] but never rounds up.
    pub fn covered_shares(
        &self,
        shares: Decimal,
        from: NaiveDate,
        to: Option<NaiveDate>,
        boundary: SplitBoundary,
    ) -> Decimal {
        self.convert(shares, from, to, boundary, |ratio, shares| {
            round(ratio.apply(shares), ADJUSTED_SHARE_SCALE, RoundingStrategy::ToNegativeInfinity)
        })
    }

    /// Smallest quantity at `scale` places held on `from` that backs `shares`
    /// held on `to`. Like [`SplitLedger::revert_split`] but never rounds down.
    pub fn covering_shares(
        &self,
        shares: Decimal,
        from: NaiveDate,
        to: Option<NaiveDate>,
        boundary: SplitBoundary,
        scale: u32,
    ) -> Decimal {
        self.convert(shares, from, to, boundary, |ratio, shares| {
            round(ratio.revert(shares), scale, RoundingStrategy::ToPositiveInfinity)
        })
    }

    fn convert(
        &self,
        shares: Decimal,
        from: NaiveDate,
        to: Option<NaiveDate>,
        boundary: SplitBoundary,
        op: impl FnOnce(&SplitRatio, Decimal) -> Decimal,
    ) -> Decimal {
        let ratio = self.ratio_between(from, to, boundary);
        if ratio.is_identity() {
            return shares;
        }
        op(&ratio, shares)
    }
}

fn round(shares: Decimal, scale: u32, strategy: RoundingStrategy) -> Decimal {
    shares.round_dp_with_strategy(scale, strategy).normalize()
}
