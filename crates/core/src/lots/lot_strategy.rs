use std::cmp::Ordering;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::PRICE_SCALE;
use crate::ledger::{EntryId, Ledger};

/// Order in which candidate purchases are consumed by a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LotAllocationStrategy {
    #[default]
    FirstIn,
    LastIn,
    LowestPrice,
    HighestPrice,
}

impl LotAllocationStrategy {
    /// Sorts `candidates` in allocation order. Ties fall back to purchase date
    /// and then entry id. Purchases without a known price sort last.
    pub fn sort(&self, ledger: &Ledger, candidates: &mut [EntryId]) {
        let dated = |id: EntryId| -> (Option<NaiveDate>, EntryId) {
            (ledger.entry_transaction(id).map(|tx| tx.date), id)
        };
        let by_price = |a: &EntryId, b: &EntryId, descending: bool| -> Ordering {
            match (unit_price(ledger, *a), unit_price(ledger, *b)) {
                (Some(x), Some(y)) if descending => y.cmp(&x),
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
            .then_with(|| dated(*a).cmp(&dated(*b)))
        };
        match self {
            LotAllocationStrategy::FirstIn => candidates.sort_by_key(|id| dated(*id)),
            LotAllocationStrategy::LastIn => {
                candidates.sort_by(|a, b| dated(*b).cmp(&dated(*a)))
            }
            LotAllocationStrategy::LowestPrice => candidates.sort_by(|a, b| by_price(a, b, false)),
            LotAllocationStrategy::HighestPrice => candidates.sort_by(|a, b| by_price(a, b, true)),
        }
    }
}

/// Cost per share of a purchase entry as of its own date.
///
/// Uses the entry amount when it has one, otherwise the expenses of the whole
/// transaction.
pub fn unit_price(ledger: &Ledger, purchase: EntryId) -> Option<Decimal> {
    let entry = ledger.entry(purchase)?;
    let shares = entry.asset_quantity.filter(|shares| !shares.is_zero())?;
    let cost = match entry.amount {
        Some(amount) if !amount.is_zero() => amount.abs(),
        _ => ledger
            .entry_transaction(purchase)
            .map(|tx| ledger.transaction_expense_amount(tx).abs())?,
    };
    Some((cost / shares.abs()).round_dp(PRICE_SCALE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::AccountId;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn purchases() -> (Ledger, Vec<EntryId>) {
        let mut ledger = Ledger::default();
        let security = ledger.add_security("ACME");
        let mut ids = Vec::new();
        for (day, cost, shares) in [(3, dec!(-30), dec!(1)), (1, dec!(-50), dec!(1)), (2, dec!(-10), dec!(1))] {
            let tx = ledger.add_transaction(AccountId(1), date(2024, 1, day), Some(security));
            ids.push(ledger.add_entry(tx, Some(cost), Some(shares), None).unwrap());
        }
        (ledger, ids)
    }

    #[test]
    fn test_first_in_and_last_in() {
        let (ledger, ids) = purchases();
        let mut candidates = ids.clone();
        LotAllocationStrategy::FirstIn.sort(&ledger, &mut candidates);
        assert_eq!(candidates, vec![ids[1], ids[2], ids[0]]);
        LotAllocationStrategy::LastIn.sort(&ledger, &mut candidates);
        assert_eq!(candidates, vec![ids[0], ids[2], ids[1]]);
    }

    #[test]
    fn test_price_orderings() {
        let (ledger, ids) = purchases();
        let mut candidates = ids.clone();
        LotAllocationStrategy::LowestPrice.sort(&ledger, &mut candidates);
        assert_eq!(candidates, vec![ids[2], ids[0], ids[1]]);
        LotAllocationStrategy::HighestPrice.sort(&ledger, &mut candidates);
        assert_eq!(candidates, vec![ids[1], ids[0], ids[2]]);
    }

    #[test]
    fn test_unit_price_falls_back_to_transaction_expenses() {
        let mut ledger = Ledger::default();
        let tx = ledger.add_transaction(AccountId(1), date(2024, 1, 1), None);
        let purchase = ledger.add_entry(tx, None, Some(dec!(4)), None).unwrap();
        ledger.add_entry(tx, Some(dec!(-100)), None, None).unwrap();
        assert_eq!(unit_price(&ledger, purchase), Some(dec!(25)));
    }

    #[test]
    fn test_strategy_serialization() {
        assert_eq!(
            serde_json::to_string(&LotAllocationStrategy::HighestPrice).unwrap(),
            "\"highestPrice\""
        );
    }
}
