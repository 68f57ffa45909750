//! Tests for the in-memory ledger store.

#[cfg(test)]
mod tests {
    use crate::errors::{Error, LedgerError};
    use crate::ledger::{AccountId, Ledger, SecurityAction, SecurityId, TransactionId};
    use crate::settings::EngineSettings;
    use crate::splits::SplitRatio;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const CHECKING: AccountId = AccountId(1001);
    const SAVINGS: AccountId = AccountId(1002);

    // ==================== Transactions and Entries ====================

    #[test]
    fn test_add_entry_attaches_to_transaction() {
        let mut ledger = Ledger::default();
        let tx = ledger.add_transaction(CHECKING, date(2024, 1, 2), None);
        let first = ledger.add_entry(tx, Some(dec!(10)), None, None).unwrap();
        let second = ledger.add_entry(tx, Some(dec!(1)), None, None).unwrap();

        let transaction = ledger.transaction(tx).unwrap();
        assert_eq!(transaction.details(), &[first, second]);
        assert_eq!(ledger.transaction_amount(transaction), dec!(11));
        assert_eq!(ledger.entry(first).unwrap().transaction, Some(tx));
    }

    #[test]
    fn test_add_entry_to_unknown_transaction_fails() {
        let mut ledger = Ledger::default();
        let result = ledger.add_entry(TransactionId(999), Some(dec!(1)), None, None);
        assert!(matches!(
            result,
            Err(Error::Ledger(LedgerError::TransactionNotFound(_)))
        ));
    }

    #[test]
    fn test_amount_skips_categories_that_do_not_affect_balance() {
        let mut ledger = Ledger::default();
        let memo_only = ledger.add_category("memo", false, None);
        let groceries = ledger.add_category("groceries", true, None);
        let tx = ledger.add_transaction(CHECKING, date(2024, 1, 2), None);
        ledger.add_entry(tx, Some(dec!(-40)), None, Some(groceries)).unwrap();
        ledger.add_entry(tx, Some(dec!(-5)), None, Some(memo_only)).unwrap();
        ledger.add_entry(tx, Some(dec!(2)), None, None).unwrap();

        let transaction = ledger.transaction(tx).unwrap();
        assert_eq!(ledger.transaction_amount(transaction), dec!(-38));
        assert_eq!(ledger.transaction_expense_amount(transaction), dec!(-45));
    }

    #[test]
    fn test_transfer_legs_stay_negated() {
        let mut ledger = Ledger::default();
        let tx = ledger.add_transaction(CHECKING, date(2024, 3, 1), None);
        let (leg, other) = ledger
            .add_transfer(tx, SAVINGS, Some(dec!(-250)), None)
            .unwrap();

        let other_tx = ledger.entry_transaction(other).unwrap();
        assert_eq!(other_tx.account, SAVINGS);
        assert_eq!(other_tx.date, date(2024, 3, 1));
        assert_eq!(ledger.entry(other).unwrap().amount, Some(dec!(250)));
        assert_eq!(ledger.entry(other).unwrap().related, Some(leg));

        let previous = ledger.set_entry_amount(leg, Some(dec!(-300))).unwrap();
        assert_eq!(previous, Some(dec!(-250)));
        assert_eq!(ledger.entry(other).unwrap().amount, Some(dec!(300)));
    }

    #[test]
    fn test_date_change_follows_transfer() {
        let mut ledger = Ledger::default();
        let tx = ledger.add_transaction(CHECKING, date(2024, 3, 1), None);
        let (_, other) = ledger.add_transfer(tx, SAVINGS, Some(dec!(5)), None).unwrap();
        let other_tx = ledger.entry(other).unwrap().transaction.unwrap();

        let changed = ledger.set_transaction_date(tx, date(2024, 3, 5)).unwrap();
        assert_eq!(
            changed,
            vec![(tx, date(2024, 3, 1)), (other_tx, date(2024, 3, 1))]
        );
        assert_eq!(ledger.transaction(other_tx).unwrap().date, date(2024, 3, 5));
    }

    #[test]
    fn test_security_change_follows_share_transfers_only() {
        let mut ledger = Ledger::default();
        let old = ledger.add_security("OLD");
        let new = ledger.add_security("NEW");
        let tx = ledger.add_transaction(CHECKING, date(2024, 3, 1), Some(old));
        let (_, share_leg) = ledger
            .add_transfer(tx, SAVINGS, None, Some(dec!(-10)))
            .unwrap();
        let (_, cash_leg) = ledger.add_transfer(tx, SAVINGS, Some(dec!(5)), None).unwrap();
        let share_tx = ledger.entry(share_leg).unwrap().transaction.unwrap();
        let cash_tx = ledger.entry(cash_leg).unwrap().transaction.unwrap();
        assert_eq!(ledger.transaction(share_tx).unwrap().security, Some(old));
        assert_eq!(ledger.transaction(cash_tx).unwrap().security, None);

        let changed = ledger.set_transaction_security(tx, Some(new)).unwrap();
        assert_eq!(changed, vec![(tx, Some(old)), (share_tx, Some(old))]);
        assert_eq!(ledger.transaction(cash_tx).unwrap().security, None);
    }

    #[test]
    fn test_share_quantities_are_rounded_to_security_scale() {
        let mut ledger = Ledger::default();
        let security = ledger.add_security("ACME");
        let tx = ledger.add_transaction(CHECKING, date(2024, 1, 1), Some(security));
        let entry = ledger.add_entry(tx, None, Some(dec!(1.0000004)), None).unwrap();
        assert_eq!(ledger.entry(entry).unwrap().asset_quantity, Some(dec!(1)));

        ledger.set_entry_asset_quantity(entry, Some(dec!(2.5000006))).unwrap();
        assert_eq!(ledger.entry(entry).unwrap().asset_quantity, Some(dec!(2.500001)));

        let (leg, other) = ledger
            .add_transfer(tx, SAVINGS, None, Some(dec!(-0.1234567)))
            .unwrap();
        assert_eq!(ledger.entry(leg).unwrap().asset_quantity, Some(dec!(-0.123457)));
        assert_eq!(ledger.entry(other).unwrap().asset_quantity, Some(dec!(0.123457)));
    }

    #[test]
    fn test_remove_entry_detaches_everything() {
        let mut ledger = Ledger::default();
        let tx = ledger.add_transaction(CHECKING, date(2024, 3, 1), None);
        let (leg, other) = ledger.add_transfer(tx, SAVINGS, Some(dec!(5)), None).unwrap();

        let removed = ledger.remove_entry(leg).unwrap();
        assert_eq!(removed.transaction, None);
        assert!(ledger.transaction(tx).unwrap().details().is_empty());
        assert_eq!(ledger.entry(other).unwrap().related, None);
        assert!(ledger.entry(leg).is_none());
    }

    #[test]
    fn test_remove_transaction_removes_entries() {
        let mut ledger = Ledger::default();
        let tx = ledger.add_transaction(CHECKING, date(2024, 3, 1), None);
        let entry = ledger.add_entry(tx, Some(dec!(3)), None, None).unwrap();

        let removed = ledger.remove_transaction(tx).unwrap();
        assert_eq!(removed.id, tx);
        assert!(ledger.entry(entry).is_none());
        assert!(ledger.transaction(tx).is_none());
    }

    // ==================== Lots and Remaining Shares ====================

    #[test]
    fn test_remaining_shares_tracks_lots() {
        let mut ledger = Ledger::default();
        let security = ledger.add_security("ACME");
        let buy = ledger.add_transaction(CHECKING, date(2024, 1, 1), Some(security));
        let purchase = ledger.add_entry(buy, None, Some(dec!(10)), None).unwrap();
        let sell = ledger.add_transaction(CHECKING, date(2024, 2, 1), Some(security));
        let sale = ledger.add_entry(sell, None, Some(dec!(-4)), None).unwrap();

        assert_eq!(ledger.remaining_shares(purchase), dec!(10));
        let key = ledger.insert_lot(purchase, sale).unwrap();
        ledger.set_lot_adjusted_shares(key, dec!(4)).unwrap();
        assert_eq!(ledger.remaining_shares(purchase), dec!(6));

        ledger.remove_lot(key).unwrap();
        assert_eq!(ledger.remaining_shares(purchase), dec!(10));
    }

    #[test]
    fn test_lot_purchase_shares_revert_splits() {
        let mut ledger = Ledger::default();
        let security = ledger.add_security("ACME");
        ledger
            .add_split(security, date(2024, 1, 15), SplitRatio::new(2, 1).unwrap())
            .unwrap();
        let buy = ledger.add_transaction(CHECKING, date(2024, 1, 1), Some(security));
        let purchase = ledger.add_entry(buy, None, Some(dec!(10)), None).unwrap();
        let sell = ledger.add_transaction(CHECKING, date(2024, 2, 1), Some(security));
        let sale = ledger.add_entry(sell, None, Some(dec!(-8)), None).unwrap();

        let key = ledger.insert_lot(purchase, sale).unwrap();
        ledger.set_lot_adjusted_shares(key, dec!(8)).unwrap();
        let lot = ledger.lot(key).unwrap();
        assert_eq!(lot.adjusted_shares, dec!(8));
        assert_eq!(lot.purchase_shares, dec!(4));
        assert_eq!(ledger.remaining_shares(purchase), dec!(6));
    }

    #[test]
    fn test_lots_follow_splits_and_dates_that_move_under_them() {
        let mut ledger = Ledger::default();
        let security = ledger.add_security("ACME");
        let buy = ledger.add_transaction(CHECKING, date(2024, 1, 1), Some(security));
        let purchase = ledger.add_entry(buy, None, Some(dec!(10)), None).unwrap();
        let sell = ledger.add_transaction(CHECKING, date(2024, 3, 1), Some(security));
        let sale = ledger.add_entry(sell, None, Some(dec!(-8)), None).unwrap();
        let key = ledger.insert_lot(purchase, sale).unwrap();
        ledger.set_lot_adjusted_shares(key, dec!(8)).unwrap();
        assert_eq!(ledger.remaining_shares(purchase), dec!(2));

        ledger
            .add_split(security, date(2024, 2, 1), SplitRatio::new(2, 1).unwrap())
            .unwrap();
        let lot = ledger.lot(key).unwrap();
        assert_eq!(lot.adjusted_shares, dec!(8));
        assert_eq!(lot.purchase_shares, dec!(4));
        assert_eq!(ledger.remaining_shares(purchase), dec!(6));

        ledger.set_transaction_date(buy, date(2024, 2, 15)).unwrap();
        assert_eq!(ledger.lot(key).unwrap().purchase_shares, dec!(8));
        assert_eq!(ledger.remaining_shares(purchase), dec!(2));

        ledger.set_transaction_date(buy, date(2024, 1, 1)).unwrap();
        ledger.remove_split(security, date(2024, 2, 1)).unwrap();
        assert_eq!(ledger.lot(key).unwrap().purchase_shares, dec!(8));
        assert_eq!(ledger.remaining_shares(purchase), dec!(2));
    }

    #[test]
    fn test_duplicate_lot_is_rejected() {
        let mut ledger = Ledger::default();
        let tx = ledger.add_transaction(CHECKING, date(2024, 1, 1), None);
        let purchase = ledger.add_entry(tx, None, Some(dec!(1)), None).unwrap();
        let sale = ledger.add_entry(tx, None, Some(dec!(-1)), None).unwrap();
        let key = ledger.insert_lot(purchase, sale).unwrap();
        assert!(matches!(
            ledger.insert_lot(purchase, sale),
            Err(Error::Ledger(LedgerError::DuplicateLot(k))) if k == key
        ));
    }

    #[test]
    fn test_removing_entry_drops_its_lots() {
        let mut ledger = Ledger::default();
        let tx = ledger.add_transaction(CHECKING, date(2024, 1, 1), None);
        let purchase = ledger.add_entry(tx, None, Some(dec!(5)), None).unwrap();
        let sale = ledger.add_entry(tx, None, Some(dec!(-5)), None).unwrap();
        let key = ledger.insert_lot(purchase, sale).unwrap();
        ledger.set_lot_adjusted_shares(key, dec!(5)).unwrap();
        assert_eq!(ledger.remaining_shares(purchase), dec!(0));

        ledger.remove_entry(sale).unwrap();
        assert!(ledger.lot(key).is_none());
        assert_eq!(ledger.remaining_shares(purchase), dec!(5));
    }

    #[test]
    fn test_unsold_purchases_filters_and_orders() {
        let mut ledger = Ledger::new(EngineSettings::default());
        let security = ledger.add_security("ACME");
        let buy = ledger.add_category("buy", true, Some(SecurityAction::Buy));
        let dividend = ledger.add_category("div", true, Some(SecurityAction::Dividend));

        let late = ledger.add_transaction(CHECKING, date(2024, 2, 1), Some(security));
        let late_buy = ledger.add_entry(late, None, Some(dec!(3)), Some(buy)).unwrap();
        let early = ledger.add_transaction(CHECKING, date(2024, 1, 1), Some(security));
        let early_buy = ledger.add_entry(early, None, Some(dec!(2)), Some(buy)).unwrap();
        ledger.add_entry(early, None, Some(dec!(1)), Some(dividend)).unwrap();
        let future = ledger.add_transaction(CHECKING, date(2024, 6, 1), Some(security));
        ledger.add_entry(future, None, Some(dec!(1)), Some(buy)).unwrap();
        let other_account = ledger.add_transaction(SAVINGS, date(2024, 1, 1), Some(security));
        ledger.add_entry(other_account, None, Some(dec!(1)), Some(buy)).unwrap();

        assert_eq!(
            ledger.unsold_purchases(CHECKING, security, date(2024, 3, 1)),
            vec![early_buy, late_buy]
        );
    }

    #[test]
    fn test_add_split_to_unknown_security_fails() {
        let mut ledger = Ledger::default();
        let result = ledger.add_split(SecurityId(77), date(2024, 1, 1), SplitRatio::identity());
        assert!(matches!(
            result,
            Err(Error::Ledger(LedgerError::SecurityNotFound(_)))
        ));
    }
}
