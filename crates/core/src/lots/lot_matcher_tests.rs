//! Tests for lot allocation and coverage checks.

#[cfg(test)]
mod tests {
    use crate::ledger::{AccountId, EntryId, Ledger, SecurityAction, SecurityId};
    use crate::lots::{is_missing_lots, LotAllocationStrategy, LotKey, TaxLotMatcher};
    use crate::splits::SplitRatio;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    const BROKERAGE: AccountId = AccountId(501);
    const IRA: AccountId = AccountId(502);

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (Ledger, SecurityId) {
        let mut ledger = Ledger::default();
        let security = ledger.add_security("ACME");
        (ledger, security)
    }

    fn book(
        ledger: &mut Ledger,
        account: AccountId,
        security: SecurityId,
        on: NaiveDate,
        shares: Decimal,
    ) -> EntryId {
        let tx = ledger.add_transaction(account, on, Some(security));
        ledger.add_entry(tx, None, Some(shares), None).unwrap()
    }

    fn adjusted(ledger: &Ledger, purchase: EntryId, sale: EntryId) -> Decimal {
        ledger
            .lot(LotKey::new(purchase, sale))
            .map_or(Decimal::ZERO, |lot| lot.adjusted_shares)
    }

    // ==================== Greedy Allocation ====================

    #[test]
    fn test_allocates_in_caller_order() {
        let (mut ledger, security) = setup();
        let p1 = book(&mut ledger, BROKERAGE, security, date(2024, 1, 1), dec!(10));
        let p2 = book(&mut ledger, BROKERAGE, security, date(2024, 1, 2), dec!(5));
        let sale = book(&mut ledger, BROKERAGE, security, date(2024, 2, 1), dec!(-12));

        let allocation = TaxLotMatcher::new(&mut ledger)
            .allocate_lots(sale, &[p1, p2])
            .unwrap();
        assert!(allocation.is_complete());
        assert_eq!(allocation.created.len(), 2);
        assert_eq!(adjusted(&ledger, p1, sale), dec!(10));
        assert_eq!(adjusted(&ledger, p2, sale), dec!(2));
        assert_eq!(ledger.remaining_shares(p1), dec!(0));
        assert_eq!(ledger.remaining_shares(p2), dec!(3));
    }

    #[test]
    fn test_allocates_in_reverse_order() {
        let (mut ledger, security) = setup();
        let p1 = book(&mut ledger, BROKERAGE, security, date(2024, 1, 1), dec!(10));
        let p2 = book(&mut ledger, BROKERAGE, security, date(2024, 1, 2), dec!(5));
        let sale = book(&mut ledger, BROKERAGE, security, date(2024, 2, 1), dec!(-12));

        TaxLotMatcher::new(&mut ledger)
            .allocate_lots(sale, &[p2, p1])
            .unwrap();
        assert_eq!(adjusted(&ledger, p2, sale), dec!(5));
        assert_eq!(adjusted(&ledger, p1, sale), dec!(7));
    }

    #[test]
    fn test_second_sale_never_overdraws_purchase() {
        let (mut ledger, security) = setup();
        let purchase = book(&mut ledger, BROKERAGE, security, date(2024, 1, 1), dec!(10));
        let first = book(&mut ledger, BROKERAGE, security, date(2024, 2, 1), dec!(-8));
        let second = book(&mut ledger, BROKERAGE, security, date(2024, 3, 1), dec!(-8));

        let mut matcher = TaxLotMatcher::new(&mut ledger);
        assert!(matcher.allocate_lots(first, &[purchase]).unwrap().is_complete());
        let allocation = matcher.allocate_lots(second, &[purchase]).unwrap();
        assert_eq!(allocation.unallocated, dec!(6));
        assert_eq!(matcher.remaining_shares(purchase), dec!(0));
        assert!(matcher.is_missing_lots(second));
        assert!(!matcher.is_missing_lots(first));
    }

    #[test]
    fn test_exhausted_candidate_leaves_no_empty_lot() {
        let (mut ledger, security) = setup();
        let purchase = book(&mut ledger, BROKERAGE, security, date(2024, 1, 1), dec!(2));
        let first = book(&mut ledger, BROKERAGE, security, date(2024, 2, 1), dec!(-2));
        let second = book(&mut ledger, BROKERAGE, security, date(2024, 3, 1), dec!(-1));

        let mut matcher = TaxLotMatcher::new(&mut ledger);
        matcher.allocate_lots(first, &[purchase]).unwrap();
        let allocation = matcher.allocate_lots(second, &[purchase]).unwrap();
        assert!(allocation.created.is_empty());
        assert!(ledger.lot(LotKey::new(purchase, second)).is_none());
    }

    #[test]
    fn test_allocate_shares_returns_leftover_demand() {
        let (mut ledger, security) = setup();
        let purchase = book(&mut ledger, BROKERAGE, security, date(2024, 1, 1), dec!(4));
        let sale = book(&mut ledger, BROKERAGE, security, date(2024, 2, 1), dec!(-9));
        let key = ledger.insert_lot(purchase, sale).unwrap();

        let mut matcher = TaxLotMatcher::new(&mut ledger);
        assert_eq!(matcher.allocate_shares(key, dec!(9)), dec!(5));
        assert_eq!(matcher.allocate_shares(key, dec!(3)), dec!(3));
        assert_eq!(matcher.allocate_shares(key, dec!(-1)), dec!(0));
    }

    #[test]
    fn test_allocate_shares_to_unknown_lot_allocates_nothing() {
        let (mut ledger, _) = setup();
        let mut matcher = TaxLotMatcher::new(&mut ledger);
        let key = LotKey::new(EntryId(1), EntryId(2));
        assert_eq!(matcher.allocate_shares(key, dec!(7)), dec!(7));
    }

    // ==================== Splits ====================

    #[test]
    fn test_allocation_across_split() {
        let (mut ledger, security) = setup();
        ledger
            .add_split(security, date(2024, 6, 1), SplitRatio::new(2, 1).unwrap())
            .unwrap();
        let purchase = book(&mut ledger, BROKERAGE, security, date(2024, 1, 1), dec!(10));
        let sale = book(&mut ledger, BROKERAGE, security, date(2024, 7, 1), dec!(-20));

        let mut matcher = TaxLotMatcher::new(&mut ledger);
        assert!(matcher.allocate_lots(sale, &[purchase]).unwrap().is_complete());
        let key = LotKey::new(purchase, sale);
        assert_eq!(matcher.total_purchase_shares(key), dec!(20));
        assert_eq!(matcher.remaining_purchase_shares(key), dec!(0));
        let lot = ledger.lot(key).unwrap();
        assert_eq!(lot.purchase_shares, dec!(10));
        assert_eq!(lot.adjusted_shares, dec!(20));
    }

    #[test]
    fn test_purchase_price_is_split_adjusted() {
        let (mut ledger, security) = setup();
        ledger
            .add_split(security, date(2024, 6, 1), SplitRatio::new(2, 1).unwrap())
            .unwrap();
        let buy = ledger.add_transaction(BROKERAGE, date(2024, 1, 1), Some(security));
        let purchase = ledger.add_entry(buy, Some(dec!(-100)), Some(dec!(10)), None).unwrap();
        let sale = book(&mut ledger, BROKERAGE, security, date(2024, 7, 1), dec!(-4));
        let key = ledger.insert_lot(purchase, sale).unwrap();

        let matcher = TaxLotMatcher::new(&mut ledger);
        assert_eq!(matcher.purchase_price(key), Some(dec!(5)));
    }

    #[test]
    fn test_fractional_sales_across_split_never_exceed_purchase() {
        let (mut ledger, security) = setup();
        ledger
            .add_split(security, date(2024, 6, 1), SplitRatio::new(3, 1).unwrap())
            .unwrap();
        let purchase = book(&mut ledger, BROKERAGE, security, date(2024, 1, 1), dec!(1));
        let tiny = book(&mut ledger, BROKERAGE, security, date(2024, 7, 1), dec!(-0.000001));
        let rest = book(&mut ledger, BROKERAGE, security, date(2024, 7, 2), dec!(-3));

        let mut matcher = TaxLotMatcher::new(&mut ledger);
        assert!(matcher.allocate_lots(tiny, &[purchase]).unwrap().is_complete());
        let allocation = matcher.allocate_lots(rest, &[purchase]).unwrap();
        assert_eq!(allocation.unallocated, dec!(0.000003));
        assert_eq!(matcher.remaining_shares(purchase), dec!(0));
        assert!(matcher.is_missing_lots(rest));

        let tiny_lot = ledger.lot(LotKey::new(purchase, tiny)).unwrap();
        assert_eq!(tiny_lot.purchase_shares, dec!(0.000001));
        let sold: Decimal = ledger.lots_by_purchase(purchase).map(|lot| lot.adjusted_shares).sum();
        assert_eq!(sold, dec!(2.999998));
    }

    // ==================== Coverage ====================

    #[test]
    fn test_is_missing_lots_until_fully_covered() {
        let (mut ledger, security) = setup();
        let small = book(&mut ledger, BROKERAGE, security, date(2024, 1, 1), dec!(6));
        let more = book(&mut ledger, BROKERAGE, security, date(2024, 1, 2), dec!(4));
        let sale = book(&mut ledger, BROKERAGE, security, date(2024, 2, 1), dec!(-10));

        let mut matcher = TaxLotMatcher::new(&mut ledger);
        assert!(matcher.is_missing_lots(sale));
        matcher.allocate_lots(sale, &[small]).unwrap();
        assert!(matcher.is_missing_lots(sale));
        matcher.allocate_lots(sale, &[more]).unwrap();
        assert!(!matcher.is_missing_lots(sale));
    }

    #[test]
    fn test_categories_without_lots_are_never_missing() {
        let (mut ledger, security) = setup();
        let fees = ledger.add_category("fees", true, Some(SecurityAction::CommissionAndFees));
        let sell = ledger.add_category("sell", true, Some(SecurityAction::Sell));
        let tx = ledger.add_transaction(BROKERAGE, date(2024, 1, 1), Some(security));
        let fee = ledger.add_entry(tx, None, Some(dec!(-1)), Some(fees)).unwrap();
        let sale = ledger.add_entry(tx, None, Some(dec!(-1)), Some(sell)).unwrap();
        let buy = book(&mut ledger, BROKERAGE, security, date(2024, 1, 1), dec!(1));

        assert!(!is_missing_lots(&ledger, fee));
        assert!(is_missing_lots(&ledger, sale));
        assert!(!is_missing_lots(&ledger, buy));
    }

    // ==================== Transfers ====================

    #[test]
    fn test_shares_transferred_to_another_account() {
        let (mut ledger, security) = setup();
        let purchase = book(&mut ledger, BROKERAGE, security, date(2024, 1, 1), dec!(10));
        let out_tx = ledger.add_transaction(BROKERAGE, date(2024, 2, 1), Some(security));
        let (out_leg, in_leg) = ledger
            .add_transfer(out_tx, IRA, None, Some(dec!(-4)))
            .unwrap();
        let sale = book(&mut ledger, IRA, security, date(2024, 3, 1), dec!(-3));

        let mut matcher = TaxLotMatcher::new(&mut ledger);
        assert!(matcher.is_missing_lots(in_leg));
        matcher.allocate_lots(out_leg, &[purchase]).unwrap();
        assert!(!matcher.is_missing_lots(in_leg));
        assert_eq!(matcher.remaining_shares(purchase), dec!(6));
        assert_eq!(matcher.remaining_shares_for_account(purchase, IRA), dec!(4));

        matcher.allocate_lots(sale, &[purchase]).unwrap();
        assert!(!matcher.is_missing_lots(sale));
        assert_eq!(matcher.remaining_shares_for_account(purchase, IRA), dec!(1));
        assert_eq!(matcher.remaining_shares(purchase), dec!(3));
    }

    // ==================== Strategies ====================

    #[test]
    fn test_allocate_with_last_in_strategy() {
        let (mut ledger, security) = setup();
        let early = book(&mut ledger, BROKERAGE, security, date(2024, 1, 1), dec!(5));
        let late = book(&mut ledger, BROKERAGE, security, date(2024, 1, 20), dec!(5));
        let after_sale = book(&mut ledger, BROKERAGE, security, date(2024, 3, 1), dec!(5));
        let sale = book(&mut ledger, BROKERAGE, security, date(2024, 2, 1), dec!(-7));

        let allocation = TaxLotMatcher::new(&mut ledger)
            .allocate_with_strategy(sale, LotAllocationStrategy::LastIn)
            .unwrap();
        assert_eq!(
            allocation.created,
            vec![LotKey::new(late, sale), LotKey::new(early, sale)]
        );
        assert_eq!(adjusted(&ledger, late, sale), dec!(5));
        assert_eq!(adjusted(&ledger, early, sale), dec!(2));
        assert!(ledger.lot(LotKey::new(after_sale, sale)).is_none());
    }
}
