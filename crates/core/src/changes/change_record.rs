//! Typed change records handed to recorders.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::events::{DomainType, EntityKey};
use crate::ledger::{AccountId, CategoryId, EntryId, LedgerEntry, SecurityId, Transaction, TransactionId};
use crate::lots::Lot;
use crate::splits::{SplitRatio, StockSplit};

/// A mutated entity as seen by a recorder.
#[derive(Debug, Clone, Copy)]
pub enum Entity<'a> {
    Transaction(&'a Transaction),
    Entry(&'a LedgerEntry),
    Lot(&'a Lot),
    StockSplit(SecurityId, &'a StockSplit),
    /// Entities no recorder inspects beyond their identity.
    Other(EntityKey),
}

impl Entity<'_> {
    pub fn key(&self) -> EntityKey {
        match self {
            Entity::Transaction(tx) => EntityKey::Transaction(tx.id),
            Entity::Entry(entry) => EntityKey::Entry(entry.id),
            Entity::Lot(lot) => EntityKey::Lot(lot.key()),
            Entity::StockSplit(security, split) => EntityKey::StockSplit(*security, split.date),
            Entity::Other(key) => *key,
        }
    }

    pub fn domain_type(&self) -> DomainType {
        self.key().domain_type()
    }
}

/// Value a field held before the unit of work changed it.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Account(AccountId),
    Date(NaiveDate),
    Security(Option<SecurityId>),
    Transaction(Option<TransactionId>),
    Amount(Option<Decimal>),
    AssetQuantity(Option<Decimal>),
    Category(Option<CategoryId>),
    Related(Option<EntryId>),
    Memo(Option<String>),
    PurchaseShares(Decimal),
    AdjustedShares(Decimal),
    Ratio(SplitRatio),
}

impl FieldValue {
    pub fn field_name(&self) -> &'static str {
        match self {
            FieldValue::Account(_) => "account",
            FieldValue::Date(_) => "date",
            FieldValue::Security(_) => "security",
            FieldValue::Transaction(_) => "transaction",
            FieldValue::Amount(_) => "amount",
            FieldValue::AssetQuantity(_) => "assetQuantity",
            FieldValue::Category(_) => "category",
            FieldValue::Related(_) => "related",
            FieldValue::Memo(_) => "memo",
            FieldValue::PurchaseShares(_) => "purchaseShares",
            FieldValue::AdjustedShares(_) => "adjustedShares",
            FieldValue::Ratio(_) => "ratio",
        }
    }

    fn same_field(&self, other: &FieldValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Previous values of the fields a change touched.
///
/// A field that is absent is unknown. Recorders then fall back to the current
/// state of the entity, which means no delta for that field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviousValues {
    values: Vec<FieldValue>,
}

macro_rules! previous_accessor {
    ($(#[$meta:meta])* $name:ident, $variant:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $name(&self) -> Option<$ty> {
            self.values.iter().find_map(|value| match value {
                FieldValue::$variant(previous) => Some(*previous),
                _ => None,
            })
        }
    };
}

impl PreviousValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`PreviousValues::record`].
    pub fn with(mut self, value: FieldValue) -> Self {
        self.record(value);
        self
    }

    /// Keeps the first value recorded for each field, which is the value the
    /// field had when the unit of work began.
    pub fn record(&mut self, value: FieldValue) {
        if !self.values.iter().any(|known| known.same_field(&value)) {
            self.values.push(value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.values.iter().map(FieldValue::field_name).collect()
    }

    previous_accessor!(account, Account, AccountId);
    previous_accessor!(date, Date, NaiveDate);
    previous_accessor!(security, Security, Option<SecurityId>);
    previous_accessor!(amount, Amount, Option<Decimal>);
    previous_accessor!(asset_quantity, AssetQuantity, Option<Decimal>);
    previous_accessor!(category, Category, Option<CategoryId>);
    previous_accessor!(purchase_shares, PurchaseShares, Decimal);
    previous_accessor!(adjusted_shares, AdjustedShares, Decimal);

    /// Owning transaction before the change, if it had one.
    pub fn transaction(&self) -> Option<TransactionId> {
        self.values.iter().find_map(|value| match value {
            FieldValue::Transaction(previous) => *previous,
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_first_recorded_value_wins() {
        let mut previous = PreviousValues::new();
        previous.record(FieldValue::Amount(Some(dec!(5))));
        previous.record(FieldValue::Amount(Some(dec!(7))));
        previous.record(FieldValue::Account(AccountId(2)));

        assert_eq!(previous.amount(), Some(Some(dec!(5))));
        assert_eq!(previous.account(), Some(AccountId(2)));
        assert_eq!(previous.field_names(), vec!["amount", "account"]);
    }

    #[test]
    fn test_missing_fields_are_unknown() {
        let previous = PreviousValues::new().with(FieldValue::Amount(None));
        assert_eq!(previous.amount(), Some(None));
        assert_eq!(previous.asset_quantity(), None);
        assert_eq!(previous.security(), None);
        assert_eq!(previous.transaction(), None);
    }

    #[test]
    fn test_cleared_transaction_reads_as_none() {
        let previous = PreviousValues::new().with(FieldValue::Transaction(None));
        assert_eq!(previous.transaction(), None);
        let previous = PreviousValues::new().with(FieldValue::Transaction(Some(TransactionId(4))));
        assert_eq!(previous.transaction(), Some(TransactionId(4)));
    }
}
