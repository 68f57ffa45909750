use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::{Entity, PreviousValues};
use crate::events::DomainEvent;
use crate::ledger::{Ledger, Transaction, TransactionId};

static NO_REMOVED_TRANSACTIONS: BTreeMap<TransactionId, Transaction> = BTreeMap::new();

/// Ledger state visible to recorders, including transactions that were
/// removed during the unit of work.
#[derive(Clone, Copy)]
pub struct ChangeContext<'a> {
    ledger: &'a Ledger,
    removed: &'a BTreeMap<TransactionId, Transaction>,
}

impl<'a> ChangeContext<'a> {
    pub fn new(ledger: &'a Ledger) -> Self {
        ChangeContext {
            ledger,
            removed: &NO_REMOVED_TRANSACTIONS,
        }
    }

    pub fn with_removed(mut self, removed: &'a BTreeMap<TransactionId, Transaction>) -> Self {
        self.removed = removed;
        self
    }

    pub fn ledger(&self) -> &'a Ledger {
        self.ledger
    }

    /// Live transaction, or its last state if it was removed.
    pub fn transaction(&self, id: TransactionId) -> Option<&'a Transaction> {
        self.ledger.transaction(id).or_else(|| self.removed.get(&id))
    }

    pub fn transaction_amount(&self, transaction: &Transaction) -> Decimal {
        self.ledger.transaction_amount(transaction)
    }

    pub fn transaction_asset_quantity(&self, transaction: &Transaction) -> Decimal {
        self.ledger.transaction_asset_quantity(transaction)
    }
}

/// Observer of one unit of work.
///
/// Each mutated entity is reported once. `events` drains what the recorder
/// accumulated, so a second call returns nothing new.
pub trait ChangeRecorder {
    fn added(&mut self, context: &ChangeContext<'_>, entity: Entity<'_>);

    fn changed(&mut self, context: &ChangeContext<'_>, entity: Entity<'_>, previous: &PreviousValues);

    fn deleted(&mut self, context: &ChangeContext<'_>, entity: Entity<'_>, previous: &PreviousValues);

    fn events(&mut self) -> Vec<DomainEvent>;
}

/// Running delta an aggregator keeps per key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Tally {
    pub amount: Decimal,
    pub count: i64,
}
