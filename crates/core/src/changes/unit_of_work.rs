//! Mutation session over a [`Ledger`].
//!
//! Every mutation is applied to the ledger immediately and journaled per
//! entity. When the session completes, each touched entity is reported to
//! the recorder exactly once, with the field values it had when the session
//! began. Entries are replayed before lots and transactions so that a
//! transaction moved between accounts sees the entry deltas already booked on
//! its new account.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use log::{debug, warn};
use rust_decimal::Decimal;

use super::{ChangeContext, ChangeRecorder, CompositeRecorder, Entity, FieldValue, PreviousValues};
use crate::errors::{LedgerError, Result};
use crate::events::{DomainEvent, DomainEventSink, EntityKey};
use crate::ledger::{
    AccountId, CategoryId, EntryId, Ledger, LedgerEntry, SecurityAction, SecurityId, Transaction,
    TransactionId,
};
use crate::lots::{is_missing_lots, Lot, LotAllocation, LotAllocationStrategy, LotKey, TaxLotMatcher};
use crate::splits::{SplitRatio, StockSplit};

/// Last state of an entity removed during the session.
#[derive(Debug, Clone)]
enum Removed {
    Transaction(Transaction),
    Entry(LedgerEntry),
    Lot(Lot),
    StockSplit(SecurityId, StockSplit),
}

impl Removed {
    fn entity(&self) -> Entity<'_> {
        match self {
            Removed::Transaction(transaction) => Entity::Transaction(transaction),
            Removed::Entry(entry) => Entity::Entry(entry),
            Removed::Lot(lot) => Entity::Lot(lot),
            Removed::StockSplit(security, split) => Entity::StockSplit(*security, split),
        }
    }

    /// Field values of the removed entity, for when it reappears.
    fn fields(&self) -> Vec<FieldValue> {
        match self {
            Removed::Lot(lot) => vec![
                FieldValue::PurchaseShares(lot.purchase_shares),
                FieldValue::AdjustedShares(lot.adjusted_shares),
            ],
            Removed::StockSplit(_, split) => vec![FieldValue::Ratio(split.ratio)],
            Removed::Transaction(_) | Removed::Entry(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct PendingChange {
    added: bool,
    previous: PreviousValues,
    removed: Option<Removed>,
}

/// Applies edits to a ledger and reports them to a [`ChangeRecorder`].
pub struct UnitOfWork<'a, R: ChangeRecorder = CompositeRecorder> {
    ledger: &'a mut Ledger,
    recorder: R,
    journal: Vec<EntityKey>,
    pending: HashMap<EntityKey, PendingChange>,
}

impl<'a> UnitOfWork<'a> {
    /// Starts a session reporting to the standard recorders.
    pub fn begin(ledger: &'a mut Ledger) -> Self {
        Self::with_recorder(ledger, CompositeRecorder::standard())
    }
}

impl<'a, R: ChangeRecorder> UnitOfWork<'a, R> {
    pub fn with_recorder(ledger: &'a mut Ledger, recorder: R) -> Self {
        UnitOfWork {
            ledger,
            recorder,
            journal: Vec::new(),
            pending: HashMap::new(),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &*self.ledger
    }

    // --- Journal ---

    fn pending(&mut self, key: EntityKey) -> &mut PendingChange {
        if !self.pending.contains_key(&key) {
            self.journal.push(key);
        }
        self.pending.entry(key).or_default()
    }

    fn record_added(&mut self, key: EntityKey) {
        let change = self.pending(key);
        match change.removed.take() {
            Some(removed) if !change.added => {
                for value in removed.fields() {
                    change.previous.record(value);
                }
            }
            _ => change.added = true,
        }
    }

    fn record_changed(&mut self, key: EntityKey, value: FieldValue) {
        let change = self.pending(key);
        if !change.added {
            change.previous.record(value);
        }
    }

    fn record_removed(&mut self, key: EntityKey, removed: Removed) {
        self.pending(key).removed = Some(removed);
    }

    // --- Reference data ---

    pub fn add_security(&mut self, name: impl Into<String>) -> SecurityId {
        let id = self.ledger.add_security(name);
        self.record_added(EntityKey::Security(id));
        id
    }

    pub fn add_category(
        &mut self,
        code: impl Into<String>,
        affects_balance: bool,
        security_action: Option<SecurityAction>,
    ) -> CategoryId {
        let id = self.ledger.add_category(code, affects_balance, security_action);
        self.record_added(EntityKey::Category(id));
        id
    }

    /// Records a split. Lots spanning its date are re-derived.
    pub fn add_split(&mut self, security: SecurityId, date: NaiveDate, ratio: SplitRatio) -> Result<()> {
        let before = self.lot_snapshot();
        self.ledger.add_split(security, date, ratio)?;
        self.record_added(EntityKey::StockSplit(security, date));
        self.record_lot_changes(before);
        Ok(())
    }

    pub fn delete_split(&mut self, security: SecurityId, date: NaiveDate) -> Result<bool> {
        let before = self.lot_snapshot();
        match self.ledger.remove_split(security, date)? {
            Some(split) => {
                self.record_lot_changes(before);
                self.record_removed(
                    EntityKey::StockSplit(security, date),
                    Removed::StockSplit(security, split),
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // --- Transactions ---

    pub fn add_transaction(
        &mut self,
        account: AccountId,
        date: NaiveDate,
        security: Option<SecurityId>,
    ) -> TransactionId {
        let id = self.ledger.add_transaction(account, date, security);
        self.record_added(EntityKey::Transaction(id));
        id
    }

    pub fn set_transaction_account(&mut self, id: TransactionId, account: AccountId) -> Result<()> {
        let previous = self.ledger.set_transaction_account(id, account)?;
        if previous != account {
            self.record_changed(EntityKey::Transaction(id), FieldValue::Account(previous));
        }
        Ok(())
    }

    /// Changes the date of the transaction and of the transactions linked to
    /// it by transfers.
    pub fn set_transaction_date(&mut self, id: TransactionId, date: NaiveDate) -> Result<()> {
        let before = self.lot_snapshot();
        for (changed, previous) in self.ledger.set_transaction_date(id, date)? {
            self.record_changed(EntityKey::Transaction(changed), FieldValue::Date(previous));
        }
        self.record_lot_changes(before);
        Ok(())
    }

    /// Changes the security of the transaction and of the transactions that
    /// received or sent its shares.
    pub fn set_transaction_security(&mut self, id: TransactionId, security: Option<SecurityId>) -> Result<()> {
        let before = self.lot_snapshot();
        for (changed, previous) in self.ledger.set_transaction_security(id, security)? {
            self.record_changed(EntityKey::Transaction(changed), FieldValue::Security(previous));
        }
        self.record_lot_changes(before);
        Ok(())
    }

    /// Deletes the transaction with all of its entries. Transfer legs on other
    /// transactions go with them.
    pub fn delete_transaction(&mut self, id: TransactionId) -> Result<()> {
        let details = self
            .ledger
            .transaction(id)
            .ok_or(LedgerError::TransactionNotFound(id))?
            .details()
            .to_vec();
        for entry in details {
            if self.ledger.entry(entry).is_some() {
                self.delete_entry(entry)?;
            }
        }
        if self.ledger.transaction(id).is_some() {
            let transaction = self.ledger.remove_transaction(id)?;
            self.record_removed(EntityKey::Transaction(id), Removed::Transaction(transaction));
        }
        Ok(())
    }

    // --- Entries ---

    pub fn add_entry(
        &mut self,
        transaction: TransactionId,
        amount: Option<Decimal>,
        asset_quantity: Option<Decimal>,
        category: Option<CategoryId>,
    ) -> Result<EntryId> {
        let id = self.ledger.add_entry(transaction, amount, asset_quantity, category)?;
        self.record_added(EntityKey::Entry(id));
        Ok(id)
    }

    /// Adds a transfer leg to `transaction` and its opposite leg to a new
    /// transaction on `other_account`.
    pub fn add_transfer(
        &mut self,
        transaction: TransactionId,
        other_account: AccountId,
        amount: Option<Decimal>,
        asset_quantity: Option<Decimal>,
    ) -> Result<(EntryId, EntryId)> {
        let (leg, other) = self
            .ledger
            .add_transfer(transaction, other_account, amount, asset_quantity)?;
        if let Some(other_transaction) = self.ledger.entry(other).and_then(|entry| entry.transaction) {
            self.record_added(EntityKey::Transaction(other_transaction));
        }
        self.record_added(EntityKey::Entry(leg));
        self.record_added(EntityKey::Entry(other));
        Ok((leg, other))
    }

    fn related_of(&self, id: EntryId) -> Option<&LedgerEntry> {
        self.ledger
            .entry(id)
            .and_then(|entry| entry.related)
            .and_then(|related| self.ledger.entry(related))
    }

    pub fn set_entry_amount(&mut self, id: EntryId, amount: Option<Decimal>) -> Result<()> {
        let related = self.related_of(id).map(|entry| (entry.id, entry.amount));
        let previous = self.ledger.set_entry_amount(id, amount)?;
        if previous != amount {
            self.record_changed(EntityKey::Entry(id), FieldValue::Amount(previous));
            if let Some((related, related_amount)) = related {
                self.record_changed(EntityKey::Entry(related), FieldValue::Amount(related_amount));
            }
        }
        Ok(())
    }

    pub fn set_entry_asset_quantity(&mut self, id: EntryId, asset_quantity: Option<Decimal>) -> Result<()> {
        let related = self.related_of(id).map(|entry| (entry.id, entry.asset_quantity));
        let previous = self.ledger.set_entry_asset_quantity(id, asset_quantity)?;
        let stored = self.ledger.entry(id).and_then(|entry| entry.asset_quantity);
        if previous != stored {
            self.record_changed(EntityKey::Entry(id), FieldValue::AssetQuantity(previous));
            if let Some((related, related_quantity)) = related {
                self.record_changed(
                    EntityKey::Entry(related),
                    FieldValue::AssetQuantity(related_quantity),
                );
            }
        }
        Ok(())
    }

    pub fn set_entry_category(&mut self, id: EntryId, category: Option<CategoryId>) -> Result<()> {
        let previous = self.ledger.set_entry_category(id, category)?;
        if previous != category {
            self.record_changed(EntityKey::Entry(id), FieldValue::Category(previous));
        }
        Ok(())
    }

    /// Deletes the entry and the lots built on it. Deleting a transfer leg
    /// deletes the opposite leg too, and its transaction once it has no
    /// entries left.
    pub fn delete_entry(&mut self, id: EntryId) -> Result<()> {
        let owner = self.ledger.entry(id).ok_or(LedgerError::EntryNotFound(id))?.transaction;
        let related = self.related_of(id).map(|entry| (entry.id, entry.transaction));

        self.remove_entry(id)?;
        if let Some((related, related_owner)) = related {
            self.remove_entry(related)?;
            if let Some(other) = related_owner.filter(|other| Some(*other) != owner) {
                let empty = self
                    .ledger
                    .transaction(other)
                    .map_or(false, |transaction| transaction.details().is_empty());
                if empty {
                    self.delete_transaction(other)?;
                }
            }
        }
        Ok(())
    }

    fn remove_entry(&mut self, id: EntryId) -> Result<()> {
        for key in self.ledger.lots_for_entry(id) {
            self.delete_lot(key)?;
        }
        let owner = self.ledger.entry(id).and_then(|entry| entry.transaction);
        let entry = self.ledger.remove_entry(id)?;
        self.pending(EntityKey::Entry(id))
            .previous
            .record(FieldValue::Transaction(owner));
        self.record_removed(EntityKey::Entry(id), Removed::Entry(entry));
        Ok(())
    }

    // --- Lots ---

    /// Allocates the sale to `candidates` in the order given.
    pub fn match_lots(&mut self, sale: EntryId, candidates: &[EntryId]) -> Result<LotAllocation> {
        let before: BTreeMap<LotKey, Lot> = self
            .ledger
            .lots_by_sale(sale)
            .map(|lot| (lot.key(), *lot))
            .collect();
        let allocation = TaxLotMatcher::new(&mut *self.ledger).allocate_lots(sale, candidates)?;
        self.record_allocation(&allocation, &before);
        Ok(allocation)
    }

    /// Allocates the sale to the unsold purchases of its account, ordered by
    /// `strategy` or by the configured default.
    pub fn match_lots_with_strategy(
        &mut self,
        sale: EntryId,
        strategy: Option<LotAllocationStrategy>,
    ) -> Result<LotAllocation> {
        let strategy = strategy.unwrap_or(self.ledger.settings().lot_strategy);
        let before: BTreeMap<LotKey, Lot> = self
            .ledger
            .lots_by_sale(sale)
            .map(|lot| (lot.key(), *lot))
            .collect();
        let allocation = TaxLotMatcher::new(&mut *self.ledger).allocate_with_strategy(sale, strategy)?;
        self.record_allocation(&allocation, &before);
        Ok(allocation)
    }

    fn record_allocation(&mut self, allocation: &LotAllocation, before: &BTreeMap<LotKey, Lot>) {
        debug!(
            "Matched {} new and {} existing lots, {} shares unallocated",
            allocation.created.len(),
            allocation.updated.len(),
            allocation.unallocated
        );
        for key in &allocation.created {
            self.record_added(EntityKey::Lot(*key));
        }
        for key in &allocation.updated {
            if let Some(lot) = before.get(key) {
                self.record_changed(EntityKey::Lot(*key), FieldValue::PurchaseShares(lot.purchase_shares));
                self.record_changed(EntityKey::Lot(*key), FieldValue::AdjustedShares(lot.adjusted_shares));
            }
        }
    }

    pub fn delete_lot(&mut self, key: LotKey) -> Result<()> {
        let lot = self.ledger.remove_lot(key)?;
        self.record_removed(EntityKey::Lot(key), Removed::Lot(lot));
        Ok(())
    }

    fn lot_snapshot(&self) -> BTreeMap<LotKey, Lot> {
        self.ledger.lots().map(|lot| (lot.key(), *lot)).collect()
    }

    /// Journals the lots whose purchase shares were re-derived since `before`.
    fn record_lot_changes(&mut self, before: BTreeMap<LotKey, Lot>) {
        for (key, lot) in before {
            let changed = self
                .ledger
                .lot(key)
                .map_or(false, |current| current.purchase_shares != lot.purchase_shares);
            if changed {
                self.record_changed(EntityKey::Lot(key), FieldValue::PurchaseShares(lot.purchase_shares));
            }
        }
    }

    pub fn is_missing_lots(&self, sale: EntryId) -> bool {
        is_missing_lots(self.ledger(), sale)
    }

    // --- Completion ---

    /// Reports every journaled entity to the recorder and drains its events.
    pub fn complete(self) -> Vec<DomainEvent> {
        let UnitOfWork {
            ledger,
            mut recorder,
            journal,
            mut pending,
        } = self;
        let ledger: &Ledger = ledger;

        for change in pending.values_mut() {
            if let Some(Removed::Transaction(transaction)) = &mut change.removed {
                restore_session_start(transaction, &change.previous);
            }
        }

        let removed_transactions: BTreeMap<TransactionId, Transaction> = pending
            .values()
            .filter_map(|change| match &change.removed {
                Some(Removed::Transaction(transaction)) => Some((transaction.id, transaction.clone())),
                _ => None,
            })
            .collect();
        let context = ChangeContext::new(ledger).with_removed(&removed_transactions);

        let mut order: Vec<(u8, usize, EntityKey)> = journal
            .into_iter()
            .enumerate()
            .map(|(sequence, key)| (replay_rank(&key), sequence, key))
            .collect();
        order.sort();

        for (_, _, key) in order {
            let Some(change) = pending.get(&key) else {
                continue;
            };
            match &change.removed {
                Some(removed) => {
                    if change.added {
                        replay_added(&mut recorder, &context, removed, &change.previous);
                    }
                    recorder.deleted(&context, removed.entity(), &change.previous);
                }
                None => match live_entity(ledger, key) {
                    Some(entity) if change.added => recorder.added(&context, entity),
                    Some(entity) => recorder.changed(&context, entity, &change.previous),
                    None => warn!("Skipping {:?}: no longer in the ledger", key),
                },
            }
        }
        recorder.events()
    }

    /// Completes the session and publishes its events. Returns how many were
    /// published.
    pub fn complete_into(self, sink: &dyn DomainEventSink) -> usize {
        let events = self.complete();
        let count = events.len();
        if count > 0 {
            sink.emit_batch(events);
        }
        count
    }
}

/// Puts back the account, security and date a removed transaction had when
/// the session began, so its entries are booked where they were counted.
fn restore_session_start(transaction: &mut Transaction, previous: &PreviousValues) {
    if let Some(account) = previous.account() {
        transaction.account = account;
    }
    if let Some(security) = previous.security() {
        transaction.security = security;
    }
    if let Some(date) = previous.date() {
        transaction.date = date;
    }
}

fn replay_rank(key: &EntityKey) -> u8 {
    match key {
        EntityKey::Entry(_) => 0,
        EntityKey::Lot(_) => 1,
        EntityKey::Transaction(_) => 2,
        _ => 3,
    }
}

/// Reports an entity created and removed within the same session as added,
/// with its transaction restored.
fn replay_added<R: ChangeRecorder>(
    recorder: &mut R,
    context: &ChangeContext<'_>,
    removed: &Removed,
    previous: &PreviousValues,
) {
    match removed {
        Removed::Entry(entry) => {
            let mut attached = entry.clone();
            attached.transaction = previous.transaction();
            recorder.added(context, Entity::Entry(&attached));
        }
        other => recorder.added(context, other.entity()),
    }
}

fn live_entity(ledger: &Ledger, key: EntityKey) -> Option<Entity<'_>> {
    match key {
        EntityKey::Transaction(id) => ledger.transaction(id).map(Entity::Transaction),
        EntityKey::Entry(id) => ledger.entry(id).map(Entity::Entry),
        EntityKey::Lot(key) => ledger.lot(key).map(Entity::Lot),
        EntityKey::StockSplit(security, date) => ledger
            .security(security)
            .and_then(|found| found.splits.split_on(date))
            .map(|split| Entity::StockSplit(security, split)),
        other => Some(Entity::Other(other)),
    }
}
