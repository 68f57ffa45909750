//! In-memory ledger store.
//!
//! All entity mutations go through the setters here so that transfer legs stay
//! negated, transfer-linked transactions share dates and securities, and the
//! cached remaining shares of purchase entries are reset whenever a lot that
//! consumes them changes. Share quantities are kept at the scale of their
//! security, and lots follow splits and dates that move under them.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use chrono::NaiveDate;
use log::trace;
use rust_decimal::Decimal;

use super::{
    AccountId, CategoryId, EntryId, LedgerEntry, Security, SecurityAction, SecurityId,
    Transaction, TransactionCategory, TransactionId,
};
use crate::errors::{LedgerError, Result};
use crate::lots::{Lot, LotKey};
use crate::settings::EngineSettings;
use crate::splits::{SplitLedger, SplitRatio, StockSplit};

/// Dates and security that drive the split adjustment of one lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LotSplitContext {
    pub security: Option<SecurityId>,
    pub purchase_date: Option<NaiveDate>,
    pub sale_date: Option<NaiveDate>,
}

#[derive(Debug, Default)]
pub struct Ledger {
    settings: EngineSettings,
    next_id: i64,
    securities: HashMap<SecurityId, Security>,
    categories: HashMap<CategoryId, TransactionCategory>,
    transactions: HashMap<TransactionId, Transaction>,
    entries: HashMap<EntryId, LedgerEntry>,
    lots: BTreeMap<LotKey, Lot>,
}

impl Ledger {
    pub fn new(settings: EngineSettings) -> Self {
        Ledger {
            settings,
            ..Default::default()
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    // --- Securities and splits ---

    pub fn add_security(&mut self, name: impl Into<String>) -> SecurityId {
        let id = SecurityId(self.next_id());
        self.securities.insert(
            id,
            Security {
                id,
                name: name.into(),
                scale: self.settings.share_scale,
                splits: SplitLedger::new(id),
            },
        );
        id
    }

    pub fn security(&self, id: SecurityId) -> Option<&Security> {
        self.securities.get(&id)
    }

    pub fn add_split(
        &mut self,
        security_id: SecurityId,
        date: NaiveDate,
        ratio: SplitRatio,
    ) -> Result<StockSplit> {
        let security = self
            .securities
            .get_mut(&security_id)
            .ok_or(LedgerError::SecurityNotFound(security_id))?;
        let split = *security.splits.insert(date, ratio)?;
        let affected = self.lots_of_security(security_id);
        self.rederive_lots(affected);
        Ok(split)
    }

    pub fn remove_split(
        &mut self,
        security_id: SecurityId,
        date: NaiveDate,
    ) -> Result<Option<StockSplit>> {
        let security = self
            .securities
            .get_mut(&security_id)
            .ok_or(LedgerError::SecurityNotFound(security_id))?;
        let removed = security.splits.remove(date);
        if removed.is_some() {
            let affected = self.lots_of_security(security_id);
            self.rederive_lots(affected);
        }
        Ok(removed)
    }

    fn split_ledger(
        &self,
        security: Option<SecurityId>,
        from: Option<NaiveDate>,
    ) -> Option<(&Security, NaiveDate)> {
        let security = security.and_then(|id| self.securities.get(&id))?;
        Some((security, from?))
    }

    /// Re-expresses shares held on `from` as shares held on `to`. Without a
    /// security or a start date there is nothing to adjust.
    pub fn apply_split(
        &self,
        security: Option<SecurityId>,
        shares: Decimal,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Decimal {
        match self.split_ledger(security, from) {
            Some((security, from)) => {
                security
                    .splits
                    .apply_split(shares, from, to, self.settings.split_boundary)
            }
            None => shares,
        }
    }

    /// Inverse of [`Ledger::apply_split`], rounded to the security's scale.
    pub fn revert_split(
        &self,
        security: Option<SecurityId>,
        shares: Decimal,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Decimal {
        match self.split_ledger(security, from) {
            Some((security, from)) => security.splits.revert_split(
                shares,
                from,
                to,
                self.settings.split_boundary,
                security.scale,
            ),
            None => shares,
        }
    }

    /// Shares held on `to` that `shares` held on `from` can back, rounded down.
    pub fn covered_shares(
        &self,
        security: Option<SecurityId>,
        shares: Decimal,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Decimal {
        match self.split_ledger(security, from) {
            Some((security, from)) => {
                security
                    .splits
                    .covered_shares(shares, from, to, self.settings.split_boundary)
            }
            None => shares,
        }
    }

    /// Shares held on `from` needed to back `shares` held on `to`, rounded up
    /// to the security's scale.
    pub fn covering_shares(
        &self,
        security: Option<SecurityId>,
        shares: Decimal,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Decimal {
        match self.split_ledger(security, from) {
            Some((security, from)) => security.splits.covering_shares(
                shares,
                from,
                to,
                self.settings.split_boundary,
                security.scale,
            ),
            None => shares,
        }
    }

    /// Compounded ratio of the security's splits between the two dates.
    pub fn split_ratio(
        &self,
        security: Option<SecurityId>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> SplitRatio {
        match self.split_ledger(security, from) {
            Some((security, from)) => {
                security
                    .splits
                    .ratio_between(from, to, self.settings.split_boundary)
            }
            None => SplitRatio::identity(),
        }
    }

    /// Rounds a share quantity to the scale of the transaction's security.
    fn round_shares(&self, transaction: TransactionId, shares: Option<Decimal>) -> Option<Decimal> {
        let scale = self
            .transactions
            .get(&transaction)
            .and_then(|transaction| transaction.security)
            .and_then(|id| self.securities.get(&id))
            .map_or(self.settings.share_scale, |security| security.scale);
        shares.map(|shares| shares.round_dp(scale).normalize())
    }

    // --- Categories ---

    pub fn add_category(
        &mut self,
        code: impl Into<String>,
        affects_balance: bool,
        security_action: Option<SecurityAction>,
    ) -> CategoryId {
        let id = CategoryId(self.next_id());
        self.categories.insert(
            id,
            TransactionCategory {
                id,
                code: code.into(),
                affects_balance,
                security_action,
            },
        );
        id
    }

    pub fn category(&self, id: CategoryId) -> Option<&TransactionCategory> {
        self.categories.get(&id)
    }

    /// Security action of the entry's category, if it has one.
    pub fn security_action(&self, entry: &LedgerEntry) -> Option<SecurityAction> {
        entry
            .category
            .and_then(|id| self.categories.get(&id))
            .and_then(|category| category.security_action)
    }

    // --- Transactions ---

    pub fn add_transaction(
        &mut self,
        account: AccountId,
        date: NaiveDate,
        security: Option<SecurityId>,
    ) -> TransactionId {
        let id = TransactionId(self.next_id());
        self.transactions.insert(
            id,
            Transaction {
                id,
                account,
                date,
                security,
                memo: None,
                details: Vec::new(),
            },
        );
        id
    }

    pub fn transaction(&self, id: TransactionId) -> Option<&Transaction> {
        self.transactions.get(&id)
    }

    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.values()
    }

    fn transaction_mut(&mut self, id: TransactionId) -> Result<&mut Transaction> {
        Ok(self
            .transactions
            .get_mut(&id)
            .ok_or(LedgerError::TransactionNotFound(id))?)
    }

    /// Moves a transaction to another account. Returns the previous account.
    pub fn set_transaction_account(
        &mut self,
        id: TransactionId,
        account: AccountId,
    ) -> Result<AccountId> {
        let transaction = self.transaction_mut(id)?;
        Ok(std::mem::replace(&mut transaction.account, account))
    }

    pub fn set_transaction_memo(&mut self, id: TransactionId, memo: Option<String>) -> Result<Option<String>> {
        let transaction = self.transaction_mut(id)?;
        Ok(std::mem::replace(&mut transaction.memo, memo))
    }

    /// Changes the date of a transaction and of every transaction linked to it
    /// by a transfer. Returns the previous date of each transaction changed.
    pub fn set_transaction_date(
        &mut self,
        id: TransactionId,
        date: NaiveDate,
    ) -> Result<Vec<(TransactionId, NaiveDate)>> {
        self.transaction_mut(id)?;
        let mut targets = vec![id];
        targets.extend(self.linked_transactions(id, false));

        let mut changed = Vec::new();
        for target in targets {
            if let Some(transaction) = self.transactions.get_mut(&target) {
                if transaction.date != date {
                    changed.push((target, std::mem::replace(&mut transaction.date, date)));
                }
            }
        }
        let moved: Vec<TransactionId> = changed.iter().map(|(id, _)| *id).collect();
        let affected = self.lots_of_transactions(&moved);
        self.rederive_lots(affected);
        Ok(changed)
    }

    /// Changes the security of a transaction. Transactions linked by a transfer
    /// leg that carries shares follow along. Returns the previous security of
    /// each transaction changed.
    pub fn set_transaction_security(
        &mut self,
        id: TransactionId,
        security: Option<SecurityId>,
    ) -> Result<Vec<(TransactionId, Option<SecurityId>)>> {
        self.transaction_mut(id)?;
        let mut changed = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([id]);
        while let Some(target) = queue.pop_front() {
            if !visited.insert(target) {
                continue;
            }
            let Some(transaction) = self.transactions.get_mut(&target) else {
                continue;
            };
            if transaction.security != security {
                changed.push((target, std::mem::replace(&mut transaction.security, security)));
            } else if target != id {
                continue;
            }
            queue.extend(self.linked_transactions(target, true));
        }
        let moved: Vec<TransactionId> = changed.iter().map(|(id, _)| *id).collect();
        let affected = self.lots_of_transactions(&moved);
        self.rederive_lots(affected);
        Ok(changed)
    }

    /// Transactions on the other side of this transaction's transfer legs.
    pub fn linked_transactions(&self, id: TransactionId, shares_only: bool) -> Vec<TransactionId> {
        let Some(transaction) = self.transactions.get(&id) else {
            return Vec::new();
        };
        transaction
            .details
            .iter()
            .filter_map(|entry_id| self.entries.get(entry_id))
            .filter(|entry| !shares_only || entry.asset_quantity.is_some())
            .filter_map(|entry| entry.related)
            .filter_map(|related| self.entries.get(&related))
            .filter_map(|related| related.transaction)
            .filter(|linked| *linked != id)
            .collect()
    }

    /// Removes a transaction along with any entries it still owns.
    pub fn remove_transaction(&mut self, id: TransactionId) -> Result<Transaction> {
        let details = self
            .transactions
            .get(&id)
            .ok_or(LedgerError::TransactionNotFound(id))?
            .details
            .clone();
        for entry_id in details {
            self.remove_entry(entry_id)?;
        }
        Ok(self
            .transactions
            .remove(&id)
            .ok_or(LedgerError::TransactionNotFound(id))?)
    }

    /// Sum of entry amounts, leaving out categories that do not affect the
    /// balance.
    pub fn transaction_amount(&self, transaction: &Transaction) -> Decimal {
        self.details(transaction)
            .filter(|entry| {
                entry
                    .category
                    .and_then(|id| self.categories.get(&id))
                    .map_or(true, |category| category.affects_balance)
            })
            .filter_map(|entry| entry.amount)
            .sum()
    }

    pub fn transaction_asset_quantity(&self, transaction: &Transaction) -> Decimal {
        self.details(transaction)
            .filter_map(|entry| entry.asset_quantity)
            .sum()
    }

    /// Sum of the negative entry amounts.
    pub fn transaction_expense_amount(&self, transaction: &Transaction) -> Decimal {
        self.details(transaction)
            .filter_map(|entry| entry.amount)
            .filter(|amount| amount.is_sign_negative())
            .sum()
    }

    fn details<'a>(&'a self, transaction: &'a Transaction) -> impl Iterator<Item = &'a LedgerEntry> {
        transaction
            .details
            .iter()
            .filter_map(|entry_id| self.entries.get(entry_id))
    }

    // --- Ledger entries ---

    pub fn add_entry(
        &mut self,
        transaction_id: TransactionId,
        amount: Option<Decimal>,
        asset_quantity: Option<Decimal>,
        category: Option<CategoryId>,
    ) -> Result<EntryId> {
        self.transaction_mut(transaction_id)?;
        if let Some(category_id) = category {
            if !self.categories.contains_key(&category_id) {
                return Err(LedgerError::CategoryNotFound(category_id).into());
            }
        }
        let id = EntryId(self.next_id());
        let mut entry = LedgerEntry::new(id, transaction_id);
        entry.amount = amount;
        entry.asset_quantity = self.round_shares(transaction_id, asset_quantity);
        entry.category = category;
        self.attach(entry);
        Ok(id)
    }

    /// Adds a transfer leg to `transaction_id` and its opposite leg to a new
    /// transaction on `other_account`. Returns `(leg, opposite leg)`.
    pub fn add_transfer(
        &mut self,
        transaction_id: TransactionId,
        other_account: AccountId,
        amount: Option<Decimal>,
        asset_quantity: Option<Decimal>,
    ) -> Result<(EntryId, EntryId)> {
        let (date, security) = {
            let transaction = self
                .transactions
                .get(&transaction_id)
                .ok_or(LedgerError::TransactionNotFound(transaction_id))?;
            (transaction.date, transaction.security)
        };
        let asset_quantity = self.round_shares(transaction_id, asset_quantity);
        let other_security = asset_quantity.and(security);
        let other_transaction = self.add_transaction(other_account, date, other_security);

        let id = EntryId(self.next_id());
        let related_id = EntryId(self.next_id());

        let mut entry = LedgerEntry::new(id, transaction_id);
        entry.amount = amount;
        entry.asset_quantity = asset_quantity;
        entry.related = Some(related_id);

        let mut related = LedgerEntry::new(related_id, other_transaction);
        related.amount = amount.map(|value| -value);
        related.asset_quantity = asset_quantity.map(|value| -value);
        related.related = Some(id);

        self.attach(entry);
        self.attach(related);
        Ok((id, related_id))
    }

    fn attach(&mut self, entry: LedgerEntry) {
        if let Some(transaction) = entry
            .transaction
            .and_then(|id| self.transactions.get_mut(&id))
        {
            transaction.details.push(entry.id);
        }
        self.entries.insert(entry.id, entry);
    }

    pub fn entry(&self, id: EntryId) -> Option<&LedgerEntry> {
        self.entries.get(&id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.values()
    }

    /// Transaction currently owning the entry.
    pub fn entry_transaction(&self, id: EntryId) -> Option<&Transaction> {
        self.entries
            .get(&id)
            .and_then(|entry| entry.transaction)
            .and_then(|transaction| self.transactions.get(&transaction))
    }

    fn entry_mut(&mut self, id: EntryId) -> Result<&mut LedgerEntry> {
        Ok(self
            .entries
            .get_mut(&id)
            .ok_or(LedgerError::EntryNotFound(id))?)
    }

    /// Sets the amount, negating it onto the opposite transfer leg. Returns the
    /// previous amount.
    pub fn set_entry_amount(&mut self, id: EntryId, amount: Option<Decimal>) -> Result<Option<Decimal>> {
        let entry = self.entry_mut(id)?;
        let previous = std::mem::replace(&mut entry.amount, amount);
        let related = entry.related;
        if let Some(related) = related.and_then(|related| self.entries.get_mut(&related)) {
            related.amount = amount.map(|value| -value);
        }
        debug_assert!(self.is_negated(id), "transfer legs of {} out of balance", id);
        Ok(previous)
    }

    /// Sets the share quantity, rounded to the security's scale, and negates it
    /// onto the opposite transfer leg. Returns the previous quantity.
    pub fn set_entry_asset_quantity(
        &mut self,
        id: EntryId,
        asset_quantity: Option<Decimal>,
    ) -> Result<Option<Decimal>> {
        let owner = self.entry(id).ok_or(LedgerError::EntryNotFound(id))?.transaction;
        let asset_quantity = match owner {
            Some(owner) => self.round_shares(owner, asset_quantity),
            None => asset_quantity,
        };
        let entry = self.entry_mut(id)?;
        let previous = std::mem::replace(&mut entry.asset_quantity, asset_quantity);
        entry.reset_remaining_shares();
        let related = entry.related;
        if let Some(related) = related.and_then(|related| self.entries.get_mut(&related)) {
            related.asset_quantity = asset_quantity.map(|value| -value);
            related.reset_remaining_shares();
        }
        debug_assert!(self.is_negated(id), "transfer legs of {} out of balance", id);
        Ok(previous)
    }

    /// Whether the entry and its opposite transfer leg carry negated values.
    fn is_negated(&self, id: EntryId) -> bool {
        let Some(entry) = self.entries.get(&id) else {
            return true;
        };
        match entry.related.and_then(|related| self.entries.get(&related)) {
            Some(related) => {
                related.amount == entry.amount.map(|value| -value)
                    && related.asset_quantity == entry.asset_quantity.map(|value| -value)
            }
            None => true,
        }
    }

    pub fn set_entry_category(
        &mut self,
        id: EntryId,
        category: Option<CategoryId>,
    ) -> Result<Option<CategoryId>> {
        if let Some(category_id) = category {
            if !self.categories.contains_key(&category_id) {
                return Err(LedgerError::CategoryNotFound(category_id).into());
            }
        }
        let entry = self.entry_mut(id)?;
        Ok(std::mem::replace(&mut entry.category, category))
    }

    pub fn set_entry_memo(&mut self, id: EntryId, memo: Option<String>) -> Result<Option<String>> {
        let entry = self.entry_mut(id)?;
        Ok(std::mem::replace(&mut entry.memo, memo))
    }

    /// Removes an entry from the ledger and from its transaction. The opposite
    /// transfer leg loses its back-reference and lots touching the entry are
    /// dropped. The returned entry no longer references a transaction.
    pub fn remove_entry(&mut self, id: EntryId) -> Result<LedgerEntry> {
        let mut entry = self
            .entries
            .remove(&id)
            .ok_or(LedgerError::EntryNotFound(id))?;
        if let Some(transaction) = entry
            .transaction
            .and_then(|transaction| self.transactions.get_mut(&transaction))
        {
            transaction.details.retain(|detail| *detail != id);
        }
        if let Some(related) = entry.related.and_then(|related| self.entries.get_mut(&related)) {
            if related.related == Some(id) {
                related.related = None;
            }
        }
        for key in self.lots_for_entry(id) {
            trace!("Dropping lot {} with removed entry {}", key, id);
            self.lots.remove(&key);
            if let Some(purchase) = self.entries.get(&key.purchase) {
                purchase.reset_remaining_shares();
            }
        }
        entry.transaction = None;
        entry.reset_remaining_shares();
        Ok(entry)
    }

    /// Purchase entries in `account` for `security`, dated on or before
    /// `on_or_before`, that still have unsold shares. Ordered by date.
    pub fn unsold_purchases(
        &self,
        account: AccountId,
        security: SecurityId,
        on_or_before: NaiveDate,
    ) -> Vec<EntryId> {
        let mut purchases: Vec<(NaiveDate, EntryId)> = self
            .entries
            .values()
            .filter(|entry| !entry.is_transfer() && entry.asset_quantity_or_zero() > Decimal::ZERO)
            .filter(|entry| {
                self.security_action(entry)
                    .map_or(true, |action| action.is_acquisition())
            })
            .filter_map(|entry| {
                let transaction = self.transactions.get(&entry.transaction?)?;
                (transaction.account == account
                    && transaction.security == Some(security)
                    && transaction.date <= on_or_before)
                    .then_some((transaction.date, entry.id))
            })
            .filter(|(_, id)| self.remaining_shares(*id) > Decimal::ZERO)
            .collect();
        purchases.sort();
        purchases.into_iter().map(|(_, id)| id).collect()
    }

    // --- Lots ---

    pub fn lot(&self, key: LotKey) -> Option<&Lot> {
        self.lots.get(&key)
    }

    pub fn lots(&self) -> impl Iterator<Item = &Lot> {
        self.lots.values()
    }

    /// Lots consuming shares of `purchase`.
    pub fn lots_by_purchase(&self, purchase: EntryId) -> impl Iterator<Item = &Lot> {
        self.lots
            .range(LotKey::new(purchase, EntryId(i64::MIN))..=LotKey::new(purchase, EntryId(i64::MAX)))
            .map(|(_, lot)| lot)
    }

    /// Lots backing `sale`.
    pub fn lots_by_sale(&self, sale: EntryId) -> impl Iterator<Item = &Lot> {
        self.lots.values().filter(move |lot| lot.sale == sale)
    }

    /// Keys of lots on either side of the entry.
    pub fn lots_for_entry(&self, id: EntryId) -> Vec<LotKey> {
        self.lots
            .keys()
            .filter(|key| key.purchase == id || key.sale == id)
            .copied()
            .collect()
    }

    /// Creates an empty lot for the pair.
    pub fn insert_lot(&mut self, purchase: EntryId, sale: EntryId) -> Result<LotKey> {
        for id in [purchase, sale] {
            if !self.entries.contains_key(&id) {
                return Err(LedgerError::EntryNotFound(id).into());
            }
        }
        let key = LotKey::new(purchase, sale);
        if self.lots.contains_key(&key) {
            return Err(LedgerError::DuplicateLot(key).into());
        }
        self.lots.insert(key, Lot::new(purchase, sale));
        if let Some(entry) = self.entries.get(&purchase) {
            entry.reset_remaining_shares();
        }
        Ok(key)
    }

    /// Sets the sale-date share count of a lot and derives its purchase-date
    /// share count by reverting the splits in between, rounded up so the
    /// purchase always backs what the sale took.
    pub fn set_lot_adjusted_shares(&mut self, key: LotKey, adjusted_shares: Decimal) -> Result<()> {
        if !self.lots.contains_key(&key) {
            return Err(LedgerError::LotNotFound(key).into());
        }
        let purchase_shares = self.lot_purchase_shares(key, adjusted_shares);
        if let Some(lot) = self.lots.get_mut(&key) {
            lot.adjusted_shares = adjusted_shares;
            lot.purchase_shares = purchase_shares;
        }
        if let Some(purchase) = self.entries.get(&key.purchase) {
            purchase.reset_remaining_shares();
        }
        Ok(())
    }

    pub fn remove_lot(&mut self, key: LotKey) -> Result<Lot> {
        let lot = self
            .lots
            .remove(&key)
            .ok_or(LedgerError::LotNotFound(key))?;
        if let Some(purchase) = self.entries.get(&key.purchase) {
            purchase.reset_remaining_shares();
        }
        Ok(lot)
    }

    fn lot_purchase_shares(&self, key: LotKey, adjusted_shares: Decimal) -> Decimal {
        let context = self.lot_split_context(key);
        let (from, to) = (context.purchase_date, context.sale_date);
        let purchase_shares = self.covering_shares(context.security, adjusted_shares, from, to);
        debug_assert!(
            self.split_ratio(context.security, from, to).apply(purchase_shares) >= adjusted_shares,
            "lot {} purchase shares do not back its adjusted shares",
            key
        );
        debug_assert_eq!(
            self.revert_split(
                context.security,
                self.apply_split(context.security, purchase_shares, from, to),
                from,
                to
            ),
            purchase_shares,
            "split round trip of lot {}",
            key
        );
        purchase_shares
    }

    /// Re-derives the purchase-date shares of lots after a split or a date
    /// under them changed. Adjusted shares stay as they are.
    fn rederive_lots(&mut self, keys: Vec<LotKey>) {
        for key in keys {
            let Some(adjusted_shares) = self.lots.get(&key).map(|lot| lot.adjusted_shares) else {
                continue;
            };
            let purchase_shares = self.lot_purchase_shares(key, adjusted_shares);
            if let Some(lot) = self.lots.get_mut(&key) {
                if lot.purchase_shares != purchase_shares {
                    trace!(
                        "Lot {} now consumes {} purchase shares instead of {}",
                        key,
                        purchase_shares,
                        lot.purchase_shares
                    );
                    lot.purchase_shares = purchase_shares;
                }
            }
            if let Some(purchase) = self.entries.get(&key.purchase) {
                purchase.reset_remaining_shares();
            }
        }
    }

    fn lots_of_security(&self, security: SecurityId) -> Vec<LotKey> {
        self.lots
            .keys()
            .filter(|key| self.lot_split_context(**key).security == Some(security))
            .copied()
            .collect()
    }

    fn lots_of_transactions(&self, transactions: &[TransactionId]) -> Vec<LotKey> {
        let owned_by = |entry: EntryId| {
            self.entries
                .get(&entry)
                .and_then(|entry| entry.transaction)
                .map_or(false, |owner| transactions.contains(&owner))
        };
        self.lots
            .keys()
            .filter(|key| owned_by(key.purchase) || owned_by(key.sale))
            .copied()
            .collect()
    }

    pub(crate) fn lot_split_context(&self, key: LotKey) -> LotSplitContext {
        let purchase = self.entry_transaction(key.purchase);
        let sale = self.entry_transaction(key.sale);
        LotSplitContext {
            security: purchase
                .and_then(|transaction| transaction.security)
                .or_else(|| sale.and_then(|transaction| transaction.security)),
            purchase_date: purchase.map(|transaction| transaction.date),
            sale_date: sale.map(|transaction| transaction.date),
        }
    }

    /// Unadjusted shares of a purchase not yet consumed by lots. Cached on the
    /// entry until a lot touching it or its quantity changes.
    pub fn remaining_shares(&self, id: EntryId) -> Decimal {
        let Some(entry) = self.entries.get(&id) else {
            return Decimal::ZERO;
        };
        if let Some(cached) = entry.remaining_shares.get() {
            return cached;
        }
        let consumed: Decimal = self.lots_by_purchase(id).map(|lot| lot.purchase_shares).sum();
        let remaining = entry.asset_quantity_or_zero() - consumed;
        entry.remaining_shares.set(Some(remaining));
        remaining
    }
}
