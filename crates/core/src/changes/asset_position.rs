//! Per-(account, security) share and transaction-count deltas.

use std::collections::BTreeMap;

use log::trace;
use rust_decimal::Decimal;

use super::recorder::Tally;
use super::{ChangeContext, ChangeRecorder, Entity, PreviousValues};
use crate::events::{DomainEvent, SecurityPosition};
use crate::ledger::{AccountId, SecurityId, Transaction, TransactionId};

type PositionKey = (TransactionId, AccountId, SecurityId);

/// Accumulates how a unit of work moves share holdings.
///
/// Works like [`super::AccountBalanceAggregator`] over share quantities, with
/// the security of the owning transaction as a second dimension. Transactions
/// without a security and zero deltas leave no trace.
#[derive(Debug, Default)]
pub struct AssetPositionAggregator {
    tallies: BTreeMap<PositionKey, Tally>,
}

impl AssetPositionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn adjust(&mut self, transaction: &Transaction, shares: Decimal, count: i64) {
        let Some(security) = transaction.security else {
            trace!("Ignoring position change of transaction {} without security", transaction.id);
            return;
        };
        if shares.is_zero() && count == 0 {
            return;
        }
        let tally = self
            .tallies
            .entry((transaction.id, transaction.account, security))
            .or_default();
        tally.amount += shares;
        tally.count += count;
    }

    fn adjust_shares(&mut self, context: &ChangeContext<'_>, owner: Option<TransactionId>, shares: Decimal) {
        if shares.is_zero() {
            return;
        }
        if let Some(transaction) = owner.and_then(|id| context.transaction(id)) {
            self.adjust(transaction, shares, 0);
        }
    }

    /// Moves the transaction's shares from the old (account, security) pair to
    /// the current one unless the old pair already tracks part of it.
    fn move_transaction(
        &mut self,
        context: &ChangeContext<'_>,
        transaction: &Transaction,
        old_account: AccountId,
        old_security: Option<SecurityId>,
    ) {
        let old_key = old_security.map(|security| (transaction.id, old_account, security));
        if let Some(key) = old_key {
            if self.tallies.contains_key(&key) {
                trace!("Transaction {} already tracked on {:?}", transaction.id, key);
                return;
            }
        }
        let new_key = transaction
            .security
            .map(|security| (transaction.id, transaction.account, security));
        let total = context.transaction_asset_quantity(transaction);
        let tracked = new_key
            .and_then(|key| self.tallies.get(&key))
            .map_or(Decimal::ZERO, |tally| tally.amount);
        if let Some(key) = old_key {
            self.tallies.insert(
                key,
                Tally {
                    amount: tracked - total,
                    count: -1,
                },
            );
        }
        if let Some(key) = new_key {
            self.tallies.insert(
                key,
                Tally {
                    amount: total,
                    count: 1,
                },
            );
        }
    }
}

impl ChangeRecorder for AssetPositionAggregator {
    fn added(&mut self, context: &ChangeContext<'_>, entity: Entity<'_>) {
        match entity {
            Entity::Transaction(transaction) => self.adjust(transaction, Decimal::ZERO, 1),
            Entity::Entry(entry) => {
                self.adjust_shares(context, entry.transaction, entry.asset_quantity_or_zero())
            }
            _ => {}
        }
    }

    fn changed(&mut self, context: &ChangeContext<'_>, entity: Entity<'_>, previous: &PreviousValues) {
        match entity {
            Entity::Transaction(transaction) => {
                let old_account = previous.account().unwrap_or(transaction.account);
                let old_security = previous.security().unwrap_or(transaction.security);
                if old_account != transaction.account || old_security != transaction.security {
                    self.move_transaction(context, transaction, old_account, old_security);
                }
            }
            Entity::Entry(entry) => {
                if let Some(old_quantity) = previous.asset_quantity() {
                    let delta = entry.asset_quantity_or_zero() - old_quantity.unwrap_or(Decimal::ZERO);
                    self.adjust_shares(context, entry.transaction, delta);
                }
            }
            _ => {}
        }
    }

    fn deleted(&mut self, context: &ChangeContext<'_>, entity: Entity<'_>, previous: &PreviousValues) {
        match entity {
            Entity::Transaction(transaction) => {
                let mut original = transaction.clone();
                original.account = previous.account().unwrap_or(transaction.account);
                original.security = previous.security().unwrap_or(transaction.security);
                self.adjust(&original, Decimal::ZERO, -1);
            }
            Entity::Entry(entry) => {
                let quantity = previous
                    .asset_quantity()
                    .unwrap_or(entry.asset_quantity)
                    .unwrap_or(Decimal::ZERO);
                let owner = entry.transaction.or_else(|| previous.transaction());
                self.adjust_shares(context, owner, -quantity);
            }
            _ => {}
        }
    }

    fn events(&mut self) -> Vec<DomainEvent> {
        let mut by_position: BTreeMap<(AccountId, SecurityId), Tally> = BTreeMap::new();
        for ((_, account, security), tally) in std::mem::take(&mut self.tallies) {
            let total = by_position.entry((account, security)).or_default();
            total.amount += tally.amount;
            total.count += tally.count;
        }
        if by_position.is_empty() {
            return Vec::new();
        }
        let summaries = by_position
            .into_iter()
            .map(|((account_id, security_id), tally)| SecurityPosition {
                account_id,
                security_id,
                share_delta: tally.amount,
                transaction_count_delta: tally.count,
            })
            .collect();
        vec![DomainEvent::security_summaries_changed(summaries)]
    }
}
