//! Per-account balance and transaction-count deltas.

use std::collections::BTreeMap;

use log::trace;
use rust_decimal::Decimal;

use super::recorder::Tally;
use super::{ChangeContext, ChangeRecorder, Entity, PreviousValues};
use crate::events::{AccountPosition, DomainEvent};
use crate::ledger::{AccountId, LedgerEntry, Transaction, TransactionId};

/// Accumulates how a unit of work moves account balances.
///
/// Deltas are tracked per (transaction, account) so that a transaction moved
/// between accounts can tell whether its old account already saw partial
/// updates for it. Events are grouped by account.
#[derive(Debug, Default)]
pub struct AccountBalanceAggregator {
    tallies: BTreeMap<(TransactionId, AccountId), Tally>,
}

impl AccountBalanceAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn tally(&mut self, transaction: &Transaction) -> &mut Tally {
        self.tallies
            .entry((transaction.id, transaction.account))
            .or_default()
    }

    fn adjust_balance(&mut self, context: &ChangeContext<'_>, entry: &LedgerEntry, owner: Option<TransactionId>, delta: Decimal) {
        match owner.and_then(|id| context.transaction(id)) {
            Some(transaction) => self.tally(transaction).amount += delta,
            None => trace!("Ignoring balance change of entry {} without transaction", entry.id),
        }
    }

    /// Moves the transaction's total from `old_account` to its current account
    /// unless the old account already tracks part of it.
    fn move_transaction(&mut self, context: &ChangeContext<'_>, transaction: &Transaction, old_account: AccountId) {
        let old_key = (transaction.id, old_account);
        if self.tallies.contains_key(&old_key) {
            trace!("Transaction {} already tracked on account {}", transaction.id, old_account);
            return;
        }
        let total = context.transaction_amount(transaction);
        let tracked = self
            .tallies
            .get(&(transaction.id, transaction.account))
            .map_or(Decimal::ZERO, |tally| tally.amount);
        self.tallies.insert(
            old_key,
            Tally {
                amount: tracked - total,
                count: -1,
            },
        );
        self.tallies.insert(
            (transaction.id, transaction.account),
            Tally {
                amount: total,
                count: 1,
            },
        );
    }
}

impl ChangeRecorder for AccountBalanceAggregator {
    fn added(&mut self, context: &ChangeContext<'_>, entity: Entity<'_>) {
        match entity {
            Entity::Transaction(transaction) => self.tally(transaction).count += 1,
            Entity::Entry(entry) => {
                self.adjust_balance(context, entry, entry.transaction, entry.amount_or_zero())
            }
            _ => {}
        }
    }

    fn changed(&mut self, context: &ChangeContext<'_>, entity: Entity<'_>, previous: &PreviousValues) {
        match entity {
            Entity::Transaction(transaction) => {
                if let Some(old_account) = previous.account() {
                    if old_account != transaction.account {
                        self.move_transaction(context, transaction, old_account);
                    }
                }
            }
            Entity::Entry(entry) => {
                if let Some(old_amount) = previous.amount() {
                    let delta = entry.amount_or_zero() - old_amount.unwrap_or(Decimal::ZERO);
                    if !delta.is_zero() {
                        self.adjust_balance(context, entry, entry.transaction, delta);
                    }
                }
            }
            _ => {}
        }
    }

    fn deleted(&mut self, context: &ChangeContext<'_>, entity: Entity<'_>, previous: &PreviousValues) {
        match entity {
            Entity::Transaction(transaction) => {
                let account = previous.account().unwrap_or(transaction.account);
                self.tallies
                    .entry((transaction.id, account))
                    .or_default()
                    .count -= 1;
            }
            Entity::Entry(entry) => {
                let amount = previous
                    .amount()
                    .unwrap_or(entry.amount)
                    .unwrap_or(Decimal::ZERO);
                let owner = entry.transaction.or_else(|| previous.transaction());
                self.adjust_balance(context, entry, owner, -amount);
            }
            _ => {}
        }
    }

    fn events(&mut self) -> Vec<DomainEvent> {
        let mut by_account: BTreeMap<AccountId, Tally> = BTreeMap::new();
        for ((_, account), tally) in std::mem::take(&mut self.tallies) {
            let total = by_account.entry(account).or_default();
            total.amount += tally.amount;
            total.count += tally.count;
        }
        if by_account.is_empty() {
            return Vec::new();
        }
        let summaries = by_account
            .into_iter()
            .map(|(account_id, tally)| AccountPosition {
                account_id,
                balance_delta: tally.amount,
                transaction_count_delta: tally.count,
            })
            .collect();
        vec![DomainEvent::account_summaries_changed(summaries)]
    }
}
