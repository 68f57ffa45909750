//! Ledger domain models.

use std::cell::Cell;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::splits::SplitLedger;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                $name(id)
            }
        }
    };
}

entity_id!(
    /// Identity of an account. Accounts themselves live outside the engine.
    AccountId
);
entity_id!(TransactionId);
entity_id!(
    /// Identity of a ledger entry (a detail line of a transaction).
    EntryId
);
entity_id!(SecurityId);
entity_id!(CategoryId);

/// Security action a category stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityAction {
    Buy,
    Sell,
    Reinvest,
    SharesIn,
    SharesOut,
    Dividend,
    Interest,
    ShortTermCapGain,
    MidTermCapGain,
    LongTermCapGain,
    CommissionAndFees,
}

impl SecurityAction {
    /// Sales and share removals must be backed by purchase lots.
    pub fn requires_lots(&self) -> bool {
        matches!(self, SecurityAction::Sell | SecurityAction::SharesOut)
    }

    pub fn is_acquisition(&self) -> bool {
        matches!(
            self,
            SecurityAction::Buy | SecurityAction::Reinvest | SecurityAction::SharesIn
        )
    }

    pub fn is_security_required(&self) -> bool {
        !matches!(
            self,
            SecurityAction::CommissionAndFees | SecurityAction::Interest
        )
    }
}

/// Category of a non-transfer ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionCategory {
    pub id: CategoryId,
    pub code: String,
    /// Entries in categories that do not affect the balance are left out of
    /// the transaction amount.
    pub affects_balance: bool,
    pub security_action: Option<SecurityAction>,
}

/// A security and the splits recorded for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Security {
    pub id: SecurityId,
    pub name: String,
    /// Decimal places of unadjusted share quantities.
    pub scale: u32,
    pub splits: SplitLedger,
}

/// A transaction: one dated movement in one account, made of ledger entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub account: AccountId,
    pub date: NaiveDate,
    pub security: Option<SecurityId>,
    pub memo: Option<String>,
    pub(crate) details: Vec<EntryId>,
}

impl Transaction {
    /// Ledger entries owned by this transaction, in entry order.
    pub fn details(&self) -> &[EntryId] {
        &self.details
    }

    pub fn is_security(&self) -> bool {
        self.security.is_some()
    }
}

/// A detail line of a transaction.
///
/// When `related` is set the entry is one leg of a transfer and the other leg
/// always carries the negated amount and share quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: EntryId,
    /// Owning transaction. Cleared once the entry is removed from the ledger.
    pub transaction: Option<TransactionId>,
    pub amount: Option<Decimal>,
    pub asset_quantity: Option<Decimal>,
    pub category: Option<CategoryId>,
    pub related: Option<EntryId>,
    pub memo: Option<String>,
    /// Unadjusted shares not yet consumed by lots. `None` until first read.
    #[serde(skip)]
    pub(crate) remaining_shares: Cell<Option<Decimal>>,
}

impl LedgerEntry {
    pub(crate) fn new(id: EntryId, transaction: TransactionId) -> Self {
        LedgerEntry {
            id,
            transaction: Some(transaction),
            amount: None,
            asset_quantity: None,
            category: None,
            related: None,
            memo: None,
            remaining_shares: Cell::new(None),
        }
    }

    pub fn is_transfer(&self) -> bool {
        self.related.is_some()
    }

    pub fn amount_or_zero(&self) -> Decimal {
        self.amount.unwrap_or(Decimal::ZERO)
    }

    pub fn asset_quantity_or_zero(&self) -> Decimal {
        self.asset_quantity.unwrap_or(Decimal::ZERO)
    }

    pub fn is_zero_amount(&self) -> bool {
        self.amount.map_or(true, |amount| amount.is_zero())
    }

    pub(crate) fn reset_remaining_shares(&self) {
        self.remaining_shares.set(None);
    }
}
