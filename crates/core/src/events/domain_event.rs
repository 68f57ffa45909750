//! Domain event types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::{AccountId, CategoryId, EntryId, SecurityId, TransactionId};
use crate::lots::LotKey;

/// Kind of entity a change refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainType {
    Transaction,
    LedgerEntry,
    Lot,
    StockSplit,
    Security,
    Category,
    Account,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Added,
    Changed,
    Deleted,
}

/// Identity of a changed entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKey {
    Transaction(TransactionId),
    Entry(EntryId),
    Lot(LotKey),
    StockSplit(SecurityId, NaiveDate),
    Security(SecurityId),
    Category(CategoryId),
    Account(AccountId),
}

impl EntityKey {
    pub fn domain_type(&self) -> DomainType {
        match self {
            EntityKey::Transaction(_) => DomainType::Transaction,
            EntityKey::Entry(_) => DomainType::LedgerEntry,
            EntityKey::Lot(_) => DomainType::Lot,
            EntityKey::StockSplit(..) => DomainType::StockSplit,
            EntityKey::Security(_) => DomainType::Security,
            EntityKey::Category(_) => DomainType::Category,
            EntityKey::Account(_) => DomainType::Account,
        }
    }
}

/// Net balance change of one account within a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountPosition {
    pub account_id: AccountId,
    pub balance_delta: Decimal,
    pub transaction_count_delta: i64,
}

/// Net share change of one security in one account within a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityPosition {
    pub account_id: AccountId,
    pub security_id: SecurityId,
    pub share_delta: Decimal,
    pub transaction_count_delta: i64,
}

/// Domain events drained from a change recorder when a unit of work
/// completes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// Entities of one type were added, changed or deleted.
    EntitiesChanged {
        domain_type: DomainType,
        kind: ChangeKind,
        keys: Vec<EntityKey>,
    },

    /// Running balances moved. One summary per affected account.
    AccountSummariesChanged { summaries: Vec<AccountPosition> },

    /// Share holdings moved. One summary per affected (account, security).
    SecuritySummariesChanged { summaries: Vec<SecurityPosition> },
}

impl DomainEvent {
    /// Creates an EntitiesChanged event.
    pub fn entities_changed(domain_type: DomainType, kind: ChangeKind, keys: Vec<EntityKey>) -> Self {
        Self::EntitiesChanged {
            domain_type,
            kind,
            keys,
        }
    }

    /// Creates an AccountSummariesChanged event.
    pub fn account_summaries_changed(summaries: Vec<AccountPosition>) -> Self {
        Self::AccountSummariesChanged { summaries }
    }

    /// Creates a SecuritySummariesChanged event.
    pub fn security_summaries_changed(summaries: Vec<SecurityPosition>) -> Self {
        Self::SecuritySummariesChanged { summaries }
    }

    pub fn as_entities(&self) -> Option<(DomainType, ChangeKind, &[EntityKey])> {
        match self {
            Self::EntitiesChanged {
                domain_type,
                kind,
                keys,
            } => Some((*domain_type, *kind, keys.as_slice())),
            _ => None,
        }
    }

    pub fn as_account_summaries(&self) -> Option<&[AccountPosition]> {
        match self {
            Self::AccountSummariesChanged { summaries } => Some(summaries.as_slice()),
            _ => None,
        }
    }

    pub fn as_security_summaries(&self) -> Option<&[SecurityPosition]> {
        match self {
            Self::SecuritySummariesChanged { summaries } => Some(summaries.as_slice()),
            _ => None,
        }
    }
}
