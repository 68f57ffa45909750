//! Net set of entities added, changed and deleted per domain type.

use std::collections::{BTreeMap, BTreeSet};

use log::trace;

use super::{ChangeContext, ChangeRecorder, Entity, PreviousValues};
use crate::events::{ChangeKind, DomainEvent, DomainType, EntityKey};

type KeysByType = BTreeMap<DomainType, BTreeSet<EntityKey>>;

/// Collects entity identities touched by a unit of work.
///
/// Any change to a ledger entry also marks its transaction as changed. An
/// entity reported as deleted is never reported as changed as well. Added and
/// deleted are reported independently, so an entity created and removed in
/// the same unit of work shows up in both.
#[derive(Debug, Default)]
pub struct ChangeSetBuilder {
    added: KeysByType,
    changed: KeysByType,
    deleted: KeysByType,
}

impl ChangeSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(sets: &mut KeysByType, key: EntityKey) {
        sets.entry(key.domain_type()).or_default().insert(key);
    }

    fn roll_up(&mut self, context: &ChangeContext<'_>, entity: Entity<'_>, previous: Option<&PreviousValues>) {
        let Entity::Entry(entry) = entity else {
            return;
        };
        let owner = entry
            .transaction
            .or_else(|| previous.and_then(PreviousValues::transaction));
        match owner.and_then(|id| context.transaction(id)) {
            Some(transaction) => {
                Self::insert(&mut self.changed, EntityKey::Transaction(transaction.id))
            }
            None => trace!("Entry {} has no resolvable transaction", entry.id),
        }
    }
}

impl ChangeRecorder for ChangeSetBuilder {
    fn added(&mut self, context: &ChangeContext<'_>, entity: Entity<'_>) {
        Self::insert(&mut self.added, entity.key());
        self.roll_up(context, entity, None);
    }

    fn changed(&mut self, context: &ChangeContext<'_>, entity: Entity<'_>, previous: &PreviousValues) {
        Self::insert(&mut self.changed, entity.key());
        self.roll_up(context, entity, Some(previous));
    }

    fn deleted(&mut self, context: &ChangeContext<'_>, entity: Entity<'_>, previous: &PreviousValues) {
        Self::insert(&mut self.deleted, entity.key());
        self.roll_up(context, entity, Some(previous));
    }

    fn events(&mut self) -> Vec<DomainEvent> {
        let added = std::mem::take(&mut self.added);
        let mut changed = std::mem::take(&mut self.changed);
        let deleted = std::mem::take(&mut self.deleted);

        for (domain_type, keys) in &deleted {
            if let Some(changed_keys) = changed.get_mut(domain_type) {
                changed_keys.retain(|key| !keys.contains(key));
            }
        }

        [
            (ChangeKind::Added, added),
            (ChangeKind::Changed, changed),
            (ChangeKind::Deleted, deleted),
        ]
        .into_iter()
        .flat_map(|(kind, sets)| {
            sets.into_iter()
                .filter(|(_, keys)| !keys.is_empty())
                .map(move |(domain_type, keys)| {
                    DomainEvent::entities_changed(domain_type, kind, keys.into_iter().collect())
                })
        })
        .collect()
    }
}
