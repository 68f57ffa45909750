use super::{
    AccountBalanceAggregator, AssetPositionAggregator, ChangeContext, ChangeRecorder,
    ChangeSetBuilder, Entity, PreviousValues,
};
use crate::events::DomainEvent;

/// Fans every callback out to a list of recorders and concatenates their
/// events in registration order.
#[derive(Default)]
pub struct CompositeRecorder {
    recorders: Vec<Box<dyn ChangeRecorder>>,
}

impl CompositeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Change set, account balances and asset positions, in that order.
    pub fn standard() -> Self {
        Self::new()
            .with(ChangeSetBuilder::new())
            .with(AccountBalanceAggregator::new())
            .with(AssetPositionAggregator::new())
    }

    pub fn with(mut self, recorder: impl ChangeRecorder + 'static) -> Self {
        self.push(Box::new(recorder));
        self
    }

    pub fn push(&mut self, recorder: Box<dyn ChangeRecorder>) {
        self.recorders.push(recorder);
    }

    pub fn len(&self) -> usize {
        self.recorders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorders.is_empty()
    }
}

impl ChangeRecorder for CompositeRecorder {
    fn added(&mut self, context: &ChangeContext<'_>, entity: Entity<'_>) {
        for recorder in &mut self.recorders {
            recorder.added(context, entity);
        }
    }

    fn changed(&mut self, context: &ChangeContext<'_>, entity: Entity<'_>, previous: &PreviousValues) {
        for recorder in &mut self.recorders {
            recorder.changed(context, entity, previous);
        }
    }

    fn deleted(&mut self, context: &ChangeContext<'_>, entity: Entity<'_>, previous: &PreviousValues) {
        for recorder in &mut self.recorders {
            recorder.deleted(context, entity, previous);
        }
    }

    fn events(&mut self) -> Vec<DomainEvent> {
        self.recorders
            .iter_mut()
            .flat_map(|recorder| recorder.events())
            .collect()
    }
}
