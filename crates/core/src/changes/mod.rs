//! Change recording for units of work.
//!
//! A [`UnitOfWork`] applies edits to a ledger and reports each touched entity
//! to a [`ChangeRecorder`]. The recorders shipped here derive the net change
//! set and the running balance and share summaries of the session.

mod account_balance;
mod asset_position;
mod change_record;
mod change_set;
mod composite;
mod recorder;
mod unit_of_work;


pub use account_balance::AccountBalanceAggregator;
pub use asset_position::AssetPositionAggregator;
pub use change_record::{Entity, FieldValue, PreviousValues};
pub use change_set::ChangeSetBuilder;
pub use composite::CompositeRecorder;
pub use recorder::{ChangeContext, ChangeRecorder};
pub use unit_of_work::UnitOfWork;
