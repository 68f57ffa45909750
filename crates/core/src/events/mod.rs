//! Domain events module.
//!
//! Event types produced by change recorders and the sink trait they are
//! published through once a unit of work completes.

mod domain_event;
mod sink;

pub use domain_event::*;
pub use sink::*;
