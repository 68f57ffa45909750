//! Engine settings - split interval boundary, share scale and lot strategy.

mod settings_model;

pub use settings_model::*;
