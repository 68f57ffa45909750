//! Engine settings model.

use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_SHARE_SCALE, MAX_SHARE_SCALE};
use crate::errors::{Error, Result};
use crate::lots::LotAllocationStrategy;
use crate::splits::SplitBoundary;

/// Settings shared by the ledger store, the split ledgers and the lot matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Which ends of a purchase/sale date interval pick up a split dated on them.
    pub split_boundary: SplitBoundary,
    /// Decimal places of unadjusted share quantities.
    pub share_scale: u32,
    /// Ordering used when a sale is matched without explicit candidates.
    pub lot_strategy: LotAllocationStrategy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            split_boundary: SplitBoundary::default(),
            share_scale: DEFAULT_SHARE_SCALE,
            lot_strategy: LotAllocationStrategy::default(),
        }
    }
}

impl EngineSettings {
    /// Parses settings from JSON. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: EngineSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading engine settings from {}", path.display());
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigIO(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.share_scale > MAX_SHARE_SCALE {
            return Err(Error::InvalidConfigValue(format!(
                "shareScale must be at most {}, got {}",
                MAX_SHARE_SCALE, self.share_scale
            )));
        }
        Ok(())
    }
}
