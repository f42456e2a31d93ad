use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Progress reporting configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProgressConfig {
    /// Milliseconds between progress diff emissions.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Number of rows reported per tick; 0 reports every changed shard.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl ProgressConfig {
    /// Default reporting period in milliseconds.
    pub const DEFAULT_TICK_INTERVAL_MS: u64 = 2000;

    /// Default number of rows reported per tick.
    pub const DEFAULT_TOP_N: usize = 5;

    /// Validates progress configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.tick_interval_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "progress.tick_interval_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            top_n: default_top_n(),
        }
    }
}

fn default_tick_interval_ms() -> u64 {
    ProgressConfig::DEFAULT_TICK_INTERVAL_MS
}

fn default_top_n() -> usize {
    ProgressConfig::DEFAULT_TOP_N
}
