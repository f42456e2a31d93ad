use serde::{Deserialize, Serialize};

use crate::shared::{ProgressConfig, ValidationError};

/// Per-job knobs for the shard pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JobConfig {
    /// Maximum concurrent reader chunks per shard.
    #[serde(default = "default_read_parallelism_per_shard")]
    pub read_parallelism_per_shard: usize,
    /// Concurrent producer tasks per shard.
    #[serde(default = "default_write_parallelism_per_shard")]
    pub write_parallelism_per_shard: usize,
    /// Bounded buffer capacity per shard, in batches.
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    /// Records requested per partition read.
    #[serde(default = "default_read_batch_size")]
    pub read_batch_size: usize,
    /// Cap on batches fetched per reader chunk; 0 disables the cap.
    #[serde(default = "default_max_batches_per_chunk")]
    pub max_batches_per_chunk: u64,
    /// Progress reporting settings.
    #[serde(default)]
    pub progress: ProgressConfig,
}

impl JobConfig {
    /// Default maximum concurrent reader chunks per shard.
    pub const DEFAULT_READ_PARALLELISM_PER_SHARD: usize = 1;

    /// Default concurrent producer tasks per shard.
    pub const DEFAULT_WRITE_PARALLELISM_PER_SHARD: usize = 1;

    /// Default buffer capacity per shard, in batches.
    pub const DEFAULT_READ_BUFFER_SIZE: usize = 16;

    /// Default records per partition read.
    pub const DEFAULT_READ_BATCH_SIZE: usize = 1000;

    /// Default per-chunk batch cap (disabled).
    pub const DEFAULT_MAX_BATCHES_PER_CHUNK: u64 = 0;

    /// Validates job configuration settings.
    ///
    /// Parallelism, buffer, and batch sizes must all be at least 1; the
    /// per-chunk cap may be 0.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.read_parallelism_per_shard == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "read_parallelism_per_shard".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }
        if self.write_parallelism_per_shard == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "write_parallelism_per_shard".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }
        if self.read_buffer_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "read_buffer_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }
        if self.read_batch_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "read_batch_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }
        self.progress.validate()
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            read_parallelism_per_shard: default_read_parallelism_per_shard(),
            write_parallelism_per_shard: default_write_parallelism_per_shard(),
            read_buffer_size: default_read_buffer_size(),
            read_batch_size: default_read_batch_size(),
            max_batches_per_chunk: default_max_batches_per_chunk(),
            progress: ProgressConfig::default(),
        }
    }
}

fn default_read_parallelism_per_shard() -> usize {
    JobConfig::DEFAULT_READ_PARALLELISM_PER_SHARD
}

fn default_write_parallelism_per_shard() -> usize {
    JobConfig::DEFAULT_WRITE_PARALLELISM_PER_SHARD
}

fn default_read_buffer_size() -> usize {
    JobConfig::DEFAULT_READ_BUFFER_SIZE
}

fn default_read_batch_size() -> usize {
    JobConfig::DEFAULT_READ_BATCH_SIZE
}

fn default_max_batches_per_chunk() -> u64 {
    JobConfig::DEFAULT_MAX_BATCHES_PER_CHUNK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        JobConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_parallelism_is_rejected() {
        let config = JobConfig {
            read_parallelism_per_shard: 0,
            ..JobConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = JobConfig {
            read_batch_size: 0,
            ..JobConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_chunk_cap_is_allowed() {
        let config = JobConfig {
            max_batches_per_chunk: 0,
            ..JobConfig::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: JobConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.read_buffer_size, JobConfig::DEFAULT_READ_BUFFER_SIZE);
        assert_eq!(config.progress.top_n, ProgressConfig::DEFAULT_TOP_N);
    }
}
