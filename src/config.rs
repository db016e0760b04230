//! Configuration management for the depth indexer

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

use crate::core::{IndexerError, IndexerResult, StorageError};
use crate::recorder::SettlementPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct IndexerConfig {
    #[validate]
    pub storage: StorageConfig,
    #[validate]
    pub follower: FollowerConfig,
    #[validate]
    pub settlement: SettlementConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    #[validate]
    pub rocksdb: RocksDBConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct RocksDBConfig {
    pub path: PathBuf,
    pub enable_compression: bool,
    #[validate(range(min = 100, max = 10000))]
    pub max_open_files: i32,
    #[validate(range(min = 1, max = 2048))]
    pub write_buffer_size_mb: usize,
    #[validate(range(min = 2, max = 16))]
    pub max_write_buffer_number: i32,
    #[validate(range(min = 8, max = 4096))]
    pub block_cache_size_mb: usize,
    /// fsync every checkpoint append
    pub sync_writes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct FollowerConfig {
    /// Wait between attempts after no data or a failure
    #[validate(range(min = 1, max = 300))]
    pub backoff_secs: u64,
    /// Consecutive failures tolerated before giving up; unbounded when unset
    #[validate(range(min = 1))]
    pub max_retries: Option<u32>,
    /// Most blocks requested per span
    #[validate(range(min = 1, max = 10000))]
    pub span_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct SettlementConfig {
    /// Age after which an unconfirmed outbound settles anyway
    #[validate(range(min = 1, max = 86400))]
    pub outbound_timeout_secs: u64,
    /// Heights a fee deduction waits before it settles
    #[validate(range(max = 1000))]
    pub fee_settlement_blocks: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitoringConfig {
    pub log_level: String,
    pub structured_logging: bool,
    /// Interval of the depth status report, 0 disables it
    pub status_interval_secs: u64,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            path: "./data/checkpoints".into(),
            enable_compression: true,
            max_open_files: 1000,
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            block_cache_size_mb: 128,
            sync_writes: true,
        }
    }
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            backoff_secs: 7,
            max_retries: None,
            span_limit: 100,
        }
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            outbound_timeout_secs: 3600,
            fee_settlement_blocks: 1,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            structured_logging: false,
            status_interval_secs: 30,
        }
    }
}

impl FollowerConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

impl SettlementConfig {
    pub fn policy(&self) -> SettlementPolicy {
        SettlementPolicy {
            outbound_timeout: chrono::Duration::seconds(self.outbound_timeout_secs as i64),
            fee_settlement_blocks: self.fee_settlement_blocks,
        }
    }
}

impl IndexerConfig {
    /// Load configuration from file
    pub fn from_file(path: &str) -> IndexerResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| IndexerError::Configuration(format!("{}: {}", path, e)))?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> IndexerResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| IndexerError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Ensure required directories exist
    pub fn ensure_directories(&self) -> IndexerResult<()> {
        let path = &self.storage.rocksdb.path;
        std::fs::create_dir_all(path)
            .map_err(|e| StorageError::Unavailable(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }

    /// Validate field ranges and cross-field rules
    pub fn validate(&self) -> IndexerResult<()> {
        Validate::validate(self).map_err(|e| IndexerError::Configuration(e.to_string()))?;
        if self.storage.rocksdb.path.as_os_str().is_empty() {
            return Err(IndexerError::Configuration("RocksDB path cannot be empty".to_string()));
        }
        if self.monitoring.log_level.parse::<tracing::Level>().is_err() {
            return Err(IndexerError::Configuration(format!(
                "Unknown log level: {}",
                self.monitoring.log_level
            )));
        }
        Ok(())
    }
}
