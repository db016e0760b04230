//! RocksDB checkpoint log

use chrono::{DateTime, Utc};
use rocksdb::{BlockBasedOptions, Cache, ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteOptions, DB};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RocksDBConfig;
use crate::core::types::{from_unix_nanos, unix_nanos};
use crate::core::{AppendOutcome, BlockCheckpoint, CheckpointStore, IndexerError, IndexerResult, StorageError};

/// Column family names
pub struct ColumnFamilies;

impl ColumnFamilies {
    pub const BLOCK_LOG: &'static str = "block_log";

    /// Get all column family names
    pub fn all() -> Vec<&'static str> {
        vec![Self::BLOCK_LOG]
    }
}

/// Row value; the height lives in the key
#[derive(Debug, Serialize, Deserialize)]
struct StoredCheckpoint {
    timestamp_nanos: i64,
    hash: Vec<u8>,
    snapshot: Vec<u8>,
}

/// Big-endian keys keep iteration order equal to height order
fn height_key(height: u64) -> [u8; 8] {
    height.to_be_bytes()
}

fn key_height(key: &[u8]) -> IndexerResult<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| StorageError::CorruptKey(key.len()))?;
    Ok(u64::from_be_bytes(bytes))
}

/// Durable checkpoint store backed by a RocksDB column family
pub struct RocksDBCheckpointStore {
    db: DB,
    sync_writes: bool,
}

impl RocksDBCheckpointStore {
    /// Open RocksDB with the specified configuration
    pub fn open(config: &RocksDBConfig) -> IndexerResult<Self> {
        let path = &config.path;

        // Create directory if it doesn't exist
        if !path.exists() {
            std::fs::create_dir_all(path)
                .map_err(|e| StorageError::Unavailable(format!("{}: {}", path.display(), e)))?;
        }

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(config.max_open_files);
        opts.set_write_buffer_size(config.write_buffer_size_mb * 1024 * 1024);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);

        if config.enable_compression {
            opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        }

        let cache = Cache::new_lru_cache(config.block_cache_size_mb * 1024 * 1024);
        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_block_cache(&cache);
        opts.set_block_based_table_factory(&block_opts);

        let cfs: Vec<ColumnFamilyDescriptor> = ColumnFamilies::all()
            .into_iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_max_write_buffer_number(config.max_write_buffer_number);
                ColumnFamilyDescriptor::new(name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        info!("Checkpoint log opened at: {:?}", path);

        Ok(Self {
            db,
            sync_writes: config.sync_writes,
        })
    }

    fn block_log(&self) -> IndexerResult<&ColumnFamily> {
        self.db
            .cf_handle(ColumnFamilies::BLOCK_LOG)
            .ok_or_else(|| StorageError::ColumnFamilyMissing(ColumnFamilies::BLOCK_LOG.to_string()).into())
    }

    fn decode_row(height: u64, value: &[u8]) -> IndexerResult<BlockCheckpoint> {
        let stored: StoredCheckpoint = bincode::deserialize(value).map_err(|e| StorageError::CorruptRow {
            height,
            reason: e.to_string(),
        })?;
        Ok(BlockCheckpoint {
            height,
            timestamp: from_unix_nanos(stored.timestamp_nanos),
            hash: stored.hash,
            snapshot: stored.snapshot,
        })
    }

    /// Check if database is healthy (can perform basic operations)
    pub fn health_check(&self) -> IndexerResult<()> {
        self.db.property_value("rocksdb.stats")?;
        Ok(())
    }

    /// Flush memtables to disk
    pub fn flush(&self) -> IndexerResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl CheckpointStore for RocksDBCheckpointStore {
    fn append(
        &self,
        height: u64,
        timestamp: DateTime<Utc>,
        hash: &[u8],
        snapshot: &[u8],
    ) -> IndexerResult<AppendOutcome> {
        let cf = self.block_log()?;
        let key = height_key(height);

        // single writer: no race between the probe and the put
        if self.db.get_pinned_cf(cf, key)?.is_some() {
            return Ok(AppendOutcome::AlreadyExisted);
        }

        let row = StoredCheckpoint {
            timestamp_nanos: unix_nanos(&timestamp).ok_or(StorageError::TimestampRange(height))?,
            hash: hash.to_vec(),
            snapshot: snapshot.to_vec(),
        };
        let value = bincode::serialize(&row).map_err(|e| StorageError::CorruptRow {
            height,
            reason: e.to_string(),
        })?;

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        self.db.put_cf_opt(cf, key, value, &write_opts)?;

        debug!("Appended checkpoint at height {}: {} snapshot bytes", height, snapshot.len());

        Ok(AppendOutcome::Inserted)
    }

    fn latest_checkpoint(&self) -> IndexerResult<Option<BlockCheckpoint>> {
        let cf = self.block_log()?;
        match self.db.iterator_cf(cf, IteratorMode::End).next() {
            Some(item) => {
                let (key, value) = item.map_err(IndexerError::from)?;
                let height = key_height(&key)?;
                Ok(Some(Self::decode_row(height, &value)?))
            }
            None => Ok(None),
        }
    }

    fn list_heights(&self) -> IndexerResult<Vec<u64>> {
        let cf = self.block_log()?;
        let mut heights = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item.map_err(IndexerError::from)?;
            heights.push(key_height(&key)?);
        }
        Ok(heights)
    }

    fn checkpoint_at(&self, height: u64) -> IndexerResult<Option<BlockCheckpoint>> {
        let cf = self.block_log()?;
        match self.db.get_pinned_cf(cf, height_key(height))? {
            Some(value) => Ok(Some(Self::decode_row(height, &value)?)),
            None => Ok(None),
        }
    }
}
