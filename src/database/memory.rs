//! In-memory checkpoint store for tests and dry runs

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::core::{AppendOutcome, BlockCheckpoint, CheckpointStore, IndexerResult, StorageError};

/// Checkpoint log held in a `BTreeMap`; lost on drop
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    rows: Mutex<BTreeMap<u64, BlockCheckpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn rows(&self) -> IndexerResult<MutexGuard<'_, BTreeMap<u64, BlockCheckpoint>>> {
        self.rows
            .lock()
            .map_err(|_| StorageError::Unavailable("in-memory store poisoned".to_string()).into())
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn append(
        &self,
        height: u64,
        timestamp: DateTime<Utc>,
        hash: &[u8],
        snapshot: &[u8],
    ) -> IndexerResult<AppendOutcome> {
        let mut rows = self.rows()?;
        if rows.contains_key(&height) {
            return Ok(AppendOutcome::AlreadyExisted);
        }
        rows.insert(
            height,
            BlockCheckpoint {
                height,
                timestamp,
                hash: hash.to_vec(),
                snapshot: snapshot.to_vec(),
            },
        );
        Ok(AppendOutcome::Inserted)
    }

    fn latest_checkpoint(&self) -> IndexerResult<Option<BlockCheckpoint>> {
        Ok(self.rows()?.values().next_back().cloned())
    }

    fn list_heights(&self) -> IndexerResult<Vec<u64>> {
        Ok(self.rows()?.keys().copied().collect())
    }

    fn checkpoint_at(&self, height: u64) -> IndexerResult<Option<BlockCheckpoint>> {
        Ok(self.rows()?.get(&height).cloned())
    }
}
