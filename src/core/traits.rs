//! Core trait abstractions (ports)

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::{IndexerResult, SourceError};
use super::types::{AppendOutcome, BlockCheckpoint, BlockSpan};

/// Append-only checkpoint log, keyed by block height.
///
/// Calls come from the single writer only, so implementations need no
/// coordination between `append` and the queries.
pub trait CheckpointStore: Send + Sync {
    /// Insert-or-ignore on height; an existing row is never touched
    fn append(
        &self,
        height: u64,
        timestamp: DateTime<Utc>,
        hash: &[u8],
        snapshot: &[u8],
    ) -> IndexerResult<AppendOutcome>;

    /// Row with the maximum height, if any
    fn latest_checkpoint(&self) -> IndexerResult<Option<BlockCheckpoint>>;

    /// All recorded heights in ascending order
    fn list_heights(&self) -> IndexerResult<Vec<u64>>;

    /// Row at exactly `height`
    fn checkpoint_at(&self, height: u64) -> IndexerResult<Option<BlockCheckpoint>>;
}

/// Producer of ordered blocks with a resumable cursor
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Fetch up to `limit` contiguous blocks starting at `cursor`.
    ///
    /// Reports [`SourceError::NoData`] when the chain has nothing past the
    /// cursor yet.
    async fn fetch_span(&self, cursor: u64, limit: usize) -> Result<BlockSpan, SourceError>;
}
