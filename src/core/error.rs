//! Centralized error types for the depth indexer

use thiserror::Error;

/// Main indexer error type
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Snapshot codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Block source error: {0}")]
    Source(#[from] SourceError),

    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("Recovery denied at height {height}: {reason}")]
    Recovery { height: u64, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("RocksDB error: {0}")]
    RocksDB(String),

    #[error("Column family not found: {0}")]
    ColumnFamilyMissing(String),

    #[error("Corrupt checkpoint key of {0} bytes")]
    CorruptKey(usize),

    #[error("Corrupt checkpoint row at height {height}: {reason}")]
    CorruptRow { height: u64, reason: String },

    #[error("Timestamp out of range for height {0}")]
    TimestampRange(u64),

    #[error("Checkpoint store unavailable: {0}")]
    Unavailable(String),
}

/// Snapshot encoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Snapshot header magic mismatch")]
    BadMagic,

    #[error("Unsupported snapshot version {0}")]
    UnsupportedVersion(u8),

    #[error("Snapshot truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Snapshot field {tag} payload: {reason}")]
    Payload { tag: u8, reason: String },

    #[error("Snapshot field {tag} of {len} bytes exceeds limit of {limit}")]
    FieldTooLarge { tag: u8, len: usize, limit: usize },
}

/// Block source errors, as surfaced to the follower loop
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The chain has nothing past the requested cursor yet
    #[error("No block data available yet")]
    NoData,

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Block span gap: expected height {expected}, got {got}")]
    Gap { expected: u64, got: u64 },

    #[error("Retry ceiling reached after {0} consecutive failures")]
    RetriesExhausted(u32),
}

/// Tracker state machine violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error("Tracker already initialized")]
    AlreadyInitialized,

    #[error("Tracker not initialized; run recovery first")]
    Uninitialized,
}

/// Result type alias for indexer operations
pub type IndexerResult<T> = Result<T, IndexerError>;

/// Helper to convert rocksdb errors
impl From<rocksdb::Error> for IndexerError {
    fn from(err: rocksdb::Error) -> Self {
        IndexerError::Storage(StorageError::RocksDB(err.to_string()))
    }
}

impl From<rocksdb::Error> for StorageError {
    fn from(err: rocksdb::Error) -> Self {
        StorageError::RocksDB(err.to_string())
    }
}

impl IndexerError {
    /// Whether the follower may retry after this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IndexerError::Source(SourceError::NoData)
                | IndexerError::Source(SourceError::Transport(_))
                | IndexerError::Source(SourceError::Gap { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(IndexerError::from(SourceError::NoData).is_retryable());
        assert!(IndexerError::from(SourceError::Transport("reset".into())).is_retryable());
        assert!(IndexerError::from(SourceError::Gap { expected: 3, got: 5 }).is_retryable());
        assert!(!IndexerError::from(SourceError::RetriesExhausted(4)).is_retryable());
        assert!(!IndexerError::from(StorageError::Unavailable("down".into())).is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = IndexerError::Recovery { height: 7, reason: "bad magic".into() };
        assert_eq!(err.to_string(), "Recovery denied at height 7: bad magic");

        let err = CodecError::Truncated { needed: 9, available: 4 };
        assert_eq!(err.to_string(), "Snapshot truncated: needed 9 bytes, 4 available");
    }
}
