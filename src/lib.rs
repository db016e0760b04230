//! Pool Depth Indexer Library
//!
//! Follows a chain of pool events, keeps per-pool asset and rune depth
//! totals, and persists one checkpoint per block in RocksDB so the totals
//! survive restarts. Readers query the last committed block lock-free.

pub mod codec;
pub mod config;
pub mod core;
pub mod database;
pub mod follower;
pub mod models;
pub mod reader;
pub mod recorder;
pub mod recovery;
pub mod timeline;
pub mod tracker;

// Re-export commonly used types
pub use crate::codec::SnapshotCodec;
pub use crate::config::IndexerConfig;
pub use crate::core::{IndexerError, IndexerResult};
pub use crate::follower::{Follower, StepOutcome, SyncStatus};
pub use crate::reader::{DepthReader, DepthsView, LastBlock};
pub use crate::recovery::Recovered;
pub use crate::timeline::{CommitReport, Timeline};
pub use crate::tracker::{BlockTrack, Tracker};
