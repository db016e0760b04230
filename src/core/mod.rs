//! Core domain abstractions and types
//!
//! Foundational types, ports and error definitions shared by the storage,
//! aggregation and follower layers. Independent of any specific backend.

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items
pub use error::{CodecError, IndexerError, IndexerResult, SourceError, StorageError, TrackerError};
pub use traits::{BlockSource, CheckpointStore};
pub use types::{AppendOutcome, Block, BlockCheckpoint, BlockSpan};
