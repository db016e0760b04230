//! Checkpoint store backends

pub mod memory;
pub mod rocksdb;

pub use self::memory::InMemoryCheckpointStore;
pub use self::rocksdb::{ColumnFamilies, RocksDBCheckpointStore};
