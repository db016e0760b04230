//! Data models for pool depth tracking

pub mod event;
pub mod snapshot;

pub use event::{PoolEvent, SwapDirection};
pub use snapshot::{AggregateSnapshot, PoolDepth, PoolId};
