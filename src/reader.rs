//! Read-side queries over the last committed block
//!
//! Readers go through the [`Tracker`] only. Every query loads one
//! immutable [`BlockTrack`], so the height, timestamp and depths it
//! returns always belong to the same commit.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::models::{AggregateSnapshot, PoolDepth};
use crate::tracker::{BlockTrack, Tracker};

/// Height, timestamp and hash of the last committed block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastBlock {
    pub height: u64,
    pub timestamp: DateTime<Utc>,
    pub hash: Vec<u8>,
}

/// All pool depths as of one committed block
#[derive(Debug, Clone)]
pub struct DepthsView {
    track: Arc<BlockTrack>,
}

impl DepthsView {
    pub fn height(&self) -> u64 {
        self.track.height
    }

    pub fn as_of(&self) -> DateTime<Utc> {
        self.track.timestamp
    }

    pub fn snapshot(&self) -> &AggregateSnapshot {
        &self.track.snapshot
    }

    pub fn pool(&self, pool: &str) -> Option<PoolDepth> {
        self.track.snapshot.depth(pool)
    }
}

#[derive(Debug, Clone)]
pub struct DepthReader {
    tracker: Arc<Tracker>,
}

impl DepthReader {
    pub fn new(tracker: Arc<Tracker>) -> Self {
        Self { tracker }
    }

    /// `None` until recovery has run
    pub fn last_block(&self) -> Option<LastBlock> {
        self.tracker.load().map(|track| LastBlock {
            height: track.height,
            timestamp: track.timestamp,
            hash: track.hash.clone(),
        })
    }

    pub fn asset_and_rune_depths(&self) -> Option<DepthsView> {
        self.tracker.load().map(|track| DepthsView { track })
    }

    /// Asset price in rune of `pool` at the last committed block
    pub fn pool_price(&self, pool: &str) -> Option<f64> {
        self.tracker.load()?.snapshot.depth(pool)?.price()
    }
}
