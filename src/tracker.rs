//! Last committed state, shared lock-free with readers
//!
//! The tracker holds an immutable [`BlockTrack`] behind an atomically
//! swapped pointer. The writer replaces the whole value on every commit;
//! readers load an `Arc` and keep a self-consistent height, timestamp,
//! hash and depth set for as long as they hold it.

use arc_swap::ArcSwapOption;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

use crate::core::TrackerError;
use crate::models::AggregateSnapshot;

/// One committed block position with its pre-drain aggregate state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTrack {
    pub height: u64,
    pub timestamp: DateTime<Utc>,
    pub hash: Vec<u8>,
    pub snapshot: AggregateSnapshot,
}

impl BlockTrack {
    /// State before any block: height 0, empty depths
    pub fn genesis() -> Self {
        Self {
            height: 0,
            timestamp: Utc.timestamp_nanos(0),
            hash: Vec::new(),
            snapshot: AggregateSnapshot::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Uninitialized,
    Tracking,
}

#[derive(Debug, Default)]
pub struct Tracker {
    current: ArcSwapOption<BlockTrack>,
}

impl Tracker {
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
        }
    }

    pub fn state(&self) -> TrackerState {
        if self.current.load().is_some() {
            TrackerState::Tracking
        } else {
            TrackerState::Uninitialized
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.state() == TrackerState::Tracking
    }

    /// Uninitialized -> Tracking; recovery calls this exactly once
    pub fn initialize(&self, track: BlockTrack) -> Result<Arc<BlockTrack>, TrackerError> {
        if self.is_tracking() {
            return Err(TrackerError::AlreadyInitialized);
        }
        let track = Arc::new(track);
        self.current.store(Some(Arc::clone(&track)));
        Ok(track)
    }

    /// Tracking -> Tracking; swaps in a new value wholesale
    pub fn replace(&self, track: BlockTrack) -> Result<Arc<BlockTrack>, TrackerError> {
        if !self.is_tracking() {
            return Err(TrackerError::Uninitialized);
        }
        let track = Arc::new(track);
        self.current.store(Some(Arc::clone(&track)));
        Ok(track)
    }

    /// Current committed state, `None` before recovery
    pub fn load(&self) -> Option<Arc<BlockTrack>> {
        self.current.load_full()
    }
}
