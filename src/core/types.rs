//! Core domain types

use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

use crate::models::PoolEvent;

/// Block as delivered by the block source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub height: u64,
    pub timestamp: DateTime<Utc>,
    pub hash: Vec<u8>,
    pub events: Vec<PoolEvent>,
}

impl Block {
    pub fn new(height: u64, timestamp: DateTime<Utc>, hash: Vec<u8>) -> Self {
        Self {
            height,
            timestamp,
            hash,
            events: Vec::new(),
        }
    }

    pub fn with_event(mut self, event: PoolEvent) -> Self {
        self.events.push(event);
        self
    }
}

/// Contiguous run of blocks starting at the requested cursor
#[derive(Debug, Clone, Default)]
pub struct BlockSpan {
    pub blocks: Vec<Block>,
    pub next_cursor: u64,
}

/// Durable checkpoint row: one per height, immutable once written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockCheckpoint {
    pub height: u64,
    pub timestamp: DateTime<Utc>,
    pub hash: Vec<u8>,
    /// Encoded snapshot; empty when encoding failed at write time
    pub snapshot: Vec<u8>,
}

/// Outcome of an idempotent checkpoint append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted,
    AlreadyExisted,
}

impl fmt::Display for AppendOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppendOutcome::Inserted => write!(f, "inserted"),
            AppendOutcome::AlreadyExisted => write!(f, "already existed"),
        }
    }
}

/// Nanoseconds since the Unix epoch, `None` outside the representable range
pub fn unix_nanos(timestamp: &DateTime<Utc>) -> Option<i64> {
    timestamp.timestamp_nanos_opt()
}

pub fn from_unix_nanos(nanos: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(nanos)
}
