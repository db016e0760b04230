//! Chain-tip liveness
//!
//! The follower is considered in sync when the block source recently
//! reported that it has nothing past our cursor. Each such report is
//! stamped here; readers compare the last stamp against twice the backoff.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use crate::core::types::{from_unix_nanos, unix_nanos};

const NEVER: i64 = i64::MIN;

#[derive(Debug)]
pub struct SyncStatus {
    last_empty_nanos: AtomicI64,
    backoff: Duration,
}

impl SyncStatus {
    pub fn new(backoff: Duration) -> Self {
        Self {
            last_empty_nanos: AtomicI64::new(NEVER),
            backoff,
        }
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Record a no-data observation at `now`
    pub fn record_empty(&self, now: DateTime<Utc>) {
        if let Some(nanos) = unix_nanos(&now) {
            self.last_empty_nanos.store(nanos, Ordering::Release);
        }
    }

    /// Last no-data observation, if any
    pub fn last_empty(&self) -> Option<DateTime<Utc>> {
        match self.last_empty_nanos.load(Ordering::Acquire) {
            NEVER => None,
            nanos => Some(from_unix_nanos(nanos)),
        }
    }

    /// Whether a no-data observation happened less than two backoffs before `now`
    pub fn in_sync_at(&self, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_empty() else {
            return false;
        };
        let window_ms = self.backoff.as_millis().saturating_mul(2).min(i64::MAX as u128) as i64;
        let window = chrono::Duration::milliseconds(window_ms);
        now.signed_duration_since(last) < window
    }

    pub fn in_sync(&self) -> bool {
        self.in_sync_at(Utc::now())
    }
}
