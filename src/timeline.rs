//! Block commit: checkpoint, settle, publish
//!
//! [`Timeline`] is the single writer. It owns the running totals, appends
//! checkpoints and swaps the tracker. Every mutating method takes
//! `&mut self`, so commits can never run concurrently with each other or
//! with event application.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::codec::SnapshotCodec;
use crate::core::{AppendOutcome, Block, CheckpointStore, IndexerResult, TrackerError};
use crate::models::PoolEvent;
use crate::recorder::{AggregateRecorder, DepthViolation, SettlementPolicy};
use crate::tracker::{BlockTrack, Tracker};

/// What a commit did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    pub height: u64,
    pub outcome: AppendOutcome,
    /// Snapshot could not be encoded; the row holds no aggregate state
    pub snapshot_omitted: bool,
    pub outbound_settled: usize,
    pub fees_settled: usize,
    pub violations: Vec<DepthViolation>,
}

pub struct Timeline {
    pub(crate) store: Arc<dyn CheckpointStore>,
    pub(crate) codec: SnapshotCodec,
    pub(crate) recorder: AggregateRecorder,
    pub(crate) tracker: Arc<Tracker>,
}

impl Timeline {
    pub fn new(store: Arc<dyn CheckpointStore>, tracker: Arc<Tracker>, policy: SettlementPolicy) -> Self {
        Self {
            store,
            codec: SnapshotCodec::default(),
            recorder: AggregateRecorder::new(policy),
            tracker,
        }
    }

    pub fn with_codec(mut self, codec: SnapshotCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn tracker(&self) -> Arc<Tracker> {
        Arc::clone(&self.tracker)
    }

    pub fn recorder(&self) -> &AggregateRecorder {
        &self.recorder
    }

    /// Apply one decoded event to the running totals
    pub fn apply_event(&mut self, event: &PoolEvent, height: u64, timestamp: DateTime<Utc>) -> Vec<DepthViolation> {
        self.recorder.apply_event(event, height, timestamp)
    }

    /// Apply all events of `block` in order, then commit it
    pub fn apply_block(&mut self, block: &Block) -> IndexerResult<CommitReport> {
        let mut violations = Vec::new();
        for event in &block.events {
            violations.extend(self.recorder.apply_event(event, block.height, block.timestamp));
        }
        let mut report = self.commit(block.height, block.timestamp, &block.hash)?;
        violations.append(&mut report.violations);
        report.violations = violations;
        Ok(report)
    }

    /// Mark `height` as done.
    ///
    /// The pre-drain snapshot is persisted before the deferred queues are
    /// drained, so a crash in between never loses the committed height or
    /// hash. Safe to repeat for a height already recorded.
    pub fn commit(&mut self, height: u64, timestamp: DateTime<Utc>, hash: &[u8]) -> IndexerResult<CommitReport> {
        let current = self.tracker.load().ok_or(TrackerError::Uninitialized)?;

        // in-memory snapshot, copied before anything is shared
        let snapshot = self.recorder.current_snapshot();

        let (encoded, snapshot_omitted) = match self.codec.encode(&snapshot) {
            Ok(bytes) => (bytes, false),
            Err(e) => {
                // height and hash still persist; state recovery from this row is lost
                warn!("Aggregation state omitted from checkpoint {}: {}", height, e);
                (Vec::new(), true)
            }
        };

        let outcome = self.store.append(height, timestamp, hash, &encoded)?;
        if outcome == AppendOutcome::AlreadyExisted {
            info!("Block height {} already committed", height);
        }

        let drained = self.recorder.apply_deferred_queues(height, timestamp);

        if height >= current.height {
            self.tracker.replace(BlockTrack {
                height,
                timestamp,
                hash: hash.to_vec(),
                snapshot,
            })?;
        } else {
            debug!(
                "Tracker kept at height {}; recommit of {} is older",
                current.height, height
            );
        }

        Ok(CommitReport {
            height,
            outcome,
            snapshot_omitted,
            outbound_settled: drained.outbound_settled,
            fees_settled: drained.fees_settled,
            violations: drained.violations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryCheckpointStore;
    use crate::models::{AggregateSnapshot, PoolDepth};
    use crate::recorder::{DepthSide, ViolationKind};
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_600_000_000 + secs, 0).unwrap()
    }

    fn tracking_timeline(store: Arc<InMemoryCheckpointStore>) -> Timeline {
        let tracker = Arc::new(Tracker::new());
        tracker.initialize(BlockTrack::genesis()).unwrap();
        Timeline::new(store, tracker, SettlementPolicy::default())
    }

    #[test]
    fn test_commit_requires_recovery() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let mut timeline = Timeline::new(store.clone(), Arc::new(Tracker::new()), SettlementPolicy::default());

        let err = timeline.commit(1, ts(0), b"h1").unwrap_err();
        assert!(matches!(err, crate::core::IndexerError::Tracker(TrackerError::Uninitialized)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_publishes_pre_drain_snapshot() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let mut timeline = tracking_timeline(store.clone());

        let block = Block::new(1, ts(0), b"h1".to_vec())
            .with_event(PoolEvent::Stake { pool: "BNB.BNB".into(), asset_e8: 100, rune_e8: 100 })
            .with_event(PoolEvent::Unstake { tx: "u1".into(), pool: "BNB.BNB".into(), asset_e8: 10, rune_e8: 10 })
            .with_event(PoolEvent::Outbound { in_tx: "u1".into() });
        let report = timeline.apply_block(&block).unwrap();

        assert_eq!(report.outcome, AppendOutcome::Inserted);
        assert_eq!(report.outbound_settled, 1);

        let expected = AggregateSnapshot::new().with_pool("BNB.BNB", 100, 100);
        let track = timeline.tracker().load().unwrap();
        assert_eq!(track.height, 1);
        assert_eq!(track.snapshot, expected);

        let row = store.checkpoint_at(1).unwrap().unwrap();
        assert_eq!(SnapshotCodec::new().decode(&row.snapshot).unwrap(), expected);

        // the drain lands in the next checkpoint
        timeline.commit(2, ts(5), b"h2").unwrap();
        assert_eq!(
            timeline.tracker().load().unwrap().snapshot,
            AggregateSnapshot::new().with_pool("BNB.BNB", 90, 90)
        );
    }

    #[test]
    fn test_recommit_keeps_newer_tracker() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let mut timeline = tracking_timeline(store);

        timeline.commit(1, ts(0), b"h1").unwrap();
        timeline.commit(2, ts(5), b"h2").unwrap();
        let report = timeline.commit(1, ts(0), b"h1").unwrap();

        assert_eq!(report.outcome, AppendOutcome::AlreadyExisted);
        assert_eq!(timeline.tracker().load().unwrap().height, 2);
    }

    #[test]
    fn test_hash_is_copied() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let mut timeline = tracking_timeline(store);

        let mut hash = b"abc".to_vec();
        timeline.commit(1, ts(0), &hash).unwrap();
        hash[0] = b'z';

        assert_eq!(timeline.tracker().load().unwrap().hash, b"abc");
    }

    #[test]
    fn test_fee_drain_violation_reaches_report() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let mut timeline = tracking_timeline(store);

        let block = Block::new(1, ts(0), b"h1".to_vec())
            .with_event(PoolEvent::Stake { pool: "BNB.BNB".into(), asset_e8: 10, rune_e8: 10 })
            .with_event(PoolEvent::Fee { tx: "f1".into(), pool: "BNB.BNB".into(), pool_deduct_e8: 30 });
        let report = timeline.apply_block(&block).unwrap();
        assert_eq!(report.fees_settled, 0);
        assert!(report.violations.is_empty());

        let report = timeline.apply_block(&Block::new(2, ts(5), b"h2".to_vec())).unwrap();
        assert_eq!(report.fees_settled, 1);
        assert_eq!(
            report.violations,
            vec![DepthViolation {
                pool: "BNB.BNB".into(),
                side: DepthSide::Rune,
                kind: ViolationKind::Negative,
                value: -20,
            }]
        );
        assert_eq!(timeline.recorder().depth("BNB.BNB"), Some(PoolDepth::new(10, -20)));
    }
}
