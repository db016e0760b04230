//! Running per-pool depth totals
//!
//! The recorder is owned by the single writer. Readers never see it
//! directly; they get deep copies from [`AggregateRecorder::current_snapshot`]
//! taken between mutations.

mod deferred;

pub use deferred::{DeferredQueues, PendingFee, PendingOutbound, SettlementPolicy};

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

use crate::models::{AggregateSnapshot, PoolDepth, PoolEvent, PoolId, SwapDirection};

/// Side of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthSide {
    Asset,
    Rune,
}

impl fmt::Display for DepthSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepthSide::Asset => write!(f, "asset"),
            DepthSide::Rune => write!(f, "rune"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// The depth went below zero
    Negative,
    /// The delta does not fit in an `i64`; the depth kept its previous value
    Overflow,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::Negative => write!(f, "negative"),
            ViolationKind::Overflow => write!(f, "overflowing"),
        }
    }
}

/// A mutation left a pool depth outside its valid range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthViolation {
    pub pool: PoolId,
    pub side: DepthSide,
    pub kind: ViolationKind,
    pub value: i64,
}

/// What a deferred-queue drain released
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub outbound_settled: usize,
    pub fees_settled: usize,
    pub violations: Vec<DepthViolation>,
}

/// Owner of the mutable running totals
#[derive(Debug, Clone, Default)]
pub struct AggregateRecorder {
    pools: BTreeMap<PoolId, PoolDepth>,
    deferred: DeferredQueues,
    violation_count: u64,
}

impl AggregateRecorder {
    pub fn new(policy: SettlementPolicy) -> Self {
        Self {
            pools: BTreeMap::new(),
            deferred: DeferredQueues::new(policy),
            violation_count: 0,
        }
    }

    /// Replace the running totals with a restored snapshot
    pub fn restore(&mut self, snapshot: &AggregateSnapshot) {
        self.pools.clear();
        for pool in snapshot.pools() {
            if let Some(depth) = snapshot.depth(pool) {
                self.pools.insert(pool.clone(), depth);
            }
        }
    }

    /// Deep copy of the running totals
    pub fn current_snapshot(&self) -> AggregateSnapshot {
        AggregateSnapshot::from_depths(self.pools.iter())
    }

    pub fn depth(&self, pool: &str) -> Option<PoolDepth> {
        self.pools.get(pool).copied()
    }

    pub fn deferred(&self) -> &DeferredQueues {
        &self.deferred
    }

    /// Total number of negative-depth conditions seen
    pub fn violation_count(&self) -> u64 {
        self.violation_count
    }

    /// Apply one decoded event seen at `height`/`timestamp`
    #[must_use = "negative depths must be surfaced"]
    pub fn apply_event(
        &mut self,
        event: &PoolEvent,
        height: u64,
        timestamp: DateTime<Utc>,
    ) -> Vec<DepthViolation> {
        debug!("Applying {} event at height {}", event.kind(), height);

        match event {
            PoolEvent::Stake { pool, asset_e8, rune_e8 }
            | PoolEvent::Add { pool, asset_e8, rune_e8 }
            | PoolEvent::Errata { pool, asset_e8, rune_e8 } => self.adjust(pool, *asset_e8, *rune_e8),
            PoolEvent::Reward { pool, rune_e8 } => self.adjust(pool, 0, *rune_e8),
            PoolEvent::Gas { pool, asset_e8, rune_e8 } => self.adjust(pool, -*asset_e8, *rune_e8),
            PoolEvent::Swap {
                tx,
                pool,
                direction,
                from_e8,
                to_e8,
            } => {
                let (asset_in, rune_in, asset_out, rune_out) = match direction {
                    SwapDirection::RuneToAsset => (0, *from_e8, *to_e8, 0),
                    SwapDirection::AssetToRune => (*from_e8, 0, 0, *to_e8),
                };
                self.deferred.push_outbound(PendingOutbound {
                    in_tx: tx.clone(),
                    pool: pool.clone(),
                    asset_e8: asset_out,
                    rune_e8: rune_out,
                    height,
                    queued_at: timestamp,
                    confirmed: false,
                });
                self.adjust(pool, asset_in, rune_in)
            }
            PoolEvent::Unstake {
                tx,
                pool,
                asset_e8,
                rune_e8,
            } => {
                self.deferred.push_outbound(PendingOutbound {
                    in_tx: tx.clone(),
                    pool: pool.clone(),
                    asset_e8: *asset_e8,
                    rune_e8: *rune_e8,
                    height,
                    queued_at: timestamp,
                    confirmed: false,
                });
                Vec::new()
            }
            PoolEvent::Outbound { in_tx } => {
                if !self.deferred.confirm_outbound(in_tx) {
                    debug!("Outbound for {} has no pending payout", in_tx);
                }
                Vec::new()
            }
            PoolEvent::Fee {
                tx,
                pool,
                pool_deduct_e8,
            } => {
                self.deferred.push_fee(PendingFee {
                    tx: tx.clone(),
                    pool: pool.clone(),
                    pool_deduct_e8: *pool_deduct_e8,
                    height,
                });
                Vec::new()
            }
        }
    }

    /// Settle every queued item whose condition holds at `height`/`timestamp`
    #[must_use = "negative depths must be surfaced"]
    pub fn apply_deferred_queues(&mut self, height: u64, timestamp: DateTime<Utc>) -> DrainReport {
        let mut report = DrainReport::default();

        for outbound in self.deferred.drain_outbound(timestamp) {
            report.outbound_settled += 1;
            let violations = self.adjust(&outbound.pool, -outbound.asset_e8, -outbound.rune_e8);
            report.violations.extend(violations);
        }
        for fee in self.deferred.drain_fees(height) {
            report.fees_settled += 1;
            let violations = self.adjust(&fee.pool, 0, -fee.pool_deduct_e8);
            report.violations.extend(violations);
        }

        if report.outbound_settled + report.fees_settled > 0 {
            debug!(
                "Settled {} outbounds and {} fees at height {}",
                report.outbound_settled, report.fees_settled, height
            );
        }
        report
    }

    fn adjust(&mut self, pool: &str, asset_delta: i64, rune_delta: i64) -> Vec<DepthViolation> {
        let depth = self.pools.entry(pool.to_string()).or_default();

        let mut violations = Vec::new();
        for (side, value, delta) in [
            (DepthSide::Asset, &mut depth.asset_e8, asset_delta),
            (DepthSide::Rune, &mut depth.rune_e8, rune_delta),
        ] {
            if delta == 0 {
                continue;
            }
            let kind = match value.checked_add(delta) {
                Some(next) => {
                    *value = next;
                    if next >= 0 {
                        continue;
                    }
                    ViolationKind::Negative
                }
                None => ViolationKind::Overflow,
            };
            violations.push(DepthViolation {
                pool: pool.to_string(),
                side,
                kind,
                value: *value,
            });
        }
        for violation in &violations {
            warn!(
                "{} {} depth {} in pool {}",
                violation.kind, violation.side, violation.value, violation.pool
            );
        }
        self.violation_count += violations.len() as u64;
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_600_000_000 + secs, 0).unwrap()
    }

    fn stake(pool: &str, asset_e8: i64, rune_e8: i64) -> PoolEvent {
        PoolEvent::Stake {
            pool: pool.to_string(),
            asset_e8,
            rune_e8,
        }
    }

    #[test]
    fn test_immediate_events() {
        let mut recorder = AggregateRecorder::default();
        assert!(recorder.apply_event(&stake("BNB.BNB", 500, 1000), 1, ts(0)).is_empty());
        let events = [
            PoolEvent::Reward { pool: "BNB.BNB".into(), rune_e8: 10 },
            PoolEvent::Gas { pool: "BNB.BNB".into(), asset_e8: 5, rune_e8: 7 },
            PoolEvent::Errata { pool: "BNB.BNB".into(), asset_e8: -1, rune_e8: 3 },
        ];
        for event in &events {
            assert!(recorder.apply_event(event, 1, ts(0)).is_empty());
        }

        assert_eq!(recorder.depth("BNB.BNB"), Some(PoolDepth::new(494, 1020)));
    }

    #[test]
    fn test_snapshot_is_independent_copy() {
        let mut recorder = AggregateRecorder::default();
        let _ = recorder.apply_event(&stake("BNB.BNB", 500, 1000), 1, ts(0));

        let snapshot = recorder.current_snapshot();
        let _ = recorder.apply_event(&stake("BNB.BNB", 1, 1), 2, ts(1));

        assert_eq!(snapshot, AggregateSnapshot::new().with_pool("BNB.BNB", 500, 1000));
        assert_eq!(recorder.depth("BNB.BNB"), Some(PoolDepth::new(501, 1001)));
    }

    #[test]
    fn test_restore_replaces_totals() {
        let mut recorder = AggregateRecorder::default();
        let _ = recorder.apply_event(&stake("BTC.BTC", 1, 1), 1, ts(0));

        let snapshot = AggregateSnapshot::new().with_pool("BNB.BNB", 500, 1000);
        recorder.restore(&snapshot);

        assert_eq!(recorder.current_snapshot(), snapshot);
        assert_eq!(recorder.depth("BTC.BTC"), None);
    }

    #[test]
    fn test_swap_settles_after_outbound() {
        let mut recorder = AggregateRecorder::default();
        let _ = recorder.apply_event(&stake("BNB.BNB", 1000, 1000), 1, ts(0));
        let swap = PoolEvent::Swap {
            tx: "tx1".into(),
            pool: "BNB.BNB".into(),
            direction: SwapDirection::RuneToAsset,
            from_e8: 100,
            to_e8: 90,
        };
        assert!(recorder.apply_event(&swap, 2, ts(5)).is_empty());
        assert_eq!(recorder.depth("BNB.BNB"), Some(PoolDepth::new(1000, 1100)));

        let report = recorder.apply_deferred_queues(2, ts(5));
        assert_eq!(report.outbound_settled, 0);

        let _ = recorder.apply_event(&PoolEvent::Outbound { in_tx: "tx1".into() }, 3, ts(10));
        let report = recorder.apply_deferred_queues(3, ts(10));
        assert_eq!(report.outbound_settled, 1);
        assert_eq!(recorder.depth("BNB.BNB"), Some(PoolDepth::new(910, 1100)));

        // applied exactly once
        let report = recorder.apply_deferred_queues(4, ts(15));
        assert_eq!(report, DrainReport::default());
        assert_eq!(recorder.depth("BNB.BNB"), Some(PoolDepth::new(910, 1100)));
    }

    #[test]
    fn test_unstake_settles_on_timeout() {
        let mut recorder = AggregateRecorder::new(SettlementPolicy::default());
        let _ = recorder.apply_event(&stake("BNB.BNB", 100, 100), 1, ts(0));
        let unstake = PoolEvent::Unstake {
            tx: "tx2".into(),
            pool: "BNB.BNB".into(),
            asset_e8: 40,
            rune_e8: 60,
        };
        let _ = recorder.apply_event(&unstake, 2, ts(0));

        assert_eq!(recorder.apply_deferred_queues(3, ts(60)).outbound_settled, 0);
        let late = ts(0) + Duration::hours(1);
        assert_eq!(recorder.apply_deferred_queues(4, late).outbound_settled, 1);
        assert_eq!(recorder.depth("BNB.BNB"), Some(PoolDepth::new(60, 40)));
    }

    #[test]
    fn test_fee_deduction() {
        let mut recorder = AggregateRecorder::default();
        let _ = recorder.apply_event(&stake("BNB.BNB", 100, 100), 1, ts(0));
        let fee = PoolEvent::Fee {
            tx: "tx3".into(),
            pool: "BNB.BNB".into(),
            pool_deduct_e8: 30,
        };
        let _ = recorder.apply_event(&fee, 5, ts(0));

        assert_eq!(recorder.apply_deferred_queues(5, ts(0)).fees_settled, 0);
        assert_eq!(recorder.apply_deferred_queues(6, ts(5)).fees_settled, 1);
        assert_eq!(recorder.depth("BNB.BNB"), Some(PoolDepth::new(100, 70)));
    }

    #[test]
    fn test_negative_depth_is_reported_not_clamped() {
        let mut recorder = AggregateRecorder::default();
        let gas = PoolEvent::Gas {
            pool: "ETH.ETH".into(),
            asset_e8: 5,
            rune_e8: 5,
        };

        let violations = recorder.apply_event(&gas, 1, ts(0));
        assert_eq!(
            violations,
            vec![DepthViolation {
                pool: "ETH.ETH".into(),
                side: DepthSide::Asset,
                kind: ViolationKind::Negative,
                value: -5,
            }]
        );
        assert_eq!(recorder.depth("ETH.ETH"), Some(PoolDepth::new(-5, 5)));
        assert_eq!(recorder.violation_count(), 1);
        assert_eq!(recorder.current_snapshot().negative_pools(), vec!["ETH.ETH"]);
    }

    #[test]
    fn test_overflow_is_reported_not_saturated() {
        let mut recorder = AggregateRecorder::default();
        let _ = recorder.apply_event(&stake("BTC.BTC", i64::MAX - 1, 10), 1, ts(0));

        let violations = recorder.apply_event(&stake("BTC.BTC", 5, 1), 2, ts(1));
        assert_eq!(
            violations,
            vec![DepthViolation {
                pool: "BTC.BTC".into(),
                side: DepthSide::Asset,
                kind: ViolationKind::Overflow,
                value: i64::MAX - 1,
            }]
        );
        assert_eq!(recorder.depth("BTC.BTC"), Some(PoolDepth::new(i64::MAX - 1, 11)));
        assert_eq!(recorder.violation_count(), 1);
    }
}
