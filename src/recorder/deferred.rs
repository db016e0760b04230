//! Deferred settlement queues
//!
//! Payouts out of a pool become final only some time after the triggering
//! transaction. They wait here in arrival order and are released strictly
//! FIFO: a head item that is not yet settled holds back everything behind
//! it, so each item is applied exactly once and in order.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

use crate::models::PoolId;

/// When buffered effects become final
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementPolicy {
    /// Unconfirmed outbounds settle once this old
    pub outbound_timeout: Duration,
    /// Fee deductions settle once this many heights have passed
    pub fee_settlement_blocks: u64,
}

impl Default for SettlementPolicy {
    fn default() -> Self {
        Self {
            outbound_timeout: Duration::hours(1),
            fee_settlement_blocks: 1,
        }
    }
}

/// Pending payout of an unstake or swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOutbound {
    pub in_tx: String,
    pub pool: PoolId,
    pub asset_e8: i64,
    pub rune_e8: i64,
    pub height: u64,
    pub queued_at: DateTime<Utc>,
    pub confirmed: bool,
}

/// Pending fee deduction from a pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFee {
    pub tx: String,
    pub pool: PoolId,
    pub pool_deduct_e8: i64,
    pub height: u64,
}

#[derive(Debug, Clone, Default)]
pub struct DeferredQueues {
    policy: SettlementPolicy,
    outbound: VecDeque<PendingOutbound>,
    fees: VecDeque<PendingFee>,
}

impl DeferredQueues {
    pub fn new(policy: SettlementPolicy) -> Self {
        Self {
            policy,
            outbound: VecDeque::new(),
            fees: VecDeque::new(),
        }
    }

    pub fn policy(&self) -> &SettlementPolicy {
        &self.policy
    }

    pub fn push_outbound(&mut self, item: PendingOutbound) {
        self.outbound.push_back(item);
    }

    pub fn push_fee(&mut self, item: PendingFee) {
        self.fees.push_back(item);
    }

    /// Mark the oldest unconfirmed outbound of `in_tx` as confirmed
    pub fn confirm_outbound(&mut self, in_tx: &str) -> bool {
        match self
            .outbound
            .iter_mut()
            .find(|item| !item.confirmed && item.in_tx == in_tx)
        {
            Some(item) => {
                item.confirmed = true;
                true
            }
            None => false,
        }
    }

    /// Release settled outbounds from the head of the queue
    pub fn drain_outbound(&mut self, now: DateTime<Utc>) -> Vec<PendingOutbound> {
        let mut settled = Vec::new();
        while let Some(head) = self.outbound.front() {
            let aged = now.signed_duration_since(head.queued_at) >= self.policy.outbound_timeout;
            if !(head.confirmed || aged) {
                break;
            }
            if let Some(item) = self.outbound.pop_front() {
                settled.push(item);
            }
        }
        settled
    }

    /// Release settled fee deductions from the head of the queue
    pub fn drain_fees(&mut self, height: u64) -> Vec<PendingFee> {
        let mut settled = Vec::new();
        while let Some(head) = self.fees.front() {
            if height.saturating_sub(head.height) < self.policy.fee_settlement_blocks {
                break;
            }
            if let Some(item) = self.fees.pop_front() {
                settled.push(item);
            }
        }
        settled
    }

    pub fn pending_outbound(&self) -> usize {
        self.outbound.len()
    }

    pub fn pending_fees(&self) -> usize {
        self.fees.len()
    }
}
