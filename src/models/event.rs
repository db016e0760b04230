//! Decoded pool events as delivered by the block source

use super::snapshot::PoolId;

/// Direction of a swap relative to the rune side of the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDirection {
    RuneToAsset,
    AssetToRune,
}

/// One decoded chain event with an effect on pool depths.
///
/// Amounts are in 1e-8 units. Events that pay out of a pool (unstake,
/// swap output, fee deduction) only take effect once settled through the
/// deferred queues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    Stake {
        pool: PoolId,
        asset_e8: i64,
        rune_e8: i64,
    },
    Add {
        pool: PoolId,
        asset_e8: i64,
        rune_e8: i64,
    },
    Reward {
        pool: PoolId,
        rune_e8: i64,
    },
    /// Gas paid in asset, reimbursed in rune
    Gas {
        pool: PoolId,
        asset_e8: i64,
        rune_e8: i64,
    },
    /// Signed correction of both sides
    Errata {
        pool: PoolId,
        asset_e8: i64,
        rune_e8: i64,
    },
    Swap {
        tx: String,
        pool: PoolId,
        direction: SwapDirection,
        from_e8: i64,
        to_e8: i64,
    },
    Unstake {
        tx: String,
        pool: PoolId,
        asset_e8: i64,
        rune_e8: i64,
    },
    /// Chain confirmation of the payout triggered by `in_tx`
    Outbound {
        in_tx: String,
    },
    Fee {
        tx: String,
        pool: PoolId,
        pool_deduct_e8: i64,
    },
}

impl PoolEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            PoolEvent::Stake { .. } => "stake",
            PoolEvent::Add { .. } => "add",
            PoolEvent::Reward { .. } => "reward",
            PoolEvent::Gas { .. } => "gas",
            PoolEvent::Errata { .. } => "errata",
            PoolEvent::Swap { .. } => "swap",
            PoolEvent::Unstake { .. } => "unstake",
            PoolEvent::Outbound { .. } => "outbound",
            PoolEvent::Fee { .. } => "fee",
        }
    }
}
