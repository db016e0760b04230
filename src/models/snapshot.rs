//! Aggregate snapshot model

use std::collections::BTreeMap;

/// Pool identifier, the asset symbol (e.g. `BNB.BNB`)
pub type PoolId = String;

/// Depth pair of a single pool, in 1e-8 units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolDepth {
    pub asset_e8: i64,
    pub rune_e8: i64,
}

impl PoolDepth {
    pub fn new(asset_e8: i64, rune_e8: i64) -> Self {
        Self { asset_e8, rune_e8 }
    }

    /// Asset price in rune, `None` while the pool holds no rune
    pub fn price(&self) -> Option<f64> {
        if self.rune_e8 == 0 {
            return None;
        }
        Some(self.asset_e8 as f64 / self.rune_e8 as f64)
    }
}

/// Point-in-time copy of all per-pool running totals.
///
/// Both maps share the pool key domain. A pool present in one map and
/// absent from the other reads as zero on the missing side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateSnapshot {
    pub asset_depth: BTreeMap<PoolId, i64>,
    pub rune_depth: BTreeMap<PoolId, i64>,
}

impl AggregateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from per-pool depth pairs
    pub fn from_depths<'a, I>(depths: I) -> Self
    where
        I: IntoIterator<Item = (&'a PoolId, &'a PoolDepth)>,
    {
        let mut snapshot = Self::default();
        for (pool, depth) in depths {
            snapshot.asset_depth.insert(pool.clone(), depth.asset_e8);
            snapshot.rune_depth.insert(pool.clone(), depth.rune_e8);
        }
        snapshot
    }

    pub fn with_pool(mut self, pool: &str, asset_e8: i64, rune_e8: i64) -> Self {
        self.asset_depth.insert(pool.to_string(), asset_e8);
        self.rune_depth.insert(pool.to_string(), rune_e8);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.asset_depth.is_empty() && self.rune_depth.is_empty()
    }

    /// All pool identifiers, in order
    pub fn pools(&self) -> Vec<&PoolId> {
        let mut pools: Vec<&PoolId> = self.asset_depth.keys().chain(self.rune_depth.keys()).collect();
        pools.sort();
        pools.dedup();
        pools
    }

    pub fn depth(&self, pool: &str) -> Option<PoolDepth> {
        let asset = self.asset_depth.get(pool);
        let rune = self.rune_depth.get(pool);
        if asset.is_none() && rune.is_none() {
            return None;
        }
        Some(PoolDepth {
            asset_e8: asset.copied().unwrap_or(0),
            rune_e8: rune.copied().unwrap_or(0),
        })
    }

    /// Pools holding a negative depth on either side
    pub fn negative_pools(&self) -> Vec<&PoolId> {
        self.pools()
            .into_iter()
            .filter(|pool| {
                self.asset_depth.get(*pool).is_some_and(|v| *v < 0)
                    || self.rune_depth.get(*pool).is_some_and(|v| *v < 0)
            })
            .collect()
    }
}
