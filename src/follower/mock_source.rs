//! In-process block sources for testing and development

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::core::{Block, BlockSource, BlockSpan, SourceError};
use crate::models::{PoolEvent, SwapDirection};

/// Block source that replays a fixed list of responses.
///
/// Once the script runs out every fetch reports [`SourceError::NoData`].
/// Requested cursors are recorded so tests can assert on resume points.
#[derive(Debug, Default)]
pub struct ScriptedBlockSource {
    responses: Mutex<VecDeque<Result<BlockSpan, SourceError>>>,
    requests: Mutex<Vec<u64>>,
}

impl ScriptedBlockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, response: Result<BlockSpan, SourceError>) -> Self {
        self.responses.get_mut().push_back(response);
        self
    }

    /// Queue a span of `blocks` whose next cursor follows the last block
    pub fn with_blocks(self, blocks: Vec<Block>) -> Self {
        let next_cursor = blocks.last().map(|b| b.height + 1).unwrap_or_default();
        self.with_response(Ok(BlockSpan { blocks, next_cursor }))
    }

    /// Cursors passed to `fetch_span`, oldest first
    pub async fn requests(&self) -> Vec<u64> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl BlockSource for ScriptedBlockSource {
    async fn fetch_span(&self, cursor: u64, _limit: usize) -> Result<BlockSpan, SourceError> {
        self.requests.lock().await.push(cursor);
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or(Err(SourceError::NoData))
    }
}

/// Block source that generates a synthetic chain for development.
///
/// Heights advance with wall-clock time at one block per `block_interval`
/// from `genesis_time`. Every block carries a deterministic mix of pool
/// events so the depth totals move.
#[derive(Debug, Clone)]
pub struct SyntheticBlockSource {
    genesis_time: DateTime<Utc>,
    block_interval: Duration,
    pools: Vec<String>,
}

impl SyntheticBlockSource {
    pub fn new(genesis_time: DateTime<Utc>, block_interval: Duration) -> Self {
        info!("Synthetic block source: one block every {}s", block_interval.num_seconds());
        Self {
            genesis_time,
            block_interval,
            pools: vec!["BNB.BNB".to_string(), "BTC.BTC".to_string(), "ETH.ETH".to_string()],
        }
    }

    /// Newest height available at `now`
    pub fn tip_at(&self, now: DateTime<Utc>) -> Option<u64> {
        let elapsed = now.signed_duration_since(self.genesis_time);
        let interval_ms = self.block_interval.num_milliseconds().max(1);
        let produced = elapsed.num_milliseconds() / interval_ms;
        u64::try_from(produced).ok()
    }

    pub fn block_at(&self, height: u64) -> Block {
        let offset_ms = self.block_interval.num_milliseconds().saturating_mul(height as i64);
        let timestamp = self.genesis_time + Duration::milliseconds(offset_ms);
        let hash = format!("{:016x}", height.wrapping_mul(0x9e37_79b9_7f4a_7c15)).into_bytes();
        let pool = self.pools[(height as usize) % self.pools.len()].clone();
        let amount = 1_000_000 + (height as i64 % 97) * 10_000;

        let mut block = Block::new(height, timestamp, hash);
        block = match height % 4 {
            0 => block.with_event(PoolEvent::Stake {
                pool,
                asset_e8: amount * 10,
                rune_e8: amount * 20,
            }),
            1 => block.with_event(PoolEvent::Swap {
                tx: format!("swap-{}", height),
                pool,
                direction: SwapDirection::RuneToAsset,
                from_e8: amount,
                to_e8: amount / 3,
            }),
            2 => block
                .with_event(PoolEvent::Outbound {
                    in_tx: format!("swap-{}", height - 1),
                })
                .with_event(PoolEvent::Reward { pool, rune_e8: amount / 100 }),
            _ => block.with_event(PoolEvent::Fee {
                tx: format!("fee-{}", height),
                pool,
                pool_deduct_e8: amount / 1000,
            }),
        };
        block
    }
}

#[async_trait]
impl BlockSource for SyntheticBlockSource {
    async fn fetch_span(&self, cursor: u64, limit: usize) -> Result<BlockSpan, SourceError> {
        let tip = self.tip_at(Utc::now()).ok_or(SourceError::NoData)?;
        if cursor > tip {
            return Err(SourceError::NoData);
        }

        let last = tip.min(cursor + limit.max(1) as u64 - 1);
        let blocks: Vec<Block> = (cursor..=last).map(|height| self.block_at(height)).collect();
        debug!("Synthetic span {}..={} (tip {})", cursor, last, tip);

        Ok(BlockSpan {
            blocks,
            next_cursor: last + 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_source_runs_dry() {
        let source = ScriptedBlockSource::new().with_blocks(vec![Block::new(0, Utc::now(), b"h0".to_vec())]);

        let span = source.fetch_span(0, 10).await.unwrap();
        assert_eq!(span.next_cursor, 1);
        assert_eq!(source.fetch_span(1, 10).await.unwrap_err(), SourceError::NoData);
        assert_eq!(source.requests().await, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_synthetic_span_stops_at_tip() {
        let genesis = Utc::now() - Duration::seconds(10);
        let source = SyntheticBlockSource::new(genesis, Duration::seconds(1));

        let span = source.fetch_span(5, 100).await.unwrap();
        let heights: Vec<u64> = span.blocks.iter().map(|b| b.height).collect();
        assert_eq!(heights.first(), Some(&5));
        assert!(heights.windows(2).all(|w| w[1] == w[0] + 1));
        assert_eq!(span.next_cursor, heights[heights.len() - 1] + 1);

        assert_eq!(source.fetch_span(1_000, 100).await.unwrap_err(), SourceError::NoData);
    }

    #[test]
    fn test_synthetic_blocks_are_deterministic() {
        let source = SyntheticBlockSource::new(Utc::now(), Duration::seconds(3));
        assert_eq!(source.block_at(42), source.block_at(42));
        assert_ne!(source.block_at(42).hash, source.block_at(43).hash);
    }
}
