//! Chain follower: pulls block spans and drives the writer
//!
//! The follower owns the [`Timeline`] and is therefore the only writer. It
//! requests spans from a [`BlockSource`] starting at its cursor, applies and
//! commits every block in order, and advances the cursor only after the
//! whole span is committed. Source failures are retried after a backoff;
//! storage failures stop the loop.

pub mod liveness;
pub mod mock_source;

pub use liveness::SyncStatus;
pub use mock_source::{ScriptedBlockSource, SyntheticBlockSource};

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::FollowerConfig;
use crate::core::{BlockSource, BlockSpan, IndexerError, IndexerResult, SourceError};
use crate::timeline::Timeline;

/// Result of a single fetch-and-apply round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Blocks were committed and the cursor moved
    Advanced { blocks: usize, cursor: u64 },
    /// Caught up with the chain tip
    NoData,
    /// Source failure; the cursor is unchanged and the round will be retried
    Failed(SourceError),
}

pub struct Follower<S: BlockSource> {
    source: S,
    timeline: Timeline,
    cursor: u64,
    liveness: Arc<SyncStatus>,
    backoff: Duration,
    max_retries: Option<u32>,
    span_limit: usize,
    consecutive_failures: u32,
}

impl<S: BlockSource> Follower<S> {
    /// `cursor` is the resume point returned by recovery
    pub fn new(source: S, timeline: Timeline, cursor: u64, config: &FollowerConfig) -> Self {
        Self {
            source,
            timeline,
            cursor,
            liveness: Arc::new(SyncStatus::new(config.backoff())),
            backoff: config.backoff(),
            max_retries: config.max_retries,
            span_limit: config.span_limit,
            consecutive_failures: 0,
        }
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn liveness(&self) -> Arc<SyncStatus> {
        Arc::clone(&self.liveness)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Run one fetch-and-apply round.
    ///
    /// Errors returned from here are fatal: either the store failed or the
    /// retry ceiling was reached.
    pub async fn step(&mut self) -> IndexerResult<StepOutcome> {
        let fetched = self.source.fetch_span(self.cursor, self.span_limit).await;

        let span = match fetched.and_then(|span| self.check_span(span)) {
            Ok(span) => span,
            Err(SourceError::NoData) => {
                self.liveness.record_empty(Utc::now());
                self.consecutive_failures = 0;
                debug!("No blocks past cursor {}", self.cursor);
                return Ok(StepOutcome::NoData);
            }
            Err(e) => {
                let err = IndexerError::from(e);
                if !err.is_retryable() {
                    error!("Block source failed at cursor {}: {}", self.cursor, err);
                    return Err(err);
                }
                return self.record_failure(err);
            }
        };

        let count = span.blocks.len();
        for block in &span.blocks {
            let report = self.timeline.apply_block(block)?;
            if !report.violations.is_empty() {
                warn!(
                    "Block {} left {} pool depth violations",
                    block.height,
                    report.violations.len()
                );
            }
        }

        self.cursor = span.next_cursor;
        self.consecutive_failures = 0;
        debug!("Committed {} blocks, cursor now {}", count, self.cursor);

        Ok(StepOutcome::Advanced {
            blocks: count,
            cursor: self.cursor,
        })
    }

    /// Follow the chain until `shutdown` flips to true or a fatal error occurs
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> IndexerResult<()> {
        info!("Following chain from height {}", self.cursor);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let outcome = match self.step().await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Follower stopped at cursor {}: {}", self.cursor, e);
                    return Err(e);
                }
            };

            if matches!(outcome, StepOutcome::Advanced { .. }) {
                continue;
            }

            tokio::select! {
                _ = sleep(self.backoff) => {}
                _ = shutdown.changed() => {}
            }
        }

        info!("Follower stopped at cursor {}", self.cursor);
        Ok(())
    }

    /// Reject spans that would skip or repeat heights
    fn check_span(&self, span: BlockSpan) -> Result<BlockSpan, SourceError> {
        if span.blocks.is_empty() {
            return Err(SourceError::NoData);
        }

        let mut expected = self.cursor;
        for block in &span.blocks {
            if block.height != expected {
                return Err(SourceError::Gap {
                    expected,
                    got: block.height,
                });
            }
            expected += 1;
        }
        if span.next_cursor != expected {
            return Err(SourceError::Gap {
                expected,
                got: span.next_cursor,
            });
        }
        Ok(span)
    }

    fn record_failure(&mut self, err: IndexerError) -> IndexerResult<StepOutcome> {
        let IndexerError::Source(err) = err else {
            return Err(err);
        };
        self.consecutive_failures += 1;

        if let Some(limit) = self.max_retries {
            if self.consecutive_failures > limit {
                error!("Giving up after {} consecutive failures: {}", self.consecutive_failures, err);
                return Err(SourceError::RetriesExhausted(self.consecutive_failures).into());
            }
        }

        warn!(
            "Block fetch at cursor {} failed ({} in a row): {}, retrying in {:?}",
            self.cursor, self.consecutive_failures, err, self.backoff
        );
        Ok(StepOutcome::Failed(err))
    }
}
