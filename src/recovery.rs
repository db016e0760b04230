//! Startup recovery from the checkpoint log
//!
//! Recovery reads the newest checkpoint, restores the running totals from
//! its snapshot and moves the tracker out of the uninitialized state. It
//! never writes to the store.

use std::sync::Arc;
use tracing::{error, info};

use crate::core::{IndexerError, IndexerResult};
use crate::timeline::Timeline;
use crate::tracker::BlockTrack;

/// Where to resume after recovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovered {
    /// Next height to request from the block source
    pub resume_cursor: u64,
    pub track: Arc<BlockTrack>,
}

impl Timeline {
    /// Restore state from the newest checkpoint.
    ///
    /// An empty store starts from genesis. A latest row whose snapshot does
    /// not decode is fatal: resuming from anything but the committed state
    /// would silently corrupt every later checkpoint.
    pub fn recover(&mut self) -> IndexerResult<Recovered> {
        let latest = match self.store.latest_checkpoint()? {
            Some(checkpoint) => checkpoint,
            None => {
                let track = self.tracker.initialize(BlockTrack::genesis())?;
                info!("Checkpoint log is empty, starting from genesis");
                return Ok(Recovered {
                    resume_cursor: 0,
                    track,
                });
            }
        };

        let snapshot = self.codec.decode(&latest.snapshot).map_err(|e| {
            error!("Checkpoint at height {} is unusable: {}", latest.height, e);
            IndexerError::Recovery {
                height: latest.height,
                reason: e.to_string(),
            }
        })?;

        self.recorder.restore(&snapshot);
        let track = self.tracker.initialize(BlockTrack {
            height: latest.height,
            timestamp: latest.timestamp,
            hash: latest.hash,
            snapshot,
        })?;

        info!(
            "Recovered at height {} with {} pools",
            track.height,
            track.snapshot.pools().len()
        );

        Ok(Recovered {
            resume_cursor: track.height + 1,
            track,
        })
    }
}
