//! Round advancement gating.
//!
//! The coordinator only guards the cadence; the actual sequence of
//! promotions lives in [`crate::Hub::turn_round`], which must run its
//! steps in a fixed order so round-N rewards are distributed on round-N
//! snapshots before round-N+1 snapshots are taken.

use crate::{HubError, HubResult};
use serde::{Deserialize, Serialize};

/// Tracks when the last round turned.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RoundCoordinator {
    last_round_timestamp: u64,
}

impl RoundCoordinator {
    /// Creates a coordinator that allows an immediate first turn.
    pub fn new() -> Self {
        Self::default()
    }

    /// Time of the last round turn.
    pub fn last_round_timestamp(&self) -> u64 {
        self.last_round_timestamp
    }

    /// Rejects a turn attempted before `min_round_time` elapsed.
    pub(crate) fn ensure_due(&self, now: u64, min_round_time: u64) -> HubResult<()> {
        if self.last_round_timestamp > 0
            && now.saturating_sub(self.last_round_timestamp) < min_round_time
        {
            return Err(HubError::MinRoundTimeNotReached);
        }
        Ok(())
    }

    /// Stamps a completed turn.
    pub(crate) fn stamp(&mut self, now: u64) {
        self.last_round_timestamp = now;
    }
}
