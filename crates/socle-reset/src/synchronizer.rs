//! Asynchronous-assert, synchronous-release reset synchronizer.
//!
//! A chain of flops in the consuming domain, all preset by the request. The
//! request reaches the output immediately; its release has to ripple through
//! every stage, one clock edge each, before the output drops.

use crate::error::{ResetError, Result};

/// Stages used when a board does not specify otherwise.
pub const DEFAULT_SYNC_STAGES: usize = 2;

/// Flop-chain model of a reset synchronizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncResetSynchronizer {
    stages: Vec<bool>,
}

impl AsyncResetSynchronizer {
    /// A synchronizer as it comes out of power-up: every stage asserted.
    pub fn new(stages: usize) -> Result<Self> {
        if stages < 2 {
            return Err(ResetError::SynchronizerTooShort { stages });
        }
        Ok(Self {
            stages: vec![true; stages],
        })
    }

    /// Asynchronous assertion: presets every stage without waiting for a clock.
    pub fn assert_now(&mut self) {
        self.stages.fill(true);
    }

    /// One edge of the consuming clock with the request at `request`.
    pub fn tick(&mut self, request: bool) {
        if request {
            self.assert_now();
            return;
        }
        self.stages.rotate_right(1);
        self.stages[0] = false;
    }

    /// Synchronized reset seen by the consuming domain.
    pub fn output(&self) -> bool {
        self.stages.last().copied().unwrap_or(true)
    }

    pub fn depth(&self) -> usize {
        self.stages.len()
    }
}
