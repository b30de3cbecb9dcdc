//! Power-on reset sequencer.
//!
//! A 12-bit down-counter clocked by the gated domain. While the counter is
//! non-zero the domain's reset is asserted; once it reaches zero the reset is
//! released and stays released. The counter's own reset comes from an
//! [`AsyncResetSynchronizer`], so an external reset request re-arms it
//! immediately but counting only resumes on a clean edge.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::synchronizer::AsyncResetSynchronizer;

/// Width of the settle counter.
pub const POR_COUNTER_BITS: u32 = 12;

/// Cycles the domain is held after the synchronizer releases.
pub const POR_SETTLE_CYCLES: u16 = (1 << POR_COUNTER_BITS) - 1;

/// Sequencer state as seen by the gated domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PorState {
    /// Reset asserted; `n` cycles remain.
    Counting(u16),
    /// Reset released for the rest of this power cycle.
    Released,
}

/// Snapshot of the counter and the reset it drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetSequencerState {
    pub counter: u16,
    pub asserted: bool,
}

/// Cycle-accurate model of one gated domain's power-on reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerOnResetSequencer {
    synchronizer: AsyncResetSynchronizer,
    counter: u16,
}

impl PowerOnResetSequencer {
    /// The sequencer at power-up: synchronizer asserted, counter full.
    pub fn power_up(sync_stages: usize) -> Result<Self> {
        Ok(Self {
            synchronizer: AsyncResetSynchronizer::new(sync_stages)?,
            counter: POR_SETTLE_CYCLES,
        })
    }

    /// An external asynchronous reset request (board button, supervisor).
    /// The domain reset asserts at once and the counter re-arms.
    pub fn request_reset(&mut self) {
        self.synchronizer.assert_now();
        self.counter = POR_SETTLE_CYCLES;
    }

    /// One edge of the gated domain's clock; `request` is the level of the
    /// external reset request at that edge.
    pub fn tick(&mut self, request: bool) {
        if self.synchronizer.output() {
            self.counter = POR_SETTLE_CYCLES;
        } else if self.counter != 0 {
            self.counter -= 1;
        }
        self.synchronizer.tick(request);
    }

    /// Whether the gated domain is currently held in reset.
    pub fn asserted(&self) -> bool {
        self.synchronizer.output() || self.counter != 0
    }

    /// Whether the external request has been synchronized out.
    pub fn synchronized(&self) -> bool {
        !self.synchronizer.output()
    }

    pub fn state(&self) -> PorState {
        if self.asserted() {
            PorState::Counting(self.counter)
        } else {
            PorState::Released
        }
    }

    pub fn snapshot(&self) -> ResetSequencerState {
        ResetSequencerState {
            counter: self.counter,
            asserted: self.asserted(),
        }
    }

    pub fn sync_stages(&self) -> usize {
        self.synchronizer.depth()
    }

    /// Total edges from power-up (or a request) to release with no further requests.
    pub fn cycles_to_release(sync_stages: usize) -> u64 {
        sync_stages as u64 + u64::from(POR_SETTLE_CYCLES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synchronize(seq: &mut PowerOnResetSequencer) -> usize {
        let mut edges = 0;
        while !seq.synchronized() {
            seq.tick(false);
            edges += 1;
        }
        edges
    }

    #[test]
    fn initial_state() {
        let seq = PowerOnResetSequencer::power_up(2).unwrap();
        assert_eq!(seq.state(), PorState::Counting(4095));
        assert!(seq.asserted());
        assert_eq!(POR_SETTLE_CYCLES, 4095);
    }

    #[test]
    fn holds_exactly_4095_cycles_after_synchronization() {
        let mut seq = PowerOnResetSequencer::power_up(2).unwrap();
        assert_eq!(synchronize(&mut seq), 2);
        assert_eq!(seq.state(), PorState::Counting(4095));

        let mut held = 0;
        while seq.asserted() {
            seq.tick(false);
            held += 1;
        }
        assert_eq!(held, 4095);
        assert_eq!(seq.state(), PorState::Released);
    }

    #[test]
    fn never_reasserts_without_request() {
        let mut seq = PowerOnResetSequencer::power_up(2).unwrap();
        for _ in 0..PowerOnResetSequencer::cycles_to_release(2) {
            seq.tick(false);
        }
        assert_eq!(seq.state(), PorState::Released);
        for _ in 0..10_000 {
            seq.tick(false);
            assert!(!seq.asserted());
        }
        assert_eq!(seq.snapshot(), ResetSequencerState { counter: 0, asserted: false });
    }

    #[test]
    fn counter_decrements_one_per_edge() {
        let mut seq = PowerOnResetSequencer::power_up(2).unwrap();
        synchronize(&mut seq);
        seq.tick(false);
        seq.tick(false);
        assert_eq!(seq.state(), PorState::Counting(4093));
    }

    #[test]
    fn request_rearms_immediately() {
        let mut seq = PowerOnResetSequencer::power_up(2).unwrap();
        for _ in 0..PowerOnResetSequencer::cycles_to_release(2) {
            seq.tick(false);
        }
        assert!(!seq.asserted());

        seq.request_reset();
        assert!(seq.asserted());
        assert_eq!(seq.state(), PorState::Counting(4095));

        assert_eq!(synchronize(&mut seq), 2);
        let mut held = 0;
        while seq.asserted() {
            seq.tick(false);
            held += 1;
        }
        assert_eq!(held, 4095);
    }

    #[test]
    fn held_request_freezes_counter() {
        let mut seq = PowerOnResetSequencer::power_up(3).unwrap();
        for _ in 0..100 {
            seq.tick(true);
        }
        assert_eq!(seq.state(), PorState::Counting(4095));
        assert_eq!(synchronize(&mut seq), 3);
    }

    #[test]
    fn deeper_synchronizer_delays_release() {
        let mut seq = PowerOnResetSequencer::power_up(4).unwrap();
        let total = PowerOnResetSequencer::cycles_to_release(4);
        for _ in 0..total - 1 {
            seq.tick(false);
        }
        assert!(seq.asserted());
        seq.tick(false);
        assert!(!seq.asserted());
    }
}
