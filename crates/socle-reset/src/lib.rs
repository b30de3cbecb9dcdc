//! Clock domains and power-on reset sequencing.
//!
//! - **Clock domain graph:** named domains rooted at primary oscillators,
//!   with PLL/divider derivations forming a DAG
//! - **Async reset synchronizer:** asserts immediately, releases only after
//!   the request has crossed N flops of the consuming domain
//! - **Power-on reset sequencer:** a 12-bit down-counter per gated domain that
//!   holds the domain in reset for 4095 cycles after the synchronizer releases
//! - **Reset network:** one sequencer per gated domain, with reset propagated
//!   along derivation edges

pub mod domain;
pub mod error;
pub mod graph;
pub mod network;
pub mod sequencer;
pub mod synchronizer;

pub use domain::{ClockDomain, ClockSource, Derivation};
pub use error::{ResetError, Result};
pub use graph::ClockDomainGraph;
pub use network::{DomainReset, ResetNetwork, ResetPlan};
pub use sequencer::{PorState, PowerOnResetSequencer, ResetSequencerState, POR_COUNTER_BITS, POR_SETTLE_CYCLES};
pub use synchronizer::{AsyncResetSynchronizer, DEFAULT_SYNC_STAGES};
