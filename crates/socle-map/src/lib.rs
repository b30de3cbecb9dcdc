//! Address-space composition for soft-core systems-on-chip.
//!
//! A memory map is assembled in layers:
//! - **Base catalog:** the board's fixed regions (flash, SRAM, CSR window)
//! - **Override layers:** per-variant and per-configuration replacements,
//!   adjustments, and additions, applied strictly in order
//! - **Derived addresses:** boot vectors that sit past fixed-size preambles
//!
//! [`MemoryMapBuilder::compose`] merges the layers and validates the result.
//! A returned [`MemoryMap`] is always non-overlapping and address-resolved.

pub mod boot;
pub mod builder;
pub mod error;
pub mod interrupt;
pub mod layer;
pub mod region;

pub use boot::{BootStage, BootVector, DEFAULT_ENTRY_BYTES};
pub use builder::{compose, MemoryMap, MemoryMapBuilder};
pub use error::{MapError, Result};
pub use interrupt::{InterruptLayer, InterruptTable, DEFAULT_INTERRUPT_LINES};
pub use layer::{OverrideLayer, RegionOverride};
pub use region::{AddressRegion, RegionKind};
