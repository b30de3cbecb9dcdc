//! Boot vectors: addresses derived from a base region plus fixed preambles.
//!
//! External-flash boot places the CPU's first instruction past every stage
//! that precedes it in flash (the gateware image, an optional second-stage
//! loader, a firmware stub). The vector is computed once from the composed
//! map and never changes afterwards.

use serde::{Deserialize, Serialize};

use crate::error::{MapError, Result};
use crate::region::AddressRegion;

/// Bytes that must exist at a boot vector by default: one instruction word.
pub const DEFAULT_ENTRY_BYTES: u64 = 4;

fn default_entry_bytes() -> u64 {
    DEFAULT_ENTRY_BYTES
}

/// A fixed-size stage that precedes the vector inside its base region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootStage {
    /// Stage name (e.g., "gateware", "bootloader", "firmware").
    pub name: String,
    /// Stage size in bytes.
    pub size: u64,
}

/// A derived address: `region.base + sum(stage sizes)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BootVector {
    /// Vector name (e.g., "cpu_reset", "flash_boot").
    pub name: String,
    /// Region the vector is based on.
    pub region: String,
    /// Preceding stages, in flash order.
    #[serde(default)]
    pub stages: Vec<BootStage>,
    /// Bytes that must exist at the vector inside the region.
    #[serde(default = "default_entry_bytes")]
    pub entry_bytes: u64,
}

impl BootVector {
    /// A vector at the start of `region` with no preceding stages.
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            stages: Vec::new(),
            entry_bytes: DEFAULT_ENTRY_BYTES,
        }
    }

    /// Append a preceding stage. Zero-sized stages are kept for diagnostics.
    pub fn stage(mut self, name: impl Into<String>, size: u64) -> Self {
        self.stages.push(BootStage {
            name: name.into(),
            size,
        });
        self
    }

    /// Set the number of bytes that must exist at the vector.
    pub fn entry_bytes(mut self, bytes: u64) -> Self {
        self.entry_bytes = bytes;
        self
    }

    /// Sum of all preceding stage sizes.
    pub fn offset(&self) -> Result<u64> {
        self.stages.iter().try_fold(0u64, |acc, s| {
            acc.checked_add(s.size)
                .ok_or_else(|| MapError::AddressOverflow {
                    region: self.region.clone(),
                })
        })
    }

    /// Minimum size the base region must have for this vector to be valid.
    pub fn required_size(&self) -> Result<u64> {
        self.offset()?
            .checked_add(self.entry_bytes)
            .ok_or_else(|| MapError::AddressOverflow {
                region: self.region.clone(),
            })
    }

    /// Resolve the vector against its (already composed) base region.
    pub fn resolve(&self, base: &AddressRegion) -> Result<u64> {
        if base.name != self.region {
            return Err(MapError::UnknownRegionReference {
                name: self.region.clone(),
            });
        }
        let required = self.required_size()?;
        if base.size < required {
            return Err(MapError::UndersizedRegion {
                region: base.name.clone(),
                required,
                actual: base.size,
            });
        }
        base.base
            .checked_add(self.offset()?)
            .ok_or_else(|| MapError::AddressOverflow {
                region: base.name.clone(),
            })
    }
}
