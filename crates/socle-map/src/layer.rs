//! Override layers.
//!
//! An override layer is a plain data value: an ordered list of changes a
//! board variant or build configuration applies on top of the layers beneath
//! it. Layers never mutate shared tables; [`crate::MemoryMapBuilder`] folds
//! them into a fresh map.

use serde::{Deserialize, Serialize};

use crate::region::AddressRegion;

/// A single change to a named region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum RegionOverride {
    /// Insert the region, or replace an existing region of the same name wholesale.
    Replace(AddressRegion),
    /// Move and/or resize an existing region by signed deltas.
    #[serde(rename_all = "kebab-case")]
    Adjust {
        name: String,
        #[serde(default)]
        base_delta: i64,
        #[serde(default)]
        size_delta: i64,
    },
}

impl RegionOverride {
    /// Name of the region this override targets.
    pub fn target(&self) -> &str {
        match self {
            RegionOverride::Replace(region) => &region.name,
            RegionOverride::Adjust { name, .. } => name,
        }
    }
}

/// A named, ordered set of region overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OverrideLayer {
    /// Layer name, used in diagnostics (e.g., "board", "config", "peripherals").
    pub name: String,
    /// Changes, applied in order.
    #[serde(default)]
    pub overrides: Vec<RegionOverride>,
}

impl OverrideLayer {
    /// Create an empty layer.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overrides: Vec::new(),
        }
    }

    /// Build a layer that inserts every region in `regions`.
    pub fn from_regions(name: impl Into<String>, regions: impl IntoIterator<Item = AddressRegion>) -> Self {
        let mut layer = Self::new(name);
        layer
            .overrides
            .extend(regions.into_iter().map(RegionOverride::Replace));
        layer
    }

    /// Append a wholesale replacement (or insertion).
    pub fn replace(mut self, region: AddressRegion) -> Self {
        self.overrides.push(RegionOverride::Replace(region));
        self
    }

    /// Append a base/size adjustment.
    pub fn adjust(mut self, name: impl Into<String>, base_delta: i64, size_delta: i64) -> Self {
        self.overrides.push(RegionOverride::Adjust {
            name: name.into(),
            base_delta,
            size_delta,
        });
        self
    }

    /// Append an arbitrary override.
    pub fn push(&mut self, change: RegionOverride) {
        self.overrides.push(change);
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegionOverride> {
        self.overrides.iter()
    }
}
