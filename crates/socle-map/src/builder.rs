//! Layered memory-map composition.
//!
//! `MemoryMapBuilder` holds a base catalog, an ordered list of override
//! layers, boot vectors, and minimum-size requirements. [`MemoryMapBuilder::compose`]
//! is a pure function of those inputs: it folds the layers into a fresh
//! region list, validates it, and resolves every boot vector.
//!
//! # Example
//!
//! ```rust
//! use socle_map::{AddressRegion, BootVector, MemoryMapBuilder, OverrideLayer};
//!
//! let base = OverrideLayer::from_regions(
//!     "board",
//!     vec![
//!         AddressRegion::ram("sram", 0x1000_0000, 0x2_0000),
//!         AddressRegion::rom("spiflash", 0x2000_0000, 0x100_0000),
//!     ],
//! );
//! let map = MemoryMapBuilder::new(base)
//!     .boot_vector(BootVector::new("cpu_reset", "spiflash").stage("gateware", 0x2_0000))
//!     .compose()
//!     .unwrap();
//! assert_eq!(map.boot_address("cpu_reset"), Some(0x2002_0000));
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::boot::BootVector;
use crate::error::{MapError, Result};
use crate::layer::{OverrideLayer, RegionOverride};
use crate::region::AddressRegion;

/// A fully validated, address-resolved memory map.
///
/// Regions keep the order in which they were first introduced; a
/// replacement keeps its predecessor's position, so outputs diff cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MemoryMap {
    regions: Vec<AddressRegion>,
    boot_vectors: BTreeMap<String, u64>,
}

impl MemoryMap {
    /// Look up a region by name.
    pub fn region(&self, name: &str) -> Option<&AddressRegion> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// All regions in introduction order.
    pub fn regions(&self) -> &[AddressRegion] {
        &self.regions
    }

    /// All regions sorted by base address, parents before their children.
    pub fn by_address(&self) -> Vec<&AddressRegion> {
        let mut sorted: Vec<&AddressRegion> = self.regions.iter().collect();
        sorted.sort_by(|a, b| {
            a.base
                .cmp(&b.base)
                .then(b.size.cmp(&a.size))
                .then(a.name.cmp(&b.name))
        });
        sorted
    }

    /// Resolved address of a named boot vector.
    pub fn boot_address(&self, name: &str) -> Option<u64> {
        self.boot_vectors.get(name).copied()
    }

    /// All resolved boot vectors by name.
    pub fn boot_vectors(&self) -> &BTreeMap<String, u64> {
        &self.boot_vectors
    }

    /// The innermost enabled region decoding `addr`, if any.
    pub fn region_at(&self, addr: u64) -> Option<&AddressRegion> {
        self.regions
            .iter()
            .filter(|r| r.is_enabled() && r.contains(addr))
            .min_by_key(|r| r.size)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Inputs to a memory-map composition.
#[derive(Debug, Clone, Default)]
pub struct MemoryMapBuilder {
    layers: Vec<OverrideLayer>,
    boot_vectors: Vec<BootVector>,
    minimums: Vec<(String, u64)>,
}

impl MemoryMapBuilder {
    /// Start from a base catalog.
    pub fn new(base: OverrideLayer) -> Self {
        Self {
            layers: vec![base],
            boot_vectors: Vec::new(),
            minimums: Vec::new(),
        }
    }

    /// Add an override layer on top of every layer added so far.
    pub fn layer(mut self, layer: OverrideLayer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Declare a boot vector to resolve after all layers are applied.
    pub fn boot_vector(mut self, vector: BootVector) -> Self {
        self.boot_vectors.push(vector);
        self
    }

    /// Require `region` to be at least `bytes` long in the composed map.
    pub fn require_min_size(mut self, region: impl Into<String>, bytes: u64) -> Self {
        self.minimums.push((region.into(), bytes));
        self
    }

    /// Apply every layer in order, then validate the result.
    pub fn compose(&self) -> Result<MemoryMap> {
        let mut regions: Vec<AddressRegion> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for layer in &self.layers {
            for change in layer.iter() {
                apply(&mut regions, &mut index, &layer.name, change)?;
            }
        }

        for region in &regions {
            if region.size == 0 {
                return Err(MapError::UndersizedRegion {
                    region: region.name.clone(),
                    required: 1,
                    actual: 0,
                });
            }
            region.end()?;
        }

        check_nesting(&regions, &index)?;
        check_overlaps(&regions, &index)?;
        self.check_minimums(&regions, &index)?;

        let mut boot_vectors = BTreeMap::new();
        for vector in &self.boot_vectors {
            let base = index
                .get(&vector.region)
                .map(|&i| &regions[i])
                .ok_or_else(|| MapError::UnknownRegionReference {
                    name: vector.region.clone(),
                })?;
            let addr = vector.resolve(base)?;
            debug!(vector = %vector.name, address = addr, "resolved boot vector");
            boot_vectors.insert(vector.name.clone(), addr);
        }

        Ok(MemoryMap {
            regions,
            boot_vectors,
        })
    }

    fn check_minimums(&self, regions: &[AddressRegion], index: &HashMap<String, usize>) -> Result<()> {
        let mut required: BTreeMap<&str, u64> = BTreeMap::new();
        for (name, bytes) in &self.minimums {
            let slot = required.entry(name.as_str()).or_insert(0);
            *slot = (*slot).max(*bytes);
        }
        for (name, bytes) in required {
            let region = index
                .get(name)
                .map(|&i| &regions[i])
                .ok_or_else(|| MapError::UnknownRegionReference { name: name.into() })?;
            if region.size < bytes {
                return Err(MapError::UndersizedRegion {
                    region: name.into(),
                    required: bytes,
                    actual: region.size,
                });
            }
        }
        Ok(())
    }
}

/// Compose `base` with `overrides` applied in order.
pub fn compose(base: OverrideLayer, overrides: impl IntoIterator<Item = OverrideLayer>) -> Result<MemoryMap> {
    overrides
        .into_iter()
        .fold(MemoryMapBuilder::new(base), MemoryMapBuilder::layer)
        .compose()
}

fn apply(
    regions: &mut Vec<AddressRegion>,
    index: &mut HashMap<String, usize>,
    layer: &str,
    change: &RegionOverride,
) -> Result<()> {
    match change {
        RegionOverride::Replace(region) => match index.get(&region.name) {
            Some(&i) => {
                debug!(layer, region = %region.name, "replacing region");
                regions[i] = region.clone();
            }
            None => {
                debug!(layer, region = %region.name, "adding region");
                index.insert(region.name.clone(), regions.len());
                regions.push(region.clone());
            }
        },
        RegionOverride::Adjust {
            name,
            base_delta,
            size_delta,
        } => {
            let &i = index
                .get(name)
                .ok_or_else(|| MapError::UnknownRegionReference { name: name.clone() })?;
            let region = &mut regions[i];
            let overflow = || MapError::AddressOverflow {
                region: name.clone(),
            };
            region.base = region.base.checked_add_signed(*base_delta).ok_or_else(overflow)?;
            region.size = region.size.checked_add_signed(*size_delta).ok_or_else(overflow)?;
            debug!(layer, region = %name, base_delta, size_delta, "adjusted region");
        }
    }
    Ok(())
}

fn check_nesting(regions: &[AddressRegion], index: &HashMap<String, usize>) -> Result<()> {
    for region in regions {
        let mut child = region;
        let mut depth = 0;
        while let Some(parent_name) = &child.within {
            let parent = index
                .get(parent_name)
                .map(|&i| &regions[i])
                .ok_or_else(|| MapError::UnknownRegionReference {
                    name: parent_name.clone(),
                })?;
            depth += 1;
            if !child.fits_inside(parent) || depth > regions.len() {
                return Err(MapError::EscapesParent {
                    region: child.name.clone(),
                    parent: parent.name.clone(),
                });
            }
            child = parent;
        }
    }
    Ok(())
}

/// Nearest enabled ancestor of `region`, or `None` at the top level.
/// Reserved parents are transparent: their children compete with the
/// regions around them. Nesting has already been validated.
fn overlap_group<'a>(
    region: &AddressRegion,
    regions: &'a [AddressRegion],
    index: &HashMap<String, usize>,
) -> Option<&'a str> {
    let mut parent_name = region.within.as_deref();
    while let Some(name) = parent_name {
        let parent = &regions[*index.get(name)?];
        if parent.is_enabled() {
            return Some(parent.name.as_str());
        }
        parent_name = parent.within.as_deref();
    }
    None
}

/// Sort each sibling group by base and sweep, tracking the furthest-reaching
/// region seen so far. O(n log n) per group.
fn check_overlaps(regions: &[AddressRegion], index: &HashMap<String, usize>) -> Result<()> {
    let mut groups: BTreeMap<Option<&str>, Vec<&AddressRegion>> = BTreeMap::new();
    for region in regions.iter().filter(|r| r.is_enabled()) {
        groups
            .entry(overlap_group(region, regions, index))
            .or_default()
            .push(region);
    }

    for siblings in groups.values_mut() {
        siblings.sort_by(|a, b| a.base.cmp(&b.base).then(a.name.cmp(&b.name)));
        let mut reach: Option<(&AddressRegion, u64)> = None;
        for &region in siblings.iter() {
            let end = region.end()?;
            if let Some((prev, prev_end)) = reach {
                if region.base < prev_end {
                    return Err(MapError::Overlap {
                        region_a: prev.name.clone(),
                        region_b: region.name.clone(),
                        a_start: prev.base,
                        a_end: prev_end,
                        b_start: region.base,
                        b_end: end,
                    });
                }
            }
            if reach.map_or(true, |(_, prev_end)| end > prev_end) {
                reach = Some((region, end));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RegionKind;

    fn base() -> OverrideLayer {
        OverrideLayer::from_regions(
            "board",
            vec![
                AddressRegion::rom("rom", 0x0000_0000, 0x2c00),
                AddressRegion::ram("sram", 0x1000_0000, 0x2_0000),
                AddressRegion::rom("spiflash", 0x2000_0000, 0x100_0000),
                AddressRegion::mmio("csr", 0x6000_0000, 0x1_0000),
            ],
        )
    }

    #[test]
    fn base_map_composes() {
        let map = MemoryMapBuilder::new(base()).compose().unwrap();
        assert_eq!(map.len(), 4);
        assert_eq!(map.region("sram").unwrap().size, 0x2_0000);
        assert!(map.region("nonexistent").is_none());
    }

    #[test]
    fn replacement_keeps_position() {
        let layer = OverrideLayer::new("variant").replace(AddressRegion::ram("sram", 0x1000_0000, 0x4_0000));
        let map = compose(base(), vec![layer]).unwrap();
        assert_eq!(map.regions()[1].name, "sram");
        assert_eq!(map.regions()[1].size, 0x4_0000);
    }

    #[test]
    fn later_layers_win() {
        let a = OverrideLayer::new("a").replace(AddressRegion::rom("rom", 0, 0x1000));
        let b = OverrideLayer::new("b").replace(AddressRegion::rom("rom", 0, 0x2400));
        let map = compose(base(), vec![a, b]).unwrap();
        assert_eq!(map.region("rom").unwrap().size, 0x2400);
    }

    #[test]
    fn overlap_names_both_regions() {
        let layer = OverrideLayer::new("bad").replace(AddressRegion::ram("extra", 0x1001_0000, 0x2_0000));
        let err = compose(base(), vec![layer]).unwrap_err();
        assert_eq!(
            err,
            MapError::Overlap {
                region_a: "sram".into(),
                region_b: "extra".into(),
                a_start: 0x1000_0000,
                a_end: 0x1002_0000,
                b_start: 0x1001_0000,
                b_end: 0x1003_0000,
            }
        );
    }

    #[test]
    fn overlap_ignores_nested_children() {
        // "inner" lives in a different sibling group; "late" must still be
        // caught against "big".
        let layer = OverrideLayer::from_regions(
            "l",
            vec![
                AddressRegion::ram("big", 0x4000_0000, 0x1000),
                AddressRegion::ram("inner", 0x4000_0100, 0x10).within("big"),
                AddressRegion::ram("late", 0x4000_0800, 0x10),
            ],
        );
        let err = compose(base(), vec![layer]).unwrap_err();
        assert!(matches!(
            err,
            MapError::Overlap { ref region_a, ref region_b, .. } if region_a == "big" && region_b == "late"
        ));
    }

    #[test]
    fn touching_regions_do_not_overlap() {
        let layer = OverrideLayer::new("l").replace(AddressRegion::ram("next", 0x1002_0000, 0x100));
        assert!(compose(base(), vec![layer]).is_ok());
    }

    #[test]
    fn reserved_regions_may_overlap() {
        let layer = OverrideLayer::new("l").replace(AddressRegion::new(
            "hole",
            0x1000_0000,
            0x100,
            RegionKind::Reserved,
        ));
        assert!(compose(base(), vec![layer]).is_ok());
    }

    #[test]
    fn children_of_reserved_regions_checked_against_neighbours() {
        let board = OverrideLayer::from_regions(
            "board",
            vec![
                AddressRegion::ram("sram", 0x1000_0000, 0x1000),
                AddressRegion::new("hole", 0x1000_0000, 0x1000, RegionKind::Reserved),
            ],
        );
        let layer = OverrideLayer::new("l").replace(AddressRegion::ram("dup", 0x1000_0000, 0x100).within("hole"));
        assert_eq!(
            compose(board.clone(), vec![layer]).unwrap_err(),
            MapError::Overlap {
                region_a: "dup".into(),
                region_b: "sram".into(),
                a_start: 0x1000_0000,
                a_end: 0x1000_0100,
                b_start: 0x1000_0000,
                b_end: 0x1000_1000,
            }
        );

        // Reserved nesting two deep still lands in the top-level group.
        let deep = OverrideLayer::from_regions(
            "l",
            vec![
                AddressRegion::new("gap", 0x1000_0800, 0x100, RegionKind::Reserved).within("hole"),
                AddressRegion::ram("late", 0x1000_0800, 0x10).within("gap"),
            ],
        );
        assert!(matches!(
            compose(board, vec![deep]),
            Err(MapError::Overlap { ref region_a, ref region_b, .. }) if region_a == "sram" && region_b == "late"
        ));
    }

    #[test]
    fn adjust_moves_and_resizes() {
        let layer = OverrideLayer::new("l").adjust("sram", 0x100, -0x100);
        let map = compose(base(), vec![layer]).unwrap();
        let sram = map.region("sram").unwrap();
        assert_eq!(sram.base, 0x1000_0100);
        assert_eq!(sram.size, 0x1_FF00);
    }

    #[test]
    fn adjust_unknown_region() {
        let layer = OverrideLayer::new("l").adjust("dram", 0, 0x100);
        assert_eq!(
            compose(base(), vec![layer]).unwrap_err(),
            MapError::UnknownRegionReference { name: "dram".into() }
        );
    }

    #[test]
    fn adjust_underflow() {
        let layer = OverrideLayer::new("l").adjust("rom", -1, 0);
        assert!(matches!(
            compose(base(), vec![layer]),
            Err(MapError::AddressOverflow { .. })
        ));
    }

    #[test]
    fn zero_size_rejected() {
        let layer = OverrideLayer::new("l").adjust("rom", 0, -0x2c00);
        assert_eq!(
            compose(base(), vec![layer]).unwrap_err(),
            MapError::UndersizedRegion {
                region: "rom".into(),
                required: 1,
                actual: 0,
            }
        );
    }

    #[test]
    fn nested_regions_checked_against_siblings_only() {
        let layer = OverrideLayer::from_regions(
            "l",
            vec![
                AddressRegion::mmio("ctrl", 0x6000_0000, 0x800).within("csr"),
                AddressRegion::mmio("uart", 0x6000_0800, 0x800).within("csr"),
            ],
        );
        let map = compose(base(), vec![layer]).unwrap();
        assert_eq!(map.region_at(0x6000_0900).unwrap().name, "uart");
        assert_eq!(map.region_at(0x6000_F000).unwrap().name, "csr");

        let clash = OverrideLayer::from_regions(
            "l",
            vec![
                AddressRegion::mmio("ctrl", 0x6000_0000, 0x800).within("csr"),
                AddressRegion::mmio("uart", 0x6000_0400, 0x800).within("csr"),
            ],
        );
        assert!(matches!(compose(base(), vec![clash]), Err(MapError::Overlap { .. })));
    }

    #[test]
    fn nested_region_must_fit() {
        let layer = OverrideLayer::new("l").replace(AddressRegion::mmio("uart", 0x6000_F800, 0x1000).within("csr"));
        assert_eq!(
            compose(base(), vec![layer]).unwrap_err(),
            MapError::EscapesParent {
                region: "uart".into(),
                parent: "csr".into(),
            }
        );
        let orphan = OverrideLayer::new("l").replace(AddressRegion::mmio("uart", 0, 4).within("nowhere"));
        assert_eq!(
            compose(base(), vec![orphan]).unwrap_err(),
            MapError::UnknownRegionReference { name: "nowhere".into() }
        );
    }

    #[test]
    fn minimum_size_enforced() {
        let layer = OverrideLayer::new("l").replace(AddressRegion::rom("rom", 0, 0x1000));
        let err = MemoryMapBuilder::new(base())
            .layer(layer)
            .require_min_size("rom", 0x2400)
            .compose()
            .unwrap_err();
        assert_eq!(
            err,
            MapError::UndersizedRegion {
                region: "rom".into(),
                required: 0x2400,
                actual: 0x1000,
            }
        );
    }

    #[test]
    fn largest_minimum_wins() {
        let err = MemoryMapBuilder::new(base())
            .require_min_size("rom", 0x100)
            .require_min_size("rom", 0x4000)
            .require_min_size("rom", 0x200)
            .compose()
            .unwrap_err();
        assert!(matches!(err, MapError::UndersizedRegion { required: 0x4000, .. }));
    }

    #[test]
    fn minimum_on_unknown_region() {
        let err = MemoryMapBuilder::new(base())
            .require_min_size("bios", 0x100)
            .compose()
            .unwrap_err();
        assert_eq!(err, MapError::UnknownRegionReference { name: "bios".into() });
    }

    #[test]
    fn boot_vector_resolution() {
        let map = MemoryMapBuilder::new(base())
            .boot_vector(
                BootVector::new("flash_boot", "spiflash")
                    .stage("gateware", 0x2_0000)
                    .stage("firmware", 0x2c00),
            )
            .compose()
            .unwrap();
        assert_eq!(map.boot_address("flash_boot"), Some(0x2002_2c00));
    }

    #[test]
    fn shrinking_below_boot_vector_fails() {
        let shrink = OverrideLayer::new("variant").replace(AddressRegion::rom("spiflash", 0x2000_0000, 0x1_0000));
        let err = MemoryMapBuilder::new(base())
            .layer(shrink)
            .boot_vector(BootVector::new("cpu_reset", "spiflash").stage("gateware", 0x2_0000))
            .compose()
            .unwrap_err();
        assert_eq!(
            err,
            MapError::UndersizedRegion {
                region: "spiflash".into(),
                required: 0x2_0004,
                actual: 0x1_0000,
            }
        );
    }

    #[test]
    fn boot_vector_unknown_region() {
        let err = MemoryMapBuilder::new(base())
            .boot_vector(BootVector::new("cpu_reset", "flash"))
            .compose()
            .unwrap_err();
        assert_eq!(err, MapError::UnknownRegionReference { name: "flash".into() });
    }

    #[test]
    fn composition_is_deterministic() {
        let layers = || {
            vec![
                OverrideLayer::new("a").replace(AddressRegion::ram("extra", 0x3000_0000, 0x100)),
                OverrideLayer::new("b").adjust("sram", 0, 0x100),
            ]
        };
        assert_eq!(compose(base(), layers()).unwrap(), compose(base(), layers()).unwrap());
    }

    #[test]
    fn non_overlapping_layers_yield_disjoint_map() {
        // Stack many disjoint regions and confirm every pair is disjoint.
        let layers: Vec<OverrideLayer> = (0..32u64)
            .map(|i| {
                OverrideLayer::new(format!("l{i}")).replace(AddressRegion::ram(
                    format!("r{i}"),
                    0x8000_0000 + i * 0x1000,
                    0x1000 - (i % 3) * 0x100,
                ))
            })
            .collect();
        let map = compose(base(), layers).unwrap();
        let top: Vec<&AddressRegion> = map.regions().iter().filter(|r| r.within.is_none()).collect();
        for (i, a) in top.iter().enumerate() {
            for b in &top[i + 1..] {
                let disjoint = a.end().unwrap() <= b.base || b.end().unwrap() <= a.base;
                assert!(disjoint, "{a} overlaps {b}");
            }
        }
    }

    #[test]
    fn by_address_orders_parents_first() {
        let layer = OverrideLayer::new("l").replace(AddressRegion::mmio("ctrl", 0x6000_0000, 0x800).within("csr"));
        let map = compose(base(), vec![layer]).unwrap();
        let names: Vec<&str> = map.by_address().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["rom", "sram", "spiflash", "csr", "ctrl"]);
    }
}
