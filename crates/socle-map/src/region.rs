//! Address region descriptors.
//!
//! An [`AddressRegion`] is an immutable value: a name, a base, a size, and a
//! kind. Regions may nest inside a parent region (a firmware window inside an
//! external flash bus region, a peripheral register block inside the CSR
//! window); nested regions are only overlap-checked against their siblings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MapError, Result};

/// What a region is used for on the system bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegionKind {
    /// Read-only memory (integrated ROM, flash-resident firmware).
    Rom,
    /// Read-write memory (block RAM, SPRAM, external RAM).
    Ram,
    /// Memory-mapped peripheral registers.
    Mmio,
    /// Address space set aside but not decoded; exempt from overlap checks.
    Reserved,
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionKind::Rom => write!(f, "rom"),
            RegionKind::Ram => write!(f, "ram"),
            RegionKind::Mmio => write!(f, "mmio"),
            RegionKind::Reserved => write!(f, "reserved"),
        }
    }
}

/// A named, sized, based region of the system address space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AddressRegion {
    /// Region name, unique within a map (e.g., "rom", "sram", "spiflash").
    pub name: String,
    /// First address of the region.
    pub base: u64,
    /// Size in bytes. Always non-zero in a composed map.
    pub size: u64,
    /// Bus role of the region.
    pub kind: RegionKind,
    /// Parent region this one is carved out of, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub within: Option<String>,
}

impl AddressRegion {
    /// Create a top-level region.
    pub fn new(name: impl Into<String>, base: u64, size: u64, kind: RegionKind) -> Self {
        Self {
            name: name.into(),
            base,
            size,
            kind,
            within: None,
        }
    }

    /// Shorthand for a read-only region.
    pub fn rom(name: impl Into<String>, base: u64, size: u64) -> Self {
        Self::new(name, base, size, RegionKind::Rom)
    }

    /// Shorthand for a read-write region.
    pub fn ram(name: impl Into<String>, base: u64, size: u64) -> Self {
        Self::new(name, base, size, RegionKind::Ram)
    }

    /// Shorthand for a register region.
    pub fn mmio(name: impl Into<String>, base: u64, size: u64) -> Self {
        Self::new(name, base, size, RegionKind::Mmio)
    }

    /// Nest this region inside `parent`.
    pub fn within(mut self, parent: impl Into<String>) -> Self {
        self.within = Some(parent.into());
        self
    }

    /// Exclusive end address.
    pub fn end(&self) -> Result<u64> {
        self.base
            .checked_add(self.size)
            .ok_or_else(|| MapError::AddressOverflow {
                region: self.name.clone(),
            })
    }

    /// Whether this region takes part in bus decoding (everything but `Reserved`).
    pub fn is_enabled(&self) -> bool {
        self.kind != RegionKind::Reserved
    }

    /// Whether `addr` falls inside `[base, base + size)`.
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr - self.base < self.size
    }

    /// Whether this region lies entirely inside `outer`.
    pub fn fits_inside(&self, outer: &AddressRegion) -> bool {
        match (self.end(), outer.end()) {
            (Ok(end), Ok(outer_end)) => self.base >= outer.base && end <= outer_end,
            _ => false,
        }
    }
}

impl fmt::Display for AddressRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: 0x{:08X} - 0x{:08X} ({} bytes) [{}]",
            self.name,
            self.base,
            self.base.saturating_add(self.size),
            self.size,
            self.kind,
        )?;
        if let Some(parent) = &self.within {
            write!(f, " in {parent}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_is_exclusive() {
        let r = AddressRegion::ram("sram", 0x1000_0000, 0x2_0000);
        assert_eq!(r.end().unwrap(), 0x1002_0000);
        assert!(r.contains(0x1000_0000));
        assert!(r.contains(0x1001_FFFF));
        assert!(!r.contains(0x1002_0000));
        assert!(!r.contains(0x0FFF_FFFF));
    }

    #[test]
    fn end_overflow_is_reported() {
        let r = AddressRegion::mmio("top", u64::MAX, 2);
        assert_eq!(
            r.end().unwrap_err(),
            MapError::AddressOverflow {
                region: "top".into()
            }
        );
    }

    #[test]
    fn reserved_is_not_enabled() {
        assert!(AddressRegion::rom("rom", 0, 4).is_enabled());
        assert!(!AddressRegion::new("hole", 0, 4, RegionKind::Reserved).is_enabled());
    }

    #[test]
    fn nesting_containment() {
        let flash = AddressRegion::rom("spiflash", 0x2000_0000, 0x10_0000);
        let inner = AddressRegion::rom("rom", 0x2005_0000, 0x8000).within("spiflash");
        let outer = AddressRegion::rom("tail", 0x200F_F000, 0x2000).within("spiflash");
        assert!(inner.fits_inside(&flash));
        assert!(!outer.fits_inside(&flash));
    }

    #[test]
    fn display_format() {
        let r = AddressRegion::rom("rom", 0, 0x2c00);
        assert_eq!(r.to_string(), "rom: 0x00000000 - 0x00002C00 (11264 bytes) [rom]");
        let nested = AddressRegion::mmio("ctrl", 0x6000_0000, 0x800).within("csr");
        assert!(nested.to_string().ends_with("in csr"));
    }

    #[test]
    fn serde_kebab_case() {
        let r = AddressRegion::mmio("uart", 0x6000_1800, 0x800).within("csr");
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"kind\":\"mmio\""));
        assert!(json.contains("\"within\":\"csr\""));
        let back: AddressRegion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
