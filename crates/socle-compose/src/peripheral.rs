//! Peripheral region requests and CSR slot assignment.
//!
//! Peripheral cores are external collaborators: each asks for a named region
//! of some size and kind, optionally an interrupt line and a pin resource,
//! and gets back a resolved [`AddressRegion`]. Requests without an explicit
//! base are packed into the CSR window after every slot the base SoC already
//! uses, in request order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use socle_map::{AddressRegion, InterruptLayer, MapError, OverrideLayer, RegionKind, RegionOverride};
use tracing::debug;

use crate::board::BoardDescriptor;
use crate::error::{ComposeError, Result};

/// Name of the control peripheral, always at CSR slot 0.
pub const CONTROL_PERIPHERAL: &str = "ctrl";

fn default_kind() -> RegionKind {
    RegionKind::Mmio
}

/// A collaborator's request for address space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PeripheralRequest {
    pub name: String,
    /// Requested size in bytes.
    pub size: u64,
    #[serde(default = "default_kind")]
    pub kind: RegionKind,
    /// Fixed base address; omitted for CSR-window allocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupt: Option<u32>,
    /// Pin resource the peripheral drives (must exist on the board).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pins: Option<String>,
}

impl PeripheralRequest {
    /// A register block in the CSR window.
    pub fn csr(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            kind: RegionKind::Mmio,
            base: None,
            interrupt: None,
            pins: None,
        }
    }

    /// A region at a fixed address (e.g., a memory behind a peripheral bus).
    pub fn fixed(name: impl Into<String>, base: u64, size: u64, kind: RegionKind) -> Self {
        Self {
            name: name.into(),
            size,
            kind,
            base: Some(base),
            interrupt: None,
            pins: None,
        }
    }

    pub fn with_interrupt(mut self, line: u32) -> Self {
        self.interrupt = Some(line);
        self
    }

    pub fn with_pins(mut self, resource: impl Into<String>) -> Self {
        self.pins = Some(resource.into());
        self
    }
}

/// Requests turned into layers the map and interrupt table can absorb.
#[derive(Debug, Clone)]
pub struct ResolvedPeripherals {
    pub regions: OverrideLayer,
    pub interrupts: InterruptLayer,
    /// Every occupied CSR slot, core peripherals included.
    pub csr_slots: BTreeMap<String, u32>,
}

/// Assign addresses to the core CSR peripherals and to `requests`.
pub fn resolve(
    board: &BoardDescriptor,
    with_control: bool,
    requests: &[PeripheralRequest],
) -> Result<ResolvedPeripherals> {
    let window = board
        .region(&board.csr.region)
        .ok_or_else(|| MapError::UnknownRegionReference {
            name: board.csr.region.clone(),
        })?;
    let slot_size = board.csr.slot_size;
    if slot_size == 0 {
        return Err(ComposeError::Validation {
            detail: format!("CSR window '{}' has a zero slot size", board.csr.region),
        });
    }
    let slot_base = |slot: u32| -> Result<u64> {
        u64::from(slot)
            .checked_mul(slot_size)
            .and_then(|offset| window.base.checked_add(offset))
            .ok_or_else(|| {
                MapError::AddressOverflow {
                    region: board.csr.region.clone(),
                }
                .into()
            })
    };

    let mut csr_slots = board.csr.slots.clone();
    if with_control {
        csr_slots.entry(CONTROL_PERIPHERAL.to_string()).or_insert(0);
    } else {
        csr_slots.remove(CONTROL_PERIPHERAL);
    }

    let mut regions = OverrideLayer::new("peripherals");
    for (name, &slot) in &csr_slots {
        regions.push(RegionOverride::Replace(
            AddressRegion::mmio(name.clone(), slot_base(slot)?, slot_size).within(board.csr.region.clone()),
        ));
    }

    let mut next_slot = csr_slots.values().max().map_or(0, |&s| s + 1);
    let mut interrupts = InterruptLayer::new("peripherals");
    let mut seen: Vec<&str> = Vec::new();
    for request in requests {
        let name = request.name.as_str();
        if seen.contains(&name) || csr_slots.contains_key(name) {
            return Err(ComposeError::DuplicatePeripheral { name: name.into() });
        }
        seen.push(name);

        if let Some(resource) = &request.pins {
            if board.pin_resource(resource).is_none() {
                return Err(ComposeError::UnknownPinResource {
                    peripheral: name.into(),
                    resource: resource.clone(),
                });
            }
        }

        let region = match request.base {
            Some(base) => AddressRegion::new(name, base, request.size, request.kind),
            None => {
                if request.kind != RegionKind::Mmio {
                    return Err(ComposeError::Validation {
                        detail: format!(
                            "peripheral '{name}' requests a {} region without a base address",
                            request.kind
                        ),
                    });
                }
                let slots = request.size.max(1).div_ceil(slot_size);
                let slot = next_slot;
                next_slot = u32::try_from(slots)
                    .ok()
                    .and_then(|n| next_slot.checked_add(n))
                    .ok_or_else(|| MapError::AddressOverflow {
                        region: board.csr.region.clone(),
                    })?;
                debug!(peripheral = name, slot, slots, "assigned CSR slot");
                csr_slots.insert(name.to_string(), slot);
                AddressRegion::mmio(name, slot_base(slot)?, request.size).within(board.csr.region.clone())
            }
        };
        regions.push(RegionOverride::Replace(region));

        if let Some(line) = request.interrupt {
            interrupts.lines.insert(name.to_string(), line);
        }
    }

    Ok(ResolvedPeripherals {
        regions,
        interrupts,
        csr_slots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_peripheral_at_slot_zero() {
        let board = BoardDescriptor::fomu_evt();
        let resolved = resolve(&board, true, &[]).unwrap();
        assert_eq!(resolved.csr_slots.get(CONTROL_PERIPHERAL), Some(&0));
        let ctrl = resolved
            .regions
            .iter()
            .find(|o| o.target() == CONTROL_PERIPHERAL)
            .unwrap();
        assert!(matches!(ctrl, RegionOverride::Replace(r) if r.base == 0x6000_0000));
    }

    #[test]
    fn control_peripheral_optional() {
        let board = BoardDescriptor::fomu_evt();
        let resolved = resolve(&board, false, &[]).unwrap();
        assert!(!resolved.csr_slots.contains_key(CONTROL_PERIPHERAL));
    }

    #[test]
    fn requests_follow_core_slots() {
        let board = BoardDescriptor::fomu_evt();
        let requests = vec![
            PeripheralRequest::csr("usb", 0x1000).with_interrupt(3).with_pins("usb"),
            PeripheralRequest::csr("info", 0x100),
        ];
        let resolved = resolve(&board, true, &requests).unwrap();
        // Core slots end at timer0 = 5; usb needs two slots.
        assert_eq!(resolved.csr_slots["usb"], 6);
        assert_eq!(resolved.csr_slots["info"], 8);
        assert_eq!(resolved.interrupts.lines.get("usb"), Some(&3));
        let info = resolved.regions.iter().find(|o| o.target() == "info").unwrap();
        assert!(matches!(info, RegionOverride::Replace(r) if r.base == 0x6000_4000 && r.size == 0x100));
    }

    #[test]
    fn fixed_base_requests_are_top_level() {
        let board = BoardDescriptor::fomu_evt();
        let requests = vec![PeripheralRequest::fixed("sprom", 0x3000_0000, 0x1_0000, RegionKind::Rom)];
        let resolved = resolve(&board, true, &requests).unwrap();
        let sprom = resolved.regions.iter().find(|o| o.target() == "sprom").unwrap();
        assert!(matches!(sprom, RegionOverride::Replace(r) if r.within.is_none()));
        assert!(!resolved.csr_slots.contains_key("sprom"));
    }

    #[test]
    fn duplicate_requests_rejected() {
        let board = BoardDescriptor::fomu_evt();
        let requests = vec![PeripheralRequest::csr("usb", 4), PeripheralRequest::csr("usb", 4)];
        assert!(matches!(
            resolve(&board, true, &requests),
            Err(ComposeError::DuplicatePeripheral { ref name }) if name == "usb"
        ));
        let clash = vec![PeripheralRequest::csr("timer0", 4)];
        assert!(matches!(
            resolve(&board, true, &clash),
            Err(ComposeError::DuplicatePeripheral { .. })
        ));
    }

    #[test]
    fn unknown_pins_rejected() {
        let board = BoardDescriptor::tinyfpga_bx();
        let requests = vec![PeripheralRequest::csr("eth", 0x800).with_pins("eth_clocks")];
        assert!(matches!(
            resolve(&board, true, &requests),
            Err(ComposeError::UnknownPinResource { ref resource, .. }) if resource == "eth_clocks"
        ));
    }

    #[test]
    fn memory_request_needs_base() {
        let board = BoardDescriptor::fomu_evt();
        let mut request = PeripheralRequest::csr("spram", 0x1_0000);
        request.kind = RegionKind::Ram;
        assert!(matches!(
            resolve(&board, true, &[request]),
            Err(ComposeError::Validation { .. })
        ));
    }
}
