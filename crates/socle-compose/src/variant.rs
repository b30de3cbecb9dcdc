//! Board variants.
//!
//! A variant is a data value layered over a base board: extra regions,
//! wholesale replacements, extra clock domains, interrupt assignments and
//! peripheral requests. It never edits the board it extends. [`BoardVariant::check`]
//! enforces what a variant may change before the composer folds it in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use socle_map::{InterruptLayer, OverrideLayer, RegionOverride};
use socle_reset::{ClockDomain, Derivation};
use tracing::debug;

use crate::board::BoardDescriptor;
use crate::error::{ComposeError, Result};
use crate::peripheral::PeripheralRequest;

pub(crate) const PERIPHERAL_SHADOWS_REGION: &str = "peripheral request would replace an existing region";

/// A restricted specialization of a base board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BoardVariant {
    /// Variant name (e.g., "fomu-evt-usb").
    pub name: String,
    /// Name of the board this variant extends.
    pub base: String,
    #[serde(default)]
    pub regions: Vec<RegionOverride>,
    #[serde(default)]
    pub clock_domains: Vec<ClockDomain>,
    #[serde(default)]
    pub interrupts: BTreeMap<String, u32>,
    #[serde(default)]
    pub peripherals: Vec<PeripheralRequest>,
}

impl BoardVariant {
    /// An empty variant of `base`.
    pub fn new(name: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: base.into(),
            regions: Vec::new(),
            clock_domains: Vec::new(),
            interrupts: BTreeMap::new(),
            peripherals: Vec::new(),
        }
    }

    pub(crate) fn incompatible(&self, target: &str, reason: String) -> ComposeError {
        ComposeError::IncompatibleOverride {
            variant: self.name.clone(),
            target: target.into(),
            reason,
        }
    }

    /// Reject anything beyond adding regions, domains or peripherals, or
    /// growing a boot-vector region in place.
    pub fn check(&self, board: &BoardDescriptor) -> Result<()> {
        if self.base != board.name {
            return Err(ComposeError::Validation {
                detail: format!(
                    "variant '{}' extends '{}', not '{}'",
                    self.name, self.base, board.name
                ),
            });
        }

        let boot_regions = board.boot_regions();
        for change in &self.regions {
            let region = match change {
                RegionOverride::Replace(region) => region,
                RegionOverride::Adjust { name, .. } => {
                    return Err(self.incompatible(name, "variants may not adjust regions in place".into()));
                }
            };
            let Some(existing) = board.region(&region.name) else {
                debug!(variant = %self.name, region = %region.name, "variant adds region");
                continue;
            };
            if !boot_regions.contains(&existing.name.as_str()) {
                return Err(self.incompatible(
                    &region.name,
                    "only regions referenced by a boot vector may be replaced".into(),
                ));
            }
            if region.size < existing.size {
                return Err(self.incompatible(
                    &region.name,
                    format!("replacement shrinks it from {} to {} bytes", existing.size, region.size),
                ));
            }
            if region.kind != existing.kind {
                return Err(self.incompatible(
                    &region.name,
                    format!("replacement changes its kind from {} to {}", existing.kind, region.kind),
                ));
            }
            debug!(variant = %self.name, region = %region.name, size = region.size, "variant replaces boot region");
        }

        for domain in &self.clock_domains {
            if board.clock_domains.iter().any(|d| d.name == domain.name) {
                return Err(self.incompatible(&domain.name, "clock domain is already declared by the board".into()));
            }
        }

        for request in &self.peripherals {
            let shadows_variant = self.regions.iter().any(|c| c.target() == request.name);
            if board.region(&request.name).is_some() || shadows_variant {
                return Err(self.incompatible(&request.name, PERIPHERAL_SHADOWS_REGION.into()));
            }
        }
        Ok(())
    }

    /// Region changes as an override layer.
    pub fn region_layer(&self) -> OverrideLayer {
        OverrideLayer {
            name: self.name.clone(),
            overrides: self.regions.clone(),
        }
    }

    /// Interrupt assignments as a layer.
    pub fn interrupt_layer(&self) -> InterruptLayer {
        InterruptLayer {
            name: self.name.clone(),
            lines: self.interrupts.clone(),
        }
    }

    /// Fomu EVT with the USB device core: a 12 MHz domain for the USB
    /// engine, and the device's endpoint registers on interrupt 3.
    pub fn fomu_evt_usb() -> Self {
        let mut variant = Self::new("fomu-evt-usb", "fomu-evt");
        variant
            .clock_domains
            .push(ClockDomain::derived("usb_12", "usb_48", Derivation::Divider { divisor: 4 }));
        variant
            .peripherals
            .push(PeripheralRequest::csr("usb", 0x800).with_interrupt(3).with_pins("usb"));
        variant
    }

    /// TinyFPGA BX with the USB device core, polled.
    pub fn tinyfpga_bx_usb() -> Self {
        let mut variant = Self::new("tinyfpga-bx-usb", "tinyfpga-bx");
        variant
            .peripherals
            .push(PeripheralRequest::csr("usb", 0x800).with_pins("usb"));
        variant
    }

    /// Every built-in variant.
    pub fn builtin() -> Vec<Self> {
        vec![Self::fomu_evt_usb(), Self::tinyfpga_bx_usb()]
    }

    /// Look up a built-in variant by name.
    pub fn builtin_named(name: &str) -> Option<Self> {
        Self::builtin().into_iter().find(|v| v.name == name)
    }
}
