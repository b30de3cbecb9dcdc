//! Board descriptors.
//!
//! A board descriptor is everything the composer needs to know about a
//! physical board: its oscillator and derived clocks, the fixed part of its
//! address map, where gateware and loaders sit in flash, its CSR window, and
//! an opaque catalog of pin resources. Pin electrical details are carried
//! through untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use socle_map::{AddressRegion, DEFAULT_INTERRUPT_LINES};
use socle_reset::{ClockDomain, Derivation, DEFAULT_SYNC_STAGES};

use crate::config::BootSource;

/// Base address of the integrated ROM when no reset address is configured.
pub const DEFAULT_ROM_BASE: u64 = 0x0000_0000;
/// Base address of integrated SRAM.
pub const DEFAULT_SRAM_BASE: u64 = 0x1000_0000;
/// Base address of the CSR bus window.
pub const DEFAULT_CSR_BASE: u64 = 0x6000_0000;
/// Bytes per CSR slot.
pub const DEFAULT_CSR_SLOT_SIZE: u64 = 0x800;

fn default_sys_domain() -> String {
    "sys".into()
}

fn default_interrupt_lines() -> u32 {
    DEFAULT_INTERRUPT_LINES
}

fn default_sync_stages() -> usize {
    DEFAULT_SYNC_STAGES
}

/// Where gateware and loaders sit in the board's boot flash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FlashLayout {
    /// Region holding the flash (e.g., "spiflash").
    pub region: String,
    /// Bytes reserved for the gateware image at the start of flash.
    pub gateware_size: u64,
    /// Bytes reserved for a second-stage loader bitstream, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootloader_size: Option<u64>,
}

/// The CSR bus window and the slots the base SoC already occupies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CsrWindow {
    /// Region holding the window (e.g., "csr").
    pub region: String,
    /// Bytes per slot.
    pub slot_size: u64,
    /// Core peripherals present in every build, by slot.
    #[serde(default)]
    pub slots: BTreeMap<String, u32>,
}

/// Per-board defaults for configuration options left unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BoardDefaults {
    #[serde(default)]
    pub integrated_rom_size: u64,
    #[serde(default)]
    pub integrated_sram_size: u64,
    #[serde(default)]
    pub boot_source: BootSource,
    /// Firmware stub placed in flash ahead of the user program.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flash_firmware_size: Option<u64>,
}

/// A pin subsignal within a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Subsignal {
    pub name: String,
    pub pins: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io_standard: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub misc: Vec<String>,
}

/// A requestable pin resource, passed through to synthesis uninterpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PinResource {
    pub name: String,
    #[serde(default)]
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pins: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io_standard: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subsignals: Vec<Subsignal>,
}

impl PinResource {
    fn single(name: &str, index: u32, pins: &str) -> Self {
        Self {
            name: name.into(),
            index,
            pins: Some(pins.into()),
            io_standard: Some("LVCMOS33".into()),
            subsignals: Vec::new(),
        }
    }

    fn bundle(name: &str, subsignals: &[(&str, &str)]) -> Self {
        Self {
            name: name.into(),
            index: 0,
            pins: None,
            io_standard: Some("LVCMOS33".into()),
            subsignals: subsignals
                .iter()
                .map(|(n, p)| Subsignal {
                    name: (*n).into(),
                    pins: (*p).into(),
                    io_standard: None,
                    misc: Vec::new(),
                })
                .collect(),
        }
    }
}

/// A physical board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BoardDescriptor {
    /// Board name (e.g., "fomu-evt").
    pub name: String,
    /// FPGA part (e.g., "ice40-up5k-sg48").
    pub device: String,
    /// Clock domain the CPU and bus run in.
    #[serde(default = "default_sys_domain")]
    pub sys_domain: String,
    pub clock_domains: Vec<ClockDomain>,
    /// Fixed regions of the base address map.
    pub regions: Vec<AddressRegion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flash: Option<FlashLayout>,
    pub csr: CsrWindow,
    pub defaults: BoardDefaults,
    /// Base interrupt assignments.
    #[serde(default)]
    pub interrupts: BTreeMap<String, u32>,
    #[serde(default = "default_interrupt_lines")]
    pub interrupt_lines: u32,
    /// Flops in each reset synchronizer.
    #[serde(default = "default_sync_stages")]
    pub sync_stages: usize,
    #[serde(default)]
    pub pins: Vec<PinResource>,
}

impl BoardDescriptor {
    /// Look up a region of the base map.
    pub fn region(&self, name: &str) -> Option<&AddressRegion> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Look up a pin resource by name, any index.
    pub fn pin_resource(&self, name: &str) -> Option<&PinResource> {
        self.pins.iter().find(|p| p.name == name)
    }

    /// Regions a boot vector depends on; variants may only grow these.
    pub fn boot_regions(&self) -> Vec<&str> {
        self.flash.iter().map(|f| f.region.as_str()).collect()
    }

    /// Fomu EVT: iCE40UP5K, 48 MHz oscillator with a PLL down to a 16 MHz
    /// system clock, 128 KiB of SPRAM used as SRAM, 16 MiB SPI flash.
    pub fn fomu_evt() -> Self {
        Self {
            name: "fomu-evt".into(),
            device: "ice40-up5k-sg48".into(),
            sys_domain: default_sys_domain(),
            clock_domains: vec![
                ClockDomain::primary("usb_48", 48_000_000).reset_less(),
                ClockDomain::derived("sys", "usb_48", Derivation::Pll { divr: 2, divf: 63, divq: 6 }),
            ],
            regions: vec![
                AddressRegion::ram("sram", DEFAULT_SRAM_BASE, 128 * 1024),
                AddressRegion::rom("spiflash", 0x2000_0000, 16 * 1024 * 1024),
                AddressRegion::mmio("csr", DEFAULT_CSR_BASE, 0x1_0000),
            ],
            flash: Some(FlashLayout {
                region: "spiflash".into(),
                gateware_size: 0x2_0000,
                bootloader_size: None,
            }),
            csr: soc_core_csr(),
            defaults: BoardDefaults {
                integrated_rom_size: 0x2c00,
                integrated_sram_size: 0,
                boot_source: BootSource::InlineRom,
                flash_firmware_size: None,
            },
            interrupts: soc_core_interrupts(),
            interrupt_lines: DEFAULT_INTERRUPT_LINES,
            sync_stages: DEFAULT_SYNC_STAGES,
            pins: vec![
                PinResource::single("user_led_n", 0, "41"),
                PinResource::single("user_ledr_n", 0, "40"),
                PinResource::single("user_ledg_n", 0, "39"),
                PinResource::single("user_btn_n", 0, "42"),
                PinResource::single("user_btn_n", 1, "38"),
                PinResource::bundle("serial", &[("rx", "21"), ("tx", "13")]),
                PinResource::bundle("usb", &[("d_p", "34"), ("d_n", "37"), ("pullup", "35")]),
                PinResource::bundle(
                    "spiflash",
                    &[("cs_n", "16"), ("clk", "15"), ("miso", "17"), ("mosi", "14"), ("wp", "18"), ("hold", "19")],
                ),
                PinResource::single("clk48", 0, "44"),
            ],
        }
    }

    /// TinyFPGA BX: iCE40LP8K, 16 MHz oscillator driving the system clock
    /// directly and a PLL up to 48 MHz for USB, 1 MiB SPI flash shared with
    /// the gateware and the USB bootloader bitstream.
    pub fn tinyfpga_bx() -> Self {
        Self {
            name: "tinyfpga-bx".into(),
            device: "ice40-lp8k-cm81".into(),
            sys_domain: default_sys_domain(),
            clock_domains: vec![
                ClockDomain::primary("sys", 16_000_000),
                ClockDomain::derived("usb_48", "sys", Derivation::Pll { divr: 0, divf: 47, divq: 4 }).reset_less(),
            ],
            regions: vec![
                AddressRegion::rom("spiflash", 0x2000_0000, 1024 * 1024),
                AddressRegion::mmio("csr", DEFAULT_CSR_BASE, 0x1_0000),
            ],
            flash: Some(FlashLayout {
                region: "spiflash".into(),
                gateware_size: 0x2_8000,
                bootloader_size: Some(0x2_8000),
            }),
            csr: soc_core_csr(),
            defaults: BoardDefaults {
                integrated_rom_size: 0,
                integrated_sram_size: 0x2800,
                boot_source: BootSource::ExternalFlash,
                flash_firmware_size: Some(0x8000),
            },
            interrupts: soc_core_interrupts(),
            interrupt_lines: DEFAULT_INTERRUPT_LINES,
            sync_stages: DEFAULT_SYNC_STAGES,
            pins: vec![
                PinResource::single("user_led", 0, "B3"),
                PinResource::single("clk16", 0, "B2"),
                PinResource::bundle("serial", &[("rx", "A2"), ("tx", "A1")]),
                PinResource::bundle("usb", &[("d_p", "B4"), ("d_n", "A4"), ("pullup", "A3")]),
                PinResource::bundle(
                    "spiflash",
                    &[("cs_n", "F7"), ("clk", "G7"), ("mosi", "G6"), ("miso", "H7"), ("wp", "H4"), ("hold", "J8")],
                ),
            ],
        }
    }

    /// Every built-in board.
    pub fn builtin() -> Vec<Self> {
        vec![Self::fomu_evt(), Self::tinyfpga_bx()]
    }

    /// Look up a built-in board by name.
    pub fn builtin_named(name: &str) -> Option<Self> {
        Self::builtin().into_iter().find(|b| b.name == name)
    }
}

/// Core peripherals every SoC carries in the CSR window. Slot 0 is kept for
/// the control peripheral.
fn soc_core_csr() -> CsrWindow {
    CsrWindow {
        region: "csr".into(),
        slot_size: DEFAULT_CSR_SLOT_SIZE,
        slots: BTreeMap::from([
            ("uart_phy".to_string(), 2),
            ("uart".to_string(), 3),
            ("identifier_mem".to_string(), 4),
            ("timer0".to_string(), 5),
        ]),
    }
}

fn soc_core_interrupts() -> BTreeMap<String, u32> {
    BTreeMap::from([("timer0".to_string(), 1), ("uart".to_string(), 2)])
}
