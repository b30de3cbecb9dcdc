//! Build configuration.
//!
//! Every option is optional on disk. Unset sizes and the boot source fall
//! back to the board's defaults, then to the values documented on each
//! field.

use std::path::Path;

use serde::{Deserialize, Serialize};
use socle_image::{Endianness, DEFAULT_SEED};

use crate::board::BoardDescriptor;
use crate::error::{ComposeError, Result};

/// Where the CPU fetches its first instruction from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BootSource {
    /// Integrated ROM in block RAM.
    #[default]
    InlineRom,
    /// SPI flash, past the gateware (and loader) preamble.
    ExternalFlash,
}

fn default_true() -> bool {
    true
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

/// Options for one SoC build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SocConfig {
    /// Integrated ROM size in bytes. Board default for inline-ROM boot, else 0.
    #[serde(default)]
    pub integrated_rom_size: Option<u64>,
    /// Integrated SRAM size in bytes. Board default, else 0.
    #[serde(default)]
    pub integrated_sram_size: Option<u64>,
    /// CPU reset address. Derived for external-flash boot; 0 otherwise.
    #[serde(default)]
    pub cpu_reset_address: Option<u64>,
    /// Board default, else inline ROM.
    #[serde(default)]
    pub boot_source: Option<BootSource>,
    /// Include the control (soft reset / scratch) peripheral. Default true.
    #[serde(default = "default_true")]
    pub with_control_peripheral: bool,
    /// Include a CPU. Bridge-only debug builds set this to false. Default true.
    #[serde(default = "default_true")]
    pub with_cpu: bool,
    /// Minimum firmware stub the boot ROM must hold.
    #[serde(default)]
    pub firmware_size: Option<u64>,
    /// Firmware stub placed in flash ahead of the user program. Board default, else none.
    #[serde(default)]
    pub flash_firmware_size: Option<u64>,
    /// Seed for placeholder firmware. Default 2373.
    #[serde(default = "default_seed")]
    pub placeholder_seed: u64,
    /// Byte order of the CPU bus. Default little.
    #[serde(default)]
    pub cpu_endianness: Endianness,
}

impl Default for SocConfig {
    fn default() -> Self {
        Self {
            integrated_rom_size: None,
            integrated_sram_size: None,
            cpu_reset_address: None,
            boot_source: None,
            with_control_peripheral: true,
            with_cpu: true,
            firmware_size: None,
            flash_firmware_size: None,
            placeholder_seed: DEFAULT_SEED,
            cpu_endianness: Endianness::Little,
        }
    }
}

/// A configuration with every board default filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub integrated_rom_size: u64,
    pub integrated_sram_size: u64,
    pub cpu_reset_address: Option<u64>,
    pub boot_source: BootSource,
    pub with_control_peripheral: bool,
    pub with_cpu: bool,
    pub firmware_size: Option<u64>,
    pub flash_firmware_size: Option<u64>,
    pub placeholder_seed: u64,
    pub cpu_endianness: Endianness,
}

impl SocConfig {
    /// Fill unset options from `board`.
    pub fn resolve(&self, board: &BoardDescriptor) -> ResolvedConfig {
        let d = &board.defaults;
        let boot_source = self.boot_source.unwrap_or(d.boot_source);
        let rom_default = match boot_source {
            BootSource::InlineRom => d.integrated_rom_size,
            BootSource::ExternalFlash => 0,
        };
        ResolvedConfig {
            integrated_rom_size: self.integrated_rom_size.unwrap_or(rom_default),
            integrated_sram_size: self.integrated_sram_size.unwrap_or(d.integrated_sram_size),
            cpu_reset_address: self.cpu_reset_address,
            boot_source,
            with_control_peripheral: self.with_control_peripheral,
            with_cpu: self.with_cpu,
            firmware_size: self.firmware_size,
            flash_firmware_size: self.flash_firmware_size.or(d.flash_firmware_size),
            placeholder_seed: self.placeholder_seed,
            cpu_endianness: self.cpu_endianness,
        }
    }

    /// Parse a configuration from TOML.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ComposeError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Self::from_toml(&std::fs::read_to_string(path)?)
    }
}
