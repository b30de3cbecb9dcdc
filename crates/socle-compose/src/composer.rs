//! SoC composition.
//!
//! [`SocComposer::build`] folds a board, an optional variant, a build
//! configuration and any peripheral requests into a [`SocImage`]:
//!
//! 1. the board's base regions, then the variant's (after [`BoardVariant::check`])
//! 2. the configuration layer: integrated SRAM, the boot ROM or flash
//!    firmware stub, and the boot vectors derived from the flash preambles
//! 3. a placeholder image for inline-ROM builds with no compiled firmware
//! 4. the clock-domain graph and a reset sequencer per gated domain
//! 5. peripheral requests, packed into CSR slots
//!
//! Composition is pure. The composer owns its inputs and never mutates
//! them, so independent variants can be built side by side.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use socle_image::{generate, Endianness, PlaceholderImage};
use socle_map::{
    AddressRegion, BootVector, InterruptLayer, InterruptTable, MapError, MemoryMap, MemoryMapBuilder, OverrideLayer,
    RegionOverride, DEFAULT_ENTRY_BYTES,
};
use socle_reset::{ClockDomain, ClockDomainGraph, ResetError, ResetNetwork, ResetPlan};
use tracing::{debug, info, warn};

use crate::board::{BoardDescriptor, DEFAULT_ROM_BASE, DEFAULT_SRAM_BASE};
use crate::config::{BootSource, ResolvedConfig, SocConfig};
use crate::error::{ComposeError, Result};
use crate::hash::{bytes_hash, content_hash, hash_hex, ContentHash};
use crate::peripheral::{self, PeripheralRequest};
use crate::variant::{BoardVariant, PERIPHERAL_SHADOWS_REGION};

/// Boot ROM, inline or resident in flash.
pub const ROM_REGION: &str = "rom";
/// Integrated SRAM.
pub const SRAM_REGION: &str = "sram";
/// Flash left for the user program past the firmware stub.
pub const USER_FLASH_REGION: &str = "user_flash";
/// The CPU's first instruction.
pub const CPU_RESET_VECTOR: &str = "cpu_reset";
/// User program entry past the flash-resident firmware stub.
pub const FLASH_BOOT_VECTOR: &str = "flash_boot";

/// Where the boot ROM content comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FirmwareSource {
    /// A program supplied by the caller.
    Compiled,
    /// Seeded filler; not a bootable program.
    Placeholder,
    /// No ROM content is produced here (CPU-less or flash-booted builds).
    None,
}

/// What the composed SoC boots, without the bytes themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FirmwareSummary {
    pub source: FirmwareSource,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// A fully composed SoC, handed to the synthesis pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SocImage {
    pub board: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub device: String,
    /// Resolved frequency of the system clock domain, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sys_clk_hz: Option<u64>,
    /// Absent for CPU-less builds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_reset_address: Option<u64>,
    pub boot_source: BootSource,
    pub cpu_endianness: Endianness,
    pub constants: BTreeMap<String, u64>,
    pub csr_slots: BTreeMap<String, u32>,
    pub firmware: FirmwareSummary,
    pub memory_map: MemoryMap,
    pub interrupts: InterruptTable,
    /// Every clock domain, parents first.
    pub clock_domains: Vec<ClockDomain>,
    pub reset_plan: ResetPlan,
    /// Placeholder ROM content, when one was generated.
    #[serde(skip)]
    pub placeholder: Option<PlaceholderImage>,
}

impl SocImage {
    /// SHA-256 over the serialized image; equal for equal inputs.
    pub fn content_hash(&self) -> Result<ContentHash> {
        content_hash(self)
    }

    pub fn content_hash_hex(&self) -> Result<String> {
        Ok(hash_hex(&self.content_hash()?))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The placeholder artifact in the CPU's byte order.
    pub fn placeholder_bytes(&self) -> Option<Vec<u8>> {
        self.placeholder
            .as_ref()
            .map(|image| image.to_bytes(self.cpu_endianness))
    }
}

/// Region changes, boot vectors and size floors contributed by the configuration.
struct BootPlan {
    layer: OverrideLayer,
    vectors: Vec<BootVector>,
    minimums: Vec<(String, u64)>,
}

/// Builder for a single SoC composition.
#[derive(Debug, Clone)]
pub struct SocComposer {
    board: BoardDescriptor,
    config: SocConfig,
    variant: Option<BoardVariant>,
    firmware: Option<Vec<u8>>,
    peripherals: Vec<PeripheralRequest>,
}

impl SocComposer {
    pub fn new(board: BoardDescriptor, config: SocConfig) -> Self {
        Self {
            board,
            config,
            variant: None,
            firmware: None,
            peripherals: Vec::new(),
        }
    }

    /// Specialize the board with `variant`.
    pub fn variant(mut self, variant: BoardVariant) -> Self {
        self.variant = Some(variant);
        self
    }

    /// Supply compiled firmware; suppresses the placeholder.
    pub fn firmware(mut self, bytes: Vec<u8>) -> Self {
        self.firmware = Some(bytes);
        self
    }

    /// Request address space for an external peripheral.
    pub fn peripheral(mut self, request: PeripheralRequest) -> Self {
        self.peripherals.push(request);
        self
    }

    /// Compose and validate. Either every check passes or nothing is returned.
    pub fn build(&self) -> Result<SocImage> {
        let board = &self.board;
        let cfg = self.config.resolve(board);
        let variant_name = self.variant.as_ref().map(|v| v.name.clone());
        info!(
            board = %board.name,
            variant = variant_name.as_deref().unwrap_or("-"),
            boot_source = ?cfg.boot_source,
            "composing SoC"
        );

        if let Some(variant) = &self.variant {
            variant.check(board)?;
        }

        let mut builder = MemoryMapBuilder::new(OverrideLayer::from_regions(
            board.name.clone(),
            board.regions.iter().cloned(),
        ));
        if let Some(variant) = &self.variant {
            builder = builder.layer(variant.region_layer());
        }

        let boot = self.boot_plan(&cfg)?;
        let claimed: BTreeSet<&str> = board
            .regions
            .iter()
            .map(|r| r.name.as_str())
            .chain(self.variant.iter().flat_map(|v| v.regions.iter().map(|c| c.target())))
            .chain(boot.layer.overrides.iter().map(|c| c.target()))
            .collect();
        self.check_peripheral_names(&claimed)?;
        builder = builder.layer(boot.layer);
        for vector in boot.vectors {
            builder = builder.boot_vector(vector);
        }
        for (region, bytes) in boot.minimums {
            builder = builder.require_min_size(region, bytes);
        }

        let mut requests: Vec<PeripheralRequest> = self
            .variant
            .iter()
            .flat_map(|v| v.peripherals.iter().cloned())
            .collect();
        requests.extend(self.peripherals.iter().cloned());
        let peripherals = peripheral::resolve(board, cfg.with_control_peripheral, &requests)?;

        let memory_map = builder.layer(peripherals.regions).compose()?;
        debug!(regions = memory_map.len(), "memory map composed");

        let cpu_reset_address = if cfg.with_cpu {
            let derived = memory_map
                .boot_address(CPU_RESET_VECTOR)
                .ok_or_else(|| MapError::UnknownRegionReference {
                    name: CPU_RESET_VECTOR.into(),
                })?;
            if let Some(configured) = cfg.cpu_reset_address {
                if configured != derived {
                    return Err(ComposeError::ResetAddressConflict { configured, derived });
                }
            }
            Some(derived)
        } else {
            None
        };

        let mut interrupt_layers = vec![InterruptLayer {
            name: board.name.clone(),
            lines: board.interrupts.clone(),
        }];
        if let Some(variant) = &self.variant {
            interrupt_layers.push(variant.interrupt_layer());
        }
        interrupt_layers.push(peripherals.interrupts);
        let interrupts = InterruptTable::compose(board.interrupt_lines, &interrupt_layers)?;

        let mut graph = ClockDomainGraph::new(board.clock_domains.clone())?;
        if let Some(variant) = &self.variant {
            if !variant.clock_domains.is_empty() {
                graph = graph.extend(variant.clock_domains.iter().cloned())?;
            }
        }
        if graph.domain(&board.sys_domain).is_none() {
            return Err(ResetError::UnknownDomain {
                name: board.sys_domain.clone(),
            }
            .into());
        }
        let sys_clk_hz = graph.frequency_hz(&board.sys_domain);
        let reset_plan = ResetNetwork::power_up(&graph, board.sync_stages)?.plan();

        let (firmware, placeholder) = self.firmware_for(&cfg, &memory_map)?;

        let inline_rom = cfg.with_cpu && cfg.boot_source == BootSource::InlineRom;
        let mut constants = BTreeMap::new();
        if let Some(hz) = sys_clk_hz {
            constants.insert("CONFIG_CLOCK_FREQUENCY".to_string(), hz);
        }
        if let Some(addr) = cpu_reset_address {
            constants.insert("CONFIG_CPU_RESET_ADDR".to_string(), addr);
        }
        if let Some(addr) = memory_map.boot_address(FLASH_BOOT_VECTOR) {
            constants.insert("FLASH_BOOT_ADDRESS".to_string(), addr);
        }
        if !inline_rom {
            constants.insert("ROM_DISABLE".to_string(), 1);
        }

        info!(
            board = %board.name,
            regions = memory_map.len(),
            domains = graph.len(),
            cpu_reset = ?cpu_reset_address,
            "SoC composed"
        );

        Ok(SocImage {
            board: board.name.clone(),
            variant: variant_name,
            device: board.device.clone(),
            sys_clk_hz,
            cpu_reset_address,
            boot_source: cfg.boot_source,
            cpu_endianness: cfg.cpu_endianness,
            constants,
            csr_slots: peripherals.csr_slots,
            firmware,
            memory_map,
            interrupts,
            clock_domains: graph.topological().cloned().collect(),
            reset_plan,
            placeholder,
        })
    }

    /// The configuration's contribution to the map.
    /// Peripheral requests add regions; they never take over one the board,
    /// variant or configuration already declares.
    fn check_peripheral_names(&self, claimed: &BTreeSet<&str>) -> Result<()> {
        if let Some(variant) = &self.variant {
            if let Some(request) = variant.peripherals.iter().find(|r| claimed.contains(r.name.as_str())) {
                return Err(variant.incompatible(&request.name, PERIPHERAL_SHADOWS_REGION.into()));
            }
        }
        match self.peripherals.iter().find(|r| claimed.contains(r.name.as_str())) {
            Some(request) => Err(ComposeError::DuplicatePeripheral {
                name: request.name.clone(),
            }),
            None => Ok(()),
        }
    }

    fn boot_plan(&self, cfg: &ResolvedConfig) -> Result<BootPlan> {
        let mut plan = BootPlan {
            layer: OverrideLayer::new("config"),
            vectors: Vec::new(),
            minimums: Vec::new(),
        };

        if cfg.integrated_sram_size > 0 {
            plan.layer.push(RegionOverride::Replace(AddressRegion::ram(
                SRAM_REGION,
                DEFAULT_SRAM_BASE,
                cfg.integrated_sram_size,
            )));
        }

        if !cfg.with_cpu {
            debug!("no CPU: skipping boot ROM and vectors");
            return Ok(plan);
        }

        let firmware_len = self.firmware.as_ref().map(|f| f.len() as u64);
        match cfg.boot_source {
            BootSource::InlineRom => {
                let size = if cfg.integrated_rom_size > 0 {
                    cfg.integrated_rom_size
                } else {
                    cfg.firmware_size.or(firmware_len).unwrap_or(0)
                };
                if size == 0 {
                    return Err(MapError::UndersizedRegion {
                        region: ROM_REGION.into(),
                        required: DEFAULT_ENTRY_BYTES,
                        actual: 0,
                    }
                    .into());
                }
                let base = cfg.cpu_reset_address.unwrap_or(DEFAULT_ROM_BASE);
                debug!(base, size, "inline boot ROM");
                plan.layer
                    .push(RegionOverride::Replace(AddressRegion::rom(ROM_REGION, base, size)));
                plan.vectors.push(BootVector::new(CPU_RESET_VECTOR, ROM_REGION));
                plan.minimums
                    .extend(cfg.firmware_size.map(|bytes| (ROM_REGION.to_string(), bytes)));
                plan.minimums
                    .extend(firmware_len.map(|bytes| (ROM_REGION.to_string(), bytes)));
            }
            BootSource::ExternalFlash => {
                if cfg.integrated_rom_size > 0 {
                    return Err(ComposeError::Validation {
                        detail: format!(
                            "integrated ROM of {} bytes is unused when booting from external flash",
                            cfg.integrated_rom_size
                        ),
                    });
                }
                let flash = self
                    .board
                    .flash
                    .as_ref()
                    .ok_or_else(|| ComposeError::NoFlashLayout {
                        board: self.board.name.clone(),
                    })?;
                let mut reset = BootVector::new(CPU_RESET_VECTOR, flash.region.clone())
                    .stage("gateware", flash.gateware_size);
                if let Some(bootloader) = flash.bootloader_size {
                    reset = reset.stage("bootloader", bootloader);
                }

                match cfg.flash_firmware_size {
                    Some(stub) => {
                        let flash_region = self.effective_region(&flash.region)?;
                        let overflow = || MapError::AddressOverflow {
                            region: flash.region.clone(),
                        };
                        let stub_base = flash_region
                            .base
                            .checked_add(reset.offset()?)
                            .ok_or_else(overflow)?;
                        debug!(base = stub_base, size = stub, "flash-resident firmware stub");
                        plan.layer.push(RegionOverride::Replace(
                            AddressRegion::rom(ROM_REGION, stub_base, stub).within(flash.region.clone()),
                        ));

                        let boot = BootVector {
                            name: FLASH_BOOT_VECTOR.into(),
                            ..reset.clone()
                        }
                        .stage("firmware", stub);
                        let used = boot.offset()?;
                        if let Some(remaining) = flash_region.size.checked_sub(used).filter(|&r| r > 0) {
                            let user_base = flash_region.base.checked_add(used).ok_or_else(overflow)?;
                            plan.layer.push(RegionOverride::Replace(
                                AddressRegion::rom(USER_FLASH_REGION, user_base, remaining)
                                    .within(flash.region.clone()),
                            ));
                        }
                        plan.minimums
                            .extend(firmware_len.map(|bytes| (ROM_REGION.to_string(), bytes)));
                        plan.vectors.push(reset);
                        plan.vectors.push(boot);
                    }
                    None => {
                        if let Some(len) = firmware_len {
                            reset = reset.entry_bytes(len.max(DEFAULT_ENTRY_BYTES));
                        }
                        plan.vectors.push(reset);
                    }
                }
            }
        }
        Ok(plan)
    }

    /// A board region as the variant leaves it. Variants only replace, so the
    /// last replacement wins.
    fn effective_region(&self, name: &str) -> Result<AddressRegion> {
        let replaced = self
            .variant
            .iter()
            .flat_map(|v| v.regions.iter())
            .filter_map(|change| match change {
                RegionOverride::Replace(region) if region.name == name => Some(region),
                _ => None,
            })
            .last();
        replaced
            .or_else(|| self.board.region(name))
            .cloned()
            .ok_or_else(|| MapError::UnknownRegionReference { name: name.into() }.into())
    }

    fn firmware_for(
        &self,
        cfg: &ResolvedConfig,
        map: &MemoryMap,
    ) -> Result<(FirmwareSummary, Option<PlaceholderImage>)> {
        let none = FirmwareSummary {
            source: FirmwareSource::None,
            size: 0,
            seed: None,
            sha256: None,
        };
        if !cfg.with_cpu {
            return Ok((none, None));
        }
        if let Some(bytes) = &self.firmware {
            return Ok((
                FirmwareSummary {
                    source: FirmwareSource::Compiled,
                    size: bytes.len() as u64,
                    seed: None,
                    sha256: Some(hash_hex(&bytes_hash(bytes))),
                },
                None,
            ));
        }
        if cfg.boot_source != BootSource::InlineRom {
            return Ok((none, None));
        }

        let rom = map
            .region(ROM_REGION)
            .ok_or_else(|| MapError::UnknownRegionReference {
                name: ROM_REGION.into(),
            })?;
        let image = generate(rom.size, cfg.placeholder_seed)?;
        warn!(
            size = image.size,
            seed = image.seed,
            "no compiled firmware; ROM filled with placeholder content"
        );
        Ok((
            FirmwareSummary {
                source: FirmwareSource::Placeholder,
                size: image.size,
                seed: Some(image.seed),
                sha256: Some(hash_hex(&image.digest())),
            },
            Some(image),
        ))
    }
}

/// Compose `board` under `config` with no variant, firmware or extra peripherals.
pub fn build(board: &BoardDescriptor, config: &SocConfig) -> Result<SocImage> {
    SocComposer::new(board.clone(), config.clone()).build()
}
