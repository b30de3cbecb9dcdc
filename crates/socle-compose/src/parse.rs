//! TOML parsing, serialization, validation, and discovery for board files.
//!
//! Boards are stored as `.board.toml` files and variants as `.variant.toml`
//! files. This module loads, validates, serializes and discovers them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use socle_map::{MemoryMapBuilder, OverrideLayer, RegionKind};
use socle_reset::ClockDomainGraph;

use crate::board::BoardDescriptor;
use crate::error::{ComposeError, Result};
use crate::variant::BoardVariant;

const BOARD_SUFFIX: &str = ".board.toml";
const VARIANT_SUFFIX: &str = ".variant.toml";

/// A validation issue found in a board descriptor.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity: "error" or "warning".
    pub severity: &'static str,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: "error",
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: "warning",
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == "error"
    }
}

fn read_existing(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(ComposeError::NotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Load a board from a `.board.toml` file.
pub fn load_board_toml(path: &Path) -> Result<BoardDescriptor> {
    parse_board_toml(&read_existing(path)?)
}

/// Parse a board from a TOML string.
pub fn parse_board_toml(toml_str: &str) -> Result<BoardDescriptor> {
    let board: BoardDescriptor = toml::from_str(toml_str)?;
    Ok(board)
}

/// Serialize a board to pretty TOML.
pub fn board_to_toml(board: &BoardDescriptor) -> Result<String> {
    Ok(toml::to_string_pretty(board)?)
}

/// Load a variant from a `.variant.toml` file.
pub fn load_variant_toml(path: &Path) -> Result<BoardVariant> {
    parse_variant_toml(&read_existing(path)?)
}

/// Parse a variant from a TOML string.
pub fn parse_variant_toml(toml_str: &str) -> Result<BoardVariant> {
    let variant: BoardVariant = toml::from_str(toml_str)?;
    Ok(variant)
}

/// Serialize a variant to pretty TOML.
pub fn variant_to_toml(variant: &BoardVariant) -> Result<String> {
    Ok(toml::to_string_pretty(variant)?)
}

/// Validate a board descriptor for structural correctness.
///
/// Returns `Ok(())` if valid, or `Err(issues)` with a list of problems.
/// Warnings alone still produce `Err`; callers decide whether to proceed.
pub fn validate_board(board: &BoardDescriptor) -> std::result::Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    // Clock tree
    match ClockDomainGraph::new(board.clock_domains.clone()) {
        Ok(graph) => {
            if graph.domain(&board.sys_domain).is_none() {
                issues.push(ValidationIssue::error(format!(
                    "system clock domain '{}' is not declared",
                    board.sys_domain
                )));
            } else if graph.frequency_hz(&board.sys_domain).is_none() {
                issues.push(ValidationIssue::warning(format!(
                    "system clock domain '{}' has no known frequency",
                    board.sys_domain
                )));
            }
        }
        Err(e) => issues.push(ValidationIssue::error(format!("clock domains: {e}"))),
    }

    if board.sync_stages < 2 {
        issues.push(ValidationIssue::error(format!(
            "reset synchronizers need at least 2 stages, board declares {}",
            board.sync_stages
        )));
    }

    // Base map
    if board.regions.is_empty() {
        issues.push(ValidationIssue::error("board has no regions"));
    } else {
        let base = OverrideLayer::from_regions(board.name.clone(), board.regions.iter().cloned());
        if let Err(e) = MemoryMapBuilder::new(base).compose() {
            issues.push(ValidationIssue::error(format!("base map: {e}")));
        }
    }

    // CSR window
    match board.region(&board.csr.region) {
        None => issues.push(ValidationIssue::error(format!(
            "CSR window region '{}' not found",
            board.csr.region
        ))),
        Some(window) => {
            if window.kind != RegionKind::Mmio {
                issues.push(ValidationIssue::error(format!(
                    "CSR window '{}' is {}, expected mmio",
                    window.name, window.kind
                )));
            }
            if board.csr.slot_size == 0 {
                issues.push(ValidationIssue::error("CSR slot size is 0"));
            } else {
                let capacity = window.size / board.csr.slot_size;
                for (name, &slot) in &board.csr.slots {
                    if u64::from(slot) >= capacity {
                        issues.push(ValidationIssue::error(format!(
                            "CSR slot {slot} for '{name}' is outside the {capacity}-slot window"
                        )));
                    }
                }
            }
        }
    }

    // Flash preambles
    if let Some(flash) = &board.flash {
        match board.region(&flash.region) {
            None => issues.push(ValidationIssue::error(format!(
                "flash region '{}' not found",
                flash.region
            ))),
            Some(region) => {
                let preamble = flash
                    .gateware_size
                    .saturating_add(flash.bootloader_size.unwrap_or(0));
                if preamble >= region.size {
                    issues.push(ValidationIssue::error(format!(
                        "flash preambles (0x{preamble:X} bytes) leave no room in '{}' (0x{:X} bytes)",
                        region.name, region.size
                    )));
                }
            }
        }
    }

    // Interrupts
    let mut by_line: BTreeMap<u32, &str> = BTreeMap::new();
    for (name, &line) in &board.interrupts {
        if line >= board.interrupt_lines {
            issues.push(ValidationIssue::error(format!(
                "interrupt line {line} for '{name}' exceeds the {}-line controller",
                board.interrupt_lines
            )));
        }
        if let Some(existing) = by_line.insert(line, name) {
            issues.push(ValidationIssue::error(format!(
                "interrupt line {line} assigned to both '{existing}' and '{name}'"
            )));
        }
    }

    // Defaults
    if board.defaults.integrated_rom_size % 4 != 0 {
        issues.push(ValidationIssue::warning(format!(
            "default integrated ROM size 0x{:X} is not word-aligned; no placeholder can fill it",
            board.defaults.integrated_rom_size
        )));
    }
    if board.pins.is_empty() {
        issues.push(ValidationIssue::warning("board declares no pin resources"));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// Generate a template `.board.toml` for a new board.
///
/// Seeds from fomu-evt with the given custom name.
pub fn generate_template(name: &str) -> Result<String> {
    let mut board = BoardDescriptor::fomu_evt();
    board.name = name.into();
    board_to_toml(&board)
}

fn discover(dir: &Path, suffix: &str) -> Result<Vec<(String, PathBuf)>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if let Some(name) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(suffix))
        {
            found.push((name.to_string(), path.clone()));
        }
    }
    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found)
}

/// Discover all `.board.toml` files in `dir`.
///
/// Returns a list of (board_name, file_path) pairs sorted by name.
pub fn discover_boards(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    discover(dir, BOARD_SUFFIX)
}

/// Discover all `.variant.toml` files in `dir`.
pub fn discover_variants(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    discover(dir, VARIANT_SUFFIX)
}
