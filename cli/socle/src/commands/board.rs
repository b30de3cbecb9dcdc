//! `socle board` — board listing, description and validation.

use std::path::Path;

use anyhow::{bail, Context, Result};
use socle_compose::{board_to_toml, generate_template, load_board_toml, validate_board, BoardDescriptor, BoardVariant};
use socle_reset::ClockDomainGraph;

use crate::resolve;

fn format_hz(hz: u64) -> String {
    if hz % 1_000_000 == 0 {
        format!("{} MHz", hz / 1_000_000)
    } else {
        format!("{hz} Hz")
    }
}

/// List all built-in boards and variants.
pub fn list() -> Result<()> {
    println!("Built-in boards:");
    println!();
    for board in BoardDescriptor::builtin() {
        println!("  {:<20} {}", board.name, board.device);
    }
    println!();
    println!("Built-in variants:");
    println!();
    for variant in BoardVariant::builtin() {
        println!("  {:<20} extends {}", variant.name, variant.base);
    }
    println!();
    println!("Use 'socle board describe <name>' for details.");
    Ok(())
}

/// Describe a board in detail.
pub fn describe(name: &str, format: Option<&str>) -> Result<()> {
    let board = resolve::board(name)?;

    match format {
        Some("toml") => {
            print!("{}", board_to_toml(&board)?);
            return Ok(());
        }
        Some(other) => bail!("unknown format '{other}' (expected 'toml')"),
        None => {}
    }

    println!("=== Board: {} ===", board.name);
    println!("Device: {}", board.device);
    println!();

    println!("--- Clocks ---");
    let graph = ClockDomainGraph::new(board.clock_domains.clone())?;
    for domain in graph.topological() {
        let hz = graph
            .frequency_hz(&domain.name)
            .map_or_else(|| "unknown".to_string(), format_hz);
        let source = match domain.parent() {
            Some(parent) => format!("from {parent}"),
            None => "oscillator".to_string(),
        };
        let reset = if domain.reset_less { "reset-less" } else { "gated" };
        let sys = if domain.name == board.sys_domain { " (sys)" } else { "" };
        println!("  {:<10} {:>10}  {source}, {reset}{sys}", domain.name, hz);
    }
    println!();

    println!("--- Regions ---");
    for region in &board.regions {
        println!("  {region}");
    }
    println!();

    if let Some(flash) = &board.flash {
        println!("--- Flash ---");
        println!("  Region:     {}", flash.region);
        println!("  Gateware:   0x{:X} bytes", flash.gateware_size);
        if let Some(bootloader) = flash.bootloader_size {
            println!("  Bootloader: 0x{bootloader:X} bytes");
        }
        println!();
    }

    println!("--- Defaults ---");
    println!("  Boot source:   {:?}", board.defaults.boot_source);
    println!("  ROM:           0x{:X} bytes", board.defaults.integrated_rom_size);
    println!("  SRAM:          0x{:X} bytes", board.defaults.integrated_sram_size);
    if let Some(stub) = board.defaults.flash_firmware_size {
        println!("  Flash stub:    0x{stub:X} bytes");
    }
    println!();

    println!("--- CSR ---");
    println!("  Window: {} (0x{:X}-byte slots)", board.csr.region, board.csr.slot_size);
    for (name, slot) in &board.csr.slots {
        println!("    {slot:>2}: {name}");
    }
    println!("  Interrupts ({} lines):", board.interrupt_lines);
    for (name, line) in &board.interrupts {
        println!("    {line:>2}: {name}");
    }
    println!();

    println!("--- Pins ---");
    for pin in &board.pins {
        println!("  {}:{}", pin.name, pin.index);
    }

    Ok(())
}

/// Validate a board file and print any issues.
pub fn validate(path: &Path) -> Result<()> {
    let board = load_board_toml(path).with_context(|| format!("loading {}", path.display()))?;
    match validate_board(&board) {
        Ok(()) => {
            println!("{}: ok", board.name);
            Ok(())
        }
        Err(issues) => {
            for issue in &issues {
                println!("{}: {}", issue.severity, issue.message);
            }
            let errors = issues.iter().filter(|i| i.is_error()).count();
            if errors > 0 {
                bail!("{errors} error(s) in {}", path.display());
            }
            Ok(())
        }
    }
}

/// Print a template board file.
pub fn template(name: &str) -> Result<()> {
    print!("{}", generate_template(name)?);
    Ok(())
}
