//! SoC composition and bring-up.
//!
//! Ties the address map, the clock/reset network and placeholder firmware
//! together for a concrete board:
//! - **Boards:** oscillators, fixed regions, flash preambles, CSR window, pins
//! - **Variants:** restricted data-only specializations of a board
//! - **Configuration:** ROM/SRAM sizes, boot source, reset address
//! - **Peripherals:** collaborator requests for regions and interrupt lines
//!
//! [`SocComposer::build`] produces a [`SocImage`] for the synthesis pipeline.
//! Board and variant files are handled by [`parse`].

pub mod board;
pub mod composer;
pub mod config;
pub mod error;
pub mod hash;
pub mod parse;
pub mod peripheral;
pub mod variant;

pub use board::{BoardDefaults, BoardDescriptor, CsrWindow, FlashLayout, PinResource, Subsignal};
pub use composer::{
    build, FirmwareSource, FirmwareSummary, SocComposer, SocImage, CPU_RESET_VECTOR, FLASH_BOOT_VECTOR, ROM_REGION,
    SRAM_REGION, USER_FLASH_REGION,
};
pub use config::{BootSource, ResolvedConfig, SocConfig};
pub use error::{ComposeError, Result};
pub use hash::{content_hash, hash_hex, ContentHash};
pub use parse::{
    board_to_toml, discover_boards, discover_variants, generate_template, load_board_toml, load_variant_toml,
    parse_board_toml, parse_variant_toml, validate_board, variant_to_toml, ValidationIssue,
};
pub use peripheral::{PeripheralRequest, ResolvedPeripherals, CONTROL_PERIPHERAL};
pub use variant::BoardVariant;
