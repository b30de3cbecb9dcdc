//! Board and variant lookup: built-in names or TOML files.

use std::path::Path;

use anyhow::{bail, Context, Result};
use socle_compose::{load_board_toml, load_variant_toml, BoardDescriptor, BoardVariant};

fn looks_like_path(arg: &str) -> bool {
    arg.ends_with(".toml") || arg.contains('/') || Path::new(arg).is_file()
}

/// Resolve a board by built-in name or file path.
pub fn board(arg: &str) -> Result<BoardDescriptor> {
    if looks_like_path(arg) {
        return load_board_toml(Path::new(arg)).with_context(|| format!("loading board file {arg}"));
    }
    match BoardDescriptor::builtin_named(arg) {
        Some(board) => Ok(board),
        None => bail!("unknown board: '{arg}'. Use 'socle board list' to see available boards."),
    }
}

/// Resolve a variant by built-in name or file path.
pub fn variant(arg: &str) -> Result<BoardVariant> {
    if looks_like_path(arg) {
        return load_variant_toml(Path::new(arg)).with_context(|| format!("loading variant file {arg}"));
    }
    match BoardVariant::builtin_named(arg) {
        Some(variant) => Ok(variant),
        None => bail!("unknown variant: '{arg}'. Use 'socle board list' to see available variants."),
    }
}
