//! `socle image` — standalone placeholder image generation.

use std::path::Path;

use anyhow::{Context, Result};
use socle_compose::hash_hex;
use socle_image::{generate, Endianness};

/// Generate a `size`-byte placeholder from `seed` and write it to `output`.
pub fn run(size: u64, seed: u64, output: &Path, big_endian: bool) -> Result<()> {
    let image = generate(size, seed)?;
    let endianness = if big_endian { Endianness::Big } else { Endianness::Little };
    image
        .write_to(output, endianness)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("{}  {} ({} bytes, seed {})", hash_hex(&image.digest()), output.display(), size, seed);
    Ok(())
}
