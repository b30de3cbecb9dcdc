//! Seeded placeholder image generation.
//!
//! Each call seeds its own ChaCha8 generator from `seed`, so calls share no
//! state and may run concurrently. ChaCha8 output is fixed by the algorithm,
//! not by the rand release, so an image is byte-identical across builds.
//! Words are drawn sequentially, which makes a shorter image with the same
//! seed a prefix of a longer one.

use std::path::Path;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{ImageError, Result};

/// Seed shared by every variant that uses the default, so independently
/// built bitstreams carry identical filler and can share cached firmware.
pub const DEFAULT_SEED: u64 = 2373;

/// Byte order used when flattening words into the persisted artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

/// Fixed-size filler content for a read-only region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderImage {
    /// Size in bytes; always `words.len() * 4`.
    pub size: u64,
    /// Seed the words were generated from.
    pub seed: u64,
    /// Words in address order; word 0 sits at the region base.
    pub words: Vec<u32>,
}

impl PlaceholderImage {
    /// Flatten to bytes, position 0 at the region base. No header, no checksum.
    pub fn to_bytes(&self, endianness: Endianness) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.words.len() * 4);
        for word in &self.words {
            match endianness {
                Endianness::Little => out.extend_from_slice(&word.to_le_bytes()),
                Endianness::Big => out.extend_from_slice(&word.to_be_bytes()),
            }
        }
        out
    }

    /// SHA-256 of the little-endian bytes; a cache key for shared firmware.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.to_bytes(Endianness::Little));
        hasher.finalize().into()
    }

    /// Write the flat artifact to `path`.
    pub fn write_to(&self, path: &Path, endianness: Endianness) -> Result<()> {
        std::fs::write(path, self.to_bytes(endianness))?;
        Ok(())
    }
}

/// Generate `size / 4` seeded words.
pub fn generate(size: u64, seed: u64) -> Result<PlaceholderImage> {
    if size == 0 || size % 4 != 0 {
        return Err(ImageError::InvalidSize { size });
    }
    let count = usize::try_from(size / 4).map_err(|_| ImageError::InvalidSize { size })?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let words: Vec<u32> = (0..count).map(|_| rng.next_u32()).collect();
    debug!(size, seed, "generated placeholder image");
    Ok(PlaceholderImage { size, seed, words })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_matches_words() {
        let img = generate(0x2400, DEFAULT_SEED).unwrap();
        assert_eq!(img.words.len(), 0x900);
        assert_eq!(img.words.len() as u64 * 4, img.size);
        assert_eq!(img.to_bytes(Endianness::Little).len(), 0x2400);
    }

    #[test]
    fn reproducible() {
        for size in [4u64, 64, 0x1000, 0x2c00] {
            for seed in [0u64, 1, DEFAULT_SEED, u64::MAX] {
                let a = generate(size, seed).unwrap();
                let b = generate(size, seed).unwrap();
                assert_eq!(a.to_bytes(Endianness::Little), b.to_bytes(Endianness::Little));
                assert_eq!(a.digest(), b.digest());
            }
        }
    }

    #[test]
    fn prefix_stable_across_sizes() {
        let short = generate(0x1000, DEFAULT_SEED).unwrap();
        let long = generate(0x2400, DEFAULT_SEED).unwrap();
        let short_bytes = short.to_bytes(Endianness::Little);
        assert_eq!(&long.to_bytes(Endianness::Little)[..short_bytes.len()], &short_bytes[..]);
    }

    #[test]
    fn seeds_differ() {
        let a = generate(256, 1).unwrap();
        let b = generate(256, 2).unwrap();
        assert_ne!(a.words, b.words);
    }

    #[test]
    fn invalid_sizes() {
        for size in [0u64, 1, 2, 3, 5, 0x2401] {
            assert!(
                matches!(generate(size, DEFAULT_SEED), Err(ImageError::InvalidSize { size: s }) if s == size),
                "size {size}"
            );
        }
    }

    #[test]
    fn concurrent_calls_agree() {
        let expected = generate(0x800, DEFAULT_SEED).unwrap();
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| generate(0x800, DEFAULT_SEED).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }

    #[test]
    fn endianness_flips_word_bytes() {
        let img = generate(8, 7).unwrap();
        let le = img.to_bytes(Endianness::Little);
        let be = img.to_bytes(Endianness::Big);
        assert_eq!(le[0], be[3]);
        assert_eq!(le[4..8], img.words[1].to_le_bytes());
        assert_eq!(be[4..8], img.words[1].to_be_bytes());
    }

    #[test]
    fn write_exact_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rom.bin");
        let img = generate(0x2c00, DEFAULT_SEED).unwrap();
        img.write_to(&path, Endianness::Little).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 0x2c00);
        assert_eq!(bytes, img.to_bytes(Endianness::Little));
    }

    #[test]
    fn default_seed_words_are_pinned() {
        // ChaCha8 keyed through the PCG32 expansion of seed_from_u64. Any
        // change here breaks firmware caches keyed on the image digest.
        let img = generate(32, DEFAULT_SEED).unwrap();
        assert_eq!(
            img.words,
            [0xbeb8_7202, 0x07a4_0645, 0xe316_985a, 0x10ae_95f7, 0x667a_1aa2, 0xa567_2139, 0x62af_3ccc, 0xdcec_bb25]
        );
        assert_eq!(img.to_bytes(Endianness::Little)[..4], [0x02, 0x72, 0xb8, 0xbe]);
    }
}
