//! Deterministic placeholder firmware.
//!
//! When a board variant has no compiled program yet, its ROM is filled with
//! seeded pseudo-random words so address decoding and bus timing are still
//! exercised. The content is filler: it must never be treated as a boot image.

pub mod error;
pub mod generator;

pub use error::{ImageError, Result};
pub use generator::{generate, Endianness, PlaceholderImage, DEFAULT_SEED};
