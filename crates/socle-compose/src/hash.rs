//! Content hashes for composed outputs.
//!
//! A composed SoC is hashed over its canonical JSON form. Maps are ordered
//! (`BTreeMap`) and regions keep introduction order, so identical inputs
//! always produce the same hash.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// A 32-byte SHA-256 content hash.
pub type ContentHash = [u8; 32];

/// Compute the SHA-256 content hash of any serializable value.
pub fn content_hash<T: Serialize>(value: &T) -> Result<ContentHash> {
    let json = serde_json::to_vec(value)?;
    Ok(bytes_hash(&json))
}

/// SHA-256 of raw bytes (e.g., a compiled firmware image).
pub fn bytes_hash(bytes: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Format a content hash as a hex string.
pub fn hash_hex(hash: &ContentHash) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}
