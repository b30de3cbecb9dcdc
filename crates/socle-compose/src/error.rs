//! Error types for SoC composition.

use std::path::PathBuf;

use socle_image::ImageError;
use socle_map::MapError;
use socle_reset::ResetError;

/// Errors that can occur while composing a SoC or loading its inputs.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// Memory-map or interrupt-table validation failed.
    #[error(transparent)]
    Map(#[from] MapError),

    /// Clock-domain or reset construction failed.
    #[error(transparent)]
    Reset(#[from] ResetError),

    /// Placeholder image generation failed.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// A board variant tried to change its base in a way variants may not.
    #[error("variant '{variant}' cannot override '{target}': {reason}")]
    IncompatibleOverride {
        variant: String,
        target: String,
        reason: String,
    },

    /// A configured reset address disagrees with the derived boot vector.
    #[error("cpu reset address 0x{configured:X} conflicts with derived boot vector 0x{derived:X}")]
    ResetAddressConflict { configured: u64, derived: u64 },

    /// External-flash boot on a board without a flash layout.
    #[error("board '{board}' declares no flash boot layout")]
    NoFlashLayout { board: String },

    /// A peripheral requested under a name already taken by a region or
    /// another peripheral.
    #[error("peripheral '{name}' is already claimed by a region or another peripheral")]
    DuplicatePeripheral { name: String },

    /// A peripheral asked for pins the board does not have.
    #[error("peripheral '{peripheral}' requests unknown pin resource '{resource}'")]
    UnknownPinResource { peripheral: String, resource: String },

    /// No built-in board or variant by that name.
    #[error("unknown board '{name}'")]
    UnknownBoard { name: String },

    /// Structural problem in a board, variant, or configuration.
    #[error("validation error: {detail}")]
    Validation { detail: String },

    /// TOML deserialization error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error reading/writing board files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Board file not found.
    #[error("board file not found: {}", path.display())]
    NotFound { path: PathBuf },
}

/// Result type for composition.
pub type Result<T> = std::result::Result<T, ComposeError>;
