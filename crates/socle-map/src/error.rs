//! Error types for memory-map composition.

/// Errors that can occur while composing a memory map or interrupt table.
///
/// Every variant carries the offending names and numeric bounds so a board
/// author can fix the descriptor without re-running under a debugger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    /// Two enabled regions share at least one address.
    #[error(
        "regions '{region_a}' (0x{a_start:X}..0x{a_end:X}) and '{region_b}' (0x{b_start:X}..0x{b_end:X}) overlap"
    )]
    Overlap {
        region_a: String,
        region_b: String,
        a_start: u64,
        a_end: u64,
        b_start: u64,
        b_end: u64,
    },

    /// A region is smaller than a registered minimum or a boot vector reservation.
    #[error("region '{region}' is undersized: requires 0x{required:X} bytes, has 0x{actual:X}")]
    UndersizedRegion {
        region: String,
        required: u64,
        actual: u64,
    },

    /// An override, boot vector, or nested region names a region that does not exist.
    #[error("reference to unknown region '{name}'")]
    UnknownRegionReference { name: String },

    /// Base + size (or an adjustment delta) leaves the 64-bit address space.
    #[error("region '{region}' does not fit in the 64-bit address space")]
    AddressOverflow { region: String },

    /// A nested region extends outside the region it declares as its parent.
    #[error("region '{region}' escapes its parent region '{parent}'")]
    EscapesParent { region: String, parent: String },

    /// Two distinct peripherals claim the same interrupt line.
    #[error("interrupt line {line} claimed by '{incoming}' is already assigned to '{existing}'")]
    InterruptCollision {
        line: u32,
        existing: String,
        incoming: String,
    },

    /// An interrupt line beyond the controller's width.
    #[error("interrupt line {line} for '{name}' exceeds the {limit} available lines")]
    InterruptOutOfRange { name: String, line: u32, limit: u32 },
}

/// Result type for memory-map operations.
pub type Result<T> = std::result::Result<T, MapError>;
