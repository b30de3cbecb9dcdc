//! Error types for clock-domain and reset construction.

/// Errors raised while declaring clock domains or reset logic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResetError {
    /// Two domains share a name.
    #[error("duplicate clock domain '{name}'")]
    DuplicateDomain { name: String },

    /// A derivation or lookup names a domain that does not exist.
    #[error("unknown clock domain '{name}'")]
    UnknownDomain { name: String },

    /// Derivations loop back on themselves.
    #[error("clock domain '{name}' is derived from itself")]
    CyclicDerivation { name: String },

    /// No domain is driven by a primary oscillator.
    #[error("no primary oscillator among {count} clock domain(s)")]
    NoPrimaryOscillator { count: usize },

    /// A PLL or divider with parameters that produce no clock.
    #[error("invalid derivation for clock domain '{name}': {detail}")]
    InvalidDerivation { name: String, detail: String },

    /// An oscillator or external clock declared at 0 Hz.
    #[error("clock domain '{name}' declares a 0 Hz source")]
    ZeroFrequency { name: String },

    /// Fewer than two synchronizer stages cannot suppress metastability.
    #[error("reset synchronizer needs at least 2 stages, got {stages}")]
    SynchronizerTooShort { stages: usize },
}

/// Result type for reset operations.
pub type Result<T> = std::result::Result<T, ResetError>;
