//! Error types for placeholder image generation.

/// Errors raised while generating or persisting a placeholder image.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// Size is zero or not a whole number of 32-bit words.
    #[error("invalid placeholder image size {size}: must be a non-zero multiple of 4")]
    InvalidSize { size: u64 },

    /// I/O error writing the image.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, ImageError>;
