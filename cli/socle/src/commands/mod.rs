//! CLI command implementations.

pub mod board;
pub mod build;
pub mod image;
