//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations every backend must
//! support: identify and encode.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend) — pure Rust, zero
//! external dependencies. Everything is statically linked into the binary.

use super::params::EncodeParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `Sync` so a single backend can be shared across rayon workers.
pub trait ImageBackend: Sync {
    /// Get image dimensions without a full decode.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode, resize, optionally crop, and encode one variant.
    ///
    /// The file at `params.output` must exist and be complete when this
    /// returns `Ok` — the caller renames it into its final location.
    fn encode(&self, params: &EncodeParams) -> Result<(), BackendError>;
}
