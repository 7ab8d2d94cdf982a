//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between [`derive`](crate::derive) (which decides which variants
//! to create) and the [`backend`](super::backend) (which does the actual
//! pixel work). This separation allows swapping backends (e.g. for testing
//! with a mock) without changing derivation logic.
//!
//! ## Types
//!
//! - [`Quality`] — Lossy encoding quality (1–100, default 80). Clamped on construction.
//! - [`OutputFormat`] — The encoders compiled into the binary, plus name/extension/MIME mapping.
//! - [`FocalPoint`] — Crop anchor as percentages (0–100 per axis). Clamped on construction.
//! - [`CropWindow`] — Pixel rectangle cut out of the resized image.
//! - [`EncodeParams`] — Full specification for one variant: source, output, resize dimensions, optional crop, format, quality.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Raster formats with a compiled-in encoder.
///
/// Requesting any other format (or preserving the original encoding of a
/// source this set cannot represent) is an `UnsupportedFormat` error at the
/// derivation layer — the backend itself never sees an unknown format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    WebP,
    Jpeg,
    Png,
}

impl OutputFormat {
    /// Parse a config-level format name. `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "webp" => Some(Self::WebP),
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    /// Map a source file's extension to the format that preserves its
    /// encoding. `None` when no compiled-in encoder can re-emit it.
    pub fn from_source_ext(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::from_name(ext)
    }

    pub fn ext(self) -> &'static str {
        match self {
            Self::WebP => "webp",
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    /// Whether the quality setting changes this format's encoded bytes.
    /// WebP and PNG encode losslessly here, so quality is irrelevant to them.
    pub fn is_lossy(self) -> bool {
        matches!(self, Self::Jpeg)
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::WebP => "image/webp",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::WebP => "webp",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        })
    }
}

/// Crop anchor as percentages of the overflow on each axis.
///
/// `(50, 50)` is a center crop. `(0, 0)` pins the top-left corner,
/// `(100, 100)` the bottom-right. Values outside 0–100 are clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FocalPoint {
    pub x: f32,
    pub y: f32,
}

impl FocalPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x: x.clamp(0.0, 100.0),
            y: y.clamp(0.0, 100.0),
        }
    }

    pub const CENTER: Self = Self { x: 50.0, y: 50.0 };
}

impl Default for FocalPoint {
    fn default() -> Self {
        Self::CENTER
    }
}

/// Pixel rectangle cut from the fill-resized image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Full specification for encoding one variant.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Dimensions to resize the decoded source to, before any crop.
    pub resize_width: u32,
    pub resize_height: u32,
    /// Window cut from the resized image. `None` for plain scaling.
    pub crop: Option<CropWindow>,
    pub format: OutputFormat,
    pub quality: Quality,
}
