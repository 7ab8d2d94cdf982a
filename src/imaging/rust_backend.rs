//! Pure Rust image processing backend — zero external dependencies.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::image_dimensions` |
//! | Decode (JPEG, PNG, WebP) | `image` crate (pure Rust decoders) |
//! | Resize | `image::imageops::resize` with `Lanczos3` filter |
//! | Crop | `image::DynamicImage::crop_imm` |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality from params) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{EncodeParams, OutputFormat};
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| BackendError::Decode(format!("{}: {}", path.display(), e)))
}

/// Save a DynamicImage to the given path with the requested encoder.
fn save_image(
    img: &DynamicImage,
    path: &Path,
    format: OutputFormat,
    quality: u32,
) -> Result<(), BackendError> {
    let file = std::fs::File::create(path).map_err(BackendError::Io)?;
    let writer = std::io::BufWriter::new(file);
    let encode_err = |e: image::ImageError| BackendError::Encode(format!("{format}: {e}"));

    match format {
        OutputFormat::WebP => {
            let encoder = image::codecs::webp::WebPEncoder::new_lossless(writer);
            img.write_with_encoder(encoder).map_err(encode_err)
        }
        OutputFormat::Jpeg => {
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(writer, quality as u8);
            // JPEG has no alpha channel
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(encode_err)
        }
        OutputFormat::Png => {
            let encoder = image::codecs::png::PngEncoder::new(writer);
            img.write_with_encoder(encoder).map_err(encode_err)
        }
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path)
            .map_err(|e| BackendError::Decode(format!("{}: {}", path.display(), e)))?;
        Ok(Dimensions { width, height })
    }

    fn encode(&self, params: &EncodeParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let resized = img.resize_exact(
            params.resize_width,
            params.resize_height,
            FilterType::Lanczos3,
        );
        let final_img = match params.crop {
            Some(window) => resized.crop_imm(window.x, window.y, window.width, window.height),
            None => resized,
        };
        save_image(&final_img, &params.output, params.format, params.quality.value())
    }
}
