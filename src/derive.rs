//! Single-variant derivation with on-disk caching.
//!
//! [`ImageDeriver`] turns one (source, width, height, format) request into one
//! derived file. Re-encoding is the single most expensive operation in the
//! build, so the deriver's whole design is about not doing it:
//!
//! - Output names are deterministic ([`crate::naming`]), so the existence of
//!   the file at the computed path *is* the cache entry. A hit skips decode,
//!   resize, and encode entirely, and survives across builds.
//! - Encoding writes to a `.part` path and renames into place. An interrupted
//!   build leaves a `.part` orphan, never a truncated file at a valid name.
//! - Dimensions are identified once per source per build.
//!
//! Failures are values, not aborts: the caller (the metadata builder and
//! catalog above it) decides which errors skip a variant, which skip a
//! source, and which fail the build.

use crate::imaging::{
    BackendError, Dimensions, EncodeParams, FocalPoint, ImageBackend, OutputFormat, Quality,
    crop_window, fill_dimensions, scaled_height,
};
use crate::naming::variant_file_name;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Social cards are a fixed 1200×630 crop (the standard OpenGraph size).
pub const SOCIAL_CARD_SIZE: (u32, u32) = (1200, 630);

#[derive(Error, Debug)]
pub enum DeriveError {
    #[error("source image not found or unreadable: {0}")]
    SourceNotFound(PathBuf),
    #[error("no encoder for format: {0}")]
    UnsupportedFormat(String),
    #[error("target width {requested} exceeds source width {native} and enlargement is not allowed")]
    EnlargementNotAllowed { requested: u32, native: u32 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image processing failed: {0}")]
    Backend(#[from] BackendError),
}

/// One concrete derived file.
#[derive(Debug, Clone, Serialize)]
pub struct ImageVariant {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    #[serde(skip)]
    pub file_name: String,
}

/// Full specification for one derivation.
#[derive(Debug, Clone)]
pub struct DeriveRequest<'a> {
    /// Resolved local path of the source image.
    pub source: &'a Path,
    pub width: u32,
    /// `None` preserves the source aspect ratio; `Some` crops to the exact
    /// width × height box.
    pub height: Option<u32>,
    /// `None` preserves the source's own encoding.
    pub format: Option<OutputFormat>,
    /// Crop anchor; only meaningful when `height` is set. Defaults to center.
    pub focal: Option<FocalPoint>,
    /// Per-request enlargement override (ORed with the deriver setting).
    pub allow_enlargement: bool,
}

impl<'a> DeriveRequest<'a> {
    /// Plain aspect-preserving scale.
    pub fn scale(source: &'a Path, width: u32, format: Option<OutputFormat>) -> Self {
        Self {
            source,
            width,
            height: None,
            format,
            focal: None,
            allow_enlargement: false,
        }
    }

    /// 1200×630 PNG social card. Enlargement is allowed: link previews want
    /// the full canvas even from small sources.
    pub fn social_card(source: &'a Path, focal: Option<FocalPoint>) -> Self {
        let (w, h) = SOCIAL_CARD_SIZE;
        Self {
            source,
            width: w,
            height: Some(h),
            format: Some(OutputFormat::Png),
            focal,
            allow_enlargement: true,
        }
    }
}

/// Running tally of cache performance for a build.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} encoded ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} encoded", self.misses)
        }
    }
}

/// Derives, caches, and names image variants over an [`ImageBackend`].
pub struct ImageDeriver<B> {
    backend: B,
    output_dir: PathBuf,
    url_path: String,
    quality: Quality,
    allow_enlargement: bool,
    dims: Mutex<HashMap<PathBuf, Dimensions>>,
    stats: Mutex<CacheStats>,
}

impl<B: ImageBackend> ImageDeriver<B> {
    /// Create a deriver writing into `output_dir` (created if missing),
    /// with derived files served under `url_path`.
    pub fn new(
        backend: B,
        output_dir: PathBuf,
        url_path: String,
        quality: Quality,
        allow_enlargement: bool,
    ) -> std::io::Result<Self> {
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self {
            backend,
            output_dir,
            url_path,
            quality,
            allow_enlargement,
            dims: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::default()),
        })
    }

    /// Native dimensions of a source image, identified once per build.
    pub fn dimensions(&self, source: &Path) -> Result<Dimensions, DeriveError> {
        if let Some(dims) = self.dims.lock().unwrap().get(source) {
            return Ok(*dims);
        }
        let dims = self
            .backend
            .identify(source)
            .map_err(|_| DeriveError::SourceNotFound(source.to_path_buf()))?;
        self.dims
            .lock()
            .unwrap()
            .insert(source.to_path_buf(), dims);
        Ok(dims)
    }

    /// Derive one variant, skipping the encoder when the output file already
    /// exists at its deterministic path.
    pub fn derive(&self, req: &DeriveRequest) -> Result<ImageVariant, DeriveError> {
        let native = self.dimensions(req.source)?;

        if req.width > native.width && !(self.allow_enlargement || req.allow_enlargement) {
            return Err(DeriveError::EnlargementNotAllowed {
                requested: req.width,
                native: native.width,
            });
        }

        let format = match req.format {
            Some(f) => f,
            None => OutputFormat::from_source_ext(req.source).ok_or_else(|| {
                DeriveError::UnsupportedFormat(
                    req.source
                        .extension()
                        .map(|e| e.to_string_lossy().to_string())
                        .unwrap_or_else(|| "(no extension)".to_string()),
                )
            })?,
        };

        let source_dims = (native.width, native.height);
        let (out_height, resize, crop) = match req.height {
            Some(h) => {
                let fill = fill_dimensions(source_dims, (req.width, h));
                let window = crop_window(fill, (req.width, h), req.focal.unwrap_or_default());
                (h, fill, Some(window))
            }
            None => {
                let h = scaled_height(source_dims, req.width);
                (h, (req.width, h), None)
            }
        };

        // Focal only affects bytes when there is a crop.
        let hashed_focal = req.height.and(req.focal);
        let source_id = req.source.to_string_lossy();
        let file_name = variant_file_name(
            &source_id,
            req.width,
            req.height,
            hashed_focal,
            format,
            self.quality,
        );
        let final_path = self.output_dir.join(&file_name);

        if final_path.exists() {
            self.stats.lock().unwrap().hits += 1;
            return Ok(self.variant(file_name, req.width, out_height, format));
        }

        // Write-then-rename: a crash leaves a .part orphan, never a
        // truncated file at a name the next build would trust.
        let part_path = self.output_dir.join(format!("{file_name}.part"));
        let encoded = self.backend.encode(&EncodeParams {
            source: req.source.to_path_buf(),
            output: part_path.clone(),
            resize_width: resize.0,
            resize_height: resize.1,
            crop,
            format,
            quality: self.quality,
        });
        if let Err(e) = encoded {
            let _ = std::fs::remove_file(&part_path);
            return Err(e.into());
        }
        std::fs::rename(&part_path, &final_path)?;

        self.stats.lock().unwrap().misses += 1;
        Ok(self.variant(file_name, req.width, out_height, format))
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.lock().unwrap()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn variant(
        &self,
        file_name: String,
        width: u32,
        height: u32,
        format: OutputFormat,
    ) -> ImageVariant {
        let url = if self.url_path.ends_with('/') {
            format!("{}{}", self.url_path, file_name)
        } else {
            format!("{}/{}", self.url_path, file_name)
        };
        ImageVariant {
            url,
            width,
            height,
            format,
            file_name,
        }
    }
}
