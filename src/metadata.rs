//! Per-source responsive metadata assembly.
//!
//! [`MetadataBuilder`] turns one source image into a
//! [`ResponsiveImageMetadata`]: the device matrix collapses into a deduped,
//! strictly descending list of effective pixel widths, each (width, format)
//! pair becomes one [`ImageDeriver`] call, and the variants group by format
//! with a ready-made `srcset` string per group.
//!
//! Results are memoized per (source path, serialized config) for the life of
//! the build, with the single-flight property: two concurrent `build` calls
//! for the same key collapse into one derivation sequence — the second
//! caller blocks on the first's `OnceLock` and receives the same `Arc`.
//!
//! Failures are memoized too. A source that could not be read will not read
//! any better on the hundredth page that references it.

use crate::config::DeviceProfile;
use crate::derive::{DeriveError, DeriveRequest, ImageDeriver, ImageVariant};
use crate::imaging::{FocalPoint, ImageBackend, OutputFormat, collapse_widths};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

/// All variants of one source in one output format, widest first.
#[derive(Debug, Clone, Serialize)]
pub struct FormatGroup {
    pub format: OutputFormat,
    /// `"{url} {width}w"` entries joined by `", "`, descending width.
    pub srcset: String,
    pub variants: Vec<ImageVariant>,
}

/// Everything the render layer needs to emit a `<picture>` for one source.
///
/// Groups keep their configured order with the original-format group last,
/// so consumers can emit `<source>` elements in order and fall back to the
/// final group's smallest variant for the plain `<img>`.
#[derive(Debug, Clone, Serialize)]
pub struct ResponsiveImageMetadata {
    pub alt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizes: Option<String>,
    pub groups: Vec<FormatGroup>,
    /// Smallest variant of the fallback group, for non-responsive consumers.
    pub fallback: ImageVariant,
}

/// A processing problem that degraded output without failing the build.
#[derive(Debug, Clone)]
pub struct Warning {
    pub source: PathBuf,
    pub message: String,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.source.display(), self.message)
    }
}

/// Memoized outcome for one (source, config) key. Errors are `Arc`ed so the
/// outcome clones cheaply to every waiter.
pub type BuildOutcome = Result<Arc<ResponsiveImageMetadata>, Arc<DeriveError>>;

/// Builds and memoizes responsive metadata over an [`ImageDeriver`].
pub struct MetadataBuilder<B> {
    deriver: ImageDeriver<B>,
    devices: Vec<DeviceProfile>,
    /// Format choices with the original-format (`None`) entry forced last.
    formats: Vec<Option<OutputFormat>>,
    config_key: String,
    cache: Mutex<HashMap<String, Arc<OnceLock<BuildOutcome>>>>,
    warnings: Mutex<Vec<Warning>>,
}

impl<B: ImageBackend> MetadataBuilder<B> {
    pub fn new(
        deriver: ImageDeriver<B>,
        devices: Vec<DeviceProfile>,
        mut formats: Vec<Option<OutputFormat>>,
    ) -> Self {
        // Original format renders last so it is always the <img> fallback.
        formats.sort_by_key(|f| f.is_none());
        if !formats.contains(&None) {
            formats.push(None);
        }
        let config_key = config_fingerprint(&devices, &formats);
        Self {
            deriver,
            devices,
            formats,
            config_key,
            cache: Mutex::new(HashMap::new()),
            warnings: Mutex::new(Vec::new()),
        }
    }

    /// Build (or fetch) the metadata for one resolved source path.
    pub fn build(&self, source: &Path, alt: &str, sizes: Option<&str>) -> BuildOutcome {
        let key = format!("{}|{}", source.display(), self.config_key);
        let cell = {
            let mut cache = self.cache.lock().unwrap();
            cache
                .entry(key)
                .or_insert_with(|| Arc::new(OnceLock::new()))
                .clone()
        };
        cell.get_or_init(|| self.build_uncached(source, alt, sizes))
            .clone()
    }

    /// Derive a social card through the shared deriver (same cache, same
    /// naming, same skip-if-exists path).
    pub fn build_social_card(
        &self,
        source: &Path,
        focal: Option<FocalPoint>,
    ) -> Result<ImageVariant, DeriveError> {
        self.deriver.derive(&DeriveRequest::social_card(source, focal))
    }

    pub fn stats(&self) -> crate::derive::CacheStats {
        self.deriver.stats()
    }

    /// Drain warnings accumulated since the last call.
    pub fn take_warnings(&self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings.lock().unwrap())
    }

    fn build_uncached(&self, source: &Path, alt: &str, sizes: Option<&str>) -> BuildOutcome {
        let native = self.deriver.dimensions(source).map_err(Arc::new)?;

        let candidates: Vec<u32> = self
            .devices
            .iter()
            .flat_map(|d| d.candidate_widths())
            .collect();
        let widths = collapse_widths(&candidates, native.width);

        let mut groups: Vec<FormatGroup> = Vec::with_capacity(self.formats.len());
        for &choice in &self.formats {
            let mut variants: Vec<ImageVariant> = Vec::with_capacity(widths.len());
            for &width in &widths {
                match self.deriver.derive(&DeriveRequest::scale(source, width, choice)) {
                    Ok(v) => variants.push(v),
                    Err(e @ DeriveError::UnsupportedFormat(_)) => {
                        // No encoder for this group at any width.
                        self.warn(source, &e);
                        break;
                    }
                    Err(e @ DeriveError::SourceNotFound(_)) => return Err(Arc::new(e)),
                    Err(e) => {
                        self.warn(source, &e);
                        continue;
                    }
                }
            }
            if let Some(first) = variants.first() {
                groups.push(FormatGroup {
                    format: first.format,
                    srcset: srcset(&variants),
                    variants,
                });
            }
        }

        let fallback = groups
            .last()
            .and_then(|g| g.variants.last())
            .cloned()
            .ok_or_else(|| {
                Arc::new(DeriveError::UnsupportedFormat(format!(
                    "no usable output format for {}",
                    source.display()
                )))
            })?;

        Ok(Arc::new(ResponsiveImageMetadata {
            alt: alt.to_string(),
            sizes: sizes.map(str::to_string),
            groups,
            fallback,
        }))
    }

    fn warn(&self, source: &Path, error: &DeriveError) {
        self.warnings.lock().unwrap().push(Warning {
            source: source.to_path_buf(),
            message: error.to_string(),
        });
    }
}

/// `"{url} {width}w"` entries joined by `", "`. Variants arrive widest first.
fn srcset(variants: &[ImageVariant]) -> String {
    let entries: Vec<String> = variants
        .iter()
        .map(|v| format!("{} {}w", v.url, v.width))
        .collect();
    entries.join(", ")
}

/// Deterministic fingerprint of the device/format configuration, part of
/// every memoization key.
fn config_fingerprint(devices: &[DeviceProfile], formats: &[Option<OutputFormat>]) -> String {
    let mut key = String::new();
    for d in devices {
        let _ = write!(key, "{}x{}", d.w, d.h);
        for dppx in &d.dppx {
            let _ = write!(key, "@{dppx}");
        }
        if d.flip {
            key.push('f');
        }
        key.push(';');
    }
    key.push('|');
    for f in formats {
        match f {
            Some(fmt) => {
                let _ = write!(key, "{fmt},");
            }
            None => key.push_str("original,"),
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::ImageDeriver;
    use crate::imaging::Quality;
    use crate::imaging::backend::tests::MockBackend;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn sample_devices() -> Vec<DeviceProfile> {
        vec![
            DeviceProfile { w: 1280, h: 800, dppx: vec![1.0], flip: false },
            DeviceProfile { w: 640, h: 360, dppx: vec![2.0, 1.0], flip: false },
        ]
    }

    fn builder_with(
        tmp: &TempDir,
        backend: MockBackend,
        devices: Vec<DeviceProfile>,
        formats: Vec<Option<OutputFormat>>,
    ) -> MetadataBuilder<MockBackend> {
        let deriver = ImageDeriver::new(
            backend,
            tmp.path().join("out"),
            "/_responsive-images/".to_string(),
            Quality::default(),
            false,
        )
        .unwrap();
        MetadataBuilder::new(deriver, devices, formats)
    }

    fn touch_source(tmp: &TempDir, name: &str) -> PathBuf {
        let path = tmp.path().join(name);
        fs::write(&path, "src").unwrap();
        path
    }

    #[test]
    fn end_to_end_width_matrix() {
        // 1600x900 source, devices [{1280,[1]}, {640,[2,1]}], formats
        // [webp, original]: both groups carry [1280, 640], descending.
        let tmp = TempDir::new().unwrap();
        let source = touch_source(&tmp, "photo.jpg");
        let b = builder_with(
            &tmp,
            MockBackend::with_dimensions(1600, 900),
            sample_devices(),
            vec![Some(OutputFormat::WebP), None],
        );

        let meta = b.build(&source, "a photo", None).unwrap();

        assert_eq!(meta.groups.len(), 2);
        let webp = &meta.groups[0];
        assert_eq!(webp.format, OutputFormat::WebP);
        let widths: Vec<u32> = webp.variants.iter().map(|v| v.width).collect();
        assert_eq!(widths, vec![1280, 640]);

        let original = &meta.groups[1];
        assert_eq!(original.format, OutputFormat::Jpeg);
        let widths: Vec<u32> = original.variants.iter().map(|v| v.width).collect();
        assert_eq!(widths, vec![1280, 640]);

        // 2 formats x 2 deduped widths = 4 encodes, not 6
        assert_eq!(b.deriver.backend().encode_count(), 4);
    }

    #[test]
    fn srcset_descends_without_duplicates() {
        let tmp = TempDir::new().unwrap();
        let source = touch_source(&tmp, "photo.jpg");
        let b = builder_with(
            &tmp,
            MockBackend::with_dimensions(1600, 900),
            sample_devices(),
            vec![Some(OutputFormat::WebP), None],
        );

        let meta = b.build(&source, "", None).unwrap();
        let srcset = &meta.groups[0].srcset;

        let widths: Vec<u32> = srcset
            .split(", ")
            .map(|entry| {
                entry
                    .rsplit_once(' ')
                    .unwrap()
                    .1
                    .trim_end_matches('w')
                    .parse()
                    .unwrap()
            })
            .collect();
        assert_eq!(widths, vec![1280, 640]);
    }

    #[test]
    fn original_group_always_present_and_last() {
        let tmp = TempDir::new().unwrap();
        let source = touch_source(&tmp, "photo.jpg");
        // Caller "forgot" the original format and listed it first to boot.
        let b = builder_with(
            &tmp,
            MockBackend::with_dimensions(1600, 900),
            sample_devices(),
            vec![None, Some(OutputFormat::WebP)],
        );

        let meta = b.build(&source, "", None).unwrap();
        assert_eq!(meta.groups.last().unwrap().format, OutputFormat::Jpeg);
        assert_eq!(meta.fallback.format, OutputFormat::Jpeg);
        assert_eq!(meta.fallback.width, 640);
    }

    #[test]
    fn second_build_returns_cached_arc() {
        let tmp = TempDir::new().unwrap();
        let source = touch_source(&tmp, "photo.jpg");
        let b = builder_with(
            &tmp,
            MockBackend::with_dimensions(1600, 900),
            sample_devices(),
            vec![Some(OutputFormat::WebP), None],
        );

        let first = b.build(&source, "alt", None).unwrap();
        let encodes_after_first = b.deriver.backend().encode_count();
        let second = b.build(&source, "alt", None).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(b.deriver.backend().encode_count(), encodes_after_first);
    }

    #[test]
    fn concurrent_builds_single_flight() {
        let tmp = TempDir::new().unwrap();
        let source = touch_source(&tmp, "photo.jpg");
        let mut backend = MockBackend::with_dimensions(1600, 900);
        backend.encode_delay = Some(Duration::from_millis(15));
        let b = std::sync::Arc::new(builder_with(
            &tmp,
            backend,
            sample_devices(),
            vec![Some(OutputFormat::WebP), None],
        ));

        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let b = std::sync::Arc::clone(&b);
                    let source = source.clone();
                    scope.spawn(move || b.build(&source, "alt", None).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for pair in results.windows(2) {
            assert!(Arc::ptr_eq(&pair[0], &pair[1]));
        }
        // One derivation sequence: 2 formats x 2 widths
        assert_eq!(b.deriver.backend().encode_count(), 4);
    }

    #[test]
    fn unsupported_original_skips_group_keeps_webp() {
        let tmp = TempDir::new().unwrap();
        let source = touch_source(&tmp, "anim.gif");
        let b = builder_with(
            &tmp,
            MockBackend::with_dimensions(1600, 900),
            sample_devices(),
            vec![Some(OutputFormat::WebP), None],
        );

        let meta = b.build(&source, "", None).unwrap();

        assert_eq!(meta.groups.len(), 1);
        assert_eq!(meta.groups[0].format, OutputFormat::WebP);
        assert_eq!(meta.fallback.format, OutputFormat::WebP);
        assert!(!b.take_warnings().is_empty());
    }

    #[test]
    fn missing_source_fails_and_memoizes_failure() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("gone.jpg");
        let b = builder_with(
            &tmp,
            MockBackend::new(),
            sample_devices(),
            vec![Some(OutputFormat::WebP), None],
        );

        let first = b.build(&missing, "", None).unwrap_err();
        assert!(matches!(*first, DeriveError::SourceNotFound(_)));
        let second = b.build(&missing, "", None).unwrap_err();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn small_source_clamps_instead_of_failing() {
        // Every device wants more than 500px; builder clamps to native.
        let tmp = TempDir::new().unwrap();
        let source = touch_source(&tmp, "small.jpg");
        let b = builder_with(
            &tmp,
            MockBackend::with_dimensions(500, 400),
            sample_devices(),
            vec![Some(OutputFormat::WebP), None],
        );

        let meta = b.build(&source, "", None).unwrap();
        let widths: Vec<u32> = meta.groups[0].variants.iter().map(|v| v.width).collect();
        assert_eq!(widths, vec![500]);
    }

    #[test]
    fn sizes_hint_and_alt_carry_through() {
        let tmp = TempDir::new().unwrap();
        let source = touch_source(&tmp, "photo.jpg");
        let b = builder_with(
            &tmp,
            MockBackend::with_dimensions(1600, 900),
            sample_devices(),
            vec![Some(OutputFormat::WebP), None],
        );

        let meta = b
            .build(&source, "book cover", Some("(min-width: 60rem) 50vw, 100vw"))
            .unwrap();
        assert_eq!(meta.alt, "book cover");
        assert_eq!(meta.sizes.as_deref(), Some("(min-width: 60rem) 50vw, 100vw"));
    }
}
