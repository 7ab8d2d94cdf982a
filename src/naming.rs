//! Deterministic output naming for derived variants.
//!
//! A variant's file name is a function of everything that affects its bytes:
//! the normalized source identity, the target dimensions, the output format,
//! the crop anchor, the quality (for lossy formats), and an encoder version
//! tag. Nothing random or time-based goes in, so repeated builds against an
//! unchanged source produce the same file name — and an existing file at that
//! name is a valid cache entry.
//!
//! The hash is domain-separated with NUL bytes between components so that
//! adjacent fields can never collide by concatenation.

use crate::imaging::{FocalPoint, OutputFormat, Quality};
use sha2::{Digest, Sha256};

/// Bumping this invalidates every previously derived file. Do it whenever
/// encoder settings change in a way that alters output bytes (crate upgrade
/// with different defaults, new resize filter, quality semantics).
pub const ENCODER_TAG: &str = "picadere-enc-1";

/// Length of the hex hash prefix kept in file names. 16 hex chars (64 bits)
/// is far beyond collision range for a site's worth of images.
const STEM_LEN: usize = 16;

/// Compute the file name for one derived variant.
///
/// The width is kept readable in the name (useful when eyeballing the output
/// directory); everything else is folded into the hash prefix. Quality only
/// participates for lossy formats, so retuning `images.quality` re-encodes
/// JPEGs without churning the names of lossless variants.
///
/// ```
/// # use picadere::naming::variant_file_name;
/// # use picadere::imaging::{OutputFormat, Quality};
/// let a = variant_file_name(
///     "/public/images/cover.jpg", 800, None, None, OutputFormat::WebP, Quality::default(),
/// );
/// let b = variant_file_name(
///     "/public/images/cover.jpg", 800, None, None, OutputFormat::WebP, Quality::default(),
/// );
/// assert_eq!(a, b);
/// assert!(a.ends_with("-800.webp"));
/// ```
pub fn variant_file_name(
    source_id: &str,
    width: u32,
    height: Option<u32>,
    focal: Option<FocalPoint>,
    format: OutputFormat,
    quality: Quality,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ENCODER_TAG.as_bytes());
    hasher.update(b"\0");
    hasher.update(source_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(width.to_le_bytes());
    match height {
        Some(h) => {
            hasher.update(b"\x01");
            hasher.update(h.to_le_bytes());
        }
        None => hasher.update(b"\x00"),
    }
    match focal {
        Some(f) => {
            hasher.update(b"\x01");
            hasher.update(f.x.to_le_bytes());
            hasher.update(f.y.to_le_bytes());
        }
        None => hasher.update(b"\x00"),
    }
    if format.is_lossy() {
        hasher.update(b"\x01");
        hasher.update(quality.value().to_le_bytes());
    } else {
        hasher.update(b"\x00");
    }
    hasher.update(b"\0");
    hasher.update(format.ext().as_bytes());

    let digest = format!("{:x}", hasher.finalize());
    format!("{}-{}.{}", &digest[..STEM_LEN], width, format.ext())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(source: &str, width: u32, format: OutputFormat) -> String {
        variant_file_name(source, width, None, None, format, Quality::default())
    }

    #[test]
    fn same_inputs_same_name() {
        let a = name("/img/a.jpg", 800, OutputFormat::WebP);
        let b = name("/img/a.jpg", 800, OutputFormat::WebP);
        assert_eq!(a, b);
    }

    #[test]
    fn name_embeds_width_and_extension() {
        let n = name("/img/a.jpg", 1280, OutputFormat::Jpeg);
        assert!(n.ends_with("-1280.jpg"), "{n}");
    }

    #[test]
    fn varies_with_source() {
        assert_ne!(
            name("/img/a.jpg", 800, OutputFormat::WebP),
            name("/img/b.jpg", 800, OutputFormat::WebP)
        );
    }

    #[test]
    fn varies_with_width() {
        assert_ne!(
            name("/img/a.jpg", 800, OutputFormat::WebP),
            name("/img/a.jpg", 640, OutputFormat::WebP)
        );
    }

    #[test]
    fn varies_with_height() {
        assert_ne!(
            variant_file_name("/img/a.jpg", 1200, Some(630), None, OutputFormat::Png, Quality::default()),
            variant_file_name("/img/a.jpg", 1200, None, None, OutputFormat::Png, Quality::default())
        );
    }

    #[test]
    fn varies_with_focal_point() {
        assert_ne!(
            variant_file_name(
                "/img/a.jpg",
                1200,
                Some(630),
                Some(FocalPoint::new(30.0, 70.0)),
                OutputFormat::Png,
                Quality::default()
            ),
            variant_file_name(
                "/img/a.jpg",
                1200,
                Some(630),
                Some(FocalPoint::CENTER),
                OutputFormat::Png,
                Quality::default()
            )
        );
    }

    #[test]
    fn varies_with_format() {
        assert_ne!(
            name("/img/a.jpg", 800, OutputFormat::WebP),
            name("/img/a.jpg", 800, OutputFormat::Jpeg)
        );
    }

    #[test]
    fn lossy_quality_changes_name() {
        assert_ne!(
            variant_file_name("/img/a.jpg", 800, None, None, OutputFormat::Jpeg, Quality::new(80)),
            variant_file_name("/img/a.jpg", 800, None, None, OutputFormat::Jpeg, Quality::new(10))
        );
    }

    #[test]
    fn lossless_name_ignores_quality() {
        assert_eq!(
            variant_file_name("/img/a.jpg", 800, None, None, OutputFormat::WebP, Quality::new(80)),
            variant_file_name("/img/a.jpg", 800, None, None, OutputFormat::WebP, Quality::new(10))
        );
        assert_eq!(
            variant_file_name("/img/a.jpg", 800, None, None, OutputFormat::Png, Quality::new(80)),
            variant_file_name("/img/a.jpg", 800, None, None, OutputFormat::Png, Quality::new(10))
        );
    }

    #[test]
    fn adjacent_fields_do_not_collide() {
        // "ab" + width must not hash like "a" + something-starting-with-b
        assert_ne!(
            name("ab", 800, OutputFormat::WebP),
            name("a", 800, OutputFormat::WebP)
        );
    }
}
