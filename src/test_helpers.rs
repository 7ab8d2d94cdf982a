//! Shared test utilities for the picadere test suite.
//!
//! Fixture writers for content documents and real encoded images, so tests
//! that exercise the scan or the production backend don't repeat the same
//! ten lines of setup.

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Write a content document with `+++`-fenced TOML front matter.
///
/// `rel` is relative to `<root>/content/`; parent directories are created.
pub fn write_content_file(root: &Path, rel: &str, front_matter: &str, body: &str) -> PathBuf {
    let path = root.join("content").join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, format!("+++\n{front_matter}+++\n{body}")).unwrap();
    path
}

/// Write a real JPEG with a simple gradient, decodable by the production
/// backend. Parent directories are created.
pub fn write_test_jpeg(path: &Path, width: u32, height: u32) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let img = gradient(width, height);
    let file = fs::File::create(path).unwrap();
    let mut encoder = JpegEncoder::new_with_quality(BufWriter::new(file), 85);
    encoder.encode_image(&img).unwrap();
}

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    })
}
