//! Site configuration module.
//!
//! Handles loading and validating `config.toml` from the content root.
//! Configuration is sparse: stock defaults cover everything, user files
//! override just the values they want. Unknown keys are rejected to catch
//! typos early.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! content_root = "content"  # Content entry directory (root-level only)
//! public_dir = "public"     # Root for site-absolute image paths
//!
//! [images]
//! formats = ["webp", "original"]  # Output formats; "original" preserves source encoding
//! quality = 80                    # JPEG quality (1-100); WebP output is lossless
//! allow_enlargement = false       # Permit variants wider than the source
//!
//! [cms]
//! assets_host = "assets.example-cms.io"  # Malformed exported URLs with this host are stripped
//!
//! [output]
//! dir = "dist/_responsive-images"        # Where derived files are written
//! url_path = "/_responsive-images/"      # URL prefix for derived files
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//!
//! # The device matrix decides which widths exist. Defaults cover common
//! # viewports from 480 to 2560 logical pixels; override wholesale if needed.
//! [[devices]]
//! w = 1280
//! h = 800
//! dppx = [2.0, 1.5, 1.0]
//! flip = true               # Device rotates: height counts as a width too
//! ```

use crate::imaging::OutputFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Directory holding the content collections.
    pub content_root: String,
    /// Root directory that site-absolute image paths resolve under.
    pub public_dir: String,
    /// Derived-image generation settings.
    pub images: ImagesConfig,
    /// CMS export quirks (malformed asset URL host).
    pub cms: CmsConfig,
    /// Output location for derived files.
    pub output: OutputConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// Target device matrix, ordered largest to smallest width.
    pub devices: Vec<DeviceProfile>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            content_root: "content".to_string(),
            public_dir: "public".to_string(),
            images: ImagesConfig::default(),
            cms: CmsConfig::default(),
            output: OutputConfig::default(),
            processing: ProcessingConfig::default(),
            devices: default_devices(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images.formats.is_empty() {
            return Err(ConfigError::Validation(
                "images.formats must not be empty".into(),
            ));
        }
        self.images.parsed_formats()?;
        if self.images.quality == 0 || self.images.quality > 100 {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if self.devices.is_empty() {
            return Err(ConfigError::Validation("devices must not be empty".into()));
        }
        for pair in self.devices.windows(2) {
            if pair[0].w < pair[1].w {
                return Err(ConfigError::Validation(format!(
                    "devices must be ordered largest to smallest width ({} before {})",
                    pair[0].w, pair[1].w
                )));
            }
        }
        for device in &self.devices {
            if device.w == 0 || device.h == 0 {
                return Err(ConfigError::Validation(
                    "device dimensions must be non-zero".into(),
                ));
            }
            if device.dppx.is_empty() || device.dppx.iter().any(|&d| d <= 0.0) {
                return Err(ConfigError::Validation(
                    "device dppx list must hold positive values".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Derived-image generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Output format names. `"original"` preserves the source's encoding and
    /// is always included as the fallback group even when omitted here.
    pub formats: Vec<String>,
    /// JPEG encoding quality (1-100).
    pub quality: u32,
    /// Permit deriving variants wider than the source image.
    pub allow_enlargement: bool,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            formats: vec!["webp".to_string(), "original".to_string()],
            quality: 80,
            allow_enlargement: false,
        }
    }
}

impl ImagesConfig {
    /// Parse format names into format choices. `None` = preserve original.
    ///
    /// The original-format fallback group is appended when absent, so
    /// consumers without modern-format support always get a usable source.
    pub fn parsed_formats(&self) -> Result<Vec<Option<OutputFormat>>, ConfigError> {
        let mut parsed = Vec::with_capacity(self.formats.len() + 1);
        for name in &self.formats {
            if name.eq_ignore_ascii_case("original") {
                if !parsed.contains(&None) {
                    parsed.push(None);
                }
                continue;
            }
            let format = OutputFormat::from_name(name).ok_or_else(|| {
                ConfigError::Validation(format!("unknown output format: {name}"))
            })?;
            if !parsed.contains(&Some(format)) {
                parsed.push(Some(format));
            }
        }
        if !parsed.contains(&None) {
            parsed.push(None);
        }
        Ok(parsed)
    }
}

/// CMS export quirks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CmsConfig {
    /// Host of malformed exported asset URLs. Paths under
    /// `https://<assets_host>/<uuid>/...` are stripped back to `/...`.
    pub assets_host: String,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            assets_host: "assets.example-cms.io".to_string(),
        }
    }
}

/// Output location for derived files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory derived files are written to.
    pub dir: String,
    /// URL prefix under which that directory is served.
    pub url_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "dist/_responsive-images".to_string(),
            url_path: "/_responsive-images/".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// One target viewport in the device matrix.
///
/// `flip` marks devices that rotate: their height counts as an additional
/// nominal width, so both orientations get a fitting variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceProfile {
    /// Logical viewport width.
    pub w: u32,
    /// Logical viewport height.
    pub h: u32,
    /// Pixel-density multipliers this device renders at.
    pub dppx: Vec<f32>,
    /// Whether the device can swap width/height (orientation flexibility).
    #[serde(default)]
    pub flip: bool,
}

impl DeviceProfile {
    /// Every physical pixel width this device can ask for:
    /// each nominal width (plus height, when flippable) times each density.
    pub fn candidate_widths(&self) -> Vec<u32> {
        let mut nominals = vec![self.w];
        if self.flip {
            nominals.push(self.h);
        }
        nominals
            .iter()
            .flat_map(|&n| {
                self.dppx
                    .iter()
                    .map(move |&d| (n as f64 * d as f64).round() as u32)
            })
            .collect()
    }
}

/// Stock device matrix: common viewports from 2560-class desktops down to
/// 480px phones, with the density lists those classes actually ship.
fn default_devices() -> Vec<DeviceProfile> {
    let matrix: &[(u32, u32, &[f32], bool)] = &[
        (2560, 1600, &[1.0], false),
        (1920, 1200, &[1.0], false),
        (1680, 1050, &[1.0], false),
        (1440, 900, &[2.0, 1.0], false),
        (1366, 1024, &[2.0, 1.0], true),
        (1280, 800, &[2.0, 1.5, 1.0], true),
        (1024, 768, &[2.0, 1.0], true),
        (960, 600, &[3.0, 2.0, 1.0], true),
        (768, 432, &[3.0, 2.0], true),
        (690, 412, &[3.0, 2.0], true),
        (640, 360, &[3.0, 2.0, 1.5], true),
        (480, 320, &[3.0, 2.0, 1.5, 1.0], true),
    ];
    matrix.iter()
        .map(|&(w, h, dppx, flip)| DeviceProfile {
            w,
            h,
            dppx: dppx.to_vec(),
            flip,
        })
        .collect()
}

/// Load config from `<root>/config.toml`, falling back to stock defaults
/// when the file doesn't exist.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let path = root.join("config.toml");
    let config = if path.exists() {
        let content = fs::read_to_string(&path)?;
        toml::from_str(&content)?
    } else {
        SiteConfig::default()
    };
    config.validate()?;
    Ok(config)
}

/// A documented stock `config.toml`, printed by the `gen-config` command.
pub fn stock_config_toml() -> String {
    let mut out = String::from(
        "\
# picadere configuration. All options are optional; defaults shown.

# Directory holding the content collections.
content_root = \"content\"

# Root for site-absolute image paths (\"/images/x.jpg\" resolves here).
public_dir = \"public\"

[images]
# Output formats for responsive variants. \"original\" preserves the
# source's own encoding and is always kept as the <img> fallback group.
formats = [\"webp\", \"original\"]
# JPEG quality (1-100). WebP output is lossless.
quality = 80
# Permit deriving variants wider than the source image.
allow_enlargement = false

[cms]
# Exported asset URLs under this host are malformed; the host and leading
# UUID segment are stripped before resolving.
assets_host = \"assets.example-cms.io\"

[output]
dir = \"dist/_responsive-images\"
url_path = \"/_responsive-images/\"

[processing]
# max_processes = 4   # omit for auto (number of CPU cores)

# Device matrix, ordered largest to smallest width. flip = true means the
# device rotates, so its height counts as an extra nominal width.
",
    );
    for device in default_devices() {
        let dppx: Vec<String> = device.dppx.iter().map(|d| format!("{d:.1}")).collect();
        out.push_str(&format!(
            "\n[[devices]]\nw = {}\nh = {}\ndppx = [{}]\nflip = {}\n",
            device.w,
            device.h,
            dppx.join(", "),
            device.flip
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_valid() {
        SiteConfig::default().validate().unwrap();
    }

    #[test]
    fn default_devices_ordered_descending() {
        let devices = default_devices();
        for pair in devices.windows(2) {
            assert!(pair[0].w >= pair[1].w);
        }
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.content_root, "content");
        assert_eq!(config.images.quality, 80);
        assert_eq!(config.devices.len(), 12);
    }

    #[test]
    fn sparse_override_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("config.toml"),
            "[images]\nquality = 65\n",
        )
        .unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.images.quality, 65);
        assert_eq!(config.images.formats, vec!["webp", "original"]);
        assert_eq!(config.output.url_path, "/_responsive-images/");
    }

    #[test]
    fn unknown_keys_rejected() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("config.toml"), "no_such_key = 1\n").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_format_rejected() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("config.toml"),
            "[images]\nformats = [\"avif\"]\n",
        )
        .unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn unordered_devices_rejected() {
        let config = SiteConfig {
            devices: vec![
                DeviceProfile { w: 640, h: 360, dppx: vec![1.0], flip: false },
                DeviceProfile { w: 1280, h: 800, dppx: vec![1.0], flip: false },
            ],
            ..SiteConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn parsed_formats_appends_original_fallback() {
        let images = ImagesConfig {
            formats: vec!["webp".into()],
            ..ImagesConfig::default()
        };
        assert_eq!(
            images.parsed_formats().unwrap(),
            vec![Some(OutputFormat::WebP), None]
        );
    }

    #[test]
    fn parsed_formats_dedups() {
        let images = ImagesConfig {
            formats: vec!["webp".into(), "WEBP".into(), "original".into()],
            ..ImagesConfig::default()
        };
        assert_eq!(
            images.parsed_formats().unwrap(),
            vec![Some(OutputFormat::WebP), None]
        );
    }

    #[test]
    fn candidate_widths_include_flipped_height() {
        let device = DeviceProfile { w: 1366, h: 1024, dppx: vec![2.0, 1.0], flip: true };
        let widths = device.candidate_widths();
        assert_eq!(widths, vec![2732, 1366, 2048, 1024]);
    }

    #[test]
    fn candidate_widths_fractional_density_rounds() {
        let device = DeviceProfile { w: 690, h: 412, dppx: vec![1.5], flip: false };
        assert_eq!(device.candidate_widths(), vec![1035]);
    }

    #[test]
    fn effective_threads_caps_at_cores() {
        let cores = std::thread::available_parallelism().unwrap().get();
        assert_eq!(
            effective_threads(&ProcessingConfig { max_processes: Some(cores * 4) }),
            cores
        );
        assert_eq!(
            effective_threads(&ProcessingConfig { max_processes: Some(1) }),
            1
        );
        assert_eq!(
            effective_threads(&ProcessingConfig { max_processes: None }),
            cores
        );
    }

    #[test]
    fn stock_config_parses_back() {
        let config: SiteConfig = toml::from_str(&stock_config_toml()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.devices.len(), 12);
    }
}
