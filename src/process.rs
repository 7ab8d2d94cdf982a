//! Image processing stage.
//!
//! Stage 2 of the build. Consumes the scan [`Manifest`], derives every
//! registered image across the rayon pool, derives social cards, and writes
//! the image table (`responsive-images.json`) that the render stage and any
//! external templating read. The table is keyed by normalized source path
//! and serialized with sorted keys, so an unchanged site produces a
//! byte-identical table.

use crate::catalog::{BuildCatalog, CatalogError};
use crate::config::{self, ConfigError};
use crate::derive::{CacheStats, ImageDeriver, ImageVariant};
use crate::imaging::{ImageBackend, Quality, RustBackend};
use crate::metadata::{MetadataBuilder, ResponsiveImageMetadata, Warning};
use crate::scan::{Manifest, ScanError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const IMAGE_TABLE_FILE: &str = "responsive-images.json";

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Manifest error: {0}")]
    Scan(#[from] ScanError),
    #[error("{0}")]
    Catalog(#[from] CatalogError),
    #[error("Image table serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// What the stage did, for reporting.
#[derive(Debug)]
pub struct ProcessResult {
    pub stats: CacheStats,
    pub warnings: Vec<Warning>,
    /// Sources that produced responsive metadata.
    pub image_count: usize,
    pub social_card_count: usize,
}

/// On-disk image table. Both maps are keyed by normalized source path.
#[derive(Serialize)]
struct ImageTable<'a> {
    images: BTreeMap<&'a str, &'a ResponsiveImageMetadata>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    social_cards: BTreeMap<&'a str, &'a ImageVariant>,
}

/// Process a previously saved manifest with the production backend.
pub fn process(root: &Path, manifest_path: &Path) -> Result<ProcessResult, ProcessError> {
    let manifest = Manifest::load(manifest_path)?;
    process_manifest(root, &manifest)
}

pub fn process_manifest(root: &Path, manifest: &Manifest) -> Result<ProcessResult, ProcessError> {
    process_with_backend(root, manifest, RustBackend::new())
}

/// Backend-generic entry point; tests drive it with a mock.
pub fn process_with_backend<B: ImageBackend>(
    root: &Path,
    manifest: &Manifest,
    backend: B,
) -> Result<ProcessResult, ProcessError> {
    let config = &manifest.config;
    let formats = config.images.parsed_formats()?;

    let output_dir = root.join(&config.output.dir);
    let deriver = ImageDeriver::new(
        backend,
        output_dir.clone(),
        config.output.url_path.clone(),
        Quality::new(config.images.quality),
        config.images.allow_enlargement,
    )?;
    let builder = MetadataBuilder::new(deriver, config.devices.clone(), formats);
    let catalog = BuildCatalog::new(
        builder,
        config.cms.assets_host.clone(),
        root.join(&config.public_dir),
    );

    catalog.register_all(&manifest.registrations)?;

    let mut warnings = Vec::new();
    let mut cards: Vec<(String, ImageVariant)> = Vec::new();
    for reg in &manifest.social_cards {
        match catalog.social_card(&reg.path, reg.focal) {
            Ok(variant) => cards.push((
                crate::catalog::normalize_path(&reg.path, &config.cms.assets_host),
                variant,
            )),
            Err(e) => warnings.push(Warning {
                source: reg.path.clone().into(),
                message: format!("social card skipped: {e}"),
            }),
        }
    }

    let entries = catalog.successful_entries();
    let table = ImageTable {
        images: entries
            .iter()
            .map(|(path, meta)| (path.as_str(), meta.as_ref()))
            .collect(),
        social_cards: cards
            .iter()
            .map(|(path, variant)| (path.as_str(), variant))
            .collect(),
    };
    fs::write(
        output_dir.join(IMAGE_TABLE_FILE),
        serde_json::to_string_pretty(&table)?,
    )?;

    warnings.extend(catalog.take_warnings());
    Ok(ProcessResult {
        stats: catalog.stats(),
        warnings,
        image_count: entries.len(),
        social_card_count: cards.len(),
    })
}

/// Configure the global rayon pool from site config. Call once, before the
/// first parallel stage.
pub fn init_thread_pool(config: &config::ProcessingConfig) {
    let threads = config::effective_threads(config);
    // Ignore the error: the pool can already be initialized in tests.
    let _ = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global();
}
