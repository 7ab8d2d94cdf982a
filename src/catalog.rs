//! Build-wide image catalog.
//!
//! The catalog is the bridge between the two halves of a build. During the
//! content scan every referenced image is *registered*: its path is
//! normalized, resolved against the public directory, and pushed through the
//! [`MetadataBuilder`]. During rendering pages *resolve* paths against the
//! catalog and get either full responsive metadata or, when derivation
//! failed or the path was never registered, the normalized path itself to
//! emit as a plain `<img src>`. A broken image degrades that one page, it
//! does not take the build down — unless the registration was marked
//! required.
//!
//! Path normalization also absorbs a CMS quirk: the editor sometimes stores
//! an absolute URL on the assets host with a stray leading UUID segment
//! (`https://assets.example-cms.io/<uuid>/images/cover.jpg`) where a
//! root-relative path was meant. Those collapse to `/images/cover.jpg`;
//! every other value passes through untouched.

use crate::derive::{DeriveError, ImageVariant};
use crate::imaging::{FocalPoint, ImageBackend};
use crate::metadata::{BuildOutcome, MetadataBuilder, ResponsiveImageMetadata, Warning};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("required image {path} failed: {reason}")]
    RequiredImageFailed { path: String, reason: String },
}

/// One image reference found during the content scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRegistration {
    /// Path as authored in content (possibly a malformed CMS URL).
    pub path: String,
    #[serde(default)]
    pub alt: String,
    /// `sizes` attribute hint for the eventual `<img>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizes: Option<String>,
    /// Required images fail the build instead of degrading to a raw path.
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focal: Option<FocalPoint>,
}

impl ImageRegistration {
    pub fn new(path: impl Into<String>, alt: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            alt: alt.into(),
            sizes: None,
            required: false,
            focal: None,
        }
    }
}

/// What a render-time lookup yields.
#[derive(Debug, Clone)]
pub enum Resolved {
    Responsive(Arc<ResponsiveImageMetadata>),
    /// Normalized path to emit as-is; derivation failed or never ran.
    Raw(String),
}

/// Collapse a malformed CMS asset URL to the root-relative path it meant.
///
/// Only absolute URLs on `assets_host` are touched, and only by dropping
/// their first path segment (the stray upload UUID). Anything else — plain
/// relative paths, other hosts, unparseable strings — comes back unchanged.
pub fn normalize_path(raw: &str, assets_host: &str) -> String {
    let Ok(url) = Url::parse(raw) else {
        return raw.to_string();
    };
    if url.host_str() != Some(assets_host) {
        return raw.to_string();
    }
    let Some(segments) = url.path_segments() else {
        return raw.to_string();
    };
    let rest: Vec<&str> = segments.skip(1).collect();
    format!("/{}", rest.join("/"))
}

/// Registers image references and answers render-time lookups.
pub struct BuildCatalog<B> {
    builder: MetadataBuilder<B>,
    assets_host: String,
    public_dir: PathBuf,
    entries: Mutex<HashMap<String, BuildOutcome>>,
    warnings: Mutex<Vec<Warning>>,
}

impl<B: ImageBackend> BuildCatalog<B> {
    pub fn new(builder: MetadataBuilder<B>, assets_host: String, public_dir: PathBuf) -> Self {
        Self {
            builder,
            assets_host,
            public_dir,
            entries: Mutex::new(HashMap::new()),
            warnings: Mutex::new(Vec::new()),
        }
    }

    /// Register one reference: normalize, derive, remember the outcome.
    ///
    /// Failures are recorded and the path will later resolve raw; only a
    /// `required` registration turns a failure into a build error.
    pub fn register(&self, reg: &ImageRegistration) -> Result<(), CatalogError> {
        let normalized = normalize_path(&reg.path, &self.assets_host);
        let local = self.local_path(&normalized);

        let outcome = self
            .builder
            .build(&local, &reg.alt, reg.sizes.as_deref());

        if let Err(e) = &outcome {
            if reg.required {
                return Err(CatalogError::RequiredImageFailed {
                    path: reg.path.clone(),
                    reason: e.to_string(),
                });
            }
            self.warnings.lock().unwrap().push(Warning {
                source: local.clone(),
                message: format!("falling back to raw path: {e}"),
            });
        }

        self.entries.lock().unwrap().insert(normalized, outcome);
        Ok(())
    }

    /// Register a batch across the rayon pool. All registrations are
    /// attempted; the first required failure (if any) is reported after.
    pub fn register_all(&self, regs: &[ImageRegistration]) -> Result<(), CatalogError> {
        let failures: Vec<CatalogError> = regs
            .par_iter()
            .filter_map(|reg| self.register(reg).err())
            .collect();
        match failures.into_iter().next() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Render-time lookup. Never fails: unregistered and failed paths
    /// resolve to their normalized raw form.
    pub fn resolve(&self, raw_path: &str) -> Resolved {
        let normalized = normalize_path(raw_path, &self.assets_host);
        match self.entries.lock().unwrap().get(&normalized) {
            Some(Ok(meta)) => Resolved::Responsive(Arc::clone(meta)),
            _ => Resolved::Raw(normalized),
        }
    }

    /// Derive the 1200×630 social card for a reference.
    pub fn social_card(
        &self,
        raw_path: &str,
        focal: Option<FocalPoint>,
    ) -> Result<ImageVariant, DeriveError> {
        let normalized = normalize_path(raw_path, &self.assets_host);
        let local = self.local_path(&normalized);
        self.builder.build_social_card(&local, focal)
    }

    /// Snapshot of every successful registration, keyed by normalized path.
    /// Iteration-stable output belongs to the caller (sort the keys).
    pub fn successful_entries(&self) -> Vec<(String, Arc<ResponsiveImageMetadata>)> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(k, v)| match v {
                Ok(meta) => Some((k.clone(), Arc::clone(meta))),
                Err(_) => None,
            })
            .collect()
    }

    pub fn stats(&self) -> crate::derive::CacheStats {
        self.builder.stats()
    }

    /// Drain catalog warnings plus anything the builder accumulated.
    pub fn take_warnings(&self) -> Vec<Warning> {
        let mut all = std::mem::take(&mut *self.warnings.lock().unwrap());
        all.extend(self.builder.take_warnings());
        all
    }

    fn local_path(&self, normalized: &str) -> PathBuf {
        self.public_dir.join(normalized.trim_start_matches('/'))
    }
}

impl<B> BuildCatalog<B> {
    pub fn public_dir(&self) -> &Path {
        &self.public_dir
    }
}
