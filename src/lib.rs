//! # Picadere
//!
//! Responsive image pipeline for content-driven static sites. Markdown
//! documents with TOML front matter are the data source: each collection
//! entry can reference images, and every referenced image becomes a family
//! of correctly sized, correctly formatted variants plus the metadata a
//! template needs to emit a `<picture>` element.
//!
//! # Architecture: Two-Stage Pipeline
//!
//! ```text
//! 1. Scan      content/   →  manifest.json             (documents + image refs)
//! 2. Process   manifest   →  dist/_responsive-images/  (variants + image table)
//! ```
//!
//! The stages are independent and connected by human-readable JSON, so each
//! is debuggable and unit-testable on its own, and an unchanged manifest
//! means stage 2 can run against warm caches only.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Stage 1 — walks content collections, parses front matter, registers image references |
//! | [`process`] | Stage 2 — derives all variants across the thread pool, writes the image table |
//! | [`catalog`] | Build-wide registry: path normalization, register-then-resolve, raw-path fallback |
//! | [`metadata`] | Per-source metadata assembly: width collapse, format groups, srcset, single-flight memo |
//! | [`derive`] | Single-variant derivation: geometry, deterministic naming, skip-if-exists cache |
//! | [`naming`] | Content-addressed output file names |
//! | [`imaging`] | Pure-Rust image operations behind the [`imaging::ImageBackend`] trait |
//! | [`config`] | `config.toml` loading and validation, device matrix defaults |
//! | [`render`] | Maud `<picture>`/`<img>` rendering from resolved metadata |
//! | [`forms`] | Contact form submission state machine and request preparation |
//! | [`output`] | CLI output formatting for scan and process results |
//!
//! # Design Decisions
//!
//! ## The Filesystem Is the Cache
//!
//! Derived file names are a hash of every parameter that affects their bytes
//! ([`naming`]). A file that exists at its computed name *is* its own cache
//! entry: no manifest of what was built, no mtime comparisons, nothing to
//! corrupt. Writes go to a `.part` path and rename into place, so a killed
//! build can never leave a truncated file at a trusted name. Bumping
//! [`naming::ENCODER_TAG`] retires every previously derived file at once.
//!
//! ## Degrade, Don't Fail
//!
//! A missing or undecodable image downgrades its references to a plain
//! `<img src>` and prints a warning; the build continues. Only images
//! explicitly registered as required can fail a build. A promotion site
//! with one broken press photo should still deploy.
//!
//! ## One Derivation Per (Source, Config), Ever
//!
//! Metadata building is memoized and single-flight: concurrent requests for
//! the same source collapse onto one in-flight computation and share the
//! resulting `Arc`. Failures are memoized too — a broken source is reported
//! once, not once per referencing page.
//!
//! ## Maud Over Template Engines
//!
//! HTML comes from [Maud](https://maud.lambda.xyz/) compile-time macros:
//! malformed markup is a build error, interpolation is escaped by default,
//! and there is no template directory to drift out of sync.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding and encoding use the `image` crate only — no ImageMagick, no
//! libvips, no system dependencies. The binary is self-contained. WebP
//! output is lossless (the crate's encoder does not do lossy); JPEG quality
//! applies to JPEG output.

pub mod catalog;
pub mod config;
pub mod derive;
pub mod forms;
pub mod imaging;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod process;
pub mod render;
pub mod scan;

#[cfg(test)]
pub(crate) mod test_helpers;
