//! Content scanning and manifest generation.
//!
//! Stage 1 of the build. Walks the content tree, parses every markdown
//! document's TOML front matter into a typed [`ContentEntry`], and collects
//! one [`ImageRegistration`] per image reference — front-matter image
//! fields and inline markdown images alike. The output [`Manifest`] is what
//! the process stage consumes; it carries the resolved site config so the
//! two stages cannot disagree about formats or devices.
//!
//! ## Directory layout
//!
//! ```text
//! content/
//! ├── press/            # template = "press"
//! │   └── the-times__review.md
//! ├── writing/          # template = "writing"
//! ├── quotes/           # template = "quote"
//! ├── events/           # template = "event"
//! └── pages/            # template = "page"
//! ```
//!
//! Every document starts with a `+++`-fenced TOML block whose `template`
//! key selects the entry type; the rest of the file is the markdown body.

use crate::catalog::ImageRegistration;
use crate::config::{self, SiteConfig};
use crate::imaging::FocalPoint;
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("{path}: missing +++ front matter block")]
    MissingFrontMatter { path: PathBuf },
    #[error("{path}: invalid front matter: {reason}")]
    FrontMatter { path: PathBuf, reason: String },
    #[error("Manifest serialization failed: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// How an image should fill its layout box. Affects rendering only, never
/// derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    #[default]
    Cover,
    Contain,
}

fn default_pos() -> f32 {
    50.0
}

/// An image reference with its editor-controlled presentation knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageRef {
    pub path: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub size: FitMode,
    /// Horizontal focus, percent from the left edge.
    #[serde(default = "default_pos")]
    pub pos_x: f32,
    /// Vertical focus, percent from the top edge.
    #[serde(default = "default_pos")]
    pub pos_y: f32,
}

impl ImageRef {
    pub fn focal(&self) -> FocalPoint {
        FocalPoint::new(self.pos_x, self.pos_y)
    }

    fn registration(&self) -> ImageRegistration {
        ImageRegistration {
            path: self.path.clone(),
            alt: self.alt.clone(),
            sizes: None,
            required: false,
            focal: Some(self.focal()),
        }
    }
}

/// One typed content document, selected by the front matter `template` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum ContentEntry {
    Press {
        title: String,
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        date: Option<String>,
        #[serde(default)]
        image: Option<ImageRef>,
    },
    Writing {
        title: String,
        #[serde(default)]
        publisher: Option<String>,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        date: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        image: Option<ImageRef>,
    },
    Quote {
        author: String,
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        image: Option<ImageRef>,
    },
    Event {
        title: String,
        #[serde(default)]
        location: Option<String>,
        #[serde(default)]
        start_time: Option<String>,
        #[serde(default)]
        end_time: Option<String>,
        #[serde(default)]
        timezone: Option<String>,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        image: Option<ImageRef>,
    },
    Page {
        title: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        image: Option<ImageRef>,
        /// Social card source. Derivation allows enlargement for these.
        #[serde(default)]
        og_image: Option<ImageRef>,
    },
}

impl ContentEntry {
    pub fn title(&self) -> &str {
        match self {
            Self::Press { title, .. }
            | Self::Writing { title, .. }
            | Self::Event { title, .. }
            | Self::Page { title, .. } => title,
            Self::Quote { author, .. } => author,
        }
    }

    pub fn image(&self) -> Option<&ImageRef> {
        match self {
            Self::Press { image, .. }
            | Self::Writing { image, .. }
            | Self::Quote { image, .. }
            | Self::Event { image, .. }
            | Self::Page { image, .. } => image.as_ref(),
        }
    }

    pub fn og_image(&self) -> Option<&ImageRef> {
        match self {
            Self::Page { og_image, .. } => og_image.as_ref(),
            _ => None,
        }
    }
}

/// One scanned document: typed front matter plus its markdown body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Collection directory the file came from (`press`, `events`, ...).
    pub collection: String,
    /// File stem, used as the URL slug.
    pub slug: String,
    pub entry: ContentEntry,
    pub body: String,
}

/// Scan output, consumed by the process stage.
#[derive(Debug, Serialize, Deserialize)]
pub struct Manifest {
    pub documents: Vec<Document>,
    /// Deduped image references, in document order.
    pub registrations: Vec<ImageRegistration>,
    /// Social card sources, registered separately (enlargement allowed).
    pub social_cards: Vec<ImageRegistration>,
    pub config: SiteConfig,
}

impl Manifest {
    pub fn save(&self, path: &Path) -> Result<(), ScanError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ScanError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Scan a site root: load its config, walk the content tree, build the
/// manifest.
pub fn scan(root: &Path) -> Result<Manifest, ScanError> {
    let config = config::load_config(root)?;
    scan_with_config(root, config)
}

pub fn scan_with_config(root: &Path, config: SiteConfig) -> Result<Manifest, ScanError> {
    let content_dir = root.join(&config.content_root);

    let mut documents = Vec::new();
    let walker = WalkDir::new(&content_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e.path()));
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() || entry.path().extension() != Some("md".as_ref()) {
            continue;
        }
        documents.push(parse_document(&content_dir, entry.path())?);
    }

    let (registrations, social_cards) = collect_registrations(&documents);

    Ok(Manifest {
        documents,
        registrations,
        social_cards,
        config,
    })
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

fn parse_document(content_dir: &Path, path: &Path) -> Result<Document, ScanError> {
    let raw = fs::read_to_string(path)?;
    let (front, body) = split_front_matter(&raw).ok_or_else(|| ScanError::MissingFrontMatter {
        path: path.to_path_buf(),
    })?;

    let entry: ContentEntry = toml::from_str(front).map_err(|e| ScanError::FrontMatter {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let collection = path
        .strip_prefix(content_dir)
        .ok()
        .and_then(|rel| rel.components().next())
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .unwrap_or_default();
    let slug = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(Document {
        collection,
        slug,
        entry,
        body: body.to_string(),
    })
}

/// Split a `+++`-fenced TOML front matter block from the markdown body.
fn split_front_matter(raw: &str) -> Option<(&str, &str)> {
    let rest = raw.strip_prefix("+++")?;
    let rest = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))?;
    for (offset, _) in rest.match_indices("+++") {
        // The closing fence must sit on its own line.
        let at_line_start = offset == 0 || rest[..offset].ends_with('\n');
        if !at_line_start {
            continue;
        }
        let after = &rest[offset + 3..];
        let body = after
            .strip_prefix("\r\n")
            .or_else(|| after.strip_prefix('\n'))
            .unwrap_or(after);
        if !after.is_empty() && body.len() == after.len() && !after.trim().is_empty() {
            continue;
        }
        return Some((&rest[..offset], body));
    }
    None
}

/// Gather every image reference across all documents, deduped by path in
/// first-seen order. Front-matter focal/alt controls win over inline uses.
fn collect_registrations(
    documents: &[Document],
) -> (Vec<ImageRegistration>, Vec<ImageRegistration>) {
    let mut seen = HashSet::new();
    let mut regs = Vec::new();
    let mut cards = Vec::new();
    let mut card_seen = HashSet::new();

    for doc in documents {
        if let Some(image) = doc.entry.image() {
            if seen.insert(image.path.clone()) {
                regs.push(image.registration());
            }
        }
        if let Some(og) = doc.entry.og_image() {
            if card_seen.insert(og.path.clone()) {
                cards.push(og.registration());
            }
        }
        for (path, alt) in inline_images(&doc.body) {
            if seen.insert(path.clone()) {
                regs.push(ImageRegistration::new(path, alt));
            }
        }
    }

    (regs, cards)
}

/// Extract `![alt](path)` references from a markdown body.
fn inline_images(markdown: &str) -> Vec<(String, String)> {
    let mut images = Vec::new();
    let mut current: Option<(String, String)> = None;
    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Image { dest_url, .. }) => {
                current = Some((dest_url.to_string(), String::new()));
            }
            Event::Text(text) => {
                if let Some((_, alt)) = current.as_mut() {
                    alt.push_str(&text);
                }
            }
            Event::End(TagEnd::Image) => {
                if let Some(image) = current.take() {
                    images.push(image);
                }
            }
            _ => {}
        }
    }
    images
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::write_content_file;
    use tempfile::TempDir;

    fn site(tmp: &TempDir) -> PathBuf {
        let root = tmp.path().to_path_buf();
        fs::create_dir_all(root.join("content")).unwrap();
        fs::create_dir_all(root.join("public")).unwrap();
        root
    }

    #[test]
    fn parses_press_entry_with_image_controls() {
        let tmp = TempDir::new().unwrap();
        let root = site(&tmp);
        write_content_file(
            &root,
            "press/times__review.md",
            r#"template = "press"
title = "A stunning debut"
source = "The Times"
url = "https://example.org/review"

[image]
path = "/images/press/times.jpg"
alt = "Times masthead"
size = "contain"
pos_x = 30.0
pos_y = 70.0
"#,
            "The review body.\n",
        );

        let manifest = scan(&root).unwrap();
        assert_eq!(manifest.documents.len(), 1);
        let doc = &manifest.documents[0];
        assert_eq!(doc.collection, "press");
        assert_eq!(doc.slug, "times__review");
        assert_eq!(doc.entry.title(), "A stunning debut");
        assert_eq!(doc.body.trim(), "The review body.");

        let image = doc.entry.image().unwrap();
        assert_eq!(image.size, FitMode::Contain);
        assert_eq!(image.focal(), FocalPoint::new(30.0, 70.0));

        assert_eq!(manifest.registrations.len(), 1);
        assert_eq!(manifest.registrations[0].path, "/images/press/times.jpg");
        assert_eq!(manifest.registrations[0].alt, "Times masthead");
    }

    #[test]
    fn unknown_template_is_a_front_matter_error() {
        let tmp = TempDir::new().unwrap();
        let root = site(&tmp);
        write_content_file(
            &root,
            "press/bad.md",
            "template = \"podcast\"\ntitle = \"x\"\n",
            "",
        );

        let err = scan(&root).unwrap_err();
        assert!(matches!(err, ScanError::FrontMatter { .. }));
    }

    #[test]
    fn missing_fence_is_reported() {
        let tmp = TempDir::new().unwrap();
        let root = site(&tmp);
        fs::create_dir_all(root.join("content/pages")).unwrap();
        fs::write(root.join("content/pages/raw.md"), "just markdown\n").unwrap();

        let err = scan(&root).unwrap_err();
        assert!(matches!(err, ScanError::MissingFrontMatter { .. }));
    }

    #[test]
    fn inline_markdown_images_are_registered() {
        let tmp = TempDir::new().unwrap();
        let root = site(&tmp);
        write_content_file(
            &root,
            "pages/about.md",
            "template = \"page\"\ntitle = \"About\"\n",
            "Intro.\n\n![the author at a reading](/images/reading.jpg)\n",
        );

        let manifest = scan(&root).unwrap();
        assert_eq!(manifest.registrations.len(), 1);
        let reg = &manifest.registrations[0];
        assert_eq!(reg.path, "/images/reading.jpg");
        assert_eq!(reg.alt, "the author at a reading");
    }

    #[test]
    fn duplicate_references_register_once() {
        let tmp = TempDir::new().unwrap();
        let root = site(&tmp);
        write_content_file(
            &root,
            "pages/a.md",
            "template = \"page\"\ntitle = \"A\"\n\n[image]\npath = \"/images/cover.jpg\"\nalt = \"cover\"\n",
            "![cover again](/images/cover.jpg)\n",
        );
        write_content_file(
            &root,
            "pages/b.md",
            "template = \"page\"\ntitle = \"B\"\n\n[image]\npath = \"/images/cover.jpg\"\n",
            "",
        );

        let manifest = scan(&root).unwrap();
        assert_eq!(manifest.registrations.len(), 1);
        // First-seen controls win.
        assert_eq!(manifest.registrations[0].alt, "cover");
    }

    #[test]
    fn og_images_collect_separately() {
        let tmp = TempDir::new().unwrap();
        let root = site(&tmp);
        write_content_file(
            &root,
            "pages/home.md",
            "template = \"page\"\ntitle = \"Home\"\n\n[og_image]\npath = \"/images/card.jpg\"\n",
            "",
        );

        let manifest = scan(&root).unwrap();
        assert!(manifest.registrations.is_empty());
        assert_eq!(manifest.social_cards.len(), 1);
        assert_eq!(manifest.social_cards[0].path, "/images/card.jpg");
    }

    #[test]
    fn event_fields_survive_round_trip() {
        let tmp = TempDir::new().unwrap();
        let root = site(&tmp);
        write_content_file(
            &root,
            "events/launch.md",
            r#"template = "event"
title = "Book launch"
location = "City Library"
start_time = "2026-09-12T19:00:00"
timezone = "Europe/London"
"#,
            "Doors at seven.\n",
        );

        let manifest = scan(&root).unwrap();
        let tmp_file = tmp.path().join("manifest.json");
        manifest.save(&tmp_file).unwrap();
        let loaded = Manifest::load(&tmp_file).unwrap();

        match &loaded.documents[0].entry {
            ContentEntry::Event { title, location, timezone, .. } => {
                assert_eq!(title, "Book launch");
                assert_eq!(location.as_deref(), Some("City Library"));
                assert_eq!(timezone.as_deref(), Some("Europe/London"));
            }
            other => panic!("wrong entry type: {other:?}"),
        }
    }

    #[test]
    fn split_front_matter_requires_fence_on_own_line() {
        let doc = "+++\ntitle = \"has +++ inline\"\n+++\nbody\n";
        let (front, body) = split_front_matter(doc).unwrap();
        assert!(front.contains("has +++ inline"));
        assert_eq!(body, "body\n");
    }

    #[test]
    fn hidden_files_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let root = site(&tmp);
        fs::create_dir_all(root.join("content/pages")).unwrap();
        fs::write(root.join("content/pages/.draft.md"), "not even valid").unwrap();

        let manifest = scan(&root).unwrap();
        assert!(manifest.documents.is_empty());
    }
}
