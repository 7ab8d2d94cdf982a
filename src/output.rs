//! CLI output formatting for the scan and process stages.
//!
//! Output is information-centric, not file-centric: the primary display for
//! every entity is its semantic identity (collection, title), with paths as
//! indented `Source:` context lines.
//!
//! ## Scan
//!
//! ```text
//! press (2 documents)
//!     A stunning debut
//!         Source: press/times__review.md
//!         Image: /images/press/times.jpg
//!
//! Images
//!     3 registered, 1 social card
//! ```
//!
//! ## Process
//!
//! ```text
//! Derived 3 images, 1 social card
//!     12 cached, 6 encoded (18 total)
//!
//! Warnings
//!     /images/missing.jpg: falling back to raw path: ...
//! ```
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure — no I/O, no side effects.

use crate::process::ProcessResult;
use crate::scan::{Document, Manifest};
use std::collections::BTreeMap;

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

pub fn format_scan_output(manifest: &Manifest) -> Vec<String> {
    let mut lines = Vec::new();

    let mut by_collection: BTreeMap<&str, Vec<&Document>> = BTreeMap::new();
    for doc in &manifest.documents {
        by_collection.entry(&doc.collection).or_default().push(doc);
    }

    for (collection, docs) in &by_collection {
        let noun = if docs.len() == 1 { "document" } else { "documents" };
        lines.push(format!("{} ({} {})", collection, docs.len(), noun));
        for doc in docs {
            lines.push(format!("{}{}", indent(1), doc.entry.title()));
            lines.push(format!(
                "{}Source: {}/{}.md",
                indent(2),
                doc.collection,
                doc.slug
            ));
            if let Some(image) = doc.entry.image() {
                lines.push(format!("{}Image: {}", indent(2), image.path));
            }
            if let Some(og) = doc.entry.og_image() {
                lines.push(format!("{}Social card: {}", indent(2), og.path));
            }
        }
        lines.push(String::new());
    }

    lines.push("Images".to_string());
    lines.push(format!(
        "{}{} registered, {} social card{}",
        indent(1),
        manifest.registrations.len(),
        manifest.social_cards.len(),
        if manifest.social_cards.len() == 1 { "" } else { "s" }
    ));

    lines
}

pub fn print_scan_output(manifest: &Manifest) {
    for line in format_scan_output(manifest) {
        println!("{line}");
    }
}

pub fn format_process_output(result: &ProcessResult) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Derived {} image{}, {} social card{}",
            result.image_count,
            if result.image_count == 1 { "" } else { "s" },
            result.social_card_count,
            if result.social_card_count == 1 { "" } else { "s" }
        ),
        format!("{}{}", indent(1), result.stats),
    ];

    if !result.warnings.is_empty() {
        lines.push(String::new());
        lines.push("Warnings".to_string());
        for warning in &result.warnings {
            lines.push(format!("{}{}", indent(1), warning));
        }
    }

    lines
}

pub fn print_process_output(result: &ProcessResult) {
    for line in format_process_output(result) {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ImageRegistration;
    use crate::config::SiteConfig;
    use crate::derive::CacheStats;
    use crate::metadata::Warning;
    use crate::scan::{ContentEntry, Document, ImageRef};

    fn press_doc(title: &str, slug: &str, image: Option<&str>) -> Document {
        Document {
            collection: "press".to_string(),
            slug: slug.to_string(),
            entry: ContentEntry::Press {
                title: title.to_string(),
                source: None,
                url: None,
                date: None,
                image: image.map(|path| ImageRef {
                    path: path.to_string(),
                    alt: String::new(),
                    size: Default::default(),
                    pos_x: 50.0,
                    pos_y: 50.0,
                }),
            },
            body: String::new(),
        }
    }

    #[test]
    fn scan_output_groups_by_collection() {
        let manifest = Manifest {
            documents: vec![
                press_doc("Review A", "a", Some("/images/a.jpg")),
                press_doc("Review B", "b", None),
            ],
            registrations: vec![ImageRegistration::new("/images/a.jpg", "")],
            social_cards: Vec::new(),
            config: SiteConfig::default(),
        };

        let lines = format_scan_output(&manifest);
        assert_eq!(lines[0], "press (2 documents)");
        assert_eq!(lines[1], "    Review A");
        assert_eq!(lines[2], "        Source: press/a.md");
        assert_eq!(lines[3], "        Image: /images/a.jpg");
        assert!(lines.contains(&"Images".to_string()));
        assert!(lines.contains(&"    1 registered, 0 social cards".to_string()));
    }

    #[test]
    fn process_output_reports_stats_and_warnings() {
        let result = ProcessResult {
            stats: CacheStats { hits: 12, misses: 6 },
            warnings: vec![Warning {
                source: "/images/missing.jpg".into(),
                message: "falling back to raw path".to_string(),
            }],
            image_count: 3,
            social_card_count: 1,
        };

        let lines = format_process_output(&result);
        assert_eq!(lines[0], "Derived 3 images, 1 social card");
        assert_eq!(lines[1], "    12 cached, 6 encoded (18 total)");
        assert!(lines.contains(&"Warnings".to_string()));
        assert!(lines.last().unwrap().contains("falling back to raw path"));
    }

    #[test]
    fn process_output_omits_empty_warning_block() {
        let result = ProcessResult {
            stats: CacheStats::default(),
            warnings: Vec::new(),
            image_count: 0,
            social_card_count: 0,
        };
        let lines = format_process_output(&result);
        assert!(!lines.contains(&"Warnings".to_string()));
    }
}
