//! HTML rendering for responsive images.
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.
//! The render layer is deliberately thin: it consumes whatever the catalog
//! resolves and never fails. A [`Resolved::Responsive`] becomes a full
//! `<picture>` with one `<source>` per modern-format group and a plain
//! `<img>` from the fallback group; a [`Resolved::Raw`] becomes a bare
//! `<img src>` so a missing or broken image degrades on the page instead of
//! breaking the build.

use crate::catalog::Resolved;
use crate::metadata::ResponsiveImageMetadata;
use crate::scan::FitMode;
use maud::{Markup, html};

/// Render one resolved image reference.
pub fn picture(resolved: &Resolved, fit: FitMode) -> Markup {
    match resolved {
        Resolved::Responsive(meta) => responsive_picture(meta, fit),
        Resolved::Raw(path) => html! {
            img src=(path) loading="lazy";
        },
    }
}

/// `<picture>` element: sources for every group but the last, `<img>` from
/// the fallback group. Group order is derivation order, original last, so
/// browsers pick the first format they support.
fn responsive_picture(meta: &ResponsiveImageMetadata, fit: FitMode) -> Markup {
    let (fallback_group, source_groups) = match meta.groups.split_last() {
        Some((last, rest)) => (Some(last), rest),
        None => (None, &meta.groups[..]),
    };
    let img_class = match fit {
        FitMode::Cover => "img-cover",
        FitMode::Contain => "img-contain",
    };

    html! {
        picture {
            @for group in source_groups {
                source type=(group.format.mime())
                    srcset=(group.srcset)
                    sizes=[meta.sizes.as_deref()];
            }
            img class=(img_class)
                src=(meta.fallback.url)
                srcset=[fallback_group.map(|g| g.srcset.as_str())]
                sizes=[meta.sizes.as_deref()]
                alt=(meta.alt)
                width=(meta.fallback.width)
                height=(meta.fallback.height)
                loading="lazy";
        }
    }
}
