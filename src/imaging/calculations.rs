//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::{CropWindow, FocalPoint};

/// Height that preserves the source aspect ratio at a given target width.
///
/// ```
/// # use picadere::imaging::scaled_height;
/// // 1600x900 at width 800 → 450
/// assert_eq!(scaled_height((1600, 900), 800), 450);
/// ```
pub fn scaled_height(source: (u32, u32), target_width: u32) -> u32 {
    let (src_w, src_h) = source;
    (target_width as f64 * src_h as f64 / src_w as f64).round() as u32
}

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may
/// exceed.
pub fn fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = (h as f64 * src_aspect).round() as u32;
        (w.max(tgt_w), h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = (w as f64 / src_aspect).round() as u32;
        (w, h.max(tgt_h))
    }
}

/// Position the crop window within a fill-resized image.
///
/// The window has the target dimensions; its offset distributes the overflow
/// according to the focal point. `FocalPoint::CENTER` splits the overflow
/// evenly (a centered crop); `(0, 0)` pins the top-left edge; `(100, y)` the
/// right edge. Offsets are clamped so the window never leaves the image.
pub fn crop_window(filled: (u32, u32), target: (u32, u32), focal: FocalPoint) -> CropWindow {
    let (fill_w, fill_h) = filled;
    let (tgt_w, tgt_h) = target;

    let slack_x = fill_w.saturating_sub(tgt_w);
    let slack_y = fill_h.saturating_sub(tgt_h);

    let x = (slack_x as f64 * (focal.x as f64 / 100.0)).round() as u32;
    let y = (slack_y as f64 * (focal.y as f64 / 100.0)).round() as u32;

    CropWindow {
        x: x.min(slack_x),
        y: y.min(slack_y),
        width: tgt_w.min(fill_w),
        height: tgt_h.min(fill_h),
    }
}

/// Collapse candidate widths into the set actually worth deriving.
///
/// - Widths above the source's native width clamp to the native width
///   (the source can never honestly serve more pixels than it has).
/// - The result is strictly descending; widths within 1px of a kept entry
///   collapse into it, so two device profiles never yield two variants of
///   effectively the same size.
/// - An empty candidate list falls back to the native width.
pub fn collapse_widths(candidates: &[u32], native_width: u32) -> Vec<u32> {
    let mut widths: Vec<u32> = candidates
        .iter()
        .filter(|&&w| w > 0)
        .map(|&w| w.min(native_width))
        .collect();

    widths.sort_unstable_by(|a, b| b.cmp(a));

    let mut kept: Vec<u32> = Vec::new();
    for w in widths {
        match kept.last() {
            Some(&prev) if prev - w <= 1 => {}
            _ => kept.push(w),
        }
    }

    if kept.is_empty() {
        kept.push(native_width);
    }
    kept
}
