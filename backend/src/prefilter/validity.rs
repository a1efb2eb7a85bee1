//! Checks that an upload is a usable photograph at all.

use super::stats;
use super::{CheckKind, Frame, Rejection};

pub const MIN_SIDE: usize = 50;
pub const MIN_MEAN_LUMINANCE: f64 = 20.0;
pub const MAX_MEAN_LUMINANCE: f64 = 240.0;
pub const MIN_PIXEL_STD: f64 = 15.0;
pub const EDGE_JUMP: f64 = 40.0;
pub const EDGE_DENSITY: f64 = 0.5;
pub const TEXT_ROW_STD: f64 = 60.0;
pub const TEXT_ROW_FRACTION: f64 = 0.6;
pub const MAX_ASPECT_RATIO: f64 = 5.0;
pub const MIN_ASPECT_RATIO: f64 = 0.2;

pub fn minimum_size(frame: &Frame<'_>) -> Option<Rejection> {
    let (height, width) = (frame.height(), frame.width());
    (height < MIN_SIDE || width < MIN_SIDE).then(|| {
        Rejection::new(
            CheckKind::MinimumSize,
            format!("{}x{} is below {}x{}", width, height, MIN_SIDE, MIN_SIDE),
        )
    })
}

pub fn exposure(frame: &Frame<'_>) -> Option<Rejection> {
    let mean = stats::mean(frame.luminance().iter().copied());
    (!(MIN_MEAN_LUMINANCE..=MAX_MEAN_LUMINANCE).contains(&mean)).then(|| {
        Rejection::new(
            CheckKind::Exposure,
            format!(
                "mean luminance {:.1} outside [{}, {}]",
                mean, MIN_MEAN_LUMINANCE, MAX_MEAN_LUMINANCE
            ),
        )
    })
}

pub fn color_variance(frame: &Frame<'_>) -> Option<Rejection> {
    let std = stats::pixel_std(frame.image());
    (std < MIN_PIXEL_STD).then(|| {
        Rejection::new(
            CheckKind::ColorVariance,
            format!("pixel std {:.1} < {}", std, MIN_PIXEL_STD),
        )
    })
}

pub fn edge_density(frame: &Frame<'_>) -> Option<Rejection> {
    grid_structure(frame)
}

/// Table or document structure: too many sharp luminance jumps between neighbours.
/// Shared by the validity and the non-waste group.
pub(super) fn grid_structure(frame: &Frame<'_>) -> Option<Rejection> {
    let edges = stats::edge_counts(frame.luminance(), EDGE_JUMP);
    let horizontal_limit = EDGE_DENSITY * frame.height() as f64;
    let vertical_limit = EDGE_DENSITY * frame.width() as f64;

    if edges.horizontal as f64 > horizontal_limit {
        return Some(Rejection::new(
            CheckKind::EdgeDensity,
            format!(
                "{} horizontal edges > {:.1}",
                edges.horizontal, horizontal_limit
            ),
        ));
    }
    if edges.vertical as f64 > vertical_limit {
        return Some(Rejection::new(
            CheckKind::EdgeDensity,
            format!("{} vertical edges > {:.1}", edges.vertical, vertical_limit),
        ));
    }
    None
}

pub fn text_rows(frame: &Frame<'_>) -> Option<Rejection> {
    let rows = stats::high_contrast_rows(frame.luminance(), TEXT_ROW_STD);
    let limit = TEXT_ROW_FRACTION * frame.height() as f64;
    (rows as f64 > limit).then(|| {
        Rejection::new(
            CheckKind::TextRows,
            format!("{} high-contrast rows > {:.1}", rows, limit),
        )
    })
}

pub fn aspect_ratio(frame: &Frame<'_>) -> Option<Rejection> {
    let ratio = frame.width() as f64 / frame.height() as f64;
    (ratio > MAX_ASPECT_RATIO || ratio < MIN_ASPECT_RATIO).then(|| {
        Rejection::new(
            CheckKind::AspectRatio,
            format!(
                "aspect ratio {:.2} outside [{}, {}]",
                ratio, MIN_ASPECT_RATIO, MAX_ASPECT_RATIO
            ),
        )
    })
}
