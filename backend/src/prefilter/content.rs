//! Checks for photographs that are valid images but unlikely to show waste.

use super::stats;
use super::validity::grid_structure;
use super::{CheckKind, Frame, Rejection};

pub const WHITE_LUMINANCE: f64 = 200.0;
pub const WHITE_FRACTION: f64 = 0.7;

pub const SKIN_DOMINANT: f64 = 0.25;
pub const SKIN_WITH_HAIR: f64 = 0.10;
pub const SKIN_PRESENT: f64 = 0.05;
pub const HAIR_LUMINANCE: f64 = 80.0;
pub const HAIR_FRACTION: f64 = 0.15;
pub const MIRROR_DIFFERENCE: f64 = 25.0;
pub const GRADIENT_MAGNITUDE: f64 = 30.0;
pub const GRADIENT_FRACTION: f64 = 0.08;

pub const SCREEN_LUMINANCE: f64 = 240.0;
pub const SCREEN_FRACTION: f64 = 0.5;

pub const DARK_LUMINANCE: f64 = 50.0;
pub const DARK_FRACTION: f64 = 0.6;

pub const VIVID_PIXEL_STD: f64 = 80.0;
pub const VIVID_CHANNEL_STD: f64 = 40.0;
pub const VIVID_FRACTION: f64 = 0.3;

pub fn document_area(frame: &Frame<'_>) -> Option<Rejection> {
    let white = stats::fraction(frame.luminance(), |v| v > WHITE_LUMINANCE);
    if white > WHITE_FRACTION {
        return Some(Rejection::new(
            CheckKind::WhiteArea,
            format!("white fraction {:.3} > {}", white, WHITE_FRACTION),
        ));
    }
    grid_structure(frame)
}

pub fn face_like(frame: &Frame<'_>) -> Option<Rejection> {
    let skin = stats::skin_ratio(frame.image());
    if skin > SKIN_DOMINANT {
        return Some(Rejection::new(
            CheckKind::Face,
            format!("skin ratio {:.3} > {}", skin, SKIN_DOMINANT),
        ));
    }

    if skin > SKIN_WITH_HAIR {
        let dark = stats::fraction(frame.luminance(), |v| v < HAIR_LUMINANCE);
        if dark > HAIR_FRACTION {
            return Some(Rejection::new(
                CheckKind::Face,
                format!(
                    "skin ratio {:.3} with dark fraction {:.3} > {}",
                    skin, dark, HAIR_FRACTION
                ),
            ));
        }
    }

    if skin > SKIN_PRESENT {
        let mirror = stats::mirror_difference(frame.luminance());
        if mirror < MIRROR_DIFFERENCE {
            return Some(Rejection::new(
                CheckKind::Face,
                format!(
                    "skin ratio {:.3} with mirror difference {:.1} < {}",
                    skin, mirror, MIRROR_DIFFERENCE
                ),
            ));
        }

        let gradient = stats::high_gradient_fraction(frame.luminance(), GRADIENT_MAGNITUDE);
        if gradient > GRADIENT_FRACTION {
            return Some(Rejection::new(
                CheckKind::Face,
                format!(
                    "skin ratio {:.3} with gradient fraction {:.3} > {}",
                    skin, gradient, GRADIENT_FRACTION
                ),
            ));
        }
    }

    None
}

pub fn screenshot(frame: &Frame<'_>) -> Option<Rejection> {
    let bright = stats::fraction(frame.luminance(), |v| v > SCREEN_LUMINANCE);
    (bright > SCREEN_FRACTION).then(|| {
        Rejection::new(
            CheckKind::Screenshot,
            format!("bright fraction {:.3} > {}", bright, SCREEN_FRACTION),
        )
    })
}

pub fn too_dark(frame: &Frame<'_>) -> Option<Rejection> {
    let dark = stats::fraction(frame.luminance(), |v| v < DARK_LUMINANCE);
    (dark > DARK_FRACTION).then(|| {
        Rejection::new(
            CheckKind::TooDark,
            format!("dark fraction {:.3} > {}", dark, DARK_FRACTION),
        )
    })
}

pub fn vivid_photo(frame: &Frame<'_>) -> Option<Rejection> {
    let std = stats::pixel_std(frame.image());
    if std <= VIVID_PIXEL_STD {
        return None;
    }
    let vivid = stats::channel_spread_fraction(frame.image(), VIVID_CHANNEL_STD);
    (vivid > VIVID_FRACTION).then(|| {
        Rejection::new(
            CheckKind::VividPhoto,
            format!(
                "pixel std {:.1} with saturated fraction {:.3} > {}",
                std, vivid, VIVID_FRACTION
            ),
        )
    })
}
