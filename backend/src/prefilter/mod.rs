//! Statistical pre-filter that turns away uploads which are unlikely to show waste.
//!
//! Two ordered groups of checks run over cheap summary statistics. The validity group
//! rejects images that are not usable photographs, the non-waste group rejects
//! documents, faces, screenshots and similar. Within the whole sequence the first
//! rejection wins. Thresholds are fixed policy values.

pub mod content;
pub mod stats;
pub mod validity;

use crate::image_loader::PixelImage;
use ndarray::Array2;
use shared::Diagnostics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    MinimumSize,
    Exposure,
    ColorVariance,
    EdgeDensity,
    TextRows,
    AspectRatio,
    WhiteArea,
    Face,
    Screenshot,
    TooDark,
    VividPhoto,
}

impl CheckKind {
    pub fn reason(&self) -> &'static str {
        match self {
            CheckKind::MinimumSize => "Image is too small (minimum 50x50 pixels)",
            CheckKind::Exposure => "Image is too dark or too bright",
            CheckKind::ColorVariance => "Image is too monotone to be a waste photo",
            CheckKind::EdgeDensity => "Image looks like a table or document",
            CheckKind::TextRows => "Image appears to contain text",
            CheckKind::AspectRatio => "Image aspect ratio is unusual for a waste photo",
            CheckKind::WhiteArea => "Image has too much white area, likely a document",
            CheckKind::Face => "Image appears to contain a face or person",
            CheckKind::Screenshot => "Image looks like a screenshot or user interface",
            CheckKind::TooDark => "Image is mostly dark",
            CheckKind::VividPhoto => "Image looks like a colorful photograph, not waste",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub check: CheckKind,
    pub reason: String,
    /// The measurement that tripped the check, surfaced in debug mode.
    pub detail: String,
}

impl Rejection {
    pub fn new(check: CheckKind, detail: String) -> Self {
        Self {
            check,
            reason: check.reason().to_string(),
            detail,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterVerdict {
    Accepted,
    Rejected(Rejection),
}

impl FilterVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, FilterVerdict::Accepted)
    }
}

/// Pixels plus the luminance plane every check reads from.
pub struct Frame<'a> {
    image: &'a PixelImage,
    luminance: Array2<f64>,
}

impl<'a> Frame<'a> {
    pub fn new(image: &'a PixelImage) -> Self {
        Self {
            image,
            luminance: stats::luminance(image),
        }
    }

    pub fn image(&self) -> &PixelImage {
        self.image
    }

    pub fn luminance(&self) -> &Array2<f64> {
        &self.luminance
    }

    pub fn height(&self) -> usize {
        self.image.height()
    }

    pub fn width(&self) -> usize {
        self.image.width()
    }
}

pub type Check = fn(&Frame<'_>) -> Option<Rejection>;

pub const VALIDITY_CHECKS: &[Check] = &[
    validity::minimum_size,
    validity::exposure,
    validity::color_variance,
    validity::edge_density,
    validity::text_rows,
    validity::aspect_ratio,
];

pub const CONTENT_CHECKS: &[Check] = &[
    content::document_area,
    content::face_like,
    content::screenshot,
    content::too_dark,
    content::vivid_photo,
];

fn run(frame: &Frame<'_>, checks: &[Check]) -> FilterVerdict {
    checks
        .iter()
        .find_map(|check| check(frame))
        .map_or(FilterVerdict::Accepted, FilterVerdict::Rejected)
}

/// Runs the validity group, then the non-waste group.
pub fn evaluate(image: &PixelImage) -> FilterVerdict {
    let frame = Frame::new(image);
    let verdict = validate(&frame);
    if verdict.is_accepted() {
        screen(&frame)
    } else {
        verdict
    }
}

/// Checks 1 to 6: is this a usable photograph at all.
pub fn validate(frame: &Frame<'_>) -> FilterVerdict {
    run(frame, VALIDITY_CHECKS)
}

/// Checks 7 to 11: does the photograph look like something other than waste.
pub fn screen(frame: &Frame<'_>) -> FilterVerdict {
    run(frame, CONTENT_CHECKS)
}

/// Every intermediate statistic the checks look at, for debug output.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterDiagnostics {
    pub height: usize,
    pub width: usize,
    pub aspect_ratio: f64,
    pub mean_luminance: f64,
    pub pixel_std: f64,
    pub horizontal_edges: usize,
    pub vertical_edges: usize,
    pub high_contrast_rows: usize,
    pub white_fraction: f64,
    pub skin_ratio: f64,
    pub hair_fraction: f64,
    pub mirror_difference: f64,
    pub high_gradient_fraction: f64,
    pub bright_fraction: f64,
    pub dark_fraction: f64,
    pub saturated_fraction: f64,
}

pub fn diagnose(image: &PixelImage) -> FilterDiagnostics {
    let frame = Frame::new(image);
    let lum = frame.luminance();
    let edges = stats::edge_counts(lum, validity::EDGE_JUMP);

    FilterDiagnostics {
        height: frame.height(),
        width: frame.width(),
        aspect_ratio: frame.width() as f64 / frame.height() as f64,
        mean_luminance: stats::mean(lum.iter().copied()),
        pixel_std: stats::pixel_std(image),
        horizontal_edges: edges.horizontal,
        vertical_edges: edges.vertical,
        high_contrast_rows: stats::high_contrast_rows(lum, validity::TEXT_ROW_STD),
        white_fraction: stats::fraction(lum, |v| v > content::WHITE_LUMINANCE),
        skin_ratio: stats::skin_ratio(image),
        hair_fraction: stats::fraction(lum, |v| v < content::HAIR_LUMINANCE),
        mirror_difference: stats::mirror_difference(lum),
        high_gradient_fraction: stats::high_gradient_fraction(lum, content::GRADIENT_MAGNITUDE),
        bright_fraction: stats::fraction(lum, |v| v > content::SCREEN_LUMINANCE),
        dark_fraction: stats::fraction(lum, |v| v < content::DARK_LUMINANCE),
        saturated_fraction: stats::channel_spread_fraction(image, content::VIVID_CHANNEL_STD),
    }
}

impl FilterDiagnostics {
    pub fn to_map(&self) -> Diagnostics {
        [
            ("height", self.height as f64),
            ("width", self.width as f64),
            ("aspect_ratio", self.aspect_ratio),
            ("mean_luminance", self.mean_luminance),
            ("pixel_std", self.pixel_std),
            ("horizontal_edges", self.horizontal_edges as f64),
            ("vertical_edges", self.vertical_edges as f64),
            ("high_contrast_rows", self.high_contrast_rows as f64),
            ("white_fraction", self.white_fraction),
            ("skin_ratio", self.skin_ratio),
            ("hair_fraction", self.hair_fraction),
            ("mirror_difference", self.mirror_difference),
            ("high_gradient_fraction", self.high_gradient_fraction),
            ("bright_fraction", self.bright_fraction),
            ("dark_fraction", self.dark_fraction),
            ("saturated_fraction", self.saturated_fraction),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::samples::{checkerboard, textured_noise};
    use super::*;
    use crate::image_loader::fixtures::{from_fn, uniform};

    fn rejected_by(verdict: FilterVerdict) -> CheckKind {
        match verdict {
            FilterVerdict::Rejected(rejection) => rejection.check,
            FilterVerdict::Accepted => panic!("expected a rejection"),
        }
    }

    #[test]
    fn small_images_are_rejected_before_anything_else() {
        assert_eq!(rejected_by(evaluate(&checkerboard(49, 200))), CheckKind::MinimumSize);
        assert_eq!(rejected_by(evaluate(&uniform(200, 10, [0, 0, 0]))), CheckKind::MinimumSize);
        assert_eq!(
            rejected_by(evaluate(&textured_noise(60, 49, 3))),
            CheckKind::MinimumSize
        );
    }

    #[test]
    fn size_rejection_carries_human_readable_reason() {
        match evaluate(&uniform(20, 20, [120, 120, 120])) {
            FilterVerdict::Rejected(rejection) => {
                assert_eq!(rejection.reason, "Image is too small (minimum 50x50 pixels)");
                assert_eq!(rejection.detail, "20x20 is below 50x50");
            }
            FilterVerdict::Accepted => panic!("tiny image accepted"),
        }
    }

    #[test]
    fn uniform_colors_are_rejected() {
        assert_eq!(
            rejected_by(evaluate(&uniform(100, 100, [120, 120, 120]))),
            CheckKind::ColorVariance
        );
        assert_eq!(rejected_by(evaluate(&uniform(100, 100, [0, 0, 0]))), CheckKind::Exposure);
        assert_eq!(
            rejected_by(evaluate(&uniform(100, 100, [255, 255, 255]))),
            CheckKind::Exposure
        );
    }

    #[test]
    fn checkerboard_trips_edge_density() {
        assert_eq!(rejected_by(evaluate(&checkerboard(100, 100))), CheckKind::EdgeDensity);
    }

    #[test]
    fn random_texture_is_accepted() {
        let image = textured_noise(120, 120, 42);
        let stats = diagnose(&image);
        assert!((stats.mean_luminance - 128.0).abs() < 5.0);
        assert!(stats.pixel_std > 15.0);
        assert_eq!(evaluate(&image), FilterVerdict::Accepted);
    }

    #[test]
    fn evaluation_is_idempotent() {
        for image in [textured_noise(80, 80, 9), checkerboard(64, 64), uniform(70, 70, [1, 2, 3])] {
            assert_eq!(evaluate(&image), evaluate(&image));
        }
    }

    #[test]
    fn smooth_horizontal_ramp_reads_as_text_rows() {
        let image = from_fn(100, 100, |_, col| {
            let v = (col as f64 * 255.0 / 99.0).round() as u8;
            [v, v, v]
        });
        assert_eq!(rejected_by(evaluate(&image)), CheckKind::TextRows);
    }

    #[test]
    fn banner_shaped_images_are_rejected() {
        assert_eq!(
            rejected_by(evaluate(&textured_noise(300, 50, 5))),
            CheckKind::AspectRatio
        );
        assert_eq!(
            rejected_by(evaluate(&textured_noise(50, 300, 5))),
            CheckKind::AspectRatio
        );
    }

    #[test]
    fn bright_paper_is_rejected_as_white_area() {
        let image = from_fn(100, 100, |row, col| {
            let v = if (row * 7 + col * 3) % 5 < 2 { 205 } else { 245 };
            [v, v, v]
        });
        assert!(validate(&Frame::new(&image)).is_accepted());
        assert_eq!(rejected_by(evaluate(&image)), CheckKind::WhiteArea);
    }

    #[test]
    fn non_waste_group_reuses_the_grid_predicate() {
        let image = checkerboard(100, 100);
        assert_eq!(rejected_by(screen(&Frame::new(&image))), CheckKind::EdgeDensity);
    }

    #[test]
    fn dominant_skin_reads_as_face() {
        let image = from_fn(100, 100, |row, col| {
            if (row + col) % 2 == 0 { [200, 150, 120] } else { [180, 130, 100] }
        });
        assert_eq!(rejected_by(evaluate(&image)), CheckKind::Face);
    }

    #[test]
    fn skin_with_dark_hair_reads_as_face() {
        let image = from_fn(100, 100, |row, _| {
            if row < 20 { [120, 60, 30] } else { [100, 100, 100] }
        });
        let stats = diagnose(&image);
        assert!(stats.skin_ratio > 0.10 && stats.skin_ratio <= 0.25);
        assert_eq!(rejected_by(evaluate(&image)), CheckKind::Face);
    }

    #[test]
    fn symmetric_image_with_some_skin_reads_as_face() {
        let image = from_fn(100, 100, |row, col| {
            let offset = (col as f64 - 49.5).abs() / 49.5;
            let g = (100.0 + 60.0 * offset).round() as u8;
            if row < 8 { [g + 60, g + 10, g - 20] } else { [g, g, g] }
        });
        let stats = diagnose(&image);
        assert!(stats.skin_ratio > 0.05 && stats.skin_ratio <= 0.10);
        assert!(stats.mirror_difference < 1e-9);
        assert_eq!(rejected_by(evaluate(&image)), CheckKind::Face);
    }

    #[test]
    fn skin_with_strong_gradients_reads_as_face() {
        // an asymmetric ramp with a fine checker pattern and a band of skin tones on top
        let image = from_fn(100, 100, |row, col| {
            let ramp = (70.0 + col as f64 * 0.8).round() as u8;
            let g = if (row + col) % 2 == 0 { ramp } else { ramp + 25 };
            if row < 8 { [g + 30, g, g - 30] } else { [g, g, g] }
        });
        let stats = diagnose(&image);
        assert!(stats.skin_ratio > 0.05 && stats.skin_ratio <= 0.10);
        assert!(stats.mirror_difference >= 25.0);
        assert!(stats.high_gradient_fraction > 0.08);
        assert_eq!(stats.horizontal_edges, 0);
        assert_eq!(stats.vertical_edges, 0);

        match evaluate(&image) {
            FilterVerdict::Rejected(rejection) => {
                assert_eq!(rejection.check, CheckKind::Face);
                assert!(rejection.detail.contains("gradient fraction"), "{}", rejection.detail);
            }
            FilterVerdict::Accepted => panic!("expected a face rejection"),
        }
    }

    #[test]
    fn exposure_limits_are_inclusive() {
        for value in [20, 240] {
            let image = uniform(60, 60, [value, value, value]);
            assert_eq!(validity::exposure(&Frame::new(&image)), None, "mean {}", value);
        }
        for value in [19, 241] {
            let image = uniform(60, 60, [value, value, value]);
            let rejection = validity::exposure(&Frame::new(&image)).unwrap();
            assert_eq!(rejection.check, CheckKind::Exposure);
        }
    }

    #[test]
    fn aspect_ratio_limits_are_inclusive() {
        assert_eq!(evaluate(&textured_noise(250, 50, 5)), FilterVerdict::Accepted);
        assert_eq!(evaluate(&textured_noise(50, 250, 5)), FilterVerdict::Accepted);
        assert_eq!(
            rejected_by(evaluate(&textured_noise(251, 50, 5))),
            CheckKind::AspectRatio
        );
        assert_eq!(
            rejected_by(evaluate(&textured_noise(50, 251, 5))),
            CheckKind::AspectRatio
        );
    }

    #[test]
    fn mostly_white_interface_reads_as_screenshot() {
        let image = from_fn(100, 100, |row, _| {
            let v = match row {
                0..60 => 250,
                60 => 215,
                _ => 180,
            };
            [v, v, v]
        });
        assert_eq!(rejected_by(evaluate(&image)), CheckKind::Screenshot);
    }

    #[test]
    fn dim_scene_is_rejected_as_too_dark() {
        let image = from_fn(100, 100, |row, col| {
            let v = if (row + col) % 3 == 0 { 10 } else { 45 };
            [v, v, v]
        });
        assert_eq!(rejected_by(evaluate(&image)), CheckKind::TooDark);
    }

    #[test]
    fn saturated_colors_read_as_vivid_photo() {
        let image = from_fn(100, 100, |row, col| {
            if (row + col) % 2 == 0 { [0, 128, 255] } else { [128, 255, 0] }
        });
        assert_eq!(rejected_by(evaluate(&image)), CheckKind::VividPhoto);
    }

    #[test]
    fn diagnostics_map_lists_every_statistic() {
        let map = diagnose(&textured_noise(60, 60, 1)).to_map();
        assert_eq!(map.len(), 16);
        assert_eq!(map["width"], 60.0);
        assert_eq!(map["horizontal_edges"], 0.0);
    }
}
