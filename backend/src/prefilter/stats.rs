//! Array reductions shared by the pre-filter checks.
//!
//! Every function here is a pure pass over the pixel data. Standard deviations are
//! population deviations.

use crate::image_loader::PixelImage;
use ndarray::{Array2, ArrayView1, ArrayView2, Zip, s};

/// Per-pixel brightness: the unweighted mean of R, G and B.
pub fn luminance(image: &PixelImage) -> Array2<f64> {
    Array2::from_shape_fn((image.height(), image.width()), |(row, col)| {
        let [r, g, b] = image.rgb(row, col);
        (f64::from(r) + f64::from(g) + f64::from(b)) / 3.0
    })
}

pub fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

pub fn std_dev(values: ArrayView1<'_, f64>) -> f64 {
    let m = mean(values.iter().copied());
    mean(values.iter().map(|v| (v - m).powi(2))).sqrt()
}

/// Spread of every channel value of every pixel taken together.
pub fn pixel_std(image: &PixelImage) -> f64 {
    let pixels = image.pixels();
    let m = mean(pixels.iter().map(|&v| f64::from(v)));
    mean(pixels.iter().map(|&v| (f64::from(v) - m).powi(2))).sqrt()
}

pub fn fraction(luminance: &Array2<f64>, predicate: impl Fn(f64) -> bool) -> f64 {
    if luminance.is_empty() {
        return 0.0;
    }
    let hits = luminance.iter().filter(|&&v| predicate(v)).count();
    hits as f64 / luminance.len() as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeCounts {
    /// Adjacent column pairs, summed over all rows.
    pub horizontal: usize,
    /// Adjacent row pairs, summed over all columns.
    pub vertical: usize,
}

pub fn edge_counts(luminance: &Array2<f64>, threshold: f64) -> EdgeCounts {
    let (height, width) = luminance.dim();
    let horizontal = if width > 1 {
        count_jumps(luminance.slice(s![.., 1..]), luminance.slice(s![.., ..-1]), threshold)
    } else {
        0
    };
    let vertical = if height > 1 {
        count_jumps(luminance.slice(s![1.., ..]), luminance.slice(s![..-1, ..]), threshold)
    } else {
        0
    };
    EdgeCounts { horizontal, vertical }
}

fn count_jumps(a: ArrayView2<'_, f64>, b: ArrayView2<'_, f64>, threshold: f64) -> usize {
    Zip::from(a)
        .and(b)
        .fold(0usize, |acc, &x, &y| if (x - y).abs() > threshold { acc + 1 } else { acc })
}

/// Number of rows whose luminance deviation exceeds `threshold`.
pub fn high_contrast_rows(luminance: &Array2<f64>, threshold: f64) -> usize {
    luminance
        .rows()
        .into_iter()
        .filter(|row| std_dev(*row) > threshold)
        .count()
}

pub fn is_skin([r, g, b]: [u8; 3]) -> bool {
    let (r, g, b) = (i32::from(r), i32::from(g), i32::from(b));
    r > 95 && g > 40 && b > 20 && r > g && r > b && (r - g).abs() > 15
}

pub fn skin_ratio(image: &PixelImage) -> f64 {
    let (height, width) = (image.height(), image.width());
    let skin = (0..height)
        .flat_map(|row| (0..width).map(move |col| (row, col)))
        .filter(|&(row, col)| is_skin(image.rgb(row, col)))
        .count();
    skin as f64 / (height * width) as f64
}

/// Mean absolute luminance difference between the left half and the mirrored right
/// half. The middle column of an odd-width image belongs to neither half.
pub fn mirror_difference(luminance: &Array2<f64>) -> f64 {
    let (_, width) = luminance.dim();
    let half = width / 2;
    if half == 0 {
        return f64::INFINITY;
    }
    let left = luminance.slice(s![.., ..half]);
    let right_mirrored = luminance.slice(s![.., width - half..;-1]);
    let diffs = Zip::from(left)
        .and(right_mirrored)
        .map_collect(|&l, &r| (l - r).abs());
    mean(diffs.iter().copied())
}

/// Fraction of the `(h-1) x (w-1)` grid whose forward-difference gradient magnitude
/// exceeds `threshold`.
pub fn high_gradient_fraction(luminance: &Array2<f64>, threshold: f64) -> f64 {
    let (height, width) = luminance.dim();
    if height < 2 || width < 2 {
        return 0.0;
    }
    let here = luminance.slice(s![..-1, ..-1]);
    let right = luminance.slice(s![..-1, 1..]);
    let below = luminance.slice(s![1.., ..-1]);
    let hits = Zip::from(here)
        .and(right)
        .and(below)
        .fold(0usize, |acc, &p, &r, &b| {
            if (r - p).hypot(b - p) > threshold { acc + 1 } else { acc }
        });
    hits as f64 / ((height - 1) * (width - 1)) as f64
}

/// Fraction of pixels whose three channel values deviate from each other by more than
/// `threshold`.
pub fn channel_spread_fraction(image: &PixelImage, threshold: f64) -> f64 {
    let (height, width) = (image.height(), image.width());
    let spread = (0..height)
        .flat_map(|row| (0..width).map(move |col| (row, col)))
        .filter(|&(row, col)| {
            let channels = image.rgb(row, col).map(f64::from);
            std_dev(ArrayView1::from(&channels[..])) > threshold
        })
        .count();
    spread as f64 / (height * width) as f64
}
