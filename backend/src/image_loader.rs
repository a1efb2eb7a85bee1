use image::RgbImage;
use ndarray::{Array3, ArrayView3};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Unsupported file type '{0}', expected one of: {1}")]
    UnsupportedExtension(String, String),
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Invalid pixel array: {0}")]
    InvalidShape(String),
}

/// Decoded RGB pixels indexed by (row, column, channel).
#[derive(Debug, Clone, PartialEq)]
pub struct PixelImage {
    pixels: Array3<u8>,
}

impl PixelImage {
    pub fn new(pixels: Array3<u8>) -> Result<Self, ImageError> {
        let (height, width, channels) = pixels.dim();
        if channels != 3 {
            return Err(ImageError::InvalidShape(format!(
                "expected 3 channels, got {}",
                channels
            )));
        }
        if height == 0 || width == 0 {
            return Err(ImageError::InvalidShape(format!(
                "image must be non-empty, got {}x{}",
                width, height
            )));
        }
        Ok(Self { pixels })
    }

    pub fn from_rgb(image: RgbImage) -> Result<Self, ImageError> {
        let (width, height) = image.dimensions();
        let pixels = Array3::from_shape_vec((height as usize, width as usize, 3), image.into_raw())
            .map_err(|e| ImageError::InvalidShape(e.to_string()))?;
        Self::new(pixels)
    }

    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    pub fn pixels(&self) -> ArrayView3<'_, u8> {
        self.pixels.view()
    }

    pub fn rgb(&self, row: usize, col: usize) -> [u8; 3] {
        [
            self.pixels[[row, col, 0]],
            self.pixels[[row, col, 1]],
            self.pixels[[row, col, 2]],
        ]
    }

    pub fn to_rgb_image(&self) -> Result<RgbImage, ImageError> {
        let raw: Vec<u8> = self.pixels.iter().copied().collect();
        RgbImage::from_raw(self.width() as u32, self.height() as u32, raw).ok_or_else(|| {
            ImageError::InvalidShape("pixel buffer does not match dimensions".into())
        })
    }
}

#[derive(Debug, Clone)]
pub struct ImageLoader {
    allowed_extensions: Vec<String>,
}

impl ImageLoader {
    pub fn new(allowed_extensions: &[String]) -> Self {
        Self {
            allowed_extensions: allowed_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn check_extension(&self, file_name: &str) -> Result<(), ImageError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        if self.allowed_extensions.iter().any(|allowed| *allowed == extension) {
            Ok(())
        } else {
            Err(ImageError::UnsupportedExtension(
                extension,
                self.allowed_extensions.join(", "),
            ))
        }
    }

    /// Checks the extension, decodes the bytes and normalizes to three channels.
    pub fn load(&self, file_name: &str, bytes: &[u8]) -> Result<PixelImage, ImageError> {
        self.check_extension(file_name)?;
        let decoded = image::load_from_memory(bytes)?;
        PixelImage::from_rgb(decoded.to_rgb8())
    }
}
