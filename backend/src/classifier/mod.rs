#[cfg(feature = "torch")]
pub mod torch;

use crate::config::ModelConfig;
use crate::image_loader::PixelImage;
use image::imageops::{self, FilterType};
use ndarray::Array4;
use shared::{ModelInfo, WasteLabel};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strum::IntoEnumIterator;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Preprocessing failed: {0}")]
    Preprocessing(String),
    #[cfg_attr(not(feature = "torch"), allow(dead_code))]
    #[error("{0}")]
    Model(String),
    #[error("Unexpected model output: {0}")]
    UnexpectedOutput(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model not found: {0}")]
    NotFound(String),
    #[cfg_attr(not(feature = "torch"), allow(dead_code))]
    #[error("Failed to load model: {0}")]
    Load(String),
    #[error("No model backend compiled in, rebuild with `--features torch`")]
    BackendUnavailable,
}

/// A forward pass over a `(1, height, width, 3)` batch scaled to `[0, 1]`.
pub trait Classifier: Send + Sync {
    fn predict(&self, batch: &Array4<f32>) -> Result<Vec<f32>, InferenceError>;
}

/// The process-wide model, loaded once at startup.
#[derive(Clone)]
pub struct ModelHandle {
    classifier: Arc<dyn Classifier>,
    path: PathBuf,
    input_size: [u32; 2],
}

impl ModelHandle {
    pub fn load(config: &ModelConfig) -> Result<Self, ModelError> {
        if !config.path.exists() {
            return Err(ModelError::NotFound(config.path.display().to_string()));
        }
        let classifier = load_backend(&config.path)?;
        Ok(Self::new(classifier, config))
    }

    pub fn new(classifier: Arc<dyn Classifier>, config: &ModelConfig) -> Self {
        Self {
            classifier,
            path: config.path.clone(),
            input_size: config.input_size,
        }
    }

    pub fn input_shape(&self) -> [usize; 4] {
        let [width, height] = self.input_size;
        [1, height as usize, width as usize, 3]
    }

    pub fn info(&self, policy: &ConfidencePolicy) -> ModelInfo {
        ModelInfo {
            path: self.path.display().to_string(),
            input_shape: self.input_shape().to_vec(),
            class_labels: WasteLabel::iter().map(|label| label.to_string()).collect(),
            confidence_threshold: policy.threshold,
        }
    }

    pub fn classify(&self, image: &PixelImage) -> Result<ClassificationResult, InferenceError> {
        let batch = preprocess(image, self.input_size)?;
        let probabilities = self.classifier.predict(&batch)?;
        ClassificationResult::from_probabilities(probabilities)
    }
}

#[cfg(feature = "torch")]
fn load_backend(path: &Path) -> Result<Arc<dyn Classifier>, ModelError> {
    Ok(Arc::new(torch::TorchClassifier::load(path)?))
}

#[cfg(not(feature = "torch"))]
fn load_backend(path: &Path) -> Result<Arc<dyn Classifier>, ModelError> {
    log::error!("Cannot load {}: built without a model backend", path.display());
    Err(ModelError::BackendUnavailable)
}

/// Resizes to the model input with bicubic filtering and scales channels to `[0, 1]`.
pub fn preprocess(
    image: &PixelImage,
    [width, height]: [u32; 2],
) -> Result<Array4<f32>, InferenceError> {
    let rgb = image
        .to_rgb_image()
        .map_err(|e| InferenceError::Preprocessing(e.to_string()))?;
    let resized = imageops::resize(&rgb, width, height, FilterType::CatmullRom);

    Ok(Array4::from_shape_fn(
        (1, height as usize, width as usize, 3),
        |(_, y, x, c)| f32::from(resized.get_pixel(x as u32, y as u32)[c]) / 255.0,
    ))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub label: WasteLabel,
    /// Highest class probability as a percentage.
    pub confidence: f64,
    pub probabilities: Vec<f32>,
}

impl ClassificationResult {
    pub fn from_probabilities(probabilities: Vec<f32>) -> Result<Self, InferenceError> {
        let expected = WasteLabel::iter().count();
        if probabilities.len() != expected {
            return Err(InferenceError::UnexpectedOutput(format!(
                "expected {} probabilities, got {}",
                expected,
                probabilities.len()
            )));
        }

        let (index, &best) = probabilities
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .ok_or_else(|| InferenceError::UnexpectedOutput("empty output".into()))?;
        let label = WasteLabel::from_index(index).ok_or_else(|| {
            InferenceError::UnexpectedOutput(format!("no label for class {}", index))
        })?;

        Ok(Self {
            label,
            confidence: f64::from(best) * 100.0,
            probabilities,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidencePolicy {
    pub threshold: f64,
}

impl ConfidencePolicy {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Results at or below the threshold are inconclusive and never recorded.
    pub fn is_conclusive(&self, confidence: f64) -> bool {
        confidence > self.threshold
    }
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self::new(60.0)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{ScriptedClassifier, handle};
    use super::*;
    use crate::image_loader::fixtures::{from_fn, uniform};

    #[test]
    fn preprocess_produces_batched_nhwc_tensor() {
        let image = uniform(200, 120, [255, 0, 51]);
        let batch = preprocess(&image, [50, 50]).unwrap();
        assert_eq!(batch.shape(), &[1, 50, 50, 3]);
        assert!((batch[[0, 10, 20, 0]] - 1.0).abs() < 1e-6);
        assert!(batch[[0, 10, 20, 1]].abs() < 1e-6);
        assert!((batch[[0, 49, 49, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn preprocess_keeps_values_in_unit_range() {
        let image = from_fn(64, 64, |row, col| {
            if (row + col) % 2 == 0 { [0, 0, 0] } else { [255, 255, 255] }
        });
        let batch = preprocess(&image, [50, 50]).unwrap();
        assert!(batch.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn picks_highest_probability_class() {
        let result = ClassificationResult::from_probabilities(vec![0.2, 0.8]).unwrap();
        assert_eq!(result.label, WasteLabel::Inorganic);
        assert!((result.confidence - 80.0).abs() < 1e-4);

        let result = ClassificationResult::from_probabilities(vec![0.9, 0.1]).unwrap();
        assert_eq!(result.label, WasteLabel::Organic);
    }

    #[test]
    fn rejects_output_of_wrong_length() {
        assert!(matches!(
            ClassificationResult::from_probabilities(vec![0.1, 0.2, 0.7]),
            Err(InferenceError::UnexpectedOutput(_))
        ));
        assert!(matches!(
            ClassificationResult::from_probabilities(vec![]),
            Err(InferenceError::UnexpectedOutput(_))
        ));
    }

    #[test]
    fn threshold_boundary_is_strict() {
        let policy = ConfidencePolicy::default();
        assert!(!policy.is_conclusive(60.0));
        assert!(!policy.is_conclusive(59.99));
        assert!(policy.is_conclusive(60.01));
        assert!(!policy.is_conclusive(f64::NAN));
    }

    #[test]
    fn classify_feeds_the_model_its_input_shape() {
        let classifier = Arc::new(ScriptedClassifier::always(vec![0.7, 0.3]));
        let model = handle(classifier.clone());
        let result = model.classify(&uniform(80, 60, [10, 200, 30])).unwrap();

        assert_eq!(result.label, WasteLabel::Organic);
        assert_eq!(*classifier.seen_shapes.lock().unwrap(), vec![vec![1, 50, 50, 3]]);
    }

    #[test]
    fn model_errors_keep_their_message() {
        let model = handle(Arc::new(ScriptedClassifier::failing("CUDA out of memory")));
        let err = model.classify(&uniform(60, 60, [1, 1, 1])).unwrap_err();
        assert_eq!(err.to_string(), "CUDA out of memory");
    }

    #[test]
    fn missing_artifact_fails_to_load() {
        let config = ModelConfig {
            path: PathBuf::from("/nonexistent/model97.pt"),
            ..ModelConfig::default()
        };
        assert!(matches!(ModelHandle::load(&config), Err(ModelError::NotFound(_))));
    }

    #[test]
    fn info_reports_shape_and_labels() {
        let model = handle(Arc::new(ScriptedClassifier::always(vec![0.5, 0.5])));
        let info = model.info(&ConfidencePolicy::default());
        assert_eq!(info.input_shape, vec![1, 50, 50, 3]);
        assert_eq!(info.class_labels, vec!["Organic", "Inorganic"]);
        assert_eq!(info.confidence_threshold, 60.0);
    }
}
