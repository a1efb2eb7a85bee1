use super::{Classifier, InferenceError, ModelError};
use ndarray::Array4;
use std::path::Path;
use std::sync::Mutex;
use tch::{CModule, Device, Kind, Tensor};

/// TorchScript export of the waste classifier.
pub struct TorchClassifier {
    module: Mutex<CModule>,
    device: Device,
}

impl TorchClassifier {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let device = Device::cuda_if_available();
        let module =
            CModule::load_on_device(path, device).map_err(|e| ModelError::Load(e.to_string()))?;
        log::info!("Loaded model {} on {:?}", path.display(), device);
        Ok(Self {
            module: Mutex::new(module),
            device,
        })
    }
}

impl Classifier for TorchClassifier {
    fn predict(&self, batch: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        let shape: Vec<i64> = batch.shape().iter().map(|&d| d as i64).collect();
        let data: Vec<f32> = batch.iter().copied().collect();
        let input = Tensor::from_slice(&data)
            .view(shape.as_slice())
            .to_device(self.device);

        let module = self
            .module
            .lock()
            .map_err(|e| InferenceError::Model(format!("model lock poisoned: {}", e)))?;
        let output = module
            .forward_ts(&[input])
            .map_err(|e| InferenceError::Model(e.to_string()))?;

        let output_flat = output.to_kind(Kind::Float).to_device(Device::Cpu).view([-1]);
        let num_elements = output_flat.size()[0] as usize;
        let mut output_vec = vec![0.0f32; num_elements];
        output_flat.copy_data(&mut output_vec, num_elements);
        Ok(output_vec)
    }
}
