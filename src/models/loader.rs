//! Model artifact loading.
//!
//! Classifiers are ONNX sessions; scalers are JSON parameter files exported
//! by the training pipeline. Classifier and scaler load failures are fatal
//! at startup. The sequence model is the exception: if it cannot be loaded
//! the engine runs with the sequence adapter in fallback mode.

use crate::error::{EngineError, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Parameters of an externally fitted scaler.
///
/// A single-feature scaler (one mean/scale pair) broadcasts over every
/// position, which is how the sequence scaler is exported.
#[derive(Debug, Clone, Deserialize)]
pub struct FittedScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl FittedScaler {
    /// Standardize a feature vector into the f32 input the sessions expect.
    pub fn transform(&self, values: &[f64]) -> Vec<f32> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let (mean, scale) = if self.mean.len() == 1 {
                    (self.mean[0], self.scale[0])
                } else {
                    (self.mean[i], self.scale[i])
                };
                ((v - mean) / scale) as f32
            })
            .collect()
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.mean.is_empty() || self.mean.len() != self.scale.len() {
            return Err(format!(
                "scaler parameter lengths do not match: {} means, {} scales",
                self.mean.len(),
                self.scale.len()
            ));
        }
        if self.scale.iter().any(|s| *s == 0.0) {
            return Err("scaler contains a zero scale factor".to_string());
        }
        Ok(())
    }
}

/// Loaded ONNX model with resolved input/output names.
pub struct LoadedModel {
    pub name: String,
    pub session: Session,
    pub input_name: String,
    pub output_name: String,
}

/// Loader for model artifacts.
pub struct ArtifactLoader {
    models_dir: PathBuf,
    scalers_dir: PathBuf,
    onnx_threads: usize,
}

impl ArtifactLoader {
    /// Initialize the ONNX runtime and remember the artifact directories.
    pub fn new(
        models_dir: impl Into<PathBuf>,
        scalers_dir: impl Into<PathBuf>,
        onnx_threads: usize,
    ) -> Result<Self> {
        ort::init()
            .commit()
            .map_err(|e| EngineError::artifact("onnxruntime", e))?;
        info!(onnx_threads, "ONNX Runtime initialized");
        Ok(Self {
            models_dir: models_dir.into(),
            scalers_dir: scalers_dir.into(),
            onnx_threads,
        })
    }

    /// Load fitted scaler parameters from `<scalers_dir>/<name>.json`.
    pub fn load_scaler(&self, name: &str) -> Result<FittedScaler> {
        let path = self.scalers_dir.join(format!("{name}.json"));
        let raw = std::fs::read(&path).map_err(|e| EngineError::artifact(name, e))?;
        let scaler: FittedScaler =
            serde_json::from_slice(&raw).map_err(|e| EngineError::artifact(name, e))?;
        scaler
            .validate()
            .map_err(|message| EngineError::artifact(name, message))?;

        info!(scaler = %name, features = scaler.mean.len(), "Scaler loaded");
        Ok(scaler)
    }

    /// Load a required classifier from `<models_dir>/<name>.onnx`.
    pub fn load_classifier(&self, name: &str) -> Result<LoadedModel> {
        let path = self.models_dir.join(format!("{name}.onnx"));
        self.load_session(&path, name)
    }

    /// Load the sequence model, degrading to `None` when unavailable.
    pub fn load_sequence_model(&self, name: &str) -> Option<LoadedModel> {
        let path = self.models_dir.join(format!("{name}.onnx"));
        match self.load_session(&path, name) {
            Ok(model) => Some(model),
            Err(e) => {
                warn!(
                    model = %name,
                    error = %e,
                    "Sequence model unavailable, adapter will return the neutral fallback"
                );
                None
            }
        }
    }

    fn load_session(&self, path: &Path, name: &str) -> Result<LoadedModel> {
        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()
            .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|builder| builder.with_intra_threads(self.onnx_threads))
            .and_then(|builder| builder.commit_from_file(path))
            .map_err(|e| EngineError::artifact(name, e))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob") || o.name.contains("score"))
            .map(|o| o.name.clone())
            .unwrap_or_else(|| {
                session
                    .outputs
                    .last()
                    .map(|o| o.name.clone())
                    .unwrap_or_else(|| "probabilities".to_string())
            });

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            name: name.to_string(),
            session,
            input_name,
            output_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaler_transform_per_feature() {
        let scaler = FittedScaler {
            mean: vec![1.0, 2.0],
            scale: vec![0.5, 2.0],
        };
        let scaled = scaler.transform(&[2.0, 6.0]);
        assert_eq!(scaled, vec![2.0f32, 2.0f32]);
    }

    #[test]
    fn test_single_feature_scaler_broadcasts() {
        let scaler = FittedScaler {
            mean: vec![1.0],
            scale: vec![2.0],
        };
        let scaled = scaler.transform(&[1.0, 3.0, 5.0]);
        assert_eq!(scaled, vec![0.0f32, 1.0f32, 2.0f32]);
    }

    #[test]
    fn test_scaler_validation() {
        let mismatched = FittedScaler {
            mean: vec![1.0, 2.0],
            scale: vec![1.0],
        };
        assert!(mismatched.validate().is_err());

        let zero_scale = FittedScaler {
            mean: vec![1.0],
            scale: vec![0.0],
        };
        assert!(zero_scale.validate().is_err());
    }
}
