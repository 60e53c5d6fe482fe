//! Per-detector score adapters.
//!
//! Each adapter maps a feature vector or raw series to a scalar in [0, 1].
//! Trained adapters wrap ONNX sessions supplied by the artifact loader; the
//! autoencoder role is a fixed heuristic over already-extracted features
//! and carries no artifact at all.

use crate::error::{EngineError, Result};
use crate::features::FeatureSet;
use crate::models::loader::{ArtifactLoader, FittedScaler, LoadedModel};
use crate::types::prediction::ModelScores;
use ort::memory::Allocator;
use ort::session::Session;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, Tensor};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Number of trailing readings fed to the sequence model.
pub const SEQUENCE_LENGTH: usize = 72;

/// Neutral score substituted when the sequence model is unavailable. A
/// fixed midpoint keeps the ensemble unbiased rather than failing silently.
pub const SEQUENCE_FALLBACK_SCORE: f64 = 0.5;

/// Scores one consumer across all five detector roles.
pub trait DetectorSuite: Send + Sync {
    fn score(&self, series: &[f64], features: &FeatureSet) -> Result<ModelScores>;

    /// Whether the sequence detector is backed by a real artifact.
    fn sequence_available(&self) -> bool {
        true
    }
}

/// Trained classifier adapter: standardized features in, positive-class
/// probability out.
pub struct ClassifierAdapter {
    name: String,
    session: RwLock<Session>,
    input_name: String,
    output_name: String,
    scaler: Arc<FittedScaler>,
}

impl ClassifierAdapter {
    pub fn new(model: LoadedModel, scaler: Arc<FittedScaler>) -> Self {
        Self {
            name: model.name,
            session: RwLock::new(model.session),
            input_name: model.input_name,
            output_name: model.output_name,
            scaler,
        }
    }

    pub fn score(&self, features: &FeatureSet) -> Result<f64> {
        let scaled = self.scaler.transform(&features.to_array());
        let shape = vec![1_i64, scaled.len() as i64];
        run_session(
            &self.session,
            &self.name,
            &self.input_name,
            shape,
            scaled,
            |outputs| extract_probability(outputs, &self.output_name, &self.name),
        )
    }
}

/// Density outlier adapter. The model emits a raw anomaly score where more
/// negative means more anomalous; a logistic transform maps it into [0, 1]
/// so anomalous inputs approach 1.
pub struct OutlierAdapter {
    name: String,
    session: RwLock<Session>,
    input_name: String,
    output_name: String,
    scaler: Arc<FittedScaler>,
}

impl OutlierAdapter {
    pub fn new(model: LoadedModel, scaler: Arc<FittedScaler>) -> Self {
        Self {
            name: model.name,
            session: RwLock::new(model.session),
            input_name: model.input_name,
            output_name: model.output_name,
            scaler,
        }
    }

    pub fn score(&self, features: &FeatureSet) -> Result<f64> {
        let scaled = self.scaler.transform(&features.to_array());
        let shape = vec![1_i64, scaled.len() as i64];
        let raw = run_session(
            &self.session,
            &self.name,
            &self.input_name,
            shape,
            scaled,
            |outputs| extract_raw_score(outputs, &self.output_name, &self.name),
        )?;
        Ok(1.0 / (1.0 + raw.exp()))
    }
}

/// Heuristic pattern adapter filling the autoencoder role.
///
/// A fixed, interpretable linear rule over extracted ratios. Weighting
/// order: negative readings (tampering) > zero readings (bypass) > erratic
/// variability (manipulation) > abnormally low usage.
pub struct HeuristicAdapter;

impl HeuristicAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, features: &FeatureSet) -> f64 {
        let erratic = (features.cv / 2.0).min(1.0);
        let raw = features.zero_ratio * 0.3
            + features.negative_ratio * 0.4
            + erratic * 0.2
            + features.low_consumption_ratio * 0.1;
        raw.clamp(0.0, 1.0)
    }
}

impl Default for HeuristicAdapter {
    fn default() -> Self {
        Self::new()
    }
}

struct SequenceModel {
    name: String,
    session: RwLock<Session>,
    input_name: String,
    output_name: String,
    scaler: Arc<FittedScaler>,
}

/// Sequence model adapter. Consumes the last 72 readings (left-zero-padded
/// when the series is shorter), scaled by a dedicated fitted scaler. When
/// the model artifact could not be loaded the adapter stays in fallback
/// mode for the lifetime of the process.
pub struct SequenceAdapter {
    inner: Option<SequenceModel>,
}

impl SequenceAdapter {
    pub fn new(model: Option<LoadedModel>, scaler: Arc<FittedScaler>) -> Self {
        let inner = model.map(|model| SequenceModel {
            name: model.name,
            session: RwLock::new(model.session),
            input_name: model.input_name,
            output_name: model.output_name,
            scaler,
        });
        Self { inner }
    }

    pub fn is_available(&self) -> bool {
        self.inner.is_some()
    }

    pub fn score(&self, series: &[f64]) -> Result<f64> {
        match self.trained_score(series) {
            Ok(score) => Ok(score),
            Err(EngineError::DetectorUnavailable(name)) => {
                debug!(detector = name, "Detector unavailable, substituting neutral fallback");
                Ok(SEQUENCE_FALLBACK_SCORE)
            }
            Err(e) => Err(e),
        }
    }

    fn trained_score(&self, series: &[f64]) -> Result<f64> {
        let model = self
            .inner
            .as_ref()
            .ok_or(EngineError::DetectorUnavailable("lstm"))?;

        let mut window = vec![0.0_f64; SEQUENCE_LENGTH];
        let tail = if series.len() > SEQUENCE_LENGTH {
            &series[series.len() - SEQUENCE_LENGTH..]
        } else {
            series
        };
        window[SEQUENCE_LENGTH - tail.len()..].copy_from_slice(tail);

        let scaled = model.scaler.transform(&window);
        let shape = vec![1_i64, SEQUENCE_LENGTH as i64, 1];
        run_session(
            &model.session,
            &model.name,
            &model.input_name,
            shape,
            scaled,
            |outputs| extract_probability(outputs, &model.output_name, &model.name),
        )
    }
}

/// Production detector suite backed by ONNX sessions and the fitted scalers.
pub struct OnnxDetectorSuite {
    autoencoder: HeuristicAdapter,
    lstm: SequenceAdapter,
    xgboost: ClassifierAdapter,
    randomforest: ClassifierAdapter,
    isolationforest: OutlierAdapter,
}

impl OnnxDetectorSuite {
    /// Load every detector artifact. Classifier and scaler failures abort;
    /// sequence-model failure switches that adapter into fallback mode.
    pub fn load(loader: &ArtifactLoader) -> Result<Self> {
        let feature_scaler = Arc::new(loader.load_scaler("standard_scaler")?);
        let sequence_scaler = Arc::new(loader.load_scaler("lstm_scaler")?);

        let xgboost =
            ClassifierAdapter::new(loader.load_classifier("xgboost")?, feature_scaler.clone());
        let randomforest = ClassifierAdapter::new(
            loader.load_classifier("randomforest")?,
            feature_scaler.clone(),
        );
        let isolationforest = OutlierAdapter::new(
            loader.load_classifier("isolationforest")?,
            feature_scaler.clone(),
        );
        let lstm = SequenceAdapter::new(loader.load_sequence_model("lstm"), sequence_scaler);

        Ok(Self {
            autoencoder: HeuristicAdapter::new(),
            lstm,
            xgboost,
            randomforest,
            isolationforest,
        })
    }
}

impl DetectorSuite for OnnxDetectorSuite {
    fn score(&self, series: &[f64], features: &FeatureSet) -> Result<ModelScores> {
        Ok(ModelScores {
            autoencoder: self.autoencoder.score(features),
            lstm: self.lstm.score(series)?,
            xgboost: self.xgboost.score(features)?,
            randomforest: self.randomforest.score(features)?,
            isolationforest: self.isolationforest.score(features)?,
        })
    }

    fn sequence_available(&self) -> bool {
        self.lstm.is_available()
    }
}

/// Run a session on one input tensor and extract a scalar while the write
/// guard is held.
fn run_session<T>(
    session: &RwLock<Session>,
    model_name: &str,
    input_name: &str,
    shape: Vec<i64>,
    data: Vec<f32>,
    extract: impl FnOnce(&ort::session::SessionOutputs) -> Result<T>,
) -> Result<T> {
    let mut session = session
        .write()
        .map_err(|_| EngineError::inference(model_name, "session lock poisoned".to_string()))?;

    let input_tensor = Tensor::from_array((shape, data))
        .map_err(|e| EngineError::inference(model_name, e))?;

    let outputs = session
        .run(ort::inputs![input_name => input_tensor])
        .map_err(|e| EngineError::inference(model_name, e))?;

    extract(&outputs)
}

/// Extract the positive-class probability from model output.
/// Handles both tensor outputs and seq(map) outputs (sklearn ZipMap
/// exports).
fn extract_probability(
    outputs: &ort::session::SessionOutputs,
    output_name: &str,
    model_name: &str,
) -> Result<f64> {
    if let Some(output) = outputs.get(output_name) {
        let dtype = output.dtype();

        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            let prob = positive_class_probability(&dims, data);
            debug!(model = %model_name, prob, "Extracted probability from tensor");
            return Ok(prob);
        }

        if DynSequenceValueType::can_downcast(&dtype) {
            if let Ok(prob) = extract_from_sequence_map(output, model_name) {
                return Ok(prob);
            }
        }
    }

    // Fallback: scan every output, skipping the class-label tensor.
    for (name, output) in outputs.iter() {
        if name.contains("label") {
            continue;
        }

        let dtype = output.dtype();

        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            let prob = positive_class_probability(&dims, data);
            debug!(model = %model_name, output = %name, prob, "Extracted probability from tensor (fallback)");
            return Ok(prob);
        }

        if DynSequenceValueType::can_downcast(&dtype) {
            if let Ok(prob) = extract_from_sequence_map(&output, model_name) {
                return Ok(prob);
            }
        }
    }

    warn!(model = %model_name, "Could not extract probability, using neutral 0.5");
    Ok(0.5)
}

/// Extract the positive-class probability from seq(map(int64, float))
/// output, the format sklearn classifier exports use.
fn extract_from_sequence_map(
    output: &ort::value::DynValue,
    model_name: &str,
) -> Result<f64> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| EngineError::inference(model_name, e))?;

    let maps = sequence
        .try_extract_sequence::<DynMapValueType>(&allocator)
        .map_err(|e| EngineError::inference(model_name, e))?;

    let map_value = maps.first().ok_or_else(|| {
        EngineError::inference(model_name, "empty probability sequence".to_string())
    })?;

    let kv_pairs = map_value
        .try_extract_key_values::<i64, f32>()
        .map_err(|e| EngineError::inference(model_name, e))?;

    for (class_id, prob) in &kv_pairs {
        if *class_id == 1 {
            debug!(model = %model_name, prob = *prob, "Extracted probability from seq(map)");
            return Ok(*prob as f64);
        }
    }

    // Binary classifier with only class 0 present.
    for (class_id, prob) in &kv_pairs {
        if *class_id == 0 {
            return Ok(1.0 - *prob as f64);
        }
    }

    Err(EngineError::inference(
        model_name,
        "no class probability found in map".to_string(),
    ))
}

/// Positive-class probability from tensor data: probability of class index
/// 1 when two or more classes are present, else the sole probability.
fn positive_class_probability(dims: &[i64], data: &[f32]) -> f64 {
    let num_classes = match dims.len() {
        2 => dims[1] as usize,
        1 => dims[0] as usize,
        _ => 0,
    };

    if num_classes >= 2 && data.len() >= 2 {
        return data[1] as f64;
    }
    if num_classes == 1 && !data.is_empty() {
        return data[0] as f64;
    }

    data.last().map(|&v| v as f64).unwrap_or(0.5)
}

/// Raw anomaly score for the outlier detector: the first value of the
/// scores tensor.
fn extract_raw_score(
    outputs: &ort::session::SessionOutputs,
    output_name: &str,
    model_name: &str,
) -> Result<f64> {
    if let Some(output) = outputs.get(output_name) {
        if let Ok((_, data)) = output.try_extract_tensor::<f32>() {
            if let Some(value) = data.first() {
                return Ok(*value as f64);
            }
        }
    }

    for (name, output) in outputs.iter() {
        if name.contains("label") {
            continue;
        }
        if let Ok((_, data)) = output.try_extract_tensor::<f32>() {
            if let Some(value) = data.first() {
                return Ok(*value as f64);
            }
        }
    }

    Err(EngineError::inference(
        model_name,
        "no score tensor in outlier model output".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureExtractor;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_heuristic_score_all_zero_series() {
        let features = FeatureExtractor::new().extract(&vec![0.0; 24]);
        let score = HeuristicAdapter::new().score(&features);
        // zero_ratio contributes 0.3; the 0.1 fallback low-consumption
        // threshold makes every reading low, contributing another 0.1.
        assert!((score - 0.4).abs() < EPS);
    }

    #[test]
    fn test_heuristic_score_all_negative_series() {
        let features = FeatureExtractor::new().extract(&vec![-1.0; 24]);
        let score = HeuristicAdapter::new().score(&features);
        // negative_ratio 1.0 and low_consumption_ratio 1.0; cv is 0 for a
        // constant series.
        assert!((score - 0.5).abs() < EPS);
    }

    #[test]
    fn test_heuristic_score_is_clamped() {
        let mut features = FeatureExtractor::new().extract(&vec![1.0; 24]);
        features.zero_ratio = 5.0;
        features.negative_ratio = 5.0;
        let score = HeuristicAdapter::new().score(&features);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_heuristic_score_clean_profile() {
        let series: Vec<f64> = (0..48).map(|i| 2.0 + 0.3 * ((i % 24) as f64).sin()).collect();
        let features = FeatureExtractor::new().extract(&series);
        let score = HeuristicAdapter::new().score(&features);
        assert!(score < 0.1);
    }

    #[test]
    fn test_sequence_adapter_fallback_without_artifact() {
        let scaler = Arc::new(FittedScaler {
            mean: vec![0.0],
            scale: vec![1.0],
        });
        let adapter = SequenceAdapter::new(None, scaler);

        assert!(!adapter.is_available());
        let score = adapter.score(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(score, SEQUENCE_FALLBACK_SCORE);
    }

    #[test]
    fn test_positive_class_probability_shapes() {
        // [batch, num_classes] output with two classes.
        assert!((positive_class_probability(&[1, 2], &[0.3, 0.7]) - 0.7).abs() < 1e-6);
        // Single-probability output.
        assert!((positive_class_probability(&[1, 1], &[0.9]) - 0.9).abs() < 1e-6);
        // Flat two-class output.
        assert!((positive_class_probability(&[2], &[0.4, 0.6]) - 0.6).abs() < 1e-6);
    }
}
