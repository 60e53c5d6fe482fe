//! Weighted ensemble combination of detector scores.

use crate::error::{EngineError, Result};
use crate::types::prediction::ModelScores;
use serde::Deserialize;

/// Operating point for the binary theft decision, tuned to balance recall
/// against false positives. Configurable, but the default value is a
/// compatibility contract with the trained ensemble.
pub const DEFAULT_DECISION_THRESHOLD: f64 = 0.435;

/// Per-detector ensemble weights. Must sum to exactly 1.0 so the combined
/// score stays in [0, 1].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnsembleWeights {
    pub autoencoder: f64,
    pub lstm: f64,
    pub xgboost: f64,
    pub randomforest: f64,
    pub isolationforest: f64,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            autoencoder: 0.25,
            lstm: 0.25,
            xgboost: 0.20,
            randomforest: 0.15,
            isolationforest: 0.15,
        }
    }
}

impl EnsembleWeights {
    pub fn sum(&self) -> f64 {
        self.autoencoder + self.lstm + self.xgboost + self.randomforest + self.isolationforest
    }

    pub fn validate(&self) -> Result<()> {
        let sum = self.sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(EngineError::validation(format!(
                "ensemble weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Combines the five detector scores into one ensemble score and a binary
/// decision.
pub struct EnsembleCombiner {
    weights: EnsembleWeights,
    threshold: f64,
}

impl EnsembleCombiner {
    pub fn new(weights: EnsembleWeights, threshold: f64) -> Result<Self> {
        weights.validate()?;
        Ok(Self { weights, threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Weighted fusion of the five detector scores, clamped to [0, 1].
    pub fn combine(&self, scores: &ModelScores) -> f64 {
        let combined = scores.autoencoder * self.weights.autoencoder
            + scores.lstm * self.weights.lstm
            + scores.xgboost * self.weights.xgboost
            + scores.randomforest * self.weights.randomforest
            + scores.isolationforest * self.weights.isolationforest;
        combined.clamp(0.0, 1.0)
    }

    /// Binary theft decision: 1 iff the score strictly exceeds the
    /// operating point.
    pub fn decide(&self, ensemble_score: f64) -> u8 {
        u8::from(ensemble_score > self.threshold)
    }
}

impl Default for EnsembleCombiner {
    fn default() -> Self {
        Self {
            weights: EnsembleWeights::default(),
            threshold: DEFAULT_DECISION_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_default_weights_sum_to_one() {
        let weights = EnsembleWeights::default();
        assert!((weights.sum() - 1.0).abs() < EPS);
        assert!(weights.validate().is_ok());
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let mut weights = EnsembleWeights::default();
        weights.xgboost = 0.5;
        assert!(EnsembleCombiner::new(weights, DEFAULT_DECISION_THRESHOLD).is_err());
    }

    #[test]
    fn test_combine_weighted_sum() {
        let combiner = EnsembleCombiner::default();
        let scores = ModelScores {
            autoencoder: 0.8,
            lstm: 0.8,
            xgboost: 0.7,
            randomforest: 0.6,
            isolationforest: 0.5,
        };

        // 0.8*0.25 + 0.8*0.25 + 0.7*0.20 + 0.6*0.15 + 0.5*0.15 = 0.705
        assert!((combiner.combine(&scores) - 0.705).abs() < 1e-6);
    }

    #[test]
    fn test_combine_stays_in_unit_interval() {
        let combiner = EnsembleCombiner::default();

        let zeros = ModelScores::default();
        assert_eq!(combiner.combine(&zeros), 0.0);

        let ones = ModelScores {
            autoencoder: 1.0,
            lstm: 1.0,
            xgboost: 1.0,
            randomforest: 1.0,
            isolationforest: 1.0,
        };
        assert!((combiner.combine(&ones) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_decision_threshold_is_strict() {
        let combiner = EnsembleCombiner::default();
        assert_eq!(combiner.decide(DEFAULT_DECISION_THRESHOLD), 0);
        assert_eq!(combiner.decide(DEFAULT_DECISION_THRESHOLD + 1e-6), 1);
        assert_eq!(combiner.decide(0.0), 0);
        assert_eq!(combiner.decide(1.0), 1);
    }
}
