//! Prediction result data structures.

use crate::rules::DetectedRule;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordinal risk bucket derived from the ensemble score for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskCategory {
    Minimal,
    Low,
    Medium,
    High,
    /// Assigned to degraded results when a row could not be scored.
    Unknown,
}

/// Configurable risk band boundaries. Evaluated top-down with strict `>`
/// comparisons, so a score exactly on a boundary falls into the band below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            high: 0.7,
            medium: 0.4,
            low: 0.2,
        }
    }
}

impl RiskCategory {
    /// Categorize an ensemble score.
    pub fn from_score(score: f64, thresholds: &RiskThresholds) -> Self {
        if score > thresholds.high {
            RiskCategory::High
        } else if score > thresholds.medium {
            RiskCategory::Medium
        } else if score > thresholds.low {
            RiskCategory::Low
        } else {
            RiskCategory::Minimal
        }
    }
}

/// Per-detector scores, each in [0, 1]. Field names denote detector roles,
/// not implementations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelScores {
    pub autoencoder: f64,
    pub lstm: f64,
    pub xgboost: f64,
    pub randomforest: f64,
    pub isolationforest: f64,
}

impl ModelScores {
    pub const NAMES: [&'static str; 5] =
        ["autoencoder", "lstm", "xgboost", "randomforest", "isolationforest"];

    pub fn as_array(&self) -> [f64; 5] {
        [
            self.autoencoder,
            self.lstm,
            self.xgboost,
            self.randomforest,
            self.isolationforest,
        ]
    }

    /// Standard deviation across the five detectors, used as a
    /// disagreement signal in metrics.
    pub fn std_dev(&self) -> f64 {
        let scores = self.as_array();
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let variance =
            scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
        variance.sqrt()
    }
}

/// Scoring outcome for one consumer. Built once per request and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub consumer_id: String,

    /// Weighted fusion of the five detector scores, in [0, 1].
    pub ensemble_score: f64,

    pub risk_category: RiskCategory,

    /// Binary theft decision at the configured operating point.
    pub ensemble_prediction: u8,

    pub scores: ModelScores,

    pub detected_rules: Vec<DetectedRule>,
    pub rule_count: usize,
    pub rule_score: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub true_theft_label: Option<i64>,

    /// Present only on degraded results produced when scoring a row failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictionResult {
    /// Placeholder result for a row that failed to score. The batch carries
    /// on; the row reports why it could not be scored.
    pub fn degraded(consumer_id: impl Into<String>, error: String) -> Self {
        Self {
            consumer_id: consumer_id.into(),
            ensemble_score: 0.0,
            risk_category: RiskCategory::Unknown,
            ensemble_prediction: 0,
            scores: ModelScores::default(),
            detected_rules: Vec::new(),
            rule_count: 0,
            rule_score: 0.0,
            true_theft_label: None,
            error: Some(error),
        }
    }

    pub fn with_label(mut self, label: Option<i64>) -> Self {
        self.true_theft_label = label;
        self
    }
}

/// Mean scores across a batch, one slot per detector plus the ensemble.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AverageScores {
    pub ensemble: f64,
    pub autoencoder: f64,
    pub lstm: f64,
    pub xgboost: f64,
    pub randomforest: f64,
    pub isolationforest: f64,
}

/// Aggregate statistics derived from a batch of prediction results.
/// Purely derived; recomputed per batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub theft_detected: usize,
    pub normal_detected: usize,
    pub theft_percentage: f64,
    pub high_risk: usize,
    pub medium_risk: usize,
    pub low_risk: usize,
    pub minimal_risk: usize,
    pub unknown_risk: usize,
    pub average_scores: AverageScores,
}

impl BatchSummary {
    pub fn from_results(results: &[PredictionResult]) -> Self {
        let total = results.len();
        if total == 0 {
            return Self::default();
        }

        let theft_detected = results.iter().filter(|r| r.ensemble_prediction == 1).count();
        let count_risk = |category: RiskCategory| {
            results.iter().filter(|r| r.risk_category == category).count()
        };

        let nf = total as f64;
        let mut averages = AverageScores::default();
        for result in results {
            averages.ensemble += result.ensemble_score;
            averages.autoencoder += result.scores.autoencoder;
            averages.lstm += result.scores.lstm;
            averages.xgboost += result.scores.xgboost;
            averages.randomforest += result.scores.randomforest;
            averages.isolationforest += result.scores.isolationforest;
        }
        averages.ensemble /= nf;
        averages.autoencoder /= nf;
        averages.lstm /= nf;
        averages.xgboost /= nf;
        averages.randomforest /= nf;
        averages.isolationforest /= nf;

        Self {
            total,
            theft_detected,
            normal_detected: total - theft_detected,
            theft_percentage: theft_detected as f64 / nf * 100.0,
            high_risk: count_risk(RiskCategory::High),
            medium_risk: count_risk(RiskCategory::Medium),
            low_risk: count_risk(RiskCategory::Low),
            minimal_risk: count_risk(RiskCategory::Minimal),
            unknown_risk: count_risk(RiskCategory::Unknown),
            average_scores: averages,
        }
    }
}

/// Full batch response: results, summary and the operating point used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub report_id: String,
    pub predictions: Vec<PredictionResult>,
    pub summary: BatchSummary,
    pub threshold_used: f64,
    pub timestamp: DateTime<Utc>,
}

impl BatchReport {
    pub fn new(
        request_id: Option<String>,
        predictions: Vec<PredictionResult>,
        summary: BatchSummary,
        threshold_used: f64,
    ) -> Self {
        Self {
            report_id: request_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            predictions,
            summary,
            threshold_used,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_boundaries_are_strict() {
        let thresholds = RiskThresholds::default();

        assert_eq!(RiskCategory::from_score(0.7, &thresholds), RiskCategory::Medium);
        assert_eq!(RiskCategory::from_score(0.70001, &thresholds), RiskCategory::High);
        assert_eq!(RiskCategory::from_score(0.4, &thresholds), RiskCategory::Low);
        assert_eq!(RiskCategory::from_score(0.2, &thresholds), RiskCategory::Minimal);
        assert_eq!(RiskCategory::from_score(0.0, &thresholds), RiskCategory::Minimal);
        assert_eq!(RiskCategory::from_score(1.0, &thresholds), RiskCategory::High);
    }

    #[test]
    fn test_degraded_result_shape() {
        let result = PredictionResult::degraded("C009", "inference failed".to_string());
        assert_eq!(result.risk_category, RiskCategory::Unknown);
        assert_eq!(result.ensemble_prediction, 0);
        assert_eq!(result.ensemble_score, 0.0);
        assert_eq!(result.scores, ModelScores::default());
        assert!(result.error.is_some());
    }

    #[test]
    fn test_summary_counts_and_averages() {
        let mut flagged = PredictionResult::degraded("a", String::new());
        flagged.error = None;
        flagged.ensemble_prediction = 1;
        flagged.ensemble_score = 0.8;
        flagged.risk_category = RiskCategory::High;
        flagged.scores.xgboost = 0.6;

        let normal = PredictionResult::degraded("b", String::new());
        let results = vec![flagged, normal];

        let summary = BatchSummary::from_results(&results);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.theft_detected, 1);
        assert_eq!(summary.normal_detected, 1);
        assert!((summary.theft_percentage - 50.0).abs() < 1e-9);
        assert_eq!(summary.high_risk, 1);
        assert_eq!(summary.unknown_risk, 1);
        assert!((summary.average_scores.ensemble - 0.4).abs() < 1e-9);
        assert!((summary.average_scores.xgboost - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_empty_batch_summary() {
        let summary = BatchSummary::from_results(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.theft_percentage, 0.0);
    }

    #[test]
    fn test_result_serialization() {
        let result = PredictionResult::degraded("C777", "boom".to_string());
        let json = serde_json::to_string(&result).unwrap();
        let deserialized: PredictionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.consumer_id, "C777");
        assert_eq!(deserialized.risk_category, RiskCategory::Unknown);
    }
}
