//! Consumer and batch scoring orchestration.
//!
//! Composes extractor, detector suite, ensemble combiner, risk classifier
//! and rule engine. Scoring a consumer is a pure function of its inputs
//! and the artifacts loaded at startup; there is no cross-call state.

use crate::error::Result;
use crate::features::FeatureExtractor;
use crate::models::adapters::DetectorSuite;
use crate::models::ensemble::EnsembleCombiner;
use crate::rules::RuleEngine;
use crate::types::prediction::{BatchSummary, PredictionResult, RiskCategory, RiskThresholds};
use crate::types::series::ConsumptionRecord;
use tracing::{debug, error};

/// Scores consumers with the five-detector ensemble plus the rule engine.
pub struct TheftScorer<S> {
    extractor: FeatureExtractor,
    rules: RuleEngine,
    suite: S,
    combiner: EnsembleCombiner,
    risk_thresholds: RiskThresholds,
}

impl<S: DetectorSuite> TheftScorer<S> {
    pub fn new(suite: S, combiner: EnsembleCombiner, risk_thresholds: RiskThresholds) -> Self {
        Self {
            extractor: FeatureExtractor::new(),
            rules: RuleEngine::new(),
            suite,
            combiner,
            risk_thresholds,
        }
    }

    /// Decision threshold used for the binary prediction.
    pub fn threshold(&self) -> f64 {
        self.combiner.threshold()
    }

    /// Whether the sequence detector runs with a real artifact or in
    /// fallback mode.
    pub fn sequence_available(&self) -> bool {
        self.suite.sequence_available()
    }

    /// Score a single consumer's consumption history.
    pub fn score_consumer(&self, consumer_id: &str, series: &[f64]) -> Result<PredictionResult> {
        let features = self.extractor.extract(series);
        let scores = self.suite.score(series, &features)?;

        let ensemble_score = self.combiner.combine(&scores);
        let risk_category = RiskCategory::from_score(ensemble_score, &self.risk_thresholds);
        let ensemble_prediction = self.combiner.decide(ensemble_score);

        let detection = self.rules.evaluate(series, &features);

        debug!(
            consumer_id,
            ensemble_score,
            risk_category = ?risk_category,
            rule_count = detection.rule_count,
            "Consumer scored"
        );

        Ok(PredictionResult {
            consumer_id: consumer_id.to_string(),
            ensemble_score,
            risk_category,
            ensemble_prediction,
            scores,
            detected_rules: detection.detected_rules,
            rule_count: detection.rule_count,
            rule_score: detection.rule_score,
            true_theft_label: None,
            error: None,
        })
    }

    /// Score a batch of consumers with per-row isolation: a failure on one
    /// row yields a degraded result and the batch continues.
    pub fn score_batch(
        &self,
        records: &[ConsumptionRecord],
    ) -> (Vec<PredictionResult>, BatchSummary) {
        let mut results = Vec::with_capacity(records.len());

        for record in records {
            let result = match self.score_consumer(&record.consumer_id, &record.readings) {
                Ok(result) => result.with_label(record.true_theft_label),
                Err(e) => {
                    error!(
                        consumer_id = %record.consumer_id,
                        error = %e,
                        "Scoring failed, emitting degraded result"
                    );
                    PredictionResult::degraded(&record.consumer_id, e.to_string())
                        .with_label(record.true_theft_label)
                }
            };
            results.push(result);
        }

        let summary = BatchSummary::from_results(&results);
        (results, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::features::FeatureSet;
    use crate::models::adapters::HeuristicAdapter;
    use crate::types::prediction::ModelScores;

    /// Suite returning the same scores for every consumer.
    struct FixedSuite(ModelScores);

    impl DetectorSuite for FixedSuite {
        fn score(&self, _series: &[f64], _features: &FeatureSet) -> Result<ModelScores> {
            Ok(self.0)
        }
    }

    /// Suite that fails on empty series, standing in for a model runtime
    /// error on one row.
    struct FlakySuite;

    impl DetectorSuite for FlakySuite {
        fn score(&self, series: &[f64], features: &FeatureSet) -> Result<ModelScores> {
            if series.is_empty() {
                return Err(EngineError::inference(
                    "xgboost",
                    "empty input tensor".to_string(),
                ));
            }
            Ok(ModelScores {
                autoencoder: HeuristicAdapter::new().score(features),
                lstm: 0.5,
                xgboost: 0.6,
                randomforest: 0.6,
                isolationforest: 0.4,
            })
        }
    }

    fn scorer<S: DetectorSuite>(suite: S) -> TheftScorer<S> {
        TheftScorer::new(suite, EnsembleCombiner::default(), RiskThresholds::default())
    }

    fn uniform_scores(value: f64) -> ModelScores {
        ModelScores {
            autoencoder: value,
            lstm: value,
            xgboost: value,
            randomforest: value,
            isolationforest: value,
        }
    }

    #[test]
    fn test_score_consumer_composes_all_stages() {
        let scorer = scorer(FixedSuite(uniform_scores(0.8)));
        let result = scorer.score_consumer("C001", &vec![0.0; 24]).unwrap();

        assert_eq!(result.consumer_id, "C001");
        // Uniform scores with weights summing to 1 reproduce the input.
        assert!((result.ensemble_score - 0.8).abs() < 1e-9);
        assert_eq!(result.risk_category, RiskCategory::High);
        assert_eq!(result.ensemble_prediction, 1);
        // The all-zero series trips the deterministic rules regardless of
        // the model scores.
        assert!(result.rule_count >= 2);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_risk_boundary_is_strict_through_the_scorer() {
        let scorer = scorer(FixedSuite(uniform_scores(0.7)));
        let result = scorer.score_consumer("C002", &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(result.risk_category, RiskCategory::Medium);
    }

    #[test]
    fn test_prediction_at_operating_point() {
        let at_threshold = scorer(FixedSuite(uniform_scores(0.435)));
        let result = at_threshold.score_consumer("C003", &[1.0; 24]).unwrap();
        assert_eq!(result.ensemble_prediction, 0);

        let above_threshold = scorer(FixedSuite(uniform_scores(0.44)));
        let result = above_threshold.score_consumer("C003", &[1.0; 24]).unwrap();
        assert_eq!(result.ensemble_prediction, 1);
    }

    #[test]
    fn test_batch_isolates_row_failures() {
        let scorer = scorer(FlakySuite);
        let records = vec![
            ConsumptionRecord::new("C001", vec![1.0; 24]),
            ConsumptionRecord::new("C002", Vec::new()),
            ConsumptionRecord::new("C003", vec![2.0; 24]),
        ];

        let (results, summary) = scorer.score_batch(&records);

        assert_eq!(results.len(), 3);
        assert!(results[0].error.is_none());
        assert!(results[2].error.is_none());

        let degraded = &results[1];
        assert_eq!(degraded.consumer_id, "C002");
        assert_eq!(degraded.risk_category, RiskCategory::Unknown);
        assert_eq!(degraded.ensemble_prediction, 0);
        assert_eq!(degraded.ensemble_score, 0.0);
        assert!(degraded.error.as_deref().unwrap().contains("xgboost"));

        assert_eq!(summary.total, 3);
        assert_eq!(summary.unknown_risk, 1);
    }

    #[test]
    fn test_batch_passes_labels_through() {
        let scorer = scorer(FixedSuite(uniform_scores(0.1)));
        let mut labeled = ConsumptionRecord::new("C001", vec![1.0; 24]);
        labeled.true_theft_label = Some(1);

        let (results, _) = scorer.score_batch(&[labeled]);
        assert_eq!(results[0].true_theft_label, Some(1));
    }

    #[test]
    fn test_empty_batch_summary() {
        let scorer = scorer(FixedSuite(uniform_scores(0.5)));
        let (results, summary) = scorer.score_batch(&[]);
        assert!(results.is_empty());
        assert_eq!(summary.total, 0);
        assert_eq!(summary.theft_percentage, 0.0);
    }
}
