//! Rule-based theft detection.
//!
//! Eight deterministic, independently evaluated rules over the extracted
//! features and the raw series. Each rule fires at most once, at its
//! highest matching tier.

use crate::features::FeatureSet;
use serde::{Deserialize, Serialize};

/// Number of rules; the rule score is normalized against it.
const RULE_COUNT: f64 = 8.0;

/// Severity tier of a detected rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Contribution of this severity to the rule score.
    pub fn weight(self) -> f64 {
        match self {
            Severity::Critical => 1.0,
            Severity::High => 0.7,
            Severity::Medium => 0.4,
            Severity::Low => 0.2,
        }
    }
}

/// A single triggered rule with the value that triggered it interpolated
/// into the description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedRule {
    pub rule_id: u8,
    pub rule_name: String,
    pub description: String,
    pub severity: Severity,
}

impl DetectedRule {
    fn new(rule_id: u8, rule_name: &str, description: String, severity: Severity) -> Self {
        Self {
            rule_id,
            rule_name: rule_name.to_string(),
            description,
            severity,
        }
    }
}

/// Outcome of evaluating all rules against one consumer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleDetection {
    pub detected_rules: Vec<DetectedRule>,
    pub rule_count: usize,
    pub rule_score: f64,
    pub has_theft_indicators: bool,
}

/// Deterministic rule engine. Stateless; needs no external artifacts, so it
/// cannot fail to initialize.
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate all eight rules and compute the severity-weighted score.
    pub fn evaluate(&self, series: &[f64], features: &FeatureSet) -> RuleDetection {
        let mut rules = Vec::new();

        // Rule 1: zero readings (possible meter bypass).
        let zero_ratio = features.zero_ratio;
        if zero_ratio > 0.3 {
            rules.push(DetectedRule::new(
                1,
                "Excessive Zero Readings",
                format!("{:.1}% of readings are zero (possible bypass)", zero_ratio * 100.0),
                Severity::Critical,
            ));
        } else if zero_ratio > 0.1 {
            rules.push(DetectedRule::new(
                1,
                "Suspicious Zero Readings",
                format!("{:.1}% of readings are zero", zero_ratio * 100.0),
                Severity::High,
            ));
        }

        // Rule 2: negative readings are always critical.
        if features.negative_count > 0.0 {
            rules.push(DetectedRule::new(
                2,
                "Negative Consumption",
                format!(
                    "{} negative readings detected (meter tampering)",
                    features.negative_count as u64
                ),
                Severity::Critical,
            ));
        }

        // Rule 3: abnormally low average consumption.
        let mean = features.mean;
        if mean < 0.15 {
            rules.push(DetectedRule::new(
                3,
                "Abnormally Low Consumption",
                format!("Average consumption {:.3} kWh is suspiciously low", mean),
                Severity::High,
            ));
        } else if mean < 0.5 {
            rules.push(DetectedRule::new(
                3,
                "Low Consumption Pattern",
                format!("Average consumption {:.3} kWh is below normal", mean),
                Severity::Medium,
            ));
        }

        // Rule 4: artificially constant load. Only meaningful when the meter
        // registers consumption at all.
        let std = features.std;
        if mean > 0.0 {
            if std < 0.1 {
                rules.push(DetectedRule::new(
                    4,
                    "Constant Load Pattern",
                    format!("Std dev {:.3} indicates artificial constant consumption", std),
                    Severity::High,
                ));
            } else if std < 0.3 {
                rules.push(DetectedRule::new(
                    4,
                    "Low Variability Pattern",
                    format!("Std dev {:.3} shows unusually stable consumption", std),
                    Severity::Medium,
                ));
            }
        }

        // Rule 5: erratic usage.
        let cv = features.cv;
        if cv > 2.0 {
            rules.push(DetectedRule::new(
                5,
                "Extremely Erratic Pattern",
                format!("Coefficient of variation {:.2} shows highly irregular usage", cv),
                Severity::High,
            ));
        } else if cv > 1.2 {
            rules.push(DetectedRule::new(
                5,
                "Erratic Consumption Pattern",
                format!("Coefficient of variation {:.2} shows irregular usage", cv),
                Severity::Medium,
            ));
        }

        // Rule 6: decreasing consumption trend.
        let slope = features.trend_slope;
        if slope < -0.05 {
            rules.push(DetectedRule::new(
                6,
                "Sharp Consumption Drop",
                format!("Trend slope {:.4} indicates rapid decreasing pattern", slope),
                Severity::High,
            ));
        } else if slope < -0.02 {
            rules.push(DetectedRule::new(
                6,
                "Gradual Consumption Drop",
                format!("Trend slope {:.4} indicates decreasing pattern", slope),
                Severity::Medium,
            ));
        }

        // Rule 7: missing daily peak pattern over the most recent day.
        if series.len() >= 24 && mean > 0.0 {
            let last_day = &series[series.len() - 24..];
            let day_max = last_day.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let day_min = last_day.iter().cloned().fold(f64::INFINITY, f64::min);
            let day_range = day_max - day_min;
            if day_range < 0.2 {
                rules.push(DetectedRule::new(
                    7,
                    "No Peak Hour Pattern",
                    format!("Daily range {:.3} kWh shows a flat consumption profile", day_range),
                    Severity::Medium,
                ));
            } else if day_range < 0.5 {
                rules.push(DetectedRule::new(
                    7,
                    "Weak Peak Pattern",
                    format!("Daily range {:.3} kWh shows limited consumption variation", day_range),
                    Severity::Low,
                ));
            }
        }

        // Rule 8: high share of readings far below the consumer's own mean.
        let low_ratio = features.low_consumption_ratio;
        if low_ratio > 0.5 {
            rules.push(DetectedRule::new(
                8,
                "Excessive Low Usage Periods",
                format!("{:.1}% of readings are suspiciously low", low_ratio * 100.0),
                Severity::High,
            ));
        } else if low_ratio > 0.3 {
            rules.push(DetectedRule::new(
                8,
                "High Low Usage Periods",
                format!("{:.1}% of readings are below normal", low_ratio * 100.0),
                Severity::Medium,
            ));
        }

        let rule_score = (rules.iter().map(|r| r.severity.weight()).sum::<f64>() / RULE_COUNT)
            .min(1.0);

        RuleDetection {
            rule_count: rules.len(),
            has_theft_indicators: !rules.is_empty(),
            rule_score,
            detected_rules: rules,
        }
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureExtractor;

    const EPS: f64 = 1e-9;

    fn evaluate(series: &[f64]) -> RuleDetection {
        let features = FeatureExtractor::new().extract(series);
        RuleEngine::new().evaluate(series, &features)
    }

    fn rule_severity(detection: &RuleDetection, rule_id: u8) -> Option<Severity> {
        detection
            .detected_rules
            .iter()
            .find(|r| r.rule_id == rule_id)
            .map(|r| r.severity)
    }

    #[test]
    fn test_all_zero_series_fires_bypass_rules() {
        let detection = evaluate(&vec![0.0; 24]);

        assert_eq!(rule_severity(&detection, 1), Some(Severity::Critical));
        assert_eq!(rule_severity(&detection, 3), Some(Severity::High));
        // Every reading counts as low consumption against the 0.1 fallback
        // threshold.
        assert_eq!(rule_severity(&detection, 8), Some(Severity::High));
        // Guarded on a positive mean.
        assert_eq!(rule_severity(&detection, 4), None);
        assert_eq!(rule_severity(&detection, 7), None);

        assert!(detection.has_theft_indicators);
        assert!((detection.rule_score - 2.4 / 8.0).abs() < EPS);
    }

    #[test]
    fn test_any_negative_reading_is_critical() {
        let mut series = vec![2.0; 48];
        series[10] = -0.4;
        let detection = evaluate(&series);
        assert_eq!(rule_severity(&detection, 2), Some(Severity::Critical));
    }

    #[test]
    fn test_alternating_series() {
        // 72 readings alternating 1.0 and 0.0: zero_ratio 0.5, mean 0.5.
        let series: Vec<f64> = (0..72).map(|i| if i % 2 == 0 { 1.0 } else { 0.0 }).collect();
        let detection = evaluate(&series);

        assert_eq!(rule_severity(&detection, 1), Some(Severity::Critical));
        // Mean sits exactly on the 0.5 boundary, outside the rule.
        assert_eq!(rule_severity(&detection, 3), None);
        // Half the readings fall below the low-consumption threshold.
        assert_eq!(rule_severity(&detection, 8), Some(Severity::Medium));
        assert!((detection.rule_score - (1.0 + 0.4) / 8.0).abs() < EPS);
    }

    #[test]
    fn test_constant_load_pattern() {
        let series = vec![1.5; 48];
        let detection = evaluate(&series);
        assert_eq!(rule_severity(&detection, 4), Some(Severity::High));
        assert_eq!(rule_severity(&detection, 7), Some(Severity::Medium));
    }

    #[test]
    fn test_low_consumption_tiers() {
        let detection = evaluate(&vec![0.1; 24]);
        assert_eq!(rule_severity(&detection, 3), Some(Severity::High));

        let detection = evaluate(&vec![0.3; 24]);
        assert_eq!(rule_severity(&detection, 3), Some(Severity::Medium));

        let detection = evaluate(&vec![0.5; 24]);
        assert_eq!(rule_severity(&detection, 3), None);
    }

    #[test]
    fn test_no_rules_scores_zero() {
        // Healthy profile: positive mean, daily variation, no zeros.
        let series: Vec<f64> = (0..48)
            .map(|i| 2.0 + 1.5 * ((i % 24) as f64 / 24.0 * std::f64::consts::TAU).sin())
            .collect();
        let detection = evaluate(&series);
        assert_eq!(detection.rule_count, 0);
        assert_eq!(detection.rule_score, 0.0);
        assert!(!detection.has_theft_indicators);
    }

    #[test]
    fn test_rule_score_monotonic_and_capped() {
        let quiet = evaluate(&vec![0.3; 24]);
        let mut worse_series = vec![0.0; 20];
        worse_series.extend_from_slice(&[-0.2, -0.2, 0.0, 0.0]);
        let worse = evaluate(&worse_series);

        assert!(worse.rule_count > quiet.rule_count);
        assert!(worse.rule_score > quiet.rule_score);
        assert!(worse.rule_score <= 1.0);
    }

    #[test]
    fn test_descriptions_interpolate_values() {
        let detection = evaluate(&vec![0.0; 24]);
        let zero_rule = detection
            .detected_rules
            .iter()
            .find(|r| r.rule_id == 1)
            .unwrap();
        assert!(zero_rule.description.contains("100.0%"));
    }
}
