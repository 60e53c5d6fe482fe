//! Configuration management for the theft detection engine.

use crate::models::ensemble::{EnsembleWeights, DEFAULT_DECISION_THRESHOLD};
use crate::types::prediction::RiskThresholds;
use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub models: ModelsConfig,
    pub detection: DetectionConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL.
    pub url: String,
    /// Subject carrying incoming batch scoring requests.
    pub request_subject: String,
    /// Subject batch reports are published to.
    pub report_subject: String,
}

/// Model artifact configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing the ONNX model files.
    pub models_dir: String,
    /// Directory containing the fitted scaler parameter files.
    pub scalers_dir: String,
    /// Ensemble weights; must sum to 1.0.
    #[serde(default)]
    pub weights: EnsembleWeights,
    /// Operating point for the binary theft decision.
    #[serde(default = "default_decision_threshold")]
    pub decision_threshold: f64,
    /// Number of intra-op threads per ONNX session.
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_decision_threshold() -> f64 {
    DEFAULT_DECISION_THRESHOLD
}

fn default_onnx_threads() -> usize {
    1
}

/// Detection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Risk band boundaries for display categorization.
    #[serde(default)]
    pub risk_levels: RiskThresholds,
}

/// Pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Number of batch requests processed concurrently.
    pub workers: usize,
    /// Timeout for one full batch call, in milliseconds.
    pub timeout_ms: u64,
    /// How many recent batch reports to keep for dashboard reads.
    #[serde(default = "default_report_history")]
    pub report_history: usize,
}

fn default_report_history() -> usize {
    8
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log format (json, pretty).
    pub format: String,
}

impl AppConfig {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                request_subject: "meters.scoring.requests".to_string(),
                report_subject: "meters.scoring.reports".to_string(),
            },
            models: ModelsConfig {
                models_dir: "models".to_string(),
                scalers_dir: "scalers".to_string(),
                weights: EnsembleWeights::default(),
                decision_threshold: DEFAULT_DECISION_THRESHOLD,
                onnx_threads: 1,
            },
            detection: DetectionConfig {
                risk_levels: RiskThresholds::default(),
            },
            pipeline: PipelineConfig {
                workers: 4,
                timeout_ms: 30_000,
                report_history: default_report_history(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.models.decision_threshold, 0.435);
        assert!(config.models.weights.validate().is_ok());
        assert_eq!(config.detection.risk_levels.high, 0.7);
        assert_eq!(config.pipeline.workers, 4);
    }

    #[test]
    fn test_load_from_toml() {
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[nats]
url = "nats://example:4222"
request_subject = "req"
report_subject = "rep"

[models]
models_dir = "m"
scalers_dir = "s"

[detection]

[pipeline]
workers = 2
timeout_ms = 5000

[logging]
level = "debug"
format = "pretty"
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.nats.url, "nats://example:4222");
        // Omitted fields pick up their defaults.
        assert_eq!(config.models.decision_threshold, 0.435);
        assert!(config.models.weights.validate().is_ok());
        assert_eq!(config.pipeline.report_history, 8);
    }
}
