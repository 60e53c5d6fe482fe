//! Electricity Theft Detection Engine
//!
//! Scores meter consumption histories for likely theft or tampering by
//! fusing five anomaly detectors with a deterministic rule engine.

pub mod config;
pub mod consumer;
pub mod error;
pub mod features;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod rules;
pub mod scoring;
pub mod store;
pub mod types;

pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::EngineError;
pub use features::FeatureExtractor;
pub use models::{ArtifactLoader, EnsembleCombiner, OnnxDetectorSuite};
pub use producer::ReportProducer;
pub use scoring::TheftScorer;
pub use store::ReportStore;
pub use types::{
    BatchReport, BatchSummary, ConsumptionRecord, PredictionResult, RiskCategory, ScoringRequest,
};
