//! Type definitions for the theft detection engine.

pub mod prediction;
pub mod series;

pub use prediction::{
    BatchReport, BatchSummary, ModelScores, PredictionResult, RiskCategory, RiskThresholds,
};
pub use series::{ConsumptionRecord, ScoringRequest};
