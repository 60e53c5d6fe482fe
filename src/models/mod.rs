//! Detector models: artifact loading, score adapters and the ensemble.

pub mod adapters;
pub mod ensemble;
pub mod loader;

pub use adapters::{DetectorSuite, OnnxDetectorSuite};
pub use ensemble::{EnsembleCombiner, EnsembleWeights};
pub use loader::ArtifactLoader;
