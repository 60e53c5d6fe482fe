//! Performance metrics and statistics tracking for the scoring service.

use crate::types::prediction::PredictionResult;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for the scoring service.
pub struct ScoringMetrics {
    /// Total consumers scored.
    pub consumers_scored: AtomicU64,
    /// Total consumers flagged as theft.
    pub theft_flagged: AtomicU64,
    /// Flags by risk category.
    flags_by_category: RwLock<HashMap<String, u64>>,
    /// Batch processing times (in microseconds).
    batch_times: RwLock<Vec<u64>>,
    /// Ensemble score distribution buckets.
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation.
    start_time: Instant,
    /// Detector agreement tracking (how often the five detectors agree).
    detector_agreements: RwLock<Vec<f64>>,
}

impl ScoringMetrics {
    pub fn new() -> Self {
        Self {
            consumers_scored: AtomicU64::new(0),
            theft_flagged: AtomicU64::new(0),
            flags_by_category: RwLock::new(HashMap::new()),
            batch_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
            detector_agreements: RwLock::new(Vec::with_capacity(1000)),
        }
    }

    /// Record one processed batch and every result in it.
    pub fn record_batch(&self, processing_time: Duration, results: &[PredictionResult]) {
        if let Ok(mut times) = self.batch_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only the most recent measurements.
            if times.len() > 10_000 {
                times.drain(0..5_000);
            }
        }

        self.consumers_scored
            .fetch_add(results.len() as u64, Ordering::Relaxed);

        for result in results {
            let bucket = (result.ensemble_score * 10.0).min(9.0) as usize;
            if let Ok(mut buckets) = self.score_buckets.write() {
                buckets[bucket] += 1;
            }

            if result.ensemble_prediction == 1 {
                self.theft_flagged.fetch_add(1, Ordering::Relaxed);
                if let Ok(mut by_category) = self.flags_by_category.write() {
                    *by_category
                        .entry(format!("{:?}", result.risk_category))
                        .or_insert(0) += 1;
                }
            }

            self.record_detector_agreement(result);
        }
    }

    /// Record how closely the five detectors agreed on one consumer.
    fn record_detector_agreement(&self, result: &PredictionResult) {
        if result.error.is_some() {
            return;
        }

        // Agreement = 1 - score spread (higher = detectors agree more).
        let agreement = 1.0 - result.scores.std_dev().min(1.0);

        if let Ok(mut agreements) = self.detector_agreements.write() {
            agreements.push(agreement);
            if agreements.len() > 1000 {
                agreements.drain(0..500);
            }
        }
    }

    /// Get batch processing time statistics.
    pub fn get_batch_stats(&self) -> BatchStats {
        let times = self.batch_times.read().unwrap();
        if times.is_empty() {
            return BatchStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        BatchStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Get average detector agreement.
    pub fn get_avg_agreement(&self) -> f64 {
        let agreements = self.detector_agreements.read().unwrap();
        if agreements.is_empty() {
            return 0.0;
        }
        agreements.iter().sum::<f64>() / agreements.len() as f64
    }

    /// Get current throughput (consumers per second).
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.consumers_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get the ensemble score distribution.
    pub fn get_score_distribution(&self) -> [u64; 10] {
        *self.score_buckets.read().unwrap()
    }

    /// Get theft flags by risk category.
    pub fn get_flags_by_category(&self) -> HashMap<String, u64> {
        self.flags_by_category.read().unwrap().clone()
    }

    /// Print summary statistics.
    pub fn print_summary(&self) {
        let scored = self.consumers_scored.load(Ordering::Relaxed);
        let flagged = self.theft_flagged.load(Ordering::Relaxed);
        let flag_rate = if scored > 0 {
            (flagged as f64 / scored as f64) * 100.0
        } else {
            0.0
        };

        let batches = self.get_batch_stats();
        let throughput = self.get_throughput();
        let agreement = self.get_avg_agreement();
        let flags_by_category = self.get_flags_by_category();
        let score_dist = self.get_score_distribution();

        info!("================ THEFT SCORING - METRICS SUMMARY ================");
        info!(
            "Consumers scored: {}  |  Throughput: {:.1} consumers/s",
            scored, throughput
        );
        info!("Theft flagged: {} ({:.1}%)", flagged, flag_rate);
        info!(
            "Batch time (us): mean={} p50={} p95={} p99={} max={}",
            batches.mean_us, batches.p50_us, batches.p95_us, batches.p99_us, batches.max_us
        );
        info!(
            "Detector agreement: {:.1}% (higher = detectors agree more)",
            agreement * 100.0
        );

        for (category, count) in &flags_by_category {
            let pct = if flagged > 0 {
                (*count as f64 / flagged as f64) * 100.0
            } else {
                0.0
            };
            info!("  {:10}: {:>6} ({:>5.1}%)", category, count, pct);
        }

        let total: u64 = score_dist.iter().sum();
        if total > 0 {
            info!("Ensemble score distribution:");
            for (i, &count) in score_dist.iter().enumerate() {
                let pct = (count as f64 / total as f64) * 100.0;
                let bar_len = (pct / 2.0) as usize;
                let bar: String = "#".repeat(bar_len.min(20));
                info!(
                    "  {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                    i as f64 / 10.0,
                    (i + 1) as f64 / 10.0,
                    count,
                    pct,
                    bar
                );
            }
        }
        info!("=================================================================");
    }
}

impl Default for ScoringMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Batch processing time statistics.
#[derive(Debug, Default)]
pub struct BatchStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodic reporter that prints metrics summaries.
pub struct MetricsReporter {
    metrics: std::sync::Arc<ScoringMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: std::sync::Arc<ScoringMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task.
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::prediction::{ModelScores, PredictionResult, RiskCategory};

    fn flagged_result(score: f64) -> PredictionResult {
        let mut result = PredictionResult::degraded("c", String::new());
        result.error = None;
        result.ensemble_score = score;
        result.ensemble_prediction = 1;
        result.risk_category = RiskCategory::High;
        result.scores = ModelScores {
            autoencoder: score,
            lstm: score,
            xgboost: score,
            randomforest: score,
            isolationforest: score,
        };
        result
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = ScoringMetrics::new();

        let mut normal = PredictionResult::degraded("n", String::new());
        normal.error = None;
        normal.ensemble_score = 0.1;
        normal.risk_category = RiskCategory::Minimal;

        metrics.record_batch(
            Duration::from_micros(500),
            &[flagged_result(0.8), normal],
        );

        assert_eq!(metrics.consumers_scored.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.theft_flagged.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.get_flags_by_category().get("High"), Some(&1));
        assert_eq!(metrics.get_batch_stats().count, 1);
    }

    #[test]
    fn test_identical_scores_give_full_agreement() {
        let metrics = ScoringMetrics::new();
        metrics.record_batch(Duration::from_micros(100), &[flagged_result(0.8)]);

        // All five detectors returned 0.8, so the spread is zero.
        assert!((metrics.get_avg_agreement() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_degraded_rows_skip_agreement() {
        let metrics = ScoringMetrics::new();
        let degraded = PredictionResult::degraded("d", "boom".to_string());
        metrics.record_batch(Duration::from_micros(100), &[degraded]);

        assert_eq!(metrics.get_avg_agreement(), 0.0);
        assert_eq!(metrics.consumers_scored.load(Ordering::Relaxed), 1);
    }
}
