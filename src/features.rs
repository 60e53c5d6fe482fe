//! Feature extraction for theft detection model inference.
//!
//! This module transforms a raw consumption series into the 34 features the
//! classifiers were trained on. Features are computed in the exact order
//! expected by the fitted scalers and models.

/// Number of features produced per consumption series.
pub const FEATURE_COUNT: usize = 34;

/// Window length for rolling statistics and hour-of-day grouping.
const HOURS_PER_DAY: usize = 24;

/// Feature names in training order. The order is a contract: the fitted
/// scaler and the classifiers index features by position.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "mean",
    "std",
    "median",
    "min",
    "max",
    "range",
    "q25",
    "q75",
    "iqr",
    "skewness",
    "kurtosis",
    "cv",
    "mean_diff",
    "std_diff",
    "trend_slope",
    "zero_count",
    "zero_ratio",
    "negative_count",
    "negative_ratio",
    "low_consumption_count",
    "low_consumption_ratio",
    "high_consumption_count",
    "high_consumption_ratio",
    "mad",
    "rolling_std_mean",
    "rolling_std_std",
    "hour_mean",
    "hour_std",
    "peak_hour",
    "is_weekend_dominant",
    "morning_hour_ratio",
    "evening_hour_ratio",
    "night_hour_ratio",
    "sequence_length",
];

/// The 34 named features extracted from one consumption series.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    pub mean: f64,
    pub std: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub q25: f64,
    pub q75: f64,
    pub iqr: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub cv: f64,
    pub mean_diff: f64,
    pub std_diff: f64,
    pub trend_slope: f64,
    pub zero_count: f64,
    pub zero_ratio: f64,
    pub negative_count: f64,
    pub negative_ratio: f64,
    pub low_consumption_count: f64,
    pub low_consumption_ratio: f64,
    pub high_consumption_count: f64,
    pub high_consumption_ratio: f64,
    pub mad: f64,
    pub rolling_std_mean: f64,
    pub rolling_std_std: f64,
    pub hour_mean: f64,
    pub hour_std: f64,
    pub peak_hour: f64,
    pub is_weekend_dominant: f64,
    pub morning_hour_ratio: f64,
    pub evening_hour_ratio: f64,
    pub night_hour_ratio: f64,
    pub sequence_length: f64,
}

impl FeatureSet {
    /// Feature values in training order, matching [`FEATURE_NAMES`].
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.mean,
            self.std,
            self.median,
            self.min,
            self.max,
            self.range,
            self.q25,
            self.q75,
            self.iqr,
            self.skewness,
            self.kurtosis,
            self.cv,
            self.mean_diff,
            self.std_diff,
            self.trend_slope,
            self.zero_count,
            self.zero_ratio,
            self.negative_count,
            self.negative_ratio,
            self.low_consumption_count,
            self.low_consumption_ratio,
            self.high_consumption_count,
            self.high_consumption_ratio,
            self.mad,
            self.rolling_std_mean,
            self.rolling_std_std,
            self.hour_mean,
            self.hour_std,
            self.peak_hour,
            self.is_weekend_dominant,
            self.morning_hour_ratio,
            self.evening_hour_ratio,
            self.night_hour_ratio,
            self.sequence_length,
        ]
    }

    /// Replace any non-finite value with 0.0. Runs as the final pass so a
    /// degenerate series can never leak NaN/Inf into the model inputs.
    fn sanitized(mut self) -> Self {
        for value in [
            &mut self.mean,
            &mut self.std,
            &mut self.median,
            &mut self.min,
            &mut self.max,
            &mut self.range,
            &mut self.q25,
            &mut self.q75,
            &mut self.iqr,
            &mut self.skewness,
            &mut self.kurtosis,
            &mut self.cv,
            &mut self.mean_diff,
            &mut self.std_diff,
            &mut self.trend_slope,
            &mut self.zero_count,
            &mut self.zero_ratio,
            &mut self.negative_count,
            &mut self.negative_ratio,
            &mut self.low_consumption_count,
            &mut self.low_consumption_ratio,
            &mut self.high_consumption_count,
            &mut self.high_consumption_ratio,
            &mut self.mad,
            &mut self.rolling_std_mean,
            &mut self.rolling_std_std,
            &mut self.hour_mean,
            &mut self.hour_std,
            &mut self.peak_hour,
            &mut self.is_weekend_dominant,
            &mut self.morning_hour_ratio,
            &mut self.evening_hour_ratio,
            &mut self.night_hour_ratio,
            &mut self.sequence_length,
        ] {
            if !value.is_finite() {
                *value = 0.0;
            }
        }
        self
    }
}

/// Feature extractor that transforms consumption series into model inputs.
///
/// Matches the preprocessing done in the training pipeline.
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Extract all 34 features from a consumption series.
    ///
    /// An empty series yields an all-zero feature set rather than an error.
    pub fn extract(&self, series: &[f64]) -> FeatureSet {
        if series.is_empty() {
            return FeatureSet::default();
        }

        let n = series.len();
        let nf = n as f64;

        let mean = series.iter().sum::<f64>() / nf;
        let std = population_std(series, mean);

        let mut sorted = series.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let median = median_of_sorted(&sorted);
        let min = sorted[0];
        let max = sorted[n - 1];
        let q25 = percentile_of_sorted(&sorted, 0.25);
        let q75 = percentile_of_sorted(&sorted, 0.75);

        let cv = if mean != 0.0 { std / mean } else { 0.0 };

        let (mean_diff, std_diff) = if n >= 2 {
            let diffs: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();
            let diff_mean = diffs.iter().sum::<f64>() / diffs.len() as f64;
            (diff_mean, population_std(&diffs, diff_mean))
        } else {
            (0.0, 0.0)
        };

        let zero_count = series.iter().filter(|&&v| v == 0.0).count() as f64;
        let negative_count = series.iter().filter(|&&v| v < 0.0).count() as f64;

        let low_threshold = if mean > 0.0 { mean * 0.1 } else { 0.1 };
        let low_count = series.iter().filter(|&&v| v < low_threshold).count() as f64;

        let high_threshold = if mean > 0.0 { mean * 2.0 } else { 5.0 };
        let high_count = series.iter().filter(|&&v| v > high_threshold).count() as f64;

        let mut abs_deviations: Vec<f64> = series.iter().map(|v| (v - median).abs()).collect();
        abs_deviations.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mad = median_of_sorted(&abs_deviations);

        let (rolling_std_mean, rolling_std_std) = if n >= HOURS_PER_DAY {
            let window_stds: Vec<f64> = series
                .windows(HOURS_PER_DAY)
                .map(|w| sample_std(w))
                .collect();
            let window_mean = window_stds.iter().sum::<f64>() / window_stds.len() as f64;
            (window_mean, sample_std(&window_stds))
        } else {
            (std, 0.0)
        };

        let (hour_mean, hour_std, peak_hour) = if n >= HOURS_PER_DAY {
            hourly_profile(series)
        } else {
            (mean, std, 0.0)
        };

        // Strided index picks inherited from the training pipeline. This is
        // NOT true calendar-hour grouping when the series is not aligned to
        // midnight; the behavior is preserved for scaler/model compatibility.
        let total: f64 = series.iter().sum();
        let (morning_ratio, evening_ratio, night_ratio) = if n >= HOURS_PER_DAY && total > 0.0 {
            let morning = strided_sum(series, 6, 12, HOURS_PER_DAY);
            let evening = strided_sum(series, 18, 22, HOURS_PER_DAY);
            let night = strided_sum(series, 22, n, HOURS_PER_DAY)
                + strided_sum(series, 0, 6, HOURS_PER_DAY);
            (morning / total, evening / total, night / total)
        } else {
            (0.33, 0.33, 0.33)
        };

        let features = FeatureSet {
            mean,
            std,
            median,
            min,
            max,
            range: max - min,
            q25,
            q75,
            iqr: q75 - q25,
            skewness: sample_skewness(series, mean),
            kurtosis: sample_excess_kurtosis(series, mean),
            cv,
            mean_diff,
            std_diff,
            trend_slope: trend_slope(series),
            zero_count,
            zero_ratio: zero_count / nf,
            negative_count,
            negative_ratio: negative_count / nf,
            low_consumption_count: low_count,
            low_consumption_ratio: low_count / nf,
            high_consumption_count: high_count,
            high_consumption_ratio: high_count / nf,
            mad,
            rolling_std_mean,
            rolling_std_std,
            hour_mean,
            hour_std,
            peak_hour,
            // No calendar information reaches this engine; the training
            // pipeline pinned this feature to zero as well.
            is_weekend_dominant: 0.0,
            morning_hour_ratio: morning_ratio,
            evening_hour_ratio: evening_ratio,
            night_hour_ratio: night_ratio,
            sequence_length: nf,
        };

        features.sanitized()
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn population_std(values: &[f64], mean: f64) -> f64 {
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Sample standard deviation (ddof = 1), matching the rolling statistics of
/// the training pipeline.
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Linear-interpolation percentile over a sorted slice, `q` in [0, 1].
fn percentile_of_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let position = q * (n - 1) as f64;
    let lower = position.floor() as usize;
    let fraction = position - lower as f64;
    if lower + 1 < n {
        sorted[lower] + fraction * (sorted[lower + 1] - sorted[lower])
    } else {
        sorted[lower]
    }
}

/// Bias-corrected sample skewness. Zero when undefined (n < 3 or zero
/// variance).
fn sample_skewness(values: &[f64], mean: f64) -> f64 {
    let n = values.len();
    if n < 3 {
        return 0.0;
    }
    let s = sample_std(values);
    if s == 0.0 {
        return 0.0;
    }
    let nf = n as f64;
    let m3: f64 = values.iter().map(|v| ((v - mean) / s).powi(3)).sum();
    nf / ((nf - 1.0) * (nf - 2.0)) * m3
}

/// Bias-corrected excess kurtosis. Zero when undefined (n < 4 or zero
/// variance).
fn sample_excess_kurtosis(values: &[f64], mean: f64) -> f64 {
    let n = values.len();
    if n < 4 {
        return 0.0;
    }
    let s = sample_std(values);
    if s == 0.0 {
        return 0.0;
    }
    let nf = n as f64;
    let m4: f64 = values.iter().map(|v| ((v - mean) / s).powi(4)).sum();
    let term1 = nf * (nf + 1.0) / ((nf - 1.0) * (nf - 2.0) * (nf - 3.0)) * m4;
    let term2 = 3.0 * (nf - 1.0).powi(2) / ((nf - 2.0) * (nf - 3.0));
    term1 - term2
}

/// Slope of an ordinary-least-squares fit of value against index position.
fn trend_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n <= 1 {
        return 0.0;
    }
    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / nf;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }
    sxy / sxx
}

/// Mean/std over position-modulo-24 bucket means plus the peak bucket index.
fn hourly_profile(series: &[f64]) -> (f64, f64, f64) {
    let mut bucket_means = Vec::with_capacity(HOURS_PER_DAY);
    for hour in 0..HOURS_PER_DAY {
        let readings: Vec<f64> = series
            .iter()
            .skip(hour)
            .step_by(HOURS_PER_DAY)
            .copied()
            .collect();
        if !readings.is_empty() {
            bucket_means.push(readings.iter().sum::<f64>() / readings.len() as f64);
        }
    }

    let mean = bucket_means.iter().sum::<f64>() / bucket_means.len() as f64;
    let std = population_std(&bucket_means, mean);
    let peak = bucket_means
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i as f64)
        .unwrap_or(0.0);
    (mean, std, peak)
}

/// Sum of `series[start..stop..step]` with Python slice semantics.
fn strided_sum(series: &[f64], start: usize, stop: usize, step: usize) -> f64 {
    let stop = stop.min(series.len());
    let mut sum = 0.0;
    let mut i = start;
    while i < stop {
        sum += series[i];
        i += step;
    }
    sum
}
