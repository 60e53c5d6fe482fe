//! Synthetic Consumption Data Generator
//!
//! Generates consumption CSVs in the scoring engine's input format, with a
//! configurable share of consumers carrying injected theft patterns and a
//! `true_theft_label` ground-truth column for validation runs. Standalone
//! tool; the scoring engine has no runtime dependency on it.

use anyhow::Result;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

const HOURS_PER_DAY: usize = 24;

const THEFT_PATTERNS: [&str; 4] = [
    "sudden_drop",
    "zero_usage",
    "night_spikes",
    "negative_readings",
];

/// Generates hourly consumption series with daily and weekly structure.
struct ConsumptionGenerator {
    rng: rand::rngs::ThreadRng,
}

impl ConsumptionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Generate a legitimate consumer: base load modulated by daily peaks
    /// (morning and evening), a weekend effect and mild noise.
    fn generate_normal(&mut self, days: usize) -> Vec<f64> {
        let hours = days * HOURS_PER_DAY;
        let base: f64 = self.rng.gen_range(0.5..5.0);
        let mut consumption = Vec::with_capacity(hours);

        for i in 0..hours {
            let hour = i % HOURS_PER_DAY;
            let day_of_week = (i / HOURS_PER_DAY) % 7;

            let daily_factor = match hour {
                6..=9 => 1.5 + 0.5 * (std::f64::consts::PI * (hour - 6) as f64 / 3.0).sin(),
                18..=22 => 1.8 + 0.7 * (std::f64::consts::PI * (hour - 18) as f64 / 4.0).sin(),
                0..=5 => 0.3 + 0.2 * (std::f64::consts::PI * hour as f64 / 5.0).cos(),
                _ => 1.0 + 0.3 * (std::f64::consts::PI * hour as f64 / 12.0).sin(),
            };

            let weekly_factor = if day_of_week >= 5 { 1.1 } else { 1.0 };

            let noise = self.rng.gen_range(-0.05..0.05) * base;
            let value = (base * daily_factor * weekly_factor + noise).max(0.2);
            consumption.push(value);
        }

        consumption
    }

    /// Overlay one to three theft patterns on a normal profile.
    fn inject_theft(&mut self, consumption: &mut [f64]) -> Vec<&'static str> {
        let pattern_count = self.rng.gen_range(1..4);
        let patterns: Vec<&'static str> = THEFT_PATTERNS
            .choose_multiple(&mut self.rng, pattern_count)
            .copied()
            .collect();
        let total_hours = consumption.len();

        for pattern in &patterns {
            match *pattern {
                "sudden_drop" => {
                    let duration = self.span_duration(total_hours);
                    let start = self.rng.gen_range(0..total_hours.saturating_sub(duration).max(1));
                    let factor = self.rng.gen_range(0.3..0.5);
                    for value in &mut consumption[start..start + duration] {
                        *value *= factor;
                    }
                }
                "zero_usage" => {
                    let duration = self.span_duration(total_hours);
                    let start = self.rng.gen_range(0..total_hours.saturating_sub(duration).max(1));
                    for value in &mut consumption[start..start + duration] {
                        *value = 0.0;
                    }
                }
                "night_spikes" => {
                    let night_indices: Vec<usize> = (0..total_hours)
                        .filter(|i| i % HOURS_PER_DAY <= 6)
                        .collect();
                    let spike_count = night_indices.len().min(30);
                    let factor = self.rng.gen_range(2.0..3.0);
                    for &i in night_indices.choose_multiple(&mut self.rng, spike_count) {
                        consumption[i] *= factor;
                    }
                }
                "negative_readings" => {
                    let negative_count = (total_hours / 100).max(1);
                    for _ in 0..negative_count {
                        let i = self.rng.gen_range(0..total_hours);
                        consumption[i] = self.rng.gen_range(-0.5..-0.1);
                    }
                }
                _ => unreachable!(),
            }
        }

        patterns
    }

    /// Duration for a contiguous theft span: between a third and half of
    /// the dataset, at least one hour.
    fn span_duration(&mut self, total_hours: usize) -> usize {
        let min = (total_hours / 3).max(1);
        let max = (total_hours / 2).max(min + 1);
        self.rng.gen_range(min..max)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("generate_data=info".parse()?),
        )
        .init();

    // Parse arguments: output path, consumer count, days, theft rate.
    let args: Vec<String> = std::env::args().collect();
    let output = args.get(1).map(|s| s.as_str()).unwrap_or("consumption.csv");
    let consumers: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100);
    let days: usize = args
        .get(3)
        .and_then(|s| s.parse().ok())
        .unwrap_or(7)
        .max(1);
    let theft_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.2);

    info!(
        output,
        consumers, days, theft_rate, "Generating synthetic consumption data"
    );

    let mut generator = ConsumptionGenerator::new();
    let mut rng = rand::thread_rng();

    let theft_count = (consumers as f64 * theft_rate).round() as usize;
    let mut consumer_indices: Vec<usize> = (0..consumers).collect();
    consumer_indices.shuffle(&mut rng);
    let theft_consumers: std::collections::HashSet<usize> =
        consumer_indices.into_iter().take(theft_count).collect();

    let mut writer = csv::Writer::from_path(output)?;

    let mut header: Vec<String> = vec!["consumer_id".to_string()];
    for hour in 0..HOURS_PER_DAY {
        header.push(format!("hour_{hour}"));
    }
    header.push("true_theft_label".to_string());
    writer.write_record(&header)?;

    let mut injected = 0usize;
    for consumer in 0..consumers {
        let mut consumption = generator.generate_normal(days);
        let is_theft = theft_consumers.contains(&consumer);

        if is_theft {
            let patterns = generator.inject_theft(&mut consumption);
            injected += 1;
            info!(consumer, patterns = ?patterns, "Injected theft patterns");
        }

        // Emit the last full day so injected patterns survive instead of
        // being averaged away.
        let last_day = &consumption[consumption.len() - HOURS_PER_DAY..];

        let mut row: Vec<String> = vec![format!("C{:03}", consumer + 1)];
        for value in last_day {
            row.push(format!("{:.1}", value));
        }
        row.push(if is_theft { "1" } else { "0" }.to_string());
        writer.write_record(&row)?;
    }

    writer.flush()?;

    info!(
        output,
        consumers,
        theft_consumers = injected,
        "Dataset written"
    );

    Ok(())
}
