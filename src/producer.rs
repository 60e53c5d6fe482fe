//! NATS producer for batch reports.

use crate::types::prediction::BatchReport;
use anyhow::Result;
use async_nats::Client;
use tracing::debug;

/// Producer for publishing batch reports to NATS.
#[derive(Clone)]
pub struct ReportProducer {
    client: Client,
    subject: String,
}

impl ReportProducer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish a batch report.
    pub async fn publish(&self, report: &BatchReport) -> Result<()> {
        let payload = serde_json::to_vec(report)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(
            report_id = %report.report_id,
            consumers = report.predictions.len(),
            theft_detected = report.summary.theft_detected,
            "Published batch report"
        );

        Ok(())
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[cfg(test)]
mod tests {
    // Integration tests would require a running NATS server.
}
