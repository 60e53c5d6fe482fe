//! Consumption data structures for meter scoring.

use serde::{Deserialize, Serialize};

/// One consumer's ordered hourly consumption history (kWh).
///
/// Zero and negative readings are valid input; both are theft signals the
/// engine scores on, not malformed data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    /// Consumer identifier.
    pub consumer_id: String,

    /// Ordered hourly readings, arbitrary length (canonically 24).
    pub readings: Vec<f64>,

    /// Ground-truth label passed through from the input when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub true_theft_label: Option<i64>,
}

impl ConsumptionRecord {
    pub fn new(consumer_id: impl Into<String>, readings: Vec<f64>) -> Self {
        Self {
            consumer_id: consumer_id.into(),
            readings,
            true_theft_label: None,
        }
    }
}

/// A batch scoring request as received from the ingestion collaborator:
/// a raw table of string cells plus its column names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serialization() {
        let record = ConsumptionRecord::new("C001", vec![0.5, 0.4, 0.3]);

        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("true_theft_label"));

        let deserialized: ConsumptionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record.consumer_id, deserialized.consumer_id);
        assert_eq!(record.readings, deserialized.readings);
        assert_eq!(deserialized.true_theft_label, None);
    }

    #[test]
    fn test_label_roundtrip() {
        let mut record = ConsumptionRecord::new("C002", vec![1.0]);
        record.true_theft_label = Some(1);

        let json = serde_json::to_string(&record).unwrap();
        let deserialized: ConsumptionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.true_theft_label, Some(1));
    }
}
