//! Input-table ingestion.
//!
//! Turns a raw table of string cells into consumption records: one column
//! carries the consumer identifier, an optional `true_theft_label` column
//! is passed through, and every remaining column is an hourly reading.
//! Non-numeric cells coerce to 0.0 rather than rejecting the row.

use crate::error::{EngineError, Result};
use crate::types::series::ConsumptionRecord;
use std::path::Path;
use tracing::debug;

/// Ground-truth column excluded from the readings and passed through.
pub const LABEL_COLUMN: &str = "true_theft_label";

/// Index of the consumer-id column: the first column whose name contains
/// "consumer" or equals "id" (case-insensitive), defaulting to column 0.
pub fn id_column_index(columns: &[String]) -> usize {
    columns
        .iter()
        .position(|column| {
            let lower = column.to_lowercase();
            lower.contains("consumer") || lower == "id"
        })
        .unwrap_or(0)
}

/// Parse a table of rows into consumption records.
///
/// Rejects an empty table before any scoring; individual malformed cells
/// are coerced, never rejected.
pub fn parse_table(columns: &[String], rows: &[Vec<String>]) -> Result<Vec<ConsumptionRecord>> {
    if columns.is_empty() {
        return Err(EngineError::validation("input table has no columns"));
    }
    if rows.is_empty() {
        return Err(EngineError::validation("input table has no rows"));
    }

    let id_index = id_column_index(columns);
    let label_index = columns.iter().position(|column| column == LABEL_COLUMN);

    let records = rows
        .iter()
        .map(|row| {
            let consumer_id = row.get(id_index).cloned().unwrap_or_default();

            let readings = row
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != id_index && Some(*i) != label_index)
                .map(|(_, cell)| cell.trim().parse::<f64>().unwrap_or(0.0))
                .collect();

            let true_theft_label = label_index
                .and_then(|i| row.get(i))
                .map(|cell| cell.trim().parse::<i64>().unwrap_or(0));

            ConsumptionRecord {
                consumer_id,
                readings,
                true_theft_label,
            }
        })
        .collect::<Vec<_>>();

    debug!(
        consumers = records.len(),
        labeled = label_index.is_some(),
        "Parsed input table"
    );
    Ok(records)
}

/// Read consumption records from a CSV file.
pub fn read_csv_path(path: impl AsRef<Path>) -> Result<Vec<ConsumptionRecord>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| EngineError::validation(format!("cannot open {}: {e}", path.display())))?;

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| EngineError::validation(format!("cannot read csv header: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| EngineError::validation(format!("cannot read csv row: {e}")))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    parse_table(&columns, &rows)
}
