//! Bounded store for recent batch reports.
//!
//! Dashboard-style callers read the most recent report from here. The
//! store is injectable and size-bounded, with an explicit empty state
//! instead of a process-wide mutable global.

use crate::types::prediction::BatchReport;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

pub struct ReportStore {
    capacity: usize,
    reports: RwLock<VecDeque<Arc<BatchReport>>>,
}

impl ReportStore {
    /// Create a store keeping at most `capacity` reports (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            reports: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Insert a report, evicting the oldest when full.
    pub fn push(&self, report: BatchReport) -> Arc<BatchReport> {
        let report = Arc::new(report);
        let mut reports = self.reports.write().expect("report store lock poisoned");
        if reports.len() == self.capacity {
            reports.pop_front();
        }
        reports.push_back(report.clone());
        report
    }

    /// The most recent report, or `None` when nothing has been scored yet.
    pub fn latest(&self) -> Option<Arc<BatchReport>> {
        self.reports
            .read()
            .expect("report store lock poisoned")
            .back()
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.reports.read().expect("report store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::prediction::BatchSummary;

    fn report(id: &str) -> BatchReport {
        BatchReport::new(
            Some(id.to_string()),
            Vec::new(),
            BatchSummary::default(),
            0.435,
        )
    }

    #[test]
    fn test_empty_store_has_no_latest() {
        let store = ReportStore::new(4);
        assert!(store.latest().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_latest_returns_newest() {
        let store = ReportStore::new(4);
        store.push(report("first"));
        store.push(report("second"));
        assert_eq!(store.latest().unwrap().report_id, "second");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let store = ReportStore::new(2);
        store.push(report("a"));
        store.push(report("b"));
        store.push(report("c"));

        assert_eq!(store.len(), 2);
        assert_eq!(store.latest().unwrap().report_id, "c");
    }

    #[test]
    fn test_zero_capacity_clamped_to_one() {
        let store = ReportStore::new(0);
        store.push(report("only"));
        assert_eq!(store.len(), 1);
    }
}
