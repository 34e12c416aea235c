use crate::catalog::{self, Metric};
use crate::model::Snapshot;
use std::collections::BTreeMap;

/// Column totals and averages derived from exactly one snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateResult {
    pub totals: BTreeMap<Metric, f64>,
    /// `NaN` when the snapshot had no rows
    pub averages: BTreeMap<Metric, f64>,
}

impl AggregateResult {
    pub fn total(&self, metric: Metric) -> Option<f64> {
        self.totals.get(&metric).copied()
    }

    /// Average for display; `None` for an empty snapshot
    pub fn average(&self, metric: Metric) -> Option<f64> {
        self.averages.get(&metric).copied().filter(|v| v.is_finite())
    }
}

/// Sum every aggregable metric across the snapshot's rows and average it
pub fn aggregate(snapshot: &Snapshot) -> AggregateResult {
    let count = snapshot.rows.len() as f64;
    let mut result = AggregateResult::default();

    for metric in catalog::aggregable_metrics() {
        let total: f64 = snapshot.rows.iter().map(|row| row.value(metric)).sum();
        // 0/0 stays NaN for the renderer to blank out
        result.totals.insert(metric, total);
        result.averages.insert(metric, total / count);
    }

    result
}
