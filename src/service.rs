//! Query services the dashboard consumes.
//!
//! The dashboard never talks to a data source directly: snapshots and
//! per-node series come through these traits so the controller can run
//! against the SQLite store, or against fakes in tests.

use crate::error::Result;
use crate::model::{QueryState, Snapshot};
use crate::settings::UserSettings;

/// Fetches one page of per-node stats
pub trait StatsQuery {
    fn snapshot(&self, query: &QueryState) -> Result<Snapshot>;
}

/// A request for one node's samples over `[start, stop)`, in seconds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRequest {
    pub node_id: String,
    pub field: &'static str,
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl SeriesRequest {
    /// Number of samples a full answer contains
    pub fn sample_count(&self) -> usize {
        if self.step <= 0 || self.stop <= self.start {
            return 0;
        }
        ((self.stop - self.start) / self.step) as usize
    }
}

/// Fetches time-bucketed samples for one node and field
pub trait SeriesQuery {
    /// One value per step; buckets without data are `NaN`
    fn series(&self, request: &SeriesRequest) -> Result<Vec<f64>>;
}

/// Loads the viewing user's settings
pub trait SettingsSource {
    fn settings(&self) -> Result<UserSettings>;
}
