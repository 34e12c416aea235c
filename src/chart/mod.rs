//! Windowed multi-series chart buffers.
//!
//! A chart is built for one fixed `(step, size)` pair and keeps the most
//! recent `size` samples of every series. While running, each poll asks the
//! series query service for the steps completed since the last fetch, so a
//! stopped chart resumes where it left off instead of re-fetching its whole
//! window. Changing the step means building a new chart.

mod cluster;
mod drilldown;

pub use cluster::ClusterChartSession;
pub use drilldown::{Drilldowns, NodeDrilldownSession, DRILLDOWN_STEP_SECS};

use crate::model::NodeId;
use crate::service::{SeriesQuery, SeriesRequest};
use std::collections::VecDeque;
use std::time::Duration;

/// Samples retained per series regardless of step
pub const RETAINED_SAMPLES: usize = 1440;

/// Marker shown for sample ranges whose fetch failed
pub const UNABLE_TO_LOAD: &str = "Unable to load data";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Value(f64),
    /// No data recorded for this step
    Gap,
    /// The fetch covering this step failed
    Unavailable,
}

/// Where one series gets its samples from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesSource {
    pub node_id: NodeId,
    pub field: &'static str,
}

#[derive(Debug, Clone)]
pub struct Series {
    pub label: String,
    pub source: SeriesSource,
    samples: VecDeque<Sample>,
    error: Option<&'static str>,
}

impl Series {
    fn new(label: String, source: SeriesSource) -> Self {
        Series {
            label,
            source,
            samples: VecDeque::new(),
            error: None,
        }
    }

    pub fn samples(&self) -> &VecDeque<Sample> {
        &self.samples
    }

    /// Error marker from the most recent fetch, if it failed
    pub fn error(&self) -> Option<&'static str> {
        self.error
    }

    /// Most recent numeric sample
    pub fn latest(&self) -> Option<f64> {
        self.samples.iter().rev().find_map(|s| match s {
            Sample::Value(v) => Some(*v),
            _ => None,
        })
    }

    fn append(&mut self, values: Result<Vec<f64>, ()>, expected: usize, size: usize) {
        match values {
            Ok(values) => {
                self.error = None;
                let received = values.len().min(expected);
                self.samples.extend(values.into_iter().take(expected).map(|v| {
                    if v.is_nan() { Sample::Gap } else { Sample::Value(v) }
                }));
                self.samples
                    .extend(std::iter::repeat_n(Sample::Gap, expected - received));
            }
            Err(()) => {
                self.error = Some(UNABLE_TO_LOAD);
                self.samples
                    .extend(std::iter::repeat_n(Sample::Unavailable, expected));
            }
        }
        let excess = self.samples.len().saturating_sub(size);
        self.samples.drain(..excess);
    }
}

/// Fixed-step sliding window over several series
#[derive(Debug)]
pub struct WindowedChart {
    step: i64,
    size: usize,
    series: Vec<Series>,
    running: bool,
    /// End (exclusive, unix seconds) of the last fetched range
    fetched_until: Option<i64>,
}

impl WindowedChart {
    pub fn new(step_secs: i64, size: usize) -> Self {
        WindowedChart {
            step: step_secs.max(1),
            size,
            series: Vec::new(),
            running: false,
            fetched_until: None,
        }
    }

    pub fn add_series(&mut self, label: impl Into<String>, source: SeriesSource) {
        self.series.push(Series::new(label.into(), source));
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    /// Halt acquisition; no fetch happens until the next `start`
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn step(&self) -> i64 {
        self.step
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Total history displayed: step × retained samples
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.step as u64 * self.size as u64)
    }

    pub fn series(&self) -> &[Series] {
        &self.series
    }

    pub fn fetched_until(&self) -> Option<i64> {
        self.fetched_until
    }

    /// Chart points `(unix_secs, value)` for one series, skipping gaps
    pub fn points(&self, index: usize) -> Vec<(f64, f64)> {
        self.timed(index, |sample| match sample {
            Sample::Value(v) => Some(v),
            _ => None,
        })
    }

    /// Start times of the steps whose fetch failed
    pub fn unavailable_times(&self, index: usize) -> Vec<f64> {
        self.timed(index, |sample| (sample == Sample::Unavailable).then_some(()))
            .into_iter()
            .map(|(t, ())| t)
            .collect()
    }

    fn timed<T>(&self, index: usize, pick: impl Fn(Sample) -> Option<T>) -> Vec<(f64, T)> {
        let (Some(series), Some(until)) = (self.series.get(index), self.fetched_until) else {
            return Vec::new();
        };
        let len = series.samples.len() as i64;
        series
            .samples
            .iter()
            .enumerate()
            .filter_map(|(i, sample)| {
                pick(*sample).map(|v| ((until - (len - i as i64) * self.step) as f64, v))
            })
            .collect()
    }

    /// Fetch every completed step since the last poll; returns requests issued
    pub fn poll(&mut self, now_secs: i64, service: &dyn SeriesQuery) -> usize {
        if !self.running || self.series.is_empty() {
            return 0;
        }

        let stop = now_secs.div_euclid(self.step) * self.step;
        let window_start = stop - self.step * self.size as i64;
        let start = match self.fetched_until {
            Some(until) if until >= window_start => until,
            _ => {
                // Nothing retained overlaps the window any more
                for series in &mut self.series {
                    series.samples.clear();
                }
                window_start
            }
        };
        if stop <= start {
            return 0;
        }

        let expected = ((stop - start) / self.step) as usize;
        for series in &mut self.series {
            let request = SeriesRequest {
                node_id: series.source.node_id.clone(),
                field: series.source.field,
                start,
                stop,
                step: self.step,
            };
            let values = service.series(&request).map_err(|e| {
                tracing::debug!(
                    node = %request.node_id,
                    field = request.field,
                    error = %e,
                    "series fetch failed"
                );
            });
            series.append(values, expected, self.size);
        }
        self.fetched_until = Some(stop);
        self.series.len()
    }
}

/// Chart window menu; each entry fixes the step of a 1440-sample chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartWindow {
    Off,
    Minutes24,
    #[default]
    Hours2,
    Day1,
    Days10,
}

impl ChartWindow {
    pub const ALL: [ChartWindow; 5] = [
        ChartWindow::Off,
        ChartWindow::Minutes24,
        ChartWindow::Hours2,
        ChartWindow::Day1,
        ChartWindow::Days10,
    ];

    /// Step in seconds; `None` for the "off" sentinel
    pub fn step_secs(self) -> Option<i64> {
        match self {
            ChartWindow::Off => None,
            ChartWindow::Minutes24 => Some(1),
            ChartWindow::Hours2 => Some(5),
            ChartWindow::Day1 => Some(60),
            ChartWindow::Days10 => Some(600),
        }
    }

    pub fn is_off(self) -> bool {
        self == ChartWindow::Off
    }

    pub fn label(self) -> &'static str {
        match self {
            ChartWindow::Off => "off",
            ChartWindow::Minutes24 => "24m",
            ChartWindow::Hours2 => "2h",
            ChartWindow::Day1 => "1d",
            ChartWindow::Days10 => "10d",
        }
    }

    /// Parse a step in seconds (`0` is off) or a window label
    pub fn parse(s: &str) -> Option<Self> {
        let by_step = s
            .parse::<i64>()
            .ok()
            .and_then(|step| Self::ALL.into_iter().find(|w| w.step_secs().unwrap_or(0) == step));
        by_step.or_else(|| Self::ALL.into_iter().find(|w| w.label() == s))
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|w| *w == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use std::cell::RefCell;

    /// Records every request; answers with the start time of each bucket
    #[derive(Default)]
    pub(crate) struct RecordingSeries {
        pub requests: RefCell<Vec<SeriesRequest>>,
        pub fail_node: Option<String>,
    }

    impl SeriesQuery for RecordingSeries {
        fn series(&self, request: &SeriesRequest) -> Result<Vec<f64>> {
            self.requests.borrow_mut().push(request.clone());
            if self.fail_node.as_deref() == Some(request.node_id.as_str()) {
                return Err(Error::Query("boom".to_string()));
            }
            Ok((request.start..request.stop)
                .step_by(request.step as usize)
                .map(|t| t as f64)
                .collect())
        }
    }

    fn chart(step: i64, size: usize, nodes: &[&str]) -> WindowedChart {
        let mut chart = WindowedChart::new(step, size);
        for node in nodes {
            chart.add_series(
                *node,
                SeriesSource {
                    node_id: node.to_string(),
                    field: "cpu",
                },
            );
        }
        chart
    }

    #[test]
    fn test_first_poll_fetches_full_window() {
        let service = RecordingSeries::default();
        let mut chart = chart(5, 1440, &["a", "b"]);
        chart.start();

        assert_eq!(chart.poll(100_003, &service), 2);
        let requests = service.requests.borrow();
        assert_eq!(requests[0].stop, 100_000);
        assert_eq!(requests[0].start, 100_000 - 5 * 1440);
        assert_eq!(requests[0].sample_count(), 1440);
        assert_eq!(chart.series()[0].samples().len(), 1440);
        assert_eq!(chart.window(), Duration::from_secs(7200));
    }

    #[test]
    fn test_incremental_polls() {
        let service = RecordingSeries::default();
        let mut chart = chart(5, 10, &["a"]);
        chart.start();

        chart.poll(1000, &service);
        assert_eq!(chart.poll(1004, &service), 0);
        assert_eq!(chart.poll(1010, &service), 1);

        let last = service.requests.borrow().last().cloned().unwrap();
        assert_eq!((last.start, last.stop), (1000, 1010));
        assert_eq!(chart.series()[0].samples().len(), 10);
        assert_eq!(chart.series()[0].latest(), Some(1005.0));
    }

    #[test]
    fn test_stopped_chart_never_fetches() {
        let service = RecordingSeries::default();
        let mut chart = chart(1, 10, &["a"]);
        chart.start();
        chart.poll(100, &service);
        chart.stop();

        assert_eq!(chart.poll(200, &service), 0);
        assert_eq!(service.requests.borrow().len(), 1);
    }

    #[test]
    fn test_resume_continues_from_last_fetch() {
        let service = RecordingSeries::default();
        let mut chart = chart(1, 10, &["a"]);
        chart.start();
        chart.poll(100, &service);
        chart.stop();
        chart.start();
        chart.poll(103, &service);

        let last = service.requests.borrow().last().cloned().unwrap();
        assert_eq!((last.start, last.stop), (100, 103));
    }

    #[test]
    fn test_resume_after_long_pause_refetches_window() {
        let service = RecordingSeries::default();
        let mut chart = chart(1, 10, &["a"]);
        chart.start();
        chart.poll(100, &service);
        chart.poll(500, &service);

        let last = service.requests.borrow().last().cloned().unwrap();
        assert_eq!((last.start, last.stop), (490, 500));
        assert_eq!(chart.series()[0].samples().len(), 10);
    }

    #[test]
    fn test_failure_marks_only_that_series() {
        let service = RecordingSeries {
            fail_node: Some("b".to_string()),
            ..Default::default()
        };
        let mut chart = chart(1, 4, &["a", "b"]);
        chart.start();
        chart.poll(100, &service);

        let a = &chart.series()[0];
        let b = &chart.series()[1];
        assert_eq!(a.error(), None);
        assert!(a.samples().iter().all(|s| matches!(s, Sample::Value(_))));
        assert_eq!(b.error(), Some(UNABLE_TO_LOAD));
        assert!(b.samples().iter().all(|s| *s == Sample::Unavailable));
        assert_eq!(chart.unavailable_times(1), vec![96.0, 97.0, 98.0, 99.0]);
        assert!(chart.unavailable_times(0).is_empty());
        assert!(chart.points(1).is_empty());
    }

    #[test]
    fn test_failed_range_outlives_recovery() {
        struct Flaky(std::cell::Cell<bool>);
        impl SeriesQuery for Flaky {
            fn series(&self, request: &SeriesRequest) -> Result<Vec<f64>> {
                if self.0.get() {
                    return Err(Error::Query("busy".to_string()));
                }
                Ok(vec![7.0; request.sample_count()])
            }
        }

        let service = Flaky(std::cell::Cell::new(true));
        let mut chart = chart(1, 6, &["a"]);
        chart.start();
        chart.poll(10, &service);
        service.0.set(false);
        chart.poll(12, &service);

        // The error clears but the failed steps stay marked
        assert_eq!(chart.series()[0].error(), None);
        assert_eq!(chart.unavailable_times(0), vec![6.0, 7.0, 8.0, 9.0]);
        assert_eq!(chart.points(0), vec![(10.0, 7.0), (11.0, 7.0)]);
    }

    #[test]
    fn test_short_and_nan_answers_become_gaps() {
        struct Sparse;
        impl SeriesQuery for Sparse {
            fn series(&self, _request: &SeriesRequest) -> Result<Vec<f64>> {
                Ok(vec![1.0, f64::NAN])
            }
        }

        let mut chart = chart(1, 4, &["a"]);
        chart.start();
        chart.poll(10, &Sparse);

        let samples: Vec<Sample> = chart.series()[0].samples().iter().copied().collect();
        assert_eq!(
            samples,
            vec![Sample::Value(1.0), Sample::Gap, Sample::Gap, Sample::Gap]
        );
        assert_eq!(chart.points(0), vec![(6.0, 1.0)]);
    }

    #[test]
    fn test_window_menu() {
        assert_eq!(ChartWindow::parse("0"), Some(ChartWindow::Off));
        assert_eq!(ChartWindow::parse("5"), Some(ChartWindow::Hours2));
        assert_eq!(ChartWindow::parse("1d"), Some(ChartWindow::Day1));
        assert_eq!(ChartWindow::parse("7"), None);
        assert_eq!(ChartWindow::Days10.next(), ChartWindow::Off);
        assert_eq!(ChartWindow::default().step_secs(), Some(5));
    }
}
