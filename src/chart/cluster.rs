use super::{ChartWindow, RETAINED_SAMPLES, Series, SeriesSource, WindowedChart};
use crate::catalog::Metric;
use crate::service::SeriesQuery;

/// One metric charted across every node of the latest snapshot
#[derive(Debug)]
pub struct ClusterChartSession {
    metric: Metric,
    window: ChartWindow,
    chart: WindowedChart,
}

impl ClusterChartSession {
    /// Build a running session; `None` when the window is "off"
    pub fn create<'a>(
        metric: Metric,
        window: ChartWindow,
        nodes: impl IntoIterator<Item = &'a str>,
    ) -> Option<Self> {
        let step = window.step_secs()?;
        let mut chart = WindowedChart::new(step, RETAINED_SAMPLES);
        for node in nodes {
            chart.add_series(
                node,
                SeriesSource {
                    node_id: node.to_string(),
                    field: metric.field(),
                },
            );
        }
        chart.start();
        tracing::debug!(
            metric = metric.field(),
            step,
            series = chart.series().len(),
            "cluster chart created"
        );
        Some(ClusterChartSession {
            metric,
            window,
            chart,
        })
    }

    /// Stop acquisition and release the session
    pub fn destroy(mut self) {
        self.chart.stop();
        tracing::debug!(metric = self.metric.field(), "cluster chart destroyed");
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn window(&self) -> ChartWindow {
        self.window
    }

    pub fn chart(&self) -> &WindowedChart {
        &self.chart
    }

    pub fn series_for(&self, node_id: &str) -> Option<&Series> {
        self.chart.series().iter().find(|s| s.source.node_id == node_id)
    }

    pub fn start(&mut self) {
        self.chart.start();
    }

    pub fn stop(&mut self) {
        self.chart.stop();
    }

    pub fn is_running(&self) -> bool {
        self.chart.is_running()
    }

    pub fn poll(&mut self, now_secs: i64, service: &dyn SeriesQuery) -> usize {
        self.chart.poll(now_secs, service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::tests::RecordingSeries;

    #[test]
    fn test_one_series_per_node() {
        let session =
            ClusterChartSession::create(Metric::PacketsPerSec, ChartWindow::Day1, ["cap-1", "cap-2"])
                .unwrap();

        assert!(session.is_running());
        assert_eq!(session.chart().step(), 60);
        assert_eq!(session.chart().size(), RETAINED_SAMPLES);
        let series = session.series_for("cap-2").unwrap();
        assert_eq!(series.source.field, "deltaPacketsPerSec");
        assert!(session.series_for("cap-3").is_none());
    }

    #[test]
    fn test_off_window_creates_nothing() {
        assert!(ClusterChartSession::create(Metric::Cpu, ChartWindow::Off, ["a"]).is_none());
    }

    #[test]
    fn test_requests_use_metric_field() {
        let service = RecordingSeries::default();
        let mut session =
            ClusterChartSession::create(Metric::Memory, ChartWindow::Minutes24, ["a"]).unwrap();
        session.poll(5000, &service);

        let requests = service.requests.borrow();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].field, "memory");
        assert_eq!(requests[0].step, 1);
    }
}
