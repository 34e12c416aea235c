use super::{RETAINED_SAMPLES, SeriesSource, WindowedChart};
use crate::catalog;
use crate::model::NodeId;
use crate::service::SeriesQuery;
use std::collections::BTreeMap;

/// Drill-down charts sample once a minute
pub const DRILLDOWN_STEP_SECS: i64 = 60;

/// Every aggregable metric of a single node over the last day
#[derive(Debug)]
pub struct NodeDrilldownSession {
    node_id: NodeId,
    chart: WindowedChart,
}

impl NodeDrilldownSession {
    fn open(node_id: &str) -> Self {
        let mut chart = WindowedChart::new(DRILLDOWN_STEP_SECS, RETAINED_SAMPLES);
        for drilldown in catalog::aggregable_columns().filter_map(|c| c.drilldown) {
            chart.add_series(
                drilldown.label,
                SeriesSource {
                    node_id: node_id.to_string(),
                    field: drilldown.field,
                },
            );
        }
        chart.start();
        NodeDrilldownSession {
            node_id: node_id.to_string(),
            chart,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn chart(&self) -> &WindowedChart {
        &self.chart
    }
}

/// Expansion state: one drill-down session per expanded node
#[derive(Debug, Default)]
pub struct Drilldowns {
    sessions: BTreeMap<NodeId, NodeDrilldownSession>,
}

impl Drilldowns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expand a collapsed node or collapse an expanded one; returns the new state
    pub fn toggle(&mut self, node_id: &str) -> bool {
        if self.close(node_id) {
            return false;
        }
        self.sessions
            .insert(node_id.to_string(), NodeDrilldownSession::open(node_id));
        tracing::debug!(node = node_id, "drill-down opened");
        true
    }

    /// Collapse a node; returns whether it was expanded
    pub fn close(&mut self, node_id: &str) -> bool {
        match self.sessions.remove(node_id) {
            Some(mut session) => {
                session.chart.stop();
                tracing::debug!(node = node_id, "drill-down closed");
                true
            }
            None => false,
        }
    }

    pub fn close_all(&mut self) {
        for session in self.sessions.values_mut() {
            session.chart.stop();
        }
        self.sessions.clear();
    }

    pub fn is_expanded(&self, node_id: &str) -> bool {
        self.sessions.contains_key(node_id)
    }

    pub fn get(&self, node_id: &str) -> Option<&NodeDrilldownSession> {
        self.sessions.get(node_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeDrilldownSession> {
        self.sessions.values()
    }

    pub fn poll(&mut self, now_secs: i64, service: &dyn SeriesQuery) -> usize {
        self.sessions
            .values_mut()
            .map(|session| session.chart.poll(now_secs, service))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::tests::RecordingSeries;

    #[test]
    fn test_double_toggle_is_no_expansion() {
        let mut drilldowns = Drilldowns::new();
        assert!(drilldowns.toggle("cap-1"));
        assert!(drilldowns.is_expanded("cap-1"));
        assert!(!drilldowns.toggle("cap-1"));
        assert!(!drilldowns.is_expanded("cap-1"));
        assert!(drilldowns.is_empty());
    }

    #[test]
    fn test_sessions_are_independent() {
        let service = RecordingSeries::default();
        let mut drilldowns = Drilldowns::new();
        drilldowns.toggle("cap-1");
        drilldowns.toggle("cap-2");
        drilldowns.poll(86_400, &service);

        assert!(drilldowns.close("cap-1"));
        assert!(!drilldowns.close("cap-1"));
        assert_eq!(drilldowns.len(), 1);

        let before = service.requests.borrow().len();
        drilldowns.poll(86_400 + 60, &service);
        let requests = service.requests.borrow();
        assert!(requests[before..].iter().all(|r| r.node_id == "cap-2"));
    }

    #[test]
    fn test_metrics_translated_per_minute() {
        let mut drilldowns = Drilldowns::new();
        drilldowns.toggle("cap-1");
        let chart = drilldowns.get("cap-1").unwrap().chart();

        assert_eq!(chart.step(), 60);
        assert_eq!(chart.size(), 1440);
        assert_eq!(chart.series().len(), 11);

        let packets = chart
            .series()
            .iter()
            .find(|s| s.label == "Packet/m")
            .unwrap();
        assert_eq!(packets.source.field, "deltaPackets");
        assert!(chart.series().iter().any(|s| s.label == "CPU" && s.source.field == "cpu"));
        assert!(chart.series().iter().all(|s| !s.label.ends_with("/s")));
    }
}
