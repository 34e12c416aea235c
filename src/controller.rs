//! Stats page state machine.
//!
//! The controller owns the query state, the refresh timer, the cluster chart,
//! and the per-node drill-downs. It never sleeps: the event loop feeds it
//! user actions and calls [`StatsPageController::poll`] with the current time,
//! and the controller decides what to fetch.

use crate::aggregate::{self, AggregateResult};
use crate::catalog::{self, Metric};
use crate::chart::{ChartWindow, ClusterChartSession, Drilldowns};
use crate::error::{Error, Result};
use crate::model::{PaginationEvent, QueryState, Snapshot};
use crate::scheduler::RefreshScheduler;
use crate::service::{SeriesQuery, StatsQuery};
use crate::settings::UserSettings;
use crate::visibility::{GateChange, VisibilityGate};
use ratatui::style::Color;
use std::time::{Duration, Instant};

/// Refresh interval menu; zero pauses refreshing
pub const REFRESH_INTERVALS: [Duration; 6] = [
    Duration::ZERO,
    Duration::from_secs(5),
    Duration::from_secs(15),
    Duration::from_secs(30),
    Duration::from_secs(60),
    Duration::from_secs(600),
];

/// Initial dashboard choices
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub page_length: usize,
    pub refresh: Duration,
    pub metric: Metric,
    pub window: ChartWindow,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            page_length: 10,
            refresh: Duration::from_secs(5),
            metric: Metric::PacketsPerSec,
            window: ChartWindow::Hours2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Overview,
    Storage,
}

impl Tab {
    pub const ALL: [Tab; 2] = [Tab::Overview, Tab::Storage];

    pub fn index(self) -> usize {
        match self {
            Tab::Overview => 0,
            Tab::Storage => 1,
        }
    }

    pub fn from_index(index: usize) -> Option<Tab> {
        Self::ALL.get(index).copied()
    }

    pub fn title(self) -> &'static str {
        match self {
            Tab::Overview => "Nodes",
            Tab::Storage => "Storage",
        }
    }
}

/// A snapshot request that has been issued but not yet answered
#[derive(Debug, Clone)]
pub struct PendingRefresh {
    seq: u64,
    pub query: QueryState,
}

impl PendingRefresh {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

pub struct StatsPageController<Q> {
    service: Q,
    query: QueryState,
    tab: Tab,
    metric: Metric,
    window: ChartWindow,
    refresh_interval: Duration,
    graphs_open: bool,
    node_stats_open: bool,

    scheduler: RefreshScheduler,
    gate: VisibilityGate,
    cluster: Option<ClusterChartSession>,
    /// Cluster chart is built once per page, on the first snapshot with rows
    chart_initialized: bool,
    drilldowns: Drilldowns,

    snapshot: Option<Snapshot>,
    aggregates: Option<AggregateResult>,
    loading: bool,
    error: Option<String>,
    issued_seq: u64,

    settings: UserSettings,
    palette: Vec<Color>,
}

impl<Q: StatsQuery + SeriesQuery> StatsPageController<Q> {
    pub fn new(service: Q, config: DashboardConfig, settings: UserSettings) -> Self {
        let query = QueryState {
            page_length: config.page_length.max(1),
            ..QueryState::default()
        };
        let palette = settings.palette();

        StatsPageController {
            service,
            query,
            tab: Tab::Overview,
            metric: config.metric,
            window: config.window,
            refresh_interval: config.refresh,
            graphs_open: true,
            node_stats_open: true,
            scheduler: RefreshScheduler::new(),
            gate: VisibilityGate::new(true, !config.window.is_off()),
            cluster: None,
            chart_initialized: false,
            drilldowns: Drilldowns::new(),
            snapshot: None,
            aggregates: None,
            loading: true,
            error: None,
            issued_seq: 0,
            settings,
            palette,
        }
    }

    /// Load the first snapshot and start the refresh timer
    pub fn mount(&mut self, now: Instant) {
        self.refresh();
        self.scheduler.start(self.refresh_interval, now);
    }

    /// Cancel the timer and release every chart session
    pub fn destroy(&mut self) {
        self.scheduler.stop();
        if let Some(cluster) = self.cluster.take() {
            cluster.destroy();
        }
        self.drilldowns.close_all();
    }

    /// Drive timers and chart acquisition; returns true when something was fetched
    pub fn poll(&mut self, now: Instant, now_secs: i64) -> bool {
        let mut fetched = false;
        if self.scheduler.poll(now) {
            self.refresh();
            fetched = true;
        }
        if let Some(cluster) = self.cluster.as_mut() {
            fetched |= cluster.poll(now_secs, &self.service) > 0;
        }
        fetched |= self.drilldowns.poll(now_secs, &self.service) > 0;
        fetched
    }

    /// Fetch a snapshot with the current query state
    pub fn refresh(&mut self) {
        let pending = self.begin_refresh();
        let result = self.service.snapshot(&pending.query);
        self.finish_refresh(pending, result);
    }

    /// Issue a snapshot request; only the latest issued request is applied
    pub fn begin_refresh(&mut self) -> PendingRefresh {
        self.issued_seq += 1;
        self.loading = true;
        tracing::debug!(seq = self.issued_seq, start = self.query.start_offset, "refreshing stats");
        PendingRefresh {
            seq: self.issued_seq,
            query: self.query.clone(),
        }
    }

    /// Apply a snapshot response; returns false when it was stale and discarded
    pub fn finish_refresh(&mut self, pending: PendingRefresh, result: Result<Snapshot>) -> bool {
        if pending.seq != self.issued_seq {
            tracing::debug!(seq = pending.seq, latest = self.issued_seq, "discarding stale snapshot");
            return false;
        }
        self.loading = false;

        match result {
            Ok(snapshot) => {
                tracing::debug!(rows = snapshot.rows.len(), total = snapshot.total_row_count, "stats loaded");
                self.aggregates = Some(aggregate::aggregate(&snapshot));
                self.snapshot = Some(snapshot);
                self.error = None;
                if !self.chart_initialized && !self.window.is_off() {
                    self.build_cluster_chart();
                }
            }
            Err(e) => {
                // Last good table stays on screen
                tracing::warn!(error = %e, "stats refresh failed");
                self.error = Some(e.to_string());
            }
        }
        true
    }

    pub fn on_pagination(&mut self, event: PaginationEvent) {
        self.query.page_length = event.length;
        self.query.start_offset = event.start;
        self.query.current_page = event.current_page;
        self.refresh();
    }

    /// Sort by a column; clicking the current sort column flips its direction
    pub fn sort_by(&mut self, sort_key: &str) -> Result<()> {
        let column = catalog::column_by_sort_key(sort_key)
            .ok_or_else(|| Error::UnknownField(sort_key.to_string()))?;

        if self.query.sort_field == column.sort_key {
            self.query.sort_descending = !self.query.sort_descending;
        } else {
            self.query.sort_field = column.sort_key.to_string();
            self.query.sort_descending = false;
        }
        self.refresh();
        Ok(())
    }

    pub fn set_filter(&mut self, filter: Option<String>) {
        self.query.filter_text = filter.filter(|f| !f.trim().is_empty());
        self.refresh();
    }

    pub fn select_tab(&mut self, tab: Tab, now: Instant) {
        if tab == self.tab {
            return;
        }
        self.tab = tab;

        match tab {
            Tab::Overview => {
                self.refresh();
                self.scheduler.start(self.refresh_interval, now);
            }
            _ => self.scheduler.stop(),
        }
        self.sync_acquisition();
    }

    pub fn set_refresh_interval(&mut self, interval: Duration, now: Instant) {
        self.refresh_interval = interval;
        if self.tab == Tab::Overview {
            self.scheduler.reconfigure(interval, now);
        }
    }

    pub fn set_chart_metric(&mut self, metric: Metric) {
        if metric == self.metric {
            return;
        }
        self.metric = metric;
        self.rebuild_cluster_chart();
    }

    /// Change the chart window; "off" pauses the current chart without dropping it
    pub fn set_chart_window(&mut self, window: ChartWindow) {
        if window == self.window {
            return;
        }
        self.window = window;
        let change = self.gate.set_window_enabled(!window.is_off());
        if window.is_off() {
            self.apply_gate(change);
        } else {
            self.rebuild_cluster_chart();
        }
    }

    pub fn toggle_graphs(&mut self) {
        self.graphs_open = !self.graphs_open;
        let change = self.gate.set_section_open(self.graphs_open);
        self.apply_gate(change);
    }

    pub fn toggle_node_stats(&mut self) {
        self.node_stats_open = !self.node_stats_open;
    }

    pub fn set_page_visible(&mut self, visible: bool) {
        let change = self.gate.set_page_visible(visible);
        self.apply_gate(change);
    }

    /// Expand or collapse a node's drill-down; returns whether it is now expanded
    pub fn toggle_node(&mut self, node_id: &str) -> bool {
        self.drilldowns.toggle(node_id)
    }

    fn rebuild_cluster_chart(&mut self) {
        if let Some(old) = self.cluster.take() {
            old.destroy();
        }
        self.chart_initialized = false;
        if self.snapshot.is_some() && !self.window.is_off() {
            self.build_cluster_chart();
        }
    }

    fn build_cluster_chart(&mut self) {
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        if snapshot.rows.is_empty() {
            // Nothing to chart yet; try again on the next snapshot
            return;
        }
        if let Some(old) = self.cluster.take() {
            old.destroy();
        }
        self.cluster = ClusterChartSession::create(self.metric, self.window, snapshot.node_ids());
        self.chart_initialized = self.cluster.is_some();
        self.sync_acquisition();
    }

    /// Start or stop the cluster chart on a gate transition
    fn apply_gate(&mut self, change: GateChange) {
        let Some(cluster) = self.cluster.as_mut() else {
            return;
        };
        match change {
            GateChange::Opened if self.tab == Tab::Overview => cluster.start(),
            GateChange::Closed => cluster.stop(),
            _ => {}
        }
    }

    /// Run the cluster chart only while the gate is open on the overview tab
    fn sync_acquisition(&mut self) {
        let acquire = self.gate.should_acquire() && self.tab == Tab::Overview;
        if let Some(cluster) = self.cluster.as_mut() {
            match (acquire, cluster.is_running()) {
                (true, false) => cluster.start(),
                (false, true) => cluster.stop(),
                _ => {}
            }
        }
    }

    pub fn service(&self) -> &Q {
        &self.service
    }

    pub fn query(&self) -> &QueryState {
        &self.query
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn aggregates(&self) -> Option<&AggregateResult> {
        self.aggregates.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn window(&self) -> ChartWindow {
        self.window
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    pub fn graphs_open(&self) -> bool {
        self.graphs_open
    }

    pub fn node_stats_open(&self) -> bool {
        self.node_stats_open
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    pub fn gate(&self) -> &VisibilityGate {
        &self.gate
    }

    pub fn cluster(&self) -> Option<&ClusterChartSession> {
        self.cluster.as_ref()
    }

    pub fn chart_initialized(&self) -> bool {
        self.chart_initialized
    }

    pub fn drilldowns(&self) -> &Drilldowns {
        &self.drilldowns
    }

    pub fn settings(&self) -> &UserSettings {
        &self.settings
    }

    pub fn palette(&self) -> &[Color] {
        &self.palette
    }
}
