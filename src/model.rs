use crate::catalog::Metric;
use serde::Serialize;

/// Node identity as reported by the stats query service
pub type NodeId = String;

/// Current values for one node, as of one refresh
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshotRow {
    #[serde(rename = "id")]
    pub node_id: NodeId,
    pub node_name: String,
    /// Unix seconds of the node's latest sample
    pub current_time: i64,
    pub monitoring: f64,
    pub free_space_m: f64,
    pub cpu: f64,
    pub memory: f64,
    pub packet_queue: f64,
    pub delta_packets_per_sec: f64,
    pub delta_bytes_per_sec: f64,
    pub delta_sessions_per_sec: f64,
    #[serde(rename = "deltaDroppedPerSec")]
    pub delta_packet_drops_per_sec: f64,
    #[serde(rename = "deltaOverloadDroppedPerSec")]
    pub delta_overload_drops_per_sec: f64,
    #[serde(rename = "deltaESDroppedPerSec")]
    pub delta_es_drops_per_sec: f64,
    #[serde(rename = "memoryP")]
    pub memory_percent: f64,
    #[serde(rename = "freeSpaceP")]
    pub free_space_percent: f64,
}

impl NodeSnapshotRow {
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Sessions => self.monitoring,
            Metric::FreeSpace => self.free_space_m,
            Metric::Cpu => self.cpu,
            Metric::Memory => self.memory,
            Metric::PacketQueue => self.packet_queue,
            Metric::PacketsPerSec => self.delta_packets_per_sec,
            Metric::BytesPerSec => self.delta_bytes_per_sec,
            Metric::SessionsPerSec => self.delta_sessions_per_sec,
            Metric::PacketDropsPerSec => self.delta_packet_drops_per_sec,
            Metric::OverloadDropsPerSec => self.delta_overload_drops_per_sec,
            Metric::EsDropsPerSec => self.delta_es_drops_per_sec,
            Metric::MemoryPercent => self.memory_percent,
            Metric::FreeSpacePercent => self.free_space_percent,
        }
    }
}

/// One atomic fetch of per-node metrics; replaced wholesale on the next refresh
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub rows: Vec<NodeSnapshotRow>,
    /// Rows matching the filter across all pages
    pub total_row_count: usize,
}

impl Snapshot {
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.node_id.as_str())
    }
}

/// Paging, sorting, and filtering sent with every snapshot request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    pub page_length: usize,
    pub start_offset: usize,
    pub filter_text: Option<String>,
    pub sort_field: String,
    pub sort_descending: bool,
    pub current_page: usize,
}

impl Default for QueryState {
    fn default() -> Self {
        QueryState {
            page_length: 10,
            start_offset: 0,
            filter_text: None,
            sort_field: "nodeName".to_string(),
            sort_descending: false,
            current_page: 1,
        }
    }
}

/// Emitted by the pager when the user changes page or page length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationEvent {
    pub length: usize,
    pub start: usize,
    pub current_page: usize,
}

impl PaginationEvent {
    /// Event for moving to `page` (1-based) at the given page length
    pub fn to_page(length: usize, page: usize) -> Self {
        let page = page.max(1);
        PaginationEvent {
            length,
            start: (page - 1) * length,
            current_page: page,
        }
    }
}
