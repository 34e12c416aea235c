//! Static table of the stats columns shown on the dashboard.
//!
//! Every column carries its query metadata up front: the sort key understood
//! by the stats query service, the data field holding the value in a snapshot
//! row, and the label/field pair used by the per-node drill-down chart. Rate
//! columns (`.../s`) map to a base delta field whose drill-down samples are
//! summed per minute instead of averaged per second.

/// A numeric per-node value carried by every snapshot row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    Sessions,
    FreeSpace,
    Cpu,
    Memory,
    PacketQueue,
    PacketsPerSec,
    BytesPerSec,
    SessionsPerSec,
    PacketDropsPerSec,
    OverloadDropsPerSec,
    EsDropsPerSec,
    MemoryPercent,
    FreeSpacePercent,
}

/// Label and query field used when a column is charted in a node drill-down
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrilldownField {
    pub label: &'static str,
    pub field: &'static str,
}

/// One displayable column of the stats table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetricColumn {
    pub name: &'static str,
    /// Key sent to the stats query service; empty when the column can't sort
    pub sort_key: &'static str,
    /// Field holding the value in a row, when it differs from `sort_key`
    pub data_field: Option<&'static str>,
    pub aggregable: bool,
    pub metric: Option<Metric>,
    pub drilldown: Option<DrilldownField>,
}

impl MetricColumn {
    pub fn field(&self) -> &'static str {
        self.data_field.unwrap_or(self.sort_key)
    }

    pub fn sortable(&self) -> bool {
        !self.sort_key.is_empty()
    }
}

/// Leading columns (row label, node, time) that are never aggregated
pub const LEADING_COLUMNS: usize = 3;

const fn label(name: &'static str) -> MetricColumn {
    MetricColumn {
        name,
        sort_key: "",
        data_field: None,
        aggregable: false,
        metric: None,
        drilldown: None,
    }
}

const fn plain(name: &'static str, sort_key: &'static str) -> MetricColumn {
    MetricColumn {
        name,
        sort_key,
        data_field: None,
        aggregable: false,
        metric: None,
        drilldown: None,
    }
}

const fn gauge(name: &'static str, sort_key: &'static str, metric: Metric) -> MetricColumn {
    MetricColumn {
        name,
        sort_key,
        data_field: None,
        aggregable: true,
        metric: Some(metric),
        drilldown: Some(DrilldownField { label: name, field: sort_key }),
    }
}

const fn rate(
    name: &'static str,
    per_minute: &'static str,
    sort_key: &'static str,
    data_field: &'static str,
    metric: Metric,
) -> MetricColumn {
    MetricColumn {
        name,
        sort_key,
        data_field: Some(data_field),
        aggregable: true,
        metric: Some(metric),
        drilldown: Some(DrilldownField { label: per_minute, field: sort_key }),
    }
}

/// All table columns in display order
pub static COLUMNS: [MetricColumn; 14] = [
    label(""),
    plain("Node", "nodeName"),
    plain("Time", "currentTime"),
    gauge("Sessions", "monitoring", Metric::Sessions),
    gauge("Free Space", "freeSpaceM", Metric::FreeSpace),
    gauge("CPU", "cpu", Metric::Cpu),
    gauge("Memory", "memory", Metric::Memory),
    gauge("Packet Q", "packetQueue", Metric::PacketQueue),
    rate("Packet/s", "Packet/m", "deltaPackets", "deltaPacketsPerSec", Metric::PacketsPerSec),
    rate("Bytes/s", "Bytes/m", "deltaBytes", "deltaBytesPerSec", Metric::BytesPerSec),
    rate("Sessions/s", "Sessions/m", "deltaSessions", "deltaSessionsPerSec", Metric::SessionsPerSec),
    rate(
        "Packet Drops/s",
        "Packet Drops/m",
        "deltaDropped",
        "deltaDroppedPerSec",
        Metric::PacketDropsPerSec,
    ),
    rate(
        "Overload Drops/s",
        "Overload Drops/m",
        "deltaOverloadDropped",
        "deltaOverloadDroppedPerSec",
        Metric::OverloadDropsPerSec,
    ),
    rate(
        "ES Drops/s",
        "ES Drops/m",
        "deltaESDropped",
        "deltaESDroppedPerSec",
        Metric::EsDropsPerSec,
    ),
];

/// Ratios derived per row that are aggregated but have no column of their own
pub const DERIVED: [Metric; 2] = [Metric::MemoryPercent, Metric::FreeSpacePercent];

/// Columns that carry a numeric metric, in display order
pub fn aggregable_columns() -> impl Iterator<Item = &'static MetricColumn> {
    COLUMNS.iter().skip(LEADING_COLUMNS).filter(|c| c.aggregable)
}

/// Every aggregated metric: column metrics in display order, then derived ratios
pub fn aggregable_metrics() -> impl Iterator<Item = Metric> {
    aggregable_columns()
        .filter_map(|c| c.metric)
        .chain(DERIVED)
}

/// Metrics offered in the cluster chart's metric menu
pub fn chartable_metrics() -> Vec<Metric> {
    aggregable_columns().filter_map(|c| c.metric).collect()
}

impl Metric {
    /// Field name understood by the query services
    pub fn field(self) -> &'static str {
        match self {
            Metric::MemoryPercent => "memoryP",
            Metric::FreeSpacePercent => "freeSpaceP",
            _ => self.column().map(MetricColumn::field).unwrap_or_default(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::MemoryPercent => "Memory %",
            Metric::FreeSpacePercent => "Free Space %",
            _ => self.column().map(|c| c.name).unwrap_or_default(),
        }
    }

    pub fn column(self) -> Option<&'static MetricColumn> {
        COLUMNS.iter().find(|c| c.metric == Some(self))
    }

    pub fn from_field(field: &str) -> Option<Metric> {
        aggregable_metrics().find(|m| m.field() == field)
    }
}

/// Find a sortable column by its sort key
pub fn column_by_sort_key(key: &str) -> Option<&'static MetricColumn> {
    COLUMNS.iter().find(|c| c.sortable() && c.sort_key == key)
}
