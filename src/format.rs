//! Display formatting shared by the dashboard and the `snapshot` command.

use crate::aggregate::AggregateResult;
use crate::catalog::{Metric, MetricColumn};
use crate::model::NodeSnapshotRow;
use crate::settings::Timezone;

/// Compact count: 950, 12.3k, 4.5M, 1.2G
pub fn format_count(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e9 {
        format!("{:.1}G", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.1}M", value / 1e6)
    } else if abs >= 1e4 {
        format!("{:.1}k", value / 1e3)
    } else if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.1}", value)
    }
}

/// Binary byte size: 512B, 1.5K, 3.2M, 7.9G, 1.1T
pub fn format_bytes(bytes: f64) -> String {
    const UNITS: [&str; 5] = ["B", "K", "M", "G", "T"];
    let mut value = bytes;
    let mut unit = 0;
    while value.abs() >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{:.0}{}", value, UNITS[unit])
    } else {
        format!("{:.1}{}", value, UNITS[unit])
    }
}

/// Format one metric value; non-finite values (empty averages) are blank
pub fn format_metric(metric: Metric, value: f64) -> String {
    if !value.is_finite() {
        return String::new();
    }
    match metric {
        Metric::Cpu | Metric::MemoryPercent | Metric::FreeSpacePercent => format!("{:.1}%", value),
        Metric::Memory => format_bytes(value),
        Metric::FreeSpace => format_bytes(value * 1024.0 * 1024.0),
        _ => format_count(value),
    }
}

/// Percentage shown next to a column's value, if it has one
pub fn companion(metric: Metric) -> Option<Metric> {
    match metric {
        Metric::Memory => Some(Metric::MemoryPercent),
        Metric::FreeSpace => Some(Metric::FreeSpacePercent),
        _ => None,
    }
}

/// Text for one table cell of a node row
pub fn format_cell(row: &NodeSnapshotRow, column: &MetricColumn, timezone: Timezone) -> String {
    match (column.metric, column.sort_key) {
        (Some(metric), _) => format_with_companion(metric, |m| Some(row.value(m))),
        (None, "nodeName") => row.node_name.clone(),
        (None, "currentTime") => timezone.format(row.current_time),
        _ => String::new(),
    }
}

/// `value` plus its companion percentage, e.g. `1.5G (42.0%)`
pub fn format_with_companion(metric: Metric, lookup: impl Fn(Metric) -> Option<f64>) -> String {
    let Some(value) = lookup(metric) else {
        return String::new();
    };
    let text = format_metric(metric, value);
    match companion(metric).and_then(&lookup) {
        Some(pct) if pct.is_finite() && !text.is_empty() => {
            format!("{} ({})", text, format_metric(Metric::MemoryPercent, pct))
        }
        _ => text,
    }
}

/// Total or average of one column, with its companion percentage averaged
pub fn format_aggregate(aggregates: &AggregateResult, metric: Metric, average: bool) -> String {
    format_with_companion(metric, |m| {
        if average || m != metric {
            Some(aggregates.average(m).unwrap_or(f64::NAN))
        } else {
            aggregates.total(m)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::COLUMNS;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(950.0), "950");
        assert_eq!(format_count(12_345.0), "12.3k");
        assert_eq!(format_count(4_500_000.0), "4.5M");
        assert_eq!(format_count(2.3), "2.3");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512.0), "512B");
        assert_eq!(format_bytes(1536.0), "1.5K");
        assert_eq!(format_bytes(3.0 * 1024.0 * 1024.0 * 1024.0), "3.0G");
    }

    #[test]
    fn test_nan_is_blank() {
        assert_eq!(format_metric(Metric::Cpu, f64::NAN), "");
        assert_eq!(format_with_companion(Metric::Memory, |_| Some(f64::NAN)), "");
    }

    #[test]
    fn test_aggregate_cells() {
        let row = |name: &str, cpu: f64| NodeSnapshotRow {
            node_id: name.to_string(),
            node_name: name.to_string(),
            cpu,
            ..Default::default()
        };
        let snapshot = crate::model::Snapshot {
            rows: vec![row("cap-1", 10.0), row("cap-2", 30.0)],
            total_row_count: 2,
        };
        let aggregates = crate::aggregate::aggregate(&snapshot);
        assert_eq!(format_aggregate(&aggregates, Metric::Cpu, false), "40.0%");
        assert_eq!(format_aggregate(&aggregates, Metric::Cpu, true), "20.0%");

        let empty = crate::aggregate::aggregate(&crate::model::Snapshot::default());
        assert_eq!(format_aggregate(&empty, Metric::Cpu, true), "");
        assert_eq!(format_aggregate(&empty, Metric::Cpu, false), "0.0%");
    }

    #[test]
    fn test_row_cells() {
        let row = NodeSnapshotRow {
            node_id: "cap-1".to_string(),
            node_name: "cap-1".to_string(),
            memory: 2048.0,
            memory_percent: 12.5,
            cpu: 33.0,
            ..Default::default()
        };

        let cells: Vec<String> = COLUMNS
            .iter()
            .map(|c| format_cell(&row, c, Timezone::Gmt))
            .collect();
        assert_eq!(cells[0], "");
        assert_eq!(cells[1], "cap-1");
        assert_eq!(cells[2], "1970/01/01 00:00:00Z");
        assert_eq!(cells[5], "33.0%");
        assert_eq!(cells[6], "2.0K (12.5%)");
    }
}
