use crate::aggregate::{self, AggregateResult};
use crate::catalog::{self, COLUMNS, LEADING_COLUMNS, Metric};
use crate::error::Result;
use crate::format;
use crate::model::{QueryState, Snapshot};
use crate::service::StatsQuery;
use crate::settings::Timezone;
use crate::storage::StatsStore;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Table};
use std::collections::BTreeMap;
use std::path::Path;

#[allow(clippy::too_many_arguments)]
pub fn run(
    file: &Path,
    length: usize,
    start: usize,
    sort: &str,
    desc: bool,
    filter: Option<String>,
    json: bool,
    csv: bool,
) -> Result<()> {
    let store = StatsStore::open(file)?;
    let query = QueryState {
        page_length: length,
        start_offset: start,
        filter_text: filter,
        sort_field: sort.to_string(),
        sort_descending: desc,
        current_page: start / length.max(1) + 1,
    };

    let snapshot = store.snapshot(&query)?;
    let aggregates = aggregate::aggregate(&snapshot);

    if json {
        println!("{}", render_json(&snapshot, &aggregates)?);
    } else if csv {
        print!("{}", render_csv(&snapshot, &aggregates));
    } else {
        println!("# {}", file.display());
        println!("# {}", range_header(start, &snapshot));
        println!("{}", render_table(&snapshot, &aggregates));
    }

    Ok(())
}

/// `Nodes 11-20 of 42`, or a plain count when the page is past the end
fn range_header(start: usize, snapshot: &Snapshot) -> String {
    if snapshot.rows.is_empty() {
        return format!("No nodes at offset {} ({} total)", start, snapshot.total_row_count);
    }
    format!(
        "Nodes {}-{} of {}",
        start + 1,
        start + snapshot.rows.len(),
        snapshot.total_row_count
    )
}

fn render_table(snapshot: &Snapshot, aggregates: &AggregateResult) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(
        COLUMNS
            .iter()
            .map(|c| Cell::new(c.name).add_attribute(Attribute::Bold)),
    );

    for row in &snapshot.rows {
        table.add_row(COLUMNS.iter().enumerate().map(|(i, c)| {
            let cell = Cell::new(format::format_cell(row, c, Timezone::Local));
            if i >= LEADING_COLUMNS {
                cell.set_alignment(CellAlignment::Right)
            } else {
                cell
            }
        }));
    }

    for (label, average) in [("Total", false), ("Average", true)] {
        table.add_row(COLUMNS.iter().enumerate().map(|(i, c)| {
            if i == 0 {
                return Cell::new(label).add_attribute(Attribute::Bold);
            }
            let text = match c.metric {
                Some(metric) => format::format_aggregate(aggregates, metric, average),
                None => String::new(),
            };
            Cell::new(text).set_alignment(CellAlignment::Right)
        }));
    }

    table
}

fn render_json(snapshot: &Snapshot, aggregates: &AggregateResult) -> Result<String> {
    let by_field = |values: &BTreeMap<Metric, f64>| -> BTreeMap<&'static str, f64> {
        values.iter().map(|(m, v)| (m.field(), *v)).collect()
    };

    let value = serde_json::json!({
        "rows": snapshot.rows,
        "totalRowCount": snapshot.total_row_count,
        "totals": by_field(&aggregates.totals),
        "averages": by_field(&aggregates.averages),
    });
    serde_json::to_string_pretty(&value)
        .map_err(|e| crate::Error::Query(format!("JSON encoding failed: {}", e)))
}

fn render_csv(snapshot: &Snapshot, aggregates: &AggregateResult) -> String {
    let metrics: Vec<Metric> = catalog::aggregable_metrics().collect();
    let mut out = String::from("row,nodeName,currentTime");
    for metric in &metrics {
        out.push(',');
        out.push_str(metric.field());
    }
    out.push('\n');

    let number = |v: f64| if v.is_finite() { format!("{}", v) } else { String::new() };

    for row in &snapshot.rows {
        out.push_str(&format!(",\"{}\",{}", row.node_name.replace('"', "\"\""), row.current_time));
        for metric in &metrics {
            out.push(',');
            out.push_str(&number(row.value(*metric)));
        }
        out.push('\n');
    }

    for (label, values) in [("Total", &aggregates.totals), ("Average", &aggregates.averages)] {
        out.push_str(label);
        out.push_str(",,");
        for metric in &metrics {
            out.push(',');
            out.push_str(&number(values.get(metric).copied().unwrap_or(f64::NAN)));
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeSnapshotRow;

    fn sample() -> Snapshot {
        let row = |name: &str, cpu: f64| NodeSnapshotRow {
            node_id: name.to_string(),
            node_name: name.to_string(),
            cpu,
            ..Default::default()
        };
        Snapshot {
            rows: vec![row("cap-1", 10.0), row("cap-2", 30.0)],
            total_row_count: 2,
        }
    }

    #[test]
    fn test_json_keys_by_field() {
        let snapshot = sample();
        let text = render_json(&snapshot, &aggregate::aggregate(&snapshot)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["totalRowCount"], 2);
        assert_eq!(value["totals"]["cpu"], 40.0);
        assert_eq!(value["averages"]["cpu"], 20.0);
        assert_eq!(value["rows"][1]["nodeName"], "cap-2");
    }

    #[test]
    fn test_range_header() {
        let snapshot = sample();
        assert_eq!(range_header(0, &snapshot), "Nodes 1-2 of 2");

        let past_end = Snapshot {
            rows: Vec::new(),
            total_row_count: 3,
        };
        assert_eq!(range_header(99, &past_end), "No nodes at offset 99 (3 total)");
    }

    #[test]
    fn test_csv_empty_average_is_blank() {
        let empty = Snapshot::default();
        let text = render_csv(&empty, &aggregate::aggregate(&empty));
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("row,nodeName,currentTime,monitoring"));
        assert!(lines[2].starts_with("Average,,,"));
        assert!(lines[2].trim_end_matches(',').ends_with("Average"));
    }
}
