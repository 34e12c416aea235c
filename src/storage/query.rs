use super::schema;
use crate::error::{Error, Result};
use crate::model::{NodeSnapshotRow, QueryState, Snapshot};
use crate::service::{SeriesQuery, SeriesRequest, StatsQuery};
use rusqlite::Connection;
use std::path::Path;

/// Sort keys accepted by the snapshot query, mapped to result columns
const SORT_COLUMNS: &[(&str, &str)] = &[
    ("nodeName", "node_name"),
    ("currentTime", "timestamp"),
    ("monitoring", "monitoring"),
    ("freeSpaceM", "free_space_m"),
    ("cpu", "cpu"),
    ("memory", "memory"),
    ("packetQueue", "packet_queue"),
    ("deltaPackets", "delta_packets_per_sec"),
    ("deltaBytes", "delta_bytes_per_sec"),
    ("deltaSessions", "delta_sessions_per_sec"),
    ("deltaDropped", "delta_dropped_per_sec"),
    ("deltaOverloadDropped", "delta_overload_dropped_per_sec"),
    ("deltaESDropped", "delta_es_dropped_per_sec"),
];

/// Series fields mapped to their per-bucket aggregate.
/// Gauges average, `...PerSec` fields divide by the covered time, and base
/// delta fields sum so a 60s bucket reads as a per-minute count.
const SERIES_FIELDS: &[(&str, &str)] = &[
    ("monitoring", "AVG(monitoring)"),
    ("freeSpaceM", "AVG(free_space_m)"),
    ("freeSpaceP", "AVG(free_space_p)"),
    ("cpu", "AVG(cpu)"),
    ("memory", "AVG(memory)"),
    ("memoryP", "AVG(memory_p)"),
    ("packetQueue", "AVG(packet_queue)"),
    ("deltaPacketsPerSec", "SUM(delta_packets) * 1000.0 / MAX(SUM(delta_ms), 1)"),
    ("deltaBytesPerSec", "SUM(delta_bytes) * 1000.0 / MAX(SUM(delta_ms), 1)"),
    ("deltaSessionsPerSec", "SUM(delta_sessions) * 1000.0 / MAX(SUM(delta_ms), 1)"),
    ("deltaDroppedPerSec", "SUM(delta_dropped) * 1000.0 / MAX(SUM(delta_ms), 1)"),
    (
        "deltaOverloadDroppedPerSec",
        "SUM(delta_overload_dropped) * 1000.0 / MAX(SUM(delta_ms), 1)",
    ),
    ("deltaESDroppedPerSec", "SUM(delta_es_dropped) * 1000.0 / MAX(SUM(delta_ms), 1)"),
    ("deltaPackets", "SUM(delta_packets)"),
    ("deltaBytes", "SUM(delta_bytes)"),
    ("deltaSessions", "SUM(delta_sessions)"),
    ("deltaDropped", "SUM(delta_dropped)"),
    ("deltaOverloadDropped", "SUM(delta_overload_dropped)"),
    ("deltaESDropped", "SUM(delta_es_dropped)"),
];

fn lookup(table: &[(&str, &'static str)], key: &str) -> Result<&'static str> {
    table
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
        .ok_or_else(|| Error::UnknownField(key.to_string()))
}

/// Counts shown on the storage tab
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSummary {
    pub nodes: u64,
    pub samples: u64,
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
    pub created: Option<String>,
}

/// Read side of a stats database; answers snapshot and series queries
pub struct StatsStore {
    conn: Connection,
}

impl StatsStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::create_tables(&conn)?;
        Ok(StatsStore { conn })
    }

    pub fn summary(&self) -> Result<StoreSummary> {
        let nodes: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        let (samples, first, last): (i64, Option<i64>, Option<i64>) = self.conn.query_row(
            "SELECT COUNT(*), MIN(timestamp), MAX(timestamp) FROM stats",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(StoreSummary {
            nodes: nodes as u64,
            samples: samples as u64,
            first_timestamp: first,
            last_timestamp: last,
            created: schema::get_meta(&self.conn, "created")?,
        })
    }
}

impl StatsQuery for StatsStore {
    fn snapshot(&self, query: &QueryState) -> Result<Snapshot> {
        let order_by = lookup(SORT_COLUMNS, &query.sort_field)?;
        let direction = if query.sort_descending { "DESC" } else { "ASC" };
        let filter = query.filter_text.as_deref();

        let total: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*) FROM nodes n
            WHERE EXISTS (SELECT 1 FROM stats s WHERE s.node_id = n.id)
              AND (?1 IS NULL OR instr(lower(n.name), lower(?1)) > 0)
            "#,
            [filter],
            |row| row.get(0),
        )?;

        let sql = format!(
            r#"
            SELECT
                n.name AS node_name,
                s.timestamp,
                s.monitoring,
                s.free_space_m,
                s.free_space_p,
                s.cpu,
                s.memory,
                s.memory_p,
                s.packet_queue,
                s.delta_packets * 1000.0 / MAX(s.delta_ms, 1) AS delta_packets_per_sec,
                s.delta_bytes * 1000.0 / MAX(s.delta_ms, 1) AS delta_bytes_per_sec,
                s.delta_sessions * 1000.0 / MAX(s.delta_ms, 1) AS delta_sessions_per_sec,
                s.delta_dropped * 1000.0 / MAX(s.delta_ms, 1) AS delta_dropped_per_sec,
                s.delta_overload_dropped * 1000.0 / MAX(s.delta_ms, 1) AS delta_overload_dropped_per_sec,
                s.delta_es_dropped * 1000.0 / MAX(s.delta_ms, 1) AS delta_es_dropped_per_sec
            FROM stats s
            JOIN nodes n ON n.id = s.node_id
            WHERE s.timestamp = (SELECT MAX(timestamp) FROM stats WHERE node_id = s.node_id)
              AND (?1 IS NULL OR instr(lower(n.name), lower(?1)) > 0)
            ORDER BY {order_by} {direction}, node_name ASC
            LIMIT ?2 OFFSET ?3
            "#
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params![filter, query.page_length as i64, query.start_offset as i64],
            |row| {
                let name: String = row.get(0)?;
                Ok(NodeSnapshotRow {
                    node_id: name.clone(),
                    node_name: name,
                    current_time: row.get(1)?,
                    monitoring: row.get(2)?,
                    free_space_m: row.get(3)?,
                    free_space_percent: row.get(4)?,
                    cpu: row.get(5)?,
                    memory: row.get(6)?,
                    memory_percent: row.get(7)?,
                    packet_queue: row.get(8)?,
                    delta_packets_per_sec: row.get(9)?,
                    delta_bytes_per_sec: row.get(10)?,
                    delta_sessions_per_sec: row.get(11)?,
                    delta_packet_drops_per_sec: row.get(12)?,
                    delta_overload_drops_per_sec: row.get(13)?,
                    delta_es_drops_per_sec: row.get(14)?,
                })
            },
        )?;

        let mut snapshot = Snapshot {
            rows: Vec::new(),
            total_row_count: total as usize,
        };
        for row in rows {
            snapshot.rows.push(row?);
        }
        Ok(snapshot)
    }
}

impl SeriesQuery for StatsStore {
    fn series(&self, request: &SeriesRequest) -> Result<Vec<f64>> {
        let expr = lookup(SERIES_FIELDS, request.field)?;
        let count = request.sample_count();
        let mut values = vec![f64::NAN; count];
        if count == 0 {
            return Ok(values);
        }

        let sql = format!(
            r#"
            SELECT (s.timestamp - ?2) / ?4 AS bucket, {expr}
            FROM stats s
            JOIN nodes n ON n.id = s.node_id
            WHERE n.name = ?1 AND s.timestamp >= ?2 AND s.timestamp < ?3
            GROUP BY bucket
            ORDER BY bucket ASC
            "#
        );

        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params![request.node_id, request.start, request.stop, request.step],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<f64>>(1)?)),
        )?;

        for row in rows {
            let (bucket, value) = row?;
            if let (Ok(idx), Some(value)) = (usize::try_from(bucket), value) {
                if idx < count {
                    values[idx] = value;
                }
            }
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{NodeSample, StatsWriter};
    use tempfile::TempDir;

    fn sample(node: &str, timestamp: i64, cpu: f64, delta_packets: f64) -> NodeSample {
        NodeSample {
            node: node.to_string(),
            timestamp,
            delta_ms: 1000,
            cpu,
            delta_packets,
            ..Default::default()
        }
    }

    fn seeded() -> (TempDir, StatsStore) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats.db");
        let mut writer = StatsWriter::open(&path).unwrap();
        for t in 0..120 {
            writer.record(sample("cap-a", 1000 + t, 10.0, 100.0));
            writer.record(sample("cap-b", 1000 + t, 30.0, 50.0));
        }
        writer.record(sample("web-c", 1000, 5.0, 1.0));
        writer.flush().unwrap();

        let store = StatsStore::open(&path).unwrap();
        (dir, store)
    }

    #[test]
    fn test_snapshot_latest_row_per_node() {
        let (_dir, store) = seeded();
        let snapshot = store.snapshot(&QueryState::default()).unwrap();

        assert_eq!(snapshot.total_row_count, 3);
        let names: Vec<&str> = snapshot.node_ids().collect();
        assert_eq!(names, vec!["cap-a", "cap-b", "web-c"]);
        assert_eq!(snapshot.rows[0].current_time, 1119);
        assert_eq!(snapshot.rows[0].delta_packets_per_sec, 100.0);
    }

    #[test]
    fn test_snapshot_filter_sort_and_page() {
        let (_dir, store) = seeded();
        let query = QueryState {
            page_length: 1,
            start_offset: 1,
            filter_text: Some("CAP".to_string()),
            sort_field: "cpu".to_string(),
            sort_descending: true,
            current_page: 2,
        };

        let snapshot = store.snapshot(&query).unwrap();
        assert_eq!(snapshot.total_row_count, 2);
        assert_eq!(snapshot.rows.len(), 1);
        assert_eq!(snapshot.rows[0].node_name, "cap-a");
    }

    #[test]
    fn test_unknown_sort_field_rejected() {
        let (_dir, store) = seeded();
        let query = QueryState {
            sort_field: "1; DROP TABLE stats".to_string(),
            ..QueryState::default()
        };
        assert!(matches!(store.snapshot(&query), Err(Error::UnknownField(_))));
    }

    #[test]
    fn test_series_buckets() {
        let (_dir, store) = seeded();
        let request = SeriesRequest {
            node_id: "cap-a".to_string(),
            field: "deltaPackets",
            start: 1000,
            stop: 1240,
            step: 60,
        };

        let values = store.series(&request).unwrap();
        assert_eq!(values.len(), 4);
        assert_eq!(values[0], 6000.0);
        assert_eq!(values[1], 6000.0);
        assert!(values[2].is_nan());
        assert!(values[3].is_nan());

        let per_sec = store
            .series(&SeriesRequest {
                field: "deltaPacketsPerSec",
                ..request.clone()
            })
            .unwrap();
        assert_eq!(per_sec[0], 100.0);
    }

    #[test]
    fn test_unknown_series_field_rejected() {
        let (_dir, store) = seeded();
        let request = SeriesRequest {
            node_id: "cap-a".to_string(),
            field: "nodeName",
            start: 0,
            stop: 60,
            step: 1,
        };
        assert!(store.series(&request).is_err());
    }

    #[test]
    fn test_summary() {
        let (_dir, store) = seeded();
        let summary = store.summary().unwrap();
        assert_eq!(summary.nodes, 3);
        assert_eq!(summary.samples, 241);
        assert_eq!(summary.first_timestamp, Some(1000));
        assert_eq!(summary.last_timestamp, Some(1119));
        assert!(summary.created.is_some());
    }
}
