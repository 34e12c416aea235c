use super::schema::{self, SCHEMA_VERSION};
use crate::error::Result;
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::Path;

/// Raw stats reported by one node for one interval
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSample {
    pub node: String,
    /// Unix seconds at the end of the interval
    pub timestamp: i64,
    /// Interval length the deltas cover
    pub delta_ms: i64,
    pub monitoring: f64,
    pub free_space_m: f64,
    pub free_space_p: f64,
    pub cpu: f64,
    pub memory: f64,
    pub memory_p: f64,
    pub packet_queue: f64,
    pub delta_packets: f64,
    pub delta_bytes: f64,
    pub delta_sessions: f64,
    pub delta_dropped: f64,
    pub delta_overload_dropped: f64,
    pub delta_es_dropped: f64,
}

/// Appends node stats to a stats database
pub struct StatsWriter {
    conn: Connection,
    pending: Vec<NodeSample>,
    /// Cache: node name -> node id
    node_cache: HashMap<String, i64>,
}

impl StatsWriter {
    /// Open (or create) a stats database for writing
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for concurrent reads during writes
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::create_tables(&conn)?;
        if schema::get_meta(&conn, "created")?.is_none() {
            schema::set_meta(&conn, "created", &chrono::Utc::now().to_rfc3339())?;
        }
        schema::set_meta(&conn, "version", &SCHEMA_VERSION.to_string())?;

        Ok(StatsWriter {
            conn,
            pending: Vec::new(),
            node_cache: HashMap::new(),
        })
    }

    fn node_id(&mut self, name: &str) -> Result<i64> {
        if let Some(&id) = self.node_cache.get(name) {
            return Ok(id);
        }

        self.conn
            .execute("INSERT OR IGNORE INTO nodes (name) VALUES (?)", [name])?;
        let id: i64 = self
            .conn
            .query_row("SELECT id FROM nodes WHERE name = ?", [name], |row| row.get(0))?;

        self.node_cache.insert(name.to_string(), id);
        Ok(id)
    }

    /// Queue a sample until the next flush
    pub fn record(&mut self, sample: NodeSample) {
        self.pending.push(sample);
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Write all queued samples in one transaction
    pub fn flush(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        // The queue is only cleared once the transaction commits
        let names: Vec<String> = self.pending.iter().map(|s| s.node.clone()).collect();
        let mut ids = Vec::with_capacity(names.len());
        for name in &names {
            ids.push(self.node_id(name)?);
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                r#"
                INSERT OR REPLACE INTO stats (
                    node_id, timestamp, delta_ms, monitoring, free_space_m, free_space_p,
                    cpu, memory, memory_p, packet_queue, delta_packets, delta_bytes,
                    delta_sessions, delta_dropped, delta_overload_dropped, delta_es_dropped
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )?;

            for (sample, node_id) in self.pending.iter().zip(ids) {
                stmt.execute(rusqlite::params![
                    node_id,
                    sample.timestamp,
                    sample.delta_ms,
                    sample.monitoring,
                    sample.free_space_m,
                    sample.free_space_p,
                    sample.cpu,
                    sample.memory,
                    sample.memory_p,
                    sample.packet_queue,
                    sample.delta_packets,
                    sample.delta_bytes,
                    sample.delta_sessions,
                    sample.delta_dropped,
                    sample.delta_overload_dropped,
                    sample.delta_es_dropped,
                ])?;
            }
        }
        tx.commit()?;

        let written = self.pending.len();
        self.pending.clear();
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(node: &str, timestamp: i64) -> NodeSample {
        NodeSample {
            node: node.to_string(),
            timestamp,
            delta_ms: 1000,
            cpu: 12.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_flush_writes_and_clears_queue() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = StatsWriter::open(&dir.path().join("stats.db")).unwrap();
        writer.record(sample("cap-1", 1000));
        writer.record(sample("cap-2", 1000));

        assert_eq!(writer.flush().unwrap(), 2);
        assert_eq!(writer.pending(), 0);
        assert_eq!(writer.flush().unwrap(), 0);
    }

    #[test]
    fn test_failed_flush_keeps_queue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.db");
        let mut writer = StatsWriter::open(&path).unwrap();
        writer.record(sample("cap-1", 1000));

        let other = Connection::open(&path).unwrap();
        other.execute_batch("ALTER TABLE stats RENAME TO stats_moved").unwrap();
        assert!(writer.flush().is_err());
        assert_eq!(writer.pending(), 1);

        other.execute_batch("ALTER TABLE stats_moved RENAME TO stats").unwrap();
        assert_eq!(writer.flush().unwrap(), 1);
        assert_eq!(writer.pending(), 0);

        let rows: i64 = other
            .query_row("SELECT COUNT(*) FROM stats", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }
}
