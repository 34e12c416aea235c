use rusqlite::Connection;

pub const SCHEMA_VERSION: i32 = 1;

/// Create tables if missing; writers and viewers share the same file
pub fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Metadata table
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Capture nodes, identified by name
        CREATE TABLE IF NOT EXISTS nodes (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        -- One row per node per stats interval
        CREATE TABLE IF NOT EXISTS stats (
            node_id INTEGER NOT NULL,
            timestamp INTEGER NOT NULL,
            delta_ms INTEGER NOT NULL,
            monitoring REAL NOT NULL DEFAULT 0,
            free_space_m REAL NOT NULL DEFAULT 0,
            free_space_p REAL NOT NULL DEFAULT 0,
            cpu REAL NOT NULL DEFAULT 0,
            memory REAL NOT NULL DEFAULT 0,
            memory_p REAL NOT NULL DEFAULT 0,
            packet_queue REAL NOT NULL DEFAULT 0,
            delta_packets REAL NOT NULL DEFAULT 0,
            delta_bytes REAL NOT NULL DEFAULT 0,
            delta_sessions REAL NOT NULL DEFAULT 0,
            delta_dropped REAL NOT NULL DEFAULT 0,
            delta_overload_dropped REAL NOT NULL DEFAULT 0,
            delta_es_dropped REAL NOT NULL DEFAULT 0,
            PRIMARY KEY (node_id, timestamp),
            FOREIGN KEY (node_id) REFERENCES nodes(id)
        );

        -- Index for latest-row and range lookups
        CREATE INDEX IF NOT EXISTS idx_stats_time ON stats(timestamp);
        "#,
    )
}

/// Set a metadata key
pub fn set_meta(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES (?, ?)",
        [key, value],
    )?;
    Ok(())
}

/// Get a metadata key
pub fn get_meta(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row("SELECT value FROM meta WHERE key = ?", [key], |row| {
        row.get(0)
    })
    .optional()
}

pub(crate) trait OptionalExt<T> {
    fn optional(self) -> rusqlite::Result<Option<T>>;
}

impl<T> OptionalExt<T> for rusqlite::Result<T> {
    fn optional(self) -> rusqlite::Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
