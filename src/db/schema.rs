//! Database schema definitions and creation
//!
//! This module defines the SQLite schema for exported enumeration results
//! and resource walks, and provides functions to create and configure the
//! database.

use crate::error::DbResult;
use rusqlite::Connection;

/// Current schema version for migrations
pub const SCHEMA_VERSION: u32 = 1;

/// Flat enumeration entries; `detail` holds the entry as JSON
const CREATE_ENTRIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY,
    kind TEXT NOT NULL,           -- account, group, share, session, ...
    target TEXT NOT NULL,         -- server or domain enumerated
    name TEXT NOT NULL,
    detail TEXT NOT NULL
)
"#;

/// Resource tree nodes; ids are tree node index + 1
const CREATE_RESOURCES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS resources (
    id INTEGER PRIMARY KEY,
    parent_id INTEGER,
    remote_name TEXT NOT NULL,
    local_name TEXT,
    provider TEXT,
    comment TEXT,
    scope INTEGER NOT NULL,
    resource_type INTEGER NOT NULL,
    display_type INTEGER NOT NULL,
    usage INTEGER NOT NULL,       -- 0x1 connectable, 0x2 container
    depth INTEGER NOT NULL,       -- roots are depth 1
    expansion TEXT NOT NULL,      -- leaf, expanded, truncated, excluded, revisited, failed

    FOREIGN KEY (parent_id) REFERENCES resources(id)
)
"#;

/// Enumerations that failed; `node_id` is NULL for a scope root
const CREATE_FAILURES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS failures (
    id INTEGER PRIMARY KEY,
    node_id INTEGER,
    target TEXT NOT NULL,
    code INTEGER NOT NULL,
    message TEXT NOT NULL
)
"#;

/// SQL to create run metadata table
const CREATE_WALK_INFO_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS walk_info (
    key TEXT PRIMARY KEY,
    value TEXT
)
"#;

/// SQL to create indexes for common queries
const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_entries_kind ON entries(kind)",
    "CREATE INDEX IF NOT EXISTS idx_entries_name ON entries(name)",
    "CREATE INDEX IF NOT EXISTS idx_resources_parent ON resources(parent_id)",
    "CREATE INDEX IF NOT EXISTS idx_resources_depth ON resources(depth)",
    "CREATE INDEX IF NOT EXISTS idx_resources_name ON resources(remote_name)",
];

/// SQLite pragmas for write performance
const WRITE_PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = OFF;
PRAGMA temp_store = MEMORY;
PRAGMA page_size = 4096;
"#;

/// SQLite pragmas for read-optimized queries (applied after export completes)
const READ_PRAGMAS: &str = r#"
PRAGMA synchronous = FULL;
"#;

/// Create and configure a new database for writing
pub fn create_database(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(WRITE_PRAGMAS)?;

    conn.execute(CREATE_ENTRIES_TABLE, [])?;
    conn.execute(CREATE_RESOURCES_TABLE, [])?;
    conn.execute(CREATE_FAILURES_TABLE, [])?;
    conn.execute(CREATE_WALK_INFO_TABLE, [])?;

    Ok(())
}

/// Create indexes (called after export completes for better insert performance)
pub fn create_indexes(conn: &Connection) -> DbResult<()> {
    for sql in CREATE_INDEXES {
        conn.execute(sql, [])?;
    }
    Ok(())
}

/// Apply read-optimized settings
pub fn optimize_for_reads(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(READ_PRAGMAS)?;
    conn.execute("ANALYZE", [])?;
    Ok(())
}

/// Store run metadata
pub fn set_walk_info(conn: &Connection, key: &str, value: &str) -> DbResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO walk_info (key, value) VALUES (?1, ?2)",
        [key, value],
    )?;
    Ok(())
}

/// Get run metadata
pub fn get_walk_info(conn: &Connection, key: &str) -> DbResult<Option<String>> {
    let result = conn.query_row(
        "SELECT value FROM walk_info WHERE key = ?1",
        [key],
        |row| row.get(0),
    );

    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Metadata keys written to `walk_info`
pub mod keys {
    /// Record kind enumerated ("resource" for walks)
    pub const KIND: &str = "kind";

    /// Server, domain or network scope enumerated
    pub const TARGET: &str = "target";

    /// Timestamp when the run started (RFC 3339)
    pub const START_TIME: &str = "start_time";

    /// Timestamp when the run completed (RFC 3339)
    pub const END_TIME: &str = "end_time";

    /// Total duration in seconds
    pub const DURATION_SECS: &str = "duration_secs";

    /// Entries written
    pub const TOTAL_ENTRIES: &str = "total_entries";

    /// Resource nodes written
    pub const TOTAL_RESOURCES: &str = "total_resources";

    /// Failures recorded
    pub const ERROR_COUNT: &str = "error_count";

    /// Schema version
    pub const SCHEMA_VERSION: &str = "schema_version";

    /// Tool version
    pub const TOOL_VERSION: &str = "tool_version";

    /// Run status: "running", "completed", "partial"
    pub const STATUS: &str = "status";
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_create_database() {
        let conn = Connection::open_in_memory().unwrap();
        create_database(&conn).unwrap();

        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table'
                 AND name IN ('entries', 'resources', 'failures', 'walk_info')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn test_walk_info() {
        let conn = Connection::open_in_memory().unwrap();
        create_database(&conn).unwrap();

        set_walk_info(&conn, keys::KIND, "share").unwrap();
        assert_eq!(
            get_walk_info(&conn, keys::KIND).unwrap(),
            Some("share".to_string())
        );
        assert_eq!(get_walk_info(&conn, "nonexistent").unwrap(), None);
    }

    #[test]
    fn test_create_indexes() {
        let conn = Connection::open_in_memory().unwrap();
        create_database(&conn).unwrap();
        create_indexes(&conn).unwrap();

        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 5);
    }
}
