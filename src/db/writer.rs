//! Batched SQLite export writer
//!
//! Entries, resource nodes and failures are buffered and written in
//! transactions of `batch_size` rows with cached prepared statements.
//! Indexes are built once at `finish`.

use crate::db::schema::{self, keys};
use crate::error::{DbError, DbResult, ServiceError};
use crate::service::DecodedEntry;
use crate::walker::{NodeFailure, NodeId, ResourceTree};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default rows per transaction
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Statistics about write operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub entries_written: u64,
    pub resources_written: u64,
    pub failures_written: u64,
    pub batches_committed: u64,
}

struct EntryRow {
    kind: &'static str,
    target: String,
    name: String,
    detail: String,
}

struct FailureRow {
    node_id: Option<i64>,
    target: String,
    code: u32,
    message: String,
}

/// Writes one run (a flat enumeration or a walk) to a SQLite file
pub struct ExportWriter {
    conn: Connection,
    db_path: PathBuf,
    batch_size: usize,
    entries: Vec<EntryRow>,
    failures: Vec<FailureRow>,
    stats: WriterStats,
    started: DateTime<Utc>,
}

impl ExportWriter {
    /// Create the database and record the run's kind and target
    pub fn create(db_path: &Path, kind: &str, target: &str, batch_size: usize) -> DbResult<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(DbError::CreateFailed {
                    path: db_path.to_path_buf(),
                    reason: format!("directory '{}' does not exist", parent.display()),
                });
            }
        }

        let conn = Connection::open(db_path)?;
        schema::create_database(&conn)?;

        let started = Utc::now();
        schema::set_walk_info(&conn, keys::SCHEMA_VERSION, &schema::SCHEMA_VERSION.to_string())?;
        schema::set_walk_info(&conn, keys::TOOL_VERSION, env!("CARGO_PKG_VERSION"))?;
        schema::set_walk_info(&conn, keys::KIND, kind)?;
        schema::set_walk_info(&conn, keys::TARGET, target)?;
        schema::set_walk_info(&conn, keys::START_TIME, &started.to_rfc3339())?;
        schema::set_walk_info(&conn, keys::STATUS, "running")?;

        info!("Exporting to {}", db_path.display());
        Ok(Self {
            conn,
            db_path: db_path.to_path_buf(),
            batch_size: batch_size.max(1),
            entries: Vec::with_capacity(batch_size),
            failures: Vec::new(),
            stats: WriterStats::default(),
            started,
        })
    }

    /// Queue one decoded entry
    pub fn add_entry(&mut self, target: &str, entry: &DecodedEntry) -> DbResult<()> {
        self.entries.push(EntryRow {
            kind: entry.label(),
            target: target.to_string(),
            name: entry.name().to_string(),
            detail: serde_json::to_string(entry)?,
        });

        if self.entries.len() >= self.batch_size {
            self.flush_entries()?;
        }
        Ok(())
    }

    /// Record a failed enumeration
    pub fn add_failure(&mut self, node: Option<NodeId>, target: &str, error: &ServiceError) {
        self.failures.push(FailureRow {
            node_id: node.map(node_row_id),
            target: target.to_string(),
            code: error.code(),
            message: error.to_string(),
        });
    }

    /// Write a walk's tree and its failures
    pub fn write_walk(&mut self, tree: &ResourceTree, failures: &[NodeFailure]) -> DbResult<()> {
        for chunk in tree.nodes().chunks(self.batch_size) {
            let tx = self.conn.unchecked_transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO resources (id, parent_id, remote_name, local_name, provider, comment,
                                            scope, resource_type, display_type, usage, depth, expansion)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                )?;

                for node in chunk {
                    let r = &node.resource;
                    stmt.execute(params![
                        node_row_id(node.id),
                        node.parent.map(node_row_id),
                        r.remote_name,
                        r.local_name,
                        r.provider,
                        r.comment,
                        r.scope.as_u32(),
                        r.resource_type.as_u32(),
                        r.display_type.as_u32(),
                        r.usage.bits(),
                        node.depth as i64,
                        node.expansion.as_str(),
                    ])?;
                    self.stats.resources_written += 1;
                }
            }
            tx.commit()?;
            self.stats.batches_committed += 1;
        }

        for failure in failures {
            let target = failure
                .resource
                .as_ref()
                .map_or_else(|| "(scope root)".to_string(), |r| r.remote_name.clone());
            self.add_failure(failure.node, &target, &failure.error);
        }
        Ok(())
    }

    fn flush_entries(&mut self) -> DbResult<()> {
        if self.entries.is_empty() {
            return Ok(());
        }

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO entries (kind, target, name, detail) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for row in self.entries.drain(..) {
                stmt.execute(params![row.kind, row.target, row.name, row.detail])?;
                self.stats.entries_written += 1;
            }
        }
        tx.commit()?;
        self.stats.batches_committed += 1;
        debug!("Committed entry batch ({} total)", self.stats.entries_written);
        Ok(())
    }

    fn flush_failures(&mut self) -> DbResult<()> {
        if self.failures.is_empty() {
            return Ok(());
        }

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO failures (node_id, target, code, message) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for row in self.failures.drain(..) {
                stmt.execute(params![row.node_id, row.target, row.code, row.message])?;
                self.stats.failures_written += 1;
            }
        }
        tx.commit()?;
        self.stats.batches_committed += 1;
        Ok(())
    }

    /// Flush, build indexes and record the final status
    pub fn finish(mut self) -> DbResult<WriterStats> {
        self.flush_entries()?;
        self.flush_failures()?;

        schema::create_indexes(&self.conn)?;

        let ended = Utc::now();
        let duration = (ended - self.started).num_milliseconds() as f64 / 1000.0;
        let status = if self.stats.failures_written == 0 {
            "completed"
        } else {
            "partial"
        };

        schema::set_walk_info(&self.conn, keys::END_TIME, &ended.to_rfc3339())?;
        schema::set_walk_info(&self.conn, keys::DURATION_SECS, &format!("{:.3}", duration))?;
        schema::set_walk_info(
            &self.conn,
            keys::TOTAL_ENTRIES,
            &self.stats.entries_written.to_string(),
        )?;
        schema::set_walk_info(
            &self.conn,
            keys::TOTAL_RESOURCES,
            &self.stats.resources_written.to_string(),
        )?;
        schema::set_walk_info(
            &self.conn,
            keys::ERROR_COUNT,
            &self.stats.failures_written.to_string(),
        )?;
        schema::set_walk_info(&self.conn, keys::STATUS, status)?;

        schema::optimize_for_reads(&self.conn)?;
        info!(
            "Export complete: {} ({} entries, {} resources)",
            self.db_path.display(),
            self.stats.entries_written,
            self.stats.resources_written
        );
        Ok(self.stats)
    }

    /// Get the database path
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

fn node_row_id(id: NodeId) -> i64 {
    id.index() as i64 + 1
}
