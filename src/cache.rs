//! Derived SQLite index over the journal.
//!
//! The cache holds nothing the journal does not already encode, except the
//! fingerprint recorded at the last rebuild. Rows are replaced wholesale
//! inside a single transaction; they are never patched. The schema is
//! private to this module.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::{Error, Result};
use crate::journal::Fingerprint;
use crate::task::{Status, TaskRecord};

const FINGERPRINT_KEY: &str = "fingerprint";

fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS tasks (
            id          TEXT PRIMARY KEY,
            title       TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            status      TEXT NOT NULL,
            priority    INTEGER NOT NULL,
            parent      TEXT,
            created     TEXT NOT NULL,
            updated     TEXT NOT NULL,
            closed      TEXT
        );

        CREATE TABLE IF NOT EXISTS deps (
            task_id    TEXT NOT NULL,
            blocked_by TEXT NOT NULL,
            PRIMARY KEY (task_id, blocked_by)
        );

        CREATE TABLE IF NOT EXISTS meta (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
        CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent);
        CREATE INDEX IF NOT EXISTS idx_deps_task ON deps(task_id);
        ",
    )
}

/// The cache file, `index.db` inside the tracker directory.
///
/// The connection is opened lazily; a file that cannot be opened or lacks
/// the expected schema is deleted and recreated rather than trusted.
#[derive(Debug)]
pub struct Cache {
    path: PathBuf,
    conn: Option<Connection>,
}

impl Cache {
    pub fn new(path: PathBuf) -> Self {
        Self { path, conn: None }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_open(path: &Path) -> Result<Connection> {
        let conn = Connection::open(path)?;
        apply_schema(&conn)?;
        Ok(conn)
    }

    fn open_conn(&self) -> Result<Connection> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        match Self::try_open(&self.path) {
            Ok(conn) => Ok(conn),
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "cache file unreadable; recreating"
                );
                let _ = fs::remove_file(&self.path);
                Self::try_open(&self.path)
            }
        }
    }

    fn conn_mut(&mut self) -> Result<&mut Connection> {
        if self.conn.is_none() {
            // The file may have been deleted out-of-band since we last
            // looked; open_conn recreates the schema either way.
            self.conn = Some(self.open_conn()?);
        }
        match self.conn.as_mut() {
            Some(conn) => Ok(conn),
            None => Err(Error::QueryFailed("cache connection unavailable".into())),
        }
    }

    /// Fingerprint recorded at the last rebuild.
    ///
    /// `None` when the cache was never built, or the file is missing,
    /// unreadable, or lacks a fingerprint row - all treated as maximally
    /// stale by the coordinator.
    pub fn stored_fingerprint(&mut self) -> Option<Fingerprint> {
        if !self.path.exists() {
            self.conn = None;
            return None;
        }
        let conn = self.conn_mut().ok()?;
        conn.query_row(
            "SELECT value FROM meta WHERE key = ?1",
            [FINGERPRINT_KEY],
            |row| row.get(0),
        )
        .optional()
        .ok()
        .flatten()
    }

    /// Drop all rows and re-index the given record set under `fingerprint`.
    ///
    /// Runs in a single transaction: a failure partway leaves the previous
    /// rows and fingerprint in place, never a half-built index.
    pub fn rebuild(&mut self, records: &[TaskRecord], fingerprint: &str) -> Result<usize> {
        let conn = self.conn_mut()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM deps", [])?;
        tx.execute("DELETE FROM tasks", [])?;

        {
            let mut task_stmt = tx.prepare(
                "INSERT INTO tasks (id, title, description, status, priority, parent,
                                    created, updated, closed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            let mut dep_stmt =
                tx.prepare("INSERT INTO deps (task_id, blocked_by) VALUES (?1, ?2)")?;

            for record in records {
                task_stmt.execute(rusqlite::params![
                    record.id,
                    record.title,
                    record.description,
                    record.status.as_str(),
                    record.priority,
                    record.parent,
                    record.created.to_rfc3339(),
                    record.updated.to_rfc3339(),
                    record.closed.map(|dt| dt.to_rfc3339()),
                ])?;
                for blocker in &record.blocked_by {
                    dep_stmt.execute(rusqlite::params![record.id, blocker])?;
                }
            }
        }

        tx.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            rusqlite::params![FINGERPRINT_KEY, fingerprint],
        )?;

        tx.commit()?;
        tracing::debug!(tasks = records.len(), "cache rebuilt");
        Ok(records.len())
    }

    /// Remove the stored fingerprint so the next freshness check rebuilds.
    ///
    /// Best-effort: if even that fails the cache file itself is removed.
    /// Either way the cache can no longer claim freshness it does not have.
    pub fn invalidate(&mut self) {
        let cleared = self
            .conn_mut()
            .and_then(|conn| {
                conn.execute("DELETE FROM meta WHERE key = ?1", [FINGERPRINT_KEY])
                    .map_err(Error::from)
            })
            .is_ok();

        if !cleared {
            tracing::warn!(path = %self.path.display(), "removing unwritable cache file");
            self.conn = None;
            let _ = fs::remove_file(&self.path);
        }
    }

    /// Run a read-only query against the current cache content.
    ///
    /// Statement failures surface as `QueryFailed`; the fixed query set in
    /// `queries` should never trigger this in practice.
    pub fn read<T>(&mut self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self.conn_mut()?;
        f(conn).map_err(|err| Error::QueryFailed(err.to_string()))
    }

    /// Drop the connection. Safe to call when nothing was ever opened.
    pub fn close(&mut self) {
        self.conn = None;
    }
}

/// Map a `tasks` row (columns in schema order) back to a `TaskRecord`.
///
/// `blocked_by` lives in the `deps` table and is attached by the caller.
pub(crate) fn task_from_row(row: &Row<'_>) -> rusqlite::Result<TaskRecord> {
    let status_str: String = row.get(3)?;
    let status = Status::parse(&status_str)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(err)))?;
    Ok(TaskRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status,
        priority: row.get(4)?,
        parent: row.get(5)?,
        blocked_by: Vec::new(),
        created: datetime_from_sql(row.get(6)?, 6)?,
        updated: datetime_from_sql(row.get(7)?, 7)?,
        closed: row
            .get::<_, Option<String>>(8)?
            .map(|value| datetime_from_sql(value, 8))
            .transpose()?,
    })
}

fn datetime_from_sql(value: String, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}
