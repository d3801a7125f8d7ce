//! Store coordinator: the single entry point for reading and mutating
//! the task set.
//!
//! Every mutation is load-all / transform / validate / replace-all /
//! rebuild under the tracker's exclusive lock. Every query first proves
//! the cache's fingerprint matches the journal's, rebuilding under the
//! same lock when it does not, so a reader never observes a cache
//! inconsistent with the journal.

use std::fs::File;
use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::cache::Cache;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::journal::Journal;
use crate::lock::FileLock;
use crate::task::{validate_records, TaskRecord};

/// Journal file name inside the tracker directory
pub const LOG_FILE: &str = "tasks.jsonl";
/// Cache file name inside the tracker directory
pub const CACHE_FILE: &str = "index.db";
/// Lock file name inside the tracker directory
pub const LOCK_FILE: &str = "trk.lock";

/// Coordinates the journal, the cache, and the directory lock.
pub struct Store {
    dir: PathBuf,
    lock_path: PathBuf,
    lock_timeout_ms: u64,
    journal: Journal,
    cache: Cache,
}

impl Store {
    /// Open an existing tracker under `root`.
    ///
    /// A missing tracker directory means "not initialized", which is
    /// distinct from an initialized tracker with an empty journal.
    pub fn open(root: &Path, config: &Config) -> Result<Store> {
        let dir = root.join(&config.storage.dir);
        if !dir.is_dir() {
            return Err(Error::NotInitialized(dir));
        }
        Ok(Self::at_dir(dir, config.storage.lock_timeout_ms))
    }

    /// Create the tracker directory and an empty journal, then open it.
    ///
    /// Idempotent: re-running init on an existing tracker changes nothing.
    pub fn init(root: &Path, config: &Config) -> Result<Store> {
        let dir = root.join(&config.storage.dir);
        std::fs::create_dir_all(&dir)?;
        let log_path = dir.join(LOG_FILE);
        if !log_path.exists() {
            File::create(&log_path)?;
        }
        Ok(Self::at_dir(dir, config.storage.lock_timeout_ms))
    }

    fn at_dir(dir: PathBuf, lock_timeout_ms: u64) -> Store {
        let journal = Journal::new(dir.join(LOG_FILE));
        let cache = Cache::new(dir.join(CACHE_FILE));
        let lock_path = dir.join(LOCK_FILE);
        Store {
            dir,
            lock_path,
            lock_timeout_ms,
            journal,
            cache,
        }
    }

    /// Path to the tracker directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path to the journal file.
    pub fn journal_path(&self) -> &Path {
        self.journal.path()
    }

    /// Path to the cache file.
    pub fn cache_path(&self) -> &Path {
        self.cache.path()
    }

    /// Apply a whole-collection transform and persist the result.
    ///
    /// The transform receives the full record set and returns the full
    /// replacement set plus a caller-chosen output value; single-task
    /// edits, removals, and bulk dependency fix-ups all share this path.
    /// A transform error or validation failure propagates with no side
    /// effects. A cache rebuild failure after the journal write
    /// invalidates the stored fingerprint before surfacing, so the next
    /// access repairs it.
    pub fn mutate<T>(
        &mut self,
        transform: impl FnOnce(Vec<TaskRecord>) -> Result<(Vec<TaskRecord>, T)>,
    ) -> Result<T> {
        let _lock = FileLock::acquire(&self.lock_path, self.lock_timeout_ms)?;

        let records = self.journal.load_all()?;
        let (new_records, output) = transform(records)?;
        validate_records(&new_records)?;

        self.journal.replace_all(&new_records)?;
        let fingerprint = self.journal.fingerprint()?;

        if let Err(err) = self.cache.rebuild(&new_records, &fingerprint) {
            self.cache.invalidate();
            return Err(Error::CacheRebuildFailure(err.to_string()));
        }

        Ok(output)
    }

    /// Run a read query against a cache proven fresh.
    ///
    /// The lock is held only for the fingerprint comparison and any
    /// rebuild it triggers; the caller's closure runs lock-free against
    /// the confirmed-fresh cache.
    pub fn query<T>(
        &mut self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        self.ensure_fresh()?;
        self.cache.read(f)
    }

    /// Rebuild the cache unconditionally, ignoring the fingerprint match.
    ///
    /// Recovery hatch for a suspected-corrupt cache or out-of-band edits
    /// to the journal. Returns the number of records re-indexed.
    pub fn rebuild(&mut self) -> Result<usize> {
        let _lock = FileLock::acquire(&self.lock_path, self.lock_timeout_ms)?;
        let records = self.journal.load_all()?;
        let fingerprint = self.journal.fingerprint()?;

        match self.cache.rebuild(&records, &fingerprint) {
            Ok(count) => Ok(count),
            Err(err) => {
                self.cache.invalidate();
                Err(Error::CacheRebuildFailure(err.to_string()))
            }
        }
    }

    /// Release held resources. Safe to call if no operation ever ran.
    pub fn close(&mut self) {
        self.cache.close();
    }

    fn ensure_fresh(&mut self) -> Result<()> {
        let _lock = FileLock::acquire(&self.lock_path, self.lock_timeout_ms)?;

        let current = self.journal.fingerprint()?;
        let stored = self.cache.stored_fingerprint();
        if stored.as_deref() == Some(current.as_str()) {
            return Ok(());
        }

        tracing::debug!(
            stored = stored.as_deref().unwrap_or("<absent>"),
            current = %current,
            "cache stale; rebuilding"
        );
        let records = self.journal.load_all()?;
        if let Err(err) = self.cache.rebuild(&records, &current) {
            self.cache.invalidate();
            return Err(Error::CacheRebuildFailure(err.to_string()));
        }
        Ok(())
    }
}
