//! The task journal: trk's authoritative store.
//!
//! One compact JSON object per line, one line per task, UTF-8. The file is
//! only ever replaced wholesale via an atomic rename, never patched in
//! place. Staleness of the derived cache is detected by fingerprinting the
//! journal's raw bytes.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::lock;
use crate::task::TaskRecord;

/// Hex-encoded SHA-256 of the journal's bytes.
pub type Fingerprint = String;

/// The journal file, `tasks.jsonl` inside the tracker directory.
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every record from the journal.
    ///
    /// A missing file is an empty journal. Any line that fails to parse
    /// fails the whole load with `CorruptLog`; a partially readable
    /// journal is never trusted.
    pub fn load_all(&self) -> Result<Vec<TaskRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: TaskRecord =
                serde_json::from_str(&line).map_err(|source| Error::CorruptLog {
                    line: idx + 1,
                    source,
                })?;
            records.push(record);
        }

        Ok(records)
    }

    /// Replace the journal's contents with the given record set.
    ///
    /// Serializes every record as one line, writes a temp file, then
    /// renames it over the journal so readers never see a partial write.
    pub fn replace_all(&self, records: &[TaskRecord]) -> Result<()> {
        let mut buf = String::with_capacity(records.len() * 160);
        for record in records {
            buf.push_str(&serde_json::to_string(record)?);
            buf.push('\n');
        }
        lock::write_atomic(&self.path, buf.as_bytes())
    }

    /// Fingerprint of the journal's current bytes.
    ///
    /// Recomputed on every call; a missing file hashes as empty, so an
    /// initialized-but-empty tracker has a stable fingerprint.
    pub fn fingerprint(&self) -> Result<Fingerprint> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(Error::Io(err)),
        };
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}
