//! Task id helpers.
//!
//! Ids are short codes of the form `<prefix>-<code>` where the code is a
//! lowercase slice of ULID randomness. Comparison and storage always go
//! through [`normalize`].

use std::collections::HashSet;

use ulid::Ulid;

use crate::error::{Error, Result};

/// Length of the random code portion of a generated id
const CODE_LEN: usize = 6;

/// Normalize an id for comparison or storage: trimmed, lowercase.
pub fn normalize(input: &str) -> String {
    input.trim().to_lowercase()
}

/// Generate a fresh id that does not collide with any existing id.
pub fn generate(prefix: &str, existing: &HashSet<String>) -> String {
    let prefix = normalize(prefix);
    loop {
        let ulid = Ulid::new().to_string().to_lowercase();
        // Random portion of the ULID, skipping the timestamp prefix so
        // consecutive ids don't share a leading run.
        let code = &ulid[ulid.len() - CODE_LEN..];
        let id = format!("{prefix}-{code}");
        if !existing.contains(&id) {
            return id;
        }
    }
}

/// Resolve user input to a known id.
///
/// Tries: exact match after normalization, then prefix-completed
/// (`abc123` -> `tk-abc123`), then unique substring of the code portion.
pub fn resolve(input: &str, ids: &[String], prefix: &str) -> Result<String> {
    let needle = normalize(input);
    if needle.is_empty() {
        return Err(Error::InvalidArgument("empty task id".to_string()));
    }

    if ids.iter().any(|id| id == &needle) {
        return Ok(needle);
    }

    if !needle.contains('-') {
        let completed = format!("{prefix}-{needle}");
        if ids.iter().any(|id| id == &completed) {
            return Ok(completed);
        }
    }

    let code = needle.rsplit('-').next().unwrap_or(&needle);
    let mut matches: Vec<String> = ids
        .iter()
        .filter(|id| id.rsplit('-').next().is_some_and(|c| c.contains(code)))
        .cloned()
        .collect();

    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => Err(Error::TaskNotFound(needle)),
        _ => Err(Error::AmbiguousId {
            input: needle,
            matches,
        }),
    }
}
