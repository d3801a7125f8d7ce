//! Task model for trk.
//!
//! One `TaskRecord` per task. The full record set is the source of truth;
//! mutations always validate the whole set before anything is persisted.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum title length in characters
pub const MAX_TITLE_LEN: usize = 200;

/// Maximum priority level (0 = critical)
pub const MAX_PRIORITY: u8 = 4;

/// Task lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Open,
    InProgress,
    Done,
    Cancelled,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Open,
        Status::InProgress,
        Status::Done,
        Status::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Open => "open",
            Status::InProgress => "in_progress",
            Status::Done => "done",
            Status::Cancelled => "cancelled",
        }
    }

    /// Done and cancelled tasks are terminal: they no longer block anything.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Done | Status::Cancelled)
    }

    pub fn parse(input: &str) -> Result<Status> {
        match input.trim().to_lowercase().as_str() {
            "open" => Ok(Status::Open),
            "in_progress" | "in-progress" => Ok(Status::InProgress),
            "done" => Ok(Status::Done),
            "cancelled" | "canceled" => Ok(Status::Cancelled),
            other => Err(Error::InvalidArgument(format!(
                "unknown status: {other} (expected open, in_progress, done, cancelled)"
            ))),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single tracked task.
///
/// Unknown fields are tolerated on read and dropped on rewrite; optional
/// fields are omitted from the wire when empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRecord {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub status: Status,
    pub priority: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_by: Vec<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed: Option<DateTime<Utc>>,
}

/// Current time truncated to whole seconds, the log's timestamp precision.
pub fn now_secs() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

impl TaskRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = now_secs();
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            status: Status::Open,
            priority: 2,
            parent: None,
            blocked_by: Vec::new(),
            created: now,
            updated: now,
            closed: None,
        }
    }

    /// Transition status, maintaining the `closed` timestamp invariant.
    pub fn set_status(&mut self, status: Status) {
        let now = now_secs();
        if status.is_terminal() {
            if self.closed.is_none() {
                self.closed = Some(now);
            }
        } else {
            self.closed = None;
        }
        self.status = status;
        self.updated = now;
    }

    /// Bump the updated timestamp after a field edit.
    pub fn touch(&mut self) {
        self.updated = now_secs();
    }
}

/// Validate the invariants of a full record set.
///
/// Called by the coordinator after every transform and before anything is
/// persisted. Failures are `ReferentialViolation` (or `InvalidArgument`
/// for field-level problems) and leave log and cache untouched.
pub fn validate_records(records: &[TaskRecord]) -> Result<()> {
    let mut ids: HashSet<&str> = HashSet::with_capacity(records.len());
    for record in records {
        if !ids.insert(record.id.as_str()) {
            return Err(Error::ReferentialViolation(format!(
                "duplicate task id: {}",
                record.id
            )));
        }
    }

    for record in records {
        if record.title.trim().is_empty() {
            return Err(Error::InvalidArgument(format!(
                "task {} has an empty title",
                record.id
            )));
        }
        if record.title.chars().count() > MAX_TITLE_LEN {
            return Err(Error::InvalidArgument(format!(
                "task {} title exceeds {MAX_TITLE_LEN} characters",
                record.id
            )));
        }
        if record.priority > MAX_PRIORITY {
            return Err(Error::InvalidArgument(format!(
                "task {} priority {} out of range 0-{MAX_PRIORITY}",
                record.id, record.priority
            )));
        }

        if let Some(parent) = &record.parent {
            if parent == &record.id {
                return Err(Error::ReferentialViolation(format!(
                    "task {} lists itself as parent",
                    record.id
                )));
            }
            if !ids.contains(parent.as_str()) {
                return Err(Error::ReferentialViolation(format!(
                    "task {} has dangling parent {parent}",
                    record.id
                )));
            }
        }

        let mut seen_blockers: HashSet<&str> = HashSet::new();
        for blocker in &record.blocked_by {
            if blocker == &record.id {
                return Err(Error::ReferentialViolation(format!(
                    "task {} lists itself as a blocker",
                    record.id
                )));
            }
            if !ids.contains(blocker.as_str()) {
                return Err(Error::ReferentialViolation(format!(
                    "task {} has dangling blocker {blocker}",
                    record.id
                )));
            }
            if !seen_blockers.insert(blocker.as_str()) {
                return Err(Error::ReferentialViolation(format!(
                    "task {} lists blocker {blocker} twice",
                    record.id
                )));
            }
        }

        if record.closed.is_some() != record.status.is_terminal() {
            return Err(Error::InvalidArgument(format!(
                "task {} has closed={:?} with status {}",
                record.id, record.closed, record.status
            )));
        }
    }

    // Cycles are permitted: members of a cycle are permanently non-ready
    // rather than an error. Warn so the condition is diagnosable.
    if let Some(cycle_member) = find_cycle_member(records) {
        tracing::warn!(
            task = %cycle_member,
            "blocked_by cycle detected; affected tasks will never be ready"
        );
    }

    Ok(())
}

/// Return some member of a `blocked_by` cycle, if one exists.
fn find_cycle_member(records: &[TaskRecord]) -> Option<String> {
    let edges: HashMap<&str, &[String]> = records
        .iter()
        .map(|r| (r.id.as_str(), r.blocked_by.as_slice()))
        .collect();

    let mut done: HashSet<&str> = HashSet::new();
    for record in records {
        if done.contains(record.id.as_str()) {
            continue;
        }
        // Iterative DFS with an explicit on-path set.
        let mut stack: Vec<(&str, usize)> = vec![(record.id.as_str(), 0)];
        let mut on_path: HashSet<&str> = HashSet::from([record.id.as_str()]);
        while let Some((node, next)) = stack.pop() {
            let blockers = edges.get(node).copied().unwrap_or(&[]);
            if next < blockers.len() {
                stack.push((node, next + 1));
                let child = blockers[next].as_str();
                if on_path.contains(child) {
                    return Some(child.to_string());
                }
                if !done.contains(child) {
                    on_path.insert(child);
                    stack.push((child, 0));
                }
            } else {
                on_path.remove(node);
                done.insert(node);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str) -> TaskRecord {
        TaskRecord::new(id, format!("Task {id}"))
    }

    #[test]
    fn valid_set_passes() {
        let mut b = task("tk-b");
        b.parent = Some("tk-a".to_string());
        b.blocked_by = vec!["tk-a".to_string()];
        assert!(validate_records(&[task("tk-a"), b]).is_ok());
    }

    #[test]
    fn duplicate_id_rejected() {
        let result = validate_records(&[task("tk-a"), task("tk-a")]);
        assert!(matches!(result, Err(Error::ReferentialViolation(_))));
    }

    #[test]
    fn dangling_blocker_rejected() {
        let mut a = task("tk-a");
        a.blocked_by = vec!["tk-missing".to_string()];
        let result = validate_records(&[a]);
        assert!(matches!(result, Err(Error::ReferentialViolation(_))));
    }

    #[test]
    fn dangling_parent_rejected() {
        let mut a = task("tk-a");
        a.parent = Some("tk-missing".to_string());
        let result = validate_records(&[a]);
        assert!(matches!(result, Err(Error::ReferentialViolation(_))));
    }

    #[test]
    fn self_reference_rejected() {
        let mut a = task("tk-a");
        a.blocked_by = vec!["tk-a".to_string()];
        assert!(validate_records(&[a]).is_err());

        let mut b = task("tk-b");
        b.parent = Some("tk-b".to_string());
        assert!(validate_records(&[b]).is_err());
    }

    #[test]
    fn duplicate_blocker_rejected() {
        let mut b = task("tk-b");
        b.blocked_by = vec!["tk-a".to_string(), "tk-a".to_string()];
        let result = validate_records(&[task("tk-a"), b]);
        assert!(matches!(result, Err(Error::ReferentialViolation(_))));
    }

    #[test]
    fn closed_requires_terminal_status() {
        let mut a = task("tk-a");
        a.closed = Some(now_secs());
        assert!(validate_records(&[a]).is_err());

        let mut b = task("tk-b");
        b.status = Status::Done;
        assert!(validate_records(&[b]).is_err());
    }

    #[test]
    fn set_status_maintains_closed() {
        let mut a = task("tk-a");
        a.set_status(Status::Done);
        assert!(a.closed.is_some());

        a.set_status(Status::Open);
        assert!(a.closed.is_none());
    }

    #[test]
    fn cycle_is_allowed_but_detected() {
        let mut a = task("tk-a");
        let mut b = task("tk-b");
        a.blocked_by = vec!["tk-b".to_string()];
        b.blocked_by = vec!["tk-a".to_string()];
        let records = vec![a, b];
        assert!(validate_records(&records).is_ok());
        assert!(find_cycle_member(&records).is_some());
    }

    #[test]
    fn unknown_fields_tolerated_on_read() {
        let line = r#"{"id":"tk-a","title":"A","status":"open","priority":1,
            "created":"2026-01-01T00:00:00Z","updated":"2026-01-01T00:00:00Z",
            "labels":["future"]}"#;
        let record: TaskRecord = serde_json::from_str(line).unwrap();
        assert_eq!(record.id, "tk-a");
        // Unknown field does not survive a rewrite.
        let rewritten = serde_json::to_string(&record).unwrap();
        assert!(!rewritten.contains("labels"));
    }

    #[test]
    fn empty_optionals_omitted_from_wire() {
        let a = task("tk-a");
        let json = serde_json::to_string(&a).unwrap();
        assert!(!json.contains("parent"));
        assert!(!json.contains("blocked_by"));
        assert!(!json.contains("closed"));
        assert!(!json.contains("description"));
    }
}
