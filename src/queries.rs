//! Fixed read queries over the cache.
//!
//! These are the derived views the cache exists to serve: readiness,
//! aggregates, and the listing/show surfaces the CLI consumes. All
//! functions take a plain connection so they compose with `Cache::read`.

use std::collections::{BTreeMap, HashMap, HashSet};

use rusqlite::Connection;
use serde::Serialize;

use crate::cache::task_from_row;
use crate::task::{Status, TaskRecord, MAX_PRIORITY};

const TASK_COLUMNS: &str =
    "id, title, description, status, priority, parent, created, updated, closed";

/// A task is ready when it is open, every blocker is terminal, and no
/// child is open or in progress.
const READY_CONDITIONS: &str = "
    t.status = 'open'
    AND NOT EXISTS (
        SELECT 1 FROM deps d
        JOIN tasks b ON b.id = d.blocked_by
        WHERE d.task_id = t.id
          AND b.status NOT IN ('done', 'cancelled'))
    AND NOT EXISTS (
        SELECT 1 FROM tasks c
        WHERE c.parent = t.id
          AND c.status IN ('open', 'in_progress'))";

/// Aggregate counts over the whole task set.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    /// Counts for priority levels 0-4, always all five present.
    pub by_priority: Vec<usize>,
    pub ready: usize,
    pub blocked: usize,
}

/// Filters for the `list` query.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<Status>,
    pub priority: Option<u8>,
}

/// The ready set: open, unblocked, no open work underneath.
///
/// Ordered by priority, then creation time, then id - a stable,
/// deterministic tie-break.
pub fn ready(conn: &Connection) -> rusqlite::Result<Vec<TaskRecord>> {
    let sql = format!(
        "SELECT {TASK_COLUMNS} FROM tasks t
         WHERE {READY_CONDITIONS}
         ORDER BY t.priority ASC, t.created ASC, t.id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut tasks = stmt
        .query_map([], task_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    attach_blockers(conn, &mut tasks)?;
    Ok(tasks)
}

fn ready_count(conn: &Connection) -> rusqlite::Result<usize> {
    let sql = format!("SELECT count(*) FROM tasks t WHERE {READY_CONDITIONS}");
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count.max(0) as usize)
}

/// Per-status and per-priority aggregates plus derived readiness counts.
///
/// `blocked` is arithmetic (`open - ready`), not a second traversal.
pub fn stats(conn: &Connection) -> rusqlite::Result<Stats> {
    let mut by_status: BTreeMap<String, usize> = Status::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    let mut stmt = conn.prepare("SELECT status, count(*) FROM tasks GROUP BY status")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (status, count) = row?;
        by_status.insert(status, count.max(0) as usize);
    }

    let mut by_priority = vec![0usize; MAX_PRIORITY as usize + 1];
    let mut stmt = conn.prepare("SELECT priority, count(*) FROM tasks GROUP BY priority")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (priority, count) = row?;
        if let Ok(level) = usize::try_from(priority) {
            if level < by_priority.len() {
                by_priority[level] = count.max(0) as usize;
            }
        }
    }

    let total: usize = by_status.values().sum();
    let open = by_status.get(Status::Open.as_str()).copied().unwrap_or(0);
    let ready = ready_count(conn)?;

    Ok(Stats {
        total,
        by_status,
        by_priority,
        ready,
        blocked: open.saturating_sub(ready),
    })
}

/// List tasks with optional status/priority filters, ready-set ordering.
pub fn list(conn: &Connection, filter: &ListFilter) -> rusqlite::Result<Vec<TaskRecord>> {
    let mut sql = format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE 1=1");
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(status) = filter.status {
        sql.push_str(" AND status = ?");
        params.push(Box::new(status.as_str().to_string()));
    }
    if let Some(priority) = filter.priority {
        sql.push_str(" AND priority = ?");
        params.push(Box::new(priority));
    }
    sql.push_str(" ORDER BY t.priority ASC, t.created ASC, t.id ASC");

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(AsRef::as_ref).collect();
    let mut tasks = stmt
        .query_map(params_refs.as_slice(), task_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    attach_blockers(conn, &mut tasks)?;
    Ok(tasks)
}

/// Fetch a single task with its blocker list.
pub fn get(conn: &Connection, id: &str) -> rusqlite::Result<Option<TaskRecord>> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map([id], task_from_row)?;
    match rows.next().transpose()? {
        Some(mut task) => {
            attach_blockers(conn, std::slice::from_mut(&mut task))?;
            Ok(Some(task))
        }
        None => Ok(None),
    }
}

/// All task ids, for resolving user input on the read path.
pub fn all_ids(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT id FROM tasks ORDER BY id")?;
    let ids = stmt.query_map([], |row| row.get(0))?.collect();
    ids
}

fn attach_blockers(conn: &Connection, tasks: &mut [TaskRecord]) -> rusqlite::Result<()> {
    if tasks.is_empty() {
        return Ok(());
    }
    let wanted: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    let mut by_task: HashMap<String, Vec<String>> = HashMap::new();

    let mut stmt = conn.prepare("SELECT task_id, blocked_by FROM deps ORDER BY blocked_by")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (task_id, blocker) = row?;
        if wanted.contains(task_id.as_str()) {
            by_task.entry(task_id).or_default().push(blocker);
        }
    }

    for task in tasks.iter_mut() {
        if let Some(blockers) = by_task.remove(task.id.as_str()) {
            task.blocked_by = blockers;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cache;
    use chrono::{Duration, SubsecRound, Utc};
    use tempfile::TempDir;

    fn task(id: &str, priority: u8) -> TaskRecord {
        let mut t = TaskRecord::new(id, format!("Task {id}"));
        t.priority = priority;
        t
    }

    fn built(records: &[TaskRecord]) -> (TempDir, Cache) {
        let temp = TempDir::new().unwrap();
        let mut cache = Cache::new(temp.path().join("index.db"));
        cache.rebuild(records, "fp").unwrap();
        (temp, cache)
    }

    #[test]
    fn open_unblocked_childless_is_ready() {
        let (_temp, mut cache) = built(&[task("tk-a", 2)]);
        let ready = cache.read(ready).unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, "tk-a");
    }

    #[test]
    fn each_readiness_condition_excludes() {
        // Not open.
        let mut t = task("tk-a", 2);
        t.set_status(Status::InProgress);
        let (_g1, mut cache) = built(&[t]);
        assert!(cache.read(ready).unwrap().is_empty());

        // Blocked by a non-terminal task.
        let blocker = task("tk-b", 2);
        let mut blocked = task("tk-c", 2);
        blocked.blocked_by = vec!["tk-b".to_string()];
        let (_g2, mut cache) = built(&[blocker.clone(), blocked.clone()]);
        let ids: Vec<String> = cache
            .read(ready)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["tk-b".to_string()]);

        // Blocker resolved: both the blocker done and the task ready.
        let mut done_blocker = blocker;
        done_blocker.set_status(Status::Done);
        let (_g3, mut cache) = built(&[done_blocker, blocked]);
        let ids: Vec<String> = cache
            .read(ready)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["tk-c".to_string()]);

        // Open child excludes the parent.
        let mut child = task("tk-e", 2);
        child.parent = Some("tk-d".to_string());
        let (_g4, mut cache) = built(&[task("tk-d", 2), child.clone()]);
        let ids: Vec<String> = cache
            .read(ready)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["tk-e".to_string()]);

        // Done child does not.
        child.set_status(Status::Done);
        let (_g5, mut cache) = built(&[task("tk-d", 2), child]);
        let ids: Vec<String> = cache
            .read(ready)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["tk-d".to_string()]);
    }

    #[test]
    fn ready_ordering_is_priority_then_created_then_id() {
        let now = Utc::now().trunc_subsecs(0);
        let mut a = task("tk-a", 1);
        let mut b = task("tk-b", 0);
        let mut c = task("tk-c", 1);
        a.created = now;
        b.created = now + Duration::seconds(5);
        c.created = now - Duration::seconds(5);

        let (_temp, mut cache) = built(&[a, b, c]);
        let ids: Vec<String> = cache
            .read(ready)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["tk-b", "tk-c", "tk-a"]);
    }

    #[test]
    fn blocked_before_and_after_blocker_closes() {
        // Spec scenario: A open p1, B open p0 blocked by A.
        let a = task("tk-a", 1);
        let mut b = task("tk-b", 0);
        b.blocked_by = vec!["tk-a".to_string()];

        let (_g1, mut cache) = built(&[a.clone(), b.clone()]);
        let ids: Vec<String> = cache
            .read(ready)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["tk-a"]);

        let mut done_a = a;
        done_a.set_status(Status::Done);
        let (_g2, mut cache) = built(&[done_a, b]);
        let ids: Vec<String> = cache
            .read(ready)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["tk-b"]);
    }

    #[test]
    fn stats_identities_hold() {
        let mut b = task("tk-b", 0);
        b.blocked_by = vec!["tk-a".to_string()];
        let mut c = task("tk-c", 3);
        c.set_status(Status::Done);
        let mut d = task("tk-d", 4);
        d.set_status(Status::Cancelled);
        let mut e = task("tk-e", 1);
        e.set_status(Status::InProgress);

        let (_temp, mut cache) = built(&[task("tk-a", 1), b, c, d, e]);
        let stats = cache.read(stats).unwrap();

        assert_eq!(stats.total, 5);
        assert_eq!(stats.by_status.values().sum::<usize>(), stats.total);
        assert_eq!(stats.by_priority.iter().sum::<usize>(), stats.total);
        assert_eq!(stats.by_priority.len(), 5);
        let open = stats.by_status["open"];
        assert_eq!(stats.ready + stats.blocked, open);
        assert_eq!(stats.ready, 1);
        assert_eq!(stats.blocked, 1);
    }

    #[test]
    fn empty_set_stats_are_zero_filled() {
        let (_temp, mut cache) = built(&[]);
        let stats = cache.read(stats).unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.ready, 0);
        assert_eq!(stats.blocked, 0);
        assert_eq!(stats.by_priority, vec![0, 0, 0, 0, 0]);
        assert!(stats.by_status.values().all(|&v| v == 0));
        assert_eq!(stats.by_status.len(), 4);
    }

    #[test]
    fn cycle_members_never_ready() {
        let mut a = task("tk-a", 2);
        let mut b = task("tk-b", 2);
        a.blocked_by = vec!["tk-b".to_string()];
        b.blocked_by = vec!["tk-a".to_string()];

        let (_temp, mut cache) = built(&[a, b, task("tk-c", 2)]);
        let ids: Vec<String> = cache
            .read(ready)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["tk-c"]);
    }

    #[test]
    fn list_filters_and_get_attach_blockers() {
        let mut b = task("tk-b", 0);
        b.blocked_by = vec!["tk-a".to_string()];
        let (_temp, mut cache) = built(&[task("tk-a", 1), b]);

        let all = cache.read(|conn| list(conn, &ListFilter::default())).unwrap();
        assert_eq!(all.len(), 2);

        let p0 = cache
            .read(|conn| {
                list(
                    conn,
                    &ListFilter {
                        priority: Some(0),
                        ..Default::default()
                    },
                )
            })
            .unwrap();
        assert_eq!(p0.len(), 1);
        assert_eq!(p0[0].blocked_by, vec!["tk-a".to_string()]);

        let shown = cache.read(|conn| get(conn, "tk-b")).unwrap().unwrap();
        assert_eq!(shown.blocked_by, vec!["tk-a".to_string()]);
        assert!(cache.read(|conn| get(conn, "tk-zz")).unwrap().is_none());
    }
}
