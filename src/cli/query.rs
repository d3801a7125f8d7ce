//! trk read command implementations: list, ready, show, stats.

use crate::cli::Context;
use crate::error::{Error, Result};
use crate::id;
use crate::output::{emit_success, task_line, HumanOutput};
use crate::queries::{self, ListFilter};
use crate::store::Store;
use crate::task::Status;

pub fn list(ctx: &Context, status: Option<String>, priority: Option<u8>) -> Result<()> {
    let filter = ListFilter {
        status: status.as_deref().map(Status::parse).transpose()?,
        priority,
    };

    let mut store = Store::open(&ctx.root, &ctx.config)?;
    let tasks = store.query(|conn| queries::list(conn, &filter))?;
    store.close();

    let mut human = HumanOutput::new(format!("{} tasks", tasks.len()));
    for task in &tasks {
        human.push_detail(task_line(task));
    }
    emit_success(ctx.output, "list", &tasks, Some(&human))
}

pub fn ready(ctx: &Context) -> Result<()> {
    let mut store = Store::open(&ctx.root, &ctx.config)?;
    let tasks = store.query(queries::ready)?;
    store.close();

    let mut human = HumanOutput::new(format!("{} ready", tasks.len()));
    for task in &tasks {
        human.push_detail(task_line(task));
    }
    emit_success(ctx.output, "ready", &tasks, Some(&human))
}

pub fn show(ctx: &Context, input: &str) -> Result<()> {
    let mut store = Store::open(&ctx.root, &ctx.config)?;
    let ids = store.query(queries::all_ids)?;
    let target = id::resolve(input, &ids, &ctx.config.ids.prefix)?;
    let task = store
        .query(|conn| queries::get(conn, &target))?
        .ok_or(Error::TaskNotFound(target))?;
    store.close();

    let mut human = HumanOutput::new(format!("{}  {}", task.id, task.title));
    human.push_summary("status", task.status.to_string());
    human.push_summary("priority", format!("P{}", task.priority));
    human.push_summary("created", task.created.to_rfc3339());
    human.push_summary("updated", task.updated.to_rfc3339());
    if let Some(closed) = &task.closed {
        human.push_summary("closed", closed.to_rfc3339());
    }
    if let Some(parent) = &task.parent {
        human.push_summary("parent", parent.clone());
    }
    if !task.blocked_by.is_empty() {
        human.push_summary("blocked_by", task.blocked_by.join(", "));
    }
    if !task.description.is_empty() {
        human.push_detail(task.description.clone());
    }
    emit_success(ctx.output, "show", &task, Some(&human))
}

pub fn stats(ctx: &Context) -> Result<()> {
    let mut store = Store::open(&ctx.root, &ctx.config)?;
    let stats = store.query(queries::stats)?;
    store.close();

    let mut human = HumanOutput::new(format!("{} tasks total", stats.total));
    for (status, count) in &stats.by_status {
        human.push_summary(status.clone(), count.to_string());
    }
    for (level, count) in stats.by_priority.iter().enumerate() {
        human.push_summary(format!("P{level}"), count.to_string());
    }
    human.push_summary("ready", stats.ready.to_string());
    human.push_summary("blocked", stats.blocked.to_string());
    emit_success(ctx.output, "stats", &stats, Some(&human))
}
