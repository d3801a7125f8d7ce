//! trk task command implementations: add, update, status transitions, rm.

use std::collections::HashSet;

use serde::Serialize;

use crate::cli::Context;
use crate::error::{Error, Result};
use crate::id;
use crate::output::{emit_success, HumanOutput};
use crate::store::Store;
use crate::task::{Status, TaskRecord};

pub struct AddOptions {
    pub title: String,
    pub description: Option<String>,
    pub priority: u8,
    pub parent: Option<String>,
    pub blocked_by: Vec<String>,
}

pub struct UpdateOptions {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<u8>,
}

pub fn add(ctx: &Context, options: AddOptions) -> Result<()> {
    let prefix = ctx.config.ids.prefix.clone();
    let mut store = Store::open(&ctx.root, &ctx.config)?;

    let created = store.mutate(move |mut records| {
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let existing: HashSet<String> = ids.iter().cloned().collect();

        let mut record = TaskRecord::new(
            id::generate(&prefix, &existing),
            options.title.trim().to_string(),
        );
        record.description = options.description.unwrap_or_default();
        record.priority = options.priority;
        if let Some(parent) = &options.parent {
            record.parent = Some(id::resolve(parent, &ids, &prefix)?);
        }
        for blocker in &options.blocked_by {
            let resolved = id::resolve(blocker, &ids, &prefix)?;
            if !record.blocked_by.contains(&resolved) {
                record.blocked_by.push(resolved);
            }
        }

        records.push(record.clone());
        Ok((records, record))
    })?;
    store.close();

    let mut human = HumanOutput::new(format!("Added {}", created.id));
    human.push_summary("title", created.title.clone());
    human.push_summary("priority", format!("P{}", created.priority));
    if let Some(parent) = &created.parent {
        human.push_summary("parent", parent.clone());
    }
    if !created.blocked_by.is_empty() {
        human.push_summary("blocked_by", created.blocked_by.join(", "));
    }
    emit_success(ctx.output, "add", &created, Some(&human))
}

pub fn update(ctx: &Context, options: UpdateOptions) -> Result<()> {
    let prefix = ctx.config.ids.prefix.clone();
    let mut store = Store::open(&ctx.root, &ctx.config)?;

    let updated = store.mutate(move |mut records| {
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let target = id::resolve(&options.id, &ids, &prefix)?;

        let record = find_mut(&mut records, &target)?;
        if let Some(title) = &options.title {
            record.title = title.trim().to_string();
        }
        if let Some(description) = &options.description {
            record.description = description.clone();
        }
        if let Some(priority) = options.priority {
            record.priority = priority;
        }
        record.touch();
        let updated = record.clone();

        Ok((records, updated))
    })?;
    store.close();

    let mut human = HumanOutput::new(format!("Updated {}", updated.id));
    human.push_summary("title", updated.title.clone());
    human.push_summary("priority", format!("P{}", updated.priority));
    emit_success(ctx.output, "update", &updated, Some(&human))
}

pub fn set_status(ctx: &Context, input: &str, status: Status) -> Result<()> {
    let command = match status {
        Status::Open => "reopen",
        Status::InProgress => "start",
        Status::Done => "done",
        Status::Cancelled => "cancel",
    };

    let prefix = ctx.config.ids.prefix.clone();
    let input = input.to_string();
    let mut store = Store::open(&ctx.root, &ctx.config)?;

    let updated = store.mutate(move |mut records| {
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let target = id::resolve(&input, &ids, &prefix)?;

        let record = find_mut(&mut records, &target)?;
        record.set_status(status);
        let updated = record.clone();

        Ok((records, updated))
    })?;
    store.close();

    let mut human = HumanOutput::new(format!("{} is now {}", updated.id, updated.status));
    human.push_summary("title", updated.title.clone());
    emit_success(ctx.output, command, &updated, Some(&human))
}

#[derive(Serialize)]
struct RemovedData {
    id: String,
}

pub fn remove(ctx: &Context, input: &str) -> Result<()> {
    let prefix = ctx.config.ids.prefix.clone();
    let input = input.to_string();
    let mut store = Store::open(&ctx.root, &ctx.config)?;

    // Removing a task other tasks still reference fails validation
    // inside mutate, leaving the journal untouched.
    let removed = store.mutate(move |mut records| {
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let target = id::resolve(&input, &ids, &prefix)?;
        records.retain(|r| r.id != target);
        Ok((records, RemovedData { id: target }))
    })?;
    store.close();

    let human = HumanOutput::new(format!("Removed {}", removed.id));
    emit_success(ctx.output, "rm", &removed, Some(&human))
}

fn find_mut<'a>(records: &'a mut [TaskRecord], id: &str) -> Result<&'a mut TaskRecord> {
    records
        .iter_mut()
        .find(|r| r.id == id)
        .ok_or_else(|| Error::TaskNotFound(id.to_string()))
}
