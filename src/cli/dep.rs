//! trk dependency and parent-link command implementations.

use crate::cli::Context;
use crate::error::{Error, Result};
use crate::id;
use crate::output::{emit_success, HumanOutput};
use crate::store::Store;
use crate::task::TaskRecord;

pub fn add(ctx: &Context, input: &str, blocker_input: &str) -> Result<()> {
    let edited = edit(ctx, input, Some(blocker_input), |record, blocker| {
        let blocker = blocker.to_string();
        if record.blocked_by.contains(&blocker) {
            return Err(Error::InvalidArgument(format!(
                "{} is already blocked by {blocker}",
                record.id
            )));
        }
        record.blocked_by.push(blocker);
        Ok(())
    })?;

    let mut human = HumanOutput::new(format!("{} blocked by {}", edited.id, blocker_display(&edited)));
    human.push_summary("blocked_by", edited.blocked_by.join(", "));
    emit_success(ctx.output, "dep add", &edited, Some(&human))
}

pub fn remove(ctx: &Context, input: &str, blocker_input: &str) -> Result<()> {
    let edited = edit(ctx, input, Some(blocker_input), |record, blocker| {
        let before = record.blocked_by.len();
        record.blocked_by.retain(|b| b != blocker);
        if record.blocked_by.len() == before {
            return Err(Error::InvalidArgument(format!(
                "{} is not blocked by {blocker}",
                record.id
            )));
        }
        Ok(())
    })?;

    let mut human = HumanOutput::new(format!("{} no longer blocked", edited.id));
    if !edited.blocked_by.is_empty() {
        human.push_summary("blocked_by", edited.blocked_by.join(", "));
    }
    emit_success(ctx.output, "dep rm", &edited, Some(&human))
}

pub fn set_parent(ctx: &Context, input: &str, parent_input: &str) -> Result<()> {
    let edited = edit(ctx, input, Some(parent_input), |record, parent| {
        record.parent = Some(parent.to_string());
        Ok(())
    })?;

    let mut human = HumanOutput::new(format!("{} parent set", edited.id));
    if let Some(parent) = &edited.parent {
        human.push_summary("parent", parent.clone());
    }
    emit_success(ctx.output, "parent set", &edited, Some(&human))
}

pub fn clear_parent(ctx: &Context, input: &str) -> Result<()> {
    let edited = edit(ctx, input, None, |record, _| {
        if record.parent.is_none() {
            return Err(Error::InvalidArgument(format!(
                "{} has no parent",
                record.id
            )));
        }
        record.parent = None;
        Ok(())
    })?;

    let human = HumanOutput::new(format!("{} parent cleared", edited.id));
    emit_success(ctx.output, "parent clear", &edited, Some(&human))
}

/// Resolve the target (and optional other id), apply the edit, persist.
fn edit(
    ctx: &Context,
    input: &str,
    other_input: Option<&str>,
    apply: impl FnOnce(&mut TaskRecord, &str) -> Result<()>,
) -> Result<TaskRecord> {
    let prefix = ctx.config.ids.prefix.clone();
    let input = input.to_string();
    let other_input = other_input.map(str::to_string);
    let mut store = Store::open(&ctx.root, &ctx.config)?;

    let edited = store.mutate(move |mut records| {
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let target = id::resolve(&input, &ids, &prefix)?;
        let other = match &other_input {
            Some(other) => {
                let resolved = id::resolve(other, &ids, &prefix)?;
                if resolved == target {
                    return Err(Error::InvalidArgument(format!(
                        "{target} cannot reference itself"
                    )));
                }
                resolved
            }
            None => String::new(),
        };

        let record = records
            .iter_mut()
            .find(|r| r.id == target)
            .ok_or_else(|| Error::TaskNotFound(target.clone()))?;
        apply(record, &other)?;
        record.touch();
        let edited = record.clone();

        Ok((records, edited))
    })?;
    store.close();
    Ok(edited)
}

fn blocker_display(record: &TaskRecord) -> String {
    record
        .blocked_by
        .last()
        .cloned()
        .unwrap_or_default()
}
