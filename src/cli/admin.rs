//! trk init and rebuild command implementations.

use serde::Serialize;

use crate::cli::Context;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::store::Store;

#[derive(Serialize)]
struct InitData {
    dir: String,
    created: bool,
}

pub fn init(ctx: &Context) -> Result<()> {
    let existed = ctx.root.join(&ctx.config.storage.dir).is_dir();
    let mut store = Store::init(&ctx.root, &ctx.config)?;
    store.close();

    let data = InitData {
        dir: store.dir().display().to_string(),
        created: !existed,
    };
    let mut human = HumanOutput::new(if data.created {
        format!("Initialized tracker at {}", data.dir)
    } else {
        format!("Tracker already initialized at {}", data.dir)
    });
    human.push_summary("journal", store.journal_path().display().to_string());
    emit_success(ctx.output, "init", &data, Some(&human))
}

#[derive(Serialize)]
struct RebuildData {
    records: usize,
}

pub fn rebuild(ctx: &Context) -> Result<()> {
    let mut store = Store::open(&ctx.root, &ctx.config)?;
    let records = store.rebuild()?;
    store.close();

    let data = RebuildData { records };
    let human = HumanOutput::new(format!("Re-indexed {records} tasks"));
    emit_success(ctx.output, "rebuild", &data, Some(&human))
}
