//! Command-line interface for trk
//!
//! This module defines the CLI structure using clap derive macros.
//! Command handlers live in submodules and consume the store only
//! through its mutate / query / rebuild operations.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::error::Result;
use crate::output::OutputOptions;

mod admin;
mod dep;
mod query;
mod task;

/// trk - local task tracking
///
/// A single-user task tracker whose source of truth is a line-oriented
/// journal, with dependency-aware readiness queries served by a derived
/// index.
#[derive(Parser, Debug)]
#[command(name = "trk")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Root directory containing the tracker (defaults to current directory)
    #[arg(long, global = true, env = "TRK_ROOT")]
    pub root: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a tracker in the current directory
    Init,

    /// Add a new task
    Add {
        /// Task title
        title: String,

        /// Longer description
        #[arg(short, long)]
        description: Option<String>,

        /// Priority 0-4 (0 = critical)
        #[arg(short, long, default_value_t = 2)]
        priority: u8,

        /// Parent task id
        #[arg(long)]
        parent: Option<String>,

        /// Task ids this task is blocked by
        #[arg(long = "blocked-by")]
        blocked_by: Vec<String>,
    },

    /// Edit a task's fields
    Update {
        /// Task id
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New description
        #[arg(short, long)]
        description: Option<String>,

        /// New priority 0-4
        #[arg(short, long)]
        priority: Option<u8>,
    },

    /// Mark a task in progress
    Start {
        /// Task id
        id: String,
    },

    /// Mark a task done
    Done {
        /// Task id
        id: String,
    },

    /// Cancel a task
    Cancel {
        /// Task id
        id: String,
    },

    /// Reopen a done or cancelled task
    Reopen {
        /// Task id
        id: String,
    },

    /// Remove a task
    Rm {
        /// Task id
        id: String,
    },

    /// Manage blocking dependencies
    #[command(subcommand)]
    Dep(DepCommands),

    /// Manage parent links
    #[command(subcommand)]
    Parent(ParentCommands),

    /// List tasks
    List {
        /// Filter by status (open, in_progress, done, cancelled)
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by priority 0-4
        #[arg(short, long)]
        priority: Option<u8>,
    },

    /// Show tasks that are ready to work on
    Ready,

    /// Show a single task
    Show {
        /// Task id
        id: String,
    },

    /// Show aggregate statistics
    Stats,

    /// Rebuild the derived index from the journal
    Rebuild,
}

/// Dependency subcommands
#[derive(Subcommand, Debug)]
pub enum DepCommands {
    /// Add a blocking dependency: ID is blocked by BLOCKER
    Add {
        /// Task that is blocked
        id: String,
        /// Task that blocks it
        blocker: String,
    },

    /// Remove a blocking dependency
    Rm {
        /// Task that is blocked
        id: String,
        /// Blocker to remove
        blocker: String,
    },
}

/// Parent link subcommands
#[derive(Subcommand, Debug)]
pub enum ParentCommands {
    /// Set a task's parent
    Set {
        /// Child task
        id: String,
        /// Parent task
        parent: String,
    },

    /// Clear a task's parent
    Clear {
        /// Child task
        id: String,
    },
}

/// Shared handler context: resolved root, loaded config, output options.
pub struct Context {
    pub root: PathBuf,
    pub config: Config,
    pub output: OutputOptions,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let root = match self.root {
            Some(root) => root,
            None => std::env::current_dir()?,
        };
        let config = Config::load_from_root(&root)?;
        let ctx = Context {
            root,
            config,
            output: OutputOptions {
                json: self.json,
                quiet: self.quiet,
            },
        };

        match self.command {
            Commands::Init => admin::init(&ctx),
            Commands::Add {
                title,
                description,
                priority,
                parent,
                blocked_by,
            } => task::add(
                &ctx,
                task::AddOptions {
                    title,
                    description,
                    priority,
                    parent,
                    blocked_by,
                },
            ),
            Commands::Update {
                id,
                title,
                description,
                priority,
            } => task::update(
                &ctx,
                task::UpdateOptions {
                    id,
                    title,
                    description,
                    priority,
                },
            ),
            Commands::Start { id } => task::set_status(&ctx, &id, crate::task::Status::InProgress),
            Commands::Done { id } => task::set_status(&ctx, &id, crate::task::Status::Done),
            Commands::Cancel { id } => task::set_status(&ctx, &id, crate::task::Status::Cancelled),
            Commands::Reopen { id } => task::set_status(&ctx, &id, crate::task::Status::Open),
            Commands::Rm { id } => task::remove(&ctx, &id),
            Commands::Dep(DepCommands::Add { id, blocker }) => dep::add(&ctx, &id, &blocker),
            Commands::Dep(DepCommands::Rm { id, blocker }) => dep::remove(&ctx, &id, &blocker),
            Commands::Parent(ParentCommands::Set { id, parent }) => {
                dep::set_parent(&ctx, &id, &parent)
            }
            Commands::Parent(ParentCommands::Clear { id }) => dep::clear_parent(&ctx, &id),
            Commands::List { status, priority } => query::list(&ctx, status, priority),
            Commands::Ready => query::ready(&ctx),
            Commands::Show { id } => query::show(&ctx, &id),
            Commands::Stats => query::stats(&ctx),
            Commands::Rebuild => admin::rebuild(&ctx),
        }
    }
}
