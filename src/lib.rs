//! forum-kanban - Kanban task workflow over Discord forum threads
//!
//! A project owns forum channels; every post (thread) in them is a task with
//! a status. Each command changes three things together: the status tag on
//! the post, a pinned status panel message, and the project record on disk.
//!
//! # Core Concepts
//!
//! - **Project**: guild-scoped record with roles, members, forums and tasks,
//!   one JSON file per project
//! - **Task**: one forum post thread moving ToDo → InProgress →
//!   WaitingForApprove → Done
//! - **Status tags**: forum tags named after the statuses, resolved to IDs
//!   lazily and cached per forum
//! - **Status panel**: bot-owned pinned embed mirroring the task record
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `kanban.toml`
//! - `error`: Error types, exit codes and caller-facing replies
//! - `fsm`: Task state machine and command pipeline
//! - `lock`: File locking and atomic writes for the data directory
//! - `model`: Project and task records, normalization
//! - `output`: Human and JSON output for the CLI
//! - `panel`: Status panel rendering and upkeep
//! - `platform`: Chat platform contract and the Discord REST client
//! - `provision`: Project, membership and forum management
//! - `store`: Project persistence
//! - `tags`: Forum status tag resolution and application

pub mod cli;
pub mod config;
pub mod error;
pub mod fsm;
pub mod lock;
pub mod model;
pub mod output;
pub mod panel;
pub mod platform;
pub mod provision;
pub mod store;
pub mod tags;

pub use error::{Error, Result};
