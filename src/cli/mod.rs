//! Command-line interface for forum-kanban
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Config;
use crate::error::Result;
use crate::output::OutputOptions;
use crate::platform::discord::DiscordClient;
use crate::platform::Platform;
use crate::store::ProjectStore;

mod forum;
mod member;
mod project;
mod task;

/// forum-kanban - Kanban workflow on Discord forum channels
///
/// Each project owns a private category with forum channels; every forum
/// post is a task moved through ToDo, InProgress, WaitingForApprove and Done.
#[derive(Parser, Debug)]
#[command(name = "forum-kanban")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to kanban.toml (defaults to ./kanban.toml when present)
    #[arg(long, global = true, env = "KANBAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Project data directory (overrides data_dir from the config file)
    #[arg(long, global = true, env = "KANBAN_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Task commands, run against a forum post thread
    #[command(subcommand)]
    Task(TaskCommands),

    /// Project management
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Project membership
    #[command(subcommand)]
    Member(MemberCommands),

    /// Project forums
    #[command(subcommand)]
    Forum(ForumCommands),
}

/// Who is running a command.
#[derive(Args, Debug, Clone)]
pub struct CallerArgs {
    /// Guild (server) ID
    #[arg(long, env = "KANBAN_GUILD_ID")]
    pub guild: String,

    /// User ID of the caller
    #[arg(long)]
    pub user: String,

    /// Live role IDs of the caller (fetched from Discord when omitted)
    #[arg(long = "role")]
    pub roles: Vec<String>,
}

/// A task command issued inside a thread.
#[derive(Args, Debug, Clone)]
pub struct ThreadArgs {
    #[command(flatten)]
    pub caller: CallerArgs,

    /// Thread (forum post) channel ID
    #[arg(long)]
    pub channel: String,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Start tracking the current thread as a ToDo task
    Init(ThreadArgs),

    /// Take an unassigned ToDo task
    Take(ThreadArgs),

    /// Submit an in-progress task for approval
    Done {
        #[command(flatten)]
        thread: ThreadArgs,

        /// What was done
        description: String,
    },

    /// Approve a submitted task (leader only)
    Approve(ThreadArgs),

    /// Send a submitted task back to InProgress (leader only)
    Revoke(ThreadArgs),

    /// Give an in-progress task back to ToDo
    Surrender(ThreadArgs),
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Create roles, a private category and the project record
    Create {
        /// Project name
        name: String,

        /// Guild (server) ID
        #[arg(long, env = "KANBAN_GUILD_ID")]
        guild: String,

        /// User ID of the creator (becomes leader)
        #[arg(long)]
        user: String,
    },

    /// Delete a project with its forums, category and roles (leader only)
    Delete {
        /// Project slug or name
        project: String,

        #[command(flatten)]
        caller: CallerArgs,
    },

    /// List stored projects
    List {
        /// Only projects of this guild
        #[arg(long)]
        guild: Option<String>,
    },

    /// Show one stored project
    Show {
        /// Project slug or name
        project: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum MemberCommands {
    /// Grant the member role and record the membership (leader only)
    Add {
        /// Project slug or name
        project: String,

        /// User ID to add
        target: String,

        #[command(flatten)]
        caller: CallerArgs,
    },

    /// Revoke project roles and drop the membership (leader only)
    Remove {
        /// Project slug or name
        project: String,

        /// User ID to remove
        target: String,

        #[command(flatten)]
        caller: CallerArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum ForumCommands {
    /// Create a forum with the Kanban tags under the project category (leader only)
    Create {
        /// Project slug or name
        project: String,

        /// Forum name
        #[arg(default_value = crate::provision::DEFAULT_FORUM_NAME)]
        name: String,

        #[command(flatten)]
        caller: CallerArgs,
    },

    /// Delete a project forum by channel ID or name (leader only)
    Delete {
        /// Project slug or name
        project: String,

        /// Forum channel ID or name
        forum: String,

        #[command(flatten)]
        caller: CallerArgs,
    },
}

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

impl GlobalOptions {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::resolve(self.config.as_deref())?;
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn store(&self, config: &Config) -> ProjectStore {
        ProjectStore::new(config.data_dir.clone()).with_lock_timeout(config.store.lock_timeout_ms)
    }

    pub fn platform(&self, config: &Config) -> Result<DiscordClient> {
        DiscordClient::with_options(
            config.discord.token()?,
            config.discord.api_base.clone(),
            config.discord.timeout_ms,
        )
    }
}

/// Explicit `--role` values, else the caller's live roles from the
/// platform. `None` when neither is available.
pub(crate) fn caller_roles(
    platform: &dyn Platform,
    guild_id: &str,
    user_id: &str,
    explicit: &[String],
) -> Option<Vec<String>> {
    let explicit: Vec<String> = explicit
        .iter()
        .map(|role| role.trim().to_string())
        .filter(|role| !role.is_empty())
        .collect();
    if !explicit.is_empty() {
        return Some(explicit);
    }
    if guild_id.trim().is_empty() || user_id.trim().is_empty() {
        return None;
    }
    match platform.member_roles(guild_id.trim(), user_id.trim()) {
        Ok(roles) => Some(roles),
        Err(err) => {
            tracing::warn!(guild = %guild_id, user = %user_id, err = %err, "live roles unavailable");
            None
        }
    }
}

impl Cli {
    fn globals(&self) -> GlobalOptions {
        GlobalOptions {
            config: self.config.clone(),
            data_dir: self.data_dir.clone(),
            output: OutputOptions {
                json: self.json,
                quiet: self.quiet,
            },
        }
    }

    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let globals = self.globals();
        match self.command {
            Commands::Task(cmd) => task::run(task::TaskOptions::from_command(cmd), &globals),
            Commands::Project(cmd) => match cmd {
                ProjectCommands::Create { name, guild, user } => {
                    project::run_create(project::CreateOptions { name, guild, user }, &globals)
                }
                ProjectCommands::Delete { project, caller } => {
                    project::run_delete(project::DeleteOptions { project, caller }, &globals)
                }
                ProjectCommands::List { guild } => {
                    project::run_list(project::ListOptions { guild }, &globals)
                }
                ProjectCommands::Show { project } => {
                    project::run_show(project::ShowOptions { project }, &globals)
                }
            },
            Commands::Member(cmd) => match cmd {
                MemberCommands::Add {
                    project,
                    target,
                    caller,
                } => member::run(
                    member::MemberOptions {
                        project,
                        target,
                        caller,
                        remove: false,
                    },
                    &globals,
                ),
                MemberCommands::Remove {
                    project,
                    target,
                    caller,
                } => member::run(
                    member::MemberOptions {
                        project,
                        target,
                        caller,
                        remove: true,
                    },
                    &globals,
                ),
            },
            Commands::Forum(cmd) => match cmd {
                ForumCommands::Create {
                    project,
                    name,
                    caller,
                } => forum::run_create(
                    forum::CreateOptions {
                        project,
                        name,
                        caller,
                    },
                    &globals,
                ),
                ForumCommands::Delete {
                    project,
                    forum,
                    caller,
                } => forum::run_delete(
                    forum::DeleteOptions {
                        project,
                        forum,
                        caller,
                    },
                    &globals,
                ),
            },
        }
    }
}
