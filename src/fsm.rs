//! Task state machine.
//!
//! ```text
//!   task-init ──► ToDo ──take──► InProgress ──done──► WaitingForApprove ──approve──► Done
//!                  ▲                │   ▲                     │
//!                  └───surrender────┘   └────────revoke───────┘
//! ```
//!
//! Every command runs the same pipeline: resolve the thread, find the owning
//! project, make sure the forum's status tags are known, validate and compute
//! the next task state, then apply the tag, update the panel and persist the
//! project, in that order. The record on disk only changes once the platform
//! already shows the new state, so a failed command can simply be re-run.

use std::collections::BTreeMap;

use chrono::SecondsFormat;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{Project, Task, TaskStatus};
use crate::panel;
use crate::platform::Platform;
use crate::store::ProjectStore;
use crate::tags;

/// A task command as issued from inside a forum post thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskCommand {
    Init,
    Take,
    Done { description: String },
    Approve,
    Revoke,
    Surrender,
}

impl TaskCommand {
    pub fn name(&self) -> &'static str {
        match self {
            TaskCommand::Init => "task-init",
            TaskCommand::Take => "task-take",
            TaskCommand::Done { .. } => "task-done",
            TaskCommand::Approve => "task-approve",
            TaskCommand::Revoke => "task-revoke",
            TaskCommand::Surrender => "task-surrender",
        }
    }

    /// Status the task must be in for this command to apply.
    pub fn required_status(&self) -> TaskStatus {
        match self {
            TaskCommand::Init | TaskCommand::Take => TaskStatus::ToDo,
            TaskCommand::Done { .. } | TaskCommand::Surrender => TaskStatus::InProgress,
            TaskCommand::Approve | TaskCommand::Revoke => TaskStatus::WaitingForApprove,
        }
    }

    /// Message posted publicly in the thread after the command succeeded.
    fn public_post(&self, caller_id: &str) -> Option<String> {
        match self {
            TaskCommand::Done { description } => Some(format!(
                "🟦 Submitted for approval by <@{caller_id}>\n\n{}",
                description.trim()
            )),
            TaskCommand::Approve => Some(format!(
                "✅ Approved by <@{caller_id}> at {}",
                chrono::Local::now().to_rfc3339_opts(SecondsFormat::Secs, true)
            )),
            _ => None,
        }
    }

    fn success_reply(&self, already_initialized: bool) -> &'static str {
        match self {
            TaskCommand::Init if already_initialized => "task already initialized ✅ (panel refreshed)",
            TaskCommand::Init => "task initialized ✅ (status panel pinned, tag set to ToDo)",
            TaskCommand::Take => "taken ✅ (status set to InProgress)",
            TaskCommand::Done { .. } => "submitted ✅ (status set to WaitingForApprove)",
            TaskCommand::Approve => "approved ✅ (status set to Done)",
            TaskCommand::Revoke => "revoked ✅ (back to InProgress)",
            TaskCommand::Surrender => "surrendered ✅ (back to ToDo)",
        }
    }
}

/// Who issued a command, and where.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub guild_id: String,
    /// Channel the command was issued in; must be a forum post thread.
    pub channel_id: String,
    pub caller_id: String,
    /// Live role IDs of the caller; `None` when they could not be read.
    pub caller_roles: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadContext {
    pub thread_id: String,
    pub forum_id: String,
}

/// Result of a successful command.
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub command: &'static str,
    pub reply: String,
    pub slug: String,
    pub thread_id: String,
    pub forum_id: String,
    pub previous_status: Option<TaskStatus>,
    pub task: Task,
    pub panel_created: bool,
    pub tags_resolved: bool,
}

/// Check that `channel_id` is a post thread under a forum.
pub fn resolve_thread(platform: &dyn Platform, channel_id: &str) -> Result<ThreadContext> {
    let channel_id = channel_id.trim();
    if channel_id.is_empty() {
        return Err(Error::NotAThread("no channel".to_string()));
    }

    let channel = platform.channel(channel_id)?;
    if !channel.kind.is_thread() {
        return Err(Error::NotAThread(channel_id.to_string()));
    }
    let forum_id = channel
        .parent_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::ThreadHasNoForumParent(channel_id.to_string()))?;

    Ok(ThreadContext {
        thread_id: channel_id.to_string(),
        forum_id: forum_id.to_string(),
    })
}

/// The single project of `guild_id` that owns `forum_id`.
pub fn find_project_for_forum(
    projects: &BTreeMap<String, Project>,
    guild_id: &str,
    forum_id: &str,
) -> Result<Project> {
    let guild_id = guild_id.trim();
    let forum_id = forum_id.trim();
    if guild_id.is_empty() {
        return Err(Error::GuildRequired);
    }
    if forum_id.is_empty() {
        return Err(Error::MissingArgument("forum id".to_string()));
    }

    let mut hits: Vec<&Project> = projects
        .values()
        .filter(|p| p.guild_id.trim() == guild_id && p.has_forum(forum_id))
        .collect();

    match hits.len() {
        0 => Err(Error::NotAProjectForum(forum_id.to_string())),
        1 => Ok(hits.remove(0).clone()),
        _ => Err(Error::DataConflict {
            forum: forum_id.to_string(),
            slugs: hits.iter().map(|p| p.slug.clone()).collect(),
        }),
    }
}

fn bad_state(command: &TaskCommand, status: TaskStatus) -> Error {
    Error::BadState {
        command: command.name().to_string(),
        status: status.tag_name().to_string(),
        expected: command.required_status().tag_name().to_string(),
    }
}

/// Compute the next task state. Pure: no I/O, no clock.
///
/// State is checked before the actor, so an out-of-state command reports
/// `BadState` even for callers who could never run it.
pub fn transition(
    current: Option<&Task>,
    ctx: &ThreadContext,
    command: &TaskCommand,
    caller_id: &str,
    is_leader: bool,
) -> Result<Task> {
    let caller_id = caller_id.trim();

    if let TaskCommand::Done { description } = command {
        if description.trim().is_empty() {
            return Err(Error::MissingArgument("description".to_string()));
        }
    }

    let current = match (command, current) {
        (TaskCommand::Init, None) => {
            return Ok(Task::new(ctx.thread_id.clone(), ctx.forum_id.clone()));
        }
        (_, Some(task)) if !task.thread_id.trim().is_empty() => task,
        _ => return Err(Error::NotInitialized(ctx.thread_id.clone())),
    };

    if current.status != command.required_status() {
        return Err(bad_state(command, current.status));
    }

    let mut next = current.clone();
    next.thread_id = ctx.thread_id.clone();
    next.forum_id = ctx.forum_id.clone();

    match command {
        TaskCommand::Init => next.reset_to_todo(),
        TaskCommand::Take => {
            if !current.assignee_user_id.is_empty() {
                return Err(bad_state(command, current.status));
            }
            next.status = TaskStatus::InProgress;
            next.assignee_user_id = caller_id.to_string();
            next.done_description.clear();
            next.approved_by_user_id.clear();
        }
        TaskCommand::Done { description } => {
            if !is_leader && !current.is_assignee(caller_id) {
                return Err(Error::NotAllowed(
                    "only assignee or leader can do this".to_string(),
                ));
            }
            next.status = TaskStatus::WaitingForApprove;
            next.done_description = description.trim().to_string();
            next.approved_by_user_id.clear();
        }
        TaskCommand::Approve => {
            if !is_leader {
                return Err(Error::NotAllowed(
                    "only project leader can approve".to_string(),
                ));
            }
            next.status = TaskStatus::Done;
            next.approved_by_user_id = caller_id.to_string();
        }
        TaskCommand::Revoke => {
            if !is_leader {
                return Err(Error::NotAllowed("only project leader can revoke".to_string()));
            }
            next.status = TaskStatus::InProgress;
            next.done_description.clear();
            next.approved_by_user_id.clear();
        }
        TaskCommand::Surrender => {
            if !is_leader && !current.is_assignee(caller_id) {
                return Err(Error::NotAllowed(
                    "only assignee or leader can surrender".to_string(),
                ));
            }
            next.reset_to_todo();
        }
    }

    Ok(next)
}

/// Drives task commands against a store and a platform.
pub struct TaskFsm<P> {
    store: ProjectStore,
    platform: P,
}

impl<P: Platform> TaskFsm<P> {
    pub fn new(store: ProjectStore, platform: P) -> Self {
        Self { store, platform }
    }

    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn execute(&self, invocation: &Invocation, command: TaskCommand) -> Result<TaskOutcome> {
        let result = self.run(invocation, &command);
        if let Err(err) = &result {
            if err.is_refusal() {
                tracing::debug!(command = command.name(), channel = %invocation.channel_id, err = %err, "task command refused");
            } else {
                tracing::error!(command = command.name(), channel = %invocation.channel_id, err = %err, "task command failed");
            }
        }
        result
    }

    fn run(&self, invocation: &Invocation, command: &TaskCommand) -> Result<TaskOutcome> {
        let platform: &dyn Platform = &self.platform;
        let guild_id = invocation.guild_id.trim();
        let caller_id = invocation.caller_id.trim();
        if guild_id.is_empty() {
            return Err(Error::GuildRequired);
        }
        if let TaskCommand::Done { description } = command {
            if description.trim().is_empty() {
                return Err(Error::MissingArgument("description".to_string()));
            }
        }
        if caller_id.is_empty() && *command != TaskCommand::Init {
            return Err(Error::MissingArgument("user id".to_string()));
        }

        let ctx = resolve_thread(platform, &invocation.channel_id)?;
        let projects = self.store.load_all()?;
        let project = find_project_for_forum(&projects, guild_id, &ctx.forum_id)?;

        let had_tags = tags::has_status_tags(&project, &ctx.forum_id);
        let mut project = tags::ensure_forum_tags(platform, project, &ctx.forum_id)?;

        let current = project.tasks.get(&ctx.thread_id).cloned();
        let is_leader = project.is_leader(caller_id, invocation.caller_roles.as_deref());
        let mut next = transition(current.as_ref(), &ctx, command, caller_id, is_leader)?;

        tags::apply_status_tag(platform, &project, &ctx.forum_id, &ctx.thread_id, next.status)?;
        let panel_created = panel::upsert_panel(platform, &project, &mut next)?;

        project.tasks.insert(ctx.thread_id.clone(), next.clone());
        self.store
            .update(&project)
            .map_err(|err| Error::StoreWriteFailed(err.to_string()))?;

        tracing::info!(
            slug = %project.slug,
            thread = %ctx.thread_id,
            command = command.name(),
            from = current.as_ref().map(|t| t.status.as_str()).unwrap_or("none"),
            to = next.status.as_str(),
            caller = %caller_id,
            "task transition"
        );

        if let Some(content) = command.public_post(caller_id) {
            if let Err(err) = platform.send_message(&ctx.thread_id, &content) {
                tracing::warn!(slug = %project.slug, thread = %ctx.thread_id, err = %err, "failed to post thread update");
            }
        }

        Ok(TaskOutcome {
            command: command.name(),
            reply: command.success_reply(current.is_some()).to_string(),
            slug: project.slug,
            thread_id: ctx.thread_id,
            forum_id: ctx.forum_id,
            previous_status: current.map(|t| t.status),
            task: next,
            panel_created,
            tags_resolved: !had_tags,
        })
    }
}
