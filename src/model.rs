//! Project and task records.
//!
//! A [`Project`] is the persisted aggregate root (one JSON file per project).
//! Tasks live inside it keyed by their forum thread ID. Every record passes
//! through [`Project::normalize`] on load and before every write, which trims
//! strings, fills absent containers and restores the status invariants.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Slug used when a name normalizes to nothing.
pub const DEFAULT_SLUG: &str = "project";

/// Membership role stored in the project record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ProjectRole {
    Leader,
    Member,
}

/// Task lifecycle state.
///
/// Stored as a stable machine value (`todo`, `in_progress`, ...), independent
/// of the forum tag names shown to users.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "todo")]
    ToDo,
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "waiting_for_approve")]
    WaitingForApprove,
    #[serde(rename = "done")]
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::ToDo,
        TaskStatus::InProgress,
        TaskStatus::WaitingForApprove,
        TaskStatus::Done,
    ];

    /// Value written to the project file.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::ToDo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::WaitingForApprove => "waiting_for_approve",
            TaskStatus::Done => "done",
        }
    }

    /// Name of the forum tag that represents this status.
    pub fn tag_name(self) -> &'static str {
        match self {
            TaskStatus::ToDo => "ToDo",
            TaskStatus::InProgress => "InProgress",
            TaskStatus::WaitingForApprove => "WaitingForApprove",
            TaskStatus::Done => "Done",
        }
    }

    /// Emoji label shown on the status panel.
    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::ToDo => "🟥 ToDo",
            TaskStatus::InProgress => "🟨 InProgress",
            TaskStatus::WaitingForApprove => "🟦 WaitingForApprove",
            TaskStatus::Done => "🟩 Done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag_name())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(TaskStatus::ToDo);
        }
        TaskStatus::ALL
            .into_iter()
            .find(|status| {
                status.as_str() == trimmed || status.tag_name().eq_ignore_ascii_case(trimmed)
            })
            .ok_or_else(|| Error::InvalidArgument(format!("unknown task status: {trimmed}")))
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// `null` and missing both become the empty container.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One forum post thread tracked as a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub thread_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub forum_id: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub assignee_user_id: String,
    /// Bot-owned pinned panel message.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status_message_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub done_description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub approved_by_user_id: String,
}

impl Task {
    pub fn new(thread_id: impl Into<String>, forum_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            forum_id: forum_id.into(),
            ..Self::default()
        }
    }

    /// Back to an unassigned ToDo, keeping the thread, forum and panel.
    pub fn reset_to_todo(&mut self) {
        self.status = TaskStatus::ToDo;
        self.assignee_user_id.clear();
        self.done_description.clear();
        self.approved_by_user_id.clear();
    }

    pub fn is_assignee(&self, user_id: &str) -> bool {
        !self.assignee_user_id.is_empty() && self.assignee_user_id == user_id.trim()
    }

    /// First status invariant this task breaks, if any.
    pub fn coherence_violation(&self) -> Option<&'static str> {
        match self.status {
            TaskStatus::ToDo => {
                if !self.assignee_user_id.is_empty() {
                    Some("todo task has an assignee")
                } else if !self.done_description.is_empty() {
                    Some("todo task has a done description")
                } else if !self.approved_by_user_id.is_empty() {
                    Some("todo task has an approver")
                } else {
                    None
                }
            }
            TaskStatus::InProgress => {
                if self.assignee_user_id.is_empty() {
                    Some("in-progress task has no assignee")
                } else if !self.approved_by_user_id.is_empty() {
                    Some("in-progress task has an approver")
                } else {
                    None
                }
            }
            TaskStatus::WaitingForApprove => {
                if self.assignee_user_id.is_empty() {
                    Some("waiting task has no assignee")
                } else if self.done_description.is_empty() {
                    Some("waiting task has no done description")
                } else {
                    None
                }
            }
            TaskStatus::Done => {
                if self.approved_by_user_id.is_empty() {
                    Some("done task has no approver")
                } else {
                    None
                }
            }
        }
    }

    fn normalize(&mut self, thread_key: &str) {
        self.thread_id = thread_key.to_string();
        self.forum_id = self.forum_id.trim().to_string();
        self.assignee_user_id = self.assignee_user_id.trim().to_string();
        self.status_message_id = self.status_message_id.trim().to_string();
        self.done_description = self.done_description.trim().to_string();
        self.approved_by_user_id = self.approved_by_user_id.trim().to_string();
        self.restore_coherence();
    }

    // Done without an approver cannot be repaired from the record alone and
    // is left as is.
    fn restore_coherence(&mut self) {
        match self.status {
            TaskStatus::ToDo => self.reset_to_todo(),
            TaskStatus::InProgress => {
                if self.assignee_user_id.is_empty() {
                    self.reset_to_todo();
                } else {
                    self.approved_by_user_id.clear();
                }
            }
            TaskStatus::WaitingForApprove => {
                if self.assignee_user_id.is_empty() {
                    self.reset_to_todo();
                } else if self.done_description.is_empty() {
                    self.status = TaskStatus::InProgress;
                    self.approved_by_user_id.clear();
                }
            }
            TaskStatus::Done => {}
        }
    }
}

/// Persisted project record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub guild_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub member_role_id: String,
    #[serde(default)]
    pub leader_role_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub members: BTreeMap<String, ProjectRole>,
    #[serde(default)]
    pub category_id: String,
    /// Forum channel IDs in insertion order. The JSON key stays `forums`.
    #[serde(rename = "forums", default, deserialize_with = "null_as_default")]
    pub forum_channel_ids: Vec<String>,
    /// forumID -> (tagName -> tagID), filled lazily.
    #[serde(default, deserialize_with = "null_as_default")]
    pub forum_tag_ids: BTreeMap<String, BTreeMap<String, String>>,
    /// threadID -> task
    #[serde(default, deserialize_with = "null_as_default")]
    pub tasks: BTreeMap<String, Task>,
}

impl Project {
    pub fn new(guild_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse a record and normalize it; `fallback_slug` fills a missing slug.
    pub fn from_json(bytes: &[u8], fallback_slug: &str) -> Result<Self> {
        let mut project: Project = serde_json::from_slice(bytes)?;
        if project.slug.trim().is_empty() {
            project.slug = fallback_slug.to_string();
        }
        project.normalize();
        Ok(project)
    }

    /// Pretty JSON as written to disk.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    pub fn normalize(&mut self) {
        self.guild_id = self.guild_id.trim().to_string();
        self.name = self.name.trim().to_string();
        self.category_id = self.category_id.trim().to_string();
        self.member_role_id = self.member_role_id.trim().to_string();
        self.leader_role_id = self.leader_role_id.trim().to_string();
        self.slug = if self.slug.trim().is_empty() {
            slugify(&self.name)
        } else {
            slugify(&self.slug)
        };

        self.members = std::mem::take(&mut self.members)
            .into_iter()
            .filter_map(|(user, role)| {
                let user = user.trim().to_string();
                (!user.is_empty()).then_some((user, role))
            })
            .collect();

        let mut seen = HashSet::new();
        self.forum_channel_ids = std::mem::take(&mut self.forum_channel_ids)
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty() && seen.insert(id.clone()))
            .collect();

        self.forum_tag_ids = std::mem::take(&mut self.forum_tag_ids)
            .into_iter()
            .filter_map(|(forum, tags)| {
                let forum = forum.trim().to_string();
                let tags: BTreeMap<String, String> = tags
                    .into_iter()
                    .filter_map(|(name, id)| {
                        let name = name.trim().to_string();
                        let id = id.trim().to_string();
                        (!name.is_empty() && !id.is_empty()).then_some((name, id))
                    })
                    .collect();
                (!forum.is_empty() && !tags.is_empty()).then_some((forum, tags))
            })
            .collect();

        // Tasks are never dropped here; a missing forum_id is backfilled by
        // the next transition, and only `remove_forum` prunes tasks.
        self.tasks = std::mem::take(&mut self.tasks)
            .into_iter()
            .filter_map(|(thread, mut task)| {
                let thread = thread.trim().to_string();
                if thread.is_empty() {
                    return None;
                }
                task.normalize(&thread);
                Some((thread, task))
            })
            .collect();
    }

    pub fn has_forum(&self, forum_id: &str) -> bool {
        let forum_id = forum_id.trim();
        !forum_id.is_empty()
            && self
                .forum_channel_ids
                .iter()
                .any(|id| id.trim() == forum_id)
    }

    /// Append a forum; returns false when it was already present.
    pub fn add_forum(&mut self, forum_id: &str) -> bool {
        let forum_id = forum_id.trim();
        if forum_id.is_empty() || self.has_forum(forum_id) {
            return false;
        }
        self.forum_channel_ids.push(forum_id.to_string());
        true
    }

    /// Remove a forum with its tag mapping and tasks.
    pub fn remove_forum(&mut self, forum_id: &str) -> bool {
        let forum_id = forum_id.trim();
        let before = self.forum_channel_ids.len();
        self.forum_channel_ids.retain(|id| id.trim() != forum_id);
        self.forum_tag_ids.remove(forum_id);
        self.tasks.retain(|_, task| task.forum_id != forum_id);
        self.forum_channel_ids.len() != before
    }

    pub fn role_of(&self, user_id: &str) -> Option<ProjectRole> {
        self.members.get(user_id.trim()).copied()
    }

    /// Leader test: live leader role OR stored `Leader` membership.
    ///
    /// `live_roles` is `None` when the caller's role list is unavailable.
    pub fn is_leader(&self, user_id: &str, live_roles: Option<&[String]>) -> bool {
        if let Some(roles) = live_roles {
            if !self.leader_role_id.is_empty()
                && roles.iter().any(|role| role.trim() == self.leader_role_id)
            {
                return true;
            }
        }
        !user_id.trim().is_empty() && self.role_of(user_id) == Some(ProjectRole::Leader)
    }

    pub fn member_role_name(&self) -> String {
        format!("{}-member", self.slug)
    }

    pub fn leader_role_name(&self) -> String {
        format!("{}-leader", self.slug)
    }
}

/// Normalize a name into a slug: lowercase, spaces to `-`, only `[a-z0-9-]`,
/// no leading/trailing `-`. Empty results become [`DEFAULT_SLUG`].
pub fn slugify(input: &str) -> String {
    let lowered = input.trim().to_lowercase().replace(' ', "-");
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect();
    let trimmed = kept.trim_matches('-');
    if trimmed.is_empty() {
        DEFAULT_SLUG.to_string()
    } else {
        trimmed.to_string()
    }
}
