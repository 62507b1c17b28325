//! Forum tag resolution and application.
//!
//! Each forum carries its own tag IDs, so the status tags are looked up by
//! name once per forum and cached in `Project::forum_tag_ids`.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::model::{Project, TaskStatus};
use crate::platform::{ForumTag, ForumTagSpec, Platform};

/// Tags provisioned on every new project forum, in display order.
pub const DEFAULT_FORUM_TAGS: [(&str, &str); 7] = [
    ("ToDo", "🟥"),
    ("InProgress", "🟨"),
    ("WaitingForApprove", "🟦"),
    ("Done", "🟩"),
    ("Blocked", "⛔"),
    ("Bug", "🐞"),
    ("Idea", "💡"),
];

pub fn default_forum_tags() -> Vec<ForumTagSpec> {
    DEFAULT_FORUM_TAGS
        .iter()
        .map(|(name, emoji)| ForumTagSpec {
            name: (*name).to_string(),
            emoji_name: Some((*emoji).to_string()),
            moderated: false,
        })
        .collect()
}

/// tagName -> tagID for every named tag with an ID.
pub fn tag_map_from(tags: &[ForumTag]) -> BTreeMap<String, String> {
    tags.iter()
        .filter_map(|tag| {
            let name = tag.name.trim();
            let id = tag.id.trim();
            (!name.is_empty() && !id.is_empty()).then(|| (name.to_string(), id.to_string()))
        })
        .collect()
}

/// Canonical status tag names absent from `map`.
pub fn missing_status_tags(map: &BTreeMap<String, String>) -> Vec<String> {
    TaskStatus::ALL
        .iter()
        .map(|status| status.tag_name())
        .filter(|name| !map.contains_key(*name))
        .map(str::to_string)
        .collect()
}

/// Build the cached mapping for a forum from its live tag list.
pub fn status_tag_map(forum_id: &str, tags: &[ForumTag]) -> Result<BTreeMap<String, String>> {
    let map = tag_map_from(tags);
    if map.is_empty() {
        return Err(Error::NoTagsConfigured(forum_id.to_string()));
    }
    let missing = missing_status_tags(&map);
    if !missing.is_empty() {
        return Err(Error::MissingStatusTags {
            forum: forum_id.to_string(),
            missing,
        });
    }
    Ok(map)
}

/// Whether the cached mapping for `forum_id` covers every status tag.
pub fn has_status_tags(project: &Project, forum_id: &str) -> bool {
    project
        .forum_tag_ids
        .get(forum_id.trim())
        .is_some_and(|tags| missing_status_tags(tags).is_empty())
}

/// Make sure `project.forum_tag_ids[forum_id]` is populated.
///
/// A cached mapping holding all four status tags is returned as is. A
/// missing or partial one is replaced by a fresh fetch attached to the
/// returned project; persisting it is up to the caller.
pub fn ensure_forum_tags(
    platform: &dyn Platform,
    mut project: Project,
    forum_id: &str,
) -> Result<Project> {
    let forum_id = forum_id.trim();
    if forum_id.is_empty() {
        return Err(Error::MissingArgument("forum id".to_string()));
    }
    if has_status_tags(&project, forum_id) {
        return Ok(project);
    }
    if project.forum_tag_ids.contains_key(forum_id) {
        tracing::warn!(slug = %project.slug, forum = %forum_id, "cached forum tags incomplete, refetching");
    }

    let tags = platform.forum_tags(forum_id)?;
    let map = status_tag_map(forum_id, &tags)?;

    tracing::info!(
        slug = %project.slug,
        forum = %forum_id,
        tags = map.len(),
        "resolved forum tags"
    );
    project.forum_tag_ids.insert(forum_id.to_string(), map);
    Ok(project)
}

/// Replace the thread's applied tags with the single tag for `status`.
pub fn apply_status_tag(
    platform: &dyn Platform,
    project: &Project,
    forum_id: &str,
    thread_id: &str,
    status: TaskStatus,
) -> Result<()> {
    let forum_id = forum_id.trim();
    let tag_name = status.tag_name();
    let tag_id = project
        .forum_tag_ids
        .get(forum_id)
        .and_then(|tags| tags.get(tag_name))
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            Error::TagApplyFailed(format!("missing tag id for {tag_name} in forum {forum_id}"))
        })?;

    platform
        .set_applied_tags(thread_id, &[tag_id.to_string()])
        .map_err(|err| Error::TagApplyFailed(err.to_string()))?;

    tracing::debug!(forum = %forum_id, thread = %thread_id, status = %status, tag = %tag_id, "applied status tag");
    Ok(())
}
