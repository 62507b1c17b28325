//! Read-only status panel: one bot-authored, pinned embed per task thread.

use crate::error::{Error, Result};
use crate::model::{Project, Task};
use crate::platform::{Embed, EmbedField, Platform};

pub const PANEL_TITLE: &str = "Task Status Panel";
pub const PANEL_DESCRIPTION: &str = "Read-only panel. Use /kanban task-* commands to update.";

const EMPTY_VALUE: &str = "—";

fn mention(user_id: &str) -> String {
    if user_id.trim().is_empty() {
        EMPTY_VALUE.to_string()
    } else {
        format!("<@{}>", user_id.trim())
    }
}

fn field(name: &str, value: String, inline: bool) -> EmbedField {
    EmbedField {
        name: name.to_string(),
        value,
        inline,
    }
}

/// Render the panel for the current task state.
pub fn render_panel(project: &Project, task: &Task) -> Embed {
    let description = if task.done_description.trim().is_empty() {
        EMPTY_VALUE.to_string()
    } else {
        task.done_description.clone()
    };

    Embed {
        title: PANEL_TITLE.to_string(),
        description: PANEL_DESCRIPTION.to_string(),
        fields: vec![
            field(
                "Project",
                format!("{} (`{}`)", project.name, project.slug),
                false,
            ),
            field("Status", task.status.label().to_string(), true),
            field("Assignee", mention(&task.assignee_user_id), true),
            field("Approved By", mention(&task.approved_by_user_id), true),
            field("Done Description", description, false),
        ],
    }
}

/// Return the task's panel message ID, posting (and pinning) a new panel
/// when the task has none yet. A failed pin is logged and ignored.
pub fn ensure_panel(platform: &dyn Platform, project: &Project, task: &Task) -> Result<String> {
    let existing = task.status_message_id.trim();
    if !existing.is_empty() {
        return Ok(existing.to_string());
    }

    let message = platform.send_embed(&task.thread_id, &render_panel(project, task))?;
    if message.id.trim().is_empty() {
        return Err(Error::Platform {
            status: None,
            message: "platform returned an empty message id".to_string(),
        });
    }

    if let Err(err) = platform.pin_message(&task.thread_id, &message.id) {
        tracing::warn!(
            slug = %project.slug,
            thread = %task.thread_id,
            message = %message.id,
            err = %err,
            "failed to pin status panel"
        );
    }

    tracing::info!(slug = %project.slug, thread = %task.thread_id, message = %message.id, "posted status panel");
    Ok(message.id)
}

/// Bring the panel in line with `task`, creating it first if needed.
///
/// Writes a newly created message ID into `task.status_message_id`; returns
/// whether a panel was created. Errors surface as `PanelWriteFailed`.
pub fn upsert_panel(platform: &dyn Platform, project: &Project, task: &mut Task) -> Result<bool> {
    let had_panel = !task.status_message_id.trim().is_empty();
    let message_id = ensure_panel(platform, project, task)
        .map_err(|err| Error::PanelWriteFailed(err.to_string()))?;
    task.status_message_id = message_id;

    platform
        .edit_embed(
            &task.thread_id,
            &task.status_message_id,
            &render_panel(project, task),
        )
        .map_err(|err| Error::PanelWriteFailed(err.to_string()))?;

    Ok(!had_panel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskStatus;

    fn project() -> Project {
        let mut project = Project::new("g", "Alpha Project");
        project.slug = "alpha-project".into();
        project
    }

    #[test]
    fn fresh_task_renders_dashes() {
        let embed = render_panel(&project(), &Task::new("T", "F"));
        assert_eq!(embed.title, PANEL_TITLE);
        assert_eq!(embed.description, PANEL_DESCRIPTION);
        assert_eq!(embed.field("Project"), Some("Alpha Project (`alpha-project`)"));
        assert_eq!(embed.field("Status"), Some("🟥 ToDo"));
        assert_eq!(embed.field("Assignee"), Some("—"));
        assert_eq!(embed.field("Approved By"), Some("—"));
        assert_eq!(embed.field("Done Description"), Some("—"));
    }

    #[test]
    fn done_task_renders_mentions_and_description() {
        let mut task = Task::new("T", "F");
        task.status = TaskStatus::Done;
        task.assignee_user_id = "M".into();
        task.approved_by_user_id = "L".into();
        task.done_description = "fixed X".into();

        let embed = render_panel(&project(), &task);
        assert_eq!(embed.field("Status"), Some("🟩 Done"));
        assert_eq!(embed.field("Assignee"), Some("<@M>"));
        assert_eq!(embed.field("Approved By"), Some("<@L>"));
        assert_eq!(embed.field("Done Description"), Some("fixed X"));
    }

    #[test]
    fn field_layout_is_stable() {
        let embed = render_panel(&project(), &Task::new("T", "F"));
        let layout: Vec<_> = embed
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.inline))
            .collect();
        assert_eq!(
            layout,
            [
                ("Project", false),
                ("Status", true),
                ("Assignee", true),
                ("Approved By", true),
                ("Done Description", false),
            ]
        );
    }
}
