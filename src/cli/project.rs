//! forum-kanban project command implementation
//!
//! `create` and `delete` provision on Discord; `list` and `show` only read
//! the data directory and need no token.

use serde::Serialize;

use crate::error::Result;
use crate::model::{Project, TaskStatus};
use crate::output::{emit_success, HumanOutput};
use crate::provision::{self, Caller, ProvisionOutcome};

use super::{caller_roles, CallerArgs, GlobalOptions};

pub struct CreateOptions {
    pub name: String,
    pub guild: String,
    pub user: String,
}

pub struct DeleteOptions {
    pub project: String,
    pub caller: CallerArgs,
}

pub struct ListOptions {
    pub guild: Option<String>,
}

pub struct ShowOptions {
    pub project: String,
}

/// One line of `project list`.
#[derive(Debug, Serialize)]
struct ProjectSummary {
    slug: String,
    name: String,
    guild_id: String,
    forums: usize,
    members: usize,
    tasks: usize,
}

impl From<&Project> for ProjectSummary {
    fn from(project: &Project) -> Self {
        Self {
            slug: project.slug.clone(),
            name: project.name.clone(),
            guild_id: project.guild_id.clone(),
            forums: project.forum_channel_ids.len(),
            members: project.members.len(),
            tasks: project.tasks.len(),
        }
    }
}

pub fn run_create(options: CreateOptions, globals: &GlobalOptions) -> Result<()> {
    let config = globals.load_config()?;
    let store = globals.store(&config);
    let platform = globals.platform(&config)?;

    let caller = Caller {
        guild_id: options.guild,
        user_id: options.user,
        roles: None,
    };
    let outcome = provision::create_project(&store, &platform, &caller, &options.name)?;
    emit_provision(globals, "project create", &outcome)
}

pub fn run_delete(options: DeleteOptions, globals: &GlobalOptions) -> Result<()> {
    let config = globals.load_config()?;
    let store = globals.store(&config);
    let platform = globals.platform(&config)?;

    let caller = resolve_caller(&platform, options.caller);
    let outcome = provision::delete_project(&store, &platform, &caller, &options.project)?;
    emit_provision(globals, "project delete", &outcome)
}

pub fn run_list(options: ListOptions, globals: &GlobalOptions) -> Result<()> {
    let config = globals.load_config()?;
    let store = globals.store(&config);

    let guild = options.guild.as_deref().map(str::trim).filter(|g| !g.is_empty());
    let projects: Vec<ProjectSummary> = store
        .load_all()?
        .values()
        .filter(|p| match guild {
            Some(g) => p.guild_id == g,
            None => true,
        })
        .map(ProjectSummary::from)
        .collect();

    let mut human = HumanOutput::new(format!("{} project(s)", projects.len()));
    for p in &projects {
        human.push_detail(format!(
            "{} ({}): guild {}, {} forum(s), {} member(s), {} task(s)",
            p.slug, p.name, p.guild_id, p.forums, p.members, p.tasks
        ));
    }
    if projects.is_empty() {
        human.push_next_step("forum-kanban project create <name> --guild <id> --user <id>");
    }

    emit_success(globals.output, "project list", &projects, Some(&human))
}

pub fn run_show(options: ShowOptions, globals: &GlobalOptions) -> Result<()> {
    let config = globals.load_config()?;
    let store = globals.store(&config);
    let project = provision::find_project_by_input(&store.load_all()?, &options.project)?;

    let mut human = HumanOutput::new(format!("{} (`{}`)", project.name, project.slug));
    human.push_summary("guild", project.guild_id.clone());
    human.push_summary("category", project.category_id.clone());
    human.push_summary(
        "roles",
        format!(
            "{} ({}), {} ({})",
            project.member_role_name(),
            project.member_role_id,
            project.leader_role_name(),
            project.leader_role_id
        ),
    );
    human.push_summary("forums", project.forum_channel_ids.join(", "));
    human.push_summary("tasks", status_counts(&project));
    for (user, role) in &project.members {
        human.push_detail(format!("<@{user}> {role:?}"));
    }

    emit_success(globals.output, "project show", &project, Some(&human))
}

fn status_counts(project: &Project) -> String {
    TaskStatus::ALL
        .iter()
        .map(|status| {
            let count = project.tasks.values().filter(|t| t.status == *status).count();
            format!("{count} {}", status.tag_name())
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Provisioning callers with live roles attached.
pub(super) fn resolve_caller(platform: &dyn crate::platform::Platform, args: CallerArgs) -> Caller {
    let roles = caller_roles(platform, &args.guild, &args.user, &args.roles);
    Caller {
        guild_id: args.guild,
        user_id: args.user,
        roles,
    }
}

pub(super) fn emit_provision(
    globals: &GlobalOptions,
    command: &str,
    outcome: &ProvisionOutcome,
) -> Result<()> {
    let mut human = HumanOutput::new(outcome.reply.clone());
    for warning in &outcome.warnings {
        human.push_warning(warning.clone());
    }
    emit_success(globals.output, command, outcome, Some(&human))
}
