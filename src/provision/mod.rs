//! Project lifecycle around the task workflow: projects, members, forums.
//!
//! Each operation performs its platform calls first and writes the project
//! record last. Cleanup steps that may fail without leaving the record
//! inconsistent (role removal, channel deletion during project delete) are
//! collected as warnings instead of aborting.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{slugify, Project, ProjectRole};
use crate::platform::{permissions, Platform, RoleOverwrite, RoleSpec};
use crate::store::ProjectStore;
use crate::tags;

pub mod colors;

pub const MEMBER_PERMISSIONS: u64 = permissions::VIEW_CHANNEL | permissions::READ_MESSAGE_HISTORY;

pub const LEADER_PERMISSIONS: u64 = MEMBER_PERMISSIONS
    | permissions::CREATE_PUBLIC_THREADS
    | permissions::SEND_MESSAGES_IN_THREADS
    | permissions::MANAGE_THREADS
    | permissions::MANAGE_MESSAGES;

/// Forum name used when none is given.
pub const DEFAULT_FORUM_NAME: &str = "general";

/// The user running a provisioning command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub guild_id: String,
    pub user_id: String,
    /// Live role IDs; `None` when unavailable.
    pub roles: Option<Vec<String>>,
}

impl Caller {
    fn guild(&self) -> Result<&str> {
        let guild = self.guild_id.trim();
        if guild.is_empty() {
            Err(Error::GuildRequired)
        } else {
            Ok(guild)
        }
    }

    fn require_leader(&self, project: &Project, action: &str) -> Result<()> {
        if project.is_leader(&self.user_id, self.roles.as_deref()) {
            Ok(())
        } else {
            Err(Error::NotAllowed(format!("only project leader can {action}")))
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisionOutcome {
    pub reply: String,
    pub project: Project,
    pub warnings: Vec<String>,
}

impl ProvisionOutcome {
    fn new(reply: String, project: Project, warnings: Vec<String>) -> Self {
        let reply = if warnings.is_empty() {
            reply
        } else {
            format!("{reply} with warnings: {}", warnings.join(", "))
        };
        Self {
            reply,
            project,
            warnings,
        }
    }
}

/// Resolve a project from user input: exact slug, slugified input, then
/// case-insensitive name (or name slug).
pub fn find_project_by_input(projects: &BTreeMap<String, Project>, input: &str) -> Result<Project> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::MissingArgument("project".to_string()));
    }
    if let Some(project) = projects.get(input) {
        return Ok(project.clone());
    }
    let input_slug = slugify(input);
    if let Some(project) = projects.get(&input_slug) {
        return Ok(project.clone());
    }

    let matches: Vec<&Project> = projects
        .values()
        .filter(|p| p.name.eq_ignore_ascii_case(input) || slugify(&p.name) == input_slug)
        .collect();
    match matches.as_slice() {
        [] => Err(Error::NotFound(input.to_string())),
        [only] => Ok((*only).clone()),
        many => Err(Error::InvalidArgument(format!(
            "ambiguous project, use slug: {}",
            many.iter()
                .map(|p| p.slug.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

fn load_for_caller(store: &ProjectStore, caller: &Caller, input: &str) -> Result<Project> {
    let guild = caller.guild()?;
    let projects: BTreeMap<String, Project> = store
        .load_all()?
        .into_iter()
        .filter(|(_, p)| p.guild_id == guild)
        .collect();
    find_project_by_input(&projects, input)
}

/// Reuse `<slug>-member` / `<slug>-leader` when they exist, else create them.
pub fn ensure_project_roles(
    platform: &dyn Platform,
    guild_id: &str,
    slug: &str,
) -> Result<(String, String)> {
    let member_name = format!("{slug}-member");
    let leader_name = format!("{slug}-leader");

    let mut member_role_id = None;
    let mut leader_role_id = None;
    for role in platform.guild_roles(guild_id)? {
        if role.name == member_name {
            member_role_id = Some(role.id);
        } else if role.name == leader_name {
            leader_role_id = Some(role.id);
        }
    }

    let member_role_id = match member_role_id {
        Some(id) => id,
        None => {
            platform
                .create_role(
                    guild_id,
                    &RoleSpec {
                        name: member_name,
                        permissions: MEMBER_PERMISSIONS,
                        color: colors::random_member_color(),
                        hoist: false,
                        mentionable: false,
                    },
                )?
                .id
        }
    };
    let leader_role_id = match leader_role_id {
        Some(id) => id,
        None => {
            platform
                .create_role(
                    guild_id,
                    &RoleSpec {
                        name: leader_name,
                        permissions: LEADER_PERMISSIONS,
                        color: colors::random_leader_color(),
                        hoist: true,
                        mentionable: false,
                    },
                )?
                .id
        }
    };

    Ok((member_role_id, leader_role_id))
}

/// Overwrites hiding a category from `@everyone` (role ID = guild ID) and
/// showing it to `allow_role_ids`.
pub fn private_category_overwrites(
    guild_id: &str,
    allow_role_ids: &[&str],
) -> Result<Vec<RoleOverwrite>> {
    let guild_id = guild_id.trim();
    if guild_id.is_empty() {
        return Err(Error::GuildRequired);
    }

    let mut allowed: Vec<&str> = Vec::new();
    for id in allow_role_ids.iter().map(|id| id.trim()) {
        if !id.is_empty() && !allowed.contains(&id) {
            allowed.push(id);
        }
    }
    if allowed.is_empty() {
        return Err(Error::InvalidArgument(
            "private category requires at least one allowed role".to_string(),
        ));
    }

    let mut overwrites = vec![RoleOverwrite {
        role_id: guild_id.to_string(),
        allow: 0,
        deny: permissions::VIEW_CHANNEL,
    }];
    overwrites.extend(allowed.into_iter().map(|id| RoleOverwrite {
        role_id: id.to_string(),
        allow: permissions::VIEW_CHANNEL,
        deny: 0,
    }));
    Ok(overwrites)
}

pub fn create_project(
    store: &ProjectStore,
    platform: &dyn Platform,
    caller: &Caller,
    name: &str,
) -> Result<ProvisionOutcome> {
    let guild = caller.guild()?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::MissingArgument("project name".to_string()));
    }
    let user = caller.user_id.trim();

    let slug = store.find_available_slug(&slugify(name))?;
    let (member_role_id, leader_role_id) = ensure_project_roles(platform, guild, &slug)?;

    let mut warnings = Vec::new();
    if !user.is_empty() {
        if let Err(err) = platform.add_member_role(guild, user, &leader_role_id) {
            tracing::warn!(guild = %guild, user = %user, role = %leader_role_id, err = %err, "failed to assign leader role");
            warnings.push("leaderRoleAssign".to_string());
        }
    }

    let overwrites =
        private_category_overwrites(guild, &[member_role_id.as_str(), leader_role_id.as_str()])?;
    let category = platform.create_category(guild, name, &overwrites)?;

    let mut project = Project::new(guild, name);
    project.slug = slug.clone();
    project.member_role_id = member_role_id;
    project.leader_role_id = leader_role_id;
    let category_id = category.id;
    project.category_id = category_id.clone();
    if !user.is_empty() {
        project.members.insert(user.to_string(), ProjectRole::Leader);
    }

    // Roles are named after the reserved slug and may be shared with
    // whoever took it, so only the new category is cleaned up.
    let project = match store.create_reserved(project) {
        Ok(project) => project,
        Err(err) => {
            tracing::error!(slug = %slug, err = %err, "failed to store new project");
            if let Err(cleanup) = platform.delete_channel(&category_id) {
                tracing::warn!(category = %category_id, err = %cleanup, "failed to delete category");
            }
            return Err(err);
        }
    };
    tracing::info!(slug = %project.slug, guild = %guild, "created project");

    let reply = format!(
        "created roles **{0}-member**/**{0}-leader**, private category **{1}**",
        slug, project.name
    );
    Ok(ProvisionOutcome::new(reply, project, warnings))
}

pub fn delete_project(
    store: &ProjectStore,
    platform: &dyn Platform,
    caller: &Caller,
    input: &str,
) -> Result<ProvisionOutcome> {
    let guild = caller.guild()?;
    let project = load_for_caller(store, caller, input)?;
    caller.require_leader(&project, "delete this project")?;

    let mut warnings = Vec::new();
    for forum in &project.forum_channel_ids {
        if let Err(err) = platform.delete_channel(forum) {
            tracing::warn!(slug = %project.slug, forum = %forum, err = %err, "failed to delete forum");
            warnings.push(format!("forum:{forum}"));
        }
    }
    if !project.category_id.is_empty() {
        if let Err(err) = platform.delete_channel(&project.category_id) {
            tracing::warn!(slug = %project.slug, category = %project.category_id, err = %err, "failed to delete category");
            warnings.push(format!("category:{}", project.category_id));
        }
    }
    for (label, role) in [
        ("memberRole", &project.member_role_id),
        ("leaderRole", &project.leader_role_id),
    ] {
        if role.is_empty() {
            continue;
        }
        if let Err(err) = platform.delete_role(guild, role) {
            tracing::warn!(slug = %project.slug, role = %role, err = %err, "failed to delete role");
            warnings.push(format!("{label}:{role}"));
        }
    }

    store.delete(&project.slug)?;
    tracing::info!(slug = %project.slug, guild = %guild, "deleted project");

    let reply = format!(
        "deleted project **{}** (slug: `{}`)",
        project.name, project.slug
    );
    Ok(ProvisionOutcome::new(reply, project, warnings))
}

pub fn add_member(
    store: &ProjectStore,
    platform: &dyn Platform,
    caller: &Caller,
    input: &str,
    target_user: &str,
) -> Result<ProvisionOutcome> {
    let guild = caller.guild()?;
    let target = target_user.trim();
    if target.is_empty() {
        return Err(Error::MissingArgument("user".to_string()));
    }
    let mut project = load_for_caller(store, caller, input)?;
    caller.require_leader(&project, "add members")?;

    if project.member_role_id.is_empty() {
        return Err(Error::InvalidArgument(
            "project has no member role id saved".to_string(),
        ));
    }
    platform.add_member_role(guild, target, &project.member_role_id)?;

    project
        .members
        .entry(target.to_string())
        .or_insert(ProjectRole::Member);
    let project = store.update(&project)?;
    tracing::info!(slug = %project.slug, user = %target, "added member");

    let reply = format!(
        "added <@{}> to project **{}** (slug: `{}`)",
        target, project.name, project.slug
    );
    Ok(ProvisionOutcome::new(reply, project, Vec::new()))
}

pub fn remove_member(
    store: &ProjectStore,
    platform: &dyn Platform,
    caller: &Caller,
    input: &str,
    target_user: &str,
) -> Result<ProvisionOutcome> {
    let guild = caller.guild()?;
    let target = target_user.trim();
    if target.is_empty() {
        return Err(Error::MissingArgument("user".to_string()));
    }
    let mut project = load_for_caller(store, caller, input)?;
    caller.require_leader(&project, "remove members")?;

    let mut warnings = Vec::new();
    for (label, role) in [
        ("memberRoleRemove", &project.member_role_id),
        ("leaderRoleRemove", &project.leader_role_id),
    ] {
        if role.is_empty() {
            continue;
        }
        if let Err(err) = platform.remove_member_role(guild, target, role) {
            tracing::warn!(slug = %project.slug, user = %target, role = %role, err = %err, "failed to remove role");
            warnings.push(label.to_string());
        }
    }

    project.members.remove(target);
    let project = store.update(&project)?;
    tracing::info!(slug = %project.slug, user = %target, "removed member");

    let reply = format!(
        "removed <@{}> from project **{}** (slug: `{}`)",
        target, project.name, project.slug
    );
    Ok(ProvisionOutcome::new(reply, project, warnings))
}

pub fn create_forum(
    store: &ProjectStore,
    platform: &dyn Platform,
    caller: &Caller,
    input: &str,
    forum_name: &str,
) -> Result<ProvisionOutcome> {
    let guild = caller.guild()?;
    let forum_name = match forum_name.trim() {
        "" => DEFAULT_FORUM_NAME,
        name => name,
    };
    let mut project = load_for_caller(store, caller, input)?;
    caller.require_leader(&project, "create forums")?;

    if project.category_id.is_empty() {
        return Err(Error::InvalidArgument(
            "project has no category id saved".to_string(),
        ));
    }

    let forum = platform.create_forum(guild, &project.category_id, forum_name)?;
    let configured = platform
        .set_available_tags(&forum.id, &tags::default_forum_tags())
        .map_err(|err| {
            tracing::error!(slug = %project.slug, forum = %forum.id, err = %err, "forum tag setup failed");
            Error::Platform {
                status: None,
                message: format!("forum {} created but tag setup failed: {err}", forum.id),
            }
        })?;

    // Only a mapping with every status tag is cached; otherwise re-read the
    // forum once before giving up.
    let tag_ids = match tags::status_tag_map(&forum.id, &configured.available_tags) {
        Ok(map) => map,
        Err(_) => {
            let live = platform.forum_tags(&forum.id)?;
            tags::status_tag_map(&forum.id, &live).inspect_err(|err| {
                tracing::error!(slug = %project.slug, forum = %forum.id, err = %err, "forum tag setup incomplete");
            })?
        }
    };

    project.add_forum(&forum.id);
    project.forum_tag_ids.insert(forum.id.clone(), tag_ids);
    let project = store.update(&project)?;
    tracing::info!(slug = %project.slug, forum = %forum.id, name = %forum_name, "created forum");

    let reply = format!(
        "created forum **{}** for project **{}** (slug: `{}`)",
        forum_name, project.name, project.slug
    );
    Ok(ProvisionOutcome::new(reply, project, Vec::new()))
}

/// Forum of `project` named by ID or by case-insensitive channel name.
pub fn resolve_forum_id(platform: &dyn Platform, project: &Project, input: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::MissingArgument("forum".to_string()));
    }
    if project.has_forum(input) {
        return Ok(input.to_string());
    }

    let mut hits = Vec::new();
    for forum in &project.forum_channel_ids {
        match platform.channel(forum) {
            Ok(channel) if channel.name.trim().eq_ignore_ascii_case(input) => {
                hits.push(forum.clone())
            }
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(forum = %forum, err = %err, "skipping unreadable forum");
            }
        }
    }

    match hits.len() {
        0 => Err(Error::InvalidArgument(format!(
            "forum not found in project (by id or name): {input}"
        ))),
        1 => Ok(hits.remove(0)),
        n => Err(Error::InvalidArgument(format!(
            "forum name is ambiguous ({n} matches), use the forum channel id"
        ))),
    }
}

pub fn delete_forum(
    store: &ProjectStore,
    platform: &dyn Platform,
    caller: &Caller,
    input: &str,
    forum_input: &str,
) -> Result<ProvisionOutcome> {
    caller.guild()?;
    let mut project = load_for_caller(store, caller, input)?;
    caller.require_leader(&project, "delete forums")?;

    let forum_id = resolve_forum_id(platform, &project, forum_input)?;
    platform.delete_channel(&forum_id)?;

    let pruned = project
        .tasks
        .values()
        .filter(|task| task.forum_id == forum_id)
        .count();
    project.remove_forum(&forum_id);
    let project = store.update(&project)?;
    tracing::info!(slug = %project.slug, forum = %forum_id, pruned_tasks = pruned, "deleted forum");

    let reply = format!(
        "deleted forum (`{}`) from project **{}** (slug: `{}`)",
        forum_id, project.name, project.slug
    );
    Ok(ProvisionOutcome::new(reply, project, Vec::new()))
}
