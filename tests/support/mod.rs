#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use forum_kanban::error::{Error, Result};
use forum_kanban::fsm::{Invocation, TaskCommand, TaskFsm, TaskOutcome};
use forum_kanban::model::{Project, ProjectRole, Task};
use forum_kanban::platform::{
    Channel, ChannelKind, Embed, ForumTag, ForumTagSpec, Message, Platform, Role, RoleOverwrite,
    RoleSpec,
};
use forum_kanban::store::ProjectStore;
use tempfile::TempDir;

pub const GUILD: &str = "G";
pub const FORUM: &str = "F";
pub const THREAD: &str = "T";
pub const LEADER: &str = "L";
pub const MEMBER: &str = "M";
pub const OTHER_MEMBER: &str = "N";
pub const OUTSIDER: &str = "X";
pub const MEMBER_ROLE: &str = "role-member";
pub const LEADER_ROLE: &str = "role-leader";

/// Status tags of forum F: (id, name).
pub const STATUS_TAGS: [(&str, &str); 5] = [
    ("tag-todo", "ToDo"),
    ("tag-progress", "InProgress"),
    ("tag-waiting", "WaitingForApprove"),
    ("tag-done", "Done"),
    ("tag-bug", "Bug"),
];

/// Platform calls that can be made to fail.
#[derive(Debug, Clone, Default)]
pub struct Failures {
    pub channel: bool,
    pub set_applied_tags: bool,
    pub set_available_tags: bool,
    pub send_embed: bool,
    pub edit_embed: bool,
    pub pin_message: bool,
    pub send_message: bool,
    pub member_roles: bool,
    pub add_member_role: bool,
    pub remove_member_role: bool,
    pub delete_channel: bool,
    pub delete_role: bool,
}

#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub channel_id: String,
    pub content: Option<String>,
    pub embed: Option<Embed>,
    pub edits: usize,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub channels: BTreeMap<String, Channel>,
    pub messages: BTreeMap<String, StoredMessage>,
    /// Message IDs in send order.
    pub sent: Vec<String>,
    pub pins: Vec<(String, String)>,
    pub tag_writes: usize,
    pub roles: BTreeMap<String, Vec<Role>>,
    pub created_roles: Vec<RoleSpec>,
    pub member_roles: BTreeMap<String, Vec<String>>,
    pub overwrites: BTreeMap<String, Vec<RoleOverwrite>>,
    pub deleted_channels: Vec<String>,
    pub deleted_roles: Vec<String>,
    pub next_id: u64,
    pub fail: Failures,
    /// Tag names `set_available_tags` silently leaves out.
    pub dropped_tags: Vec<String>,
    /// File written when the next category is created, to race the store.
    pub write_on_create_category: Option<(PathBuf, Vec<u8>)>,
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

fn injected(call: &str) -> Error {
    Error::Platform {
        status: Some(500),
        message: format!("injected {call} failure"),
    }
}

fn not_found(what: &str) -> Error {
    Error::Platform {
        status: Some(404),
        message: format!("unknown {what}"),
    }
}

/// In-memory chat platform.
#[derive(Debug, Default)]
pub struct FakePlatform {
    state: Mutex<FakeState>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn fail(&self, configure: impl FnOnce(&mut Failures)) {
        configure(&mut self.state().fail);
    }

    pub fn heal(&self) {
        self.state().fail = Failures::default();
    }

    pub fn add_forum(&self, id: &str, name: &str, tags: &[(&str, &str)]) {
        let channel = Channel {
            id: id.to_string(),
            kind: ChannelKind::Forum,
            name: name.to_string(),
            parent_id: None,
            available_tags: tags
                .iter()
                .map(|(id, name)| ForumTag {
                    id: id.to_string(),
                    name: name.to_string(),
                    moderated: false,
                    emoji_name: None,
                })
                .collect(),
            applied_tags: Vec::new(),
        };
        self.state().channels.insert(id.to_string(), channel);
    }

    pub fn add_thread(&self, id: &str, forum_id: &str) {
        self.add_channel(id, ChannelKind::PublicThread, Some(forum_id));
    }

    pub fn add_channel(&self, id: &str, kind: ChannelKind, parent_id: Option<&str>) {
        let channel = Channel {
            id: id.to_string(),
            kind,
            name: id.to_lowercase(),
            parent_id: parent_id.map(str::to_string),
            available_tags: Vec::new(),
            applied_tags: Vec::new(),
        };
        self.state().channels.insert(id.to_string(), channel);
    }

    pub fn set_member_roles(&self, user_id: &str, roles: &[&str]) {
        self.state().member_roles.insert(
            user_id.to_string(),
            roles.iter().map(|r| r.to_string()).collect(),
        );
    }

    pub fn add_guild_role(&self, guild_id: &str, id: &str, name: &str) {
        self.state()
            .roles
            .entry(guild_id.to_string())
            .or_default()
            .push(Role {
                id: id.to_string(),
                name: name.to_string(),
            });
    }

    pub fn applied_tags(&self, thread_id: &str) -> Vec<String> {
        self.state()
            .channels
            .get(thread_id)
            .map(|c| c.applied_tags.clone())
            .unwrap_or_default()
    }

    /// Embed messages posted in a thread, oldest first.
    pub fn panels(&self, thread_id: &str) -> Vec<(String, Embed)> {
        let state = self.state();
        state
            .sent
            .iter()
            .filter_map(|id| {
                let message = state.messages.get(id)?;
                let embed = message.embed.clone()?;
                (message.channel_id == thread_id).then(|| (id.clone(), embed))
            })
            .collect()
    }

    pub fn panel(&self, message_id: &str) -> Option<Embed> {
        self.state()
            .messages
            .get(message_id)
            .and_then(|m| m.embed.clone())
    }

    /// Plain text posts in a thread, oldest first.
    pub fn posts(&self, thread_id: &str) -> Vec<String> {
        let state = self.state();
        state
            .sent
            .iter()
            .filter_map(|id| {
                let message = state.messages.get(id)?;
                if message.channel_id != thread_id {
                    return None;
                }
                message.content.clone()
            })
            .collect()
    }

    pub fn is_pinned(&self, thread_id: &str, message_id: &str) -> bool {
        self.state()
            .pins
            .iter()
            .any(|(c, m)| c == thread_id && m == message_id)
    }
}

impl Platform for FakePlatform {
    fn channel(&self, channel_id: &str) -> Result<Channel> {
        let state = self.state();
        if state.fail.channel {
            return Err(injected("channel"));
        }
        state
            .channels
            .get(channel_id)
            .cloned()
            .ok_or_else(|| not_found("channel"))
    }

    fn set_applied_tags(&self, thread_id: &str, tag_ids: &[String]) -> Result<()> {
        let mut state = self.state();
        if state.fail.set_applied_tags {
            return Err(injected("set_applied_tags"));
        }
        state.tag_writes += 1;
        let channel = state
            .channels
            .get_mut(thread_id)
            .ok_or_else(|| not_found("channel"))?;
        channel.applied_tags = tag_ids.to_vec();
        Ok(())
    }

    fn set_available_tags(&self, forum_id: &str, tags: &[ForumTagSpec]) -> Result<Channel> {
        let mut state = self.state();
        if state.fail.set_available_tags {
            return Err(injected("set_available_tags"));
        }
        let mut available = Vec::new();
        for spec in tags {
            if state.dropped_tags.contains(&spec.name) {
                continue;
            }
            available.push(ForumTag {
                id: state.next_id("tag"),
                name: spec.name.clone(),
                moderated: spec.moderated,
                emoji_name: spec.emoji_name.clone(),
            });
        }
        let channel = state
            .channels
            .get_mut(forum_id)
            .ok_or_else(|| not_found("channel"))?;
        channel.available_tags = available;
        Ok(channel.clone())
    }

    fn send_embed(&self, channel_id: &str, embed: &Embed) -> Result<Message> {
        let mut state = self.state();
        if state.fail.send_embed {
            return Err(injected("send_embed"));
        }
        let id = state.next_id("msg");
        state.messages.insert(
            id.clone(),
            StoredMessage {
                channel_id: channel_id.to_string(),
                content: None,
                embed: Some(embed.clone()),
                edits: 0,
            },
        );
        state.sent.push(id.clone());
        Ok(Message {
            id,
            channel_id: channel_id.to_string(),
        })
    }

    fn edit_embed(&self, channel_id: &str, message_id: &str, embed: &Embed) -> Result<()> {
        let mut state = self.state();
        if state.fail.edit_embed {
            return Err(injected("edit_embed"));
        }
        let message = state
            .messages
            .get_mut(message_id)
            .filter(|m| m.channel_id == channel_id)
            .ok_or_else(|| not_found("message"))?;
        message.embed = Some(embed.clone());
        message.edits += 1;
        Ok(())
    }

    fn pin_message(&self, channel_id: &str, message_id: &str) -> Result<()> {
        let mut state = self.state();
        if state.fail.pin_message {
            return Err(injected("pin_message"));
        }
        state
            .pins
            .push((channel_id.to_string(), message_id.to_string()));
        Ok(())
    }

    fn send_message(&self, channel_id: &str, content: &str) -> Result<Message> {
        let mut state = self.state();
        if state.fail.send_message {
            return Err(injected("send_message"));
        }
        let id = state.next_id("msg");
        state.messages.insert(
            id.clone(),
            StoredMessage {
                channel_id: channel_id.to_string(),
                content: Some(content.to_string()),
                embed: None,
                edits: 0,
            },
        );
        state.sent.push(id.clone());
        Ok(Message {
            id,
            channel_id: channel_id.to_string(),
        })
    }

    fn member_roles(&self, _guild_id: &str, user_id: &str) -> Result<Vec<String>> {
        let state = self.state();
        if state.fail.member_roles {
            return Err(injected("member_roles"));
        }
        Ok(state.member_roles.get(user_id).cloned().unwrap_or_default())
    }

    fn guild_roles(&self, guild_id: &str) -> Result<Vec<Role>> {
        Ok(self.state().roles.get(guild_id).cloned().unwrap_or_default())
    }

    fn create_role(&self, guild_id: &str, spec: &RoleSpec) -> Result<Role> {
        let mut state = self.state();
        let role = Role {
            id: state.next_id("role"),
            name: spec.name.clone(),
        };
        state.created_roles.push(spec.clone());
        state
            .roles
            .entry(guild_id.to_string())
            .or_default()
            .push(role.clone());
        Ok(role)
    }

    fn delete_role(&self, guild_id: &str, role_id: &str) -> Result<()> {
        let mut state = self.state();
        if state.fail.delete_role {
            return Err(injected("delete_role"));
        }
        if let Some(roles) = state.roles.get_mut(guild_id) {
            roles.retain(|r| r.id != role_id);
        }
        state.deleted_roles.push(role_id.to_string());
        Ok(())
    }

    fn add_member_role(&self, _guild_id: &str, user_id: &str, role_id: &str) -> Result<()> {
        let mut state = self.state();
        if state.fail.add_member_role {
            return Err(injected("add_member_role"));
        }
        let roles = state.member_roles.entry(user_id.to_string()).or_default();
        if !roles.iter().any(|r| r == role_id) {
            roles.push(role_id.to_string());
        }
        Ok(())
    }

    fn remove_member_role(&self, _guild_id: &str, user_id: &str, role_id: &str) -> Result<()> {
        let mut state = self.state();
        if state.fail.remove_member_role {
            return Err(injected("remove_member_role"));
        }
        if let Some(roles) = state.member_roles.get_mut(user_id) {
            roles.retain(|r| r != role_id);
        }
        Ok(())
    }

    fn create_category(
        &self,
        _guild_id: &str,
        name: &str,
        overwrites: &[RoleOverwrite],
    ) -> Result<Channel> {
        let mut state = self.state();
        if let Some((path, bytes)) = state.write_on_create_category.take() {
            std::fs::write(path, bytes).expect("race write");
        }
        let channel = Channel {
            id: state.next_id("cat"),
            kind: ChannelKind::Category,
            name: name.to_string(),
            parent_id: None,
            available_tags: Vec::new(),
            applied_tags: Vec::new(),
        };
        state
            .overwrites
            .insert(channel.id.clone(), overwrites.to_vec());
        state.channels.insert(channel.id.clone(), channel.clone());
        Ok(channel)
    }

    fn create_forum(&self, _guild_id: &str, category_id: &str, name: &str) -> Result<Channel> {
        let mut state = self.state();
        let channel = Channel {
            id: state.next_id("forum"),
            kind: ChannelKind::Forum,
            name: name.to_string(),
            parent_id: Some(category_id.to_string()),
            available_tags: Vec::new(),
            applied_tags: Vec::new(),
        };
        state.channels.insert(channel.id.clone(), channel.clone());
        Ok(channel)
    }

    fn delete_channel(&self, channel_id: &str) -> Result<()> {
        let mut state = self.state();
        if state.fail.delete_channel {
            return Err(injected("delete_channel"));
        }
        state
            .channels
            .remove(channel_id)
            .ok_or_else(|| not_found("channel"))?;
        state.deleted_channels.push(channel_id.to_string());
        Ok(())
    }
}

/// A data directory with project `alpha` (forum F, leader L, members M and N)
/// and a matching fake platform holding forum F and thread T.
pub struct Fixture {
    pub dir: TempDir,
    pub store: ProjectStore,
    pub platform: FakePlatform,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ProjectStore::new(dir.path().join("data"));

        let mut project = Project::new(GUILD, "Alpha");
        project.slug = "alpha".to_string();
        project.member_role_id = MEMBER_ROLE.to_string();
        project.leader_role_id = LEADER_ROLE.to_string();
        project.category_id = "C".to_string();
        project.forum_channel_ids = vec![FORUM.to_string()];
        project
            .members
            .insert(LEADER.to_string(), ProjectRole::Leader);
        project
            .members
            .insert(MEMBER.to_string(), ProjectRole::Member);
        project
            .members
            .insert(OTHER_MEMBER.to_string(), ProjectRole::Member);
        store.create(project).expect("seed project");

        let platform = FakePlatform::new();
        platform.add_forum(FORUM, "tasks", &STATUS_TAGS);
        platform.add_thread(THREAD, FORUM);

        Self {
            dir,
            store,
            platform,
        }
    }

    pub fn fsm(&self) -> TaskFsm<&FakePlatform> {
        TaskFsm::new(self.store.clone(), &self.platform)
    }

    /// Invocation in thread T as `user`, without live roles.
    pub fn invocation(user: &str) -> Invocation {
        Invocation {
            guild_id: GUILD.to_string(),
            channel_id: THREAD.to_string(),
            caller_id: user.to_string(),
            caller_roles: None,
        }
    }

    pub fn with_roles(user: &str, roles: &[&str]) -> Invocation {
        Invocation {
            caller_roles: Some(roles.iter().map(|s| s.to_string()).collect()),
            ..Self::invocation(user)
        }
    }

    /// Run `command` in thread T as `user`, without live roles.
    pub fn run(&self, user: &str, command: TaskCommand) -> Result<TaskOutcome> {
        self.fsm().execute(&Self::invocation(user), command)
    }

    pub fn project(&self) -> Project {
        self.store.get("alpha").expect("load alpha")
    }

    pub fn task(&self) -> Option<Task> {
        self.project().tasks.get(THREAD).cloned()
    }

    pub fn record_bytes(&self) -> Vec<u8> {
        std::fs::read(self.store.record_path("alpha")).expect("read record")
    }

    pub fn tag_id(name: &str) -> String {
        STATUS_TAGS
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(id, _)| id.to_string())
            .expect("known tag")
    }
}

pub fn done(description: &str) -> TaskCommand {
    TaskCommand::Done {
        description: description.to_string(),
    }
}
