//! Chat platform contract.
//!
//! The task workflow only talks to the outside world through [`Platform`].
//! [`discord::DiscordClient`] implements it over the Discord REST API; tests
//! plug in an in-memory implementation.

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod discord;

/// Permission bits used by the project roles and category overwrites.
pub mod permissions {
    pub const VIEW_CHANNEL: u64 = 1 << 10;
    pub const MANAGE_MESSAGES: u64 = 1 << 13;
    pub const READ_MESSAGE_HISTORY: u64 = 1 << 16;
    pub const MANAGE_THREADS: u64 = 1 << 34;
    pub const CREATE_PUBLIC_THREADS: u64 = 1 << 35;
    pub const SEND_MESSAGES_IN_THREADS: u64 = 1 << 38;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Text,
    Category,
    News,
    NewsThread,
    PublicThread,
    PrivateThread,
    Forum,
    Other,
}

impl ChannelKind {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => ChannelKind::Text,
            4 => ChannelKind::Category,
            5 => ChannelKind::News,
            10 => ChannelKind::NewsThread,
            11 => ChannelKind::PublicThread,
            12 => ChannelKind::PrivateThread,
            15 => ChannelKind::Forum,
            _ => ChannelKind::Other,
        }
    }

    pub fn code(self) -> Option<u8> {
        match self {
            ChannelKind::Text => Some(0),
            ChannelKind::Category => Some(4),
            ChannelKind::News => Some(5),
            ChannelKind::NewsThread => Some(10),
            ChannelKind::PublicThread => Some(11),
            ChannelKind::PrivateThread => Some(12),
            ChannelKind::Forum => Some(15),
            ChannelKind::Other => None,
        }
    }

    pub fn is_thread(self) -> bool {
        matches!(
            self,
            ChannelKind::PublicThread | ChannelKind::PrivateThread | ChannelKind::NewsThread
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForumTag {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub moderated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji_name: Option<String>,
}

/// Tag definition sent when configuring a forum; the platform assigns IDs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForumTagSpec {
    pub name: String,
    pub emoji_name: Option<String>,
    pub moderated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub kind: ChannelKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub available_tags: Vec<ForumTag>,
    #[serde(default)]
    pub applied_tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSpec {
    pub name: String,
    pub permissions: u64,
    /// 0xRRGGBB
    pub color: u32,
    pub hoist: bool,
    pub mentionable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleOverwrite {
    pub role_id: String,
    pub allow: u64,
    pub deny: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub fields: Vec<EmbedField>,
}

impl Embed {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }
}

/// Capabilities the workflow needs from the chat platform.
///
/// Calls block until the platform answers. Implementations must be usable
/// from several command handlers at once.
pub trait Platform: Send + Sync {
    /// Fetch a channel descriptor (threads, forums, categories).
    fn channel(&self, channel_id: &str) -> Result<Channel>;

    /// Tags a forum offers to its posts.
    fn forum_tags(&self, forum_id: &str) -> Result<Vec<ForumTag>> {
        Ok(self.channel(forum_id)?.available_tags)
    }

    /// Replace the applied-tag array of a post thread.
    fn set_applied_tags(&self, thread_id: &str, tag_ids: &[String]) -> Result<()>;

    /// Replace the available-tag set of a forum; returns the updated channel.
    fn set_available_tags(&self, forum_id: &str, tags: &[ForumTagSpec]) -> Result<Channel>;

    fn send_embed(&self, channel_id: &str, embed: &Embed) -> Result<Message>;

    fn edit_embed(&self, channel_id: &str, message_id: &str, embed: &Embed) -> Result<()>;

    fn pin_message(&self, channel_id: &str, message_id: &str) -> Result<()>;

    fn send_message(&self, channel_id: &str, content: &str) -> Result<Message>;

    /// Live roles of a guild member.
    fn member_roles(&self, guild_id: &str, user_id: &str) -> Result<Vec<String>>;

    fn guild_roles(&self, guild_id: &str) -> Result<Vec<Role>>;

    fn create_role(&self, guild_id: &str, spec: &RoleSpec) -> Result<Role>;

    fn delete_role(&self, guild_id: &str, role_id: &str) -> Result<()>;

    fn add_member_role(&self, guild_id: &str, user_id: &str, role_id: &str) -> Result<()>;

    fn remove_member_role(&self, guild_id: &str, user_id: &str, role_id: &str) -> Result<()>;

    fn create_category(
        &self,
        guild_id: &str,
        name: &str,
        overwrites: &[RoleOverwrite],
    ) -> Result<Channel>;

    fn create_forum(&self, guild_id: &str, category_id: &str, name: &str) -> Result<Channel>;

    fn delete_channel(&self, channel_id: &str) -> Result<()>;
}

impl<P: Platform + ?Sized> Platform for &P {
    fn channel(&self, channel_id: &str) -> Result<Channel> {
        (**self).channel(channel_id)
    }

    fn forum_tags(&self, forum_id: &str) -> Result<Vec<ForumTag>> {
        (**self).forum_tags(forum_id)
    }

    fn set_applied_tags(&self, thread_id: &str, tag_ids: &[String]) -> Result<()> {
        (**self).set_applied_tags(thread_id, tag_ids)
    }

    fn set_available_tags(&self, forum_id: &str, tags: &[ForumTagSpec]) -> Result<Channel> {
        (**self).set_available_tags(forum_id, tags)
    }

    fn send_embed(&self, channel_id: &str, embed: &Embed) -> Result<Message> {
        (**self).send_embed(channel_id, embed)
    }

    fn edit_embed(&self, channel_id: &str, message_id: &str, embed: &Embed) -> Result<()> {
        (**self).edit_embed(channel_id, message_id, embed)
    }

    fn pin_message(&self, channel_id: &str, message_id: &str) -> Result<()> {
        (**self).pin_message(channel_id, message_id)
    }

    fn send_message(&self, channel_id: &str, content: &str) -> Result<Message> {
        (**self).send_message(channel_id, content)
    }

    fn member_roles(&self, guild_id: &str, user_id: &str) -> Result<Vec<String>> {
        (**self).member_roles(guild_id, user_id)
    }

    fn guild_roles(&self, guild_id: &str) -> Result<Vec<Role>> {
        (**self).guild_roles(guild_id)
    }

    fn create_role(&self, guild_id: &str, spec: &RoleSpec) -> Result<Role> {
        (**self).create_role(guild_id, spec)
    }

    fn delete_role(&self, guild_id: &str, role_id: &str) -> Result<()> {
        (**self).delete_role(guild_id, role_id)
    }

    fn add_member_role(&self, guild_id: &str, user_id: &str, role_id: &str) -> Result<()> {
        (**self).add_member_role(guild_id, user_id, role_id)
    }

    fn remove_member_role(&self, guild_id: &str, user_id: &str, role_id: &str) -> Result<()> {
        (**self).remove_member_role(guild_id, user_id, role_id)
    }

    fn create_category(
        &self,
        guild_id: &str,
        name: &str,
        overwrites: &[RoleOverwrite],
    ) -> Result<Channel> {
        (**self).create_category(guild_id, name, overwrites)
    }

    fn create_forum(&self, guild_id: &str, category_id: &str, name: &str) -> Result<Channel> {
        (**self).create_forum(guild_id, category_id, name)
    }

    fn delete_channel(&self, channel_id: &str) -> Result<()> {
        (**self).delete_channel(channel_id)
    }
}
