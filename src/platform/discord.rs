//! Discord REST (v10) implementation of [`Platform`].
//!
//! Blocking client, one request per call, no retries. Rate-limit responses
//! surface as [`Error::Platform`] with the advertised `retry_after`.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    Channel, ChannelKind, Embed, ForumTag, ForumTagSpec, Message, Platform, Role, RoleOverwrite,
    RoleSpec,
};
use crate::error::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

const USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/forum-kanban, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Overwrite target type for roles.
const OVERWRITE_ROLE: u8 = 0;

#[derive(Debug, Deserialize)]
struct RawTag {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    moderated: bool,
    #[serde(default)]
    emoji_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    available_tags: Vec<RawTag>,
    #[serde(default)]
    applied_tags: Vec<String>,
}

impl From<RawChannel> for Channel {
    fn from(raw: RawChannel) -> Self {
        Channel {
            id: raw.id,
            kind: ChannelKind::from_code(raw.kind),
            name: raw.name.unwrap_or_default(),
            parent_id: raw.parent_id.filter(|id| !id.trim().is_empty()),
            available_tags: raw
                .available_tags
                .into_iter()
                .map(|tag| ForumTag {
                    id: tag.id,
                    name: tag.name,
                    moderated: tag.moderated,
                    emoji_name: tag.emoji_name.filter(|e| !e.is_empty()),
                })
                .collect(),
            applied_tags: raw.applied_tags,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    id: String,
    channel_id: String,
}

#[derive(Debug, Deserialize)]
struct RawRole {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawMember {
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RateLimitBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    retry_after: f64,
}

/// Bot-token authenticated Discord REST client.
pub struct DiscordClient {
    api_base: String,
    token: String,
    http: Client,
}

impl DiscordClient {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_options(token, DEFAULT_API_BASE, DEFAULT_TIMEOUT_MS)
    }

    pub fn with_options(
        token: impl Into<String>,
        api_base: impl Into<String>,
        timeout_ms: u64,
    ) -> Result<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(Error::InvalidConfig("bot token is empty".to_string()));
        }
        let api_base = api_base.into().trim().trim_end_matches('/').to_string();
        if api_base.is_empty() {
            return Err(Error::InvalidConfig("api_base is empty".to_string()));
        }

        let http = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            api_base,
            token,
            http,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_base, path))
            .header("Authorization", format!("Bot {}", self.token))
    }

    fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let code = status.as_u16();
        let body = response.text().unwrap_or_default();
        let message = if code == 429 {
            match serde_json::from_str::<RateLimitBody>(&body) {
                Ok(limit) => format!(
                    "rate limited: {} (retry after {:.2}s)",
                    limit.message, limit.retry_after
                ),
                Err(_) => "rate limited".to_string(),
            }
        } else {
            error_message(&body).unwrap_or_else(|| status.to_string())
        };

        tracing::debug!(status = code, message = %message, "discord request failed");
        Err(Error::Platform {
            status: Some(code),
            message,
        })
    }

    fn call_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        Ok(self.send(builder)?.json()?)
    }

    fn call_empty(&self, builder: RequestBuilder) -> Result<()> {
        self.send(builder)?;
        Ok(())
    }
}

/// `message` field of a Discord error body, if present.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let message = value.get("message")?.as_str()?.trim();
    (!message.is_empty()).then(|| message.to_string())
}

fn embed_payload(embed: &Embed) -> Value {
    json!({
        "title": embed.title,
        "description": embed.description,
        "fields": embed.fields,
    })
}

fn tags_payload(tags: &[ForumTagSpec]) -> Value {
    Value::Array(
        tags.iter()
            .map(|tag| {
                let mut value = json!({
                    "name": tag.name,
                    "moderated": tag.moderated,
                });
                if let Some(emoji) = &tag.emoji_name {
                    value["emoji_name"] = json!(emoji);
                }
                value
            })
            .collect(),
    )
}

fn overwrites_payload(overwrites: &[RoleOverwrite]) -> Value {
    Value::Array(
        overwrites
            .iter()
            .map(|ow| {
                json!({
                    "id": ow.role_id,
                    "type": OVERWRITE_ROLE,
                    "allow": ow.allow.to_string(),
                    "deny": ow.deny.to_string(),
                })
            })
            .collect(),
    )
}

fn role_payload(spec: &RoleSpec) -> Value {
    json!({
        "name": spec.name,
        "permissions": spec.permissions.to_string(),
        "color": spec.color,
        "hoist": spec.hoist,
        "mentionable": spec.mentionable,
    })
}

impl Platform for DiscordClient {
    fn channel(&self, channel_id: &str) -> Result<Channel> {
        let raw: RawChannel =
            self.call_json(self.request(Method::GET, &format!("/channels/{channel_id}")))?;
        Ok(raw.into())
    }

    fn set_applied_tags(&self, thread_id: &str, tag_ids: &[String]) -> Result<()> {
        self.call_empty(
            self.request(Method::PATCH, &format!("/channels/{thread_id}"))
                .json(&json!({ "applied_tags": tag_ids })),
        )
    }

    fn set_available_tags(&self, forum_id: &str, tags: &[ForumTagSpec]) -> Result<Channel> {
        let raw: RawChannel = self.call_json(
            self.request(Method::PATCH, &format!("/channels/{forum_id}"))
                .json(&json!({ "available_tags": tags_payload(tags) })),
        )?;
        Ok(raw.into())
    }

    fn send_embed(&self, channel_id: &str, embed: &Embed) -> Result<Message> {
        let raw: RawMessage = self.call_json(
            self.request(Method::POST, &format!("/channels/{channel_id}/messages"))
                .json(&json!({ "embeds": [embed_payload(embed)] })),
        )?;
        Ok(Message {
            id: raw.id,
            channel_id: raw.channel_id,
        })
    }

    fn edit_embed(&self, channel_id: &str, message_id: &str, embed: &Embed) -> Result<()> {
        self.call_empty(
            self.request(
                Method::PATCH,
                &format!("/channels/{channel_id}/messages/{message_id}"),
            )
            .json(&json!({ "embeds": [embed_payload(embed)] })),
        )
    }

    fn pin_message(&self, channel_id: &str, message_id: &str) -> Result<()> {
        self.call_empty(self.request(
            Method::PUT,
            &format!("/channels/{channel_id}/pins/{message_id}"),
        ))
    }

    fn send_message(&self, channel_id: &str, content: &str) -> Result<Message> {
        let raw: RawMessage = self.call_json(
            self.request(Method::POST, &format!("/channels/{channel_id}/messages"))
                .json(&json!({ "content": content })),
        )?;
        Ok(Message {
            id: raw.id,
            channel_id: raw.channel_id,
        })
    }

    fn member_roles(&self, guild_id: &str, user_id: &str) -> Result<Vec<String>> {
        let raw: RawMember = self.call_json(self.request(
            Method::GET,
            &format!("/guilds/{guild_id}/members/{user_id}"),
        ))?;
        Ok(raw.roles)
    }

    fn guild_roles(&self, guild_id: &str) -> Result<Vec<Role>> {
        let raw: Vec<RawRole> =
            self.call_json(self.request(Method::GET, &format!("/guilds/{guild_id}/roles")))?;
        Ok(raw
            .into_iter()
            .map(|role| Role {
                id: role.id,
                name: role.name,
            })
            .collect())
    }

    fn create_role(&self, guild_id: &str, spec: &RoleSpec) -> Result<Role> {
        let raw: RawRole = self.call_json(
            self.request(Method::POST, &format!("/guilds/{guild_id}/roles"))
                .json(&role_payload(spec)),
        )?;
        Ok(Role {
            id: raw.id,
            name: raw.name,
        })
    }

    fn delete_role(&self, guild_id: &str, role_id: &str) -> Result<()> {
        self.call_empty(self.request(
            Method::DELETE,
            &format!("/guilds/{guild_id}/roles/{role_id}"),
        ))
    }

    fn add_member_role(&self, guild_id: &str, user_id: &str, role_id: &str) -> Result<()> {
        self.call_empty(self.request(
            Method::PUT,
            &format!("/guilds/{guild_id}/members/{user_id}/roles/{role_id}"),
        ))
    }

    fn remove_member_role(&self, guild_id: &str, user_id: &str, role_id: &str) -> Result<()> {
        self.call_empty(self.request(
            Method::DELETE,
            &format!("/guilds/{guild_id}/members/{user_id}/roles/{role_id}"),
        ))
    }

    fn create_category(
        &self,
        guild_id: &str,
        name: &str,
        overwrites: &[RoleOverwrite],
    ) -> Result<Channel> {
        let raw: RawChannel = self.call_json(
            self.request(Method::POST, &format!("/guilds/{guild_id}/channels"))
                .json(&json!({
                    "name": name,
                    "type": ChannelKind::Category.code(),
                    "permission_overwrites": overwrites_payload(overwrites),
                })),
        )?;
        Ok(raw.into())
    }

    fn create_forum(&self, guild_id: &str, category_id: &str, name: &str) -> Result<Channel> {
        let raw: RawChannel = self.call_json(
            self.request(Method::POST, &format!("/guilds/{guild_id}/channels"))
                .json(&json!({
                    "name": name,
                    "type": ChannelKind::Forum.code(),
                    "parent_id": category_id,
                })),
        )?;
        Ok(raw.into())
    }

    fn delete_channel(&self, channel_id: &str) -> Result<()> {
        self.call_empty(self.request(Method::DELETE, &format!("/channels/{channel_id}")))
    }
}
