//! Gateway dispatch payload records.
//!
//! Events whose payload is a bare model (`CHANNEL_CREATE`, `MESSAGE_CREATE`,
//! `PRESENCE_UPDATE`, ...) decode straight into the model. The records here
//! cover the envelopes around them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::models::{
    ChannelModel, ChannelType, EmoteModel, GuildModel, MemberModel, MessageModel, PresenceModel,
    ReactionEmoji, RoleModel, ScheduledEventModel, StageInstanceModel, ThreadModel, UserModel,
    VoiceStateModel,
};
use crate::domain::value_objects::Snowflake;

/// `READY`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReadyPayload {
    #[validate(nested)]
    pub user: UserModel,

    /// Guilds the session is in; all arrive later through `GUILD_CREATE`
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,

    #[serde(default)]
    pub session_id: String,
}

/// A guild reference that may be marked as in an outage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct UnavailableGuild {
    pub id: Snowflake,

    #[serde(default)]
    pub unavailable: bool,
}

/// Full guild snapshot from `GUILD_CREATE`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GuildCreatePayload {
    #[serde(flatten)]
    #[validate(nested)]
    pub guild: GuildModel,

    #[serde(default)]
    #[validate(nested)]
    pub channels: Vec<ChannelModel>,

    #[serde(default)]
    #[validate(nested)]
    pub threads: Vec<ThreadModel>,

    #[serde(default)]
    #[validate(nested)]
    pub roles: Vec<RoleModel>,

    #[serde(default)]
    #[validate(nested)]
    pub members: Vec<MemberModel>,

    #[serde(default)]
    #[validate(nested)]
    pub voice_states: Vec<VoiceStateModel>,

    #[serde(default)]
    #[validate(nested)]
    pub presences: Vec<PresenceModel>,

    #[serde(default)]
    #[validate(nested)]
    pub emojis: Vec<EmoteModel>,

    #[serde(default)]
    #[validate(nested)]
    pub stage_instances: Vec<StageInstanceModel>,

    #[serde(default)]
    #[validate(nested)]
    pub guild_scheduled_events: Vec<ScheduledEventModel>,
}

/// `GUILD_UPDATE`: the guild plus its role and emoji sets.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GuildUpdatePayload {
    #[serde(flatten)]
    #[validate(nested)]
    pub guild: GuildModel,

    /// Absent when the update does not carry roles
    #[serde(default)]
    #[validate(nested)]
    pub roles: Option<Vec<RoleModel>>,

    #[serde(default)]
    #[validate(nested)]
    pub emojis: Option<Vec<EmoteModel>>,
}

/// `GUILD_EMOJIS_UPDATE`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GuildEmojisUpdatePayload {
    pub guild_id: Snowflake,

    #[validate(nested)]
    pub emojis: Vec<EmoteModel>,
}

/// `THREAD_DELETE` carries only identifiers.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ThreadDeletePayload {
    pub id: Snowflake,

    #[serde(default)]
    pub guild_id: Option<Snowflake>,

    #[serde(default)]
    pub parent_id: Option<Snowflake>,

    #[serde(rename = "type", default)]
    pub kind: ChannelType,
}

/// `THREAD_LIST_SYNC`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ThreadListSyncPayload {
    pub guild_id: Snowflake,

    /// Parent channels being synced; absent means the whole guild
    #[serde(default)]
    pub channel_ids: Option<Vec<Snowflake>>,

    #[validate(nested)]
    pub threads: Vec<ThreadModel>,
}

/// `GUILD_ROLE_CREATE` / `GUILD_ROLE_UPDATE`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GuildRolePayload {
    pub guild_id: Snowflake,

    #[validate(nested)]
    pub role: RoleModel,
}

/// `GUILD_ROLE_DELETE`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GuildRoleDeletePayload {
    pub guild_id: Snowflake,

    pub role_id: Snowflake,
}

/// `GUILD_MEMBER_ADD` / `GUILD_MEMBER_UPDATE`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GuildMemberPayload {
    pub guild_id: Snowflake,

    #[serde(flatten)]
    #[validate(nested)]
    pub member: MemberModel,
}

/// `GUILD_MEMBER_REMOVE`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GuildMemberRemovePayload {
    pub guild_id: Snowflake,

    #[validate(nested)]
    pub user: UserModel,
}

/// `GUILD_MEMBERS_CHUNK`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GuildMembersChunkPayload {
    pub guild_id: Snowflake,

    #[validate(nested)]
    pub members: Vec<MemberModel>,

    pub chunk_index: u32,

    pub chunk_count: u32,

    #[serde(default)]
    #[validate(nested)]
    pub presences: Vec<PresenceModel>,

    /// Requested ids that are not members
    #[serde(default)]
    pub not_found: Vec<Snowflake>,

    #[serde(default)]
    pub nonce: Option<String>,
}

impl GuildMembersChunkPayload {
    pub fn is_last(&self) -> bool {
        self.chunk_index + 1 >= self.chunk_count
    }
}

/// `MESSAGE_UPDATE`: every field besides the identifiers may be missing.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MessageUpdatePayload {
    pub id: Snowflake,

    pub channel_id: Snowflake,

    #[serde(default)]
    pub guild_id: Option<Snowflake>,

    #[serde(default)]
    #[validate(nested)]
    pub author: Option<UserModel>,

    #[serde(default)]
    #[validate(length(max = 4000))]
    pub content: Option<String>,

    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub edited_timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub tts: Option<bool>,

    #[serde(default)]
    pub mention_everyone: Option<bool>,

    #[serde(default)]
    pub mentions: Option<Vec<UserModel>>,

    #[serde(default)]
    pub mention_roles: Option<Vec<Snowflake>>,

    #[serde(default)]
    pub pinned: Option<bool>,
}

impl MessageUpdatePayload {
    /// Apply the present fields on top of `base`, producing a new model.
    pub fn merge_into(&self, base: &MessageModel) -> MessageModel {
        let mut next = base.clone();
        if let Some(author) = &self.author {
            next.author = author.clone();
        }
        if let Some(content) = &self.content {
            next.content = content.clone();
        }
        if let Some(timestamp) = self.timestamp {
            next.timestamp = timestamp;
        }
        if self.edited_timestamp.is_some() {
            next.edited_timestamp = self.edited_timestamp;
        }
        if let Some(tts) = self.tts {
            next.tts = tts;
        }
        if let Some(mention_everyone) = self.mention_everyone {
            next.mention_everyone = mention_everyone;
        }
        if let Some(mentions) = &self.mentions {
            next.mentions = mentions.clone();
        }
        if let Some(mention_roles) = &self.mention_roles {
            next.mention_roles = mention_roles.clone();
        }
        if let Some(pinned) = self.pinned {
            next.pinned = pinned;
        }
        if next.guild_id.is_none() {
            next.guild_id = self.guild_id;
        }
        next
    }

    /// A whole model, when the update carries every required field.
    pub fn into_full(self) -> Option<MessageModel> {
        let author = self.author?;
        let timestamp = self.timestamp?;
        Some(MessageModel {
            id: self.id,
            channel_id: self.channel_id,
            guild_id: self.guild_id,
            author,
            content: self.content.unwrap_or_default(),
            timestamp,
            edited_timestamp: self.edited_timestamp,
            tts: self.tts.unwrap_or(false),
            mention_everyone: self.mention_everyone.unwrap_or(false),
            mentions: self.mentions.unwrap_or_default(),
            mention_roles: self.mention_roles.unwrap_or_default(),
            pinned: self.pinned.unwrap_or(false),
            kind: 0,
            reactions: Vec::new(),
            message_reference: None,
            webhook_id: None,
        })
    }
}

/// `MESSAGE_DELETE`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MessageDeletePayload {
    pub id: Snowflake,

    pub channel_id: Snowflake,

    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

/// `MESSAGE_DELETE_BULK`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MessageDeleteBulkPayload {
    pub ids: Vec<Snowflake>,

    pub channel_id: Snowflake,

    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

/// `MESSAGE_REACTION_ADD` / `MESSAGE_REACTION_REMOVE`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReactionPayload {
    pub user_id: Snowflake,

    pub channel_id: Snowflake,

    pub message_id: Snowflake,

    #[serde(default)]
    pub guild_id: Option<Snowflake>,

    pub emoji: ReactionEmoji,
}

/// `MESSAGE_REACTION_REMOVE_ALL`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReactionRemoveAllPayload {
    pub channel_id: Snowflake,

    pub message_id: Snowflake,

    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

/// `MESSAGE_REACTION_REMOVE_EMOJI`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReactionRemoveEmojiPayload {
    pub channel_id: Snowflake,

    pub message_id: Snowflake,

    #[serde(default)]
    pub guild_id: Option<Snowflake>,

    pub emoji: ReactionEmoji,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::codec::decode;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_guild_create_snapshot() {
        let payload: GuildCreatePayload = decode(json!({
            "id": "100",
            "name": "Quokka Island",
            "owner_id": "5",
            "channels": [{"id": "10", "type": 0, "name": "general"}],
            "roles": [{"id": "100", "name": "@everyone", "position": 0, "permissions": "1024"}],
            "members": [{"user": {"id": "5", "username": "quokka"}, "roles": []}]
        }))
        .unwrap();

        assert_eq!(payload.guild.id, Snowflake::new(100));
        assert_eq!(payload.channels.len(), 1);
        assert_eq!(payload.members[0].user.id, Snowflake::new(5));
        assert!(payload.threads.is_empty());
    }

    #[test]
    fn test_guild_create_rejects_bad_member() {
        let result = decode::<GuildCreatePayload>(json!({
            "id": "100",
            "name": "Quokka Island",
            "owner_id": "5",
            "members": [{"user": {"id": "5", "username": ""}}]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_member_payload_flattens_member() {
        let payload: GuildMemberPayload = decode(json!({
            "guild_id": "100",
            "user": {"id": "5", "username": "quokka"},
            "nick": "Q",
            "roles": ["7"]
        }))
        .unwrap();
        assert_eq!(payload.member.nick.as_deref(), Some("Q"));
        assert!(payload.member.has_role(Snowflake::new(7)));
    }

    #[test]
    fn test_message_update_merge_keeps_unsent_fields() {
        let base: MessageModel = decode(json!({
            "id": "1",
            "channel_id": "10",
            "author": {"id": "5", "username": "quokka"},
            "content": "hello",
            "pinned": false,
            "timestamp": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        let update: MessageUpdatePayload = decode(json!({
            "id": "1",
            "channel_id": "10",
            "pinned": true
        }))
        .unwrap();

        let merged = update.merge_into(&base);
        assert_eq!(merged.content, "hello");
        assert!(merged.pinned);
        assert!(update.into_full().is_none());
    }

    #[test]
    fn test_members_chunk_last() {
        let chunk: GuildMembersChunkPayload = decode(json!({
            "guild_id": "100",
            "members": [],
            "chunk_index": 1,
            "chunk_count": 2
        }))
        .unwrap();
        assert!(chunk.is_last());
    }
}
