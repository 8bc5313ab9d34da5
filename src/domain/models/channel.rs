//! Channel model.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{EntityKind, Model, UserModel};
use crate::domain::value_objects::Snowflake;

/// Channel types as numbered on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "u8", into = "u8")]
pub enum ChannelType {
    /// A text channel within a guild
    #[default]
    GuildText,
    /// A direct message between two users
    Dm,
    /// A voice channel within a guild
    GuildVoice,
    /// A direct message between multiple users
    GroupDm,
    /// A category that contains channels
    GuildCategory,
    /// A channel users can follow and crosspost into their own guild
    GuildAnnouncement,
    /// A thread inside an announcement channel
    AnnouncementThread,
    /// A public thread
    PublicThread,
    /// A private thread
    PrivateThread,
    /// A stage voice channel
    GuildStageVoice,
    /// A hub directory channel
    GuildDirectory,
    /// A forum channel
    GuildForum,
    /// A media channel
    GuildMedia,
    /// A type this crate does not know about yet
    Unknown(u8),
}

impl From<u8> for ChannelType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::GuildText,
            1 => Self::Dm,
            2 => Self::GuildVoice,
            3 => Self::GroupDm,
            4 => Self::GuildCategory,
            5 => Self::GuildAnnouncement,
            10 => Self::AnnouncementThread,
            11 => Self::PublicThread,
            12 => Self::PrivateThread,
            13 => Self::GuildStageVoice,
            14 => Self::GuildDirectory,
            15 => Self::GuildForum,
            16 => Self::GuildMedia,
            other => Self::Unknown(other),
        }
    }
}

impl From<ChannelType> for u8 {
    fn from(value: ChannelType) -> Self {
        match value {
            ChannelType::GuildText => 0,
            ChannelType::Dm => 1,
            ChannelType::GuildVoice => 2,
            ChannelType::GroupDm => 3,
            ChannelType::GuildCategory => 4,
            ChannelType::GuildAnnouncement => 5,
            ChannelType::AnnouncementThread => 10,
            ChannelType::PublicThread => 11,
            ChannelType::PrivateThread => 12,
            ChannelType::GuildStageVoice => 13,
            ChannelType::GuildDirectory => 14,
            ChannelType::GuildForum => 15,
            ChannelType::GuildMedia => 16,
            ChannelType::Unknown(other) => other,
        }
    }
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GuildText => "text",
            Self::Dm => "dm",
            Self::GuildVoice => "voice",
            Self::GroupDm => "group_dm",
            Self::GuildCategory => "category",
            Self::GuildAnnouncement => "announcement",
            Self::AnnouncementThread => "announcement_thread",
            Self::PublicThread => "public_thread",
            Self::PrivateThread => "private_thread",
            Self::GuildStageVoice => "stage",
            Self::GuildDirectory => "directory",
            Self::GuildForum => "forum",
            Self::GuildMedia => "media",
            Self::Unknown(_) => "unknown",
        }
    }

    pub fn is_thread(&self) -> bool {
        matches!(
            self,
            Self::AnnouncementThread | Self::PublicThread | Self::PrivateThread
        )
    }

    pub fn is_dm(&self) -> bool {
        matches!(self, Self::Dm | Self::GroupDm)
    }

    /// Channels that carry a message history.
    pub fn is_text_based(&self) -> bool {
        matches!(
            self,
            Self::GuildText
                | Self::Dm
                | Self::GroupDm
                | Self::GuildAnnouncement
                | Self::GuildVoice
                | Self::GuildStageVoice
        ) || self.is_thread()
    }

    pub fn is_voice_based(&self) -> bool {
        matches!(self, Self::GuildVoice | Self::GuildStageVoice)
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Overwrite target type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum OverwriteType {
    Role,
    Member,
}

impl From<u8> for OverwriteType {
    fn from(value: u8) -> Self {
        if value == 1 {
            Self::Member
        } else {
            Self::Role
        }
    }
}

impl From<OverwriteType> for u8 {
    fn from(value: OverwriteType) -> Self {
        match value {
            OverwriteType::Role => 0,
            OverwriteType::Member => 1,
        }
    }
}

/// Permission overwrite on a guild channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionOverwrite {
    /// Role or user ID
    pub id: Snowflake,

    #[serde(rename = "type")]
    pub kind: OverwriteType,

    pub allow: crate::domain::value_objects::Permissions,

    pub deny: crate::domain::value_objects::Permissions,
}

/// A guild or DM channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ChannelModel {
    pub id: Snowflake,

    #[serde(rename = "type")]
    pub kind: ChannelType,

    /// Guild ID (None for DM channels)
    #[serde(default)]
    pub guild_id: Option<Snowflake>,

    #[serde(default)]
    #[validate(length(max = 100))]
    pub name: Option<String>,

    #[serde(default)]
    #[validate(length(max = 4096))]
    pub topic: Option<String>,

    /// Sorting position within category or guild
    #[serde(default)]
    pub position: Option<i32>,

    /// Parent category ID
    #[serde(default)]
    pub parent_id: Option<Snowflake>,

    #[serde(default)]
    pub nsfw: bool,

    /// Slowmode in seconds
    #[serde(default)]
    pub rate_limit_per_user: Option<u32>,

    #[serde(default)]
    pub last_message_id: Option<Snowflake>,

    #[serde(default)]
    pub bitrate: Option<u32>,

    #[serde(default)]
    pub user_limit: Option<u32>,

    /// DM participants
    #[serde(default)]
    pub recipients: Vec<UserModel>,

    #[serde(default)]
    pub permission_overwrites: Vec<PermissionOverwrite>,
}

impl ChannelModel {
    pub fn is_guild_channel(&self) -> bool {
        self.guild_id.is_some()
    }

    pub fn display_name(&self) -> String {
        match (&self.name, self.recipients.first()) {
            (Some(name), _) => name.clone(),
            (None, Some(recipient)) => recipient.display_name().to_string(),
            (None, None) => self.id.to_string(),
        }
    }
}

impl Model for ChannelModel {
    const KIND: EntityKind = EntityKind::Channel;

    fn id(&self) -> Snowflake {
        self.id
    }

    fn owning_guild(&self) -> Option<Snowflake> {
        self.guild_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, ChannelType::GuildText ; "text")]
    #[test_case(1, ChannelType::Dm ; "dm")]
    #[test_case(4, ChannelType::GuildCategory ; "category")]
    #[test_case(11, ChannelType::PublicThread ; "public thread")]
    #[test_case(15, ChannelType::GuildForum ; "forum")]
    #[test_case(99, ChannelType::Unknown(99) ; "unknown")]
    fn test_channel_type_from_wire(raw: u8, expected: ChannelType) {
        assert_eq!(ChannelType::from(raw), expected);
        assert_eq!(u8::from(expected), raw);
    }

    #[test]
    fn test_channel_type_predicates() {
        assert!(ChannelType::GuildText.is_text_based());
        assert!(ChannelType::PrivateThread.is_thread());
        assert!(!ChannelType::GuildCategory.is_text_based());
        assert!(ChannelType::GroupDm.is_dm());
        assert!(ChannelType::GuildStageVoice.is_voice_based());
    }

    #[test]
    fn test_decode_guild_channel() {
        let channel: ChannelModel = serde_json::from_value(serde_json::json!({
            "id": "10",
            "type": 0,
            "guild_id": "100",
            "name": "general",
            "position": 1,
            "permission_overwrites": [
                { "id": "100", "type": 0, "allow": "0", "deny": "2048" }
            ]
        }))
        .unwrap();

        assert_eq!(channel.id, Snowflake::new(10));
        assert_eq!(channel.guild_id, Some(Snowflake::new(100)));
        assert_eq!(channel.permission_overwrites[0].kind, OverwriteType::Role);
        assert!(channel.is_guild_channel());
    }
}
