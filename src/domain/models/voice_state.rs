//! Voice state model.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{EntityKind, MemberModel, Model};
use crate::domain::value_objects::Snowflake;

/// A user's voice connection state within a guild. Keyed by user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct VoiceStateModel {
    #[serde(default)]
    pub guild_id: Option<Snowflake>,

    /// None when the user left voice
    #[serde(default)]
    pub channel_id: Option<Snowflake>,

    pub user_id: Snowflake,

    #[serde(default)]
    #[validate(nested)]
    pub member: Option<MemberModel>,

    pub session_id: String,

    #[serde(default)]
    pub deaf: bool,

    #[serde(default)]
    pub mute: bool,

    #[serde(default)]
    pub self_deaf: bool,

    #[serde(default)]
    pub self_mute: bool,

    #[serde(default)]
    pub self_stream: bool,

    #[serde(default)]
    pub self_video: bool,

    #[serde(default)]
    pub suppress: bool,
}

impl VoiceStateModel {
    pub fn is_connected(&self) -> bool {
        self.channel_id.is_some()
    }

    pub fn is_muted(&self) -> bool {
        self.mute || self.self_mute
    }

    pub fn is_deafened(&self) -> bool {
        self.deaf || self.self_deaf
    }
}

impl Model for VoiceStateModel {
    const KIND: EntityKind = EntityKind::VoiceState;

    fn id(&self) -> Snowflake {
        self.user_id
    }
}
