//! Presence model.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{EntityKind, Model};
use crate::domain::value_objects::Snowflake;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Online,
    Idle,
    Dnd,
    Invisible,
    #[default]
    Offline,
}

/// Presence events only carry the user's id reliably.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceUser {
    pub id: Snowflake,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,

    /// Activity type as numbered on the wire
    #[serde(rename = "type", default)]
    pub kind: u8,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub details: Option<String>,

    #[serde(default)]
    pub url: Option<String>,
}

/// A user's presence within a guild. Keyed by user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PresenceModel {
    pub user: PresenceUser,

    #[serde(default)]
    pub guild_id: Option<Snowflake>,

    #[serde(default)]
    pub status: Status,

    #[serde(default)]
    pub activities: Vec<Activity>,
}

impl PresenceModel {
    pub fn is_online(&self) -> bool {
        !matches!(self.status, Status::Offline | Status::Invisible)
    }
}

impl Model for PresenceModel {
    const KIND: EntityKind = EntityKind::Presence;

    fn id(&self) -> Snowflake {
        self.user.id
    }
}
