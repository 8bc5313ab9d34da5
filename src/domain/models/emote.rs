//! Guild emote model.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{EntityKind, Model, UserModel};
use crate::domain::value_objects::Snowflake;

/// A custom emoji owned by a guild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct EmoteModel {
    pub id: Snowflake,

    #[validate(length(min = 1, max = 32))]
    pub name: String,

    /// Roles allowed to use this emote; empty means everyone
    #[serde(default)]
    pub roles: Vec<Snowflake>,

    /// Uploader
    #[serde(default)]
    pub user: Option<UserModel>,

    #[serde(default)]
    pub require_colons: bool,

    #[serde(default)]
    pub managed: bool,

    #[serde(default)]
    pub animated: bool,

    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

impl EmoteModel {
    /// Message markup for this emote.
    pub fn mention(&self) -> String {
        let prefix = if self.animated { "a" } else { "" };
        format!("<{}:{}:{}>", prefix, self.name, self.id)
    }
}

impl Model for EmoteModel {
    const KIND: EntityKind = EntityKind::Emote;

    fn id(&self) -> Snowflake {
        self.id
    }
}
