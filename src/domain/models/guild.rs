//! Guild model.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{EntityKind, Model};
use crate::domain::value_objects::Snowflake;

/// A guild as delivered by `GUILD_CREATE`, `GUILD_UPDATE` or REST.
///
/// Nested collections (channels, roles, members, …) are not part of the
/// model; they are stored in their own scoped stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct GuildModel {
    /// Snowflake ID
    pub id: Snowflake,

    /// Guild name (2-100 characters)
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    /// Icon hash
    #[serde(default)]
    pub icon: Option<String>,

    /// User ID of the guild owner
    pub owner_id: Snowflake,

    #[serde(default)]
    pub description: Option<String>,

    /// Approximate member count (only on create)
    #[serde(default)]
    pub member_count: Option<u64>,

    /// Whether the guild is above the large threshold
    #[serde(default)]
    pub large: bool,

    #[serde(default)]
    pub features: Vec<String>,

    #[serde(default)]
    pub premium_tier: u8,

    #[serde(default)]
    pub afk_channel_id: Option<Snowflake>,

    #[serde(default)]
    pub system_channel_id: Option<Snowflake>,

    #[serde(default)]
    pub vanity_url_code: Option<String>,

    #[serde(default)]
    pub preferred_locale: Option<String>,
}

impl GuildModel {
    /// Check if a user is the owner of this guild.
    pub fn is_owner(&self, user_id: Snowflake) -> bool {
        self.owner_id == user_id
    }

    /// The @everyone role shares the guild's id.
    pub fn everyone_role_id(&self) -> Snowflake {
        self.id
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

impl Model for GuildModel {
    const KIND: EntityKind = EntityKind::Guild;

    fn id(&self) -> Snowflake {
        self.id
    }
}
