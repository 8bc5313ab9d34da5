//! Role model.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{EntityKind, Model};
use crate::domain::value_objects::{Permissions, Snowflake};

/// A guild role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RoleModel {
    pub id: Snowflake,

    #[validate(length(min = 1, max = 100))]
    pub name: String,

    /// RGB color; 0 means no color
    #[serde(default)]
    pub color: u32,

    /// Displayed separately in the member list
    #[serde(default)]
    pub hoist: bool,

    #[serde(default)]
    pub icon: Option<String>,

    pub position: i32,

    pub permissions: Permissions,

    /// Managed by an integration
    #[serde(default)]
    pub managed: bool,

    #[serde(default)]
    pub mentionable: bool,
}

impl RoleModel {
    pub fn is_everyone(&self, guild_id: Snowflake) -> bool {
        self.id == guild_id
    }
}

impl Model for RoleModel {
    const KIND: EntityKind = EntityKind::Role;

    fn id(&self) -> Snowflake {
        self.id
    }
}
