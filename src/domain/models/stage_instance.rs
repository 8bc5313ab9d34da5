//! Stage instance model.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{EntityKind, Model};
use crate::domain::value_objects::Snowflake;

/// A live stage in a stage channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct StageInstanceModel {
    pub id: Snowflake,

    pub guild_id: Snowflake,

    pub channel_id: Snowflake,

    #[validate(length(min = 1, max = 120))]
    pub topic: String,

    /// 1 = public, 2 = guild only
    #[serde(default)]
    pub privacy_level: u8,

    #[serde(default)]
    pub guild_scheduled_event_id: Option<Snowflake>,
}

impl Model for StageInstanceModel {
    const KIND: EntityKind = EntityKind::StageInstance;

    fn id(&self) -> Snowflake {
        self.id
    }
}
