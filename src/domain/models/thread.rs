//! Thread model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{ChannelType, EntityKind, Model};
use crate::domain::value_objects::Snowflake;

/// Archive/lock state carried by every thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMetadata {
    pub archived: bool,

    /// Minutes of inactivity before auto-archive
    pub auto_archive_duration: u32,

    pub archive_timestamp: DateTime<Utc>,

    #[serde(default)]
    pub locked: bool,

    #[serde(default)]
    pub invitable: Option<bool>,
}

/// A thread channel. Threads are stored under their guild and point at
/// their parent channel through `parent_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ThreadModel {
    pub id: Snowflake,

    #[serde(rename = "type")]
    pub kind: ChannelType,

    pub guild_id: Option<Snowflake>,

    /// The text or forum channel this thread was created in
    pub parent_id: Option<Snowflake>,

    /// Creator of the thread
    #[serde(default)]
    pub owner_id: Option<Snowflake>,

    #[serde(default)]
    #[validate(length(max = 100))]
    pub name: Option<String>,

    #[serde(default)]
    pub last_message_id: Option<Snowflake>,

    #[serde(default)]
    pub message_count: Option<u32>,

    #[serde(default)]
    pub member_count: Option<u32>,

    #[serde(default)]
    pub rate_limit_per_user: Option<u32>,

    pub thread_metadata: ThreadMetadata,
}

impl ThreadModel {
    pub fn is_archived(&self) -> bool {
        self.thread_metadata.archived
    }

    pub fn is_locked(&self) -> bool {
        self.thread_metadata.locked
    }
}

impl Model for ThreadModel {
    const KIND: EntityKind = EntityKind::Thread;

    fn id(&self) -> Snowflake {
        self.id
    }

    fn owning_guild(&self) -> Option<Snowflake> {
        self.guild_id
    }
}
