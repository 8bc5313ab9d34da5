//! Guild scheduled event model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{EntityKind, Model};
use crate::domain::value_objects::Snowflake;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ScheduledEventStatus {
    Scheduled,
    Active,
    Completed,
    Cancelled,
    Unknown(u8),
}

impl From<u8> for ScheduledEventStatus {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Scheduled,
            2 => Self::Active,
            3 => Self::Completed,
            4 => Self::Cancelled,
            other => Self::Unknown(other),
        }
    }
}

impl From<ScheduledEventStatus> for u8 {
    fn from(value: ScheduledEventStatus) -> Self {
        match value {
            ScheduledEventStatus::Scheduled => 1,
            ScheduledEventStatus::Active => 2,
            ScheduledEventStatus::Completed => 3,
            ScheduledEventStatus::Cancelled => 4,
            ScheduledEventStatus::Unknown(other) => other,
        }
    }
}

/// An event scheduled in a guild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ScheduledEventModel {
    pub id: Snowflake,

    pub guild_id: Snowflake,

    /// Stage or voice channel hosting the event
    #[serde(default)]
    pub channel_id: Option<Snowflake>,

    #[serde(default)]
    pub creator_id: Option<Snowflake>,

    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[serde(default)]
    #[validate(length(max = 1000))]
    pub description: Option<String>,

    pub scheduled_start_time: DateTime<Utc>,

    #[serde(default)]
    pub scheduled_end_time: Option<DateTime<Utc>>,

    pub status: ScheduledEventStatus,

    #[serde(default)]
    pub user_count: Option<u32>,
}

impl ScheduledEventModel {
    pub fn is_active(&self) -> bool {
        self.status == ScheduledEventStatus::Active
    }

    /// Completed or cancelled events will not start again.
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            ScheduledEventStatus::Completed | ScheduledEventStatus::Cancelled
        )
    }
}

impl Model for ScheduledEventModel {
    const KIND: EntityKind = EntityKind::ScheduledEvent;

    fn id(&self) -> Snowflake {
        self.id
    }
}
