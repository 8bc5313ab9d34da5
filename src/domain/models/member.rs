//! Guild member model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{EntityKind, Model, UserModel};
use crate::domain::value_objects::Snowflake;

/// A user's membership in a guild.
///
/// The member is keyed by its user's id under the guild scope. The embedded
/// user record is also written to the global user store by the processors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct MemberModel {
    #[validate(nested)]
    pub user: UserModel,

    /// Guild-specific nickname
    #[serde(default)]
    #[validate(length(min = 1, max = 32))]
    pub nick: Option<String>,

    /// Guild-specific avatar hash
    #[serde(default)]
    pub avatar: Option<String>,

    /// IDs of roles assigned to this member
    #[serde(default)]
    pub roles: Vec<Snowflake>,

    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub premium_since: Option<DateTime<Utc>>,

    #[serde(default)]
    pub deaf: bool,

    #[serde(default)]
    pub mute: bool,

    /// Membership screening not yet passed
    #[serde(default)]
    pub pending: bool,

    /// Timeout expiry
    #[serde(default)]
    pub communication_disabled_until: Option<DateTime<Utc>>,
}

impl MemberModel {
    /// Check if the member has a specific role.
    pub fn has_role(&self, role_id: Snowflake) -> bool {
        self.roles.contains(&role_id)
    }

    /// Nickname, falling back to the user's display name.
    pub fn display_name(&self) -> &str {
        self.nick.as_deref().unwrap_or_else(|| self.user.display_name())
    }

    pub fn is_timed_out(&self, now: DateTime<Utc>) -> bool {
        self.communication_disabled_until
            .map(|until| until > now)
            .unwrap_or(false)
    }

    /// A copy of this member without `role_id`.
    pub fn without_role(&self, role_id: Snowflake) -> Self {
        let mut next = self.clone();
        next.roles.retain(|r| *r != role_id);
        next
    }
}

impl Model for MemberModel {
    const KIND: EntityKind = EntityKind::Member;

    fn id(&self) -> Snowflake {
        self.user.id
    }
}
