//! # Domain Models
//!
//! Immutable records decoded from gateway and REST payloads. A model carries
//! no caching or identity logic; a newer model for the same id replaces the
//! old one wholesale.
//!
//! ## Kinds
//!
//! - **Guild**: top-level community; owns channels, threads, roles, members,
//!   emotes, voice states, presences, scheduled events and stage instances
//! - **Channel / Thread**: own messages
//! - **User**: global account record shared across guilds
//! - **Message**: owns its reactions as sub-models

use std::fmt;

use crate::domain::value_objects::{Scope, ScopeShape, Snowflake};

mod channel;
mod emote;
mod guild;
mod member;
mod message;
mod presence;
mod role;
mod scheduled_event;
mod stage_instance;
mod thread;
mod user;
mod voice_state;

pub use channel::{ChannelModel, ChannelType, OverwriteType, PermissionOverwrite};
pub use emote::EmoteModel;
pub use guild::GuildModel;
pub use member::MemberModel;
pub use message::{MessageModel, MessageReference, ReactionEmoji, ReactionModel};
pub use presence::{Activity, PresenceModel, PresenceUser, Status};
pub use role::RoleModel;
pub use scheduled_event::{ScheduledEventModel, ScheduledEventStatus};
pub use stage_instance::StageInstanceModel;
pub use thread::{ThreadMetadata, ThreadModel};
pub use user::UserModel;
pub use voice_state::VoiceStateModel;

/// The entity kinds tracked by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Guild,
    Channel,
    Thread,
    User,
    Member,
    Role,
    Emote,
    Message,
    VoiceState,
    ScheduledEvent,
    StageInstance,
    Presence,
}

impl EntityKind {
    pub const ALL: [EntityKind; 12] = [
        EntityKind::Guild,
        EntityKind::Channel,
        EntityKind::Thread,
        EntityKind::User,
        EntityKind::Member,
        EntityKind::Role,
        EntityKind::Emote,
        EntityKind::Message,
        EntityKind::VoiceState,
        EntityKind::ScheduledEvent,
        EntityKind::StageInstance,
        EntityKind::Presence,
    ];

    /// Stable lowercase name used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guild => "guild",
            Self::Channel => "channel",
            Self::Thread => "thread",
            Self::User => "user",
            Self::Member => "member",
            Self::Role => "role",
            Self::Emote => "emote",
            Self::Message => "message",
            Self::VoiceState => "voice_state",
            Self::ScheduledEvent => "scheduled_event",
            Self::StageInstance => "stage_instance",
            Self::Presence => "presence",
        }
    }

    /// Whether entries of this kind may be stored under a scope of `shape`.
    pub fn accepts(&self, shape: ScopeShape) -> bool {
        match self {
            Self::Guild | Self::User => shape == ScopeShape::Global,
            // DM and group channels have no guild
            Self::Channel => matches!(shape, ScopeShape::Global | ScopeShape::Guild),
            Self::Message => shape == ScopeShape::Channel,
            Self::Thread
            | Self::Member
            | Self::Role
            | Self::Emote
            | Self::VoiceState
            | Self::ScheduledEvent
            | Self::StageInstance
            | Self::Presence => shape == ScopeShape::Guild,
        }
    }

    /// Kinds keyed by a user id. The same id appears once per guild, so
    /// identity is the `(scope, id)` pair rather than the id alone.
    pub fn is_user_keyed(&self) -> bool {
        matches!(self, Self::Member | Self::VoiceState | Self::Presence)
    }

    /// The child scope an entity of this kind opens, if any.
    pub fn owned_scope(&self, id: Snowflake) -> Option<Scope> {
        match self {
            Self::Guild => Some(Scope::Guild(id)),
            Self::Channel | Self::Thread => Some(Scope::Channel(id)),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cacheable record with a snowflake identity.
pub trait Model: fmt::Debug + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> Snowflake;

    /// The guild this record names in its own fields, if any.
    fn owning_guild(&self) -> Option<Snowflake> {
        None
    }
}
