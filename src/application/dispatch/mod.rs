//! # Dispatch Processors
//!
//! One processor per gateway event name. A processor decodes its payload
//! through the model codec and applies it to the cache through the brokers;
//! it never touches a store directly.
//!
//! The [`ProcessorRegistry`] is built once at startup. Event names without
//! a processor are ignored.

mod channel;
mod guild;
mod guild_events;
mod member;
mod message;
mod reaction;
mod ready;
mod role;
mod voice;

pub use channel::{ChannelDelete, ChannelUpsert, ThreadDelete, ThreadListSync, ThreadUpsert};
pub use guild::{GuildCreate, GuildDelete, GuildEmojisUpdate, GuildUpdate};
pub use guild_events::{
    ScheduledEventDelete, ScheduledEventUpsert, StageInstanceDelete, StageInstanceUpsert,
};
pub use member::{MemberRemove, MemberUpsert, MembersChunk, PresenceUpdate};
pub use message::{MessageCreate, MessageDelete, MessageDeleteBulk, MessageUpdate};
pub use reaction::{ReactionAdd, ReactionRemove, ReactionRemoveAll, ReactionRemoveEmoji};
pub use ready::{Ready, UserUpdate};
pub use role::{RoleDelete, RoleUpsert};
pub use voice::VoiceStateUpdate;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::application::state::StateController;
use crate::domain::models::EntityKind;
use crate::domain::value_objects::{Scope, Snowflake};
use crate::infrastructure::metrics;
use crate::shared::error::DispatchError;

/// Applies one gateway event to the cache.
#[async_trait]
pub trait DispatchProcessor: Send + Sync {
    /// # Errors
    /// * `DispatchError::Malformed` - The payload failed to decode
    /// * `DispatchError::Cache` - A broker rejected a write
    /// * `DispatchError::Cancelled` - `token` fired between writes
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        token: &CancellationToken,
    ) -> Result<(), DispatchError>;
}

/// Event name -> processor.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: HashMap<&'static str, Arc<dyn DispatchProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with a processor for every supported event.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register("READY", Ready)
            .register("USER_UPDATE", UserUpdate)
            .register("GUILD_CREATE", GuildCreate)
            .register("GUILD_UPDATE", GuildUpdate)
            .register("GUILD_DELETE", GuildDelete)
            .register("GUILD_EMOJIS_UPDATE", GuildEmojisUpdate)
            .register("CHANNEL_CREATE", ChannelUpsert::CREATE)
            .register("CHANNEL_UPDATE", ChannelUpsert::UPDATE)
            .register("CHANNEL_DELETE", ChannelDelete)
            .register("THREAD_CREATE", ThreadUpsert::CREATE)
            .register("THREAD_UPDATE", ThreadUpsert::UPDATE)
            .register("THREAD_DELETE", ThreadDelete)
            .register("THREAD_LIST_SYNC", ThreadListSync)
            .register("GUILD_ROLE_CREATE", RoleUpsert::CREATE)
            .register("GUILD_ROLE_UPDATE", RoleUpsert::UPDATE)
            .register("GUILD_ROLE_DELETE", RoleDelete)
            .register("GUILD_MEMBER_ADD", MemberUpsert::ADD)
            .register("GUILD_MEMBER_UPDATE", MemberUpsert::UPDATE)
            .register("GUILD_MEMBER_REMOVE", MemberRemove)
            .register("GUILD_MEMBERS_CHUNK", MembersChunk)
            .register("PRESENCE_UPDATE", PresenceUpdate)
            .register("MESSAGE_CREATE", MessageCreate)
            .register("MESSAGE_UPDATE", MessageUpdate)
            .register("MESSAGE_DELETE", MessageDelete)
            .register("MESSAGE_DELETE_BULK", MessageDeleteBulk)
            .register("MESSAGE_REACTION_ADD", ReactionAdd)
            .register("MESSAGE_REACTION_REMOVE", ReactionRemove)
            .register("MESSAGE_REACTION_REMOVE_ALL", ReactionRemoveAll)
            .register("MESSAGE_REACTION_REMOVE_EMOJI", ReactionRemoveEmoji)
            .register("VOICE_STATE_UPDATE", VoiceStateUpdate)
            .register("GUILD_SCHEDULED_EVENT_CREATE", ScheduledEventUpsert::CREATE)
            .register("GUILD_SCHEDULED_EVENT_UPDATE", ScheduledEventUpsert::UPDATE)
            .register("GUILD_SCHEDULED_EVENT_DELETE", ScheduledEventDelete)
            .register("STAGE_INSTANCE_CREATE", StageInstanceUpsert::CREATE)
            .register("STAGE_INSTANCE_UPDATE", StageInstanceUpsert::UPDATE)
            .register("STAGE_INSTANCE_DELETE", StageInstanceDelete);
        registry
    }

    /// Register `processor` for `event`, replacing any previous one.
    pub fn register<P>(&mut self, event: &'static str, processor: P) -> &mut Self
    where
        P: DispatchProcessor + 'static,
    {
        self.processors.insert(event, Arc::new(processor));
        self
    }

    pub fn get(&self, event: &str) -> Option<&Arc<dyn DispatchProcessor>> {
        self.processors.get(event)
    }

    pub fn contains(&self, event: &str) -> bool {
        self.processors.contains_key(event)
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Run the processor for `event`.
    ///
    /// Returns `Ok(false)` if no processor is registered for the name.
    pub async fn dispatch(
        &self,
        state: &Arc<StateController>,
        event: &str,
        payload: Value,
        token: &CancellationToken,
    ) -> Result<bool, DispatchError> {
        let Some(processor) = self.processors.get(event) else {
            trace!(event, "No processor registered, event ignored");
            metrics::record_dispatch(event, "ignored", 0.0);
            return Ok(false);
        };

        let start = Instant::now();
        let result = processor.process(state, payload, token).await;
        let outcome = match &result {
            Ok(()) => "ok",
            Err(DispatchError::Malformed(_)) => "malformed",
            Err(DispatchError::Cancelled) => "cancelled",
            Err(_) => "failed",
        };
        metrics::record_dispatch(event, outcome, start.elapsed().as_secs_f64());

        result.map(|()| true)
    }
}

impl fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut events: Vec<_> = self.processors.keys().collect();
        events.sort();
        f.debug_struct("ProcessorRegistry").field("events", &events).finish()
    }
}

/// Stop between writes once the token fires.
pub(crate) fn check_cancelled(token: &CancellationToken) -> Result<(), DispatchError> {
    if token.is_cancelled() {
        Err(DispatchError::Cancelled)
    } else {
        Ok(())
    }
}

/// The guild scope for an event, opening it with a latent guild if the
/// guild has not been seen yet.
pub(crate) fn guild_scope(state: &StateController, guild_id: Snowflake) -> Result<Scope, DispatchError> {
    state.ensure_guild_scope(guild_id)?;
    Ok(Scope::Guild(guild_id))
}

/// An update event named an entity the cache does not hold. Updates never
/// create entities, so the event is dropped.
pub(crate) fn skip_unknown(kind: EntityKind, id: Snowflake) {
    debug!(%kind, %id, "Update referenced an uncached entity, ignored");
}
