//! Channel and thread events.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{check_cancelled, guild_scope, skip_unknown, DispatchProcessor};
use crate::application::events::CacheEvent;
use crate::application::state::StateController;
use crate::domain::models::{ChannelModel, EntityKind, ThreadModel};
use crate::domain::value_objects::{Scope, Snowflake};
use crate::infrastructure::codec::{self, ThreadDeletePayload, ThreadListSyncPayload};
use crate::shared::error::{CodecError, DispatchError};

/// `CHANNEL_CREATE` / `CHANNEL_UPDATE`.
///
/// Guild channels live under their guild, DM and group channels globally.
pub struct ChannelUpsert {
    created: bool,
}

impl ChannelUpsert {
    pub const CREATE: Self = Self { created: true };
    pub const UPDATE: Self = Self { created: false };
}

#[async_trait]
impl DispatchProcessor for ChannelUpsert {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        _token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let channel: ChannelModel = codec::decode(payload)?;
        let handle = if self.created {
            let scope = match channel.guild_id {
                Some(guild_id) => guild_scope(state, guild_id)?,
                None => Scope::Global,
            };
            state.channels().create_or_update(scope, channel).await?
        } else {
            let (scope, id) = (Scope::guild_or_global(channel.guild_id), channel.id);
            match state.channels().update_existing(scope, channel).await? {
                Some(handle) => handle,
                None => {
                    skip_unknown(EntityKind::Channel, id);
                    return Ok(());
                }
            }
        };
        if let Some(model) = handle.model() {
            let event = if self.created {
                CacheEvent::ChannelCreated(model)
            } else {
                CacheEvent::ChannelUpdated(model)
            };
            state.events().emit(event).await;
        }
        Ok(())
    }
}

/// `CHANNEL_DELETE`: the channel and its messages.
pub struct ChannelDelete;

#[async_trait]
impl DispatchProcessor for ChannelDelete {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        _token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let channel: ChannelModel = codec::decode(payload)?;
        let channel_id = channel.id;
        let scope = Scope::guild_or_global(channel.guild_id);

        let last = state.remove_channel(scope, channel_id).await?;
        state
            .events()
            .emit(CacheEvent::ChannelDeleted { channel_id, last })
            .await;
        Ok(())
    }
}

/// `THREAD_CREATE` / `THREAD_UPDATE`. Threads are stored under their guild.
pub struct ThreadUpsert {
    created: bool,
}

impl ThreadUpsert {
    pub const CREATE: Self = Self { created: true };
    pub const UPDATE: Self = Self { created: false };
}

#[async_trait]
impl DispatchProcessor for ThreadUpsert {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        _token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let thread: ThreadModel = codec::decode(payload)?;
        let guild_id = require_guild(thread.guild_id, thread.id)?;

        let handle = if self.created {
            let scope = guild_scope(state, guild_id)?;
            state.threads().create_or_update(scope, thread).await?
        } else {
            let id = thread.id;
            match state.threads().update_existing(Scope::Guild(guild_id), thread).await? {
                Some(handle) => handle,
                None => {
                    skip_unknown(EntityKind::Thread, id);
                    return Ok(());
                }
            }
        };
        if let Some(model) = handle.model() {
            let event = if self.created {
                CacheEvent::ThreadCreated(model)
            } else {
                CacheEvent::ThreadUpdated(model)
            };
            state.events().emit(event).await;
        }
        Ok(())
    }
}

/// `THREAD_DELETE`
pub struct ThreadDelete;

#[async_trait]
impl DispatchProcessor for ThreadDelete {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        _token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let deleted: ThreadDeletePayload = codec::decode(payload)?;
        let guild_id = require_guild(deleted.guild_id, deleted.id)?;

        state.remove_thread(guild_id, deleted.id).await?;
        state
            .events()
            .emit(CacheEvent::ThreadDeleted {
                guild_id,
                thread_id: deleted.id,
            })
            .await;
        Ok(())
    }
}

/// `THREAD_LIST_SYNC`: the active threads of some (or all) parent channels.
///
/// Cached threads under a synced parent that are missing from the list are
/// no longer active and are removed.
pub struct ThreadListSync;

#[async_trait]
impl DispatchProcessor for ThreadListSync {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let sync: ThreadListSyncPayload = codec::decode(payload)?;
        let scope = guild_scope(state, sync.guild_id)?;
        let parents: Option<HashSet<Snowflake>> = sync.channel_ids.map(|ids| ids.into_iter().collect());
        let active: HashSet<Snowflake> = sync.threads.iter().map(|t| t.id).collect();

        let cached = state.threads().get_all(scope).await?;
        let stale: Vec<Snowflake> = cached
            .iter()
            .filter(|thread| !active.contains(&thread.id()))
            .filter(|thread| match (&parents, thread.parent_id()) {
                (None, _) => true,
                (Some(parents), Some(parent)) => parents.contains(&parent),
                (Some(_), None) => false,
            })
            .map(|thread| thread.id())
            .collect();
        drop(cached);

        for thread_id in &stale {
            check_cancelled(token)?;
            state.remove_thread(sync.guild_id, *thread_id).await?;
        }
        state.threads().batch_update(scope, sync.threads).await?;

        debug!(guild_id = %sync.guild_id, active = active.len(), removed = stale.len(), "Threads synced");
        Ok(())
    }
}

fn require_guild(guild_id: Option<Snowflake>, thread_id: Snowflake) -> Result<Snowflake, DispatchError> {
    guild_id.ok_or_else(|| {
        DispatchError::Malformed(CodecError::Validation(format!(
            "thread {thread_id} has no guild_id"
        )))
    })
}
