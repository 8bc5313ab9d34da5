//! Member and presence events.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{check_cancelled, guild_scope, skip_unknown, DispatchProcessor};
use crate::application::events::CacheEvent;
use crate::application::state::StateController;
use crate::domain::models::{EntityKind, PresenceModel, UserModel};
use crate::domain::value_objects::Scope;
use crate::infrastructure::codec::{
    self, GuildMemberPayload, GuildMemberRemovePayload, GuildMembersChunkPayload,
};
use crate::shared::error::DispatchError;

/// `GUILD_MEMBER_ADD` / `GUILD_MEMBER_UPDATE`. The member's user record is
/// refreshed first.
pub struct MemberUpsert {
    added: bool,
}

impl MemberUpsert {
    pub const ADD: Self = Self { added: true };
    pub const UPDATE: Self = Self { added: false };
}

#[async_trait]
impl DispatchProcessor for MemberUpsert {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let GuildMemberPayload { guild_id, member } = codec::decode(payload)?;
        let user = member.user.clone();

        let handle = if self.added {
            let scope = guild_scope(state, guild_id)?;
            state.users().create_or_update(Scope::Global, user).await?;
            check_cancelled(token)?;
            state.members().create_or_update(scope, member).await?
        } else {
            let scope = Scope::Guild(guild_id);
            let Some(handle) = state.members().update_existing(scope, member).await? else {
                skip_unknown(EntityKind::Member, user.id);
                return Ok(());
            };
            check_cancelled(token)?;
            state.users().create_or_update(Scope::Global, user).await?;
            handle
        };

        if let Some(member) = handle.model() {
            let event = if self.added {
                CacheEvent::MemberJoined { guild_id, member }
            } else {
                CacheEvent::MemberUpdated { guild_id, member }
            };
            state.events().emit(event).await;
        }
        Ok(())
    }
}

/// `GUILD_MEMBER_REMOVE`. The global user record is kept.
pub struct MemberRemove;

#[async_trait]
impl DispatchProcessor for MemberRemove {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        _token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let removed: GuildMemberRemovePayload = codec::decode(payload)?;
        let scope = Scope::Guild(removed.guild_id);
        let user_id = removed.user.id;

        state.members().remove(scope, user_id).await?;
        state.presences().remove(scope, user_id).await?;

        state
            .events()
            .emit(CacheEvent::MemberLeft {
                guild_id: removed.guild_id,
                user_id,
            })
            .await;
        Ok(())
    }
}

/// `GUILD_MEMBERS_CHUNK`: a page of a member request.
pub struct MembersChunk;

#[async_trait]
impl DispatchProcessor for MembersChunk {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let chunk: GuildMembersChunkPayload = codec::decode(payload)?;
        let scope = guild_scope(state, chunk.guild_id)?;
        let last = chunk.is_last();
        let count = chunk.members.len();

        let users: Vec<UserModel> = chunk.members.iter().map(|m| m.user.clone()).collect();
        state.users().batch_update(Scope::Global, users).await?;
        check_cancelled(token)?;
        state.members().batch_update(scope, chunk.members).await?;
        check_cancelled(token)?;
        state.presences().batch_update(scope, chunk.presences).await?;

        debug!(
            guild_id = %chunk.guild_id,
            chunk = chunk.chunk_index,
            of = chunk.chunk_count,
            count,
            not_found = chunk.not_found.len(),
            "Member chunk applied"
        );
        state
            .events()
            .emit(CacheEvent::MembersChunk {
                guild_id: chunk.guild_id,
                count,
                last,
            })
            .await;
        Ok(())
    }
}

/// `PRESENCE_UPDATE`. Presences outside a guild are not cached.
pub struct PresenceUpdate;

#[async_trait]
impl DispatchProcessor for PresenceUpdate {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        _token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let presence: PresenceModel = codec::decode(payload)?;
        let Some(guild_id) = presence.guild_id else {
            return Ok(());
        };
        let scope = guild_scope(state, guild_id)?;

        let handle = state.presences().create_or_update(scope, presence).await?;
        if let Some(presence) = handle.model() {
            state
                .events()
                .emit(CacheEvent::PresenceUpdated { guild_id, presence })
                .await;
        }
        Ok(())
    }
}
