//! Role events.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{check_cancelled, guild_scope, skip_unknown, DispatchProcessor};
use crate::application::events::CacheEvent;
use crate::application::state::StateController;
use crate::domain::models::EntityKind;
use crate::domain::value_objects::Scope;
use crate::infrastructure::codec::{self, GuildRoleDeletePayload, GuildRolePayload};
use crate::shared::error::DispatchError;

/// `GUILD_ROLE_CREATE` / `GUILD_ROLE_UPDATE`
pub struct RoleUpsert {
    created: bool,
}

impl RoleUpsert {
    pub const CREATE: Self = Self { created: true };
    pub const UPDATE: Self = Self { created: false };
}

#[async_trait]
impl DispatchProcessor for RoleUpsert {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        _token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let GuildRolePayload { guild_id, role } = codec::decode(payload)?;
        let handle = if self.created {
            let scope = guild_scope(state, guild_id)?;
            state.roles().create_or_update(scope, role).await?
        } else {
            let id = role.id;
            match state.roles().update_existing(Scope::Guild(guild_id), role).await? {
                Some(handle) => handle,
                None => {
                    skip_unknown(EntityKind::Role, id);
                    return Ok(());
                }
            }
        };
        if let Some(role) = handle.model() {
            let event = if self.created {
                CacheEvent::RoleCreated { guild_id, role }
            } else {
                CacheEvent::RoleUpdated { guild_id, role }
            };
            state.events().emit(event).await;
        }
        Ok(())
    }
}

/// `GUILD_ROLE_DELETE`: the role, and its assignment on every cached member.
pub struct RoleDelete;

#[async_trait]
impl DispatchProcessor for RoleDelete {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let GuildRoleDeletePayload { guild_id, role_id } = codec::decode(payload)?;
        let scope = Scope::Guild(guild_id);
        if !state.scopes().contains(scope) {
            return Ok(());
        }

        state.roles().remove(scope, role_id).await?;

        let mut stripped = 0;
        for member in state.members().get_all(scope).await? {
            let Some(model) = member.model() else { continue };
            if !model.has_role(role_id) {
                continue;
            }
            check_cancelled(token)?;
            state.members().create_or_update(scope, model.without_role(role_id)).await?;
            stripped += 1;
        }

        debug!(guild_id = %guild_id, role_id = %role_id, stripped, "Role deleted");
        state
            .events()
            .emit(CacheEvent::RoleDeleted { guild_id, role_id })
            .await;
        Ok(())
    }
}
