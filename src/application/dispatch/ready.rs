//! Session events.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{check_cancelled, DispatchProcessor};
use crate::application::events::CacheEvent;
use crate::application::state::StateController;
use crate::domain::models::UserModel;
use crate::domain::value_objects::Scope;
use crate::infrastructure::codec::{self, ReadyPayload};
use crate::shared::error::DispatchError;

/// `READY`: the current user and the session's guild list.
///
/// Every listed guild gets a latent placeholder so its scope exists before
/// the matching `GUILD_CREATE`. Guilds flagged unavailable are recorded.
pub struct Ready;

#[async_trait]
impl DispatchProcessor for Ready {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let ready: ReadyPayload = codec::decode(payload)?;
        let user_id = ready.user.id;

        state.users().create_or_update(Scope::Global, ready.user).await?;
        state.set_current_user(user_id);

        for guild in &ready.guilds {
            check_cancelled(token)?;
            if guild.unavailable {
                state.mark_unavailable(guild.id);
            }
            state.ensure_guild_scope(guild.id)?;
        }

        info!(
            user_id = %user_id,
            session_id = %ready.session_id,
            guilds = ready.guilds.len(),
            "Session ready"
        );
        state
            .events()
            .emit(CacheEvent::Ready {
                user_id,
                guilds: ready.guilds.len(),
            })
            .await;
        Ok(())
    }
}

/// `USER_UPDATE`: the current user changed.
pub struct UserUpdate;

#[async_trait]
impl DispatchProcessor for UserUpdate {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        _token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let user: UserModel = codec::decode(payload)?;
        let handle = state.users().create_or_update(Scope::Global, user).await?;
        if let Some(model) = handle.model() {
            state.events().emit(CacheEvent::UserUpdated(model)).await;
        }
        Ok(())
    }
}
