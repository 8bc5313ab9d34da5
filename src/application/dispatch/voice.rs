//! Voice state events.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{check_cancelled, guild_scope, DispatchProcessor};
use crate::application::events::CacheEvent;
use crate::application::state::StateController;
use crate::domain::models::VoiceStateModel;
use crate::domain::value_objects::Scope;
use crate::infrastructure::codec;
use crate::shared::error::DispatchError;

/// `VOICE_STATE_UPDATE`. A null channel means the user left voice and the
/// state is removed. An embedded member refreshes the member too.
pub struct VoiceStateUpdate;

#[async_trait]
impl DispatchProcessor for VoiceStateUpdate {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let voice: VoiceStateModel = codec::decode(payload)?;
        // DM calls are not cached
        let Some(guild_id) = voice.guild_id else {
            return Ok(());
        };
        let user_id = voice.user_id;

        if !voice.is_connected() {
            state.voice_states().remove(Scope::Guild(guild_id), user_id).await?;
            state
                .events()
                .emit(CacheEvent::VoiceDisconnected { guild_id, user_id })
                .await;
            return Ok(());
        }

        let scope = guild_scope(state, guild_id)?;
        if let Some(member) = voice.member.clone() {
            state.users().create_or_update(Scope::Global, member.user.clone()).await?;
            state.members().create_or_update(scope, member).await?;
            check_cancelled(token)?;
        }

        let handle = state.voice_states().create_or_update(scope, voice).await?;
        if let Some(model) = handle.model() {
            state
                .events()
                .emit(CacheEvent::VoiceStateUpdated {
                    guild_id,
                    state: model,
                })
                .await;
        }
        Ok(())
    }
}
