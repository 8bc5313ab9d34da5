//! Guild lifecycle events.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::{check_cancelled, guild_scope, skip_unknown, DispatchProcessor};
use crate::application::events::CacheEvent;
use crate::application::state::StateController;
use crate::domain::models::{EmoteModel, EntityKind, UserModel};
use crate::domain::value_objects::{Scope, Snowflake};
use crate::infrastructure::codec::{
    self, GuildCreatePayload, GuildEmojisUpdatePayload, GuildUpdatePayload, UnavailableGuild,
};
use crate::shared::error::{CacheError, DispatchError};

/// `GUILD_CREATE`: a full guild snapshot, or an outage marker.
///
/// The guild model is written first so its scope exists; the sibling kinds
/// are then written concurrently.
pub struct GuildCreate;

#[async_trait]
impl DispatchProcessor for GuildCreate {
    #[instrument(skip_all, name = "guild_create")]
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let probe: UnavailableGuild = codec::decode_ref(&payload)?;
        if probe.unavailable {
            debug!(guild_id = %probe.id, "Guild created unavailable");
            state.mark_unavailable(probe.id);
            state.ensure_guild_scope(probe.id)?;
            state
                .events()
                .emit(CacheEvent::GuildUnavailable { guild_id: probe.id })
                .await;
            return Ok(());
        }

        let snapshot: GuildCreatePayload = codec::decode(payload)?;
        let guild_id = snapshot.guild.id;
        let scope = Scope::Guild(guild_id);

        let guild = state.guilds().create_or_update(Scope::Global, snapshot.guild).await?;
        check_cancelled(token)?;

        let users: Vec<UserModel> = snapshot.members.iter().map(|m| m.user.clone()).collect();
        let member_count = snapshot.members.len();
        tokio::try_join!(
            state.channels().batch_update(scope, snapshot.channels),
            state.threads().batch_update(scope, snapshot.threads),
            state.roles().batch_update(scope, snapshot.roles),
            state.members().batch_update(scope, snapshot.members),
            state.users().batch_update(Scope::Global, users),
            state.voice_states().batch_update(scope, snapshot.voice_states),
            state.presences().batch_update(scope, snapshot.presences),
            state.emotes().batch_update(scope, snapshot.emojis),
            state.stage_instances().batch_update(scope, snapshot.stage_instances),
            state.scheduled_events().batch_update(scope, snapshot.guild_scheduled_events),
        )?;
        check_cancelled(token)?;

        let recovered = state.mark_available(guild_id);
        info!(guild_id = %guild_id, members = member_count, recovered, "Guild cached");

        if let Some(model) = guild.model() {
            let event = if recovered {
                CacheEvent::GuildAvailable(model)
            } else {
                CacheEvent::GuildCreated(model)
            };
            state.events().emit(event).await;
        }
        Ok(())
    }
}

/// `GUILD_UPDATE`: guild fields, with role and emote snapshots when present.
pub struct GuildUpdate;

#[async_trait]
impl DispatchProcessor for GuildUpdate {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let update: GuildUpdatePayload = codec::decode(payload)?;
        let guild_id = update.guild.id;
        let Some(guild) = state.guilds().update_existing(Scope::Global, update.guild).await? else {
            skip_unknown(EntityKind::Guild, guild_id);
            return Ok(());
        };

        if let Some(roles) = update.roles {
            check_cancelled(token)?;
            state.roles().batch_update(Scope::Guild(guild_id), roles).await?;
        }
        if let Some(emojis) = update.emojis {
            check_cancelled(token)?;
            replace_emotes(state, guild_id, emojis).await?;
        }

        if let Some(model) = guild.model() {
            state.events().emit(CacheEvent::GuildUpdated(model)).await;
        }
        Ok(())
    }
}

/// `GUILD_DELETE`: the bot left the guild, or the guild went into an outage.
///
/// During an outage the guild entity and its scope are kept and everything
/// below is purged; the next `GUILD_CREATE` repopulates it.
pub struct GuildDelete;

#[async_trait]
impl DispatchProcessor for GuildDelete {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        _token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let marker: UnavailableGuild = codec::decode(payload)?;
        let guild_id = marker.id;

        if marker.unavailable {
            state.mark_unavailable(guild_id);
            if state.scopes().contains(Scope::Guild(guild_id)) {
                let purged = state.purge_scope(Scope::Guild(guild_id)).await?;
                info!(guild_id = %guild_id, purged, "Guild unavailable");
            }
            state
                .events()
                .emit(CacheEvent::GuildUnavailable { guild_id })
                .await;
            return Ok(());
        }

        let last = state.remove_guild(guild_id).await?;
        info!(guild_id = %guild_id, "Guild removed");
        state
            .events()
            .emit(CacheEvent::GuildRemoved { guild_id, last })
            .await;
        Ok(())
    }
}

/// `GUILD_EMOJIS_UPDATE`: the guild's full emote set.
pub struct GuildEmojisUpdate;

#[async_trait]
impl DispatchProcessor for GuildEmojisUpdate {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        _token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let update: GuildEmojisUpdatePayload = codec::decode(payload)?;
        guild_scope(state, update.guild_id)?;
        let count = update.emojis.len();
        replace_emotes(state, update.guild_id, update.emojis).await?;

        state
            .events()
            .emit(CacheEvent::EmotesUpdated {
                guild_id: update.guild_id,
                count,
            })
            .await;
        Ok(())
    }
}

/// Write `emojis` and drop cached emotes missing from the set.
async fn replace_emotes(
    state: &StateController,
    guild_id: Snowflake,
    emojis: Vec<EmoteModel>,
) -> Result<(), CacheError> {
    let scope = Scope::Guild(guild_id);
    let keep: HashSet<Snowflake> = emojis.iter().map(|e| e.id).collect();

    state.emotes().batch_update(scope, emojis).await?;
    for stale in state.emotes().get_all_ids(scope).await? {
        if !keep.contains(&stale) {
            state.emotes().remove(scope, stale).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use super::*;
    use crate::application::state::{HasChannels, HasMembers};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn snapshot() -> Value {
        json!({
            "id": "100",
            "name": "Quokka Club",
            "owner_id": "5",
            "channels": [{"id": "10", "type": 0, "name": "general"}],
            "roles": [{"id": "100", "name": "@everyone", "position": 0, "permissions": "1024"}],
            "members": [{"user": {"id": "5", "username": "quokka"}, "roles": []}],
            "emojis": [{"id": "30", "name": "wave"}]
        })
    }

    // ========================================================================
    // GUILD_CREATE Tests
    // ========================================================================

    #[tokio::test]
    async fn test_guild_create_populates_children() {
        let (state, _hub) = testing::state();
        GuildCreate.process(&state, snapshot(), &CancellationToken::new()).await.unwrap();

        let guild = state.guilds().get(Scope::Global, Snowflake::new(100)).await.unwrap().unwrap();
        assert_eq!(guild.channels().await.unwrap().len(), 1);
        assert_eq!(guild.members().await.unwrap().len(), 1);
        assert!(state.users().get(Scope::Global, Snowflake::new(5)).await.unwrap().is_some());
        assert!(state.scopes().contains(Scope::Channel(Snowflake::new(10))));
    }

    #[tokio::test]
    async fn test_unavailable_create_marks_guild() {
        let (state, _hub) = testing::state();
        GuildCreate
            .process(&state, json!({"id": "100", "unavailable": true}), &CancellationToken::new())
            .await
            .unwrap();

        assert!(state.is_unavailable(Snowflake::new(100)));
        assert!(state.guilds().get(Scope::Global, Snowflake::new(100)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_after_outage_emits_available() {
        let (state, hub) = testing::state();
        let mut events = hub.take().unwrap();
        let token = CancellationToken::new();

        GuildCreate.process(&state, snapshot(), &token).await.unwrap();
        GuildDelete
            .process(&state, json!({"id": "100", "unavailable": true}), &token)
            .await
            .unwrap();
        GuildCreate.process(&state, snapshot(), &token).await.unwrap();

        let names: Vec<&str> = std::iter::from_fn(|| events.try_recv()).map(|e| e.name()).collect();
        assert_eq!(names, vec!["guild_created", "guild_unavailable", "guild_available"]);
        assert!(!state.is_unavailable(Snowflake::new(100)));
    }

    #[tokio::test]
    async fn test_cancelled_before_children() {
        let (state, _hub) = testing::state();
        let token = CancellationToken::new();
        token.cancel();

        let result = GuildCreate.process(&state, snapshot(), &token).await;

        assert!(matches!(result, Err(DispatchError::Cancelled)));
        assert!(state.channels().get_all(Scope::Guild(Snowflake::new(100))).await.unwrap().is_empty());
    }

    // ========================================================================
    // GUILD_DELETE Tests
    // ========================================================================

    #[tokio::test]
    async fn test_outage_keeps_guild_entity() {
        let (state, _hub) = testing::state();
        let token = CancellationToken::new();
        GuildCreate.process(&state, snapshot(), &token).await.unwrap();
        let guild = state.guilds().get(Scope::Global, Snowflake::new(100)).await.unwrap().unwrap();

        GuildDelete
            .process(&state, json!({"id": "100", "unavailable": true}), &token)
            .await
            .unwrap();

        assert!(guild.is_live());
        assert!(guild.channels().await.unwrap().is_empty());
        assert!(state.is_unavailable(Snowflake::new(100)));
    }

    #[tokio::test]
    async fn test_leave_removes_guild() {
        let (state, _hub) = testing::state();
        let token = CancellationToken::new();
        GuildCreate.process(&state, snapshot(), &token).await.unwrap();

        GuildDelete.process(&state, json!({"id": "100"}), &token).await.unwrap();

        assert!(state.guilds().get(Scope::Global, Snowflake::new(100)).await.unwrap().is_none());
        assert!(!state.scopes().contains(Scope::Guild(Snowflake::new(100))));
    }

    #[tokio::test]
    async fn test_emojis_update_replaces_set() {
        let (state, _hub) = testing::state();
        let token = CancellationToken::new();
        GuildCreate.process(&state, snapshot(), &token).await.unwrap();

        GuildEmojisUpdate
            .process(
                &state,
                json!({"guild_id": "100", "emojis": [{"id": "31", "name": "party"}]}),
                &token,
            )
            .await
            .unwrap();

        let ids = state.emotes().get_all_ids(Scope::Guild(Snowflake::new(100))).await.unwrap();
        assert_eq!(ids, vec![Snowflake::new(31)]);
    }

    // ========================================================================
    // GUILD_UPDATE Tests
    // ========================================================================

    #[tokio::test]
    async fn test_guild_update_after_delete_is_noop() {
        let (state, hub) = testing::state();
        let token = CancellationToken::new();
        GuildCreate.process(&state, snapshot(), &token).await.unwrap();
        GuildDelete.process(&state, json!({"id": "100"}), &token).await.unwrap();
        let mut events = hub.take().unwrap();

        GuildUpdate
            .process(
                &state,
                json!({"id": "100", "name": "stale", "owner_id": "5", "roles": []}),
                &token,
            )
            .await
            .unwrap();

        assert!(state.guilds().get_by_id(Snowflake::new(100)).await.unwrap().is_none());
        assert!(!state.scopes().contains(Scope::Guild(Snowflake::new(100))));
        assert!(events.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_guild_update_fills_latent_guild() {
        let (state, _hub) = testing::state();
        let latent = state.guilds().attach_latent(Scope::Global, Snowflake::new(100)).unwrap();

        GuildUpdate
            .process(
                &state,
                json!({"id": "100", "name": "Renamed", "owner_id": "5"}),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(latent.is_live());
        assert_eq!(latent.name().as_deref(), Some("Renamed"));
    }
}
