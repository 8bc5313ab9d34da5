//! Scheduled event and stage instance events.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{guild_scope, skip_unknown, DispatchProcessor};
use crate::application::events::CacheEvent;
use crate::application::state::StateController;
use crate::domain::models::{EntityKind, ScheduledEventModel, StageInstanceModel};
use crate::domain::value_objects::Scope;
use crate::infrastructure::codec;
use crate::shared::error::DispatchError;

/// `GUILD_SCHEDULED_EVENT_CREATE` / `GUILD_SCHEDULED_EVENT_UPDATE`
pub struct ScheduledEventUpsert {
    created: bool,
}

impl ScheduledEventUpsert {
    pub const CREATE: Self = Self { created: true };
    pub const UPDATE: Self = Self { created: false };
}

#[async_trait]
impl DispatchProcessor for ScheduledEventUpsert {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        _token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let event: ScheduledEventModel = codec::decode(payload)?;
        let handle = if self.created {
            let scope = guild_scope(state, event.guild_id)?;
            state.scheduled_events().create_or_update(scope, event).await?
        } else {
            let (scope, id) = (Scope::Guild(event.guild_id), event.id);
            match state.scheduled_events().update_existing(scope, event).await? {
                Some(handle) => handle,
                None => {
                    skip_unknown(EntityKind::ScheduledEvent, id);
                    return Ok(());
                }
            }
        };
        if let Some(model) = handle.model() {
            state
                .events()
                .emit(CacheEvent::ScheduledEventUpserted(model))
                .await;
        }
        Ok(())
    }
}

/// `GUILD_SCHEDULED_EVENT_DELETE`
pub struct ScheduledEventDelete;

#[async_trait]
impl DispatchProcessor for ScheduledEventDelete {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        _token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let event: ScheduledEventModel = codec::decode(payload)?;
        state
            .scheduled_events()
            .remove(Scope::Guild(event.guild_id), event.id)
            .await?;

        state
            .events()
            .emit(CacheEvent::ScheduledEventDeleted {
                guild_id: event.guild_id,
                event_id: event.id,
            })
            .await;
        Ok(())
    }
}

/// `STAGE_INSTANCE_CREATE` / `STAGE_INSTANCE_UPDATE`
pub struct StageInstanceUpsert {
    created: bool,
}

impl StageInstanceUpsert {
    pub const CREATE: Self = Self { created: true };
    pub const UPDATE: Self = Self { created: false };
}

#[async_trait]
impl DispatchProcessor for StageInstanceUpsert {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        _token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let stage: StageInstanceModel = codec::decode(payload)?;
        let handle = if self.created {
            let scope = guild_scope(state, stage.guild_id)?;
            state.stage_instances().create_or_update(scope, stage).await?
        } else {
            let (scope, id) = (Scope::Guild(stage.guild_id), stage.id);
            match state.stage_instances().update_existing(scope, stage).await? {
                Some(handle) => handle,
                None => {
                    skip_unknown(EntityKind::StageInstance, id);
                    return Ok(());
                }
            }
        };
        if let Some(model) = handle.model() {
            state
                .events()
                .emit(CacheEvent::StageInstanceUpserted(model))
                .await;
        }
        Ok(())
    }
}

/// `STAGE_INSTANCE_DELETE`
pub struct StageInstanceDelete;

#[async_trait]
impl DispatchProcessor for StageInstanceDelete {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        _token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let stage: StageInstanceModel = codec::decode(payload)?;
        state
            .stage_instances()
            .remove(Scope::Guild(stage.guild_id), stage.id)
            .await?;

        state
            .events()
            .emit(CacheEvent::StageInstanceDeleted {
                guild_id: stage.guild_id,
                stage_id: stage.id,
            })
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use super::*;
    use crate::domain::value_objects::Snowflake;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_scheduled_event_lifecycle() {
        let (state, _hub) = testing::state();
        let token = CancellationToken::new();
        let event = json!({
            "id": "60",
            "guild_id": "100",
            "name": "Game night",
            "scheduled_start_time": "2024-06-01T20:00:00Z",
            "status": 1
        });

        ScheduledEventUpsert::CREATE.process(&state, event.clone(), &token).await.unwrap();
        let scope = Scope::Guild(Snowflake::new(100));
        assert!(state.scheduled_events().get(scope, Snowflake::new(60)).await.unwrap().is_some());

        ScheduledEventDelete.process(&state, event.clone(), &token).await.unwrap();
        assert!(state.scheduled_events().get(scope, Snowflake::new(60)).await.unwrap().is_none());

        // A late update does not bring it back
        ScheduledEventUpsert::UPDATE.process(&state, event, &token).await.unwrap();
        assert!(state.scheduled_events().get(scope, Snowflake::new(60)).await.unwrap().is_none());
        assert_eq!(state.scheduled_events().stored().await, 0);
    }

    #[tokio::test]
    async fn test_stage_instance_upsert() {
        let (state, _hub) = testing::state();
        StageInstanceUpsert::CREATE
            .process(
                &state,
                json!({"id": "70", "guild_id": "100", "channel_id": "40", "topic": "AMA"}),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let stages = state
            .stage_instances()
            .get_all(Scope::Guild(Snowflake::new(100)))
            .await
            .unwrap();
        assert_eq!(stages.len(), 1);
    }

    #[tokio::test]
    async fn test_stage_instance_update_for_unknown_stage_is_ignored() {
        let (state, hub) = testing::state();
        let mut events = hub.take().unwrap();

        StageInstanceUpsert::UPDATE
            .process(
                &state,
                json!({"id": "70", "guild_id": "100", "channel_id": "40", "topic": "AMA"}),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(state.stage_instances().stored().await, 0);
        assert!(!state.scopes().contains(Scope::Guild(Snowflake::new(100))));
        assert!(events.try_recv().is_none());
    }
}
