//! Message events.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::{check_cancelled, DispatchProcessor};
use crate::application::events::CacheEvent;
use crate::application::state::StateController;
use crate::domain::models::MessageModel;
use crate::domain::value_objects::Scope;
use crate::infrastructure::codec::{
    self, MessageDeleteBulkPayload, MessageDeletePayload, MessageUpdatePayload,
};
use crate::shared::error::DispatchError;

/// `MESSAGE_CREATE`. Opens the channel scope if the channel is not cached
/// yet, and refreshes the author's user record unless a webhook posted it.
pub struct MessageCreate;

#[async_trait]
impl DispatchProcessor for MessageCreate {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let message: MessageModel = codec::decode(payload)?;
        let parent = Scope::guild_or_global(message.guild_id);
        state.ensure_channel_scope(parent, message.channel_id)?;

        if message.webhook_id.is_none() {
            state
                .users()
                .create_or_update(Scope::Global, message.author.clone())
                .await?;
            check_cancelled(token)?;
        }

        let scope = Scope::Channel(message.channel_id);
        let handle = state.messages().create_or_update(scope, message).await?;
        if let Some(model) = handle.model() {
            state.events().emit(CacheEvent::MessageCreated(model)).await;
        }
        Ok(())
    }
}

/// `MESSAGE_UPDATE`: a partial update.
///
/// Merged into the cached message to form a new whole model. When the
/// message is not cached it is stored only if the update is complete.
pub struct MessageUpdate;

#[async_trait]
impl DispatchProcessor for MessageUpdate {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        _token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let update: MessageUpdatePayload = codec::decode(payload)?;
        let scope = Scope::Channel(update.channel_id);

        let cached = state
            .messages()
            .get(scope, update.id)
            .await?
            .and_then(|handle| handle.model());

        let next = match cached {
            Some(base) => update.merge_into(&base),
            None => {
                let parent = Scope::guild_or_global(update.guild_id);
                let channel_id = update.channel_id;
                let message_id = update.id;
                let Some(full) = update.into_full() else {
                    trace!(%channel_id, %message_id, "Partial update for uncached message dropped");
                    return Ok(());
                };
                state.ensure_channel_scope(parent, channel_id)?;
                full
            }
        };

        let handle = state.messages().create_or_update(scope, next).await?;
        if let Some(model) = handle.model() {
            state.events().emit(CacheEvent::MessageUpdated(model)).await;
        }
        Ok(())
    }
}

/// `MESSAGE_DELETE`
pub struct MessageDelete;

#[async_trait]
impl DispatchProcessor for MessageDelete {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        _token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let deleted: MessageDeletePayload = codec::decode(payload)?;
        let last = state
            .messages()
            .remove(Scope::Channel(deleted.channel_id), deleted.id)
            .await?;

        state
            .events()
            .emit(CacheEvent::MessageDeleted {
                channel_id: deleted.channel_id,
                message_id: deleted.id,
                last,
            })
            .await;
        Ok(())
    }
}

/// `MESSAGE_DELETE_BULK`
pub struct MessageDeleteBulk;

#[async_trait]
impl DispatchProcessor for MessageDeleteBulk {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let deleted: MessageDeleteBulkPayload = codec::decode(payload)?;
        let scope = Scope::Channel(deleted.channel_id);

        for id in &deleted.ids {
            check_cancelled(token)?;
            state.messages().remove(scope, *id).await?;
        }

        state
            .events()
            .emit(CacheEvent::MessagesBulkDeleted {
                channel_id: deleted.channel_id,
                message_ids: deleted.ids,
            })
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use super::*;
    use crate::application::state::EntityHandle;
    use crate::domain::value_objects::Snowflake;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn message(id: u64, content: &str) -> Value {
        json!({
            "id": id.to_string(),
            "channel_id": "10",
            "guild_id": "100",
            "author": {"id": "5", "username": "quokka"},
            "content": content,
            "timestamp": "2024-01-01T00:00:00Z"
        })
    }

    fn scope() -> Scope {
        Scope::Channel(Snowflake::new(10))
    }

    #[tokio::test]
    async fn test_create_opens_channel_scope() {
        let (state, _hub) = testing::state();
        MessageCreate.process(&state, message(1, "hi"), &CancellationToken::new()).await.unwrap();

        assert!(state.scopes().contains(Scope::Guild(Snowflake::new(100))));
        assert!(state.scopes().contains(scope()));
        assert!(state.users().get(Scope::Global, Snowflake::new(5)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_partial_update_merges_into_cached() {
        let (state, _hub) = testing::state();
        let token = CancellationToken::new();
        MessageCreate.process(&state, message(1, "hi"), &token).await.unwrap();
        let before = state.messages().get(scope(), Snowflake::new(1)).await.unwrap().unwrap();

        MessageUpdate
            .process(
                &state,
                json!({"id": "1", "channel_id": "10", "content": "edited", "edited_timestamp": "2024-01-01T00:01:00Z"}),
                &token,
            )
            .await
            .unwrap();

        let after = state.messages().get(scope(), Snowflake::new(1)).await.unwrap().unwrap();
        assert!(EntityHandle::ptr_eq(&before, &after));
        assert_eq!(after.content().as_deref(), Some("edited"));
        assert_eq!(after.author_id(), Some(Snowflake::new(5)));
        assert!(after.with_model(|m| m.is_edited()).unwrap());
    }

    #[tokio::test]
    async fn test_partial_update_for_uncached_dropped() {
        let (state, _hub) = testing::state();
        MessageUpdate
            .process(&state, json!({"id": "1", "channel_id": "10", "content": "x"}), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!state.scopes().contains(scope()));
    }

    #[tokio::test]
    async fn test_delete_keeps_last_model_for_handles() {
        let (state, _hub) = testing::state();
        let token = CancellationToken::new();
        MessageCreate.process(&state, message(1, "bye"), &token).await.unwrap();
        let handle = state.messages().get(scope(), Snowflake::new(1)).await.unwrap().unwrap();

        MessageDelete
            .process(&state, json!({"id": "1", "channel_id": "10"}), &token)
            .await
            .unwrap();

        assert!(handle.is_deleted());
        assert_eq!(handle.content().as_deref(), Some("bye"));
        assert!(state.messages().get(scope(), Snowflake::new(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bulk_delete() {
        let (state, _hub) = testing::state();
        let token = CancellationToken::new();
        for id in 1..=3 {
            MessageCreate.process(&state, message(id, "m"), &token).await.unwrap();
        }

        MessageDeleteBulk
            .process(&state, json!({"ids": ["1", "2"], "channel_id": "10"}), &token)
            .await
            .unwrap();

        assert_eq!(state.messages().get_all_ids(scope()).await.unwrap(), vec![Snowflake::new(3)]);
    }
}
