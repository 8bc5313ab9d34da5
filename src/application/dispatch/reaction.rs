//! Reaction events.
//!
//! Reactions are sub-models of their message: each event produces a new
//! message model. Reactions on uncached messages are not tracked.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::DispatchProcessor;
use crate::application::events::CacheEvent;
use crate::application::state::StateController;
use crate::domain::models::MessageModel;
use crate::domain::value_objects::{Scope, Snowflake};
use crate::infrastructure::codec::{
    self, ReactionPayload, ReactionRemoveAllPayload, ReactionRemoveEmojiPayload,
};
use crate::shared::error::{CacheError, DispatchError};

/// Replace the cached message with `apply(message)`, if it is cached.
async fn rewrite(
    state: &StateController,
    channel_id: Snowflake,
    message_id: Snowflake,
    apply: impl FnOnce(&MessageModel) -> MessageModel + Send,
) -> Result<bool, CacheError> {
    let scope = Scope::Channel(channel_id);
    let Some(current) = state
        .messages()
        .get(scope, message_id)
        .await?
        .and_then(|handle| handle.model())
    else {
        return Ok(false);
    };

    state.messages().create_or_update(scope, apply(current.as_ref())).await?;
    Ok(true)
}

/// `MESSAGE_REACTION_ADD`
pub struct ReactionAdd;

#[async_trait]
impl DispatchProcessor for ReactionAdd {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        _token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let reaction: ReactionPayload = codec::decode(payload)?;
        let by_me = state.current_user_id() == Some(reaction.user_id);
        let emoji = reaction.emoji.clone();

        rewrite(state, reaction.channel_id, reaction.message_id, |m| {
            m.with_reaction_added(&emoji, by_me)
        })
        .await?;

        state
            .events()
            .emit(CacheEvent::ReactionAdded {
                channel_id: reaction.channel_id,
                message_id: reaction.message_id,
                user_id: reaction.user_id,
                emoji: reaction.emoji,
            })
            .await;
        Ok(())
    }
}

/// `MESSAGE_REACTION_REMOVE`
pub struct ReactionRemove;

#[async_trait]
impl DispatchProcessor for ReactionRemove {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        _token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let reaction: ReactionPayload = codec::decode(payload)?;
        let by_me = state.current_user_id() == Some(reaction.user_id);
        let emoji = reaction.emoji.clone();

        rewrite(state, reaction.channel_id, reaction.message_id, |m| {
            m.with_reaction_removed(&emoji, by_me)
        })
        .await?;

        state
            .events()
            .emit(CacheEvent::ReactionRemoved {
                channel_id: reaction.channel_id,
                message_id: reaction.message_id,
                user_id: reaction.user_id,
                emoji: reaction.emoji,
            })
            .await;
        Ok(())
    }
}

/// `MESSAGE_REACTION_REMOVE_ALL`
pub struct ReactionRemoveAll;

#[async_trait]
impl DispatchProcessor for ReactionRemoveAll {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        _token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let cleared: ReactionRemoveAllPayload = codec::decode(payload)?;
        rewrite(state, cleared.channel_id, cleared.message_id, |m| m.without_reactions()).await?;

        state
            .events()
            .emit(CacheEvent::ReactionsCleared {
                channel_id: cleared.channel_id,
                message_id: cleared.message_id,
            })
            .await;
        Ok(())
    }
}

/// `MESSAGE_REACTION_REMOVE_EMOJI`
pub struct ReactionRemoveEmoji;

#[async_trait]
impl DispatchProcessor for ReactionRemoveEmoji {
    async fn process(
        &self,
        state: &Arc<StateController>,
        payload: Value,
        _token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let cleared: ReactionRemoveEmojiPayload = codec::decode(payload)?;
        let emoji = cleared.emoji.clone();
        rewrite(state, cleared.channel_id, cleared.message_id, |m| {
            m.without_reaction_emoji(&emoji)
        })
        .await?;

        state
            .events()
            .emit(CacheEvent::ReactionsCleared {
                channel_id: cleared.channel_id,
                message_id: cleared.message_id,
            })
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use super::*;
    use crate::domain::models::ReactionEmoji;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn seeded() -> Arc<StateController> {
        let (state, _hub) = testing::state();
        state.set_current_user(Snowflake::new(5));
        state.ensure_channel_scope(Scope::Global, Snowflake::new(10)).unwrap();
        state
            .messages()
            .create_or_update(
                Scope::Channel(Snowflake::new(10)),
                serde_json::from_value(json!({
                    "id": "1", "channel_id": "10",
                    "author": {"id": "6", "username": "bob"},
                    "content": "hi", "timestamp": "2024-01-01T00:00:00Z"
                }))
                .unwrap(),
            )
            .await
            .unwrap();
        state
    }

    fn reaction(user: &str) -> Value {
        json!({"user_id": user, "channel_id": "10", "message_id": "1", "emoji": {"name": "👍"}})
    }

    fn thumbs() -> ReactionEmoji {
        ReactionEmoji {
            id: None,
            name: Some("👍".into()),
            animated: false,
        }
    }

    #[tokio::test]
    async fn test_reactions_accumulate() {
        let state = seeded().await;
        let token = CancellationToken::new();
        ReactionAdd.process(&state, reaction("5"), &token).await.unwrap();
        ReactionAdd.process(&state, reaction("6"), &token).await.unwrap();

        let message = state
            .messages()
            .get(Scope::Channel(Snowflake::new(10)), Snowflake::new(1))
            .await
            .unwrap()
            .unwrap();
        let group = message.with_model(|m| m.reaction(&thumbs()).cloned()).flatten().unwrap();
        assert_eq!(group.count, 2);
        assert!(group.me);

        ReactionRemove.process(&state, reaction("5"), &token).await.unwrap();
        let group = message.with_model(|m| m.reaction(&thumbs()).cloned()).flatten().unwrap();
        assert_eq!(group.count, 1);
        assert!(!group.me);
    }

    #[tokio::test]
    async fn test_remove_all_clears() {
        let state = seeded().await;
        let token = CancellationToken::new();
        ReactionAdd.process(&state, reaction("6"), &token).await.unwrap();

        ReactionRemoveAll
            .process(&state, json!({"channel_id": "10", "message_id": "1"}), &token)
            .await
            .unwrap();

        let message = state
            .messages()
            .get(Scope::Channel(Snowflake::new(10)), Snowflake::new(1))
            .await
            .unwrap()
            .unwrap();
        assert!(message.reactions().is_empty());
    }

    #[tokio::test]
    async fn test_reaction_on_uncached_message_ignored() {
        let (state, _hub) = testing::state();
        ReactionAdd
            .process(&state, reaction("5"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(state.stats().await.total(), 0);
    }
}
