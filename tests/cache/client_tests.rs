//! Client façade tests: cache-or-fetch reads against a mocked REST executor.

use mockall::predicate::{always, eq};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use discord_state::application::state::EntityHandle;
use discord_state::infrastructure::rest::Route;
use discord_state::shared::error::{ClientError, RestError};
use discord_state::CacheMode;

use crate::common::*;

// ============================================================================
// Cache-miss fallback
// ============================================================================

#[tokio::test]
async fn test_miss_triggers_exactly_one_rest_call() {
    let mut rest = MockRest::new();
    rest.expect_execute()
        .with(eq(Route::GetGuild { guild_id: id(100) }), always(), always())
        .times(1)
        .returning(|_, _, _| Ok(guild(100, "Fetched")));
    let client = client_with_rest(rest);
    let token = CancellationToken::new();

    let downloaded = client
        .guilds()
        .get(id(100), CacheMode::AllowDownload, &token)
        .await
        .unwrap()
        .unwrap();
    let cached = client
        .guilds()
        .get(id(100), CacheMode::CacheOnly, &token)
        .await
        .unwrap()
        .unwrap();

    assert!(EntityHandle::ptr_eq(&downloaded, &cached));
    assert_eq!(cached.name().as_deref(), Some("Fetched"));
}

#[tokio::test]
async fn test_cache_hit_never_calls_rest() {
    let mut rest = MockRest::new();
    rest.expect_execute().never();
    let client = client_with_rest(rest);
    dispatch(&client, "GUILD_CREATE", guild_snapshot()).await;

    let member = client
        .members(id(100))
        .get(id(5), CacheMode::AllowDownload, &CancellationToken::new())
        .await
        .unwrap();
    assert!(member.is_some());
}

#[tokio::test]
async fn test_not_found_surfaces_and_caches_nothing() {
    let mut rest = MockRest::new();
    rest.expect_execute().times(1).returning(|route, _, _| {
        Err(RestError::NotFound {
            route: route.path(),
        })
    });
    let client = client_with_rest(rest);

    let result = client
        .users()
        .get(id(5), CacheMode::AllowDownload, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(ClientError::Rest(RestError::NotFound { .. }))));
    assert!(client.users().cached(id(5)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_fetched_message_opens_channel_scope() {
    let mut rest = MockRest::new();
    rest.expect_execute()
        .with(
            eq(Route::GetMessage { channel_id: id(10), message_id: id(1) }),
            always(),
            always(),
        )
        .times(1)
        .returning(|_, _, _| Ok(message(1, 10, None, "from rest")));
    let client = client_with_rest(rest);

    let fetched = client
        .messages(id(10))
        .fetch(id(1), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(fetched.content().as_deref(), Some("from rest"));
    assert_eq!(client.messages(id(10)).all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_fetch_refreshes_cached_entity_in_place() {
    let mut rest = MockRest::new();
    rest.expect_execute()
        .times(1)
        .returning(|_, _, _| Ok(user(5, "renamed")));
    let client = client_with_rest(rest);
    dispatch(&client, "USER_UPDATE", user(5, "original")).await;
    let held = client.users().cached(id(5)).await.unwrap().unwrap();

    client.users().fetch(id(5), &CancellationToken::new()).await.unwrap();

    assert_eq!(held.username().as_deref(), Some("renamed"));
}

#[tokio::test]
async fn test_malformed_rest_body_is_a_decode_error() {
    let mut rest = MockRest::new();
    rest.expect_execute()
        .times(1)
        .returning(|_, _, _| Ok(json!({"id": "5"})));
    let client = client_with_rest(rest);

    let result = client.users().fetch(id(5), &CancellationToken::new()).await;
    assert!(matches!(result, Err(ClientError::Decode(_))));
    assert_eq!(client.state().users().stored().await, 0);
}

#[tokio::test]
async fn test_offline_client_misses_quietly() {
    let client = client();
    let result = client
        .users()
        .get(id(5), CacheMode::AllowDownload, &CancellationToken::new())
        .await
        .unwrap();
    assert!(result.is_none());

    let forced = client.users().fetch(id(5), &CancellationToken::new()).await;
    assert!(matches!(forced, Err(ClientError::Config(_))));
}
