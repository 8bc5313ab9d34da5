//! Cache contract tests
//!
//! Upsert idempotence, identity, eviction and the guild lifecycle, observed
//! through the public API only.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;

use discord_state::application::state::EntityHandle;
use discord_state::domain::models::{GuildModel, UserModel};
use discord_state::domain::value_objects::{Permissions, Scope};
use discord_state::infrastructure::store::{EntityStore, MemoryStore};

use crate::common::*;

fn user_model(username: &str) -> UserModel {
    serde_json::from_value(user(5, username)).unwrap()
}

// ============================================================================
// Store
// ============================================================================

#[tokio::test]
async fn test_upsert_is_idempotent() {
    let store: MemoryStore<UserModel> = MemoryStore::new();
    let model = Arc::new(user_model("quokka"));

    store.upsert(Scope::Global, Arc::clone(&model)).await.unwrap();
    store.upsert(Scope::Global, Arc::clone(&model)).await.unwrap();

    assert_eq!(store.len().await, 1);
    let stored = store.get(Scope::Global, id(5)).await.unwrap().unwrap();
    assert_eq!(*stored, *model);
}

// ============================================================================
// Identity
// ============================================================================

#[tokio::test]
async fn test_identity_is_stable_across_updates() {
    let client = client();
    let users = client.state().users();

    let first = users.create_or_update(Scope::Global, user_model("a")).await.unwrap();
    let mut handles = vec![first.clone()];
    for name in ["b", "c", "d"] {
        handles.push(users.create_or_update(Scope::Global, user_model(name)).await.unwrap());
    }

    for handle in &handles {
        assert!(EntityHandle::ptr_eq(&first, handle));
    }
    assert_eq!(first.username().as_deref(), Some("d"));
    assert_eq!(users.stored().await, 1);
}

#[tokio::test]
async fn test_gateway_and_fetch_share_identity() {
    let client = client();
    dispatch(&client, "USER_UPDATE", user(5, "before")).await;
    let held = client.users().cached(id(5)).await.unwrap().unwrap();

    dispatch(&client, "USER_UPDATE", user(5, "after")).await;

    let again = client.users().cached(id(5)).await.unwrap().unwrap();
    assert!(EntityHandle::ptr_eq(&held, &again));
    assert_eq!(held.username().as_deref(), Some("after"));
}

// ============================================================================
// Eviction
// ============================================================================

#[tokio::test]
async fn test_eviction_waits_for_last_handle() {
    let mut settings = test_settings();
    settings.cache.message_cache_size = 0;
    let client = client_with(settings);
    dispatch(&client, "MESSAGE_CREATE", message(1, 10, None, "hi")).await;

    let first = client.messages(id(10)).cached(id(1)).await.unwrap().unwrap();
    let second = first.clone();
    let third = first.clone();

    drop(first);
    drop(second);
    assert_eq!(client.state().run_eviction().await.unwrap(), 0);
    assert!(client.messages(id(10)).cached(id(1)).await.unwrap().is_some());

    drop(third);
    assert_eq!(client.state().run_eviction().await.unwrap(), 1);
    assert_eq!(client.state().messages().stored().await, 0);
}

#[tokio::test]
async fn test_evicted_handle_still_reads_last_model() {
    let mut settings = test_settings();
    settings.cache.message_cache_size = 1;
    let client = client_with(settings);
    for message_id in 1..=3 {
        dispatch(&client, "MESSAGE_CREATE", message(message_id, 10, None, "m")).await;
    }

    // Pinning 1 leaves only 2 and 3 for the policy
    let pinned = client.messages(id(10)).cached(id(1)).await.unwrap().unwrap();
    assert_eq!(client.state().run_eviction().await.unwrap(), 2);

    assert_eq!(client.messages(id(10)).all().await.unwrap().len(), 1);
    assert_eq!(pinned.content().as_deref(), Some("m"));
}

#[tokio::test]
async fn test_idle_members_evicted_per_guild() {
    let mut settings = test_settings();
    settings.cache.member_idle_secs = 1;
    let client = client_with(settings);
    for guild_id in ["100", "200", "300"] {
        dispatch(
            &client,
            "GUILD_MEMBER_ADD",
            json!({"guild_id": guild_id, "user": {"id": "5", "username": "quokka"}, "roles": []}),
        )
        .await;
    }

    // Guild 300 holds a lease, guild 200 is read again after the idle window
    let pinned = client.members(id(300)).cached(id(5)).await.unwrap().unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    drop(client.members(id(200)).cached(id(5)).await.unwrap());

    assert_eq!(client.state().members().evict().await.unwrap(), 1);

    let state = client.state();
    assert!(state.members().get_all_ids(Scope::Guild(id(100))).await.unwrap().is_empty());
    assert_eq!(state.members().get_all_ids(Scope::Guild(id(200))).await.unwrap(), vec![id(5)]);
    assert_eq!(state.members().get_all_ids(Scope::Guild(id(300))).await.unwrap(), vec![id(5)]);

    // Once released and idle, the remaining copies go too
    drop(pinned);
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    assert_eq!(client.state().members().evict().await.unwrap(), 2);
    assert_eq!(client.state().members().stored().await, 0);
}

// ============================================================================
// Guild lifecycle
// ============================================================================

#[tokio::test]
async fn test_guild_snapshot_populates_scoped_children() {
    let client = client();
    dispatch(&client, "GUILD_CREATE", guild_snapshot()).await;

    let state = client.state();
    let guild_scope = Scope::Guild(id(100));
    assert!(state.channels().get(guild_scope, id(10)).await.unwrap().is_some());
    assert!(state.members().get(guild_scope, id(5)).await.unwrap().is_some());
    assert!(state.guilds().get_by_id(id(100)).await.unwrap().is_some());
    assert!(state.users().get(Scope::Global, id(5)).await.unwrap().is_some());
}

#[tokio::test]
async fn test_unavailable_guild_recovers() {
    let client = client();
    dispatch(&client, "GUILD_CREATE", unavailable_guild(100)).await;
    assert!(client.state().is_unavailable(id(100)));
    assert!(client.members(id(100)).cached(id(5)).await.unwrap().is_none());

    dispatch(&client, "GUILD_CREATE", guild_snapshot()).await;

    assert!(!client.state().is_unavailable(id(100)));
    let guild = client.guilds().cached(id(100)).await.unwrap().unwrap();
    assert_eq!(guild.name().as_deref(), Some("Quokka Island"));
    assert!(client.members(id(100)).cached(id(5)).await.unwrap().is_some());
    assert!(client.channels().cached(id(10)).await.unwrap().is_some());
}

#[tokio::test]
async fn test_guild_delete_cascades() {
    let client = client();
    dispatch(&client, "GUILD_CREATE", guild_snapshot()).await;
    dispatch(&client, "MESSAGE_CREATE", message(1, 10, Some(100), "hi")).await;
    let channel = client.channels().cached(id(10)).await.unwrap().unwrap();

    dispatch(&client, "GUILD_DELETE", json!({"id": "100"})).await;

    assert!(client.guilds().cached(id(100)).await.unwrap().is_none());
    assert!(client.channels().cached(id(10)).await.unwrap().is_none());
    assert!(client.messages(id(10)).cached(id(1)).await.unwrap().is_none());
    assert!(channel.is_deleted());
    // Users are global and outlive the guild
    assert!(client.users().cached(id(5)).await.unwrap().is_some());
}

#[tokio::test]
async fn test_member_permissions_through_relations() {
    let client = client();
    dispatch(&client, "GUILD_CREATE", guild_snapshot()).await;

    let member = client.members(id(100)).cached(id(5)).await.unwrap().unwrap();
    let guild: Option<EntityHandle<GuildModel>> = client.guilds().cached(id(100)).await.unwrap();
    assert!(guild.is_some());

    // Member 5 owns the guild
    let permissions = member.permissions().await.unwrap().unwrap();
    assert_eq!(permissions, Permissions::all());
}

#[tokio::test]
async fn test_stale_updates_do_not_resurrect() {
    let client = client();
    dispatch(&client, "GUILD_CREATE", guild_snapshot()).await;
    dispatch(
        &client,
        "CHANNEL_CREATE",
        json!({"id": "11", "type": 0, "guild_id": "100", "name": "random"}),
    )
    .await;
    dispatch(&client, "CHANNEL_DELETE", json!({"id": "11", "type": 0, "guild_id": "100"})).await;
    dispatch(
        &client,
        "CHANNEL_UPDATE",
        json!({"id": "11", "type": 0, "guild_id": "100", "name": "stale"}),
    )
    .await;
    assert!(client.channels().cached(id(11)).await.unwrap().is_none());

    dispatch(&client, "GUILD_DELETE", json!({"id": "100"})).await;
    dispatch(&client, "GUILD_UPDATE", guild(100, "stale")).await;
    assert!(client.guilds().cached(id(100)).await.unwrap().is_none());
    assert_eq!(client.state().guilds().stored().await, 0);
}
