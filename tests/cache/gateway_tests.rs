//! Gateway loop tests: ordering, barriers, failures and the event stream.

use pretty_assertions::assert_eq;
use serde_json::json;

use discord_state::application::events::CacheEvent;
use discord_state::domain::models::EntityKind;
use discord_state::gateway::{parse_line, GatewayDispatch};
use discord_state::startup::Application;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

use crate::common::*;

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test]
async fn test_create_update_delete_with_interleaved_guilds() {
    let client = client();
    let mut dispatches = Vec::new();
    for round in 0..3u64 {
        let target = 100;
        let other = 200 + round;
        dispatches.push(GatewayDispatch::new("GUILD_CREATE", guild(other, "noise")));
        match round {
            0 => dispatches.push(GatewayDispatch::new("GUILD_CREATE", guild(target, "created"))),
            1 => dispatches.push(GatewayDispatch::new("GUILD_UPDATE", guild(target, "updated"))),
            _ => dispatches.push(GatewayDispatch::new("GUILD_DELETE", json!({"id": "100"}))),
        }
        dispatches.push(GatewayDispatch::new("GUILD_UPDATE", guild(other, "noise 2")));
    }

    let summary = replay(&client, dispatches).await;

    assert_eq!(summary.failed, 0);
    assert!(client.guilds().cached(id(100)).await.unwrap().is_none());
    assert_eq!(client.state().guilds().stored().await, 3);
}

#[tokio::test]
async fn test_member_events_follow_their_guild() {
    let client = client();
    let member = |nick: &str| {
        json!({"guild_id": "100", "user": {"id": "5", "username": "quokka"}, "nick": nick, "roles": []})
    };
    let summary = replay(
        &client,
        vec![
            GatewayDispatch::new("GUILD_CREATE", guild_snapshot()),
            GatewayDispatch::new("GUILD_MEMBER_UPDATE", member("one")),
            GatewayDispatch::new("GUILD_MEMBER_UPDATE", member("two")),
            GatewayDispatch::new("GUILD_MEMBER_UPDATE", member("three")),
        ],
    )
    .await;

    assert_eq!(summary.processed, 4);
    let member = client.members(id(100)).cached(id(5)).await.unwrap().unwrap();
    assert_eq!(member.nick().as_deref(), Some("three"));
}

#[tokio::test]
async fn test_ready_then_guilds() {
    let client = client();
    let summary = replay(
        &client,
        vec![
            GatewayDispatch::new(
                "READY",
                json!({
                    "user": {"id": "1", "username": "bot"},
                    "guilds": [{"id": "100", "unavailable": true}],
                    "session_id": "abc"
                }),
            ),
            GatewayDispatch::new("GUILD_CREATE", guild_snapshot()),
        ],
    )
    .await;

    assert_eq!(summary.processed, 2);
    assert_eq!(client.state().current_user_id(), Some(id(1)));
    assert!(client.state().unavailable_guilds().is_empty());
}

// ============================================================================
// Failure isolation
// ============================================================================

#[tokio::test]
async fn test_malformed_and_unknown_events_are_skipped() {
    let client = client();
    let summary = replay(
        &client,
        vec![
            GatewayDispatch::new("MESSAGE_CREATE", json!({"id": "1", "channel_id": "10"})),
            GatewayDispatch::new("SOMETHING_NEW", json!({"guild_id": "100"})),
            GatewayDispatch::new("MESSAGE_CREATE", message(2, 10, Some(100), "ok")),
        ],
    )
    .await;

    assert_eq!(summary.received, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.ignored, 1);
    assert_eq!(summary.last_sequence, Some(3));
    assert!(client.messages(id(10)).cached(id(2)).await.unwrap().is_some());
}

#[test]
fn test_frame_line_parses_to_dispatch() {
    let dispatch = parse_line(r#"{"op":0,"s":4,"t":"GUILD_DELETE","d":{"id":"100"}}"#)
        .unwrap()
        .unwrap();
    assert_eq!(dispatch.event_name, "GUILD_DELETE");
    assert_eq!(dispatch.sequence, Some(4));
}

#[tokio::test]
async fn test_application_replays_jsonl() {
    let app = Application::build(test_settings()).unwrap();
    let input = [
        r#"{"op":10,"d":{"heartbeat_interval":41250}}"#.to_string(),
        json!({"op": 0, "s": 1, "t": "GUILD_CREATE", "d": guild_snapshot()}).to_string(),
        "{ not json".to_string(),
        String::new(),
        json!({"event_name": "MESSAGE_CREATE", "sequence": 2, "payload": message(1, 10, Some(100), "hi")})
            .to_string(),
    ]
    .join("\n");

    let summary = app
        .replay(BufReader::new(input.as_bytes()), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.received, 2);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.last_sequence, Some(2));
    let stats = app.stats().await;
    assert_eq!(stats.count(EntityKind::Message), 1);
    assert_eq!(stats.count(EntityKind::Guild), 1);
}

// ============================================================================
// Event stream
// ============================================================================

#[tokio::test]
async fn test_events_are_published_in_order() {
    let client = client();
    let mut events = client.take_events().unwrap();

    dispatch(&client, "GUILD_CREATE", guild_snapshot()).await;
    dispatch(&client, "MESSAGE_CREATE", message(1, 10, Some(100), "hi")).await;
    dispatch(&client, "MESSAGE_DELETE", json!({"id": "1", "channel_id": "10", "guild_id": "100"})).await;

    let names: Vec<_> = std::iter::from_fn(|| events.try_recv())
        .map(|event| event.name())
        .collect();
    assert_eq!(names, vec!["guild_created", "message_created", "message_deleted"]);
}

#[tokio::test]
async fn test_deleted_message_event_carries_last_model() {
    let client = client();
    let mut events = client.take_events().unwrap();
    dispatch(&client, "MESSAGE_CREATE", message(1, 10, None, "last words")).await;
    dispatch(&client, "MESSAGE_DELETE", json!({"id": "1", "channel_id": "10"})).await;

    let mut last = None;
    while let Some(event) = events.try_recv() {
        if let CacheEvent::MessageDeleted { last: model, .. } = event {
            last = model;
        }
    }
    assert_eq!(last.map(|m| m.content.clone()).as_deref(), Some("last words"));
}
