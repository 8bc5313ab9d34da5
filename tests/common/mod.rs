//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use mockall::mock;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use discord_state::application::dispatch::ProcessorRegistry;
use discord_state::config::Settings;
use discord_state::domain::value_objects::Snowflake;
use discord_state::gateway::{GatewayDispatch, LoopSummary};
use discord_state::infrastructure::rest::{RequestOptions, RestExecutor, Route};
use discord_state::shared::error::RestError;
use discord_state::Client;

mock! {
    pub Rest {}

    #[async_trait]
    impl RestExecutor for Rest {
        async fn execute(
            &self,
            route: Route,
            options: RequestOptions,
            token: CancellationToken,
        ) -> Result<Value, RestError>;
    }
}

pub fn id(value: u64) -> Snowflake {
    Snowflake::new(value)
}

/// Settings for a client with no REST and no background sweeper.
pub fn test_settings() -> Settings {
    let mut settings = Settings::offline();
    settings.cache.eviction_interval_secs = 0;
    settings.gateway.dispatch_lanes = 4;
    settings
}

pub fn client() -> Client {
    Client::builder(test_settings()).build().unwrap()
}

pub fn client_with(settings: Settings) -> Client {
    Client::builder(settings).build().unwrap()
}

pub fn client_with_rest(rest: MockRest) -> Client {
    Client::builder(test_settings())
        .rest(Arc::new(rest))
        .build()
        .unwrap()
}

/// Apply one event directly, failing the test on a processing error.
pub async fn dispatch(client: &Client, event: &str, payload: Value) {
    let handled = ProcessorRegistry::with_defaults()
        .dispatch(client.state(), event, payload, &CancellationToken::new())
        .await
        .unwrap_or_else(|e| panic!("{event} failed: {e}"));
    assert!(handled, "{event} has no processor");
}

/// Run events through the client's gateway loop until they are all applied.
pub async fn replay(client: &Client, dispatches: Vec<GatewayDispatch>) -> LoopSummary {
    let (tx, rx) = mpsc::channel(dispatches.len().max(1));
    for (sequence, dispatch) in dispatches.into_iter().enumerate() {
        tx.send(dispatch.with_sequence(sequence as u64 + 1)).await.unwrap();
    }
    drop(tx);
    client.gateway_loop().run(rx, CancellationToken::new()).await
}

// ============================================================================
// Payload fixtures
// ============================================================================

pub fn user(user_id: u64, username: &str) -> Value {
    json!({"id": user_id.to_string(), "username": username})
}

pub fn guild(guild_id: u64, name: &str) -> Value {
    json!({"id": guild_id.to_string(), "name": name, "owner_id": "1"})
}

pub fn unavailable_guild(guild_id: u64) -> Value {
    json!({"id": guild_id.to_string(), "unavailable": true})
}

/// Guild 100 with channel 10 and member 5.
pub fn guild_snapshot() -> Value {
    json!({
        "id": "100",
        "name": "Quokka Island",
        "owner_id": "5",
        "channels": [
            {"id": "10", "type": 0, "guild_id": "100", "name": "general"}
        ],
        "roles": [
            {"id": "100", "name": "@everyone", "position": 0, "permissions": "1024"}
        ],
        "members": [
            {"user": {"id": "5", "username": "quokka"}, "roles": []}
        ]
    })
}

pub fn message(message_id: u64, channel_id: u64, guild_id: Option<u64>, content: &str) -> Value {
    json!({
        "id": message_id.to_string(),
        "channel_id": channel_id.to_string(),
        "guild_id": guild_id.map(|g| g.to_string()),
        "author": {"id": "5", "username": "quokka"},
        "content": content,
        "timestamp": "2024-01-01T00:00:00Z"
    })
}
