//! The gateway read loop.
//!
//! Dispatches arrive in one ordered stream. Events for a guild are sharded
//! onto a fixed set of ordered lanes by guild id, so one guild's events
//! apply in order while different guilds proceed concurrently. Events with
//! no routing key touch cross-guild state; they wait for every lane to
//! drain and then run on the read task itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::messages::GatewayDispatch;
use crate::application::dispatch::ProcessorRegistry;
use crate::application::state::StateController;
use crate::config::GatewaySettings;
use crate::shared::error::DispatchError;

enum LaneMessage {
    Event(GatewayDispatch),
    Flush(oneshot::Sender<()>),
}

#[derive(Default)]
struct Counters {
    processed: AtomicU64,
    ignored: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

/// What a finished loop did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub received: u64,
    pub processed: u64,
    /// Events with no registered processor
    pub ignored: u64,
    /// Malformed payloads and cache faults
    pub failed: u64,
    pub cancelled: u64,
    pub last_sequence: Option<u64>,
}

/// Applies a stream of dispatches to the cache.
pub struct GatewayEventLoop {
    state: Arc<StateController>,
    processors: Arc<ProcessorRegistry>,
    lanes: usize,
    lane_capacity: usize,
}

impl GatewayEventLoop {
    pub fn new(
        state: Arc<StateController>,
        processors: Arc<ProcessorRegistry>,
        settings: &GatewaySettings,
    ) -> Self {
        Self {
            state,
            processors,
            lanes: settings.dispatch_lanes.max(1),
            lane_capacity: settings.lane_capacity.max(1),
        }
    }

    /// Drain `events` until the sender closes or `token` is cancelled.
    ///
    /// Events already handed to a lane are still applied before this
    /// returns; they see the same token and may stop early.
    pub async fn run(
        self,
        mut events: mpsc::Receiver<GatewayDispatch>,
        token: CancellationToken,
    ) -> LoopSummary {
        let counters = Arc::new(Counters::default());
        let (lanes, workers): (Vec<_>, Vec<_>) = (0..self.lanes)
            .map(|index| self.spawn_lane(index, Arc::clone(&counters), token.clone()))
            .unzip();

        info!(lanes = self.lanes, "Gateway event loop started");
        let mut summary = LoopSummary::default();

        loop {
            let dispatch = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("Gateway event loop cancelled");
                    break;
                }
                next = events.recv() => match next {
                    Some(dispatch) => dispatch,
                    None => break,
                },
            };

            summary.received += 1;
            if dispatch.sequence.is_some() {
                summary.last_sequence = dispatch.sequence;
            }

            match dispatch.routing_key() {
                Some(key) => {
                    let lane = (key.get() % self.lanes as u64) as usize;
                    if lanes[lane].send(LaneMessage::Event(dispatch)).await.is_err() {
                        warn!(lane, "Dispatch lane closed, event dropped");
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
                None => {
                    flush(&lanes).await;
                    apply(&self.state, &self.processors, dispatch, &token, &counters).await;
                }
            }
        }

        drop(lanes);
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "Dispatch lane task failed");
            }
        }

        summary.processed = counters.processed.load(Ordering::Relaxed);
        summary.ignored = counters.ignored.load(Ordering::Relaxed);
        summary.failed = counters.failed.load(Ordering::Relaxed);
        summary.cancelled = counters.cancelled.load(Ordering::Relaxed);
        info!(?summary, "Gateway event loop stopped");
        summary
    }

    fn spawn_lane(
        &self,
        index: usize,
        counters: Arc<Counters>,
        token: CancellationToken,
    ) -> (mpsc::Sender<LaneMessage>, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel(self.lane_capacity);
        let state = Arc::clone(&self.state);
        let processors = Arc::clone(&self.processors);

        let worker = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    LaneMessage::Event(dispatch) => {
                        apply(&state, &processors, dispatch, &token, &counters).await;
                    }
                    LaneMessage::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!(lane = index, "Dispatch lane drained");
        });

        (tx, worker)
    }
}

/// Wait until every lane has applied what it was sent so far.
async fn flush(lanes: &[mpsc::Sender<LaneMessage>]) {
    let mut pending = Vec::with_capacity(lanes.len());
    for lane in lanes {
        let (tx, rx) = oneshot::channel();
        if lane.send(LaneMessage::Flush(tx)).await.is_ok() {
            pending.push(rx);
        }
    }
    for rx in pending {
        let _ = rx.await;
    }
}

async fn apply(
    state: &Arc<StateController>,
    processors: &ProcessorRegistry,
    dispatch: GatewayDispatch,
    token: &CancellationToken,
    counters: &Counters,
) {
    let GatewayDispatch {
        event_name,
        payload,
        sequence,
    } = dispatch;

    match processors.dispatch(state, &event_name, payload, token).await {
        Ok(true) => {
            counters.processed.fetch_add(1, Ordering::Relaxed);
        }
        Ok(false) => {
            counters.ignored.fetch_add(1, Ordering::Relaxed);
        }
        Err(DispatchError::Cancelled) => {
            debug!(event = %event_name, ?sequence, "Dispatch cancelled");
            counters.cancelled.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            warn!(event = %event_name, ?sequence, error = %e, "Dispatch failed, event dropped");
            counters.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatch::testing;
    use crate::domain::value_objects::{Scope, Snowflake};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn event_loop(state: &Arc<StateController>) -> GatewayEventLoop {
        let settings = GatewaySettings {
            dispatch_lanes: 4,
            lane_capacity: 8,
            ..GatewaySettings::default()
        };
        GatewayEventLoop::new(
            Arc::clone(state),
            Arc::new(ProcessorRegistry::with_defaults()),
            &settings,
        )
    }

    async fn run_all(state: &Arc<StateController>, dispatches: Vec<GatewayDispatch>) -> LoopSummary {
        let (tx, rx) = mpsc::channel(dispatches.len().max(1));
        for dispatch in dispatches {
            tx.send(dispatch).await.unwrap();
        }
        drop(tx);
        event_loop(state).run(rx, CancellationToken::new()).await
    }

    fn guild(id: u64, name: &str) -> serde_json::Value {
        json!({"id": id.to_string(), "name": name, "owner_id": "1"})
    }

    #[tokio::test]
    async fn test_bad_event_does_not_stop_loop() {
        let (state, _hub) = testing::state();
        let summary = run_all(
            &state,
            vec![
                GatewayDispatch::new("GUILD_CREATE", json!({"id": "100"})).with_sequence(1),
                GatewayDispatch::new("TYPING_START", json!({"channel_id": "10"})).with_sequence(2),
                GatewayDispatch::new("GUILD_CREATE", guild(200, "ok")).with_sequence(3),
            ],
        )
        .await;

        assert_eq!(summary.received, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.ignored, 1);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.last_sequence, Some(3));
        assert!(state.guilds().get(Scope::Global, Snowflake::new(200)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_per_guild_order_with_interleaving() {
        let (state, _hub) = testing::state();
        let mut dispatches = Vec::new();
        for id in [100u64, 101, 102] {
            dispatches.push(GatewayDispatch::new("GUILD_CREATE", guild(id, "a")));
        }
        for id in [100u64, 101, 102] {
            dispatches.push(GatewayDispatch::new("GUILD_UPDATE", guild(id, "b")));
        }
        dispatches.push(GatewayDispatch::new("GUILD_DELETE", json!({"id": "101"})));

        run_all(&state, dispatches).await;

        for id in [100u64, 102] {
            let guild = state.guilds().get_by_id(Snowflake::new(id)).await.unwrap().unwrap();
            assert_eq!(guild.name().as_deref(), Some("b"));
        }
        assert!(state.guilds().get(Scope::Global, Snowflake::new(101)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_barrier_runs_after_queued_guild_events() {
        let (state, _hub) = testing::state();
        run_all(
            &state,
            vec![
                GatewayDispatch::new("GUILD_CREATE", guild(100, "g")),
                GatewayDispatch::new("USER_UPDATE", json!({"id": "5", "username": "quokka"})),
            ],
        )
        .await;

        assert!(state.users().get(Scope::Global, Snowflake::new(5)).await.unwrap().is_some());
        assert!(state.guilds().get(Scope::Global, Snowflake::new(100)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cancellation_stops_loop() {
        let (state, _hub) = testing::state();
        let (_tx, rx) = mpsc::channel::<GatewayDispatch>(1);
        let token = CancellationToken::new();
        token.cancel();

        let summary = event_loop(&state).run(rx, token).await;
        assert_eq!(summary.received, 0);
    }
}
