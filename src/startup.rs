//! Application Startup
//!
//! Wires a [`Client`] from settings and replays recorded gateway traffic
//! through it.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::client::Client;
use crate::application::state::CacheStats;
use crate::config::Settings;
use crate::gateway::{self, LoopSummary};

/// Application instance
pub struct Application {
    client: Client,
}

impl Application {
    /// Build the application from settings
    pub fn build(settings: Settings) -> Result<Self> {
        let client = Client::builder(settings)
            .build()
            .context("Failed to build client")?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Feed every line of `input` through the gateway event loop.
    ///
    /// Unparseable lines are logged and skipped. Stops early when `token`
    /// is cancelled.
    pub async fn replay<R>(&self, input: R, token: CancellationToken) -> Result<LoopSummary>
    where
        R: AsyncBufRead + Unpin,
    {
        let (tx, rx) = mpsc::channel(self.client.settings().gateway.event_buffer);
        let event_loop = self.client.gateway_loop();
        let worker = tokio::spawn(event_loop.run(rx, token.clone()));

        let mut lines = input.lines();
        let mut line_no = 0usize;
        while let Some(line) = lines.next_line().await.context("Failed to read input")? {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            match gateway::parse_line(&line) {
                Ok(Some(dispatch)) => {
                    if tx.send(dispatch).await.is_err() {
                        debug!("Event loop stopped, replay ends");
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(line = line_no, error = %e, "Skipping unreadable line"),
            }
        }
        drop(tx);

        let summary = worker.await.context("Event loop task failed")?;
        Ok(summary)
    }

    pub async fn stats(&self) -> CacheStats {
        self.client.state().stats().await
    }
}

/// Log a stats snapshot, one line per non-empty kind.
pub fn log_stats(stats: &CacheStats) {
    for (kind, count) in stats.entities.iter().filter(|(_, n)| *n > 0) {
        info!(%kind, count, "Cached entities");
    }
    info!(
        total = stats.total(),
        scopes = stats.scopes,
        unavailable_guilds = stats.unavailable_guilds,
        "Cache totals"
    );
}
