//! # Discord State Replay
//!
//! Replays a JSONL file of recorded gateway frames through the cache and
//! reports what ended up cached.
//!
//! ```text
//! discord-state-replay [FILE]    # reads stdin when FILE is absent or "-"
//! ```

use anyhow::{Context, Result};
use tokio::io::{self, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use discord_state::config::Settings;
use discord_state::startup::{self, Application};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for structured logging
    discord_state::telemetry::init_tracing();

    info!("Starting replay...");

    // Load configuration from environment and config files
    let mut settings = Settings::read()?;
    if settings.rest.enabled && settings.rest.token.trim().is_empty() {
        info!("No bot token configured, cache misses will not reach REST");
        settings.rest.enabled = false;
    }
    settings.validate()?;
    info!(
        environment = %settings.environment,
        lanes = settings.gateway.dispatch_lanes,
        rest = settings.rest.enabled,
        "Configuration loaded"
    );

    let application = Application::build(settings)?;

    let token = CancellationToken::new();
    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping replay");
            ctrl_c.cancel();
        }
    });

    let summary = match std::env::args().nth(1).filter(|path| path != "-") {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open {path}"))?;
            application.replay(BufReader::new(file), token).await?
        }
        None => application.replay(BufReader::new(io::stdin()), token).await?,
    };

    info!(
        received = summary.received,
        processed = summary.processed,
        ignored = summary.ignored,
        failed = summary.failed,
        last_sequence = ?summary.last_sequence,
        "Replay finished"
    );
    startup::log_stats(&application.stats().await);

    Ok(())
}
