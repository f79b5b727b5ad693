// =============================================================================
// tickwise: Main Entry Point
// =============================================================================
//
// Streams BTC candles from Binance and Bitfinex, reports RSI for the former
// and VWAP for the latter. Each feed runs on its own task; Ctrl+C cancels
// and joins all of them.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod error;
mod feed;
mod indicators;
mod market_data;
mod reporting;
mod runtime_config;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::feed::{FeedSupervisor, RsiFeed, VwapFeed};
use crate::reporting::{round2, LogReporter, ResultSink};
use crate::runtime_config::RuntimeConfig;
use crate::types::FeedKind;

const CONFIG_PATH_ENV: &str = "TICKWISE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "tickwise.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("tickwise starting up");

    let config_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_env_overrides()?;
    config.validate()?;

    // ── 2. Spawn one supervisor per enabled feed ─────────────────────────
    let reporter = Arc::new(LogReporter::new());
    let sink: Arc<dyn ResultSink> = reporter.clone();
    let mut supervisors = Vec::new();

    if config.rsi.enabled {
        supervisors.push(FeedSupervisor::spawn(
            RsiFeed::new(config.rsi.period),
            config.rsi.url.clone(),
            config.reconnect.clone(),
            sink.clone(),
        ));
    }
    if config.vwap.enabled {
        supervisors.push(FeedSupervisor::spawn(
            VwapFeed::new(config.vwap.batch_size, config.vwap.subscribe_key.clone()),
            config.vwap.url.clone(),
            config.reconnect.clone(),
            sink.clone(),
        ));
    }

    if supervisors.is_empty() {
        warn!("No feeds enabled, nothing to do");
        return Ok(());
    }
    info!(count = supervisors.len(), "Feeds launched. Press Ctrl+C to stop.");

    // ── 3. Wait for Ctrl+C, or for every feed to stop on its own ────────
    let mut poll = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                warn!("Shutdown signal received, stopping gracefully");
                break;
            }
            _ = poll.tick() => {
                if supervisors.iter().all(FeedSupervisor::is_finished) {
                    warn!("All feeds have stopped");
                    break;
                }
            }
        }
    }

    // ── 4. Cancel and join every feed ────────────────────────────────────
    for supervisor in &supervisors {
        supervisor.cancel();
    }
    for supervisor in supervisors {
        let kind = supervisor.kind();
        let state = supervisor.state();
        if let Err(e) = supervisor.join().await {
            error!(feed = %kind, error = %e, "feed ended with an error");
        }
        let final_state = *state.borrow();
        info!(feed = %kind, state = %final_state, "feed connection closed");
    }

    for kind in [FeedKind::Rsi, FeedKind::Vwap] {
        if let Some(last) = reporter.latest(kind) {
            info!(
                feed = %kind,
                close = last.reference_price,
                value = round2(last.value),
                computed_at = %last.computed_at,
                "last {} value",
                kind.indicator()
            );
        }
    }
    info!(
        results = reporter.emitted(),
        errors = reporter.errors(),
        "tickwise shut down complete."
    );
    Ok(())
}
