// =============================================================================
// Feed Supervisor: one task per feed with cancellation and join
// =============================================================================

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::FeedError;
use crate::feed::pipeline::{FeedPipeline, IndicatorFeed};
use crate::market_data::stream_client::StreamClient;
use crate::reporting::ResultSink;
use crate::runtime_config::ReconnectPolicy;
use crate::types::{ConnectionState, FeedKind};

/// Owns the task running one feed's stream client and pipeline.
///
/// Nothing is shared between supervisors except the result sink.
pub struct FeedSupervisor {
    kind: FeedKind,
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<ConnectionState>,
    handle: JoinHandle<Result<(), FeedError>>,
}

impl FeedSupervisor {
    /// Spawn `feed` against `url` on the current tokio runtime.
    pub fn spawn<F: IndicatorFeed>(
        feed: F,
        url: impl Into<String>,
        policy: ReconnectPolicy,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        let kind = feed.kind();
        let url = url.into();
        let subscription = feed.subscription();

        info!(feed = %kind, url = %url, reconnect = policy.enabled, "starting feed");

        let pipeline = FeedPipeline::new(feed, sink);
        let mut client = StreamClient::new(url, subscription, policy, pipeline);
        let state = client.state();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { client.run(shutdown_rx).await });

        Self {
            kind,
            shutdown,
            state,
            handle,
        }
    }

    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Ask the feed to close its connection and stop. Idempotent.
    pub fn cancel(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the feed task to end.
    pub async fn join(self) -> Result<()> {
        let kind = self.kind;
        let outcome = self
            .handle
            .await
            .with_context(|| format!("{kind} feed task panicked"))?;
        outcome.with_context(|| format!("{kind} feed stopped with an error"))?;
        info!(feed = %kind, "feed stopped");
        Ok(())
    }
}
