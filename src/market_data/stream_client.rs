// =============================================================================
// Stream Client: one exchange WebSocket with subscribe + reconnect
// =============================================================================
//
// Lifecycle:
//   Disconnected → Connecting → Subscribed → Streaming → Closing | Reconnecting
//
// The client knows nothing about candles or indicators. Every text frame is
// handed to the `MessageHandler` supplied at construction, in arrival order.
// Reconnection follows the configured `ReconnectPolicy`: exponential backoff
// after errors, the initial delay after a clean remote close.
// =============================================================================

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::FeedError;
use crate::runtime_config::ReconnectPolicy;
use crate::types::ConnectionState;

/// Callbacks invoked by [`StreamClient`]. Only `on_message` is required.
pub trait MessageHandler: Send {
    /// The connection is up and the subscription (if any) has been sent.
    fn on_open(&mut self) {}

    /// One text frame, in arrival order.
    fn on_message(&mut self, text: &str);

    /// A transport failure. The client decides whether to reconnect.
    fn on_error(&mut self, error: &FeedError) {
        error!(error = %error, "stream error");
    }

    /// The server closed the connection or the stream ended.
    fn on_close(&mut self) {}
}

/// How one connected session ended without a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Cancelled,
    RemoteClosed,
}

pub struct StreamClient<H> {
    url: String,
    subscription: Option<String>,
    policy: ReconnectPolicy,
    handler: H,
    state: watch::Sender<ConnectionState>,
}

impl<H: MessageHandler> StreamClient<H> {
    pub fn new(
        url: impl Into<String>,
        subscription: Option<String>,
        policy: ReconnectPolicy,
        handler: H,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            url: url.into(),
            subscription,
            policy,
            handler,
            state,
        }
    }

    /// Observe connection state transitions.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(url = %self.url, from = %prev, to = %next, "connection state changed");
        }
    }

    /// Drive the connection until `shutdown` flips to `true`.
    ///
    /// Returns `Ok(())` on cancellation, or on a remote close when
    /// reconnection is disabled. With reconnection disabled a transport
    /// error is returned after being passed to the handler.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), FeedError> {
        let mut backoff = self.policy.initial_backoff();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let delay = match self.connect_and_stream(&mut shutdown).await {
                Ok(SessionEnd::Cancelled) => break,
                Ok(SessionEnd::RemoteClosed) => {
                    if !self.policy.enabled {
                        break;
                    }
                    backoff = self.policy.initial_backoff();
                    backoff
                }
                Err(e) => {
                    // A session that reached streaming earns a fresh backoff.
                    if *self.state.borrow() == ConnectionState::Streaming {
                        backoff = self.policy.initial_backoff();
                    }
                    self.handler.on_error(&e);
                    if !self.policy.enabled {
                        self.set_state(ConnectionState::Disconnected);
                        return Err(e);
                    }
                    let delay = backoff;
                    backoff = self.policy.next_backoff(backoff);
                    delay
                }
            };

            self.set_state(ConnectionState::Reconnecting);
            warn!(
                url = %self.url,
                delay_ms = delay.as_millis() as u64,
                "WebSocket reconnecting after delay"
            );
            if sleep_or_cancel(delay, &mut shutdown).await {
                break;
            }
        }

        self.set_state(ConnectionState::Disconnected);
        info!(url = %self.url, "WebSocket client stopped");
        Ok(())
    }

    async fn connect_and_stream(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<SessionEnd, FeedError> {
        self.set_state(ConnectionState::Connecting);
        info!(url = %self.url, "connecting to WebSocket");

        let (ws_stream, _response) = tokio::select! {
            res = connect_async(self.url.as_str()) => res.map_err(|source| FeedError::Connection {
                url: self.url.clone(),
                source,
            })?,
            _ = cancelled(shutdown) => return Ok(SessionEnd::Cancelled),
        };

        let (mut write, mut read) = ws_stream.split();

        if let Some(subscription) = &self.subscription {
            write
                .send(Message::Text(subscription.clone()))
                .await
                .map_err(FeedError::Subscribe)?;
            debug!(url = %self.url, payload = %subscription, "subscription sent");
        }
        self.set_state(ConnectionState::Subscribed);
        info!(url = %self.url, "WebSocket connected");
        self.handler.on_open();
        self.set_state(ConnectionState::Streaming);

        loop {
            tokio::select! {
                _ = cancelled(shutdown) => {
                    self.set_state(ConnectionState::Closing);
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!(url = %self.url, error = %e, "close frame not delivered");
                    }
                    return Ok(SessionEnd::Cancelled);
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.handler.on_message(&text),
                    Some(Ok(Message::Close(frame))) => {
                        info!(url = %self.url, frame = ?frame, "server closed the WebSocket");
                        self.set_state(ConnectionState::Closing);
                        self.handler.on_close();
                        return Ok(SessionEnd::RemoteClosed);
                    }
                    // Ping / Pong / Binary frames carry nothing for us;
                    // tungstenite answers pings on its own.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(FeedError::Stream(e)),
                    None => {
                        warn!(url = %self.url, "WebSocket stream ended");
                        self.set_state(ConnectionState::Closing);
                        self.handler.on_close();
                        return Ok(SessionEnd::RemoteClosed);
                    }
                },
            }
        }
    }
}

/// Resolves once `shutdown` reads `true` or its sender is gone.
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Sleep for `delay`; returns `true` if cancelled first.
async fn sleep_or_cancel(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = cancelled(shutdown) => true,
    }
}
