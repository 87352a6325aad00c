//! CryptoCompare Stream Client
//!
//! Owns the single persistent websocket session to the CryptoCompare
//! streamer and drives it through its lifecycle: connect, await the
//! session welcome, subscribe, dispatch frames by kind, reconnect on
//! transport failure.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected -> Connecting -> AwaitingWelcome -> Streaming
//!                     ^                               |
//!                     +--------- Reconnecting <-------+
//! ```
//!
//! `Closed` is terminal and reached only on explicit shutdown. Transport
//! drops are treated as transient: the retry back to `Connecting` is
//! unconditional, with a fixed delay and no attempt cap.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::domain::quote::{FALLBACK_NOTE, QuoteEvent};
use crate::domain::subscription::{PairKey, SubscriptionSet};
use crate::infrastructure::bus::{HeartbeatEvent, SharedEventBus, channel};
use crate::infrastructure::config::Credentials;
use crate::infrastructure::cryptocompare::codec::{StreamCodec, parse_pair_token};
use crate::infrastructure::cryptocompare::messages::StreamMessage;
use crate::infrastructure::cryptocompare::rest::RestClient;
use crate::infrastructure::metrics::{self, FallbackOutcome};

// =============================================================================
// Error Type
// =============================================================================

/// Errors that can occur in the stream client. All of them are treated as
/// transient transport failures by the reconnect loop; none terminate the
/// process.
#[derive(Debug, thiserror::Error)]
pub enum StreamClientError {
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Subscribe request could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] super::codec::CodecError),

    /// Connection closed by the upstream.
    #[error("connection closed")]
    ConnectionClosed,
}

// =============================================================================
// Connection State
// =============================================================================

/// Lifecycle state of the upstream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session, not attempting one.
    Disconnected,
    /// Opening the websocket.
    Connecting,
    /// Socket open, waiting for the session welcome.
    AwaitingWelcome,
    /// Welcomed and subscribed; dispatching frames.
    Streaming,
    /// Transport dropped; a retry is pending.
    Reconnecting,
    /// Shut down explicitly. Terminal.
    Closed,
}

impl ConnectionState {
    /// Lowercase label for logs and the health endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingWelcome => "awaiting-welcome",
            Self::Streaming => "streaming",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        }
    }
}

// =============================================================================
// Stream Client Configuration
// =============================================================================

/// Configuration for the stream client.
#[derive(Debug, Clone)]
pub struct StreamClientConfig {
    /// Streamer websocket URL, without the API key parameter.
    pub url: String,
    /// API credentials, appended to the connection URL.
    pub credentials: Credentials,
    /// Pairs to subscribe to after each welcome.
    pub subscriptions: SubscriptionSet,
    /// Fixed delay before each reconnection attempt.
    pub reconnect_delay: Duration,
}

// =============================================================================
// Stream Client
// =============================================================================

/// CryptoCompare websocket client.
///
/// Owns exactly one upstream session; construct one instance per process
/// (or per test) rather than sharing ambient global state.
pub struct StreamClient {
    config: StreamClientConfig,
    codec: StreamCodec,
    bus: SharedEventBus,
    rest: Arc<RestClient>,
    cancel: CancellationToken,
    state: parking_lot::RwLock<ConnectionState>,
    session_id: parking_lot::RwLock<Option<String>>,
    subscriptions: parking_lot::RwLock<SubscriptionSet>,
    messages_received: AtomicU64,
    reconnects: AtomicU32,
}

impl StreamClient {
    /// Create a new stream client.
    #[must_use]
    pub fn new(
        config: StreamClientConfig,
        bus: SharedEventBus,
        rest: Arc<RestClient>,
        cancel: CancellationToken,
    ) -> Self {
        let subscriptions = config.subscriptions.clone();
        Self {
            config,
            codec: StreamCodec::new(),
            bus,
            rest,
            cancel,
            state: parking_lot::RwLock::new(ConnectionState::Disconnected),
            session_id: parking_lot::RwLock::new(None),
            subscriptions: parking_lot::RwLock::new(subscriptions),
            messages_received: AtomicU64::new(0),
            reconnects: AtomicU32::new(0),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// The session identifier assigned by the upstream, if welcomed.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    /// The active subscription set.
    #[must_use]
    pub fn subscriptions(&self) -> SubscriptionSet {
        self.subscriptions.read().clone()
    }

    /// Total frames received from the upstream.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    /// Total reconnection attempts since startup.
    #[must_use]
    pub fn reconnect_count(&self) -> u32 {
        self.reconnects.load(Ordering::Relaxed)
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    /// Run the connection loop until cancelled.
    ///
    /// Transport drops never end the loop: every failure transitions to
    /// `Reconnecting` and retries after the configured delay.
    ///
    /// # Errors
    ///
    /// Currently never returns an error; the signature leaves room for
    /// unrecoverable setup failures and mirrors the task-spawn call sites.
    pub async fn run(self: Arc<Self>) -> Result<(), StreamClientError> {
        loop {
            if self.cancel.is_cancelled() {
                self.set_state(ConnectionState::Closed);
                tracing::info!("stream client cancelled");
                return Ok(());
            }

            self.set_state(ConnectionState::Connecting);

            match self.connect_and_stream().await {
                Ok(()) => {
                    self.set_state(ConnectionState::Closed);
                    tracing::info!("upstream connection closed gracefully");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "upstream connection error");
                    self.set_state(ConnectionState::Reconnecting);
                    self.reconnects.fetch_add(1, Ordering::Relaxed);
                    metrics::record_reconnect();

                    tokio::select! {
                        () = self.cancel.cancelled() => {
                            self.set_state(ConnectionState::Closed);
                            tracing::info!("stream client cancelled during reconnect delay");
                            return Ok(());
                        }
                        () = tokio::time::sleep(self.config.reconnect_delay) => {}
                    }
                }
            }
        }
    }

    /// Connect and process frames until cancellation or a transport error.
    async fn connect_and_stream(&self) -> Result<(), StreamClientError> {
        tracing::info!(url = %self.config.url, "connecting to quote stream");

        let url = format!(
            "{}?api_key={}",
            self.config.url,
            self.config.credentials.api_key()
        );
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;

        self.set_state(ConnectionState::AwaitingWelcome);

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_frame(&text, &mut write).await?;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("upstream sent close frame");
                            return Err(StreamClientError::ConnectionClosed);
                        }
                        Some(Ok(_)) => {
                            // Ignore other transport message types
                        }
                        Some(Err(e)) => {
                            return Err(e.into());
                        }
                        None => {
                            tracing::info!("websocket stream ended");
                            return Err(StreamClientError::ConnectionClosed);
                        }
                    }
                }
            }
        }
    }

    /// Decode one frame and dispatch it by kind.
    ///
    /// Decode failures drop the frame and keep the connection; they are
    /// never escalated to the reconnect loop.
    async fn handle_frame<W>(&self, text: &str, write: &mut W) -> Result<(), StreamClientError>
    where
        W: SinkExt<Message> + Unpin,
        W::Error: std::fmt::Display,
    {
        self.messages_received.fetch_add(1, Ordering::Relaxed);

        let message = match self.codec.decode(text) {
            Ok(message) => message,
            Err(e) => {
                metrics::record_decode_failure();
                tracing::warn!(error = %e, "dropping undecodable frame");
                return Ok(());
            }
        };

        metrics::record_message_received(message.kind_label());

        match message {
            StreamMessage::Welcome(welcome) => {
                if self.state() == ConnectionState::AwaitingWelcome {
                    tracing::debug!(socket_id = %welcome.socket_id, "stream welcome");
                    *self.session_id.write() = Some(welcome.socket_id);
                    self.set_state(ConnectionState::Streaming);
                    self.send_subscribe(write).await?;
                } else {
                    tracing::debug!("ignoring welcome outside handshake");
                }
            }
            StreamMessage::Heartbeat => {
                let session_id = self.session_id.read().clone();
                tracing::trace!(session_id = ?session_id, "upstream heartbeat");
                let _ = self.bus.publish_heartbeat(HeartbeatEvent { session_id });
            }
            StreamMessage::AggregateQuote(quote) => {
                // Partial updates carry no MEDIAN and publish nothing.
                if let Some(median) = quote.median {
                    let event =
                        QuoteEvent::new(quote.from_symbol, quote.to_symbol, median).rounded();
                    let _ = self.bus.publish_quote(event);
                    metrics::record_quote_published(channel::QUOTE);
                }
            }
            StreamMessage::InvalidSubscription(rejection) => {
                tracing::error!(
                    parameter = %rejection.parameter,
                    info = %rejection.info,
                    "subscription rejected by upstream"
                );

                match parse_pair_token(&rejection.parameter) {
                    Some(pair) => self.spawn_fallback(pair),
                    None => {
                        tracing::warn!(
                            parameter = %rejection.parameter,
                            "rejection token is unparseable, no fallback possible"
                        );
                    }
                }
            }
            StreamMessage::Unknown { kind } => {
                tracing::trace!(kind, "ignoring unrecognized message kind");
            }
        }

        Ok(())
    }

    /// Send the subscribe request for the active subscription set.
    async fn send_subscribe<W>(&self, write: &mut W) -> Result<(), StreamClientError>
    where
        W: SinkExt<Message> + Unpin,
        W::Error: std::fmt::Display,
    {
        let request = {
            let subscriptions = self.subscriptions.read();
            tracing::debug!(pairs = subscriptions.pair_count(), "sending subscribe request");
            self.codec.encode_subscribe(&subscriptions)?
        };

        write.send(Message::Text(request.into())).await.map_err(|e| {
            StreamClientError::ConnectionFailed(format!("failed to send subscribe: {e}"))
        })?;

        Ok(())
    }

    /// Launch the REST fallback for a rejected pair as an independent
    /// task, off the critical path of the dispatch loop. A failed lookup
    /// is logged and dropped; it is never retried and never escalated.
    fn spawn_fallback(&self, pair: PairKey) {
        let rest = Arc::clone(&self.rest);
        let bus = Arc::clone(&self.bus);

        tokio::spawn(async move {
            match rest.price_pair(&pair.symbol, &pair.currency).await {
                Ok(quote) => {
                    let quote = quote.with_note(FALLBACK_NOTE).rounded();
                    tracing::debug!(
                        symbol = %quote.symbol,
                        currency = %quote.currency,
                        price = quote.price,
                        "fallback quote resolved"
                    );
                    metrics::record_fallback_lookup(FallbackOutcome::Success);
                    metrics::record_quote_published(channel::QUOTE_UPDATE);
                    let _ = bus.publish_quote_update(quote);
                }
                Err(e) => {
                    metrics::record_fallback_lookup(FallbackOutcome::Failure);
                    tracing::warn!(
                        symbol = %pair.symbol,
                        currency = %pair.currency,
                        error = %e,
                        "fallback lookup failed"
                    );
                }
            }
        });
    }
}

// =============================================================================
// Tests
// =============================================================================
