//! Downstream Websocket Gateway
//!
//! Accepts downstream client sockets, registers a delivery channel for
//! each in the fan-out registry, and forwards broadcast frames as JSON
//! text messages. Inbound client messages are ignored; this is a one-way
//! delivery surface.
//!
//! Frames have the shape `{"event": "quote", "data": {...}}`, where
//! `event` is the bus channel name the quote was published on.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::fanout::ClientRegistry;

/// Gateway server errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// WebSocket handshake or transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Downstream websocket gateway server.
pub struct GatewayServer {
    port: u16,
    registry: Arc<ClientRegistry>,
    cancel: CancellationToken,
}

impl GatewayServer {
    /// Create a new gateway server.
    #[must_use]
    pub const fn new(port: u16, registry: Arc<ClientRegistry>, cancel: CancellationToken) -> Self {
        Self {
            port,
            registry,
            cancel,
        }
    }

    /// Bind the configured port and serve until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if binding fails.
    pub async fn run(self) -> Result<(), GatewayError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::BindFailed(self.port, e.to_string()))?;

        self.run_with_listener(listener).await
    }

    /// Serve client connections from an already-bound listener.
    ///
    /// # Errors
    ///
    /// Currently never returns an error once the listener is accepted;
    /// per-client failures end only that client's session.
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<(), GatewayError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, "quote gateway listening");
        }

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let registry = Arc::clone(&self.registry);
                            let cancel = self.cancel.clone();
                            tokio::spawn(async move {
                                if let Err(e) = serve_client(stream, peer, registry, cancel).await {
                                    tracing::debug!(%peer, error = %e, "client session ended with error");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to accept client socket");
                        }
                    }
                }
            }
        }

        tracing::info!("quote gateway stopped");
        Ok(())
    }
}

/// Serve one downstream client until it disconnects or shutdown.
async fn serve_client(
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<ClientRegistry>,
    cancel: CancellationToken,
) -> Result<(), GatewayError> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();

    let (id, mut frames) = registry.register();
    tracing::debug!(client = %id, %peer, "downstream client connected");

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                match serde_json::to_string(&frame) {
                    Ok(text) => {
                        if write.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(client = %id, error = %e, "failed to serialize frame");
                    }
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if write.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {
                        // One-way surface: inbound client messages are ignored
                    }
                }
            }
        }
    }

    registry.unregister(id);
    tracing::debug!(client = %id, %peer, "downstream client disconnected");
    Ok(())
}
