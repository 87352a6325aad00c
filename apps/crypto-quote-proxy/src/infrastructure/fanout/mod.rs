//! Downstream Fan-out Registry
//!
//! Tracks connected delivery channels and broadcasts every published
//! quote event to all of them verbatim. There is no per-subscriber
//! filtering: every connected client receives every quote event
//! regardless of which symbols it cares about.
//!
//! Delivery is best-effort from the publisher's perspective. A full or
//! closed channel never raises an error back to the bus loop and never
//! prevents delivery to the remaining channels.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::quote::QuoteEvent;
use crate::infrastructure::bus::{SharedEventBus, channel};
use crate::infrastructure::metrics;

// =============================================================================
// Types
// =============================================================================

/// Identifier assigned to a downstream client at connection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A quote event framed for downstream delivery, tagged with the bus
/// channel it was published on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundFrame {
    /// The bus channel name, `quote` or `quote-update`.
    pub event: String,

    /// The quote payload, forwarded verbatim.
    pub data: QuoteEvent,
}

impl OutboundFrame {
    /// Frame a live-stream quote.
    #[must_use]
    pub fn quote(data: QuoteEvent) -> Self {
        Self {
            event: channel::QUOTE.to_string(),
            data,
        }
    }

    /// Frame a fallback-corrected quote.
    #[must_use]
    pub fn quote_update(data: QuoteEvent) -> Self {
        Self {
            event: channel::QUOTE_UPDATE.to_string(),
            data,
        }
    }
}

/// Handle to one downstream recipient. Owned by the registry map, not by
/// the delivery task itself.
#[derive(Debug)]
struct DeliveryChannel {
    sender: mpsc::Sender<OutboundFrame>,
}

// =============================================================================
// Client Registry
// =============================================================================

/// Registry of connected downstream delivery channels.
#[derive(Debug)]
pub struct ClientRegistry {
    channels: parking_lot::RwLock<HashMap<ClientId, DeliveryChannel>>,
    active_connections: AtomicUsize,
    client_buffer: usize,
    bus: SharedEventBus,
}

impl ClientRegistry {
    /// Create a registry publishing lifecycle events on the given bus.
    /// `client_buffer` is the per-client delivery queue depth.
    #[must_use]
    pub fn new(bus: SharedEventBus, client_buffer: usize) -> Self {
        Self {
            channels: parking_lot::RwLock::new(HashMap::new()),
            active_connections: AtomicUsize::new(0),
            client_buffer: client_buffer.max(1),
            bus,
        }
    }

    /// Register a new delivery channel.
    ///
    /// Publishes `client-connected` with the assigned identifier and
    /// returns the receiving end for the caller's delivery task.
    pub fn register(&self) -> (ClientId, mpsc::Receiver<OutboundFrame>) {
        let id = ClientId::generate();
        let (tx, rx) = mpsc::channel(self.client_buffer);

        self.channels
            .write()
            .insert(id, DeliveryChannel { sender: tx });
        let total = self.active_connections.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::set_connected_clients(total);

        let _ = self.bus.publish_client_connected(id);
        tracing::debug!(client = %id, total, "delivery channel registered");

        (id, rx)
    }

    /// Remove a delivery channel.
    ///
    /// Publishes `client-disconnected` when the channel was still present;
    /// repeated calls for the same identifier are no-ops.
    pub fn unregister(&self, id: ClientId) -> bool {
        let removed = self.channels.write().remove(&id).is_some();
        if removed {
            let total = self.active_connections.fetch_sub(1, Ordering::Relaxed) - 1;
            metrics::set_connected_clients(total);

            let _ = self.bus.publish_client_disconnected(id);
            tracing::debug!(client = %id, total, "delivery channel removed");
        }
        removed
    }

    /// Number of currently connected delivery channels.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Broadcast a frame to every delivery channel, best-effort.
    ///
    /// Returns the number of channels the frame was queued for. Channels
    /// with a full queue drop this frame; channels whose receiver is gone
    /// are pruned from the registry.
    pub fn broadcast(&self, frame: &OutboundFrame) -> usize {
        let mut delivered = 0;
        let mut stale = Vec::new();

        {
            let channels = self.channels.read();
            for (id, delivery_channel) in channels.iter() {
                match delivery_channel.sender.try_send(frame.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        metrics::record_frame_dropped();
                        tracing::debug!(client = %id, "delivery queue full, dropping frame");
                    }
                    Err(TrySendError::Closed(_)) => stale.push(*id),
                }
            }
        }

        for id in stale {
            self.unregister(id);
        }

        delivered
    }

    /// Forward every `quote` and `quote-update` bus event to all delivery
    /// channels until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut quotes = self.bus.subscribe_quotes();
        let mut updates = self.bus.subscribe_quote_updates();

        tracing::info!("fan-out loop started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                quote = quotes.recv() => match quote {
                    Ok(quote) => {
                        let delivered = self.broadcast(&OutboundFrame::quote(quote));
                        tracing::trace!(delivered, "quote fanned out");
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "quote fan-out lagging");
                    }
                    Err(RecvError::Closed) => break,
                },
                update = updates.recv() => match update {
                    Ok(update) => {
                        let delivered = self.broadcast(&OutboundFrame::quote_update(update));
                        tracing::trace!(delivered, "quote update fanned out");
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "quote-update fan-out lagging");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        tracing::info!("fan-out loop stopped");
    }
}

// =============================================================================
// Tests
// =============================================================================
