//! Event Bus
//!
//! In-process publish/subscribe built on tokio broadcast channels,
//! decoupling the upstream connection manager from every consumer of its
//! output (the fan-out registry and the HTTP query layer).
//!
//! # Channels
//!
//! One broadcast sender per named channel:
//!
//! - [`channel::QUOTE`]: live-stream quote events
//! - [`channel::QUOTE_UPDATE`]: fallback-corrected quote events
//! - [`channel::HEARTBEAT`]: upstream session liveness signals
//! - [`channel::CLIENT_CONNECTED`] / [`channel::CLIENT_DISCONNECTED`]:
//!   downstream delivery lifecycle
//!
//! Publishing never blocks on slow subscribers; a lagging receiver
//! observes `Lagged` on its own recv path instead of stalling the
//! publisher. There is no buffering for late subscribers: a receiver
//! registered after a publish never sees it.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::domain::quote::QuoteEvent;
use crate::infrastructure::config::BusSettings;
use crate::infrastructure::fanout::ClientId;

/// Named channel identifiers, as exposed to downstream consumers.
pub mod channel {
    /// Live-stream quote events.
    pub const QUOTE: &str = "quote";
    /// Fallback-corrected quote events.
    pub const QUOTE_UPDATE: &str = "quote-update";
    /// Upstream session liveness signals.
    pub const HEARTBEAT: &str = "cc.connection.heartbeat";
    /// A downstream delivery channel registered.
    pub const CLIENT_CONNECTED: &str = "client-connected";
    /// A downstream delivery channel was removed.
    pub const CLIENT_DISCONNECTED: &str = "client-disconnected";
}

// =============================================================================
// Bus Messages
// =============================================================================

/// Upstream liveness signal, one per heartbeat frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatEvent {
    /// The last known upstream session identifier, if a welcome was seen.
    pub session_id: Option<String>,
}

// =============================================================================
// Bus Configuration
// =============================================================================

/// Capacities for each bus channel.
#[derive(Debug, Clone, Copy)]
pub struct BusConfig {
    /// Capacity for the quote channel.
    pub quotes_capacity: usize,
    /// Capacity for the quote-update channel.
    pub quote_updates_capacity: usize,
    /// Capacity for the heartbeat channel.
    pub heartbeats_capacity: usize,
    /// Capacity for the client lifecycle channels.
    pub lifecycle_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            quotes_capacity: 1_024,
            quote_updates_capacity: 256,
            heartbeats_capacity: 64,
            lifecycle_capacity: 64,
        }
    }
}

impl From<BusSettings> for BusConfig {
    fn from(settings: BusSettings) -> Self {
        Self {
            quotes_capacity: settings.quotes_capacity,
            quote_updates_capacity: settings.quote_updates_capacity,
            heartbeats_capacity: settings.heartbeats_capacity,
            lifecycle_capacity: settings.lifecycle_capacity,
        }
    }
}

// =============================================================================
// Event Bus
// =============================================================================

/// Process-wide multi-producer multi-consumer publish/subscribe hub.
///
/// # Example
///
/// ```rust
/// use crypto_quote_proxy::infrastructure::bus::{BusConfig, EventBus};
/// use crypto_quote_proxy::domain::quote::QuoteEvent;
///
/// let bus = EventBus::new(BusConfig::default());
/// let _rx = bus.subscribe_quotes();
///
/// let _ = bus.publish_quote(QuoteEvent::new("BTC", "USD", 10000.0));
/// ```
#[derive(Debug)]
pub struct EventBus {
    quotes_tx: broadcast::Sender<QuoteEvent>,
    quote_updates_tx: broadcast::Sender<QuoteEvent>,
    heartbeats_tx: broadcast::Sender<HeartbeatEvent>,
    client_connected_tx: broadcast::Sender<ClientId>,
    client_disconnected_tx: broadcast::Sender<ClientId>,
}

impl EventBus {
    /// Create a new bus with the given channel capacities.
    #[must_use]
    pub fn new(config: BusConfig) -> Self {
        Self {
            quotes_tx: broadcast::channel(config.quotes_capacity).0,
            quote_updates_tx: broadcast::channel(config.quote_updates_capacity).0,
            heartbeats_tx: broadcast::channel(config.heartbeats_capacity).0,
            client_connected_tx: broadcast::channel(config.lifecycle_capacity).0,
            client_disconnected_tx: broadcast::channel(config.lifecycle_capacity).0,
        }
    }

    /// Create a new bus with default capacities.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(BusConfig::default())
    }

    // =========================================================================
    // Quote Channel
    // =========================================================================

    /// Publish a live quote to all subscribers.
    ///
    /// Returns the number of receivers that got the event, or `None` if
    /// there are no active receivers.
    pub fn publish_quote(&self, quote: QuoteEvent) -> Option<usize> {
        self.quotes_tx.send(quote).ok()
    }

    /// Get a new receiver for live quotes.
    #[must_use]
    pub fn subscribe_quotes(&self) -> broadcast::Receiver<QuoteEvent> {
        self.quotes_tx.subscribe()
    }

    /// Number of active quote receivers.
    #[must_use]
    pub fn quotes_receiver_count(&self) -> usize {
        self.quotes_tx.receiver_count()
    }

    // =========================================================================
    // Quote Update Channel
    // =========================================================================

    /// Publish a fallback-corrected quote to all subscribers.
    pub fn publish_quote_update(&self, quote: QuoteEvent) -> Option<usize> {
        self.quote_updates_tx.send(quote).ok()
    }

    /// Get a new receiver for fallback-corrected quotes.
    #[must_use]
    pub fn subscribe_quote_updates(&self) -> broadcast::Receiver<QuoteEvent> {
        self.quote_updates_tx.subscribe()
    }

    /// Number of active quote-update receivers.
    #[must_use]
    pub fn quote_updates_receiver_count(&self) -> usize {
        self.quote_updates_tx.receiver_count()
    }

    // =========================================================================
    // Heartbeat Channel
    // =========================================================================

    /// Publish an upstream liveness signal.
    pub fn publish_heartbeat(&self, heartbeat: HeartbeatEvent) -> Option<usize> {
        self.heartbeats_tx.send(heartbeat).ok()
    }

    /// Get a new receiver for liveness signals.
    #[must_use]
    pub fn subscribe_heartbeats(&self) -> broadcast::Receiver<HeartbeatEvent> {
        self.heartbeats_tx.subscribe()
    }

    /// Number of active heartbeat receivers.
    #[must_use]
    pub fn heartbeats_receiver_count(&self) -> usize {
        self.heartbeats_tx.receiver_count()
    }

    // =========================================================================
    // Client Lifecycle Channels
    // =========================================================================

    /// Publish a downstream client connection event.
    pub fn publish_client_connected(&self, client: ClientId) -> Option<usize> {
        self.client_connected_tx.send(client).ok()
    }

    /// Get a new receiver for client connection events.
    #[must_use]
    pub fn subscribe_client_connected(&self) -> broadcast::Receiver<ClientId> {
        self.client_connected_tx.subscribe()
    }

    /// Publish a downstream client disconnection event.
    pub fn publish_client_disconnected(&self, client: ClientId) -> Option<usize> {
        self.client_disconnected_tx.send(client).ok()
    }

    /// Get a new receiver for client disconnection events.
    #[must_use]
    pub fn subscribe_client_disconnected(&self) -> broadcast::Receiver<ClientId> {
        self.client_disconnected_tx.subscribe()
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Get receiver statistics across all channels.
    #[must_use]
    pub fn stats(&self) -> BusStats {
        BusStats {
            quote_receivers: self.quotes_tx.receiver_count(),
            quote_update_receivers: self.quote_updates_tx.receiver_count(),
            heartbeat_receivers: self.heartbeats_tx.receiver_count(),
            lifecycle_receivers: self.client_connected_tx.receiver_count()
                + self.client_disconnected_tx.receiver_count(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Shared event bus reference.
pub type SharedEventBus = Arc<EventBus>;

/// Receiver statistics across bus channels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Number of quote receivers.
    pub quote_receivers: usize,
    /// Number of quote-update receivers.
    pub quote_update_receivers: usize,
    /// Number of heartbeat receivers.
    pub heartbeat_receivers: usize,
    /// Number of lifecycle receivers.
    pub lifecycle_receivers: usize,
}

impl BusStats {
    /// Total receivers across all channels.
    #[must_use]
    pub const fn total_receivers(&self) -> usize {
        self.quote_receivers
            + self.quote_update_receivers
            + self.heartbeat_receivers
            + self.lifecycle_receivers
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_bus_has_no_receivers() {
        let bus = EventBus::with_defaults();
        assert_eq!(bus.stats().total_receivers(), 0);
    }

    #[test]
    fn publish_without_receivers_returns_none() {
        let bus = EventBus::with_defaults();
        assert!(bus.publish_quote(QuoteEvent::new("BTC", "USD", 1.0)).is_none());
        assert!(
            bus.publish_heartbeat(HeartbeatEvent { session_id: None })
                .is_none()
        );
    }

    #[tokio::test]
    async fn quote_reaches_every_subscriber() {
        let bus = EventBus::with_defaults();
        let mut rx1 = bus.subscribe_quotes();
        let mut rx2 = bus.subscribe_quotes();

        let delivered = bus.publish_quote(QuoteEvent::new("BTC", "USD", 10000.0));
        assert_eq!(delivered, Some(2));

        assert_eq!(rx1.recv().await.unwrap().symbol, "BTC");
        assert_eq!(rx2.recv().await.unwrap().symbol, "BTC");
    }

    #[tokio::test]
    async fn channels_are_independent() {
        let bus = EventBus::with_defaults();
        let mut quotes = bus.subscribe_quotes();
        let mut updates = bus.subscribe_quote_updates();

        let _ = bus.publish_quote_update(QuoteEvent::new("LTC", "ZAR", 251.0));

        assert_eq!(updates.recv().await.unwrap().currency, "ZAR");
        assert!(quotes.try_recv().is_err());
    }

    #[tokio::test]
    async fn subscriber_observes_publishes_in_order() {
        let bus = EventBus::with_defaults();
        let mut rx = bus.subscribe_quotes();

        for price in [1.0, 2.0, 3.0] {
            let _ = bus.publish_quote(QuoteEvent::new("BTC", "USD", price));
        }

        assert_eq!(rx.recv().await.unwrap().price, 1.0);
        assert_eq!(rx.recv().await.unwrap().price, 2.0);
        assert_eq!(rx.recv().await.unwrap().price, 3.0);
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_publishes() {
        let bus = EventBus::with_defaults();

        // Keep one receiver alive so the publish is accepted at all.
        let _early = bus.subscribe_quotes();
        let _ = bus.publish_quote(QuoteEvent::new("BTC", "USD", 1.0));

        let mut late = bus.subscribe_quotes();
        assert!(late.try_recv().is_err());
    }

    #[test]
    fn stats_reflect_all_channels() {
        let bus = EventBus::with_defaults();
        let _q = bus.subscribe_quotes();
        let _u = bus.subscribe_quote_updates();
        let _h = bus.subscribe_heartbeats();
        let _c = bus.subscribe_client_connected();

        let stats = bus.stats();
        assert_eq!(stats.quote_receivers, 1);
        assert_eq!(stats.quote_update_receivers, 1);
        assert_eq!(stats.heartbeat_receivers, 1);
        assert_eq!(stats.lifecycle_receivers, 1);
        assert_eq!(stats.total_receivers(), 4);
    }

    #[test]
    fn channel_names_are_stable() {
        assert_eq!(channel::QUOTE, "quote");
        assert_eq!(channel::QUOTE_UPDATE, "quote-update");
        assert_eq!(channel::HEARTBEAT, "cc.connection.heartbeat");
        assert_eq!(channel::CLIENT_CONNECTED, "client-connected");
        assert_eq!(channel::CLIENT_DISCONNECTED, "client-disconnected");
    }
}
