#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Crypto Quote Proxy - Streaming Quote Multiplexer
//!
//! Maintains a single persistent connection to CryptoCompare's websocket
//! feed, normalizes aggregate quote frames into internal quote events,
//! and fans them out to any number of downstream websocket clients. The
//! same provider is also exposed through synchronous point-in-time HTTP
//! queries.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Core quote and subscription types
//!   - `quote`: The canonical quote event shape
//!   - `subscription`: Subscription set and pair keys
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `cryptocompare`: Stream client, codec, and REST client
//!   - `bus`: In-process publish/subscribe event bus
//!   - `fanout`: Downstream delivery channel registry
//!   - `gateway`: Downstream websocket server
//!   - `api`: Query/health HTTP endpoints
//!   - `config`: Environment configuration
//!   - `metrics` / `telemetry`: Observability
//!
//! # Data Flow
//!
//! ```text
//!                       ┌─────────────┐     ┌─────────────┐
//! CryptoCompare WS ────►│   Stream    │────►│   Event     │──► Fan-out ──► Client 1
//!        ▲              │   Client    │     │   Bus       │              ──► Client 2
//!        │ rejection    └─────┬───────┘     └─────────────┘              ──► Client N
//!        │                    │ fallback          ▲
//! CryptoCompare REST ◄────────┘───────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core quote types with no external service dependencies.
pub mod domain;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::quote::{FALLBACK_NOTE, QuoteEvent};
pub use domain::subscription::{PairKey, SubscriptionError, SubscriptionSet};

// Infrastructure config
pub use infrastructure::config::{
    BusSettings, ConfigError, Credentials, FanoutSettings, ProxyConfig, ServerSettings,
    StreamSettings,
};

// Event bus (for integration tests)
pub use infrastructure::bus::{BusConfig, BusStats, EventBus, HeartbeatEvent, SharedEventBus, channel};

// Fan-out registry (for integration tests)
pub use infrastructure::fanout::{ClientId, ClientRegistry, OutboundFrame};

// CryptoCompare adapters
pub use infrastructure::cryptocompare::{
    ConnectionState, LookupError, RestClient, StreamClient, StreamClientConfig, StreamClientError,
    StreamCodec,
};

// Downstream gateway
pub use infrastructure::gateway::{GatewayError, GatewayServer};

// Query API
pub use infrastructure::api::{ApiServer, ApiServerError, ApiState};

// Metrics
pub use infrastructure::metrics::{FallbackOutcome, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
