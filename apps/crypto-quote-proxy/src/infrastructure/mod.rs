//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete adapters around the domain types:
//! the upstream clients, the event bus, and the downstream surfaces.

/// CryptoCompare stream and REST client adapters.
pub mod cryptocompare;

/// Event bus for in-process publish/subscribe.
pub mod bus;

/// Downstream fan-out registry.
pub mod fanout;

/// Downstream websocket gateway.
pub mod gateway;

/// Query and health HTTP API.
pub mod api;

/// Configuration loading.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
