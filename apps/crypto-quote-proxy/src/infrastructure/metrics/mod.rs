//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Messages**: upstream frames received and quote events published
//! - **Stream health**: decode failures and reconnection attempts
//! - **Fallback**: REST lookups triggered by subscription rejections
//! - **Clients**: connected downstream delivery channels
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the query API port.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "quote_proxy_messages_received_total",
        "Total frames received from the upstream stream, by kind"
    );
    describe_counter!(
        "quote_proxy_quotes_published_total",
        "Total quote events published on the bus, by channel"
    );
    describe_counter!(
        "quote_proxy_decode_failures_total",
        "Total upstream frames dropped because they could not be decoded"
    );
    describe_counter!(
        "quote_proxy_fallback_lookups_total",
        "Total REST fallback lookups triggered by subscription rejections"
    );
    describe_counter!(
        "quote_proxy_reconnects_total",
        "Total upstream reconnection attempts"
    );
    describe_counter!(
        "quote_proxy_frames_dropped_total",
        "Total outbound frames dropped on full delivery queues"
    );

    describe_gauge!(
        "quote_proxy_connected_clients",
        "Number of connected downstream delivery channels"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Outcome labels for fallback lookups.
#[derive(Debug, Clone, Copy)]
pub enum FallbackOutcome {
    /// The lookup produced a publishable quote.
    Success,
    /// The lookup failed and the pair's correction was dropped.
    Failure,
}

impl FallbackOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Record an upstream frame received, labelled by decoded kind.
pub fn record_message_received(kind: &'static str) {
    counter!(
        "quote_proxy_messages_received_total",
        "kind" => kind
    )
    .increment(1);
}

/// Record a quote event published on the bus.
pub fn record_quote_published(channel: &'static str) {
    counter!(
        "quote_proxy_quotes_published_total",
        "channel" => channel
    )
    .increment(1);
}

/// Record an undecodable upstream frame being dropped.
pub fn record_decode_failure() {
    counter!("quote_proxy_decode_failures_total").increment(1);
}

/// Record a fallback REST lookup and its outcome.
pub fn record_fallback_lookup(outcome: FallbackOutcome) {
    counter!(
        "quote_proxy_fallback_lookups_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record an upstream reconnection attempt.
pub fn record_reconnect() {
    counter!("quote_proxy_reconnects_total").increment(1);
}

/// Record an outbound frame dropped on a full delivery queue.
pub fn record_frame_dropped() {
    counter!("quote_proxy_frames_dropped_total").increment(1);
}

/// Update the connected downstream client count.
pub fn set_connected_clients(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("quote_proxy_connected_clients").set(count as f64);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_outcome_as_str() {
        assert_eq!(FallbackOutcome::Success.as_str(), "success");
        assert_eq!(FallbackOutcome::Failure.as_str(), "failure");
    }
}
