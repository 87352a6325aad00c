//! CryptoCompare WebSocket Message Types
//!
//! Wire format types for deserializing frames from the CryptoCompare
//! streamer. Every frame is a JSON object carrying a numeric `TYPE`
//! discriminator (transmitted as a string by the upstream).
//!
//! # Message Kinds
//!
//! | kind | meaning              | key fields                      |
//! |------|----------------------|---------------------------------|
//! | 20   | session welcome      | `SOCKET_ID`                     |
//! | 999  | heartbeat            | (session identifier implicit)   |
//! | 5    | aggregate quote      | `FROMSYMBOL`, `TOSYMBOL`, `MEDIAN` |
//! | 500  | invalid subscription | `PARAMETER`, `INFO`             |
//!
//! Anything else decodes to [`StreamMessage::Unknown`], which the
//! connection manager ignores so that upstream protocol additions do not
//! break the dispatch loop.

use serde::{Deserialize, Serialize};

// =============================================================================
// Wire Constants
// =============================================================================

/// Message kind for the session welcome frame.
pub const KIND_WELCOME: u32 = 20;

/// Message kind for heartbeat frames.
pub const KIND_HEARTBEAT: u32 = 999;

/// Message kind for aggregate quote frames, also the leading field of every
/// subscription token.
pub const KIND_AGGREGATE_QUOTE: u32 = 5;

/// Message kind for subscription rejection frames.
pub const KIND_INVALID_SUBSCRIPTION: u32 = 500;

/// The aggregate index market identifier used in subscription tokens and
/// point-in-time queries.
pub const AGGREGATE_MARKET: &str = "CCCAGG";

// =============================================================================
// Requests (produced)
// =============================================================================

/// A subscription change request sent to the streamer.
///
/// # Wire Format (JSON)
/// ```json
/// {"action": "SubAdd", "subs": ["5~CCCAGG~BTC~USD", "5~CCCAGG~BTC~GBP"]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    /// Either `SubAdd` or `SubRemove`.
    pub action: String,

    /// One token per (symbol, currency) pair, in symbol-major order.
    pub subs: Vec<String>,
}

impl SubscriptionRequest {
    /// Action value for subscribing.
    pub const SUB_ADD: &'static str = "SubAdd";

    /// Action value for unsubscribing.
    pub const SUB_REMOVE: &'static str = "SubRemove";
}

// =============================================================================
// Frames (consumed)
// =============================================================================

/// Session welcome frame payload.
///
/// # Wire Format (JSON)
/// ```json
/// {"TYPE": "20", "MESSAGE": "STREAMERWELCOME", "SOCKET_ID": "..."}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WelcomeMessage {
    /// Session identifier assigned by the upstream for this connection.
    #[serde(rename = "SOCKET_ID")]
    pub socket_id: String,
}

/// Aggregate quote frame payload.
///
/// The upstream sends partial updates for the same kind; a frame without
/// `MEDIAN` carries no price and is skipped by the dispatcher.
///
/// # Wire Format (JSON)
/// ```json
/// {"TYPE": "5", "MARKET": "CCCAGG", "FROMSYMBOL": "BTC", "TOSYMBOL": "USD", "MEDIAN": 9999.99}
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AggregateQuoteMessage {
    /// The crypto symbol.
    #[serde(rename = "FROMSYMBOL")]
    pub from_symbol: String,

    /// The fiat currency symbol.
    #[serde(rename = "TOSYMBOL")]
    pub to_symbol: String,

    /// Median price across exchanges, absent on partial updates.
    #[serde(rename = "MEDIAN", default)]
    pub median: Option<f64>,
}

/// Subscription rejection frame payload.
///
/// # Wire Format (JSON)
/// ```json
/// {"TYPE": "500", "MESSAGE": "INVALID_SUB", "PARAMETER": "5~CCCAGG~LTC~ZAR", "INFO": "..."}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InvalidSubscriptionMessage {
    /// The offending subscription token, e.g. `5~CCCAGG~LTC~ZAR`.
    #[serde(rename = "PARAMETER")]
    pub parameter: String,

    /// Human-readable rejection reason from the upstream.
    #[serde(rename = "INFO", default)]
    pub info: String,
}

/// A decoded upstream frame, classified once at decode time.
///
/// Transient: decoded, dispatched, and discarded. Never stored.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// Session established; carries the assigned session identifier.
    Welcome(WelcomeMessage),

    /// Connection liveness signal.
    Heartbeat,

    /// A median price for one (symbol, currency) pair.
    AggregateQuote(AggregateQuoteMessage),

    /// The upstream rejected one subscription token.
    InvalidSubscription(InvalidSubscriptionMessage),

    /// Any kind code this build does not recognize.
    Unknown {
        /// The unrecognized kind code.
        kind: u32,
    },
}

impl StreamMessage {
    /// Short label for logging and metrics.
    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        match self {
            Self::Welcome(_) => "welcome",
            Self::Heartbeat => "heartbeat",
            Self::AggregateQuote(_) => "aggregate_quote",
            Self::InvalidSubscription(_) => "invalid_subscription",
            Self::Unknown { .. } => "unknown",
        }
    }
}
