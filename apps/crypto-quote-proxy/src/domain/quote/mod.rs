//! Quote Event Types
//!
//! The canonical internal representation of a price update, regardless of
//! whether it originated from the live stream or from a fallback REST
//! lookup. Once published on the event bus a `QuoteEvent` is never mutated.

use serde::{Deserialize, Serialize};

/// Note attached to quotes obtained through the REST fallback path after
/// the stream rejected the pair's subscription. The value is the wire
/// constant downstream clients already key on.
pub const FALLBACK_NOTE: &str = "500_NOT_IN_STREAM_INVALID_SUB";

/// A single price update for one (symbol, currency) pair.
///
/// Prices in this service are advisory, not used for execution, so the
/// streaming and fallback paths discard sub-unit precision via
/// [`QuoteEvent::rounded`]. Point-in-time REST queries return the raw
/// provider price untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteEvent {
    /// The crypto symbol, e.g. "BTC".
    pub symbol: String,

    /// The fiat currency symbol, e.g. "USD".
    pub currency: String,

    /// The price of one unit of `symbol` in `currency`. Never negative.
    pub price: f64,

    /// Extra information, such as the price not being live in the stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl QuoteEvent {
    /// Create a quote event with no note.
    #[must_use]
    pub fn new(symbol: impl Into<String>, currency: impl Into<String>, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            currency: currency.into(),
            price,
            note: None,
        }
    }

    /// Attach a note to this quote.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Round the price to the nearest integer unit.
    #[must_use]
    pub fn rounded(mut self) -> Self {
        self.price = self.price.round();
        self
    }

    /// Check whether this quote came from the fallback REST path.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.note.as_deref() == Some(FALLBACK_NOTE)
    }
}
