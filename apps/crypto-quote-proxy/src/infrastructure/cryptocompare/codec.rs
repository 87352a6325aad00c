//! Stream Codec Module
//!
//! Encoding and decoding for the CryptoCompare websocket protocol.
//!
//! Outbound subscription requests are JSON objects listing one
//! `{kind}~{market}~{symbol}~{currency}` token per pair. Inbound frames
//! are JSON objects classified by their numeric `TYPE` discriminator;
//! the discriminator arrives as a string on the wire, so the decoder
//! accepts both string and numeric encodings.

use serde_json::Value;

use crate::domain::subscription::{PairKey, SubscriptionSet};
use crate::infrastructure::cryptocompare::messages::{
    AGGREGATE_MARKET, AggregateQuoteMessage, InvalidSubscriptionMessage, KIND_AGGREGATE_QUOTE,
    KIND_HEARTBEAT, KIND_INVALID_SUBSCRIPTION, KIND_WELCOME, StreamMessage, SubscriptionRequest,
    WelcomeMessage,
};

/// Codec errors. Decoding failures are reported, never raised as a crash;
/// the dispatcher drops the frame and keeps the connection.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame has no usable `TYPE` discriminator.
    #[error("frame is missing a kind discriminator")]
    MissingKind,

    /// Invalid message format.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

/// JSON codec for the CryptoCompare streamer protocol.
#[derive(Debug, Default, Clone)]
pub struct StreamCodec;

impl StreamCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Encode a subscribe request covering the full cross product of the
    /// subscription set, in symbol-major order.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode_subscribe(&self, set: &SubscriptionSet) -> Result<String, CodecError> {
        self.encode_subscription_change(SubscriptionRequest::SUB_ADD, set)
    }

    /// Encode an unsubscribe request for the same token list.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode_unsubscribe(&self, set: &SubscriptionSet) -> Result<String, CodecError> {
        self.encode_subscription_change(SubscriptionRequest::SUB_REMOVE, set)
    }

    fn encode_subscription_change(
        &self,
        action: &str,
        set: &SubscriptionSet,
    ) -> Result<String, CodecError> {
        let request = SubscriptionRequest {
            action: action.to_string(),
            subs: set.pairs().map(|pair| pair_token(&pair)).collect(),
        };
        Ok(serde_json::to_string(&request)?)
    }

    /// Decode a single upstream frame and classify it by kind code.
    ///
    /// Unrecognized kind codes decode to [`StreamMessage::Unknown`] for
    /// forward compatibility with upstream protocol additions.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a JSON object, carries no
    /// kind discriminator, or a recognized kind is missing required fields.
    pub fn decode(&self, text: &str) -> Result<StreamMessage, CodecError> {
        let value: Value = serde_json::from_str(text)?;

        if !value.is_object() {
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {}",
                &text[..text.len().min(50)]
            )));
        }

        let kind = extract_kind(&value).ok_or(CodecError::MissingKind)?;

        let message = match kind {
            KIND_WELCOME => {
                let welcome: WelcomeMessage = serde_json::from_value(value)?;
                StreamMessage::Welcome(welcome)
            }
            KIND_HEARTBEAT => StreamMessage::Heartbeat,
            KIND_AGGREGATE_QUOTE => {
                let quote: AggregateQuoteMessage = serde_json::from_value(value)?;
                StreamMessage::AggregateQuote(quote)
            }
            KIND_INVALID_SUBSCRIPTION => {
                let rejection: InvalidSubscriptionMessage = serde_json::from_value(value)?;
                StreamMessage::InvalidSubscription(rejection)
            }
            other => StreamMessage::Unknown { kind: other },
        };

        Ok(message)
    }
}

/// Read the `TYPE` discriminator, which the upstream sends as a string
/// but is accepted numeric as well.
fn extract_kind(value: &Value) -> Option<u32> {
    match value.get("TYPE")? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        _ => None,
    }
}

/// Format one subscription token, e.g. `5~CCCAGG~BTC~USD`.
#[must_use]
pub fn pair_token(pair: &PairKey) -> String {
    format!(
        "{KIND_AGGREGATE_QUOTE}~{AGGREGATE_MARKET}~{}~{}",
        pair.symbol, pair.currency
    )
}

/// Recover the (symbol, currency) pair from a subscription token such as
/// the `PARAMETER` field of a rejection frame. Returns `None` when the
/// token does not have the `kind~market~symbol~currency` shape.
#[must_use]
pub fn parse_pair_token(token: &str) -> Option<PairKey> {
    let mut parts = token.split('~');
    let _kind = parts.next()?;
    let _market = parts.next()?;
    let symbol = parts.next()?;
    let currency = parts.next()?;

    if symbol.is_empty() || currency.is_empty() || parts.next().is_some() {
        return None;
    }

    Some(PairKey::new(symbol, currency))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn encode_subscribe_lists_cross_product_in_symbol_major_order() {
        let codec = StreamCodec::new();
        let set =
            SubscriptionSet::new(strings(&["BTC", "ETH"]), strings(&["USD", "GBP"])).unwrap();

        let json = codec.encode_subscribe(&set).unwrap();
        let request: SubscriptionRequest = serde_json::from_str(&json).unwrap();

        assert_eq!(request.action, "SubAdd");
        assert_eq!(
            request.subs,
            vec![
                "5~CCCAGG~BTC~USD",
                "5~CCCAGG~BTC~GBP",
                "5~CCCAGG~ETH~USD",
                "5~CCCAGG~ETH~GBP",
            ]
        );
    }

    #[test]
    fn encode_subscribe_token_count_matches_pair_count() {
        let codec = StreamCodec::new();
        let set = SubscriptionSet::new(
            strings(&["BTC", "ETH", "XRP"]),
            strings(&["USD", "GBP", "ZAR", "EUR"]),
        )
        .unwrap();

        let json = codec.encode_subscribe(&set).unwrap();
        let request: SubscriptionRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(request.subs.len(), set.pair_count());
    }

    #[test]
    fn encode_unsubscribe_uses_sub_remove_action() {
        let codec = StreamCodec::new();
        let set = SubscriptionSet::new(strings(&["BTC"]), strings(&["USD"])).unwrap();

        let json = codec.encode_unsubscribe(&set).unwrap();
        let request: SubscriptionRequest = serde_json::from_str(&json).unwrap();

        assert_eq!(request.action, "SubRemove");
        assert_eq!(request.subs, vec!["5~CCCAGG~BTC~USD"]);
    }

    #[test]
    fn decode_welcome() {
        let codec = StreamCodec::new();
        let frame = r#"{"TYPE":"20","MESSAGE":"STREAMERWELCOME","SOCKET_ID":"sock-42"}"#;

        match codec.decode(frame).unwrap() {
            StreamMessage::Welcome(welcome) => assert_eq!(welcome.socket_id, "sock-42"),
            other => panic!("expected Welcome, got {other:?}"),
        }
    }

    #[test]
    fn decode_heartbeat() {
        let codec = StreamCodec::new();
        let frame = r#"{"TYPE":"999","MESSAGE":"HEARTBEAT"}"#;

        assert_eq!(codec.decode(frame).unwrap(), StreamMessage::Heartbeat);
    }

    #[test]
    fn decode_aggregate_quote() {
        let codec = StreamCodec::new();
        let frame = r#"{"TYPE":"5","MARKET":"CCCAGG","FROMSYMBOL":"BTC","TOSYMBOL":"USD","MEDIAN":9999.99}"#;

        match codec.decode(frame).unwrap() {
            StreamMessage::AggregateQuote(quote) => {
                assert_eq!(quote.from_symbol, "BTC");
                assert_eq!(quote.to_symbol, "USD");
                assert_eq!(quote.median, Some(9999.99));
            }
            other => panic!("expected AggregateQuote, got {other:?}"),
        }
    }

    #[test]
    fn decode_aggregate_quote_without_median() {
        let codec = StreamCodec::new();
        let frame = r#"{"TYPE":"5","MARKET":"CCCAGG","FROMSYMBOL":"BTC","TOSYMBOL":"USD","FLAGS":4}"#;

        match codec.decode(frame).unwrap() {
            StreamMessage::AggregateQuote(quote) => assert_eq!(quote.median, None),
            other => panic!("expected AggregateQuote, got {other:?}"),
        }
    }

    #[test]
    fn decode_invalid_subscription() {
        let codec = StreamCodec::new();
        let frame = r#"{"TYPE":"500","MESSAGE":"INVALID_SUB","PARAMETER":"5~CCCAGG~LTC~ZAR","INFO":"pair not available"}"#;

        match codec.decode(frame).unwrap() {
            StreamMessage::InvalidSubscription(rejection) => {
                assert_eq!(rejection.parameter, "5~CCCAGG~LTC~ZAR");
                assert_eq!(rejection.info, "pair not available");
            }
            other => panic!("expected InvalidSubscription, got {other:?}"),
        }
    }

    #[test_case(r#"{"TYPE":"3","MESSAGE":"LOADCOMPLETE"}"#, 3; "string kind")]
    #[test_case(r#"{"TYPE":17,"SOMETHING":"else"}"#, 17; "numeric kind")]
    #[test_case(r#"{"TYPE":"0"}"#, 0; "zero kind")]
    fn decode_unrecognized_kinds_to_unknown(frame: &str, expected: u32) {
        let codec = StreamCodec::new();
        assert_eq!(
            codec.decode(frame).unwrap(),
            StreamMessage::Unknown { kind: expected }
        );
    }

    #[test]
    fn decode_rejects_non_json() {
        let codec = StreamCodec::new();
        assert!(matches!(
            codec.decode("not json at all"),
            Err(CodecError::Json(_))
        ));
    }

    #[test]
    fn decode_rejects_missing_kind() {
        let codec = StreamCodec::new();
        assert!(matches!(
            codec.decode(r#"{"MESSAGE":"HEARTBEAT"}"#),
            Err(CodecError::MissingKind)
        ));
    }

    #[test]
    fn decode_rejects_non_object() {
        let codec = StreamCodec::new();
        assert!(matches!(
            codec.decode(r#"["TYPE","5"]"#),
            Err(CodecError::InvalidFormat(_))
        ));
    }

    #[test]
    fn decode_rejects_welcome_without_socket_id() {
        let codec = StreamCodec::new();
        let frame = r#"{"TYPE":"20","MESSAGE":"STREAMERWELCOME"}"#;
        assert!(matches!(codec.decode(frame), Err(CodecError::Json(_))));
    }

    #[test]
    fn pair_token_round_trip() {
        let pair = PairKey::new("LTC", "ZAR");
        let token = pair_token(&pair);

        assert_eq!(token, "5~CCCAGG~LTC~ZAR");
        assert_eq!(parse_pair_token(&token), Some(pair));
    }

    #[test_case("5~CCCAGG~LTC"; "too few parts")]
    #[test_case("5~CCCAGG~LTC~ZAR~extra"; "too many parts")]
    #[test_case("5~CCCAGG~~ZAR"; "empty symbol")]
    #[test_case("5~CCCAGG~LTC~"; "empty currency")]
    #[test_case(""; "empty token")]
    fn parse_pair_token_rejects_malformed(token: &str) {
        assert_eq!(parse_pair_token(token), None);
    }
}
