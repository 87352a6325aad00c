//! Subscription Set Types
//!
//! Domain types describing which (symbol, currency) pairs the upstream
//! stream session is subscribed to.
//!
//! # Design
//!
//! A [`SubscriptionSet`] holds an ordered symbol list and an ordered
//! currency list; their cross product defines one subscription key per
//! pair. Iteration order is symbol-major (symbols outer, currencies
//! inner) and deterministic, because it fixes the order subscription
//! tokens are transmitted upstream.

use std::collections::HashSet;
use std::fmt;

// =============================================================================
// Types
// =============================================================================

/// One (symbol, currency) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
    /// The crypto symbol, e.g. "LTC".
    pub symbol: String,
    /// The fiat currency symbol, e.g. "ZAR".
    pub currency: String,
}

impl PairKey {
    /// Create a pair key.
    #[must_use]
    pub fn new(symbol: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            currency: currency.into(),
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.symbol, self.currency)
    }
}

/// Subscription set validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    /// The symbol list is empty.
    #[error("subscription symbol list is empty")]
    EmptySymbols,

    /// The currency list is empty.
    #[error("subscription currency list is empty")]
    EmptyCurrencies,
}

// =============================================================================
// Subscription Set
// =============================================================================

/// An ordered pair of non-empty symbol and currency sets.
///
/// Duplicates are removed at construction (first occurrence wins) so that
/// every pair key in the cross product is unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSet {
    symbols: Vec<String>,
    currencies: Vec<String>,
}

impl SubscriptionSet {
    /// Create a subscription set from symbol and currency lists.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError`] if either list is empty after
    /// deduplication.
    pub fn new(
        symbols: impl IntoIterator<Item = String>,
        currencies: impl IntoIterator<Item = String>,
    ) -> Result<Self, SubscriptionError> {
        let symbols = dedup_preserving_order(symbols);
        if symbols.is_empty() {
            return Err(SubscriptionError::EmptySymbols);
        }

        let currencies = dedup_preserving_order(currencies);
        if currencies.is_empty() {
            return Err(SubscriptionError::EmptyCurrencies);
        }

        Ok(Self {
            symbols,
            currencies,
        })
    }

    /// The subscribed symbols, in insertion order.
    #[must_use]
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// The subscribed currencies, in insertion order.
    #[must_use]
    pub fn currencies(&self) -> &[String] {
        &self.currencies
    }

    /// Number of pairs in the cross product.
    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.symbols.len() * self.currencies.len()
    }

    /// Iterate the cross product in symbol-major order.
    pub fn pairs(&self) -> impl Iterator<Item = PairKey> + '_ {
        self.symbols.iter().flat_map(move |symbol| {
            self.currencies.iter().map(move |currency| PairKey {
                symbol: symbol.clone(),
                currency: currency.clone(),
            })
        })
    }

    /// Check whether a pair is covered by this set.
    #[must_use]
    pub fn contains(&self, pair: &PairKey) -> bool {
        self.symbols.contains(&pair.symbol) && self.currencies.contains(&pair.currency)
    }
}

fn dedup_preserving_order(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn pairs_are_symbol_major() {
        let set =
            SubscriptionSet::new(strings(&["BTC", "ETH"]), strings(&["USD", "GBP"])).unwrap();

        let pairs: Vec<String> = set.pairs().map(|p| p.to_string()).collect();
        assert_eq!(pairs, vec!["BTC/USD", "BTC/GBP", "ETH/USD", "ETH/GBP"]);
    }

    #[test]
    fn pair_count_is_cross_product_size() {
        let set = SubscriptionSet::new(
            strings(&["BTC", "ETH", "XRP"]),
            strings(&["USD", "GBP"]),
        )
        .unwrap();

        assert_eq!(set.pair_count(), 6);
        assert_eq!(set.pairs().count(), 6);
    }

    #[test]
    fn duplicates_removed_first_occurrence_wins() {
        let set = SubscriptionSet::new(
            strings(&["BTC", "ETH", "BTC"]),
            strings(&["USD", "USD"]),
        )
        .unwrap();

        assert_eq!(set.symbols(), &["BTC", "ETH"]);
        assert_eq!(set.currencies(), &["USD"]);
        assert_eq!(set.pair_count(), 2);
    }

    #[test]
    fn empty_symbols_rejected() {
        let err = SubscriptionSet::new(Vec::new(), strings(&["USD"])).unwrap_err();
        assert_eq!(err, SubscriptionError::EmptySymbols);
    }

    #[test]
    fn empty_currencies_rejected() {
        let err = SubscriptionSet::new(strings(&["BTC"]), Vec::new()).unwrap_err();
        assert_eq!(err, SubscriptionError::EmptyCurrencies);
    }

    #[test]
    fn contains_covers_cross_product_only() {
        let set = SubscriptionSet::new(strings(&["BTC"]), strings(&["USD"])).unwrap();

        assert!(set.contains(&PairKey::new("BTC", "USD")));
        assert!(!set.contains(&PairKey::new("BTC", "ZAR")));
        assert!(!set.contains(&PairKey::new("LTC", "USD")));
    }
}
