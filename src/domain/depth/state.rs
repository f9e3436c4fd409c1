//! Depth state container.

use super::wire::{WireDepth, WireLevel};
use super::PriceLevel;
use crate::error::ParseError;
use crate::shared::{coerce, serde_util, Instrument, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::BTreeMap;

/// Aggregated order book depth.
///
/// Levels are keyed by price, so a side never holds two levels at the same
/// price; when a payload repeats a price the later level wins. Levels with a
/// non-positive price or quantity are not kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepthBook {
    bids: BTreeMap<Decimal, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
    /// Exchange timestamp carried with the depth, if any.
    pub timestamp: Option<DateTime<Utc>>,
    pub instrument: Option<Instrument>,
}

impl DepthBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_levels(
        bids: impl IntoIterator<Item = PriceLevel>,
        asks: impl IntoIterator<Item = PriceLevel>,
    ) -> Self {
        let mut book = Self::new();
        for level in bids {
            book.insert(Side::Bid, level);
        }
        for level in asks {
            book.insert(Side::Ask, level);
        }
        book
    }

    /// Normalize a raw `depth` value.
    ///
    /// Fails only when the container itself is unusable; unreadable levels are
    /// skipped.
    pub fn from_wire(value: &Value) -> Result<Self, ParseError> {
        let shape_error = ParseError::UnexpectedShape {
            field: "depth",
            expected: "object with `bids`/`asks` arrays",
        };
        let wire = value
            .as_object()
            .and_then(WireDepth::from_map)
            .ok_or(shape_error)?;

        let mut book = Self::new();
        let mut skipped = 0usize;
        for (side, levels) in [(Side::Bid, &wire.bids), (Side::Ask, &wire.asks)] {
            for raw in levels.iter().flatten() {
                match read_level(raw) {
                    Some(level) if book.insert(side, level) => {}
                    _ => skipped += 1,
                }
            }
        }
        if skipped > 0 {
            tracing::debug!("Skipped {} unreadable depth level(s)", skipped);
        }

        book.timestamp = serde_util::timestamp(&wire.timestamp);
        book.instrument = coerce::string(&wire.instrument).map(Instrument::from);
        Ok(book)
    }

    fn insert(&mut self, side: Side, level: PriceLevel) -> bool {
        if level.price <= Decimal::ZERO || level.quantity <= Decimal::ZERO {
            return false;
        }
        let levels = match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };
        levels.insert(level.price, level.quantity);
        true
    }

    /// Bids sorted by price descending.
    pub fn bids(&self) -> impl Iterator<Item = PriceLevel> + '_ {
        self.bids
            .iter()
            .rev()
            .map(|(price, quantity)| PriceLevel::new(*price, *quantity))
    }

    /// Asks sorted by price ascending.
    pub fn asks(&self) -> impl Iterator<Item = PriceLevel> + '_ {
        self.asks
            .iter()
            .map(|(price, quantity)| PriceLevel::new(*price, *quantity))
    }

    pub fn bid_count(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_count(&self) -> usize {
        self.asks.len()
    }

    /// Highest bid.
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids().next()
    }

    /// Lowest ask.
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks().next()
    }

    /// Mid price (average of best bid and best ask).
    ///
    /// `None` if either side is empty or the sum overflows.
    pub fn mid_price(&self) -> Option<Decimal> {
        let (bid, ask) = (self.best_bid()?, self.best_ask()?);
        bid.price.checked_add(ask.price)?.checked_div(Decimal::TWO)
    }

    /// Spread between best ask and best bid.
    pub fn spread(&self) -> Option<Decimal> {
        let (bid, ask) = (self.best_bid()?, self.best_ask()?);
        ask.price.checked_sub(bid.price)
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

fn read_level(raw: &Value) -> Option<PriceLevel> {
    let level = WireLevel::from_value(raw)?;
    let (price, quantity) = level.parts();
    Some(PriceLevel::new(
        price.and_then(coerce::decimal)?,
        quantity.and_then(coerce::decimal)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn level(price: i64, quantity: i64) -> PriceLevel {
        PriceLevel::new(Decimal::from(price), Decimal::from(quantity))
    }

    #[test]
    fn test_pair_levels() {
        let book = DepthBook::from_wire(&json!({"bids": [[100, 2]], "asks": [[101, 3]]})).unwrap();
        assert_eq!(book.bids().collect::<Vec<_>>(), vec![level(100, 2)]);
        assert_eq!(book.asks().collect::<Vec<_>>(), vec![level(101, 3)]);
    }

    #[test]
    fn test_object_levels_and_string_numbers() {
        let book = DepthBook::from_wire(&json!({
            "bids": [{"price": "99.5", "quantity": "1"}],
            "asks": [{"price": 100.5, "quantity": 2}],
            "timestamp": 1740076800000u64,
            "instrument": "BTC-USDT"
        }))
        .unwrap();
        assert_eq!(book.best_bid().unwrap().price, Decimal::new(995, 1));
        assert_eq!(book.best_ask().unwrap().price, Decimal::new(1005, 1));
        assert_eq!(book.instrument.as_ref().unwrap().as_str(), "BTC-USDT");
        assert_eq!(book.timestamp.unwrap().timestamp_millis(), 1_740_076_800_000);
    }

    #[test]
    fn test_sides_are_sorted() {
        let book = DepthBook::from_wire(&json!({
            "bids": [[98, 1], [100, 1], [99, 1]],
            "asks": [[103, 1], [101, 1], [102, 1]]
        }))
        .unwrap();
        let bids: Vec<_> = book.bids().map(|l| l.price).collect();
        let asks: Vec<_> = book.asks().map(|l| l.price).collect();
        assert_eq!(bids, vec![Decimal::from(100), Decimal::from(99), Decimal::from(98)]);
        assert_eq!(asks, vec![Decimal::from(101), Decimal::from(102), Decimal::from(103)]);
    }

    #[test]
    fn test_duplicate_price_collapses() {
        let book = DepthBook::from_wire(&json!({"bids": [[100, 1], [100, 5]], "asks": []})).unwrap();
        assert_eq!(book.bid_count(), 1);
        assert_eq!(book.best_bid(), Some(level(100, 5)));
    }

    #[test]
    fn test_unreadable_levels_skipped() {
        let book = DepthBook::from_wire(&json!({
            "bids": [["abc", 1], [100, 2], "junk", [0, 4], [101]],
            "asks": [{"price": 102, "quantity": "x"}, [103, 1]]
        }))
        .unwrap();
        assert_eq!(book.bids().collect::<Vec<_>>(), vec![level(100, 2)]);
        assert_eq!(book.asks().collect::<Vec<_>>(), vec![level(103, 1)]);
    }

    #[test]
    fn test_duplicate_keys_keep_the_book() {
        let book = DepthBook::from_wire(&json!({
            "bids": [[100, 2], {"price": 99, "quantity": 1, "size": 7}],
            "asks": [[101, 3]],
            "timestamp": 1740076800000u64,
            "ts": 1740076801000u64
        }))
        .unwrap();
        assert_eq!(book.best_bid(), Some(level(100, 2)));
        assert_eq!(book.bids().nth(1), Some(level(99, 1)));
        assert_eq!(book.best_ask(), Some(level(101, 3)));
        assert_eq!(book.timestamp.unwrap().timestamp_millis(), 1_740_076_800_000);
    }

    #[test]
    fn test_missing_sides_are_empty() {
        let book = DepthBook::from_wire(&json!({})).unwrap();
        assert!(book.is_empty());
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(DepthBook::from_wire(&json!([[100, 1]])).is_err());
        assert!(DepthBook::from_wire(&json!({"bids": 5})).is_err());
    }

    #[test]
    fn test_mid_price_and_spread() {
        let book = DepthBook::from_levels(vec![level(50, 10)], vec![level(52, 5)]);
        assert_eq!(book.mid_price(), Some(Decimal::from(51)));
        assert_eq!(book.spread(), Some(Decimal::from(2)));
        assert_eq!(DepthBook::new().mid_price(), None);
    }

    #[test]
    fn test_mid_price_overflow_is_none() {
        let book = DepthBook::from_wire(&json!({
            "bids": [["50000000000000000000000000000", 1]],
            "asks": [["60000000000000000000000000000", 1]]
        }))
        .unwrap();
        assert_eq!(book.bid_count(), 1);
        assert_eq!(book.mid_price(), None);
        let spread = Decimal::from_str_exact("10000000000000000000000000000").unwrap();
        assert_eq!(book.spread(), Some(spread));
    }
}
