//! Trade state container.

use super::wire::WireTrade;
use super::Trade;
use crate::error::ParseError;
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::VecDeque;

/// Bounded trade tape, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeTape {
    trades: VecDeque<Trade>,
    max_size: usize,
}

impl TradeTape {
    pub fn new(max_size: usize) -> Self {
        Self {
            trades: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Normalize a raw `trades` value into a tape holding at most `max_size`
    /// trades.
    pub fn from_wire(value: &Value, max_size: usize) -> Result<Self, ParseError> {
        let mut tape = Self::new(max_size);
        tape.replace(read_trades(value)?);
        Ok(tape)
    }

    /// Push a new trade, evicting the oldest if at capacity.
    pub fn push(&mut self, trade: Trade) {
        if self.max_size == 0 {
            return;
        }
        if self.trades.len() >= self.max_size {
            self.trades.pop_back();
        }
        self.trades.push_front(trade);
    }

    /// Replace all trades.
    ///
    /// Orders newest first by timestamp (records without one sort last, input
    /// order kept among equals) and keeps the newest `max_size`.
    pub fn replace(&mut self, mut trades: Vec<Trade>) {
        trades.sort_by_key(|t| Reverse(t.timestamp));
        trades.truncate(self.max_size);
        self.trades = trades.into();
    }

    pub fn trades(&self) -> &VecDeque<Trade> {
        &self.trades
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter()
    }

    pub fn latest(&self) -> Option<&Trade> {
        self.trades.front()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}

impl Default for TradeTape {
    fn default() -> Self {
        Self::new(crate::ws::DEFAULT_TRADE_HISTORY)
    }
}

/// Read a raw `trades` array. Records that are not objects are skipped.
pub fn read_trades(value: &Value) -> Result<Vec<Trade>, ParseError> {
    let records = value.as_array().ok_or(ParseError::UnexpectedShape {
        field: "trades",
        expected: "array of trade records",
    })?;

    let mut trades = Vec::with_capacity(records.len());
    let mut skipped = 0usize;
    for record in records {
        match record.as_object() {
            Some(map) => trades.push(Trade::from(WireTrade::from_map(map))),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::debug!("Skipped {} unreadable trade record(s)", skipped);
    }
    Ok(trades)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn make_trade(id: &str, ts_ms: Option<i64>) -> Trade {
        Trade {
            price: Decimal::from(50),
            quantity: Decimal::ONE,
            timestamp: ts_ms.and_then(DateTime::from_timestamp_millis),
            is_buyer_maker: false,
            instrument: None,
            trade_id: Some(id.to_string()),
        }
    }

    fn ids(tape: &TradeTape) -> Vec<&str> {
        tape.iter().filter_map(|t| t.trade_id.as_deref()).collect()
    }

    #[test]
    fn test_push_evicts_oldest() {
        let mut tape = TradeTape::new(3);
        for (i, id) in ["t1", "t2", "t3", "t4"].iter().enumerate() {
            tape.push(make_trade(id, Some(i as i64 + 1)));
        }
        assert_eq!(tape.len(), 3);
        assert_eq!(ids(&tape), ["t4", "t3", "t2"]);
    }

    #[test]
    fn test_replace_orders_newest_first() {
        let mut tape = TradeTape::new(10);
        tape.replace(vec![
            make_trade("a", Some(1_000)),
            make_trade("b", None),
            make_trade("c", Some(3_000)),
            make_trade("d", Some(2_000)),
        ]);
        assert_eq!(ids(&tape), ["c", "d", "a", "b"]);
        assert_eq!(tape.latest().unwrap().trade_id.as_deref(), Some("c"));
    }

    #[test]
    fn test_replace_keeps_newest_within_limit() {
        let mut tape = TradeTape::new(2);
        tape.replace(vec![
            make_trade("old", Some(1_000)),
            make_trade("new", Some(3_000)),
            make_trade("mid", Some(2_000)),
        ]);
        assert_eq!(ids(&tape), ["new", "mid"]);
    }

    #[test]
    fn test_from_wire_skips_non_objects() {
        let raw = json!([
            {"price": "not-a-number", "quantity": 1, "timestamp": 2000, "trade_id": "x"},
            42,
            "junk",
            {"price": 10, "quantity": 2, "timestamp": 1000, "trade_id": "y"}
        ]);
        let tape = TradeTape::from_wire(&raw, 100).unwrap();
        assert_eq!(tape.len(), 2);
        assert_eq!(tape.latest().unwrap().price, Decimal::ZERO);
        assert_eq!(ids(&tape), ["x", "y"]);
    }

    #[test]
    fn test_from_wire_keeps_records_with_alias_keys() {
        let raw = json!([
            {"price": 10, "quantity": 2, "timestamp": 1000, "trade_id": "t1", "id": 7},
            {"price": 11, "size": 1, "ts": 2000, "id": 8}
        ]);
        let tape = TradeTape::from_wire(&raw, 100).unwrap();
        assert_eq!(ids(&tape), ["8", "t1"]);
    }

    #[test]
    fn test_from_wire_empty_array() {
        let tape = TradeTape::from_wire(&json!([]), 100).unwrap();
        assert!(tape.is_empty());
    }

    #[test]
    fn test_from_wire_rejects_object() {
        assert!(TradeTape::from_wire(&json!({"price": 1}), 100).is_err());
    }
}
