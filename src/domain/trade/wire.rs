//! Wire types for trade records.

use crate::shared::coerce::field_or_null;
use serde_json::{Map, Value};

/// A raw trade record as the broadcaster sends it.
///
/// Every field is kept as a raw value and coerced in [`super::Trade`]'s
/// conversion, since numbers arrive both as JSON numbers and as strings.
#[derive(Debug, Clone, Default)]
pub struct WireTrade {
    pub price: Value,
    pub quantity: Value,
    pub timestamp: Value,
    pub is_buyer_maker: Value,
    pub instrument: Value,
    pub trade_id: Value,
}

impl WireTrade {
    /// Pick each field from the record, canonical key first.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            price: field_or_null(map, &["price"]),
            quantity: field_or_null(map, &["quantity", "size", "qty"]),
            timestamp: field_or_null(map, &["timestamp", "ts", "time"]),
            is_buyer_maker: field_or_null(map, &["is_buyer_maker", "isBuyerMaker"]),
            instrument: field_or_null(map, &["instrument", "symbol"]),
            trade_id: field_or_null(map, &["trade_id", "id", "tradeId"]),
        }
    }
}
