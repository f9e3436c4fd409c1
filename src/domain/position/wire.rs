//! Wire types for position records.

use crate::shared::coerce::field_or_null;
use serde_json::{Map, Value};

/// A raw position record.
///
/// `last_update` is epoch seconds (fractional) on the dashboard backend.
#[derive(Debug, Clone, Default)]
pub struct WirePosition {
    pub instrument: Value,
    pub quantity: Value,
    pub entry_price: Value,
    pub current_price: Value,
    pub unrealized_pnl: Value,
    pub realized_pnl: Value,
    pub liquidation_price: Value,
    pub margin_ratio: Value,
    pub last_update: Value,
}

impl WirePosition {
    /// Pick each field from the record, canonical key first.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            instrument: field_or_null(map, &["instrument", "symbol"]),
            quantity: field_or_null(map, &["quantity", "size", "qty"]),
            entry_price: field_or_null(map, &["entry_price", "entryPrice"]),
            current_price: field_or_null(map, &["current_price", "currentPrice", "mark_price"]),
            unrealized_pnl: field_or_null(map, &["unrealized_pnl", "unrealizedPnl"]),
            realized_pnl: field_or_null(map, &["realized_pnl", "realizedPnl"]),
            liquidation_price: field_or_null(map, &["liquidation_price", "liquidationPrice"]),
            margin_ratio: field_or_null(map, &["margin_ratio", "marginRatio"]),
            last_update: field_or_null(map, &["last_update", "lastUpdate", "timestamp"]),
        }
    }
}
