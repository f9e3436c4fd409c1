//! Wire types for depth payloads.

use crate::shared::coerce::{field, field_or_null};
use serde_json::{Map, Value};

/// Depth payload: `{bids, asks, timestamp?, instrument?}`.
///
/// Levels stay as raw values here; each one is read on its own so a single
/// unreadable level does not take the rest of the side down with it.
#[derive(Debug, Clone, Default)]
pub struct WireDepth {
    pub bids: Option<Vec<Value>>,
    pub asks: Option<Vec<Value>>,
    pub timestamp: Value,
    pub instrument: Value,
}

impl WireDepth {
    /// Read the payload object. `None` if a side is present but not an array.
    pub fn from_map(map: &Map<String, Value>) -> Option<Self> {
        Some(Self {
            bids: side(map, "bids")?,
            asks: side(map, "asks")?,
            timestamp: field_or_null(map, &["timestamp", "ts"]),
            instrument: field_or_null(map, &["instrument", "symbol"]),
        })
    }
}

fn side(map: &Map<String, Value>, key: &str) -> Option<Option<Vec<Value>>> {
    match field(map, &[key]) {
        None => Some(None),
        Some(Value::Array(levels)) => Some(Some(levels.clone())),
        Some(_) => None,
    }
}

/// A single price level as sent by the feed.
///
/// Two shapes are in circulation: `[price, quantity, ...]` arrays (trailing
/// elements such as order counts are ignored) and `{price, quantity}` objects.
#[derive(Debug, Clone, PartialEq)]
pub enum WireLevel {
    Pair(Vec<Value>),
    Object { price: Value, quantity: Value },
}

impl WireLevel {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => Some(WireLevel::Pair(items.clone())),
            Value::Object(map) => Some(WireLevel::Object {
                price: field_or_null(map, &["price"]),
                quantity: field_or_null(map, &["quantity", "size", "qty"]),
            }),
            _ => None,
        }
    }

    /// Raw `(price, quantity)` values, if present.
    pub fn parts(&self) -> (Option<&Value>, Option<&Value>) {
        match self {
            WireLevel::Pair(items) => (items.first(), items.get(1)),
            WireLevel::Object { price, quantity } => (Some(price), Some(quantity)),
        }
    }
}
