//! Lenient coercion of loosely-typed JSON values.
//!
//! The feed is not consistent about types: prices arrive as numbers on one
//! deployment and as strings on another, flags as `true` or `1`. Every helper
//! here returns `None` instead of failing so callers can pick a per-field
//! fallback.

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;

/// First non-null value under `keys`, tried in order.
///
/// Records spell the same field several ways (`quantity`/`size`/`qty`); the
/// first key listed wins when a record carries more than one of them.
pub fn field<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .find(|v| !v.is_null())
}

/// Same as [`field`], cloned, with `Value::Null` standing in for absent.
pub fn field_or_null(map: &Map<String, Value>, keys: &[&str]) -> Value {
    field(map, keys).cloned().unwrap_or(Value::Null)
}

/// Parse a decimal from a string, accepting plain and scientific notation.
pub fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// Coerce a number or numeric string into a [`Decimal`].
pub fn decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else if let Some(u) = n.as_u64() {
                Some(Decimal::from(u))
            } else {
                parse_decimal(&n.to_string())
            }
        }
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

/// Coerce a required figure, falling back to zero.
pub fn decimal_or_zero(value: Option<&Value>) -> Decimal {
    value.and_then(decimal).unwrap_or(Decimal::ZERO)
}

/// Coerce a number or numeric string into an `f64`.
pub fn float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Coerce a boolean flag; accepts `true`/`false`, `0`/`1` and their string forms.
pub fn boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Coerce an identifier-like value (string or number) into a non-empty string.
pub fn string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
