//! Timestamp helpers for feed wire formats.
//!
//! The feed mixes epoch units: envelope and trade timestamps are exchange
//! milliseconds, position `last_update` is fractional seconds, and raw
//! exchange stamps can be micro- or nanoseconds. The unit is inferred from
//! magnitude. Strings that are not numeric are tried as RFC 3339.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::coerce;

const SECONDS_CEILING: f64 = 1e11;
const MILLIS_CEILING: f64 = 1e14;
const MICROS_CEILING: f64 = 1e17;

/// Convert an epoch value of unknown unit into `DateTime<Utc>`.
///
/// Non-positive and non-finite values are rejected.
pub fn epoch_to_datetime(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() || epoch <= 0.0 {
        return None;
    }
    let millis = if epoch < SECONDS_CEILING {
        epoch * 1_000.0
    } else if epoch < MILLIS_CEILING {
        epoch
    } else if epoch < MICROS_CEILING {
        epoch / 1_000.0
    } else {
        epoch / 1_000_000.0
    };
    DateTime::<Utc>::from_timestamp_millis(millis.round() as i64)
}

/// Coerce a JSON timestamp (number, numeric string or RFC 3339 string) into
/// `DateTime<Utc>`.
pub fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    if let Some(epoch) = coerce::float(value) {
        return epoch_to_datetime(epoch);
    }
    let text = value.as_str()?.trim();
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_units_agree() {
        let secs = epoch_to_datetime(1_740_076_800.0).unwrap();
        let millis = epoch_to_datetime(1_740_076_800_000.0).unwrap();
        let micros = epoch_to_datetime(1_740_076_800_000_000.0).unwrap();
        let nanos = epoch_to_datetime(1_740_076_800_000_000_000.0).unwrap();
        assert_eq!(secs, millis);
        assert_eq!(millis, micros);
        assert_eq!(micros, nanos);
    }

    #[test]
    fn test_fractional_seconds_keep_millis() {
        let ts = epoch_to_datetime(1_740_076_800.25).unwrap();
        assert_eq!(ts.timestamp_millis(), 1_740_076_800_250);
    }

    #[test]
    fn test_rfc3339_strings() {
        let ts = timestamp(&json!("2025-02-20T18:40:00.500Z")).unwrap();
        assert_eq!(ts.timestamp_millis(), 1_740_076_800_500);
        let offset = timestamp(&json!("2025-02-20T19:40:00+01:00")).unwrap();
        assert_eq!(offset.timestamp(), 1_740_076_800);
        assert_eq!(timestamp(&json!("1740076800000")).unwrap(), offset);
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(epoch_to_datetime(0.0).is_none());
        assert!(epoch_to_datetime(-5.0).is_none());
        assert!(timestamp(&json!("soon")).is_none());
        assert!(timestamp(&json!(null)).is_none());
    }
}
