//! The merged market view and the normalized update that feeds it.

use crate::domain::depth::DepthBook;
use crate::domain::position::PositionBook;
use crate::domain::risk::RiskMetrics;
use crate::domain::trade::state::read_trades;
use crate::domain::trade::{Trade, TradeTape};
use crate::error::ParseError;
use crate::shared::coerce::field;
use crate::shared::serde_util;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Payload keys that carry market data.
pub const DATA_FIELDS: [&str; 4] = ["depth", "trades", "positions", "risk_metrics"];

/// Latest fully-merged view of market state.
///
/// Never mutated in place once published: every applied update produces a new
/// snapshot, which the sync hands out behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketSnapshot {
    pub depth: DepthBook,
    pub trades: TradeTape,
    pub positions: PositionBook,
    pub risk_metrics: RiskMetrics,
    /// Local time the most recent update was applied. Never goes backwards.
    pub last_update: Option<DateTime<Utc>>,
    /// `timestamp` carried on the most recent update envelope that had one.
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl MarketSnapshot {
    /// Empty snapshot whose trade tape keeps at most `trade_history_limit` trades.
    pub fn new(trade_history_limit: usize) -> Self {
        Self {
            trades: TradeTape::new(trade_history_limit),
            ..Default::default()
        }
    }

    /// Produce the snapshot that results from merging `update`.
    ///
    /// Fields present in the update replace the current ones (an empty field
    /// still replaces); absent fields are carried over.
    pub fn apply(&self, update: Update, now: DateTime<Utc>) -> MarketSnapshot {
        let mut next = self.clone();
        if let Some(depth) = update.depth {
            next.depth = depth;
        }
        if let Some(trades) = update.trades {
            next.trades.replace(trades);
        }
        if let Some(positions) = update.positions {
            next.positions = positions;
        }
        if let Some(risk_metrics) = update.risk_metrics {
            next.risk_metrics = risk_metrics;
        }
        if update.server_timestamp.is_some() {
            next.server_timestamp = update.server_timestamp;
        }
        next.last_update = Some(match self.last_update {
            Some(prev) if prev > now => prev,
            _ => now,
        });
        next
    }
}

/// One inbound message, normalized.
///
/// `None` means the field was absent, `null`, or malformed; the latter also
/// leaves an entry in `issues`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub depth: Option<DepthBook>,
    pub trades: Option<Vec<Trade>>,
    pub positions: Option<PositionBook>,
    pub risk_metrics: Option<RiskMetrics>,
    pub server_timestamp: Option<DateTime<Utc>>,
    pub issues: Vec<ParseError>,
}

impl Update {
    /// Normalize a decoded message object in a single pass.
    pub fn from_message(msg: &Map<String, Value>) -> Self {
        let mut issues = Vec::new();
        let depth = field(msg, &["depth"]).and_then(|v| keep(&mut issues, DepthBook::from_wire(v)));
        let trades = field(msg, &["trades"]).and_then(|v| keep(&mut issues, read_trades(v)));
        let positions =
            field(msg, &["positions"]).and_then(|v| keep(&mut issues, PositionBook::from_wire(v)));
        let risk_metrics = field(msg, &["risk_metrics", "riskMetrics"])
            .and_then(|v| keep(&mut issues, RiskMetrics::from_wire(v)));

        Update {
            depth,
            trades,
            positions,
            risk_metrics,
            server_timestamp: msg.get("timestamp").and_then(serde_util::timestamp),
            issues,
        }
    }

    /// `true` if any data field survived normalization.
    pub fn has_data(&self) -> bool {
        self.depth.is_some()
            || self.trades.is_some()
            || self.positions.is_some()
            || self.risk_metrics.is_some()
    }
}

/// `true` if the message carries at least one non-null data field.
pub fn has_data_field(msg: &Map<String, Value>) -> bool {
    DATA_FIELDS
        .iter()
        .chain(&["riskMetrics"])
        .any(|k| field(msg, &[*k]).is_some())
}

fn keep<T>(issues: &mut Vec<ParseError>, result: Result<T, ParseError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            issues.push(e);
            None
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;
    use serde_json::json;

    fn update(value: Value) -> Update {
        Update::from_message(value.as_object().unwrap())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 20, 12, 0, 0).unwrap()
    }

    fn seeded() -> MarketSnapshot {
        MarketSnapshot::new(100).apply(
            update(json!({
                "depth": {"bids": [[100, 2]], "asks": [[101, 3]]},
                "trades": [{"price": 100, "quantity": 1, "timestamp": 1000}],
                "positions": [{"instrument": "BTC-USDT", "quantity": 1}],
                "risk_metrics": {"total_equity": 1000}
            })),
            now(),
        )
    }

    #[test]
    fn test_full_update() {
        let snap = seeded();
        assert_eq!(snap.depth.bid_count(), 1);
        assert_eq!(snap.trades.len(), 1);
        assert_eq!(snap.positions.len(), 1);
        assert_eq!(snap.risk_metrics.total_equity(), Some(Decimal::from(1000)));
        assert_eq!(snap.last_update, Some(now()));
    }

    #[test]
    fn test_absent_fields_retained() {
        let prev = seeded();
        let next = prev.apply(update(json!({"trades": []})), now());
        assert!(next.trades.is_empty());
        assert_eq!(next.depth, prev.depth);
        assert_eq!(next.positions, prev.positions);
        assert_eq!(next.risk_metrics, prev.risk_metrics);
    }

    #[test]
    fn test_null_counts_as_absent() {
        let prev = seeded();
        let u = update(json!({"depth": null, "positions": {}}));
        assert!(u.depth.is_none());
        assert!(u.issues.is_empty());
        let next = prev.apply(u, now());
        assert_eq!(next.depth, prev.depth);
        assert!(next.positions.is_empty());
    }

    #[test]
    fn test_malformed_field_isolated() {
        let prev = seeded();
        let u = update(json!({
            "trades": {"price": 1},
            "depth": {"bids": [[200, 1]], "asks": []}
        }));
        assert_eq!(u.issues.len(), 1);
        assert!(u.trades.is_none());
        let next = prev.apply(u, now());
        assert_eq!(next.trades, prev.trades);
        assert_eq!(next.depth.best_bid().unwrap().price, Decimal::from(200));
    }

    #[test]
    fn test_trade_tape_limit_applies() {
        let prev = MarketSnapshot::new(2);
        let next = prev.apply(
            update(json!({"trades": [
                {"price": 1, "quantity": 1, "timestamp": 1000},
                {"price": 2, "quantity": 1, "timestamp": 2000},
                {"price": 3, "quantity": 1, "timestamp": 3000}
            ]})),
            now(),
        );
        assert_eq!(next.trades.len(), 2);
        assert_eq!(next.trades.latest().unwrap().price, Decimal::from(3));
    }

    #[test]
    fn test_last_update_never_goes_backwards() {
        let prev = seeded();
        let earlier = now() - Duration::seconds(5);
        let next = prev.apply(update(json!({"trades": []})), earlier);
        assert_eq!(next.last_update, Some(now()));
    }

    #[test]
    fn test_server_timestamp() {
        let next = MarketSnapshot::default()
            .apply(update(json!({"timestamp": 1740076800000u64, "trades": []})), now());
        assert_eq!(next.server_timestamp.unwrap().timestamp_millis(), 1_740_076_800_000);
        let after = next.apply(update(json!({"trades": []})), now());
        assert_eq!(after.server_timestamp, next.server_timestamp);
    }

    #[test]
    fn test_risk_metrics_alias() {
        let u = update(json!({"riskMetrics": {"drawdown": "0.1"}}));
        assert_eq!(u.risk_metrics.unwrap().drawdown(), Some(Decimal::new(1, 1)));
    }

    #[test]
    fn test_has_data_field() {
        assert!(has_data_field(json!({"depth": {}}).as_object().unwrap()));
        assert!(!has_data_field(json!({"depth": null, "type": "pong"}).as_object().unwrap()));
    }
}
