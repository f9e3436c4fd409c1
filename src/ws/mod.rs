//! WebSocket layer: messages, connection state, configuration.
//!
//! The transport itself sits behind the [`transport::Connector`] seam:
//! - `ws-native` feature → `tokio-tungstenite` (native.rs)
//! - tests and embedders can plug in any other sink/stream pair.
//!
//! This module defines the shared message/state/config types.

pub mod subscriptions;
pub mod transport;

#[cfg(feature = "ws-native")]
pub mod native;

use crate::error::{ParseError, SyncError};
use crate::shared::{Channel, Instrument};
use crate::snapshot::{has_data_field, Update};
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;

pub use subscriptions::{SubscriptionDiff, SubscriptionSet};

/// Trades kept on the tape unless configured otherwise.
pub const DEFAULT_TRADE_HISTORY: usize = 100;

// ─── Outbound messages ───────────────────────────────────────────────────────

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum MessageOut {
    #[serde(rename = "subscribe")]
    Subscribe {
        channels: Vec<Channel>,
        #[serde(skip_serializing_if = "Option::is_none")]
        instrument: Option<Instrument>,
    },
    #[serde(rename = "unsubscribe")]
    Unsubscribe {
        channels: Vec<Channel>,
        #[serde(skip_serializing_if = "Option::is_none")]
        instrument: Option<Instrument>,
    },
}

impl MessageOut {
    pub fn subscribe(channels: Vec<Channel>, instrument: Option<Instrument>) -> Self {
        MessageOut::Subscribe {
            channels,
            instrument,
        }
    }

    pub fn unsubscribe(channels: Vec<Channel>, instrument: Option<Instrument>) -> Self {
        MessageOut::Unsubscribe {
            channels,
            instrument,
        }
    }

    pub fn channels(&self) -> &[Channel] {
        match self {
            MessageOut::Subscribe { channels, .. } | MessageOut::Unsubscribe { channels, .. } => {
                channels
            }
        }
    }
}

// ─── Inbound messages ────────────────────────────────────────────────────────

/// A classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageIn {
    /// Market data, normalized.
    MarketUpdate(Update),
    /// The payload carried an application-level error.
    ServerError(ServerError),
    /// Anything else (`pong`, `subscribed`, ...). Carries the `type`, if any.
    Ignored(Option<String>),
}

impl MessageIn {
    /// Decode and classify one text frame.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(msg) = value else {
            return Err(ParseError::NotAnObject);
        };

        if let Some(err) = msg.get("error").filter(|v| !v.is_null()) {
            return Ok(MessageIn::ServerError(ServerError::from_value(err)));
        }

        let kind = msg.get("type").and_then(Value::as_str);
        match kind {
            Some("market_update") => Ok(MessageIn::MarketUpdate(Update::from_message(&msg))),
            Some("error") => {
                let raw = msg
                    .get("message")
                    .cloned()
                    .unwrap_or_else(|| Value::Object(msg.clone()));
                Ok(MessageIn::ServerError(ServerError::from_value(&raw)))
            }
            None if has_data_field(&msg) => {
                Ok(MessageIn::MarketUpdate(Update::from_message(&msg)))
            }
            other => Ok(MessageIn::Ignored(other.map(str::to_string))),
        }
    }
}

/// Application-level error reported by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerError {
    pub message: String,
    /// The `error` value exactly as received.
    pub raw: Value,
}

impl ServerError {
    pub fn from_value(raw: &Value) -> Self {
        let message = match raw {
            Value::String(s) => s.clone(),
            Value::Object(map) => match map.get("message").and_then(Value::as_str) {
                Some(m) => m.to_string(),
                None => raw.to_string(),
            },
            other => other.to_string(),
        };
        Self {
            message,
            raw: raw.clone(),
        }
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

// ─── ConnectionState ─────────────────────────────────────────────────────────

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not started, or stopped.
    Idle,
    Connecting,
    Connected,
    /// Closed cleanly or the stream ended; a reconnect is pending.
    Disconnected,
    /// Transport failure, or the reconnect bound was exhausted.
    Error,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Idle => "Idle",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Error => "Error",
        };
        write!(f, "{}", s)
    }
}

// ─── Backoff ─────────────────────────────────────────────────────────────────

/// Delay strategy between reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// The same delay before every attempt.
    Fixed(Duration),
    /// `base * 2^(attempt-1)` plus up to 500ms of jitter, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, max } => {
                let exp = attempt.saturating_sub(1).min(10);
                let jitter = Duration::from_millis(rand::random::<u64>() % 500);
                base.saturating_mul(1u32 << exp)
                    .saturating_add(jitter)
                    .min(max)
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Fixed(Duration::from_millis(3000))
    }
}

// ─── WsConfig ────────────────────────────────────────────────────────────────

/// Configuration for the sync's connection.
#[derive(Debug, Clone, PartialEq)]
pub struct WsConfig {
    pub url: String,
    pub backoff: Backoff,
    /// `None` retries forever.
    pub max_reconnect_attempts: Option<u32>,
    pub connect_timeout: Duration,
    /// How long `stop()` lets the task close the socket before aborting it.
    pub shutdown_grace: Duration,
    pub trade_history_limit: usize,
    /// Sent along with every subscribe message when set.
    pub instrument: Option<Instrument>,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: crate::network::DEFAULT_WS_URL.to_string(),
            backoff: Backoff::default(),
            max_reconnect_attempts: None,
            connect_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(5),
            trade_history_limit: DEFAULT_TRADE_HISTORY,
            instrument: None,
        }
    }
}

impl WsConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Defaults overridden by `MARKET_SYNC_*` environment variables.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `MARKET_SYNC_WS_URL` | `url` |
    /// | `MARKET_SYNC_RECONNECT_DELAY_MS` | fixed delay, or exponential base |
    /// | `MARKET_SYNC_MAX_RECONNECT_MS` | switches to exponential backoff with this cap |
    /// | `MARKET_SYNC_MAX_RECONNECT_ATTEMPTS` | `max_reconnect_attempts` (`0` = unbounded) |
    /// | `MARKET_SYNC_TRADE_HISTORY` | `trade_history_limit` |
    /// | `MARKET_SYNC_INSTRUMENT` | `instrument` |
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SyncError> {
        let mut config = Self::default();

        if let Some(url) = lookup("MARKET_SYNC_WS_URL").filter(|u| !u.trim().is_empty()) {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(SyncError::Config(format!(
                    "MARKET_SYNC_WS_URL must be a ws:// or wss:// URL, got {}",
                    url
                )));
            }
            config.url = url;
        }

        let delay = parse_var::<u64>(&lookup, "MARKET_SYNC_RECONNECT_DELAY_MS")?;
        let cap = parse_var::<u64>(&lookup, "MARKET_SYNC_MAX_RECONNECT_MS")?;
        config.backoff = match (delay, cap) {
            (delay, Some(max)) => Backoff::Exponential {
                base: Duration::from_millis(delay.unwrap_or(1000)),
                max: Duration::from_millis(max),
            },
            (Some(delay), None) => Backoff::Fixed(Duration::from_millis(delay)),
            (None, None) => config.backoff,
        };

        if let Some(attempts) = parse_var::<u32>(&lookup, "MARKET_SYNC_MAX_RECONNECT_ATTEMPTS")? {
            config.max_reconnect_attempts = (attempts > 0).then_some(attempts);
        }
        if let Some(limit) = parse_var::<usize>(&lookup, "MARKET_SYNC_TRADE_HISTORY")? {
            config.trade_history_limit = limit;
        }
        config.instrument = lookup("MARKET_SYNC_INSTRUMENT")
            .filter(|s| !s.trim().is_empty())
            .map(|s| Instrument::new(s.trim()));

        Ok(config)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, SyncError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| SyncError::Config(format!("{}={}: {}", key, raw, e))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_subscribe_wire_format() {
        let msg = MessageOut::subscribe(vec![Channel::from("trades"), Channel::from("depth")], None);
        let parsed: Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(parsed, json!({"type": "subscribe", "channels": ["trades", "depth"]}));
    }

    #[test]
    fn test_subscribe_with_instrument() {
        let msg = MessageOut::subscribe(vec![Channel::from("depth")], Some(Instrument::from("ETH-USDT")));
        let parsed: Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(parsed["instrument"], "ETH-USDT");
    }

    #[test]
    fn test_unsubscribe_wire_format() {
        let msg = MessageOut::unsubscribe(vec![Channel::from("pnl")], None);
        let parsed: Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(parsed, json!({"type": "unsubscribe", "channels": ["pnl"]}));
        assert_eq!(msg.channels(), &[Channel::from("pnl")]);
    }

    #[test]
    fn test_parse_market_update() {
        let msg = MessageIn::parse(
            r#"{"type":"market_update","timestamp":1740076800000,"depth":{"bids":[[100,2]],"asks":[[101,3]]}}"#,
        )
        .unwrap();
        match msg {
            MessageIn::MarketUpdate(update) => {
                assert_eq!(update.depth.unwrap().bid_count(), 1);
                assert!(update.server_timestamp.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_bare_data_payload() {
        let msg = MessageIn::parse(r#"{"depth":{"bids":[],"asks":[]},"trades":[]}"#).unwrap();
        assert!(matches!(msg, MessageIn::MarketUpdate(_)));
    }

    #[test]
    fn test_parse_server_error() {
        let msg = MessageIn::parse(r#"{"error":"Shared memory not found"}"#).unwrap();
        match msg {
            MessageIn::ServerError(err) => {
                assert_eq!(err.message, "Shared memory not found");
                assert_eq!(err.raw, json!("Shared memory not found"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_server_error_object() {
        let msg = MessageIn::parse(r#"{"error":{"message":"bad","code":7}}"#).unwrap();
        match msg {
            MessageIn::ServerError(err) => assert_eq!(err.message, "bad"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_type() {
        let msg = MessageIn::parse(r#"{"type":"error","message":"unknown channel"}"#).unwrap();
        match msg {
            MessageIn::ServerError(err) => assert_eq!(err.message, "unknown channel"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_null_error_is_not_an_error() {
        let msg = MessageIn::parse(r#"{"type":"market_update","error":null,"trades":[]}"#).unwrap();
        assert!(matches!(msg, MessageIn::MarketUpdate(_)));
    }

    #[test]
    fn test_parse_ignored_types() {
        assert_eq!(
            MessageIn::parse(r#"{"type":"pong"}"#).unwrap(),
            MessageIn::Ignored(Some("pong".to_string()))
        );
        assert_eq!(MessageIn::parse(r#"{}"#).unwrap(), MessageIn::Ignored(None));
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            MessageIn::parse("not json"),
            Err(ParseError::InvalidJson(_))
        ));
        assert_eq!(MessageIn::parse("[1,2]"), Err(ParseError::NotAnObject));
    }

    #[test]
    fn test_fixed_backoff() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(1), Duration::from_secs(3));
        assert_eq!(backoff.delay(50), Duration::from_secs(3));
    }

    #[test]
    fn test_exponential_backoff_caps() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(1000),
            max: Duration::from_millis(10_000),
        };
        let first = backoff.delay(1);
        assert!(first >= Duration::from_millis(1000) && first < Duration::from_millis(1500));
        let third = backoff.delay(3);
        assert!(third >= Duration::from_millis(4000) && third < Duration::from_millis(4500));
        assert_eq!(backoff.delay(30), Duration::from_millis(10_000));
    }

    #[test]
    fn test_config_defaults() {
        let config = WsConfig::default();
        assert_eq!(config.url, "ws://localhost:8000/ws");
        assert_eq!(config.backoff, Backoff::Fixed(Duration::from_secs(3)));
        assert_eq!(config.max_reconnect_attempts, None);
        assert_eq!(config.trade_history_limit, 100);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_config_from_lookup() {
        let config = WsConfig::from_lookup(lookup(&[
            ("MARKET_SYNC_WS_URL", "ws://localhost:8765"),
            ("MARKET_SYNC_RECONNECT_DELAY_MS", "500"),
            ("MARKET_SYNC_MAX_RECONNECT_MS", "8000"),
            ("MARKET_SYNC_MAX_RECONNECT_ATTEMPTS", "10"),
            ("MARKET_SYNC_TRADE_HISTORY", "25"),
            ("MARKET_SYNC_INSTRUMENT", " BTC-USDT "),
        ]))
        .unwrap();
        assert_eq!(config.url, "ws://localhost:8765");
        assert_eq!(
            config.backoff,
            Backoff::Exponential {
                base: Duration::from_millis(500),
                max: Duration::from_millis(8000)
            }
        );
        assert_eq!(config.max_reconnect_attempts, Some(10));
        assert_eq!(config.trade_history_limit, 25);
        assert_eq!(config.instrument, Some(Instrument::from("BTC-USDT")));
    }

    #[test]
    fn test_config_fixed_delay_and_unbounded_attempts() {
        let config = WsConfig::from_lookup(lookup(&[
            ("MARKET_SYNC_RECONNECT_DELAY_MS", "1500"),
            ("MARKET_SYNC_MAX_RECONNECT_ATTEMPTS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.backoff, Backoff::Fixed(Duration::from_millis(1500)));
        assert_eq!(config.max_reconnect_attempts, None);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(matches!(
            WsConfig::from_lookup(lookup(&[("MARKET_SYNC_TRADE_HISTORY", "many")])),
            Err(SyncError::Config(_))
        ));
        assert!(matches!(
            WsConfig::from_lookup(lookup(&[("MARKET_SYNC_WS_URL", "http://localhost")])),
            Err(SyncError::Config(_))
        ));
    }
}
