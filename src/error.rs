//! Unified error types.
//!
//! None of these reach the callers of [`MarketDataSync`](crate::sync::MarketDataSync)
//! for connectivity or data-quality reasons: the sync logs them and reports
//! through [`ConnectionState`](crate::ws::ConnectionState) instead.

use thiserror::Error;

/// Top-level error.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] WsError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// WebSocket transport errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WsError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid WebSocket URL: {0}")]
    InvalidUrl(String),

    #[error("Connection closed: code={code:?} reason={reason}")]
    Closed { code: Option<u16>, reason: String },
}

#[cfg(feature = "ws-native")]
impl From<tokio_tungstenite::tungstenite::Error> for WsError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error;
        match err {
            Error::ConnectionClosed | Error::AlreadyClosed => WsError::Closed {
                code: None,
                reason: "Connection closed".to_string(),
            },
            Error::Io(e) => WsError::ConnectionFailed(e.to_string()),
            Error::Url(e) => WsError::InvalidUrl(e.to_string()),
            Error::Http(resp) => {
                WsError::ConnectionFailed(format!("HTTP error: {:?}", resp.status()))
            }
            Error::HttpFormat(e) => WsError::ConnectionFailed(e.to_string()),
            other => WsError::Protocol(other.to_string()),
        }
    }
}

/// Inbound message errors. Scoped to a single message or a single field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Message is not a JSON object")]
    NotAnObject,

    #[error("Field `{field}` has unexpected shape, expected {expected}")]
    UnexpectedShape {
        field: &'static str,
        expected: &'static str,
    },
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        ParseError::InvalidJson(err.to_string())
    }
}
