//! Network URL constants.

/// Default WebSocket URL (dashboard API server).
pub const DEFAULT_WS_URL: &str = "ws://localhost:8000/ws";

/// WebSocket URL of the standalone broadcaster deployment.
pub const BROADCAST_WS_URL: &str = "ws://localhost:8765";
