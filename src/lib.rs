//! # market-sync
//!
//! Live market-data synchronization over a reconnecting WebSocket.
//!
//! ## Architecture
//!
//! The crate is organized in layers:
//!
//! 1. **Core**: shared newtypes, lenient coercion, domain models (depth, trades, positions, risk)
//! 2. **Snapshot**: the immutable `MarketSnapshot` and the partial-update merge
//! 3. **WebSocket**: messages, connection state, config, and the `Connector` seam
//!    (`tokio-tungstenite` behind the `ws-native` feature)
//! 4. **Sync**: `MarketDataSync`, the background task that keeps a snapshot current
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use market_sync::prelude::*;
//!
//! let sync = MarketDataSync::new(WsConfig::from_env()?);
//! sync.on_snapshot_change(|snap| {
//!     println!("best bid: {:?}", snap.depth.best_bid());
//! });
//! sync.subscribe(["depth", "trades", "positions", "pnl"]);
//! sync.start();
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// Shared newtypes and lenient value coercion.
pub mod shared;

/// Domain modules (vertical slices): types, wire types, conversions, state.
pub mod domain;

/// Error types.
pub mod error;

/// Default endpoint URLs.
pub mod network;

// ── Layer 2: Snapshot ────────────────────────────────────────────────────────

/// The aggregate market view and partial-update merge.
pub mod snapshot;

// ── Layer 3: WebSocket ───────────────────────────────────────────────────────

/// WebSocket layer: messages, state, config, transport.
pub mod ws;

// ── Layer 4: Sync ────────────────────────────────────────────────────────────

/// `MarketDataSync`, the primary entry point.
pub mod sync;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Shared newtypes
    pub use crate::shared::{Channel, Instrument, Side};

    // Domain types
    pub use crate::domain::depth::{DepthBook, PriceLevel};
    pub use crate::domain::position::{Position, PositionBook};
    pub use crate::domain::risk::RiskMetrics;
    pub use crate::domain::trade::{Trade, TradeTape};

    // Snapshot
    pub use crate::snapshot::MarketSnapshot;

    // Errors
    pub use crate::error::{ParseError, SyncError, WsError};

    // Network
    pub use crate::network::{BROADCAST_WS_URL, DEFAULT_WS_URL};

    // WebSocket types
    pub use crate::ws::{Backoff, ConnectionState, ServerError, WsConfig};

    // Sync
    pub use crate::sync::{ListenerId, MarketDataSync};
}
