//! Shared newtypes and utilities used across all domain modules.
//!
//! These types are serialization-transparent: they serialize/deserialize identically
//! to the raw format the feed sends, so they can be used directly in wire types
//! without conversion overhead.

pub mod coerce;
pub mod serde_util;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

// ─── Instrument ──────────────────────────────────────────────────────────────

/// Newtype for instrument symbols (e.g. `"BTC-USDT"`).
///
/// Ordered so it can key the position book deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instrument(String);

impl Instrument {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Instrument {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Instrument {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl FromStr for Instrument {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Instrument(s.to_string()))
    }
}

impl Serialize for Instrument {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Instrument {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Instrument(s))
    }
}

// ─── Channel ─────────────────────────────────────────────────────────────────

/// A named subscription topic on the feed (`trades`, `positions`, `depth`, `pnl`, …).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(String);

impl Channel {
    pub const TRADES: &'static str = "trades";
    pub const POSITIONS: &'static str = "positions";
    pub const DEPTH: &'static str = "depth";
    pub const PNL: &'static str = "pnl";

    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Channel {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Channel {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&String> for Channel {
    fn from(s: &String) -> Self {
        Self(s.clone())
    }
}

// ─── Side ────────────────────────────────────────────────────────────────────

/// Book side: Bid (buy) or Ask (sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Side::Bid => write!(f, "Buy"),
            Side::Ask => write!(f, "Sell"),
        }
    }
}
