//! Trade domain: execution records and the rolling trade tape.

mod convert;
pub mod state;
pub mod wire;

use crate::shared::{Instrument, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use state::TradeTape;

/// A trade execution record.
///
/// `price` and `quantity` fall back to zero when the feed sends something
/// unreadable; the remaining fields are optional because older broadcasters
/// omit them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trade {
    pub price: Decimal,
    pub quantity: Decimal,
    pub timestamp: Option<DateTime<Utc>>,
    pub is_buyer_maker: bool,
    pub instrument: Option<Instrument>,
    pub trade_id: Option<String>,
}

impl Trade {
    /// Price times quantity. `None` if the product overflows.
    pub fn notional(&self) -> Option<Decimal> {
        self.price.checked_mul(self.quantity)
    }

    /// `true` when the aggressor was the seller.
    pub fn is_sell(&self) -> bool {
        self.is_buyer_maker
    }

    /// The book side the aggressor took liquidity from.
    pub fn taker_side(&self) -> Side {
        if self.is_buyer_maker {
            Side::Ask
        } else {
            Side::Bid
        }
    }
}
