//! Position domain: open positions keyed by instrument.

mod convert;
pub mod state;
pub mod wire;

use crate::shared::Instrument;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use state::PositionBook;

/// An open position in one instrument.
///
/// `quantity` is signed: negative for shorts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub instrument: Instrument,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub current_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    pub liquidation_price: Option<Decimal>,
    pub margin_ratio: Decimal,
    pub last_update: Option<DateTime<Utc>>,
}

impl Position {
    /// Absolute exposure at the current price. `None` on overflow.
    pub fn notional(&self) -> Option<Decimal> {
        self.quantity
            .checked_mul(self.current_price)
            .map(|n| n.abs())
    }

    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    pub fn is_short(&self) -> bool {
        self.quantity.is_sign_negative() && !self.quantity.is_zero()
    }

    /// Realized plus unrealized P&L. `None` on overflow.
    pub fn total_pnl(&self) -> Option<Decimal> {
        self.realized_pnl.checked_add(self.unrealized_pnl)
    }
}
