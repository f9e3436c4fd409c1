//! Depth domain: aggregated bid/ask levels.

pub mod state;
pub mod wire;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use state::DepthBook;

/// A single aggregated price level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }

    /// Price times quantity. `None` if the product overflows.
    pub fn notional(&self) -> Option<Decimal> {
        self.price.checked_mul(self.quantity)
    }
}
