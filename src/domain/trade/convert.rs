//! Conversions from wire types to domain types for trades.

use super::wire::WireTrade;
use super::Trade;
use crate::shared::{coerce, serde_util, Instrument};

impl From<WireTrade> for Trade {
    fn from(t: WireTrade) -> Self {
        Self {
            price: coerce::decimal_or_zero(Some(&t.price)),
            quantity: coerce::decimal_or_zero(Some(&t.quantity)),
            timestamp: serde_util::timestamp(&t.timestamp),
            is_buyer_maker: coerce::boolean(&t.is_buyer_maker).unwrap_or(false),
            instrument: coerce::string(&t.instrument).map(Instrument::from),
            trade_id: coerce::string(&t.trade_id),
        }
    }
}
