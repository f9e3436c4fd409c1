//! Conversions from wire types to domain types for positions.

use super::wire::WirePosition;
use super::Position;
use crate::shared::{coerce, serde_util, Instrument};

impl WirePosition {
    /// Convert into a [`Position`].
    ///
    /// `fallback` names the instrument when the record itself does not (the
    /// map form of the payload keys records by instrument). Returns `None` if
    /// neither is available.
    pub fn into_position(self, fallback: Option<&str>) -> Option<Position> {
        let instrument = coerce::string(&self.instrument)
            .or_else(|| fallback.map(str::to_string))
            .filter(|s| !s.is_empty())?;

        Some(Position {
            instrument: Instrument::from(instrument),
            quantity: coerce::decimal_or_zero(Some(&self.quantity)),
            entry_price: coerce::decimal_or_zero(Some(&self.entry_price)),
            current_price: coerce::decimal_or_zero(Some(&self.current_price)),
            unrealized_pnl: coerce::decimal_or_zero(Some(&self.unrealized_pnl)),
            realized_pnl: coerce::decimal_or_zero(Some(&self.realized_pnl)),
            liquidation_price: coerce::decimal(&self.liquidation_price),
            margin_ratio: coerce::decimal_or_zero(Some(&self.margin_ratio)),
            last_update: serde_util::timestamp(&self.last_update),
        })
    }
}
