//! Position state container.

use super::wire::WirePosition;
use super::Position;
use crate::error::ParseError;
use crate::shared::Instrument;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::BTreeMap;

/// Open positions keyed by instrument.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionBook {
    positions: BTreeMap<Instrument, Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a raw `positions` value.
    ///
    /// Accepts a list of records or a map of instrument to record. Records
    /// that are not objects, or that name no instrument, are skipped.
    pub fn from_wire(value: &Value) -> Result<Self, ParseError> {
        let entries: Vec<(Option<&str>, &Value)> = match value {
            Value::Array(records) => records.iter().map(|r| (None, r)).collect(),
            Value::Object(map) => map.iter().map(|(k, r)| (Some(k.as_str()), r)).collect(),
            _ => {
                return Err(ParseError::UnexpectedShape {
                    field: "positions",
                    expected: "array or map of position records",
                })
            }
        };

        let mut book = Self::new();
        let mut skipped = 0usize;
        for (key, record) in entries {
            let position = match record {
                Value::Object(map) => WirePosition::from_map(map).into_position(key),
                _ => None,
            };
            match position {
                Some(position) => book.insert(position),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::debug!("Skipped {} unreadable position record(s)", skipped);
        }
        Ok(book)
    }

    /// Insert or replace the position for its instrument.
    pub fn insert(&mut self, position: Position) {
        self.positions.insert(position.instrument.clone(), position);
    }

    pub fn get(&self, instrument: &Instrument) -> Option<&Position> {
        self.positions.get(instrument)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn instruments(&self) -> impl Iterator<Item = &Instrument> {
        self.positions.keys()
    }

    /// Sum of unrealized P&L. `None` if the sum overflows.
    pub fn total_unrealized_pnl(&self) -> Option<Decimal> {
        self.positions
            .values()
            .try_fold(Decimal::ZERO, |acc, p| acc.checked_add(p.unrealized_pnl))
    }

    /// Sum of absolute exposure. `None` if any term or the sum overflows.
    pub fn total_notional(&self) -> Option<Decimal> {
        self.positions
            .values()
            .try_fold(Decimal::ZERO, |acc, p| acc.checked_add(p.notional()?))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
