//! Risk domain: account-level risk figures.

use crate::error::ParseError;
use crate::shared::coerce;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Flat record of scalar risk figures.
///
/// The set of keys is owned by the backend, so the record is kept open;
/// values that are not numeric are dropped on ingest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskMetrics {
    values: BTreeMap<String, Decimal>,
}

impl RiskMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a raw `risk_metrics` value.
    pub fn from_wire(value: &Value) -> Result<Self, ParseError> {
        let map = value.as_object().ok_or(ParseError::UnexpectedShape {
            field: "risk_metrics",
            expected: "object of numeric figures",
        })?;

        let values = map
            .iter()
            .filter_map(|(k, v)| coerce::decimal(v).map(|d| (k.clone(), d)))
            .collect();
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<Decimal> {
        self.values.get(key).copied()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Decimal) {
        self.values.insert(key.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn total_equity(&self) -> Option<Decimal> {
        self.get("total_equity")
    }

    pub fn used_margin(&self) -> Option<Decimal> {
        self.get("used_margin")
    }

    pub fn available_margin(&self) -> Option<Decimal> {
        self.get("available_margin")
    }

    pub fn margin_ratio(&self) -> Option<Decimal> {
        self.get("margin_ratio")
    }

    pub fn daily_pnl(&self) -> Option<Decimal> {
        self.get("daily_pnl")
    }

    pub fn drawdown(&self) -> Option<Decimal> {
        self.get("drawdown")
    }

    /// 95% value-at-risk.
    pub fn var_95(&self) -> Option<Decimal> {
        self.get("var_95")
    }

    pub fn max_position_size(&self) -> Option<Decimal> {
        self.get("max_position_size")
    }

    /// Largest position's share of total exposure, 0..=1.
    pub fn position_concentration(&self) -> Option<Decimal> {
        self.get("position_concentration")
    }
}
