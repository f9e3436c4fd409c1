//! Domain modules organized as vertical slices.
//!
//! Each sub-module contains:
//! - `mod.rs`: Rich domain types
//! - `wire.rs`: Raw serde structs matching the feed's loosely-typed payloads
//! - `convert.rs`: Lenient conversions from wire to domain types
//! - `state.rs`: State containers built from a whole payload field

pub mod depth;
pub mod position;
pub mod risk;
pub mod trade;
