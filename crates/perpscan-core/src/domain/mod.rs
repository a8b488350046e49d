//! Validated domain types for funding-rate screening.
//!
//! Upstream payloads are loosely typed; everything in this module is the
//! normalized, validated shape the engine works with. Construction rejects
//! invalid states, and the wire records (`ScreenerRow`, `ScreenerResponse`)
//! carry full serde support.

mod models;
mod symbol;
mod timestamp;

pub use models::{
    Direction, ExchangeId, FundingSnapshot, Instrument, MarketCapEntry, ScreenerFilters,
    ScreenerResponse, ScreenerRow, TurnoverSnapshot,
};
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
