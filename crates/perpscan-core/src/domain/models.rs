use serde::{Deserialize, Serialize};

use crate::{Symbol, ValidationError};

/// Supported derivatives venues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeId {
    Bybit,
    Binance,
}

impl ExchangeId {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match input.trim().to_ascii_lowercase().as_str() {
            "bybit" => Ok(Self::Bybit),
            "binance" => Ok(Self::Binance),
            other => Err(ValidationError::InvalidExchange {
                value: other.to_owned(),
            }),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bybit => "bybit",
            Self::Binance => "binance",
        }
    }
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Funding-rate sign the caller is screening for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Negative,
    Positive,
}

impl Direction {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match input.trim().to_ascii_lowercase().as_str() {
            "negative" => Ok(Self::Negative),
            "positive" => Ok(Self::Positive),
            other => Err(ValidationError::InvalidDirection {
                value: other.to_owned(),
            }),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Negative => "negative",
            Self::Positive => "positive",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized contract listing entry, rebuilt from upstream on every request.
///
/// Field vocabularies differ per venue (`PERPETUAL` vs `LinearPerpetual`,
/// `TRADING` vs `Trading`); each adapter applies its own tradability
/// predicate over this shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub contract_type: String,
    pub status: String,
}

/// Bulk funding/price snapshot for one contract.
#[derive(Debug, Clone, PartialEq)]
pub struct FundingSnapshot {
    pub symbol: Symbol,
    /// Signed fraction: -0.0002 means -0.02% per funding interval.
    pub funding_rate: f64,
    /// ISO-8601 UTC at second precision, or the sentinel `"-"`.
    pub next_funding_utc: String,
    pub mark_price: Option<f64>,
}

/// 24h traded notional for one contract, USD-denominated.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnoverSnapshot {
    pub symbol: Symbol,
    pub quote_volume_24h: f64,
}

/// Market-cap index entry keyed by upper-cased base asset symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketCapEntry {
    pub symbol: String,
    pub display_name: String,
    /// Truncated to a whole USD amount.
    pub market_cap_usd: i64,
}

/// Immutable per-request filter set, echoed back in the response.
///
/// The alert thresholds are carried through for the caller's benefit; no
/// alerting logic consumes them yet and every row's `alert` field stays
/// empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenerFilters {
    pub exchange: ExchangeId,
    pub direction: Direction,

    pub funding_cut: f64,
    pub min_market_cap_usd: f64,
    pub min_turnover_24h_usd: f64,
    pub limit: u32,

    pub alert_funding_cut: f64,
    pub alert_turnover_24h_usd: f64,
}

impl ScreenerFilters {
    /// Default thresholds per direction, matching the service's stock
    /// configuration: the funding cut flips sign with the direction.
    pub fn defaults_for(exchange: ExchangeId, direction: Direction) -> Self {
        let (funding_cut, alert_funding_cut) = match direction {
            Direction::Negative => (-0.0001, -0.01),
            Direction::Positive => (0.000_05, 0.002),
        };

        Self {
            exchange,
            direction,
            funding_cut,
            min_market_cap_usd: 100_000_000.0,
            min_turnover_24h_usd: 2_000_000.0,
            limit: 30,
            alert_funding_cut,
            alert_turnover_24h_usd: 10_000_000.0,
        }
    }

    /// Row budget the engine honors: never below one.
    pub fn effective_limit(&self) -> usize {
        self.limit.max(1) as usize
    }
}

/// One screened contract in wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenerRow {
    pub symbol: String,
    pub name: String,
    pub ticker: String,

    pub funding: f64,

    pub open_interest: Option<f64>,
    pub oi_value_usd: Option<f64>,

    pub market_cap: Option<i64>,
    pub next_funding: String,
    pub mark_price: Option<f64>,
    pub turnover_24h: Option<f64>,

    pub alert: String,
}

/// Complete screening result for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenerResponse {
    pub updated_at_utc: String,
    pub filters: ScreenerFilters,
    pub count: usize,
    pub rows: Vec<ScreenerRow>,
}
