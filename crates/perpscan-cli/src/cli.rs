//! CLI argument definitions for perpscan.
//!
//! One command: run a screening request against a single venue and print
//! the JSON response.
//!
//! # Examples
//!
//! ```bash
//! # Most negative funding on Bybit, stock thresholds
//! perpscan --exchange bybit --direction negative --pretty
//!
//! # Positive funding on Binance above 0.01% with a small page
//! perpscan --exchange binance --direction positive --funding-cut 0.0001 --limit 10
//! ```

use clap::Parser;

/// Funding-rate screener for USDT perpetual futures.
#[derive(Debug, Parser)]
#[command(name = "perpscan", version, about = "Funding-rate screener for USDT perpetual futures")]
pub struct Cli {
    /// Venue to screen: bybit or binance.
    #[arg(long, default_value = "bybit")]
    pub exchange: String,

    /// Funding sign to screen for: negative or positive.
    #[arg(long, default_value = "negative")]
    pub direction: String,

    /// Funding-rate cut as a signed fraction (-0.0002 means -0.02%).
    /// Defaults per direction.
    #[arg(long)]
    pub funding_cut: Option<f64>,

    /// Minimum base-asset market cap in USD.
    #[arg(long)]
    pub min_market_cap_usd: Option<f64>,

    /// Minimum 24h turnover in USD.
    #[arg(long)]
    pub min_turnover_24h_usd: Option<f64>,

    /// Maximum number of rows (clamped to 1..=50).
    #[arg(long)]
    pub limit: Option<u32>,

    /// Keep candidates whose market cap is unknown to the index.
    #[arg(long)]
    pub allow_unknown_market_cap: bool,

    /// Pretty-print the JSON response.
    #[arg(long)]
    pub pretty: bool,
}
