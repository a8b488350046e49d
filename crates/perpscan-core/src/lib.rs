//! # Perpscan Core
//!
//! Funding-rate screening engine for USDT-settled perpetual futures.
//!
//! ## Overview
//!
//! This crate provides the aggregation pipeline behind the screener:
//!
//! - **Venue adapters** normalizing Bybit/Binance listings, funding and
//!   turnover snapshots, and open interest into one shape
//! - **Market-cap index cache** over a paginated third-party index, with
//!   TTL, single-flight rebuilds, and stale-if-error fallback
//! - **Filter policy** for funding-direction cuts and response ordering
//! - **Enrichment pool** fetching open interest under a concurrency budget
//! - **Screener engine** orchestrating one request/response cycle
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Venue adapters (Bybit, Binance, CoinGecko) |
//! | [`circuit_breaker`] | Circuit breaker for upstream calls |
//! | [`clock`] | Injectable time source for expiry logic |
//! | [`config`] | Opaque settings object consumed by the engine |
//! | [`data_source`] | Exchange adapter contract and source errors |
//! | [`domain`] | Validated domain and wire types |
//! | [`engine`] | Request orchestration |
//! | [`enrich`] | Bounded-concurrency open-interest enrichment |
//! | [`error`] | Core error types |
//! | [`filter`] | Funding-direction predicates and ordering |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`parse`] | Defensive parsing of loosely-typed upstream fields |
//! | [`retry`] | Reusable retry policy |
//! | [`symbol_index`] | TTL-cached market-cap index |
//! | [`throttle`] | Adapter-side request pacing |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use perpscan_core::{
//!     Direction, ExchangeId, ReqwestHttpClient, ScreenerConfig, ScreenerEngine,
//!     ScreenerFilters,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = ScreenerEngine::new(
//!         ScreenerConfig::default(),
//!         Arc::new(ReqwestHttpClient::new()),
//!     );
//!
//!     let filters = ScreenerFilters::defaults_for(ExchangeId::Bybit, Direction::Negative);
//!     let response = engine.screen(&filters).await?;
//!
//!     for row in &response.rows {
//!         println!("{}  {:+.4}%", row.symbol, row.funding * 100.0);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Failure Containment
//!
//! The market-cap index never fails a request: a rebuild that cannot reach
//! its upstream serves the previous value past expiry, or an empty index if
//! none was ever built. Open-interest enrichment degrades per row. A failed
//! primary venue fetch follows that venue's [`data_source::FailureMode`]:
//! Binance surfaces the error, Bybit answers with an empty result.

pub mod adapters;
pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod engine;
pub mod enrich;
pub mod error;
pub mod filter;
pub mod http_client;
pub mod parse;
pub mod retry;
pub mod symbol_index;
pub mod throttle;

// Re-export commonly used types at crate root for convenience

// Adapter implementations
pub use adapters::{BinanceAdapter, BybitAdapter, CoinGeckoAdapter};

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

// Clocks
pub use clock::{Clock, ManualClock, SystemClock};

// Configuration
pub use config::ScreenerConfig;

// Exchange source contract
pub use data_source::{
    ExchangeSource, FailureMode, SourceError, SourceErrorKind, Universe,
};

// Domain types
pub use domain::{
    Direction, ExchangeId, FundingSnapshot, Instrument, MarketCapEntry, ScreenerFilters,
    ScreenerResponse, ScreenerRow, Symbol, TurnoverSnapshot, UtcDateTime,
};

// Engine
pub use engine::ScreenerEngine;

// Enrichment
pub use enrich::enrich_rows;

// Error types
pub use error::{CoreError, ValidationError};

// Filter policy
pub use filter::{compare_for_ordering, passes_direction};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpRequest, HttpResponse, NoopHttpClient, ReqwestHttpClient,
};

// Retry policy
pub use retry::{Backoff, RetryPolicy};

// Market-cap index cache
pub use symbol_index::{IndexKey, SymbolIndex, SymbolIndexCache};

// Throttling
pub use throttle::SelfThrottle;
