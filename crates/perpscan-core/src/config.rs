use std::time::Duration;

use serde::Deserialize;

/// Opaque settings object consumed by the engine and its adapters.
///
/// How these values reach the process (env, file, hardcoded) is the caller's
/// concern; the core only ever sees the finished struct.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ScreenerConfig {
    pub bybit_base_url: String,
    pub binance_base_url: String,
    pub index_base_url: String,

    /// Per-upstream-call timeout in milliseconds; there is no whole-request
    /// deadline.
    pub request_timeout_ms: u64,

    /// Attempt budget for single-symbol open-interest lookups.
    pub oi_retry_attempts: u32,
    /// Linear backoff base for open-interest retries.
    pub oi_backoff_base_ms: u64,
    /// Worker budget for open-interest enrichment (venues may override down
    /// to sequential).
    pub oi_concurrency: usize,
    /// Self-throttle quota for metered open-interest paths: calls per window.
    pub oi_throttle_limit: u32,
    pub oi_throttle_window_ms: u64,

    /// Attempt budget per market-cap index page.
    pub index_retry_attempts: u32,
    /// Linear backoff base for index page retries.
    pub index_backoff_base_ms: u64,
    /// Market-cap index cache lifetime.
    pub index_cache_ttl_secs: u64,
    /// Pages fetched per index build; one page keeps 429 exposure low.
    pub index_pages: u32,
    pub index_per_page: u32,

    /// Keep candidates whose base asset is missing from the market-cap
    /// index (their `market_cap` serializes as null).
    pub allow_unknown_market_cap: bool,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            bybit_base_url: String::from("https://api.bybit.com"),
            binance_base_url: String::from("https://fapi.binance.com"),
            index_base_url: String::from("https://api.coingecko.com/api/v3"),

            request_timeout_ms: 15_000,

            oi_retry_attempts: 3,
            oi_backoff_base_ms: 500,
            oi_concurrency: 4,
            oi_throttle_limit: 10,
            oi_throttle_window_ms: 1_000,

            index_retry_attempts: 3,
            index_backoff_base_ms: 1_000,
            index_cache_ttl_secs: 1_800,
            index_pages: 1,
            index_per_page: 250,

            allow_unknown_market_cap: false,
        }
    }
}

impl ScreenerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn index_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.index_cache_ttl_secs)
    }
}
