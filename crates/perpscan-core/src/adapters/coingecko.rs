use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::circuit_breaker::CircuitBreaker;
use crate::config::ScreenerConfig;
use crate::data_source::{SourceError, SourceErrorKind};
use crate::domain::MarketCapEntry;
use crate::http_client::{HttpClient, NoopHttpClient};
use crate::parse::{float_field, text_field, RawNum};
use crate::retry::RetryPolicy;

use super::transport;

const VENUE: &str = "coingecko";

/// CoinGecko market-cap index adapter.
///
/// Serves pages of `{symbol, name, market cap}` triples ordered by market
/// cap descending. Rate limiting is retried per page; the caller decides
/// what a lost page costs.
#[derive(Clone)]
pub struct CoinGeckoAdapter {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    timeout_ms: u64,
    retry: RetryPolicy,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl Default for CoinGeckoAdapter {
    fn default() -> Self {
        Self::new(&ScreenerConfig::default(), Arc::new(NoopHttpClient))
    }
}

impl CoinGeckoAdapter {
    pub fn new(config: &ScreenerConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            base_url: config.index_base_url.clone(),
            timeout_ms: config.request_timeout_ms,
            retry: RetryPolicy::linear(
                config.index_retry_attempts,
                Duration::from_millis(config.index_backoff_base_ms),
            ),
            circuit_breaker: Arc::new(CircuitBreaker::default()),
        }
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    /// Fetch one index page (1-based) of `per_page` records.
    pub async fn fetch_page(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<MarketCapEntry>, SourceError> {
        let url = format!(
            "{}/coins/markets?vs_currency=usd&order=market_cap_desc&per_page={}&page={}&sparkline=false",
            self.base_url, per_page, page
        );

        let items: Vec<MarketPageItem> = self
            .retry
            .run(
                |e| e.kind() == SourceErrorKind::RateLimited,
                || {
                    transport::get_json(
                        &self.http_client,
                        &self.circuit_breaker,
                        VENUE,
                        url.clone(),
                        self.timeout_ms,
                    )
                },
            )
            .await?;

        let entries = items
            .into_iter()
            .filter_map(|item| {
                let symbol = text_field(&item.symbol)?.to_ascii_uppercase();
                let display_name = text_field(&item.name)?;
                let market_cap = float_field(&item.market_cap)?;

                Some(MarketCapEntry {
                    symbol,
                    display_name,
                    market_cap_usd: market_cap.trunc() as i64,
                })
            })
            .collect();

        Ok(entries)
    }
}

#[derive(Debug, Deserialize)]
struct MarketPageItem {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    market_cap: Option<RawNum>,
}
