use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::circuit_breaker::CircuitBreaker;
use crate::config::ScreenerConfig;
use crate::data_source::{ExchangeSource, FailureMode, SourceError, SourceErrorKind, Universe};
use crate::domain::{ExchangeId, FundingSnapshot, Instrument, Symbol, TurnoverSnapshot};
use crate::http_client::{HttpClient, NoopHttpClient};
use crate::parse::{float_field, ms_to_iso, text_field, RawNum};
use crate::retry::RetryPolicy;
use crate::throttle::SelfThrottle;

use super::transport;

const VENUE: &str = "binance";

/// Binance USDⓈ-M futures adapter.
///
/// Bulk listings come back in one page each. The single-symbol open-interest
/// endpoint is the only metered path, so it sits behind a self-throttle and
/// the adapter reports a sequential enrichment budget.
#[derive(Clone)]
pub struct BinanceAdapter {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    timeout_ms: u64,
    oi_retry: RetryPolicy,
    throttle: SelfThrottle,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl Default for BinanceAdapter {
    fn default() -> Self {
        Self::new(&ScreenerConfig::default(), Arc::new(NoopHttpClient))
    }
}

impl BinanceAdapter {
    pub fn new(config: &ScreenerConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            base_url: config.binance_base_url.clone(),
            timeout_ms: config.request_timeout_ms,
            oi_retry: RetryPolicy::linear(
                config.oi_retry_attempts,
                Duration::from_millis(config.oi_backoff_base_ms),
            ),
            throttle: SelfThrottle::new(
                Duration::from_millis(config.oi_throttle_window_ms),
                config.oi_throttle_limit,
            ),
            circuit_breaker: Arc::new(CircuitBreaker::default()),
        }
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, SourceError> {
        transport::get_json(
            &self.http_client,
            &self.circuit_breaker,
            VENUE,
            url,
            self.timeout_ms,
        )
        .await
    }

    fn is_tradable_perp(instrument: &Instrument) -> bool {
        instrument.quote_asset.to_ascii_uppercase() == "USDT"
            && instrument.contract_type.to_ascii_uppercase() == "PERPETUAL"
            && instrument.status.to_ascii_uppercase() == "TRADING"
    }
}

impl ExchangeSource for BinanceAdapter {
    fn id(&self) -> ExchangeId {
        ExchangeId::Binance
    }

    fn failure_mode(&self) -> FailureMode {
        FailureMode::Propagate
    }

    fn oi_concurrency(&self) -> usize {
        // The self-throttle already paces this path; workers would only
        // queue on it.
        1
    }

    fn fetch_universe<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Universe, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!("{}/fapi/v1/exchangeInfo", self.base_url);
            let info: ExchangeInfoResponse = self.get_json(url).await?;

            let mut universe = Universe::new();
            for raw in info.symbols {
                let Some(symbol) = text_field(&raw.symbol) else {
                    continue;
                };
                let Some(base) = text_field(&raw.base_asset) else {
                    continue;
                };

                let instrument = Instrument {
                    symbol: symbol.clone(),
                    base_asset: base.clone(),
                    quote_asset: text_field(&raw.quote_asset).unwrap_or_default(),
                    contract_type: text_field(&raw.contract_type).unwrap_or_default(),
                    status: text_field(&raw.status).unwrap_or_default(),
                };

                if !Self::is_tradable_perp(&instrument) {
                    continue;
                }

                let Ok(parsed) = Symbol::parse(&instrument.symbol) else {
                    continue;
                };
                universe.insert(parsed, instrument.base_asset);
            }

            Ok(universe)
        })
    }

    fn fetch_funding_snapshots<'a>(
        &'a self,
    ) -> Pin<
        Box<dyn Future<Output = Result<HashMap<Symbol, FundingSnapshot>, SourceError>> + Send + 'a>,
    > {
        Box::pin(async move {
            let url = format!("{}/fapi/v1/premiumIndex", self.base_url);
            let items: Vec<PremiumIndexItem> = self.get_json(url).await?;

            let mut snapshots = HashMap::with_capacity(items.len());
            for item in items {
                let Some(symbol) = text_field(&item.symbol).and_then(|s| Symbol::parse(&s).ok())
                else {
                    continue;
                };
                let Some(funding_rate) = float_field(&item.last_funding_rate) else {
                    continue;
                };

                snapshots.entry(symbol.clone()).or_insert(FundingSnapshot {
                    symbol,
                    funding_rate,
                    next_funding_utc: ms_to_iso(&item.next_funding_time),
                    mark_price: float_field(&item.mark_price),
                });
            }

            Ok(snapshots)
        })
    }

    fn fetch_turnover_snapshots<'a>(
        &'a self,
    ) -> Pin<
        Box<dyn Future<Output = Result<HashMap<Symbol, TurnoverSnapshot>, SourceError>> + Send + 'a>,
    > {
        Box::pin(async move {
            let url = format!("{}/fapi/v1/ticker/24hr", self.base_url);
            let items: Vec<Ticker24hItem> = self.get_json(url).await?;

            let mut snapshots = HashMap::with_capacity(items.len());
            for item in items {
                let Some(symbol) = text_field(&item.symbol).and_then(|s| Symbol::parse(&s).ok())
                else {
                    continue;
                };
                // USDT-margined quote volume is already a USD equivalent.
                let Some(quote_volume_24h) = float_field(&item.quote_volume) else {
                    continue;
                };

                snapshots.entry(symbol.clone()).or_insert(TurnoverSnapshot {
                    symbol,
                    quote_volume_24h,
                });
            }

            Ok(snapshots)
        })
    }

    fn fetch_open_interest<'a>(
        &'a self,
        symbol: Symbol,
    ) -> Pin<Box<dyn Future<Output = Option<f64>> + Send + 'a>> {
        Box::pin(async move {
            self.throttle.acquire().await;

            let url = format!(
                "{}/fapi/v1/openInterest?symbol={}",
                self.base_url,
                urlencoding::encode(symbol.as_str())
            );

            let result = self
                .oi_retry
                .run(
                    |e| e.kind() == SourceErrorKind::RateLimited,
                    || self.get_json::<OpenInterestResponse>(url.clone()),
                )
                .await;

            match result {
                Ok(payload) => float_field(&payload.open_interest),
                Err(error) => {
                    tracing::debug!(symbol = %symbol, error = %error, "open interest lookup degraded to null");
                    None
                }
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeInfoResponse {
    #[serde(default)]
    symbols: Vec<ExchangeInfoSymbol>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeInfoSymbol {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    base_asset: Option<String>,
    #[serde(default)]
    quote_asset: Option<String>,
    #[serde(default)]
    contract_type: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PremiumIndexItem {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    last_funding_rate: Option<RawNum>,
    #[serde(default)]
    next_funding_time: Option<RawNum>,
    #[serde(default)]
    mark_price: Option<RawNum>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24hItem {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    quote_volume: Option<RawNum>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenInterestResponse {
    #[serde(default)]
    open_interest: Option<RawNum>,
}
