use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::circuit_breaker::CircuitBreaker;
use crate::config::ScreenerConfig;
use crate::data_source::{ExchangeSource, FailureMode, SourceError, SourceErrorKind, Universe};
use crate::domain::{ExchangeId, FundingSnapshot, Instrument, Symbol, TurnoverSnapshot};
use crate::http_client::{HttpClient, NoopHttpClient};
use crate::parse::{float_field, ms_to_iso, text_field, RawNum};
use crate::retry::RetryPolicy;

use super::transport;

const VENUE: &str = "bybit";
const PAGE_LIMIT: u32 = 1_000;

/// Bybit linear-perpetuals adapter.
///
/// Listing endpoints are cursor-paginated: each page hands back a
/// `nextPageCursor` that is echoed into the next request until the venue
/// stops returning one.
#[derive(Clone)]
pub struct BybitAdapter {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    timeout_ms: u64,
    oi_retry: RetryPolicy,
    oi_concurrency: usize,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl Default for BybitAdapter {
    fn default() -> Self {
        Self::new(&ScreenerConfig::default(), Arc::new(NoopHttpClient))
    }
}

impl BybitAdapter {
    pub fn new(config: &ScreenerConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            base_url: config.bybit_base_url.clone(),
            timeout_ms: config.request_timeout_ms,
            oi_retry: RetryPolicy::linear(
                config.oi_retry_attempts,
                Duration::from_millis(config.oi_backoff_base_ms),
            ),
            oi_concurrency: config.oi_concurrency,
            circuit_breaker: Arc::new(CircuitBreaker::default()),
        }
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, SourceError> {
        transport::get_json(
            &self.http_client,
            &self.circuit_breaker,
            VENUE,
            url,
            self.timeout_ms,
        )
        .await
    }

    /// Drain a cursor-paginated linear-category listing.
    async fn fetch_linear_pages<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Vec<T>, SourceError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut url = format!(
                "{}{}?category=linear&limit={}",
                self.base_url, path, PAGE_LIMIT
            );
            if let Some(token) = &cursor {
                url.push_str("&cursor=");
                url.push_str(&urlencoding::encode(token));
            }

            let page: CursorEnvelope<T> = self.get_json(url).await?;
            let (list, next) = match page.result {
                Some(result) => (result.list, result.next_page_cursor),
                None => (Vec::new(), None),
            };

            items.extend(list);
            cursor = next.filter(|token| !token.is_empty());
            if cursor.is_none() {
                break;
            }
        }

        Ok(items)
    }

    fn is_tradable_perp(instrument: &Instrument) -> bool {
        let is_usdt = instrument.quote_asset.to_ascii_uppercase() == "USDT"
            || instrument.symbol.to_ascii_uppercase().ends_with("USDT");
        let ctype = &instrument.contract_type;
        let is_perp =
            ctype == "LinearPerpetual" || ctype.to_ascii_lowercase().contains("perpetual");
        let status = instrument.status.to_ascii_lowercase();
        let is_trading = status.is_empty() || status == "trading";

        is_usdt && is_perp && is_trading
    }
}

impl ExchangeSource for BybitAdapter {
    fn id(&self) -> ExchangeId {
        ExchangeId::Bybit
    }

    fn failure_mode(&self) -> FailureMode {
        FailureMode::DegradeEmpty
    }

    fn oi_concurrency(&self) -> usize {
        self.oi_concurrency
    }

    fn fetch_universe<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Universe, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let raw: Vec<InstrumentInfoItem> = self
                .fetch_linear_pages("/v5/market/instruments-info")
                .await?;

            let mut universe = Universe::new();
            for item in raw {
                let Some(symbol) = text_field(&item.symbol) else {
                    continue;
                };
                let Some(base) = text_field(&item.base_coin) else {
                    continue;
                };

                let instrument = Instrument {
                    symbol: symbol.clone(),
                    base_asset: base.clone(),
                    quote_asset: text_field(&item.quote_coin).unwrap_or_default(),
                    contract_type: text_field(&item.contract_type).unwrap_or_default(),
                    status: text_field(&item.status).unwrap_or_default(),
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
            let tickers: Vec<LinearTicker> = self.fetch_linear_pages("/v5/market/tickers").await?;

            let mut snapshots = HashMap::with_capacity(tickers.len());
            for ticker in tickers {
                let Some(symbol) = text_field(&ticker.symbol).and_then(|s| Symbol::parse(&s).ok())
                else {
                    continue;
                };
                let Some(funding_rate) = float_field(&ticker.funding_rate) else {
                    continue;
                };

                snapshots.entry(symbol.clone()).or_insert(FundingSnapshot {
                    symbol,
                    funding_rate,
                    next_funding_utc: ms_to_iso(&ticker.next_funding_time),
                    mark_price: float_field(&ticker.mark_price),
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
            let tickers: Vec<LinearTicker> = self.fetch_linear_pages("/v5/market/tickers").await?;

            let mut snapshots = HashMap::with_capacity(tickers.len());
            for ticker in tickers {
                let Some(symbol) = text_field(&ticker.symbol).and_then(|s| Symbol::parse(&s).ok())
                else {
                    continue;
                };
                let Some(quote_volume_24h) = float_field(&ticker.turnover_24h) else {
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
            let url = format!(
                "{}/v5/market/open-interest?category=linear&symbol={}&intervalTime=1h&limit=1",
                self.base_url,
                urlencoding::encode(symbol.as_str())
            );

            let result = self
                .oi_retry
                .run(
                    |e| e.kind() == SourceErrorKind::RateLimited,
                    || self.get_json::<CursorEnvelope<OpenInterestItem>>(url.clone()),
                )
                .await;

            match result {
                Ok(envelope) => envelope
                    .result
                    .and_then(|r| r.list.into_iter().next())
                    .and_then(|item| float_field(&item.open_interest)),
                Err(error) => {
                    tracing::debug!(symbol = %symbol, error = %error, "open interest lookup degraded to null");
                    None
                }
            }
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct CursorEnvelope<T> {
    #[serde(default)]
    result: Option<CursorResult<T>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct CursorResult<T> {
    #[serde(default)]
    list: Vec<T>,
    #[serde(default)]
    next_page_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentInfoItem {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    base_coin: Option<String>,
    #[serde(default)]
    quote_coin: Option<String>,
    #[serde(default)]
    contract_type: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinearTicker {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    funding_rate: Option<RawNum>,
    #[serde(default)]
    next_funding_time: Option<RawNum>,
    #[serde(default)]
    mark_price: Option<RawNum>,
    #[serde(default)]
    turnover_24h: Option<RawNum>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenInterestItem {
    #[serde(default)]
    open_interest: Option<RawNum>,
}
