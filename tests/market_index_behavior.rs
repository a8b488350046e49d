//! Behavior tests for the market-cap index cache, driven end to end through
//! real venue adapters over a URL-routed stub transport.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use perpscan_core::{
    BybitAdapter, CoinGeckoAdapter, Direction, ExchangeId, ExchangeSource, HttpClient, HttpError,
    HttpRequest, HttpResponse, IndexKey, ManualClock, ScreenerConfig, ScreenerEngine,
    ScreenerFilters, SymbolIndexCache,
};

// =============================================================================
// Routed transport stub
// =============================================================================

/// Answers by URL substring; records every URL it served.
struct RoutedHttpClient {
    routes: Vec<(&'static str, Result<HttpResponse, HttpError>)>,
    index_down: AtomicBool,
    log: Mutex<Vec<String>>,
}

impl RoutedHttpClient {
    fn new(routes: Vec<(&'static str, Result<HttpResponse, HttpError>)>) -> Self {
        Self {
            routes,
            index_down: AtomicBool::new(false),
            log: Mutex::new(Vec::new()),
        }
    }

    fn take_index_down(&self) {
        self.index_down.store(true, Ordering::SeqCst);
    }

    fn calls_matching(&self, needle: &str) -> usize {
        self.log
            .lock()
            .expect("log lock is not poisoned")
            .iter()
            .filter(|url| url.contains(needle))
            .count()
    }
}

impl HttpClient for RoutedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.log
            .lock()
            .expect("log lock is not poisoned")
            .push(request.url.clone());

        if request.url.contains("coins/markets") && self.index_down.load(Ordering::SeqCst) {
            return Box::pin(async move { Err(HttpError::new("index offline")) });
        }

        let response = self
            .routes
            .iter()
            .find(|(needle, _)| request.url.contains(needle))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| Err(HttpError::new(format!("unrouted url: {}", request.url))));

        Box::pin(async move { response })
    }
}

const INSTRUMENTS_PAGE: &str = r#"{"result":{"list":[
    {"symbol":"AAAUSDT","baseCoin":"AAA","quoteCoin":"USDT","contractType":"LinearPerpetual","status":"Trading"},
    {"symbol":"BBBUSDT","baseCoin":"BBB","quoteCoin":"USDT","contractType":"LinearPerpetual","status":"Trading"}
]}}"#;

const TICKERS_PAGE: &str = r#"{"result":{"list":[
    {"symbol":"AAAUSDT","fundingRate":"-0.0005","nextFundingTime":"1700000000000","markPrice":"2.0","turnover24h":"9000000"},
    {"symbol":"BBBUSDT","fundingRate":"-0.0004","nextFundingTime":"1700000000000","markPrice":"3.0","turnover24h":"8000000"}
]}}"#;

const OPEN_INTEREST_PAGE: &str = r#"{"result":{"list":[{"openInterest":"1234.5"}]}}"#;

const INDEX_PAGE: &str = r#"[
    {"symbol":"aaa","name":"Alpha","market_cap":900000000},
    {"symbol":"bbb","name":"Beta","market_cap":500000000}
]"#;

fn routed_client() -> Arc<RoutedHttpClient> {
    Arc::new(RoutedHttpClient::new(vec![
        ("instruments-info", Ok(HttpResponse::ok_json(INSTRUMENTS_PAGE))),
        ("tickers", Ok(HttpResponse::ok_json(TICKERS_PAGE))),
        ("open-interest", Ok(HttpResponse::ok_json(OPEN_INTEREST_PAGE))),
        ("coins/markets", Ok(HttpResponse::ok_json(INDEX_PAGE))),
    ]))
}

fn engine_over(
    client: Arc<RoutedHttpClient>,
    clock: Arc<ManualClock>,
    allow_unknown: bool,
) -> ScreenerEngine {
    let config = ScreenerConfig {
        allow_unknown_market_cap: allow_unknown,
        index_backoff_base_ms: 1,
        oi_backoff_base_ms: 1,
        ..ScreenerConfig::default()
    };

    let index_source = Arc::new(CoinGeckoAdapter::new(&config, client.clone()));
    let index_cache = Arc::new(SymbolIndexCache::with_clock(
        index_source,
        config.index_cache_ttl(),
        clock,
    ));

    let bybit: Arc<dyn ExchangeSource> = Arc::new(BybitAdapter::new(&config, client));
    ScreenerEngine::with_sources(config, index_cache, vec![bybit])
}

fn filters() -> ScreenerFilters {
    let mut filters = ScreenerFilters::defaults_for(ExchangeId::Bybit, Direction::Negative);
    filters.min_market_cap_usd = 100_000_000.0;
    filters.min_turnover_24h_usd = 2_000_000.0;
    filters
}

// =============================================================================
// Cache behavior
// =============================================================================

#[tokio::test]
async fn second_request_within_ttl_reuses_the_index() {
    let client = routed_client();
    let clock = Arc::new(ManualClock::default());
    let engine = engine_over(client.clone(), clock, false);

    let first = engine.screen(&filters()).await.expect("first screen");
    let second = engine.screen(&filters()).await.expect("second screen");

    assert_eq!(first.count, 2);
    assert_eq!(second.count, 2);
    assert_eq!(
        client.calls_matching("coins/markets"),
        1,
        "second request must be a cache hit"
    );
}

#[tokio::test]
async fn expired_index_is_rebuilt() {
    let client = routed_client();
    let clock = Arc::new(ManualClock::default());
    let engine = engine_over(client.clone(), clock.clone(), false);

    engine.screen(&filters()).await.expect("first screen");
    clock.advance(Duration::from_secs(1_801));
    engine.screen(&filters()).await.expect("second screen");

    assert_eq!(client.calls_matching("coins/markets"), 2);
}

#[tokio::test]
async fn failed_rebuild_serves_the_stale_index() {
    let client = routed_client();
    let clock = Arc::new(ManualClock::default());
    let engine = engine_over(client.clone(), clock.clone(), false);

    let first = engine.screen(&filters()).await.expect("first screen");
    assert_eq!(first.rows[0].name, "Beta");

    clock.advance(Duration::from_secs(1_801));
    client.take_index_down();

    let stale = engine.screen(&filters()).await.expect("stale screen");
    assert_eq!(stale.count, first.count);
    assert_eq!(stale.rows[0].name, "Beta");
    assert_eq!(stale.rows[0].market_cap, Some(500_000_000));
}

#[tokio::test]
async fn index_outage_with_allow_through_keeps_candidates() {
    let client = routed_client();
    client.take_index_down();
    let clock = Arc::new(ManualClock::default());
    let engine = engine_over(client, clock, true);

    let response = engine.screen(&filters()).await.expect("screen succeeds");

    assert_eq!(response.count, 2, "turnover and funding filters still apply");
    for row in &response.rows {
        assert_eq!(row.market_cap, None);
        assert_eq!(row.name, "-");
    }
}

#[tokio::test]
async fn index_outage_without_allow_through_empties_the_screen() {
    let client = routed_client();
    client.take_index_down();
    let clock = Arc::new(ManualClock::default());
    let engine = engine_over(client, clock, false);

    let response = engine.screen(&filters()).await.expect("screen succeeds");
    assert_eq!(response.count, 0);
}

// =============================================================================
// Single-flight coalescing
// =============================================================================

#[tokio::test]
async fn concurrent_misses_share_one_build() {
    let config = ScreenerConfig {
        index_backoff_base_ms: 1,
        ..ScreenerConfig::default()
    };
    let client = routed_client();
    let source = Arc::new(CoinGeckoAdapter::new(&config, client.clone()));
    let cache = Arc::new(SymbolIndexCache::new(source, Duration::from_secs(1_800)));
    let key = IndexKey {
        pages: 1,
        per_page: 250,
    };

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move { cache.get_or_build(key).await }));
    }

    let mut indexes = Vec::new();
    for handle in handles {
        indexes.push(handle.await.expect("waiter completes"));
    }

    assert_eq!(client.calls_matching("coins/markets"), 1);
    assert!(indexes.iter().all(|index| index.len() == 2));

    let mut expected: HashMap<&str, i64> = HashMap::new();
    expected.insert("AAA", 900_000_000);
    expected.insert("BBB", 500_000_000);
    for (symbol, cap) in expected {
        assert_eq!(
            indexes[0].get(symbol).map(|e| e.market_cap_usd),
            Some(cap)
        );
    }
}

// =============================================================================
// Enriched rows from the full pipeline
// =============================================================================

#[tokio::test]
async fn full_pipeline_fills_open_interest_from_the_venue() {
    let client = routed_client();
    let clock = Arc::new(ManualClock::default());
    let engine = engine_over(client, clock, false);

    let response = engine.screen(&filters()).await.expect("screen succeeds");

    let most_negative = &response.rows[0];
    assert_eq!(most_negative.symbol, "AAAUSDT");
    assert_eq!(most_negative.open_interest, Some(1_234.5));
    assert_eq!(most_negative.oi_value_usd, Some(1_234.5 * 2.0));
    assert_eq!(most_negative.next_funding, "2023-11-14T22:13:20Z");
}
