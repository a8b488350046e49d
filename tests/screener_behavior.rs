//! Behavior tests for the screening pipeline.
//!
//! These drive the engine through a stub venue source and a scripted
//! market-cap index transport, verifying filtering, ordering, truncation,
//! enrichment accounting, and failure containment.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use perpscan_core::{
    CoinGeckoAdapter, Direction, ExchangeId, ExchangeSource, FailureMode, FundingSnapshot,
    HttpClient, HttpError, HttpRequest, HttpResponse, ScreenerConfig, ScreenerEngine,
    ScreenerFilters, SourceError, Symbol, SymbolIndexCache, TurnoverSnapshot, Universe,
};

// =============================================================================
// Fixtures
// =============================================================================

#[derive(Debug, Clone)]
struct ContractFixture {
    symbol: String,
    base: String,
    funding: f64,
    turnover: f64,
    mark_price: Option<f64>,
}

fn contract(symbol: &str, base: &str, funding: f64) -> ContractFixture {
    ContractFixture {
        symbol: String::from(symbol),
        base: String::from(base),
        funding,
        turnover: 5_000_000.0,
        mark_price: Some(2.0),
    }
}

struct StubExchange {
    id: ExchangeId,
    failure_mode: FailureMode,
    oi_concurrency: usize,
    contracts: Vec<ContractFixture>,
    fail_primary: bool,
    oi_calls: AtomicUsize,
}

impl StubExchange {
    fn bybit(contracts: Vec<ContractFixture>) -> Self {
        Self {
            id: ExchangeId::Bybit,
            failure_mode: FailureMode::DegradeEmpty,
            oi_concurrency: 4,
            contracts,
            fail_primary: false,
            oi_calls: AtomicUsize::new(0),
        }
    }

    fn binance(contracts: Vec<ContractFixture>) -> Self {
        Self {
            id: ExchangeId::Binance,
            failure_mode: FailureMode::Propagate,
            oi_concurrency: 1,
            contracts,
            fail_primary: false,
            oi_calls: AtomicUsize::new(0),
        }
    }

    fn failing(mut self) -> Self {
        self.fail_primary = true;
        self
    }

    fn oi_calls(&self) -> usize {
        self.oi_calls.load(Ordering::SeqCst)
    }
}

impl ExchangeSource for StubExchange {
    fn id(&self) -> ExchangeId {
        self.id
    }

    fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    fn oi_concurrency(&self) -> usize {
        self.oi_concurrency
    }

    fn fetch_universe<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Universe, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            if self.fail_primary {
                return Err(SourceError::unavailable("stub venue offline"));
            }
            let mut universe = Universe::new();
            for fixture in &self.contracts {
                universe.insert(
                    Symbol::parse(&fixture.symbol).expect("fixture symbol"),
                    fixture.base.clone(),
                );
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
            if self.fail_primary {
                return Err(SourceError::unavailable("stub venue offline"));
            }
            let mut snapshots = HashMap::new();
            for fixture in &self.contracts {
                let symbol = Symbol::parse(&fixture.symbol).expect("fixture symbol");
                snapshots.entry(symbol.clone()).or_insert(FundingSnapshot {
                    symbol,
                    funding_rate: fixture.funding,
                    next_funding_utc: String::from("2024-01-01T08:00:00Z"),
                    mark_price: fixture.mark_price,
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
            if self.fail_primary {
                return Err(SourceError::unavailable("stub venue offline"));
            }
            let mut snapshots = HashMap::new();
            for fixture in &self.contracts {
                let symbol = Symbol::parse(&fixture.symbol).expect("fixture symbol");
                snapshots.entry(symbol.clone()).or_insert(TurnoverSnapshot {
                    symbol,
                    quote_volume_24h: fixture.turnover,
                });
            }
            Ok(snapshots)
        })
    }

    fn fetch_open_interest<'a>(
        &'a self,
        _symbol: Symbol,
    ) -> Pin<Box<dyn Future<Output = Option<f64>> + Send + 'a>> {
        Box::pin(async move {
            self.oi_calls.fetch_add(1, Ordering::SeqCst);
            Some(10_000.0)
        })
    }
}

/// Index transport serving one fixed page, or an error for every call.
struct FixedIndexClient {
    body: Option<&'static str>,
}

impl HttpClient for FixedIndexClient {
    fn execute<'a>(
        &'a self,
        _request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let response = match self.body {
            Some(body) => Ok(HttpResponse::ok_json(body)),
            None => Err(HttpError::new("index offline")),
        };
        Box::pin(async move { response })
    }
}

const INDEX_PAGE: &str = r#"[
    {"symbol":"aaa","name":"Alpha","market_cap":900000000},
    {"symbol":"bbb","name":"Beta","market_cap":500000000},
    {"symbol":"ccc","name":"Gamma","market_cap":120000000},
    {"symbol":"ddd","name":"Delta","market_cap":40000000}
]"#;

fn engine_with(
    source: Arc<StubExchange>,
    index_body: Option<&'static str>,
    allow_unknown: bool,
) -> ScreenerEngine {
    let config = ScreenerConfig {
        allow_unknown_market_cap: allow_unknown,
        index_backoff_base_ms: 1,
        ..ScreenerConfig::default()
    };

    let index_source = Arc::new(CoinGeckoAdapter::new(
        &config,
        Arc::new(FixedIndexClient { body: index_body }),
    ));
    let index_cache = Arc::new(SymbolIndexCache::new(
        index_source,
        Duration::from_secs(1_800),
    ));

    let sources: Vec<Arc<dyn ExchangeSource>> = vec![source];
    ScreenerEngine::with_sources(config, index_cache, sources)
}

fn negative_filters() -> ScreenerFilters {
    let mut filters = ScreenerFilters::defaults_for(ExchangeId::Bybit, Direction::Negative);
    filters.min_market_cap_usd = 100_000_000.0;
    filters.min_turnover_24h_usd = 2_000_000.0;
    filters
}

// =============================================================================
// Direction filtering
// =============================================================================

#[tokio::test]
async fn negative_screen_keeps_rates_at_or_below_cut() {
    let source = Arc::new(StubExchange::bybit(vec![
        contract("AAAUSDT", "AAA", -0.0002),
        contract("BBBUSDT", "BBB", -0.00005),
        contract("CCCUSDT", "CCC", 0.0003),
    ]));
    let engine = engine_with(source, Some(INDEX_PAGE), false);

    let response = engine
        .screen(&negative_filters())
        .await
        .expect("screen succeeds");

    let symbols: Vec<&str> = response.rows.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["AAAUSDT"]);
    for row in &response.rows {
        assert!(row.funding < 0.0);
        assert!(row.funding <= response.filters.funding_cut);
    }
}

#[tokio::test]
async fn positive_screen_keeps_rates_at_or_above_cut() {
    let source = Arc::new(StubExchange::bybit(vec![
        contract("AAAUSDT", "AAA", 0.0004),
        contract("BBBUSDT", "BBB", 0.00001),
        contract("CCCUSDT", "CCC", -0.0002),
    ]));
    let engine = engine_with(source, Some(INDEX_PAGE), false);

    let mut filters = ScreenerFilters::defaults_for(ExchangeId::Bybit, Direction::Positive);
    filters.min_market_cap_usd = 100_000_000.0;
    let response = engine.screen(&filters).await.expect("screen succeeds");

    let symbols: Vec<&str> = response.rows.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["AAAUSDT"]);
    for row in &response.rows {
        assert!(row.funding > 0.0);
        assert!(row.funding >= filters.funding_cut);
    }
}

// =============================================================================
// Ordering and truncation
// =============================================================================

#[tokio::test]
async fn rows_are_ordered_most_extreme_first_with_stable_ties() {
    let source = Arc::new(StubExchange::bybit(vec![
        contract("AAAUSDT", "AAA", -0.0003),
        contract("BBBUSDT", "BBB", -0.0009),
        // Discovery-order tie pair.
        contract("CCCUSDT", "CCC", -0.0003),
    ]));
    let engine = engine_with(source, Some(INDEX_PAGE), true);

    let mut filters = negative_filters();
    filters.min_market_cap_usd = 0.0;
    let response = engine.screen(&filters).await.expect("screen succeeds");

    let symbols: Vec<&str> = response.rows.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["BBBUSDT", "AAAUSDT", "CCCUSDT"]);

    for pair in response.rows.windows(2) {
        assert!(pair[0].funding <= pair[1].funding, "ordering inversion");
    }
}

#[tokio::test]
async fn truncation_bounds_rows_and_enrichment_calls() {
    let contracts: Vec<ContractFixture> = (0..20)
        .map(|i| ContractFixture {
            symbol: format!("SYM{i:02}USDT"),
            base: format!("SYM{i:02}"),
            funding: -0.0002 - (i as f64) * 0.000_01,
            turnover: 5_000_000.0,
            mark_price: Some(1.0),
        })
        .collect();

    let source = Arc::new(StubExchange::bybit(contracts));
    let engine = engine_with(source.clone(), Some(INDEX_PAGE), true);

    let mut filters = negative_filters();
    filters.min_market_cap_usd = 0.0;
    filters.limit = 5;
    let response = engine.screen(&filters).await.expect("screen succeeds");

    assert_eq!(response.count, 5);
    assert_eq!(response.rows.len(), 5);
    assert_eq!(
        source.oi_calls(),
        5,
        "enrichment must run only over the truncated page"
    );
}

#[tokio::test]
async fn zero_limit_is_treated_as_one() {
    let source = Arc::new(StubExchange::bybit(vec![
        contract("AAAUSDT", "AAA", -0.0003),
        contract("BBBUSDT", "BBB", -0.0004),
    ]));
    let engine = engine_with(source, Some(INDEX_PAGE), true);

    let mut filters = negative_filters();
    filters.min_market_cap_usd = 0.0;
    filters.limit = 0;
    let response = engine.screen(&filters).await.expect("screen succeeds");

    assert_eq!(response.rows.len(), 1);
}

#[tokio::test]
async fn symbols_are_pairwise_distinct() {
    let source = Arc::new(StubExchange::bybit(vec![
        contract("AAAUSDT", "AAA", -0.0003),
        contract("AAAUSDT", "AAA", -0.0005),
        contract("BBBUSDT", "BBB", -0.0004),
    ]));
    let engine = engine_with(source, Some(INDEX_PAGE), true);

    let mut filters = negative_filters();
    filters.min_market_cap_usd = 0.0;
    let response = engine.screen(&filters).await.expect("screen succeeds");

    let mut symbols: Vec<&str> = response.rows.iter().map(|r| r.symbol.as_str()).collect();
    symbols.sort_unstable();
    symbols.dedup();
    assert_eq!(symbols.len(), response.rows.len());
}

// =============================================================================
// Threshold filters
// =============================================================================

#[tokio::test]
async fn low_turnover_candidates_are_excluded() {
    let mut thin = contract("AAAUSDT", "AAA", -0.0005);
    thin.turnover = 500_000.0;
    let source = Arc::new(StubExchange::bybit(vec![
        thin,
        contract("BBBUSDT", "BBB", -0.0005),
    ]));
    let engine = engine_with(source, Some(INDEX_PAGE), false);

    let response = engine
        .screen(&negative_filters())
        .await
        .expect("screen succeeds");

    let symbols: Vec<&str> = response.rows.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["BBBUSDT"]);
}

#[tokio::test]
async fn small_cap_candidates_are_excluded() {
    // DDD carries a 40M cap in the index fixture, below the 100M floor.
    let source = Arc::new(StubExchange::bybit(vec![
        contract("DDDUSDT", "DDD", -0.0005),
        contract("AAAUSDT", "AAA", -0.0005),
    ]));
    let engine = engine_with(source, Some(INDEX_PAGE), false);

    let response = engine
        .screen(&negative_filters())
        .await
        .expect("screen succeeds");

    let symbols: Vec<&str> = response.rows.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["AAAUSDT"]);
    assert_eq!(response.rows[0].market_cap, Some(900_000_000));
    assert_eq!(response.rows[0].name, "Alpha");
    assert_eq!(response.rows[0].ticker, "AAA");
}

#[tokio::test]
async fn unknown_market_cap_is_excluded_unless_allowed_through() {
    let source = Arc::new(StubExchange::bybit(vec![
        contract("ZZZUSDT", "ZZZ", -0.0005),
        contract("AAAUSDT", "AAA", -0.0005),
    ]));

    let strict = engine_with(source.clone(), Some(INDEX_PAGE), false);
    let response = strict
        .screen(&negative_filters())
        .await
        .expect("screen succeeds");
    let symbols: Vec<&str> = response.rows.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["AAAUSDT"]);

    let source = Arc::new(StubExchange::bybit(vec![
        contract("ZZZUSDT", "ZZZ", -0.0005),
        contract("AAAUSDT", "AAA", -0.0005),
    ]));
    let lenient = engine_with(source, Some(INDEX_PAGE), true);
    let response = lenient
        .screen(&negative_filters())
        .await
        .expect("screen succeeds");

    let unknown = response
        .rows
        .iter()
        .find(|r| r.symbol == "ZZZUSDT")
        .expect("allow-through keeps the row");
    assert_eq!(unknown.market_cap, None);
    assert_eq!(unknown.name, "-");
    assert_eq!(unknown.ticker, "ZZZ");
}

// =============================================================================
// Failure containment
// =============================================================================

#[tokio::test]
async fn degrading_venue_answers_empty_on_primary_failure() {
    let source = Arc::new(StubExchange::bybit(vec![]).failing());
    let engine = engine_with(source, Some(INDEX_PAGE), false);

    let response = engine
        .screen(&negative_filters())
        .await
        .expect("degrading venue must not surface the failure");

    assert_eq!(response.count, 0);
    assert!(response.rows.is_empty());
}

#[tokio::test]
async fn propagating_venue_surfaces_primary_failure() {
    let source = Arc::new(StubExchange::binance(vec![]).failing());
    let engine = engine_with(source, Some(INDEX_PAGE), false);

    let filters = ScreenerFilters::defaults_for(ExchangeId::Binance, Direction::Negative);
    let error = engine
        .screen(&filters)
        .await
        .expect_err("propagating venue must fail the request");
    assert!(!error.message().is_empty());
}

// =============================================================================
// Response shape
// =============================================================================

#[tokio::test]
async fn response_echoes_filters_and_counts_rows() {
    let source = Arc::new(StubExchange::bybit(vec![
        contract("AAAUSDT", "AAA", -0.0005),
        contract("BBBUSDT", "BBB", -0.0003),
    ]));
    let engine = engine_with(source, Some(INDEX_PAGE), false);

    let filters = negative_filters();
    let response = engine.screen(&filters).await.expect("screen succeeds");

    assert_eq!(response.filters, filters);
    assert_eq!(response.count, response.rows.len());
    assert!(response.updated_at_utc.ends_with('Z'));
    assert!(!response.updated_at_utc.contains('.'));
    for row in &response.rows {
        assert_eq!(row.alert, "", "alerting is inert");
        assert_eq!(row.open_interest, Some(10_000.0));
        assert_eq!(row.oi_value_usd, Some(20_000.0));
    }
}
