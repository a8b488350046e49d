//! Request orchestration: index, universe, filters, ordering, enrichment.

use std::collections::HashMap;
use std::sync::Arc;

use crate::adapters::{BinanceAdapter, BybitAdapter, CoinGeckoAdapter};
use crate::config::ScreenerConfig;
use crate::data_source::{ExchangeSource, FailureMode, SourceError};
use crate::domain::{ExchangeId, ScreenerFilters, ScreenerResponse, ScreenerRow, UtcDateTime};
use crate::enrich::enrich_rows;
use crate::filter::{compare_for_ordering, passes_direction};
use crate::http_client::HttpClient;
use crate::symbol_index::{IndexKey, SymbolIndex, SymbolIndexCache};

/// One-stop screening engine over the registered venues.
///
/// A request runs end-to-end before a response is produced: market-cap
/// index, venue universe and snapshots, candidate filtering, stable sort,
/// truncation, then open-interest enrichment over the surviving rows only.
pub struct ScreenerEngine {
    index_cache: Arc<SymbolIndexCache>,
    sources: HashMap<ExchangeId, Arc<dyn ExchangeSource>>,
    config: ScreenerConfig,
}

impl ScreenerEngine {
    /// Engine with the stock venue adapters over the given transport.
    pub fn new(config: ScreenerConfig, http_client: Arc<dyn HttpClient>) -> Self {
        let index_source = Arc::new(CoinGeckoAdapter::new(&config, http_client.clone()));
        let index_cache = Arc::new(SymbolIndexCache::new(
            index_source,
            config.index_cache_ttl(),
        ));

        let sources: Vec<Arc<dyn ExchangeSource>> = vec![
            Arc::new(BybitAdapter::new(&config, http_client.clone())),
            Arc::new(BinanceAdapter::new(&config, http_client)),
        ];

        Self::with_sources(config, index_cache, sources)
    }

    /// Engine over explicit sources; the seam tests and embedders use.
    pub fn with_sources(
        config: ScreenerConfig,
        index_cache: Arc<SymbolIndexCache>,
        sources: Vec<Arc<dyn ExchangeSource>>,
    ) -> Self {
        let sources = sources
            .into_iter()
            .map(|source| (source.id(), source))
            .collect();

        Self {
            index_cache,
            sources,
            config,
        }
    }

    /// Run one screening request.
    pub async fn screen(&self, filters: &ScreenerFilters) -> Result<ScreenerResponse, SourceError> {
        let index = self
            .index_cache
            .get_or_build(IndexKey {
                pages: self.config.index_pages,
                per_page: self.config.index_per_page,
            })
            .await;

        let source = self
            .sources
            .get(&filters.exchange)
            .cloned()
            .ok_or_else(|| {
                SourceError::invalid_request(format!(
                    "no source registered for exchange '{}'",
                    filters.exchange
                ))
            })?;

        let mut rows = match self.collect_candidates(source.as_ref(), &index, filters).await {
            Ok(rows) => rows,
            Err(error) => match source.failure_mode() {
                FailureMode::Propagate => return Err(error),
                FailureMode::DegradeEmpty => {
                    tracing::warn!(
                        exchange = %filters.exchange,
                        error = %error,
                        "primary venue fetch failed; answering with an empty result"
                    );
                    Vec::new()
                }
            },
        };

        // Vec::sort_by is stable: equal funding rates keep their upstream
        // discovery order, which makes responses reproducible.
        rows.sort_by(|x, y| compare_for_ordering(x.funding, y.funding, filters.direction));
        rows.truncate(filters.effective_limit());

        enrich_rows(&mut rows, source.clone(), source.oi_concurrency()).await;

        Ok(ScreenerResponse {
            updated_at_utc: UtcDateTime::now_seconds().format_rfc3339(),
            filters: filters.clone(),
            count: rows.len(),
            rows,
        })
    }

    /// Build unfiltered-by-limit candidate rows in universe discovery order.
    async fn collect_candidates(
        &self,
        source: &dyn ExchangeSource,
        index: &SymbolIndex,
        filters: &ScreenerFilters,
    ) -> Result<Vec<ScreenerRow>, SourceError> {
        let universe = source.fetch_universe().await?;
        let funding = source.fetch_funding_snapshots().await?;
        let turnover = source.fetch_turnover_snapshots().await?;

        let mut rows = Vec::new();
        for symbol in universe.symbols() {
            let Some(snapshot) = funding.get(symbol) else {
                continue;
            };
            if !passes_direction(snapshot.funding_rate, filters.direction, filters.funding_cut) {
                continue;
            }

            let Some(volume) = turnover.get(symbol) else {
                continue;
            };
            if volume.quote_volume_24h < filters.min_turnover_24h_usd {
                continue;
            }

            let base_upper = universe
                .base_asset(symbol)
                .map(|base| base.to_ascii_uppercase())
                .filter(|base| !base.is_empty());
            let entry = base_upper.as_deref().and_then(|base| index.get(base));

            let market_cap = entry.map(|e| e.market_cap_usd);
            match market_cap {
                Some(cap) if (cap as f64) < filters.min_market_cap_usd => continue,
                None if !self.config.allow_unknown_market_cap => continue,
                _ => {}
            }

            let name = entry
                .map(|e| e.display_name.clone())
                .unwrap_or_else(|| String::from("-"));
            let ticker = base_upper.unwrap_or_else(|| symbol.as_str().to_owned());

            rows.push(ScreenerRow {
                symbol: symbol.as_str().to_owned(),
                name,
                ticker,
                funding: snapshot.funding_rate,
                open_interest: None,
                oi_value_usd: None,
                market_cap,
                next_funding: snapshot.next_funding_utc.clone(),
                mark_price: snapshot.mark_price,
                turnover_24h: Some(volume.quote_volume_24h),
                alert: String::new(),
            });
        }

        Ok(rows)
    }
}
