//! TTL-cached market-cap index keyed by base-asset symbol.
//!
//! The index is shared, long-lived process state: every screening request
//! reads it and any request may trigger a rebuild. Concurrent misses on the
//! same key coalesce into a single in-flight build, and a failed rebuild
//! serves the last good value past its expiry (stale-if-error) so the index
//! never fails a request.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Mutex as AsyncMutex;

use crate::adapters::CoinGeckoAdapter;
use crate::clock::{Clock, SystemClock};
use crate::data_source::SourceError;
use crate::domain::MarketCapEntry;

/// Shared, immutable snapshot of one built index generation.
pub type SymbolIndex = Arc<HashMap<String, MarketCapEntry>>;

/// Cache key: a build is parameterized by its pagination shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexKey {
    pub pages: u32,
    pub per_page: u32,
}

struct CacheSlot {
    value: SymbolIndex,
    expires_at: Instant,
}

/// Owned cache component over the market-cap index source.
pub struct SymbolIndexCache {
    source: Arc<CoinGeckoAdapter>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    slots: Mutex<HashMap<IndexKey, CacheSlot>>,
    flights: Mutex<HashMap<IndexKey, Arc<AsyncMutex<()>>>>,
}

impl SymbolIndexCache {
    pub fn new(source: Arc<CoinGeckoAdapter>, ttl: Duration) -> Self {
        Self::with_clock(source, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(source: Arc<CoinGeckoAdapter>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            clock,
            ttl,
            slots: Mutex::new(HashMap::new()),
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// Current index for `key`: fresh cache hit, else a rebuilt value, else
    /// the stale fallback, else an empty index.
    pub async fn get_or_build(&self, key: IndexKey) -> SymbolIndex {
        if let Some(fresh) = self.fresh(key) {
            return fresh;
        }

        // Coalesce concurrent misses: one builder per key, the rest wait
        // and re-check freshness once the lock frees.
        let flight = self.flight(key);
        let _guard = flight.lock().await;

        if let Some(fresh) = self.fresh(key) {
            return fresh;
        }

        match self.build(key).await {
            Ok(index) => {
                let value: SymbolIndex = Arc::new(index);
                let mut slots = self.slots.lock().expect("slot lock is not poisoned");
                slots.insert(
                    key,
                    CacheSlot {
                        value: value.clone(),
                        expires_at: self.clock.now() + self.ttl,
                    },
                );
                value
            }
            Err(error) => {
                if let Some(stale) = self.any(key) {
                    tracing::warn!(
                        error = %error,
                        "market-cap index rebuild failed; serving stale value"
                    );
                    return stale;
                }
                tracing::warn!(
                    error = %error,
                    "market-cap index unavailable and never built; serving empty index"
                );
                Arc::new(HashMap::new())
            }
        }
    }

    fn fresh(&self, key: IndexKey) -> Option<SymbolIndex> {
        let slots = self.slots.lock().expect("slot lock is not poisoned");
        slots.get(&key).and_then(|slot| {
            (self.clock.now() <= slot.expires_at).then(|| slot.value.clone())
        })
    }

    fn any(&self, key: IndexKey) -> Option<SymbolIndex> {
        let slots = self.slots.lock().expect("slot lock is not poisoned");
        slots.get(&key).map(|slot| slot.value.clone())
    }

    fn flight(&self, key: IndexKey) -> Arc<AsyncMutex<()>> {
        let mut flights = self.flights.lock().expect("flight lock is not poisoned");
        flights
            .entry(key)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Fetch pages 1..=pages, merging first-seen symbols.
    ///
    /// A page failure after at least one success aborts pagination but keeps
    /// the partial index; failing the very first page fails the build.
    async fn build(&self, key: IndexKey) -> Result<HashMap<String, MarketCapEntry>, SourceError> {
        let mut index = HashMap::new();
        let mut fetched_pages = 0_u32;

        for page in 1..=key.pages.max(1) {
            match self.source.fetch_page(page, key.per_page).await {
                Ok(entries) => {
                    fetched_pages += 1;
                    for entry in entries {
                        index.entry(entry.symbol.clone()).or_insert(entry);
                    }
                }
                Err(error) if fetched_pages == 0 => return Err(error),
                Err(error) => {
                    tracing::warn!(
                        page,
                        error = %error,
                        "aborting index pagination; keeping pages fetched so far"
                    );
                    break;
                }
            }
        }

        Ok(index)
    }
}
