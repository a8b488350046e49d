//! Bounded-concurrency open-interest enrichment.
//!
//! Runs strictly after sorting and truncation, so the number of
//! single-symbol lookups is capped by the row limit no matter how large the
//! screened universe was. Workers claim row indices from a shared atomic
//! counter; every index is claimed exactly once, so no two workers ever
//! touch the same row and row order is never disturbed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::data_source::ExchangeSource;
use crate::domain::{ScreenerRow, Symbol};

/// Fill `open_interest`/`oi_value_usd` on each row, with at most
/// `concurrency` lookups in flight.
///
/// Failures degrade the affected row to nulls and nothing else: the source's
/// open-interest contract already absorbs upstream errors, and a worker that
/// dies leaves its claimed rows at their null defaults.
pub async fn enrich_rows(
    rows: &mut [ScreenerRow],
    source: Arc<dyn ExchangeSource>,
    concurrency: usize,
) {
    if rows.is_empty() {
        return;
    }

    let inputs: Arc<Vec<RowInput>> = Arc::new(
        rows.iter()
            .map(|row| RowInput {
                symbol: Symbol::parse(&row.symbol).ok(),
                mark_price: row.mark_price,
            })
            .collect(),
    );

    let workers = concurrency.max(1).min(inputs.len());
    let cursor = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::with_capacity(workers);

    for _ in 0..workers {
        let cursor = cursor.clone();
        let inputs = inputs.clone();
        let source = source.clone();

        handles.push(tokio::spawn(async move {
            let mut claimed = Vec::new();
            loop {
                let index = cursor.fetch_add(1, Ordering::SeqCst);
                if index >= inputs.len() {
                    break;
                }

                let input = &inputs[index];
                let open_interest = match &input.symbol {
                    Some(symbol) => source.fetch_open_interest(symbol.clone()).await,
                    None => None,
                };
                let oi_value_usd = match (open_interest, input.mark_price) {
                    (Some(oi), Some(mark)) => Some(oi * mark),
                    _ => None,
                };

                claimed.push((index, open_interest, oi_value_usd));
            }
            claimed
        }));
    }

    for handle in handles {
        let Ok(claimed) = handle.await else {
            continue;
        };
        for (index, open_interest, oi_value_usd) in claimed {
            rows[index].open_interest = open_interest;
            rows[index].oi_value_usd = oi_value_usd;
        }
    }
}

struct RowInput {
    symbol: Option<Symbol>,
    mark_price: Option<f64>,
}
