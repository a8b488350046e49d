//! Exchange adapter contract and source-level errors.
//!
//! Every venue implements [`ExchangeSource`]; the engine is written against
//! this trait only and never sees venue-specific payloads. Implementations
//! must be `Send + Sync` as they are shared across enrichment workers.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::domain::{ExchangeId, FundingSnapshot, Symbol, TurnoverSnapshot};

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Unavailable,
    RateLimited,
    InvalidRequest,
    Internal,
}

/// Structured source error carried through the screening pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// How the engine contains a failed primary fetch for a venue.
///
/// The two venues historically differ here: one surfaces the failure to the
/// caller, the other answers with a structurally valid empty result. The
/// policy is an explicit adapter property so the difference stays a decision,
/// not an accident of call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Upstream failure during universe/snapshot fetch fails the request.
    Propagate,
    /// Upstream failure during universe/snapshot fetch yields an empty,
    /// successful response.
    DegradeEmpty,
}

/// Tradable-contract universe in upstream discovery order.
///
/// Discovery order is load-bearing: it is the tie-break for equal funding
/// rates in the final ordering, so it must survive into the candidate pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Universe {
    symbols: Vec<Symbol>,
    base_by_symbol: HashMap<Symbol, String>,
}

impl Universe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tradable contract; repeats of a symbol keep the first entry.
    pub fn insert(&mut self, symbol: Symbol, base_asset: impl Into<String>) {
        if self.base_by_symbol.contains_key(&symbol) {
            return;
        }
        self.base_by_symbol
            .insert(symbol.clone(), base_asset.into());
        self.symbols.push(symbol);
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.base_by_symbol.contains_key(symbol)
    }

    pub fn base_asset(&self, symbol: &Symbol) -> Option<&str> {
        self.base_by_symbol.get(symbol).map(String::as_str)
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Venue adapter contract.
///
/// Bulk fetches return maps keyed by symbol; a contract missing from a map
/// simply had no parseable snapshot. `fetch_open_interest` is best-effort by
/// contract: it retries rate limiting internally and answers `None` on any
/// other failure, so enrichment can never fail a request.
pub trait ExchangeSource: Send + Sync {
    fn id(&self) -> ExchangeId;

    /// Failure containment for the primary universe/snapshot fetches.
    fn failure_mode(&self) -> FailureMode;

    /// Worker budget for open-interest enrichment over a screened page.
    fn oi_concurrency(&self) -> usize;

    fn fetch_universe<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Universe, SourceError>> + Send + 'a>>;

    fn fetch_funding_snapshots<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<HashMap<Symbol, FundingSnapshot>, SourceError>> + Send + 'a>>;

    fn fetch_turnover_snapshots<'a>(
        &'a self,
    ) -> Pin<
        Box<dyn Future<Output = Result<HashMap<Symbol, TurnoverSnapshot>, SourceError>> + Send + 'a>,
    >;

    fn fetch_open_interest<'a>(
        &'a self,
        symbol: Symbol,
    ) -> Pin<Box<dyn Future<Output = Option<f64>> + Send + 'a>>;
}
