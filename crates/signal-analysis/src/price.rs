//! Live price lookup for matched stocks and signals
//!
//! Prices come from Yahoo Finance. Lookups are rate-limited and fronted by a
//! short-lived cache keyed by bare symbol, so repeated mentions of the same
//! stock across a batch hit the network once.

use crate::error::{AnalysisError, Result};
use async_trait::async_trait;
use cached::{Cached, TimedCache};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use yahoo_finance_api as yahoo;

/// Default requests per minute against the quote API
const DEFAULT_RATE_LIMIT: u32 = 60;

/// Default cache lifetime for fetched prices
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Source of current prices for registry symbols
///
/// Accepts bare symbols; implementations apply market-suffix conventions
/// internally. Failures are per-symbol [`AnalysisError::PriceUnavailable`];
/// callers drop the affected entry rather than persisting a placeholder.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Latest price for a bare registry symbol
    async fn latest_price(&self, symbol: &str) -> Result<f64>;
}

/// Yahoo Finance price source
pub struct YahooPriceSource {
    market_suffix: String,
    rate_limiter: SharedRateLimiter,
    cache: Arc<RwLock<TimedCache<String, f64>>>,
}

impl YahooPriceSource {
    /// Create a source appending the given market suffix (e.g. ".NS") to
    /// bare symbols
    pub fn new(market_suffix: impl Into<String>) -> Self {
        Self::with_limits(market_suffix, DEFAULT_RATE_LIMIT, DEFAULT_CACHE_TTL)
    }

    /// Create a source with the default rate limit and an explicit cache TTL
    pub fn with_cache_ttl(market_suffix: impl Into<String>, cache_ttl: Duration) -> Self {
        Self::with_limits(market_suffix, DEFAULT_RATE_LIMIT, cache_ttl)
    }

    /// Create a source with explicit rate limit (requests/minute) and cache TTL
    pub fn with_limits(
        market_suffix: impl Into<String>,
        rate_limit: u32,
        cache_ttl: Duration,
    ) -> Self {
        let quota = Quota::per_minute(
            NonZeroU32::new(rate_limit).unwrap_or_else(|| NonZeroU32::new(DEFAULT_RATE_LIMIT).expect("nonzero")),
        );

        Self {
            market_suffix: market_suffix.into(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(cache_ttl))),
        }
    }

    fn full_symbol(&self, symbol: &str) -> String {
        if symbol.ends_with(&self.market_suffix) {
            symbol.to_string()
        } else {
            format!("{symbol}{}", self.market_suffix)
        }
    }
}

#[async_trait]
impl PriceSource for YahooPriceSource {
    async fn latest_price(&self, symbol: &str) -> Result<f64> {
        if let Some(price) = self.cache.write().await.cache_get(symbol).copied() {
            debug!("Price cache hit for {symbol}: {price}");
            return Ok(price);
        }

        self.rate_limiter.until_ready().await;

        let unavailable = |reason: String| AnalysisError::PriceUnavailable {
            symbol: symbol.to_string(),
            reason,
        };

        let full_symbol = self.full_symbol(symbol);
        let provider = yahoo::YahooConnector::new().map_err(|e| unavailable(e.to_string()))?;

        let response = provider
            .get_latest_quotes(&full_symbol, "1d")
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let quote = response
            .last_quote()
            .map_err(|e| unavailable(e.to_string()))?;

        debug!("Fetched price for {full_symbol}: {}", quote.close);
        let _ = self
            .cache
            .write()
            .await
            .cache_set(symbol.to_string(), quote.close);

        Ok(quote.close)
    }
}
