//! Time-limited cache in front of any market data source.
//!
//! Series are cached per (symbol, period) until their TTL expires. Quotes
//! always go to the inner source. Absent series are not cached.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::domain::error::StockcastError;
use crate::domain::period::Period;
use crate::domain::series::PriceSeries;
use crate::ports::market_data_port::MarketDataPort;

type CacheKey = (String, Period);

struct CacheEntry {
    series: PriceSeries,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

pub struct CachedMarketData<P> {
    inner: P,
    ttl: Duration,
    entries: DashMap<CacheKey, CacheEntry>,
}

impl<P: MarketDataPort> CachedMarketData<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Number of entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_live(now));
        before - self.entries.len()
    }

    fn lookup(&self, key: &CacheKey) -> Option<PriceSeries> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.is_live(now) {
                return Some(entry.series.clone());
            }
        }
        // The read guard above is released before taking the shard write lock.
        if self.entries.remove_if(key, |_, entry| !entry.is_live(now)).is_some() {
            tracing::debug!(symbol = %key.0, period = %key.1, "evicted expired series");
        }
        None
    }
}

impl<P: MarketDataPort> MarketDataPort for CachedMarketData<P> {
    fn get_series(&self, symbol: &str, period: Period) -> Result<Option<PriceSeries>, StockcastError> {
        let key = (symbol.to_string(), period);
        if let Some(series) = self.lookup(&key) {
            tracing::debug!(%symbol, %period, "cache hit");
            return Ok(Some(series));
        }

        let fetched = self.inner.get_series(symbol, period)?;
        if let Some(series) = &fetched {
            self.entries.insert(
                key,
                CacheEntry {
                    series: series.clone(),
                    expires_at: Instant::now() + self.ttl,
                },
            );
        }
        Ok(fetched)
    }

    fn get_current_price(&self, symbol: &str) -> Result<Option<f64>, StockcastError> {
        self.inner.get_current_price(symbol)
    }
}
