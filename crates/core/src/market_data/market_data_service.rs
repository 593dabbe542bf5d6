//! Caching layer over a market data provider.
//!
//! Quotes and profiles are cached with a short TTL against an injected
//! clock; historical closes are cached forever (a past close never changes).
//! A failed provider call falls back to the last cached value when one
//! exists, so transient feed outages degrade to slightly stale prices
//! instead of failed trades.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::DashMap;
use log::warn;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

use super::market_data_constants::QUOTE_CACHE_TTL_SECS;
use super::market_data_model::{CompanyProfile, Quote};
use super::market_data_traits::{MarketDataProviderTrait, MarketDataServiceTrait};
use crate::errors::Result;
use crate::utils::Clock;

#[derive(Clone)]
struct CachedEntry<T> {
    data: T,
    fetched_at: DateTime<Utc>,
}

impl<T> CachedEntry<T> {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.fetched_at < Duration::seconds(QUOTE_CACHE_TTL_SECS)
    }
}

pub struct MarketDataService {
    provider: Arc<dyn MarketDataProviderTrait>,
    clock: Arc<dyn Clock>,
    quotes: DashMap<String, CachedEntry<Quote>>,
    profiles: DashMap<String, CachedEntry<CompanyProfile>>,
    // Keyed "TICKER:YYYY-MM-DD"; never expires.
    historical_closes: DashMap<String, Decimal>,
}

impl MarketDataService {
    pub fn new(provider: Arc<dyn MarketDataProviderTrait>, clock: Arc<dyn Clock>) -> Self {
        Self {
            provider,
            clock,
            quotes: DashMap::new(),
            profiles: DashMap::new(),
            historical_closes: DashMap::new(),
        }
    }

    fn close_key(ticker: &str, date: NaiveDate) -> String {
        format!("{}:{}", ticker, date)
    }
}

#[async_trait]
impl MarketDataServiceTrait for MarketDataService {
    async fn get_quote(&self, ticker: &str) -> Result<Option<Quote>> {
        let now = self.clock.now();
        if let Some(entry) = self.quotes.get(ticker) {
            if entry.is_fresh(now) {
                return Ok(Some(entry.data.clone()));
            }
        }

        match self.provider.get_quote(ticker).await {
            Ok(Some(quote)) => {
                self.quotes.insert(
                    ticker.to_string(),
                    CachedEntry {
                        data: quote.clone(),
                        fetched_at: now,
                    },
                );
                Ok(Some(quote))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                warn!("Quote fetch failed for {}: {}", ticker, err);
                match self.quotes.get(ticker) {
                    Some(stale) => Ok(Some(stale.data.clone())),
                    None => Err(err.into()),
                }
            }
        }
    }

    async fn get_quotes(&self, tickers: &[String]) -> Result<HashMap<String, Quote>> {
        let now = self.clock.now();
        let uncached: Vec<String> = tickers
            .iter()
            .filter(|t| {
                self.quotes
                    .get(t.as_str())
                    .map(|entry| !entry.is_fresh(now))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();

        if !uncached.is_empty() {
            match self.provider.get_batch_quotes(&uncached).await {
                Ok(fetched) => {
                    for quote in fetched {
                        self.quotes.insert(
                            quote.symbol.clone(),
                            CachedEntry {
                                data: quote,
                                fetched_at: now,
                            },
                        );
                    }
                }
                // Stale entries below still serve as a fallback.
                Err(err) => warn!("Batch quote fetch failed: {}", err),
            }
        }

        let mut result = HashMap::new();
        for ticker in tickers {
            if let Some(entry) = self.quotes.get(ticker.as_str()) {
                result.insert(ticker.clone(), entry.data.clone());
            }
        }
        Ok(result)
    }

    async fn get_historical_closes(
        &self,
        tickers: &[String],
        date: NaiveDate,
    ) -> Result<HashMap<String, Decimal>> {
        let mut result = HashMap::new();
        let mut uncached = Vec::new();

        for ticker in tickers {
            match self.historical_closes.get(&Self::close_key(ticker, date)) {
                Some(price) => {
                    result.insert(ticker.clone(), *price);
                }
                None => uncached.push(ticker.clone()),
            }
        }

        if !uncached.is_empty() {
            match self.provider.get_historical_closes(&uncached, date).await {
                Ok(prices) => {
                    for (ticker, price) in prices {
                        self.historical_closes
                            .insert(Self::close_key(&ticker, date), price);
                        result.insert(ticker, price);
                    }
                }
                Err(err) => warn!("Historical close fetch failed for {}: {}", date, err),
            }
        }

        Ok(result)
    }

    async fn get_profiles(&self, tickers: &[String]) -> Result<HashMap<String, CompanyProfile>> {
        let now = self.clock.now();
        let uncached: Vec<String> = tickers
            .iter()
            .filter(|t| {
                self.profiles
                    .get(t.as_str())
                    .map(|entry| !entry.is_fresh(now))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();

        if !uncached.is_empty() {
            match self.provider.get_company_profiles(&uncached).await {
                Ok(fetched) => {
                    for profile in fetched {
                        self.profiles.insert(
                            profile.symbol.clone(),
                            CachedEntry {
                                data: profile,
                                fetched_at: now,
                            },
                        );
                    }
                }
                Err(err) => warn!("Batch profile fetch failed: {}", err),
            }
        }

        let mut result = HashMap::new();
        for ticker in tickers {
            if let Some(entry) = self.profiles.get(ticker.as_str()) {
                result.insert(ticker.clone(), entry.data.clone());
            }
        }
        Ok(result)
    }
}
