//! Market data provider and service traits.
//!
//! The provider trait is the read contract against the external quote feed;
//! the service trait is what the rest of the core consumes (cached, batched,
//! failure-tolerant).

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;

use super::market_data_model::{CompanyProfile, Quote};
use super::MarketDataError;
use crate::errors::Result;

/// Raw upstream feed. Implementations perform network I/O and know nothing
/// about caching.
#[async_trait]
pub trait MarketDataProviderTrait: Send + Sync {
    /// Latest quote for one ticker; `None` when the feed does not know it.
    async fn get_quote(&self, ticker: &str)
        -> std::result::Result<Option<Quote>, MarketDataError>;

    /// Latest quotes for many tickers in one round trip. Unknown tickers are
    /// simply absent from the result.
    async fn get_batch_quotes(
        &self,
        tickers: &[String],
    ) -> std::result::Result<Vec<Quote>, MarketDataError>;

    /// Closing price per ticker for the nearest trading day at or before
    /// `date`.
    async fn get_historical_closes(
        &self,
        tickers: &[String],
        date: NaiveDate,
    ) -> std::result::Result<HashMap<String, Decimal>, MarketDataError>;

    /// Company reference data (sector, beta) for many tickers.
    async fn get_company_profiles(
        &self,
        tickers: &[String],
    ) -> std::result::Result<Vec<CompanyProfile>, MarketDataError>;
}

/// Cached market data access consumed by the ledger, snapshot, and
/// leaderboard services.
#[async_trait]
pub trait MarketDataServiceTrait: Send + Sync {
    /// Quote for a single ticker, served from cache within the TTL.
    async fn get_quote(&self, ticker: &str) -> Result<Option<Quote>>;

    /// Quotes for many tickers; only uncached tickers hit the provider.
    async fn get_quotes(&self, tickers: &[String]) -> Result<HashMap<String, Quote>>;

    /// Historical closes at or before `date`, cached indefinitely (past
    /// closes are immutable facts).
    async fn get_historical_closes(
        &self,
        tickers: &[String],
        date: NaiveDate,
    ) -> Result<HashMap<String, Decimal>>;

    /// Company profiles for many tickers, cached like quotes.
    async fn get_profiles(&self, tickers: &[String]) -> Result<HashMap<String, CompanyProfile>>;
}
