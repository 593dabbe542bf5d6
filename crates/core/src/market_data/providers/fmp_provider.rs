//! Financial Modeling Prep (FMP) market data provider.
//!
//! Endpoints used:
//! - `/quote/{tickers}` for live quotes (comma-separated batch)
//! - `/profile/{tickers}` for company profiles (sector, beta)
//! - `/historical-price-full/{tickers}` for daily closes
//!
//! API documentation: https://site.financialmodelingprep.com/developer/docs

use std::collections::HashMap;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use log::debug;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::super::market_data_constants::HISTORICAL_CLOSE_LOOKBACK_DAYS;
use super::super::market_data_model::{CompanyProfile, Quote};
use super::super::market_data_traits::MarketDataProviderTrait;
use super::super::MarketDataError;

const DEFAULT_BASE_URL: &str = "https://financialmodelingprep.com/api/v3";

// ============================================================================
// API response structures
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FmpQuote {
    symbol: String,
    price: Option<Decimal>,
    previous_close: Option<Decimal>,
}

impl From<FmpQuote> for Quote {
    fn from(q: FmpQuote) -> Self {
        Quote {
            symbol: q.symbol,
            price: q.price,
            previous_close: q.previous_close,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FmpProfile {
    symbol: String,
    company_name: Option<String>,
    sector: Option<String>,
    beta: Option<Decimal>,
}

impl From<FmpProfile> for CompanyProfile {
    fn from(p: FmpProfile) -> Self {
        CompanyProfile {
            symbol: p.symbol,
            company_name: p.company_name,
            sector: p.sector,
            beta: p.beta,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FmpHistoricalBar {
    date: NaiveDate,
    close: Option<Decimal>,
    adj_close: Option<Decimal>,
}

impl FmpHistoricalBar {
    fn effective_close(&self) -> Option<Decimal> {
        self.adj_close.or(self.close)
    }
}

#[derive(Debug, Deserialize)]
struct FmpHistoricalSeries {
    symbol: Option<String>,
    #[serde(default)]
    historical: Vec<FmpHistoricalBar>,
}

/// Batch responses come back as `{ historicalStockList: [...] }`, single-
/// ticker responses as `{ symbol, historical: [...] }`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FmpHistoricalResponse {
    #[serde(default)]
    historical_stock_list: Option<Vec<FmpHistoricalSeries>>,
    symbol: Option<String>,
    #[serde(default)]
    historical: Vec<FmpHistoricalBar>,
}

// ============================================================================
// FmpProvider
// ============================================================================

pub struct FmpProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl FmpProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Point the provider at a non-default host, e.g. a local stub in tests.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, MarketDataError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("FMP request: {}", endpoint);

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketDataError::Provider(format!(
                "FMP returned HTTP {} for {}",
                status, endpoint
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| MarketDataError::Parse(e.to_string()))
    }
}

#[async_trait]
impl MarketDataProviderTrait for FmpProvider {
    async fn get_quote(&self, ticker: &str) -> Result<Option<Quote>, MarketDataError> {
        let quotes: Vec<FmpQuote> = self.fetch(&format!("/quote/{}", ticker), &[]).await?;
        Ok(quotes.into_iter().next().map(Quote::from))
    }

    async fn get_batch_quotes(&self, tickers: &[String]) -> Result<Vec<Quote>, MarketDataError> {
        if tickers.is_empty() {
            return Ok(Vec::new());
        }
        let quotes: Vec<FmpQuote> = self
            .fetch(&format!("/quote/{}", tickers.join(",")), &[])
            .await?;
        Ok(quotes.into_iter().map(Quote::from).collect())
    }

    async fn get_historical_closes(
        &self,
        tickers: &[String],
        date: NaiveDate,
    ) -> Result<HashMap<String, Decimal>, MarketDataError> {
        if tickers.is_empty() {
            return Ok(HashMap::new());
        }

        // A small window before the target date covers weekends and holidays.
        let from = date - Duration::days(HISTORICAL_CLOSE_LOOKBACK_DAYS);
        let params = [
            ("from", from.to_string()),
            ("to", date.to_string()),
            ("serietype", "line".to_string()),
        ];
        let response: FmpHistoricalResponse = self
            .fetch(
                &format!("/historical-price-full/{}", tickers.join(",")),
                &params,
            )
            .await?;

        let series = match response.historical_stock_list {
            Some(list) => list,
            None => vec![FmpHistoricalSeries {
                symbol: response.symbol.or_else(|| tickers.first().cloned()),
                historical: response.historical,
            }],
        };

        let mut result = HashMap::new();
        for stock in series {
            let Some(symbol) = stock.symbol else { continue };
            let mut bars = stock.historical;
            bars.sort_by(|a, b| b.date.cmp(&a.date));
            let close = bars
                .iter()
                .find(|bar| bar.date <= date)
                .and_then(FmpHistoricalBar::effective_close);
            if let Some(price) = close {
                result.insert(symbol, price);
            }
        }
        Ok(result)
    }

    async fn get_company_profiles(
        &self,
        tickers: &[String],
    ) -> Result<Vec<CompanyProfile>, MarketDataError> {
        if tickers.is_empty() {
            return Ok(Vec::new());
        }
        let profiles: Vec<FmpProfile> = self
            .fetch(&format!("/profile/{}", tickers.join(",")), &[])
            .await?;
        Ok(profiles.into_iter().map(CompanyProfile::from).collect())
    }
}
