pub mod market_data_constants;
pub mod market_data_model;
pub mod market_data_service;
pub mod market_data_traits;
pub mod providers;


use thiserror::Error;

pub use market_data_model::{CompanyProfile, Quote};
pub use market_data_service::MarketDataService;
pub use market_data_traits::{MarketDataProviderTrait, MarketDataServiceTrait};

/// Errors surfaced by market data providers and the caching service.
#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("Provider request failed: {0}")]
    Provider(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to parse provider response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for MarketDataError {
    fn from(err: reqwest::Error) -> Self {
        MarketDataError::Network(err.to_string())
    }
}
