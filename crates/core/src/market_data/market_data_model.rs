//! Market data domain models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A point-sample quote for one ticker.
///
/// `price` may be absent or zero outside market hours for some feeds;
/// `previous_close` then stands in for trade execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub price: Option<Decimal>,
    pub previous_close: Option<Decimal>,
}

impl Quote {
    /// The price a trade executes at: the live price, falling back to the
    /// previous close when the market is closed. `None` when neither is a
    /// positive number.
    pub fn trade_price(&self) -> Option<Decimal> {
        [self.price, self.previous_close]
            .into_iter()
            .flatten()
            .find(|p| *p > Decimal::ZERO)
    }

    /// Best available current price for valuation purposes.
    pub fn valuation_price(&self) -> Option<Decimal> {
        self.trade_price()
    }
}

/// Company reference data; only `beta` and `sector` matter to the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    pub symbol: String,
    pub company_name: Option<String>,
    pub sector: Option<String>,
    pub beta: Option<Decimal>,
}
