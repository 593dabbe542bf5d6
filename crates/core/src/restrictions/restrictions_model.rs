//! Class and competition trading rules.
//!
//! A `RestrictionSet` is one explicit configuration structure with defaults,
//! validated once when the class or competition is created — not re-derived
//! per trade from loose fields.

use chrono::{DateTime, Duration, Months, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result, ValidationError};

/// How often a class allows trading the same ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TradeFrequency {
    #[default]
    Unlimited,
    OncePerDay,
    OncePerWeek,
    OncePerMonth,
}

impl TradeFrequency {
    /// Start of the window in which a prior trade on the same ticker blocks
    /// a new one: midnight today, seven days back, or one calendar month
    /// back. `None` means no limit.
    pub fn window_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TradeFrequency::Unlimited => None,
            TradeFrequency::OncePerDay => {
                Some(now.date_naive().and_hms_opt(0, 0, 0)?.and_utc())
            }
            TradeFrequency::OncePerWeek => Some(now - Duration::days(7)),
            TradeFrequency::OncePerMonth => now.checked_sub_months(Months::new(1)),
        }
    }

    pub fn period_name(&self) -> &'static str {
        match self {
            TradeFrequency::Unlimited => "trade",
            TradeFrequency::OncePerDay => "day",
            TradeFrequency::OncePerWeek => "week",
            TradeFrequency::OncePerMonth => "month",
        }
    }
}

/// Trading rules owned by a class or competition, consumed by the trade
/// ledger on every restricted trade.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RestrictionSet {
    /// Cap on distinct tickers a portfolio may hold.
    pub max_stocks_per_portfolio: Option<u32>,
    /// Whitelist of sectors; informational, matched against company
    /// profiles by the presentation layer.
    pub allowed_sectors: Option<Vec<String>>,
    /// Tickers a class forbids outright.
    pub blocked_tickers: Vec<String>,
    /// Cap on the projected dollar value held in any single ticker.
    pub max_dollars_per_stock: Option<Decimal>,
    pub trade_frequency: TradeFrequency,
    /// Whether every trade must carry a written rationale.
    pub require_rationale: bool,
    /// Shared secret required per trade when the class supervises trading.
    pub approval_code: Option<String>,
    /// Competition rule: projected position as a percent of starting cash.
    pub max_position_pct: Option<Decimal>,
    /// Competition rule: tickers excluded from this competition.
    pub restricted_tickers: Vec<String>,
    /// Competition rule: minimum distinct tickers a portfolio must keep.
    pub min_stocks: Option<u32>,
}

impl Default for RestrictionSet {
    fn default() -> Self {
        Self {
            max_stocks_per_portfolio: None,
            allowed_sectors: None,
            blocked_tickers: Vec::new(),
            max_dollars_per_stock: None,
            trade_frequency: TradeFrequency::Unlimited,
            require_rationale: true,
            approval_code: None,
            max_position_pct: None,
            restricted_tickers: Vec::new(),
            min_stocks: None,
        }
    }
}

impl RestrictionSet {
    /// Validates the configuration once, at class/competition creation.
    pub fn validate(&self) -> Result<()> {
        if let Some(code) = &self.approval_code {
            if code.trim().is_empty() {
                return Err(invalid("Approval code cannot be blank"));
            }
        }
        if self.max_stocks_per_portfolio == Some(0) {
            return Err(invalid("Max stocks per portfolio must be at least 1"));
        }
        if self.min_stocks == Some(0) {
            return Err(invalid("Min stocks must be at least 1"));
        }
        if let Some(cap) = self.max_dollars_per_stock {
            if cap <= Decimal::ZERO {
                return Err(invalid("Max dollars per stock must be positive"));
            }
        }
        if let Some(pct) = self.max_position_pct {
            if pct <= Decimal::ZERO || pct > Decimal::from(100) {
                return Err(invalid("Max position percent must be between 0 and 100"));
            }
        }
        Ok(())
    }
}

fn invalid(message: &str) -> Error {
    Error::Validation(ValidationError::InvalidInput(message.to_string()))
}

/// Six uppercase alphanumerics, handed to a class that turns on supervised
/// trading.
pub fn generate_approval_code() -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    (0..6)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}
