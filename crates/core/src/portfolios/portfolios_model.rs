//! Portfolio domain models: the ledger's cash/holdings/trade-log state,
//! snapshots, and the write payloads applied atomically by the storage layer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{DEFAULT_BENCHMARK_TICKER, DEFAULT_STARTING_CASH};
use crate::errors::{Error, Result, ValidationError};
use crate::portfolios::LedgerError;

/// Who a portfolio belongs to. Group and competition portfolios are shared;
/// only individual portfolios participate in the one-active-per-owner rule
/// and may be closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OwnerKind {
    Individual,
    Group,
    Competition,
}

impl OwnerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerKind::Individual => "individual",
            OwnerKind::Group => "group",
            OwnerKind::Competition => "competition",
        }
    }
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "individual" => Ok(OwnerKind::Individual),
            "group" => Ok(OwnerKind::Group),
            "competition" => Ok(OwnerKind::Competition),
            other => Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Unknown owner type: {}",
                other
            )))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PortfolioStatus {
    #[default]
    Active,
    Closed,
}

impl PortfolioStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortfolioStatus::Active => "active",
            PortfolioStatus::Closed => "closed",
        }
    }
}

impl FromStr for PortfolioStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(PortfolioStatus::Active),
            "closed" => Ok(PortfolioStatus::Closed),
            other => Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Unknown portfolio status: {}",
                other
            )))),
        }
    }
}

/// A participant's virtual brokerage account.
///
/// Invariant: `cash_balance >= 0` at all times; the ledger rejects any trade
/// that would break it before touching storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub id: String,
    pub owner_kind: OwnerKind,
    pub owner_id: String,
    pub cash_balance: Decimal,
    pub starting_cash: Decimal,
    pub benchmark_ticker: String,
    pub is_public: bool,
    pub allow_reset: bool,
    pub status: PortfolioStatus,
    pub reset_count: i32,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Portfolio {
    /// Economically empty portfolios may be reset even under a no-reset
    /// policy.
    pub fn is_empty(&self, holdings: &[Holding]) -> bool {
        self.cash_balance.is_zero() && holdings.is_empty()
    }
}

/// Input model for creating a portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPortfolio {
    pub owner_kind: OwnerKind,
    pub owner_id: String,
    pub starting_cash: Decimal,
    pub benchmark_ticker: String,
    pub is_public: bool,
    pub allow_reset: bool,
}

impl NewPortfolio {
    /// The standard personal portfolio opened at signup: default starting
    /// cash, broad-market benchmark, resettable.
    pub fn personal(owner_id: impl Into<String>) -> Self {
        Self {
            owner_kind: OwnerKind::Individual,
            owner_id: owner_id.into(),
            starting_cash: DEFAULT_STARTING_CASH,
            benchmark_ticker: DEFAULT_BENCHMARK_TICKER.to_string(),
            is_public: true,
            allow_reset: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.owner_id.trim().is_empty() {
            return Err(Error::Validation(ValidationError::MissingField(
                "ownerId".to_string(),
            )));
        }
        if self.starting_cash <= Decimal::ZERO {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Starting cash must be positive".to_string(),
            )));
        }
        if self.benchmark_ticker.trim().is_empty() {
            return Err(Error::Validation(ValidationError::MissingField(
                "benchmarkTicker".to_string(),
            )));
        }
        Ok(())
    }
}

/// One position in a portfolio. Unique per (portfolio, ticker); removed when
/// shares fall under the dust threshold. `avg_cost` is a shares-weighted
/// running average, recomputed on every buy and never changed by a sell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub id: String,
    pub portfolio_id: String,
    pub ticker: String,
    pub shares: Decimal,
    pub avg_cost: Decimal,
}

/// A holding enriched with a current price, for restriction checks and
/// valuation. `current_price` is `None` when no quote resolved; consumers
/// fall back to `avg_cost`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedHolding {
    pub ticker: String,
    pub shares: Decimal,
    pub avg_cost: Decimal,
    pub current_price: Option<Decimal>,
}

impl PricedHolding {
    pub fn position_value(&self) -> Decimal {
        self.shares * self.current_price.unwrap_or(self.avg_cost)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }
}

impl FromStr for TradeSide {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "buy" => Ok(TradeSide::Buy),
            "sell" => Ok(TradeSide::Sell),
            other => Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Unknown trade side: {}",
                other
            )))),
        }
    }
}

/// Immutable, append-only trade record. The trade log is the source of truth
/// from which holdings and cash can be rederived.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    pub portfolio_id: String,
    pub user_id: Option<String>,
    pub ticker: String,
    pub side: TradeSide,
    pub dollars: Decimal,
    pub shares: Decimal,
    pub price: Decimal,
    pub rationale: Option<String>,
    pub executed_at: DateTime<Utc>,
}

/// Trade record ready for insertion; the storage layer assigns the row id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTrade {
    pub portfolio_id: String,
    pub user_id: Option<String>,
    pub ticker: String,
    pub side: TradeSide,
    pub dollars: Decimal,
    pub shares: Decimal,
    pub price: Decimal,
    pub rationale: Option<String>,
    pub executed_at: DateTime<Utc>,
}

/// A buy/sell request against one portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    pub portfolio_id: String,
    pub user_id: Option<String>,
    pub ticker: String,
    pub dollars: Decimal,
    pub approval_code: Option<String>,
    pub rationale: Option<String>,
}

impl TradeRequest {
    pub fn validate(&self) -> Result<()> {
        if self.ticker.trim().is_empty() {
            return Err(Error::Validation(ValidationError::MissingField(
                "ticker".to_string(),
            )));
        }
        if self.dollars <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount.into());
        }
        Ok(())
    }
}

/// What a successful trade executed as.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TradeConfirmation {
    pub shares: Decimal,
    pub price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SnapshotType {
    Reset,
    Close,
}

impl SnapshotType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotType::Reset => "reset",
            SnapshotType::Close => "close",
        }
    }
}

impl FromStr for SnapshotType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "reset" => Ok(SnapshotType::Reset),
            "close" => Ok(SnapshotType::Close),
            other => Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Unknown snapshot type: {}",
                other
            )))),
        }
    }
}

/// One holding as captured inside a snapshot, enriched with the price and
/// market value at capture time. Stored denormalized as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotHolding {
    pub ticker: String,
    pub shares: Decimal,
    pub avg_cost: Decimal,
    pub price: Decimal,
    pub market_value: Decimal,
}

/// Write-once archive of a portfolio's state at a reset or close boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: String,
    pub portfolio_id: String,
    pub snapshot_type: SnapshotType,
    pub cash_balance: Decimal,
    pub starting_cash: Decimal,
    pub total_value: Decimal,
    pub return_pct: Decimal,
    pub holdings: Vec<SnapshotHolding>,
    pub snapshotted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSnapshot {
    pub portfolio_id: String,
    pub snapshot_type: SnapshotType,
    pub cash_balance: Decimal,
    pub starting_cash: Decimal,
    pub total_value: Decimal,
    pub return_pct: Decimal,
    pub holdings: Vec<SnapshotHolding>,
    pub snapshotted_at: DateTime<Utc>,
}

// ============================================================================
// Atomic write payloads
// ============================================================================
//
// Trade execution is a multi-step sequence (trade insert, holding upsert,
// cash update, benchmark mirror). The ledger computes the whole mutation
// up front and hands it to the repository as one value; the storage layer
// applies it inside a single transaction on its single-writer connection,
// so a mid-sequence failure leaves no partial state behind.

/// New state for one holding row after a trade.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HoldingUpsert {
    pub ticker: String,
    pub shares: Decimal,
    pub avg_cost: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum HoldingMutation {
    Upsert(HoldingUpsert),
    Remove { ticker: String },
}

/// The benchmark side of a trade: the mirrored trade record plus the
/// benchmark-holding change it implies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorApplication {
    pub trade: NewTrade,
    pub holding: HoldingMutation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeApplication {
    pub portfolio_id: String,
    pub new_cash_balance: Decimal,
    pub trade: NewTrade,
    pub holding: HoldingMutation,
    pub mirror: Option<MirrorApplication>,
}

/// Snapshot-and-restore payload for a portfolio reset. Trade history is
/// preserved; holdings and benchmark holdings are wiped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetApplication {
    pub portfolio_id: String,
    pub snapshot: NewSnapshot,
    pub restored_cash: Decimal,
}

/// Terminal close payload: archive, zero out, and open a replacement
/// portfolio for the same owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseApplication {
    pub portfolio_id: String,
    pub snapshot: NewSnapshot,
    pub closed_at: DateTime<Utc>,
    pub replacement: NewPortfolio,
}

/// Result of closing a portfolio: the archive snapshot and the fresh
/// replacement portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioCloseOutcome {
    pub snapshot: Snapshot,
    pub replacement: Portfolio,
}
