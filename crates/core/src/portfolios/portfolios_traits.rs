//! Portfolio repository trait.
//!
//! The contract between the trading services and the persistence layer,
//! free of database-specific types. Reads are synchronous pool queries;
//! mutations are async and MUST be applied atomically — the `apply_*`
//! payloads each describe one consistency unit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::portfolios_model::{
    CloseApplication, Holding, NewPortfolio, OwnerKind, Portfolio, ResetApplication, Snapshot,
    Trade, TradeApplication,
};
use crate::errors::Result;

#[async_trait]
pub trait PortfolioRepositoryTrait: Send + Sync {
    // --- portfolios ---

    fn get_portfolio(&self, portfolio_id: &str) -> Result<Option<Portfolio>>;

    /// The single active portfolio for an owner, if any.
    fn find_active_for_owner(
        &self,
        owner_kind: OwnerKind,
        owner_id: &str,
    ) -> Result<Option<Portfolio>>;

    async fn insert_portfolio(&self, new_portfolio: NewPortfolio) -> Result<Portfolio>;

    /// Points future mirrored trades at a new benchmark ticker. Existing
    /// benchmark holdings are left untouched.
    async fn set_benchmark_ticker(&self, portfolio_id: &str, ticker: &str) -> Result<()>;

    /// Overwrites the cash balance (bonus awards). Trades never use this;
    /// their cash change rides inside `apply_trade`.
    async fn set_cash_balance(&self, portfolio_id: &str, cash_balance: Decimal) -> Result<()>;

    // --- holdings ---

    fn list_holdings(&self, portfolio_id: &str) -> Result<Vec<Holding>>;

    // --- trades ---

    /// Full trade log, newest first. This ordering is a precondition of
    /// as-of reconstruction.
    fn list_trades_desc(&self, portfolio_id: &str) -> Result<Vec<Trade>>;

    /// Execution instant of the most recent trade on a ticker, for
    /// trade-frequency checks.
    fn last_trade_on_ticker(
        &self,
        portfolio_id: &str,
        ticker: &str,
    ) -> Result<Option<DateTime<Utc>>>;

    // --- benchmark mirror ---

    fn list_benchmark_holdings(&self, portfolio_id: &str) -> Result<Vec<Holding>>;

    fn list_benchmark_trades_desc(&self, portfolio_id: &str) -> Result<Vec<Trade>>;

    // --- atomic mutations ---

    /// Applies a full trade (trade row, holding change, cash balance, and
    /// optional benchmark mirror) in one transaction. Returns the persisted
    /// primary trade.
    async fn apply_trade(&self, application: TradeApplication) -> Result<Trade>;

    /// Archives a snapshot, wipes holdings and benchmark holdings, restores
    /// cash, and bumps the reset counter, all in one transaction.
    async fn apply_reset(&self, application: ResetApplication) -> Result<Snapshot>;

    /// Archives a snapshot, zeroes and closes the portfolio, and inserts the
    /// replacement, all in one transaction.
    async fn apply_close(&self, application: CloseApplication) -> Result<(Snapshot, Portfolio)>;

    // --- snapshots ---

    fn list_snapshots(&self, portfolio_id: &str) -> Result<Vec<Snapshot>>;
}
