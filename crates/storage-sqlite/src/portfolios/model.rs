//! Database row types with Diesel derives, and their conversions to the
//! core domain models.
//!
//! Money and share quantities are stored as decimal strings; enums as their
//! lowercase storage strings; timestamps as naive UTC.

use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use beatspy_core::portfolios::{
    Holding, NewPortfolio, NewSnapshot, NewTrade, OwnerKind, Portfolio, PortfolioStatus, Snapshot,
    SnapshotHolding, SnapshotType, Trade, TradeSide,
};
use beatspy_core::{Error, Result};

pub(crate) fn to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(naive, Utc)
}

fn parse_decimal(value: &str) -> Result<Decimal> {
    Decimal::from_str(value).map_err(Error::from)
}

// ============================================================================
// portfolios
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::portfolios)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PortfolioDB {
    pub id: String,
    pub owner_type: String,
    pub owner_id: String,
    pub cash_balance: String,
    pub starting_cash: String,
    pub benchmark_ticker: String,
    pub is_public: bool,
    pub allow_reset: bool,
    pub status: String,
    pub reset_count: i32,
    pub closed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl PortfolioDB {
    /// Builds the row for a brand-new portfolio: cash starts at the
    /// configured starting balance.
    pub fn from_new(new_portfolio: &NewPortfolio, id: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            owner_type: new_portfolio.owner_kind.as_str().to_string(),
            owner_id: new_portfolio.owner_id.clone(),
            cash_balance: new_portfolio.starting_cash.to_string(),
            starting_cash: new_portfolio.starting_cash.to_string(),
            benchmark_ticker: new_portfolio.benchmark_ticker.clone(),
            is_public: new_portfolio.is_public,
            allow_reset: new_portfolio.allow_reset,
            status: PortfolioStatus::Active.as_str().to_string(),
            reset_count: 0,
            closed_at: None,
            created_at: created_at.naive_utc(),
        }
    }
}

impl TryFrom<PortfolioDB> for Portfolio {
    type Error = Error;

    fn try_from(row: PortfolioDB) -> Result<Self> {
        Ok(Portfolio {
            owner_kind: OwnerKind::from_str(&row.owner_type)?,
            cash_balance: parse_decimal(&row.cash_balance)?,
            starting_cash: parse_decimal(&row.starting_cash)?,
            status: PortfolioStatus::from_str(&row.status)?,
            closed_at: row.closed_at.map(to_utc),
            created_at: to_utc(row.created_at),
            id: row.id,
            owner_id: row.owner_id,
            benchmark_ticker: row.benchmark_ticker,
            is_public: row.is_public,
            allow_reset: row.allow_reset,
            reset_count: row.reset_count,
        })
    }
}

// ============================================================================
// holdings / benchmark_holdings
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::holdings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct HoldingDB {
    pub id: String,
    pub portfolio_id: String,
    pub ticker: String,
    pub shares: String,
    pub avg_cost: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::benchmark_holdings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct BenchmarkHoldingDB {
    pub id: String,
    pub portfolio_id: String,
    pub ticker: String,
    pub shares: String,
    pub avg_cost: String,
}

fn holding_from_parts(
    id: String,
    portfolio_id: String,
    ticker: String,
    shares: &str,
    avg_cost: &str,
) -> Result<Holding> {
    Ok(Holding {
        shares: parse_decimal(shares)?,
        avg_cost: parse_decimal(avg_cost)?,
        id,
        portfolio_id,
        ticker,
    })
}

impl TryFrom<HoldingDB> for Holding {
    type Error = Error;

    fn try_from(row: HoldingDB) -> Result<Self> {
        holding_from_parts(row.id, row.portfolio_id, row.ticker, &row.shares, &row.avg_cost)
    }
}

impl TryFrom<BenchmarkHoldingDB> for Holding {
    type Error = Error;

    fn try_from(row: BenchmarkHoldingDB) -> Result<Self> {
        holding_from_parts(row.id, row.portfolio_id, row.ticker, &row.shares, &row.avg_cost)
    }
}

// ============================================================================
// trades / benchmark_trades
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::trades)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TradeDB {
    pub id: String,
    pub portfolio_id: String,
    pub user_id: Option<String>,
    pub ticker: String,
    pub side: String,
    pub dollars: String,
    pub shares: String,
    pub price: String,
    pub rationale: Option<String>,
    pub executed_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::benchmark_trades)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct BenchmarkTradeDB {
    pub id: String,
    pub portfolio_id: String,
    pub user_id: Option<String>,
    pub ticker: String,
    pub side: String,
    pub dollars: String,
    pub shares: String,
    pub price: String,
    pub rationale: Option<String>,
    pub executed_at: NaiveDateTime,
}

pub(crate) fn trade_row_fields(new_trade: &NewTrade, id: String) -> TradeDB {
    TradeDB {
        id,
        portfolio_id: new_trade.portfolio_id.clone(),
        user_id: new_trade.user_id.clone(),
        ticker: new_trade.ticker.clone(),
        side: new_trade.side.as_str().to_string(),
        dollars: new_trade.dollars.to_string(),
        shares: new_trade.shares.to_string(),
        price: new_trade.price.to_string(),
        rationale: new_trade.rationale.clone(),
        executed_at: new_trade.executed_at.naive_utc(),
    }
}

impl From<TradeDB> for BenchmarkTradeDB {
    fn from(row: TradeDB) -> Self {
        BenchmarkTradeDB {
            id: row.id,
            portfolio_id: row.portfolio_id,
            user_id: row.user_id,
            ticker: row.ticker,
            side: row.side,
            dollars: row.dollars,
            shares: row.shares,
            price: row.price,
            rationale: row.rationale,
            executed_at: row.executed_at,
        }
    }
}

fn trade_from_parts(row: TradeDB) -> Result<Trade> {
    Ok(Trade {
        side: TradeSide::from_str(&row.side)?,
        dollars: parse_decimal(&row.dollars)?,
        shares: parse_decimal(&row.shares)?,
        price: parse_decimal(&row.price)?,
        executed_at: to_utc(row.executed_at),
        id: row.id,
        portfolio_id: row.portfolio_id,
        user_id: row.user_id,
        ticker: row.ticker,
        rationale: row.rationale,
    })
}

impl TryFrom<TradeDB> for Trade {
    type Error = Error;

    fn try_from(row: TradeDB) -> Result<Self> {
        trade_from_parts(row)
    }
}

impl TryFrom<BenchmarkTradeDB> for Trade {
    type Error = Error;

    fn try_from(row: BenchmarkTradeDB) -> Result<Self> {
        trade_from_parts(TradeDB {
            id: row.id,
            portfolio_id: row.portfolio_id,
            user_id: row.user_id,
            ticker: row.ticker,
            side: row.side,
            dollars: row.dollars,
            shares: row.shares,
            price: row.price,
            rationale: row.rationale,
            executed_at: row.executed_at,
        })
    }
}

// ============================================================================
// portfolio_snapshots
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::portfolio_snapshots)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SnapshotDB {
    pub id: String,
    pub portfolio_id: String,
    pub snapshot_type: String,
    pub cash_balance: String,
    pub starting_cash: String,
    pub total_value: String,
    pub return_pct: String,
    pub holdings: String,
    pub snapshotted_at: NaiveDateTime,
}

impl SnapshotDB {
    pub fn from_new(snapshot: &NewSnapshot, id: String) -> Result<Self> {
        Ok(Self {
            id,
            portfolio_id: snapshot.portfolio_id.clone(),
            snapshot_type: snapshot.snapshot_type.as_str().to_string(),
            cash_balance: snapshot.cash_balance.to_string(),
            starting_cash: snapshot.starting_cash.to_string(),
            total_value: snapshot.total_value.to_string(),
            return_pct: snapshot.return_pct.to_string(),
            holdings: serde_json::to_string(&snapshot.holdings).map_err(Error::from)?,
            snapshotted_at: snapshot.snapshotted_at.naive_utc(),
        })
    }
}

impl TryFrom<SnapshotDB> for Snapshot {
    type Error = Error;

    fn try_from(row: SnapshotDB) -> Result<Self> {
        let holdings: Vec<SnapshotHolding> =
            serde_json::from_str(&row.holdings).map_err(Error::from)?;
        Ok(Snapshot {
            snapshot_type: SnapshotType::from_str(&row.snapshot_type)?,
            cash_balance: parse_decimal(&row.cash_balance)?,
            starting_cash: parse_decimal(&row.starting_cash)?,
            total_value: parse_decimal(&row.total_value)?,
            return_pct: parse_decimal(&row.return_pct)?,
            snapshotted_at: to_utc(row.snapshotted_at),
            holdings,
            id: row.id,
            portfolio_id: row.portfolio_id,
        })
    }
}
