//! Diesel implementation of the portfolio repository.
//!
//! Reads go straight to the pool; every mutation is shipped to the writer
//! actor, where it runs inside a single immediate transaction. The atomic
//! `apply_*` payloads from the core each map to exactly one writer job.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use beatspy_core::portfolios::{
    CloseApplication, Holding, HoldingMutation, NewPortfolio, OwnerKind, Portfolio,
    PortfolioRepositoryTrait, PortfolioStatus, ResetApplication, Snapshot, Trade,
    TradeApplication,
};
use beatspy_core::Result;

use super::model::{
    to_utc, trade_row_fields, BenchmarkHoldingDB, BenchmarkTradeDB, HoldingDB, PortfolioDB,
    SnapshotDB, TradeDB,
};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::{
    benchmark_holdings, benchmark_trades, holdings, portfolio_snapshots, portfolios, trades,
};

pub struct PortfolioRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl PortfolioRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl PortfolioRepositoryTrait for PortfolioRepository {
    fn get_portfolio(&self, portfolio_id: &str) -> Result<Option<Portfolio>> {
        let mut conn = get_connection(&self.pool)?;
        let row = portfolios::table
            .find(portfolio_id)
            .select(PortfolioDB::as_select())
            .first::<PortfolioDB>(&mut conn)
            .optional()
            .into_core()?;
        row.map(Portfolio::try_from).transpose()
    }

    fn find_active_for_owner(
        &self,
        owner_kind: OwnerKind,
        owner_id: &str,
    ) -> Result<Option<Portfolio>> {
        let mut conn = get_connection(&self.pool)?;
        let row = portfolios::table
            .filter(portfolios::owner_type.eq(owner_kind.as_str()))
            .filter(portfolios::owner_id.eq(owner_id))
            .filter(portfolios::status.eq(PortfolioStatus::Active.as_str()))
            .select(PortfolioDB::as_select())
            .first::<PortfolioDB>(&mut conn)
            .optional()
            .into_core()?;
        row.map(Portfolio::try_from).transpose()
    }

    async fn insert_portfolio(&self, new_portfolio: NewPortfolio) -> Result<Portfolio> {
        new_portfolio.validate()?;
        let row = PortfolioDB::from_new(&new_portfolio, Uuid::new_v4().to_string(), Utc::now());
        let row_to_insert = row.clone();
        self.writer
            .exec(move |conn| {
                diesel::insert_into(portfolios::table)
                    .values(&row_to_insert)
                    .execute(conn)
                    .into_core()?;
                Ok(())
            })
            .await?;
        Portfolio::try_from(row)
    }

    async fn set_benchmark_ticker(&self, portfolio_id: &str, ticker: &str) -> Result<()> {
        let portfolio_id = portfolio_id.to_string();
        let ticker = ticker.to_string();
        self.writer
            .exec(move |conn| {
                diesel::update(portfolios::table.find(&portfolio_id))
                    .set(portfolios::benchmark_ticker.eq(&ticker))
                    .execute(conn)
                    .into_core()?;
                Ok(())
            })
            .await
    }

    async fn set_cash_balance(&self, portfolio_id: &str, cash_balance: Decimal) -> Result<()> {
        let portfolio_id = portfolio_id.to_string();
        let balance = cash_balance.to_string();
        self.writer
            .exec(move |conn| {
                diesel::update(portfolios::table.find(&portfolio_id))
                    .set(portfolios::cash_balance.eq(&balance))
                    .execute(conn)
                    .into_core()?;
                Ok(())
            })
            .await
    }

    fn list_holdings(&self, portfolio_id: &str) -> Result<Vec<Holding>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = holdings::table
            .filter(holdings::portfolio_id.eq(portfolio_id))
            .order(holdings::ticker.asc())
            .select(HoldingDB::as_select())
            .load::<HoldingDB>(&mut conn)
            .into_core()?;
        rows.into_iter().map(Holding::try_from).collect()
    }

    fn list_trades_desc(&self, portfolio_id: &str) -> Result<Vec<Trade>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = trades::table
            .filter(trades::portfolio_id.eq(portfolio_id))
            .order(trades::executed_at.desc())
            .select(TradeDB::as_select())
            .load::<TradeDB>(&mut conn)
            .into_core()?;
        rows.into_iter().map(Trade::try_from).collect()
    }

    fn last_trade_on_ticker(
        &self,
        portfolio_id: &str,
        ticker: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let mut conn = get_connection(&self.pool)?;
        let latest = trades::table
            .filter(trades::portfolio_id.eq(portfolio_id))
            .filter(trades::ticker.eq(ticker))
            .select(diesel::dsl::max(trades::executed_at))
            .first::<Option<NaiveDateTime>>(&mut conn)
            .into_core()?;
        Ok(latest.map(to_utc))
    }

    fn list_benchmark_holdings(&self, portfolio_id: &str) -> Result<Vec<Holding>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = benchmark_holdings::table
            .filter(benchmark_holdings::portfolio_id.eq(portfolio_id))
            .order(benchmark_holdings::ticker.asc())
            .select(BenchmarkHoldingDB::as_select())
            .load::<BenchmarkHoldingDB>(&mut conn)
            .into_core()?;
        rows.into_iter().map(Holding::try_from).collect()
    }

    fn list_benchmark_trades_desc(&self, portfolio_id: &str) -> Result<Vec<Trade>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = benchmark_trades::table
            .filter(benchmark_trades::portfolio_id.eq(portfolio_id))
            .order(benchmark_trades::executed_at.desc())
            .select(BenchmarkTradeDB::as_select())
            .load::<BenchmarkTradeDB>(&mut conn)
            .into_core()?;
        rows.into_iter().map(Trade::try_from).collect()
    }

    async fn apply_trade(&self, application: TradeApplication) -> Result<Trade> {
        let trade_row = trade_row_fields(&application.trade, Uuid::new_v4().to_string());
        let mirror = application.mirror.map(|m| {
            (
                trade_row_fields(&m.trade, Uuid::new_v4().to_string()),
                m.holding,
            )
        });
        let portfolio_id = application.portfolio_id;
        let new_cash = application.new_cash_balance.to_string();
        let holding_mutation = application.holding;
        let persisted = trade_row.clone();

        self.writer
            .exec(move |conn| {
                diesel::insert_into(trades::table)
                    .values(&trade_row)
                    .execute(conn)
                    .into_core()?;

                apply_holding_mutation(conn, &portfolio_id, &holding_mutation)?;

                diesel::update(portfolios::table.find(&portfolio_id))
                    .set(portfolios::cash_balance.eq(&new_cash))
                    .execute(conn)
                    .into_core()?;

                if let Some((mirror_trade, mirror_holding)) = mirror {
                    let mirror_row: BenchmarkTradeDB = mirror_trade.into();
                    diesel::insert_into(benchmark_trades::table)
                        .values(&mirror_row)
                        .execute(conn)
                        .into_core()?;
                    apply_benchmark_holding_mutation(conn, &portfolio_id, &mirror_holding)?;
                }

                Ok(())
            })
            .await?;

        Trade::try_from(persisted)
    }

    async fn apply_reset(&self, application: ResetApplication) -> Result<Snapshot> {
        let snapshot_row = SnapshotDB::from_new(&application.snapshot, Uuid::new_v4().to_string())?;
        let portfolio_id = application.portfolio_id;
        let restored = application.restored_cash.to_string();
        let persisted = snapshot_row.clone();

        self.writer
            .exec(move |conn| {
                diesel::insert_into(portfolio_snapshots::table)
                    .values(&snapshot_row)
                    .execute(conn)
                    .into_core()?;

                clear_holdings(conn, &portfolio_id)?;

                diesel::update(portfolios::table.find(&portfolio_id))
                    .set((
                        portfolios::cash_balance.eq(&restored),
                        portfolios::reset_count.eq(portfolios::reset_count + 1),
                    ))
                    .execute(conn)
                    .into_core()?;

                Ok(())
            })
            .await?;

        Snapshot::try_from(persisted)
    }

    async fn apply_close(&self, application: CloseApplication) -> Result<(Snapshot, Portfolio)> {
        let snapshot_row = SnapshotDB::from_new(&application.snapshot, Uuid::new_v4().to_string())?;
        let replacement_row = PortfolioDB::from_new(
            &application.replacement,
            Uuid::new_v4().to_string(),
            application.closed_at,
        );
        let portfolio_id = application.portfolio_id;
        let closed_at = application.closed_at.naive_utc();
        let persisted_snapshot = snapshot_row.clone();
        let persisted_replacement = replacement_row.clone();

        self.writer
            .exec(move |conn| {
                diesel::insert_into(portfolio_snapshots::table)
                    .values(&snapshot_row)
                    .execute(conn)
                    .into_core()?;

                clear_holdings(conn, &portfolio_id)?;

                diesel::update(portfolios::table.find(&portfolio_id))
                    .set((
                        portfolios::cash_balance.eq(Decimal::ZERO.to_string()),
                        portfolios::status.eq(PortfolioStatus::Closed.as_str()),
                        portfolios::closed_at.eq(Some(closed_at)),
                    ))
                    .execute(conn)
                    .into_core()?;

                diesel::insert_into(portfolios::table)
                    .values(&replacement_row)
                    .execute(conn)
                    .into_core()?;

                Ok(())
            })
            .await?;

        Ok((
            Snapshot::try_from(persisted_snapshot)?,
            Portfolio::try_from(persisted_replacement)?,
        ))
    }

    fn list_snapshots(&self, portfolio_id: &str) -> Result<Vec<Snapshot>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = portfolio_snapshots::table
            .filter(portfolio_snapshots::portfolio_id.eq(portfolio_id))
            .order(portfolio_snapshots::snapshotted_at.desc())
            .select(SnapshotDB::as_select())
            .load::<SnapshotDB>(&mut conn)
            .into_core()?;
        rows.into_iter().map(Snapshot::try_from).collect()
    }
}

/// Upserts (or deletes) the primary holding row described by a mutation.
fn apply_holding_mutation(
    conn: &mut SqliteConnection,
    portfolio_id: &str,
    mutation: &HoldingMutation,
) -> Result<()> {
    match mutation {
        HoldingMutation::Upsert(upsert) => {
            let affected = diesel::update(
                holdings::table
                    .filter(holdings::portfolio_id.eq(portfolio_id))
                    .filter(holdings::ticker.eq(&upsert.ticker)),
            )
            .set((
                holdings::shares.eq(upsert.shares.to_string()),
                holdings::avg_cost.eq(upsert.avg_cost.to_string()),
            ))
            .execute(conn)
            .into_core()?;

            if affected == 0 {
                let row = HoldingDB {
                    id: Uuid::new_v4().to_string(),
                    portfolio_id: portfolio_id.to_string(),
                    ticker: upsert.ticker.clone(),
                    shares: upsert.shares.to_string(),
                    avg_cost: upsert.avg_cost.to_string(),
                };
                diesel::insert_into(holdings::table)
                    .values(&row)
                    .execute(conn)
                    .into_core()?;
            }
        }
        HoldingMutation::Remove { ticker } => {
            diesel::delete(
                holdings::table
                    .filter(holdings::portfolio_id.eq(portfolio_id))
                    .filter(holdings::ticker.eq(ticker)),
            )
            .execute(conn)
            .into_core()?;
        }
    }
    Ok(())
}

/// Same as `apply_holding_mutation`, against the benchmark table.
fn apply_benchmark_holding_mutation(
    conn: &mut SqliteConnection,
    portfolio_id: &str,
    mutation: &HoldingMutation,
) -> Result<()> {
    match mutation {
        HoldingMutation::Upsert(upsert) => {
            let affected = diesel::update(
                benchmark_holdings::table
                    .filter(benchmark_holdings::portfolio_id.eq(portfolio_id))
                    .filter(benchmark_holdings::ticker.eq(&upsert.ticker)),
            )
            .set((
                benchmark_holdings::shares.eq(upsert.shares.to_string()),
                benchmark_holdings::avg_cost.eq(upsert.avg_cost.to_string()),
            ))
            .execute(conn)
            .into_core()?;

            if affected == 0 {
                let row = BenchmarkHoldingDB {
                    id: Uuid::new_v4().to_string(),
                    portfolio_id: portfolio_id.to_string(),
                    ticker: upsert.ticker.clone(),
                    shares: upsert.shares.to_string(),
                    avg_cost: upsert.avg_cost.to_string(),
                };
                diesel::insert_into(benchmark_holdings::table)
                    .values(&row)
                    .execute(conn)
                    .into_core()?;
            }
        }
        HoldingMutation::Remove { ticker } => {
            diesel::delete(
                benchmark_holdings::table
                    .filter(benchmark_holdings::portfolio_id.eq(portfolio_id))
                    .filter(benchmark_holdings::ticker.eq(ticker)),
            )
            .execute(conn)
            .into_core()?;
        }
    }
    Ok(())
}

/// Wipes both holdings tables for a portfolio (reset and close).
fn clear_holdings(conn: &mut SqliteConnection, portfolio_id: &str) -> Result<()> {
    diesel::delete(holdings::table.filter(holdings::portfolio_id.eq(portfolio_id)))
        .execute(conn)
        .into_core()?;
    diesel::delete(
        benchmark_holdings::table.filter(benchmark_holdings::portfolio_id.eq(portfolio_id)),
    )
    .execute(conn)
    .into_core()?;
    Ok(())
}
