//! Leaderboard assembly: rank many portfolios by reconstructing their
//! historical state from the persisted trade log.
//!
//! Reads only persisted state plus market data; it never serializes with
//! in-flight trades. A leaderboard is a point-in-time view, so eventual
//! consistency is acceptable here.

use chrono::{DateTime, Duration, Months, Utc};
use log::warn;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::leaderboard_model::LeaderboardRow;
use super::{metrics, reconstruction};
use crate::errors::Result;
use crate::market_data::{MarketDataServiceTrait, Quote};
use crate::portfolios::{
    benchmark_mirror, Holding, LedgerError, Portfolio, PortfolioRepositoryTrait, Trade,
};
use crate::utils::Clock;

pub struct LeaderboardService {
    repository: Arc<dyn PortfolioRepositoryTrait>,
    market_data: Arc<dyn MarketDataServiceTrait>,
    clock: Arc<dyn Clock>,
}

impl LeaderboardService {
    pub fn new(
        repository: Arc<dyn PortfolioRepositoryTrait>,
        market_data: Arc<dyn MarketDataServiceTrait>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            market_data,
            clock,
        }
    }

    /// Builds a ranked row per portfolio, sorted by total return descending.
    /// A portfolio that fails to load is skipped with a warning rather than
    /// sinking the whole board.
    pub async fn get_leaderboard_data(&self, portfolio_ids: &[String]) -> Result<Vec<LeaderboardRow>> {
        let mut rows = Vec::with_capacity(portfolio_ids.len());
        for portfolio_id in portfolio_ids {
            match self.build_row(portfolio_id).await {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => warn!("Leaderboard: portfolio {} not found", portfolio_id),
                Err(err) => warn!("Leaderboard row failed for {}: {}", portfolio_id, err),
            }
        }
        rows.sort_by(|a, b| b.total_return_pct.cmp(&a.total_return_pct));
        Ok(rows)
    }

    /// Current market value of one portfolio: holdings at current prices
    /// (cost basis when no quote resolves) plus cash.
    pub async fn get_portfolio_value(&self, portfolio_id: &str) -> Result<Decimal> {
        let portfolio = self
            .repository
            .get_portfolio(portfolio_id)?
            .ok_or(LedgerError::PortfolioNotFound)?;
        let holdings = self.repository.list_holdings(portfolio_id)?;
        let tickers: Vec<String> = holdings.iter().map(|h| h.ticker.clone()).collect();
        let quotes = self.market_data.get_quotes(&tickers).await?;
        Ok(market_value(&holdings, &quotes, portfolio.cash_balance))
    }

    async fn build_row(&self, portfolio_id: &str) -> Result<Option<LeaderboardRow>> {
        let Some(portfolio) = self.repository.get_portfolio(portfolio_id)? else {
            return Ok(None);
        };
        let holdings = self.repository.list_holdings(portfolio_id)?;
        let trades = self.repository.list_trades_desc(portfolio_id)?;
        let benchmark_holdings = self.repository.list_benchmark_holdings(portfolio_id)?;
        let benchmark_trades = self.repository.list_benchmark_trades_desc(portfolio_id)?;
        let now = self.clock.now();

        // One quote batch covers holdings and every benchmark ticker that
        // ever accumulated mirrored shares.
        let tickers: BTreeSet<String> = holdings
            .iter()
            .chain(benchmark_holdings.iter())
            .map(|h| h.ticker.clone())
            .collect();
        let tickers: Vec<String> = tickers.into_iter().collect();
        let quotes = self.market_data.get_quotes(&tickers).await?;

        let total_value = market_value(&holdings, &quotes, portfolio.cash_balance);
        let total_return_pct = metrics::period_return_pct(portfolio.starting_cash, total_value);

        let week_return_pct = self
            .period_return_as_of(&portfolio, &holdings, &trades, &quotes, total_value, now - Duration::days(7))
            .await?;
        let month_as_of = now
            .checked_sub_months(Months::new(1))
            .unwrap_or(now - Duration::days(30));
        let month_return_pct = self
            .period_return_as_of(&portfolio, &holdings, &trades, &quotes, total_value, month_as_of)
            .await?;

        let holding_tickers: Vec<String> = holdings.iter().map(|h| h.ticker.clone()).collect();
        let profiles = self.market_data.get_profiles(&holding_tickers).await?;

        Ok(Some(LeaderboardRow {
            portfolio_id: portfolio.id.clone(),
            owner_kind: portfolio.owner_kind,
            owner_id: portfolio.owner_id.clone(),
            total_value,
            total_return_pct,
            today_return_pct: metrics::today_return_pct(&holdings, &quotes, portfolio.cash_balance),
            week_return_pct,
            month_return_pct,
            annualized_return_pct: metrics::annualized_return_pct(
                total_return_pct,
                portfolio.created_at,
                now,
            ),
            risk_adjusted_return_pct: metrics::risk_adjusted_return_pct(
                total_return_pct,
                &holdings,
                &profiles,
            ),
            benchmark_return_pct: benchmark_mirror::benchmark_return_pct(
                &portfolio,
                &benchmark_holdings,
                &benchmark_trades,
                &quotes,
            ),
            holdings_count: holdings.len(),
        }))
    }

    /// Return over the window ending now: reconstructs holdings and cash as
    /// of the window start and prices them at that day's closes. A ticker
    /// with no resolvable close falls back to its current quote.
    async fn period_return_as_of(
        &self,
        portfolio: &Portfolio,
        holdings: &[Holding],
        trades_desc: &[Trade],
        quotes: &HashMap<String, Quote>,
        current_value: Decimal,
        as_of: DateTime<Utc>,
    ) -> Result<Decimal> {
        let past_shares = reconstruction::reconstruct_holdings_as_of(holdings, trades_desc, as_of);
        let past_cash =
            reconstruction::reconstruct_cash_as_of(portfolio.cash_balance, trades_desc, as_of);

        let past_tickers: Vec<String> = past_shares.keys().cloned().collect();
        let closes = self
            .market_data
            .get_historical_closes(&past_tickers, as_of.date_naive())
            .await?;

        let past_value = past_shares
            .iter()
            .map(|(ticker, shares)| {
                let price = closes
                    .get(ticker)
                    .copied()
                    .or_else(|| quotes.get(ticker).and_then(Quote::valuation_price))
                    .unwrap_or(Decimal::ZERO);
                *shares * price
            })
            .sum::<Decimal>()
            + past_cash;

        Ok(metrics::period_return_pct(past_value, current_value))
    }
}

fn market_value(holdings: &[Holding], quotes: &HashMap<String, Quote>, cash: Decimal) -> Decimal {
    holdings
        .iter()
        .map(|h| {
            let price = quotes
                .get(&h.ticker)
                .and_then(Quote::valuation_price)
                .unwrap_or(h.avg_cost);
            h.shares * price
        })
        .sum::<Decimal>()
        + cash
}
