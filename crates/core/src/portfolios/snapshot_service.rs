//! Snapshot manager: archives portfolio state at reset/close boundaries.
//!
//! A reset wipes holdings and restores starting cash but keeps the trade
//! log; historical trades stay attributable to the prior epoch, separated by
//! the snapshot boundary. A close is terminal: the portfolio row is never
//! reused, and a fresh active portfolio is opened for the same owner.

use log::info;
use rust_decimal::Decimal;
use std::sync::Arc;

use super::portfolios_model::{
    CloseApplication, Holding, NewPortfolio, NewSnapshot, OwnerKind, Portfolio,
    PortfolioCloseOutcome, ResetApplication, Snapshot, SnapshotHolding, SnapshotType,
};
use super::portfolios_traits::PortfolioRepositoryTrait;
use super::LedgerError;
use crate::errors::Result;
use crate::market_data::{MarketDataServiceTrait, Quote};
use crate::utils::Clock;

pub struct SnapshotService {
    repository: Arc<dyn PortfolioRepositoryTrait>,
    market_data: Arc<dyn MarketDataServiceTrait>,
    clock: Arc<dyn Clock>,
}

impl SnapshotService {
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

    /// Archives the current state and restores the portfolio to its starting
    /// cash. Permitted when resets are allowed, or when the portfolio is
    /// already economically empty (zero cash, no holdings) — a degenerate
    /// portfolio can always be recovered.
    pub async fn reset(&self, portfolio_id: &str) -> Result<Snapshot> {
        let portfolio = self.require_portfolio(portfolio_id)?;
        let holdings = self.repository.list_holdings(portfolio_id)?;

        if !portfolio.allow_reset && !portfolio.is_empty(&holdings) {
            return Err(LedgerError::ResetNotAllowed.into());
        }

        let snapshot = self
            .capture(&portfolio, &holdings, SnapshotType::Reset)
            .await?;

        let archived = self
            .repository
            .apply_reset(ResetApplication {
                portfolio_id: portfolio.id.clone(),
                snapshot,
                restored_cash: portfolio.starting_cash,
            })
            .await?;

        info!(
            "Reset portfolio {} (reset #{})",
            portfolio.id,
            portfolio.reset_count + 1
        );
        Ok(archived)
    }

    /// Archives and permanently closes an individually owned portfolio, then
    /// opens a replacement with a fresh starting balance for the same owner.
    pub async fn close(&self, portfolio_id: &str) -> Result<PortfolioCloseOutcome> {
        let portfolio = self.require_portfolio(portfolio_id)?;
        if portfolio.owner_kind != OwnerKind::Individual {
            return Err(LedgerError::CloseNotAllowed.into());
        }

        let holdings = self.repository.list_holdings(portfolio_id)?;
        let snapshot = self
            .capture(&portfolio, &holdings, SnapshotType::Close)
            .await?;

        let replacement = NewPortfolio {
            owner_kind: portfolio.owner_kind,
            owner_id: portfolio.owner_id.clone(),
            starting_cash: portfolio.starting_cash,
            benchmark_ticker: portfolio.benchmark_ticker.clone(),
            is_public: portfolio.is_public,
            allow_reset: portfolio.allow_reset,
        };

        let (archived, new_portfolio) = self
            .repository
            .apply_close(CloseApplication {
                portfolio_id: portfolio.id.clone(),
                snapshot,
                closed_at: self.clock.now(),
                replacement,
            })
            .await?;

        info!(
            "Closed portfolio {}; replacement {} opened",
            portfolio.id, new_portfolio.id
        );
        Ok(PortfolioCloseOutcome {
            snapshot: archived,
            replacement: new_portfolio,
        })
    }

    /// Archived snapshots for a portfolio, newest first.
    pub fn load_snapshots(&self, portfolio_id: &str) -> Result<Vec<Snapshot>> {
        self.require_portfolio(portfolio_id)?;
        self.repository.list_snapshots(portfolio_id)
    }

    fn require_portfolio(&self, portfolio_id: &str) -> Result<Portfolio> {
        self.repository
            .get_portfolio(portfolio_id)?
            .ok_or_else(|| LedgerError::PortfolioNotFound.into())
    }

    /// Prices the holdings and freezes the portfolio's current state into a
    /// snapshot payload.
    async fn capture(
        &self,
        portfolio: &Portfolio,
        holdings: &[Holding],
        snapshot_type: SnapshotType,
    ) -> Result<NewSnapshot> {
        let tickers: Vec<String> = holdings.iter().map(|h| h.ticker.clone()).collect();
        let quotes = self.market_data.get_quotes(&tickers).await?;

        let captured: Vec<SnapshotHolding> = holdings
            .iter()
            .map(|h| {
                let price = quotes
                    .get(&h.ticker)
                    .and_then(Quote::valuation_price)
                    .unwrap_or(h.avg_cost);
                SnapshotHolding {
                    ticker: h.ticker.clone(),
                    shares: h.shares,
                    avg_cost: h.avg_cost,
                    price,
                    market_value: h.shares * price,
                }
            })
            .collect();

        let holdings_value: Decimal = captured.iter().map(|h| h.market_value).sum();
        let total_value = holdings_value + portfolio.cash_balance;
        let return_pct = if portfolio.starting_cash.is_zero() {
            Decimal::ZERO
        } else {
            (total_value - portfolio.starting_cash) / portfolio.starting_cash * Decimal::from(100)
        };

        Ok(NewSnapshot {
            portfolio_id: portfolio.id.clone(),
            snapshot_type,
            cash_balance: portfolio.cash_balance,
            starting_cash: portfolio.starting_cash,
            total_value,
            return_pct,
            holdings: captured,
            snapshotted_at: self.clock.now(),
        })
    }
}
