//! The trade ledger: buy/sell execution against one portfolio.
//!
//! All validation happens before any mutation; the computed mutation
//! (trade row, holding change, cash balance, benchmark mirror) is handed to
//! the repository as a single atomic application, so a rejected or failed
//! trade leaves no partial state.

use log::{debug, warn};
use rust_decimal::Decimal;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::benchmark_mirror;
use super::portfolios_model::{
    Holding, HoldingMutation, HoldingUpsert, MirrorApplication, NewPortfolio, NewTrade, OwnerKind,
    Portfolio, PricedHolding, TradeApplication, TradeConfirmation, TradeRequest, TradeSide,
};
use super::portfolios_traits::PortfolioRepositoryTrait;
use super::LedgerError;
use crate::constants::{DUST_SHARE_THRESHOLD, SELL_SHARE_TOLERANCE};
use crate::errors::{Error, Result};
use crate::market_data::{MarketDataServiceTrait, Quote};
use crate::restrictions::{validate_trade, RestrictionSet, TradeContext};
use crate::utils::Clock;

pub struct LedgerService {
    repository: Arc<dyn PortfolioRepositoryTrait>,
    market_data: Arc<dyn MarketDataServiceTrait>,
    clock: Arc<dyn Clock>,
}

impl LedgerService {
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

    /// Creates a portfolio. Individual owners may hold at most one active
    /// portfolio at a time.
    pub async fn open_portfolio(&self, new_portfolio: NewPortfolio) -> Result<Portfolio> {
        new_portfolio.validate()?;
        if new_portfolio.owner_kind == OwnerKind::Individual
            && self
                .repository
                .find_active_for_owner(OwnerKind::Individual, &new_portfolio.owner_id)?
                .is_some()
        {
            return Err(Error::ConstraintViolation(
                "An active portfolio already exists for this owner".to_string(),
            ));
        }
        self.repository.insert_portfolio(new_portfolio).await
    }

    pub async fn buy(
        &self,
        request: TradeRequest,
        rules: Option<&RestrictionSet>,
    ) -> Result<TradeConfirmation> {
        self.execute(TradeSide::Buy, request, rules).await
    }

    pub async fn sell(
        &self,
        request: TradeRequest,
        rules: Option<&RestrictionSet>,
    ) -> Result<TradeConfirmation> {
        self.execute(TradeSide::Sell, request, rules).await
    }

    /// Credits extra cash to a portfolio outside the trade path (classroom
    /// rewards). Holdings, the trade log, and the benchmark mirror are
    /// untouched. Returns the new balance.
    pub async fn award_bonus(&self, portfolio_id: &str, dollars: Decimal) -> Result<Decimal> {
        if dollars <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount.into());
        }
        let portfolio = self.require_portfolio(portfolio_id)?;
        let new_balance = portfolio.cash_balance + dollars;
        self.repository
            .set_cash_balance(&portfolio.id, new_balance)
            .await?;
        Ok(new_balance)
    }

    /// Points future trades at a new benchmark ticker. Benchmark holdings
    /// accumulated under the previous ticker stay frozen; they keep counting
    /// toward benchmark value at their own ticker's price.
    pub async fn change_benchmark(&self, portfolio_id: &str, ticker: &str) -> Result<()> {
        if ticker.trim().is_empty() {
            return Err(Error::Validation(
                crate::errors::ValidationError::MissingField("benchmarkTicker".to_string()),
            ));
        }
        self.require_portfolio(portfolio_id)?;
        self.repository
            .set_benchmark_ticker(portfolio_id, ticker)
            .await
    }

    fn require_portfolio(&self, portfolio_id: &str) -> Result<Portfolio> {
        self.repository
            .get_portfolio(portfolio_id)?
            .ok_or_else(|| LedgerError::PortfolioNotFound.into())
    }

    async fn execute(
        &self,
        side: TradeSide,
        request: TradeRequest,
        rules: Option<&RestrictionSet>,
    ) -> Result<TradeConfirmation> {
        request.validate()?;
        let portfolio = self.require_portfolio(&request.portfolio_id)?;

        let quote = self.market_data.get_quote(&request.ticker).await?;
        let price = quote
            .as_ref()
            .and_then(Quote::trade_price)
            .ok_or_else(|| LedgerError::PriceUnavailable(request.ticker.clone()))?;

        let holdings = self.repository.list_holdings(&portfolio.id)?;

        let (shares, holding_mutation, new_cash_balance) = match side {
            TradeSide::Buy => plan_buy(&portfolio, &holdings, &request.ticker, request.dollars, price)?,
            TradeSide::Sell => {
                plan_sell(&portfolio, &holdings, &request.ticker, request.dollars, price)?
            }
        };

        if let Some(rules) = rules {
            self.enforce_restrictions(side, &request, &portfolio, &holdings, rules)
                .await?;
        }

        let executed_at = self.clock.now();
        let mirror = self
            .plan_mirror(&portfolio, side, request.dollars, executed_at)
            .await?;

        let trade = NewTrade {
            portfolio_id: portfolio.id.clone(),
            user_id: request.user_id.clone(),
            ticker: request.ticker.clone(),
            side,
            dollars: request.dollars,
            shares,
            price,
            rationale: request.rationale.clone(),
            executed_at,
        };

        self.repository
            .apply_trade(TradeApplication {
                portfolio_id: portfolio.id.clone(),
                new_cash_balance,
                trade,
                holding: holding_mutation,
                mirror,
            })
            .await?;

        debug!(
            "Executed {} {} for {} dollars ({} shares at {})",
            side.as_str(),
            request.ticker,
            request.dollars,
            shares,
            price
        );
        Ok(TradeConfirmation { shares, price })
    }

    /// Runs the pure restriction checks with priced holdings and the latest
    /// same-ticker trade instant. Any violation aborts the trade before any
    /// state is touched.
    async fn enforce_restrictions(
        &self,
        side: TradeSide,
        request: &TradeRequest,
        portfolio: &Portfolio,
        holdings: &[Holding],
        rules: &RestrictionSet,
    ) -> Result<()> {
        let tickers: Vec<String> = holdings.iter().map(|h| h.ticker.clone()).collect();
        let quotes = self.market_data.get_quotes(&tickers).await?;
        let priced: Vec<PricedHolding> = holdings
            .iter()
            .map(|h| PricedHolding {
                ticker: h.ticker.clone(),
                shares: h.shares,
                avg_cost: h.avg_cost,
                current_price: quotes.get(&h.ticker).and_then(Quote::valuation_price),
            })
            .collect();

        let last_trade_on_ticker = self
            .repository
            .last_trade_on_ticker(&portfolio.id, &request.ticker)?;

        let context = TradeContext {
            side,
            ticker: &request.ticker,
            dollars: request.dollars,
            holdings: &priced,
            last_trade_on_ticker,
            approval_code: request.approval_code.as_deref(),
            rationale: request.rationale.as_deref(),
            starting_cash: portfolio.starting_cash,
            now: self.clock.now(),
        };

        let check = validate_trade(&context, rules);
        if !check.is_valid() {
            return Err(LedgerError::RestrictionViolation(check.errors).into());
        }
        Ok(())
    }

    /// Plans the benchmark side of a trade. When no benchmark price
    /// resolves the mirror is skipped rather than failing the primary trade;
    /// the shadow portfolio is a best-effort approximation.
    async fn plan_mirror(
        &self,
        portfolio: &Portfolio,
        side: TradeSide,
        dollars: Decimal,
        executed_at: DateTime<Utc>,
    ) -> Result<Option<MirrorApplication>> {
        let quote = match self.market_data.get_quote(&portfolio.benchmark_ticker).await {
            Ok(quote) => quote,
            Err(err) => {
                warn!(
                    "Benchmark quote fetch failed for {}: {}; skipping mirror",
                    portfolio.benchmark_ticker, err
                );
                return Ok(None);
            }
        };
        let Some(price) = quote.as_ref().and_then(Quote::trade_price) else {
            warn!(
                "No benchmark price for {}; skipping mirror",
                portfolio.benchmark_ticker
            );
            return Ok(None);
        };

        let benchmark_holdings = self.repository.list_benchmark_holdings(&portfolio.id)?;
        let existing = benchmark_holdings
            .iter()
            .find(|h| h.ticker == portfolio.benchmark_ticker);

        let mirror = match side {
            TradeSide::Buy => Some(benchmark_mirror::mirror_buy(
                &portfolio.id,
                &portfolio.benchmark_ticker,
                existing,
                dollars,
                price,
                executed_at,
            )),
            TradeSide::Sell => benchmark_mirror::mirror_sell(
                &portfolio.id,
                &portfolio.benchmark_ticker,
                existing,
                dollars,
                price,
                executed_at,
            ),
        };
        Ok(mirror)
    }
}

fn plan_buy(
    portfolio: &Portfolio,
    holdings: &[Holding],
    ticker: &str,
    dollars: Decimal,
    price: Decimal,
) -> Result<(Decimal, HoldingMutation, Decimal)> {
    if dollars > portfolio.cash_balance {
        return Err(LedgerError::InsufficientCash.into());
    }

    let shares = dollars / price;
    let mutation = match holdings.iter().find(|h| h.ticker == ticker) {
        Some(held) => {
            let total_cost = held.shares * held.avg_cost + dollars;
            let total_shares = held.shares + shares;
            HoldingMutation::Upsert(HoldingUpsert {
                ticker: ticker.to_string(),
                shares: total_shares,
                avg_cost: total_cost / total_shares,
            })
        }
        None => HoldingMutation::Upsert(HoldingUpsert {
            ticker: ticker.to_string(),
            shares,
            avg_cost: price,
        }),
    };

    Ok((shares, mutation, portfolio.cash_balance - dollars))
}

fn plan_sell(
    portfolio: &Portfolio,
    holdings: &[Holding],
    ticker: &str,
    dollars: Decimal,
    price: Decimal,
) -> Result<(Decimal, HoldingMutation, Decimal)> {
    let held = holdings
        .iter()
        .find(|h| h.ticker == ticker)
        .ok_or(LedgerError::NoPosition)?;

    let shares_to_sell = dollars / price;
    if shares_to_sell > held.shares + SELL_SHARE_TOLERANCE {
        return Err(LedgerError::InsufficientShares.into());
    }

    let remaining = held.shares - shares_to_sell;
    let mutation = if remaining < DUST_SHARE_THRESHOLD {
        HoldingMutation::Remove {
            ticker: ticker.to_string(),
        }
    } else {
        // A sell never moves the average cost.
        HoldingMutation::Upsert(HoldingUpsert {
            ticker: ticker.to_string(),
            shares: remaining,
            avg_cost: held.avg_cost,
        })
    };

    Ok((shares_to_sell, mutation, portfolio.cash_balance + dollars))
}
