//! In-memory doubles shared by the service tests: a portfolio repository
//! that applies mutations the same way the SQLite layer does, and a market
//! data stub with settable quotes, closes, and profiles.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::errors::Result;
use crate::market_data::{CompanyProfile, MarketDataServiceTrait, Quote};
use crate::portfolios::portfolios_model::{
    CloseApplication, Holding, HoldingMutation, NewPortfolio, NewTrade, OwnerKind, Portfolio,
    PortfolioStatus, ResetApplication, Snapshot, Trade, TradeApplication,
};
use crate::portfolios::portfolios_traits::PortfolioRepositoryTrait;

pub(crate) fn test_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 15, 30, 0).unwrap()
}

pub(crate) fn portfolio(id: &str, cash: Decimal, starting_cash: Decimal) -> Portfolio {
    Portfolio {
        id: id.to_string(),
        owner_kind: OwnerKind::Individual,
        owner_id: format!("owner-{}", id),
        cash_balance: cash,
        starting_cash,
        benchmark_ticker: "SPY".to_string(),
        is_public: false,
        allow_reset: true,
        status: PortfolioStatus::Active,
        reset_count: 0,
        closed_at: None,
        created_at: Utc.with_ymd_and_hms(2025, 9, 1, 13, 30, 0).unwrap(),
    }
}

pub(crate) fn holding(portfolio_id: &str, ticker: &str, shares: Decimal, avg_cost: Decimal) -> Holding {
    Holding {
        id: format!("h-{}-{}", portfolio_id, ticker),
        portfolio_id: portfolio_id.to_string(),
        ticker: ticker.to_string(),
        shares,
        avg_cost,
    }
}

// ============================================================================
// In-memory repository
// ============================================================================

#[derive(Default)]
pub(crate) struct InMemoryPortfolioRepository {
    pub portfolios: RwLock<HashMap<String, Portfolio>>,
    pub holdings: RwLock<Vec<Holding>>,
    pub trades: RwLock<Vec<Trade>>,
    pub benchmark_holdings: RwLock<Vec<Holding>>,
    pub benchmark_trades: RwLock<Vec<Trade>>,
    pub snapshots: RwLock<Vec<Snapshot>>,
    next_id: AtomicUsize,
}

impl InMemoryPortfolioRepository {
    pub fn with_portfolio(portfolio: Portfolio) -> Self {
        let repo = Self::default();
        repo.portfolios
            .write()
            .unwrap()
            .insert(portfolio.id.clone(), portfolio);
        repo
    }

    pub fn add_holding(&self, holding: Holding) {
        self.holdings.write().unwrap().push(holding);
    }

    pub fn add_benchmark_holding(&self, holding: Holding) {
        self.benchmark_holdings.write().unwrap().push(holding);
    }

    pub fn add_trade(&self, trade: Trade) {
        self.trades.write().unwrap().push(trade);
    }

    pub fn add_benchmark_trade(&self, trade: Trade) {
        self.benchmark_trades.write().unwrap().push(trade);
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn persist_trade(&self, new_trade: NewTrade, id: String) -> Trade {
        Trade {
            id,
            portfolio_id: new_trade.portfolio_id,
            user_id: new_trade.user_id,
            ticker: new_trade.ticker,
            side: new_trade.side,
            dollars: new_trade.dollars,
            shares: new_trade.shares,
            price: new_trade.price,
            rationale: new_trade.rationale,
            executed_at: new_trade.executed_at,
        }
    }

    fn apply_holding_mutation(
        holdings: &mut Vec<Holding>,
        portfolio_id: &str,
        mutation: HoldingMutation,
    ) {
        match mutation {
            HoldingMutation::Upsert(upsert) => {
                match holdings
                    .iter_mut()
                    .find(|h| h.portfolio_id == portfolio_id && h.ticker == upsert.ticker)
                {
                    Some(held) => {
                        held.shares = upsert.shares;
                        held.avg_cost = upsert.avg_cost;
                    }
                    None => holdings.push(Holding {
                        id: format!("h-{}-{}", portfolio_id, upsert.ticker),
                        portfolio_id: portfolio_id.to_string(),
                        ticker: upsert.ticker,
                        shares: upsert.shares,
                        avg_cost: upsert.avg_cost,
                    }),
                }
            }
            HoldingMutation::Remove { ticker } => {
                holdings.retain(|h| !(h.portfolio_id == portfolio_id && h.ticker == ticker));
            }
        }
    }

    fn persist_snapshot(&self, snapshot: crate::portfolios::NewSnapshot) -> Snapshot {
        Snapshot {
            id: self.next_id("snap"),
            portfolio_id: snapshot.portfolio_id,
            snapshot_type: snapshot.snapshot_type,
            cash_balance: snapshot.cash_balance,
            starting_cash: snapshot.starting_cash,
            total_value: snapshot.total_value,
            return_pct: snapshot.return_pct,
            holdings: snapshot.holdings,
            snapshotted_at: snapshot.snapshotted_at,
        }
    }
}

#[async_trait]
impl PortfolioRepositoryTrait for InMemoryPortfolioRepository {
    fn get_portfolio(&self, portfolio_id: &str) -> Result<Option<Portfolio>> {
        Ok(self.portfolios.read().unwrap().get(portfolio_id).cloned())
    }

    fn find_active_for_owner(
        &self,
        owner_kind: OwnerKind,
        owner_id: &str,
    ) -> Result<Option<Portfolio>> {
        Ok(self
            .portfolios
            .read()
            .unwrap()
            .values()
            .find(|p| {
                p.owner_kind == owner_kind
                    && p.owner_id == owner_id
                    && p.status == PortfolioStatus::Active
            })
            .cloned())
    }

    async fn insert_portfolio(&self, new_portfolio: NewPortfolio) -> Result<Portfolio> {
        let portfolio = Portfolio {
            id: self.next_id("p"),
            owner_kind: new_portfolio.owner_kind,
            owner_id: new_portfolio.owner_id,
            cash_balance: new_portfolio.starting_cash,
            starting_cash: new_portfolio.starting_cash,
            benchmark_ticker: new_portfolio.benchmark_ticker,
            is_public: new_portfolio.is_public,
            allow_reset: new_portfolio.allow_reset,
            status: PortfolioStatus::Active,
            reset_count: 0,
            closed_at: None,
            created_at: test_instant(),
        };
        self.portfolios
            .write()
            .unwrap()
            .insert(portfolio.id.clone(), portfolio.clone());
        Ok(portfolio)
    }

    async fn set_benchmark_ticker(&self, portfolio_id: &str, ticker: &str) -> Result<()> {
        if let Some(p) = self.portfolios.write().unwrap().get_mut(portfolio_id) {
            p.benchmark_ticker = ticker.to_string();
        }
        Ok(())
    }

    async fn set_cash_balance(&self, portfolio_id: &str, cash_balance: Decimal) -> Result<()> {
        if let Some(p) = self.portfolios.write().unwrap().get_mut(portfolio_id) {
            p.cash_balance = cash_balance;
        }
        Ok(())
    }

    fn list_holdings(&self, portfolio_id: &str) -> Result<Vec<Holding>> {
        Ok(self
            .holdings
            .read()
            .unwrap()
            .iter()
            .filter(|h| h.portfolio_id == portfolio_id)
            .cloned()
            .collect())
    }

    fn list_trades_desc(&self, portfolio_id: &str) -> Result<Vec<Trade>> {
        let mut trades: Vec<Trade> = self
            .trades
            .read()
            .unwrap()
            .iter()
            .filter(|t| t.portfolio_id == portfolio_id)
            .cloned()
            .collect();
        trades.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
        Ok(trades)
    }

    fn last_trade_on_ticker(
        &self,
        portfolio_id: &str,
        ticker: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .trades
            .read()
            .unwrap()
            .iter()
            .filter(|t| t.portfolio_id == portfolio_id && t.ticker == ticker)
            .map(|t| t.executed_at)
            .max())
    }

    fn list_benchmark_holdings(&self, portfolio_id: &str) -> Result<Vec<Holding>> {
        Ok(self
            .benchmark_holdings
            .read()
            .unwrap()
            .iter()
            .filter(|h| h.portfolio_id == portfolio_id)
            .cloned()
            .collect())
    }

    fn list_benchmark_trades_desc(&self, portfolio_id: &str) -> Result<Vec<Trade>> {
        let mut trades: Vec<Trade> = self
            .benchmark_trades
            .read()
            .unwrap()
            .iter()
            .filter(|t| t.portfolio_id == portfolio_id)
            .cloned()
            .collect();
        trades.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
        Ok(trades)
    }

    async fn apply_trade(&self, application: TradeApplication) -> Result<Trade> {
        let trade = self.persist_trade(application.trade, self.next_id("t"));
        self.trades.write().unwrap().push(trade.clone());

        Self::apply_holding_mutation(
            &mut self.holdings.write().unwrap(),
            &application.portfolio_id,
            application.holding,
        );

        if let Some(p) = self
            .portfolios
            .write()
            .unwrap()
            .get_mut(&application.portfolio_id)
        {
            p.cash_balance = application.new_cash_balance;
        }

        if let Some(mirror) = application.mirror {
            let mirror_trade = self.persist_trade(mirror.trade, self.next_id("bt"));
            self.benchmark_trades.write().unwrap().push(mirror_trade);
            Self::apply_holding_mutation(
                &mut self.benchmark_holdings.write().unwrap(),
                &application.portfolio_id,
                mirror.holding,
            );
        }

        Ok(trade)
    }

    async fn apply_reset(&self, application: ResetApplication) -> Result<Snapshot> {
        let snapshot = self.persist_snapshot(application.snapshot);
        self.snapshots.write().unwrap().push(snapshot.clone());

        self.holdings
            .write()
            .unwrap()
            .retain(|h| h.portfolio_id != application.portfolio_id);
        self.benchmark_holdings
            .write()
            .unwrap()
            .retain(|h| h.portfolio_id != application.portfolio_id);

        if let Some(p) = self
            .portfolios
            .write()
            .unwrap()
            .get_mut(&application.portfolio_id)
        {
            p.cash_balance = application.restored_cash;
            p.reset_count += 1;
        }

        Ok(snapshot)
    }

    async fn apply_close(&self, application: CloseApplication) -> Result<(Snapshot, Portfolio)> {
        let snapshot = self.persist_snapshot(application.snapshot);
        self.snapshots.write().unwrap().push(snapshot.clone());

        self.holdings
            .write()
            .unwrap()
            .retain(|h| h.portfolio_id != application.portfolio_id);
        self.benchmark_holdings
            .write()
            .unwrap()
            .retain(|h| h.portfolio_id != application.portfolio_id);

        if let Some(p) = self
            .portfolios
            .write()
            .unwrap()
            .get_mut(&application.portfolio_id)
        {
            p.cash_balance = Decimal::ZERO;
            p.status = PortfolioStatus::Closed;
            p.closed_at = Some(application.closed_at);
        }

        let replacement = self.insert_portfolio(application.replacement).await?;
        Ok((snapshot, replacement))
    }

    fn list_snapshots(&self, portfolio_id: &str) -> Result<Vec<Snapshot>> {
        let mut snapshots: Vec<Snapshot> = self
            .snapshots
            .read()
            .unwrap()
            .iter()
            .filter(|s| s.portfolio_id == portfolio_id)
            .cloned()
            .collect();
        snapshots.sort_by(|a, b| b.snapshotted_at.cmp(&a.snapshotted_at));
        Ok(snapshots)
    }
}

// ============================================================================
// Market data stub
// ============================================================================

#[derive(Default)]
pub(crate) struct MockMarketData {
    pub quotes: RwLock<HashMap<String, Quote>>,
    pub closes: RwLock<HashMap<(String, NaiveDate), Decimal>>,
    pub profiles: RwLock<HashMap<String, CompanyProfile>>,
}

impl MockMarketData {
    pub fn set_price(&self, ticker: &str, price: Decimal) {
        self.set_quote(ticker, Some(price), None);
    }

    pub fn set_quote(&self, ticker: &str, price: Option<Decimal>, previous_close: Option<Decimal>) {
        self.quotes.write().unwrap().insert(
            ticker.to_string(),
            Quote {
                symbol: ticker.to_string(),
                price,
                previous_close,
            },
        );
    }

    pub fn set_close(&self, ticker: &str, date: NaiveDate, price: Decimal) {
        self.closes
            .write()
            .unwrap()
            .insert((ticker.to_string(), date), price);
    }

    pub fn set_beta(&self, ticker: &str, beta: Decimal) {
        self.profiles.write().unwrap().insert(
            ticker.to_string(),
            CompanyProfile {
                symbol: ticker.to_string(),
                company_name: None,
                sector: None,
                beta: Some(beta),
            },
        );
    }
}

#[async_trait]
impl MarketDataServiceTrait for MockMarketData {
    async fn get_quote(&self, ticker: &str) -> Result<Option<Quote>> {
        Ok(self.quotes.read().unwrap().get(ticker).cloned())
    }

    async fn get_quotes(&self, tickers: &[String]) -> Result<HashMap<String, Quote>> {
        let quotes = self.quotes.read().unwrap();
        Ok(tickers
            .iter()
            .filter_map(|t| quotes.get(t).map(|q| (t.clone(), q.clone())))
            .collect())
    }

    async fn get_historical_closes(
        &self,
        tickers: &[String],
        date: NaiveDate,
    ) -> Result<HashMap<String, Decimal>> {
        let closes = self.closes.read().unwrap();
        Ok(tickers
            .iter()
            .filter_map(|t| closes.get(&(t.clone(), date)).map(|p| (t.clone(), *p)))
            .collect())
    }

    async fn get_profiles(&self, tickers: &[String]) -> Result<HashMap<String, CompanyProfile>> {
        let profiles = self.profiles.read().unwrap();
        Ok(tickers
            .iter()
            .filter_map(|t| profiles.get(t).map(|p| (t.clone(), p.clone())))
            .collect())
    }
}
