use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use super::ledger_service::LedgerService;
use super::portfolios_model::{NewPortfolio, OwnerKind, TradeRequest, TradeSide};
use super::portfolios_traits::PortfolioRepositoryTrait;
use super::test_fixtures::{holding, portfolio, test_instant, InMemoryPortfolioRepository, MockMarketData};
use super::LedgerError;
use crate::errors::Error;
use crate::restrictions::RestrictionSet;
use crate::utils::clock::FixedClock;

fn setup(
    repo: InMemoryPortfolioRepository,
) -> (Arc<InMemoryPortfolioRepository>, Arc<MockMarketData>, LedgerService) {
    let repo = Arc::new(repo);
    let market = Arc::new(MockMarketData::default());
    let clock = Arc::new(FixedClock(test_instant()));
    let service = LedgerService::new(repo.clone(), market.clone(), clock);
    (repo, market, service)
}

fn request(portfolio_id: &str, ticker: &str, dollars: Decimal) -> TradeRequest {
    TradeRequest {
        portfolio_id: portfolio_id.to_string(),
        user_id: Some("u1".to_string()),
        ticker: ticker.to_string(),
        dollars,
        approval_code: None,
        rationale: Some("earnings momentum".to_string()),
    }
}

// --- buys ---

#[tokio::test]
async fn buy_converts_dollars_to_shares_and_debits_cash() {
    let (repo, market, service) =
        setup(InMemoryPortfolioRepository::with_portfolio(portfolio("p1", dec!(100000), dec!(100000))));
    market.set_price("AAPL", dec!(200));
    market.set_price("SPY", dec!(500));

    let confirmation = service.buy(request("p1", "AAPL", dec!(1000)), None).await.unwrap();

    assert_eq!(confirmation.shares, dec!(5));
    assert_eq!(confirmation.price, dec!(200));

    let p = repo.get_portfolio("p1").unwrap().unwrap();
    assert_eq!(p.cash_balance, dec!(99000));

    let holdings = repo.list_holdings("p1").unwrap();
    assert_eq!(holdings.len(), 1);
    assert_eq!(holdings[0].shares, dec!(5));
    assert_eq!(holdings[0].avg_cost, dec!(200));

    let trades = repo.list_trades_desc("p1").unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].side, TradeSide::Buy);
    assert_eq!(trades[0].dollars, dec!(1000));
    assert_eq!(trades[0].executed_at, test_instant());
}

#[tokio::test]
async fn buying_twice_at_constant_price_leaves_avg_cost_unchanged() {
    let (repo, market, service) =
        setup(InMemoryPortfolioRepository::with_portfolio(portfolio("p1", dec!(100000), dec!(100000))));
    market.set_price("AAPL", dec!(200));
    market.set_price("SPY", dec!(500));

    service.buy(request("p1", "AAPL", dec!(1000)), None).await.unwrap();
    service.buy(request("p1", "AAPL", dec!(3000)), None).await.unwrap();

    let holdings = repo.list_holdings("p1").unwrap();
    assert_eq!(holdings[0].shares, dec!(20));
    assert_eq!(holdings[0].avg_cost, dec!(200));
}

#[tokio::test]
async fn avg_cost_is_a_shares_weighted_blend() {
    let (repo, market, service) =
        setup(InMemoryPortfolioRepository::with_portfolio(portfolio("p1", dec!(100000), dec!(100000))));
    market.set_price("AAPL", dec!(100));
    market.set_price("SPY", dec!(500));

    // 10 shares at $100.
    service.buy(request("p1", "AAPL", dec!(1000)), None).await.unwrap();

    // 10 more at $300: avg = (10*100 + 3000) / 20 = 200.
    market.set_price("AAPL", dec!(300));
    service.buy(request("p1", "AAPL", dec!(3000)), None).await.unwrap();

    let holdings = repo.list_holdings("p1").unwrap();
    assert_eq!(holdings[0].shares, dec!(20));
    assert_eq!(holdings[0].avg_cost, dec!(200));
}

#[tokio::test]
async fn buy_rejects_insufficient_cash() {
    let (repo, market, service) =
        setup(InMemoryPortfolioRepository::with_portfolio(portfolio("p1", dec!(500), dec!(100000))));
    market.set_price("AAPL", dec!(200));

    let err = service.buy(request("p1", "AAPL", dec!(501)), None).await.unwrap_err();
    assert!(matches!(err, Error::Ledger(LedgerError::InsufficientCash)));
    assert!(repo.list_trades_desc("p1").unwrap().is_empty());
}

#[tokio::test]
async fn trade_rejects_non_positive_dollars() {
    let (_repo, market, service) =
        setup(InMemoryPortfolioRepository::with_portfolio(portfolio("p1", dec!(1000), dec!(1000))));
    market.set_price("AAPL", dec!(200));

    let err = service.buy(request("p1", "AAPL", Decimal::ZERO), None).await.unwrap_err();
    assert!(matches!(err, Error::Ledger(LedgerError::InvalidAmount)));

    let err = service.sell(request("p1", "AAPL", dec!(-5)), None).await.unwrap_err();
    assert!(matches!(err, Error::Ledger(LedgerError::InvalidAmount)));
}

#[tokio::test]
async fn trade_rejects_unknown_portfolio() {
    let (_repo, market, service) = setup(InMemoryPortfolioRepository::default());
    market.set_price("AAPL", dec!(200));

    let err = service.buy(request("nope", "AAPL", dec!(100)), None).await.unwrap_err();
    assert!(matches!(err, Error::Ledger(LedgerError::PortfolioNotFound)));
}

#[tokio::test]
async fn trade_price_falls_back_to_previous_close() {
    let (repo, market, service) =
        setup(InMemoryPortfolioRepository::with_portfolio(portfolio("p1", dec!(10000), dec!(10000))));
    // Market closed: no live price, only the previous close.
    market.set_quote("AAPL", None, Some(dec!(250)));
    market.set_price("SPY", dec!(500));

    let confirmation = service.buy(request("p1", "AAPL", dec!(500)), None).await.unwrap();
    assert_eq!(confirmation.price, dec!(250));
    assert_eq!(confirmation.shares, dec!(2));
    assert_eq!(repo.list_holdings("p1").unwrap()[0].avg_cost, dec!(250));
}

#[tokio::test]
async fn trade_fails_when_no_price_resolves() {
    let (repo, market, service) =
        setup(InMemoryPortfolioRepository::with_portfolio(portfolio("p1", dec!(10000), dec!(10000))));
    market.set_quote("AAPL", Some(Decimal::ZERO), None);

    let err = service.buy(request("p1", "AAPL", dec!(500)), None).await.unwrap_err();
    assert!(matches!(err, Error::Ledger(LedgerError::PriceUnavailable(_))));

    let err = service.buy(request("p1", "MSFT", dec!(500)), None).await.unwrap_err();
    assert!(matches!(err, Error::Ledger(LedgerError::PriceUnavailable(_))));
    assert!(repo.list_trades_desc("p1").unwrap().is_empty());
}

// --- sells ---

#[tokio::test]
async fn sell_credits_cash_and_keeps_avg_cost() {
    let repo = InMemoryPortfolioRepository::with_portfolio(portfolio("p1", dec!(1000), dec!(100000)));
    repo.add_holding(holding("p1", "AAPL", dec!(10), dec!(150)));
    let (repo, market, service) = setup(repo);
    market.set_price("AAPL", dec!(200));
    market.set_price("SPY", dec!(500));

    let confirmation = service.sell(request("p1", "AAPL", dec!(800)), None).await.unwrap();

    assert_eq!(confirmation.shares, dec!(4));
    let p = repo.get_portfolio("p1").unwrap().unwrap();
    assert_eq!(p.cash_balance, dec!(1800));

    let holdings = repo.list_holdings("p1").unwrap();
    assert_eq!(holdings[0].shares, dec!(6));
    // A sell never moves the cost basis.
    assert_eq!(holdings[0].avg_cost, dec!(150));
}

#[tokio::test]
async fn sell_removes_dust_positions() {
    let repo = InMemoryPortfolioRepository::with_portfolio(portfolio("p1", dec!(0), dec!(100000)));
    repo.add_holding(holding("p1", "AAPL", dec!(10), dec!(150)));
    let (repo, market, service) = setup(repo);
    market.set_price("AAPL", dec!(200));
    market.set_price("SPY", dec!(500));

    // Sell 9.9995 shares; the 0.0005 remainder is dust and the row goes away.
    service.sell(request("p1", "AAPL", dec!(1999.90)), None).await.unwrap();

    assert!(repo.list_holdings("p1").unwrap().is_empty());
}

#[tokio::test]
async fn sell_tolerates_fractional_drift_but_rejects_real_oversells() {
    let repo = InMemoryPortfolioRepository::with_portfolio(portfolio("p1", dec!(0), dec!(100000)));
    repo.add_holding(holding("p1", "AAPL", dec!(10), dec!(150)));
    let (_repo, market, service) = setup(repo);
    market.set_price("AAPL", dec!(100));
    market.set_price("SPY", dec!(500));

    // 10.00005 shares requested: within the 0.0001 drift tolerance.
    let ok = service.sell(request("p1", "AAPL", dec!(1000.005)), None).await;
    assert!(ok.is_ok());
}

#[tokio::test]
async fn sell_rejects_oversell_beyond_tolerance() {
    let repo = InMemoryPortfolioRepository::with_portfolio(portfolio("p1", dec!(0), dec!(100000)));
    repo.add_holding(holding("p1", "AAPL", dec!(10), dec!(150)));
    let (repo, market, service) = setup(repo);
    market.set_price("AAPL", dec!(100));

    // 10.002 shares requested: past the tolerance.
    let err = service.sell(request("p1", "AAPL", dec!(1000.2)), None).await.unwrap_err();
    assert!(matches!(err, Error::Ledger(LedgerError::InsufficientShares)));
    assert_eq!(repo.list_holdings("p1").unwrap()[0].shares, dec!(10));
}

#[tokio::test]
async fn sell_rejects_missing_position() {
    let (_repo, market, service) =
        setup(InMemoryPortfolioRepository::with_portfolio(portfolio("p1", dec!(1000), dec!(1000))));
    market.set_price("AAPL", dec!(200));

    let err = service.sell(request("p1", "AAPL", dec!(100)), None).await.unwrap_err();
    assert!(matches!(err, Error::Ledger(LedgerError::NoPosition)));
}

// --- benchmark mirror ---

#[tokio::test]
async fn buy_mirrors_same_dollars_into_benchmark() {
    let (repo, market, service) =
        setup(InMemoryPortfolioRepository::with_portfolio(portfolio("p1", dec!(100000), dec!(100000))));
    market.set_price("AAPL", dec!(200));
    market.set_price("SPY", dec!(400));

    service.buy(request("p1", "AAPL", dec!(1000)), None).await.unwrap();

    let benchmark_holdings = repo.list_benchmark_holdings("p1").unwrap();
    assert_eq!(benchmark_holdings.len(), 1);
    assert_eq!(benchmark_holdings[0].ticker, "SPY");
    assert_eq!(benchmark_holdings[0].shares, dec!(2.5));
    assert_eq!(benchmark_holdings[0].avg_cost, dec!(400));

    let benchmark_trades = repo.list_benchmark_trades_desc("p1").unwrap();
    assert_eq!(benchmark_trades.len(), 1);
    assert_eq!(benchmark_trades[0].dollars, dec!(1000));
    assert_eq!(benchmark_trades[0].price, dec!(400));
}

#[tokio::test]
async fn benchmark_sell_clamps_to_available_shares() {
    let repo = InMemoryPortfolioRepository::with_portfolio(portfolio("p1", dec!(0), dec!(100000)));
    repo.add_holding(holding("p1", "AAPL", dec!(100), dec!(10)));
    // Only one mirrored SPY share exists.
    repo.add_benchmark_holding(holding("p1", "SPY", dec!(1), dec!(400)));
    let (repo, market, service) = setup(repo);
    market.set_price("AAPL", dec!(10));
    market.set_price("SPY", dec!(400));

    // $800 sell asks for 2 SPY shares; only 1 is there.
    service.sell(request("p1", "AAPL", dec!(800)), None).await.unwrap();

    // The whole benchmark holding was sold, and nothing went negative.
    assert!(repo.list_benchmark_holdings("p1").unwrap().is_empty());
    let benchmark_trades = repo.list_benchmark_trades_desc("p1").unwrap();
    assert_eq!(benchmark_trades[0].shares, dec!(1));
    assert_eq!(benchmark_trades[0].dollars, dec!(400));
}

#[tokio::test]
async fn sell_without_benchmark_holding_skips_mirror() {
    let repo = InMemoryPortfolioRepository::with_portfolio(portfolio("p1", dec!(0), dec!(100000)));
    repo.add_holding(holding("p1", "AAPL", dec!(10), dec!(100)));
    let (repo, market, service) = setup(repo);
    market.set_price("AAPL", dec!(100));
    market.set_price("SPY", dec!(400));

    service.sell(request("p1", "AAPL", dec!(500)), None).await.unwrap();

    assert!(repo.list_benchmark_trades_desc("p1").unwrap().is_empty());
}

#[tokio::test]
async fn missing_benchmark_price_does_not_fail_the_trade() {
    let (repo, market, service) =
        setup(InMemoryPortfolioRepository::with_portfolio(portfolio("p1", dec!(10000), dec!(10000))));
    market.set_price("AAPL", dec!(200));
    // No SPY quote at all.

    let confirmation = service.buy(request("p1", "AAPL", dec!(1000)), None).await.unwrap();
    assert_eq!(confirmation.shares, dec!(5));
    assert!(repo.list_benchmark_trades_desc("p1").unwrap().is_empty());
    assert_eq!(repo.list_trades_desc("p1").unwrap().len(), 1);
}

#[tokio::test]
async fn changed_benchmark_applies_to_future_trades_only() {
    let repo = InMemoryPortfolioRepository::with_portfolio(portfolio("p1", dec!(100000), dec!(100000)));
    repo.add_benchmark_holding(holding("p1", "SPY", dec!(5), dec!(400)));
    let (repo, market, service) = setup(repo);
    market.set_price("AAPL", dec!(200));
    market.set_price("QQQ", dec!(500));

    service.change_benchmark("p1", "QQQ").await.unwrap();
    service.buy(request("p1", "AAPL", dec!(1000)), None).await.unwrap();

    let benchmark_holdings = repo.list_benchmark_holdings("p1").unwrap();
    // Old SPY shares stay frozen; new dollars went into QQQ.
    assert_eq!(benchmark_holdings.len(), 2);
    let spy = benchmark_holdings.iter().find(|h| h.ticker == "SPY").unwrap();
    assert_eq!(spy.shares, dec!(5));
    let qqq = benchmark_holdings.iter().find(|h| h.ticker == "QQQ").unwrap();
    assert_eq!(qqq.shares, dec!(2));
}

// --- restrictions ---

#[tokio::test]
async fn restriction_violation_aborts_with_no_side_effects() {
    let (repo, market, service) =
        setup(InMemoryPortfolioRepository::with_portfolio(portfolio("p1", dec!(100000), dec!(100000))));
    market.set_price("AAPL", dec!(200));
    market.set_price("SPY", dec!(400));

    let rules = RestrictionSet {
        approval_code: Some("SECRET".to_string()),
        ..Default::default()
    };

    let err = service
        .buy(request("p1", "AAPL", dec!(1000)), Some(&rules))
        .await
        .unwrap_err();

    match err {
        Error::Ledger(LedgerError::RestrictionViolation(errors)) => {
            assert_eq!(errors, vec!["Invalid trade approval code".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }

    // Atomic rejection: nothing was written.
    assert!(repo.list_trades_desc("p1").unwrap().is_empty());
    assert!(repo.list_holdings("p1").unwrap().is_empty());
    assert_eq!(
        repo.get_portfolio("p1").unwrap().unwrap().cash_balance,
        dec!(100000)
    );
}

#[tokio::test]
async fn restricted_trade_executes_when_rules_pass() {
    let (repo, market, service) =
        setup(InMemoryPortfolioRepository::with_portfolio(portfolio("p1", dec!(100000), dec!(100000))));
    market.set_price("AAPL", dec!(200));
    market.set_price("SPY", dec!(400));

    let rules = RestrictionSet {
        approval_code: Some("SECRET".to_string()),
        ..Default::default()
    };

    let mut req = request("p1", "AAPL", dec!(1000));
    req.approval_code = Some("SECRET".to_string());
    service.buy(req, Some(&rules)).await.unwrap();

    assert_eq!(repo.list_trades_desc("p1").unwrap().len(), 1);
}

#[tokio::test]
async fn frequency_rule_counts_persisted_trades() {
    let (repo, market, service) =
        setup(InMemoryPortfolioRepository::with_portfolio(portfolio("p1", dec!(100000), dec!(100000))));
    market.set_price("TICK", dec!(100));
    market.set_price("SPY", dec!(400));

    let rules = RestrictionSet {
        trade_frequency: crate::restrictions::TradeFrequency::OncePerDay,
        require_rationale: false,
        ..Default::default()
    };

    service.buy(request("p1", "TICK", dec!(100)), Some(&rules)).await.unwrap();

    let err = service
        .buy(request("p1", "TICK", dec!(100)), Some(&rules))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Ledger(LedgerError::RestrictionViolation(_))
    ));
    assert_eq!(repo.list_trades_desc("p1").unwrap().len(), 1);
}

// --- bonus cash and portfolio lifecycle ---

#[tokio::test]
async fn award_bonus_credits_cash_only() {
    let (repo, _market, service) =
        setup(InMemoryPortfolioRepository::with_portfolio(portfolio("p1", dec!(500), dec!(100000))));

    let new_balance = service.award_bonus("p1", dec!(250)).await.unwrap();
    assert_eq!(new_balance, dec!(750));
    assert_eq!(
        repo.get_portfolio("p1").unwrap().unwrap().cash_balance,
        dec!(750)
    );
    assert!(repo.list_trades_desc("p1").unwrap().is_empty());

    let err = service.award_bonus("p1", Decimal::ZERO).await.unwrap_err();
    assert!(matches!(err, Error::Ledger(LedgerError::InvalidAmount)));
}

#[tokio::test]
async fn individual_owner_may_hold_one_active_portfolio() {
    let (_repo, _market, service) = setup(InMemoryPortfolioRepository::default());

    let new_portfolio = NewPortfolio {
        owner_kind: OwnerKind::Individual,
        owner_id: "u1".to_string(),
        starting_cash: dec!(100000),
        benchmark_ticker: "SPY".to_string(),
        is_public: true,
        allow_reset: true,
    };

    service.open_portfolio(new_portfolio.clone()).await.unwrap();
    let err = service.open_portfolio(new_portfolio).await.unwrap_err();
    assert!(matches!(err, Error::ConstraintViolation(_)));
}

#[tokio::test]
async fn competition_registrations_may_coexist() {
    let (_repo, _market, service) = setup(InMemoryPortfolioRepository::default());

    let entry = NewPortfolio {
        owner_kind: OwnerKind::Competition,
        owner_id: "u1".to_string(),
        starting_cash: dec!(50000),
        benchmark_ticker: "SPY".to_string(),
        is_public: true,
        allow_reset: false,
    };

    service.open_portfolio(entry.clone()).await.unwrap();
    // A second competition entry for the same user is fine.
    service.open_portfolio(entry).await.unwrap();
}
