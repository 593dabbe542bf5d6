//! The shadow benchmark portfolio.
//!
//! Every primary trade routes the same dollars into the portfolio's
//! benchmark ticker at the benchmark's own quoted price, so the benchmark
//! return answers "what if this cash schedule had gone into the index
//! instead". All functions here are pure; the ledger folds their output into
//! the same transaction as the primary trade.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

use super::portfolios_model::{
    Holding, HoldingMutation, HoldingUpsert, MirrorApplication, NewTrade, Portfolio, Trade,
    TradeSide,
};
use crate::constants::DUST_SHARE_THRESHOLD;
use crate::market_data::Quote;

/// Mirror a primary buy: convert `dollars` to benchmark shares at the
/// benchmark's current price and blend into the existing benchmark holding
/// with the same weighted-average-cost rule as the primary ledger.
pub fn mirror_buy(
    portfolio_id: &str,
    benchmark_ticker: &str,
    existing: Option<&Holding>,
    dollars: Decimal,
    price: Decimal,
    executed_at: DateTime<Utc>,
) -> MirrorApplication {
    let shares = dollars / price;
    let holding = match existing {
        Some(held) => {
            let total_cost = held.shares * held.avg_cost + dollars;
            let total_shares = held.shares + shares;
            HoldingMutation::Upsert(HoldingUpsert {
                ticker: benchmark_ticker.to_string(),
                shares: total_shares,
                avg_cost: total_cost / total_shares,
            })
        }
        None => HoldingMutation::Upsert(HoldingUpsert {
            ticker: benchmark_ticker.to_string(),
            shares,
            avg_cost: price,
        }),
    };

    MirrorApplication {
        trade: mirror_trade(portfolio_id, benchmark_ticker, TradeSide::Buy, dollars, shares, price, executed_at),
        holding,
    }
}

/// Mirror a primary sell, clamped to the benchmark shares actually held.
///
/// The benchmark diverges in price from the primary asset, so a proportional
/// sell may ask for more mirrored shares than exist; the shortfall is simply
/// not sold. Returns `None` when there is no benchmark holding to sell from.
pub fn mirror_sell(
    portfolio_id: &str,
    benchmark_ticker: &str,
    existing: Option<&Holding>,
    dollars: Decimal,
    price: Decimal,
    executed_at: DateTime<Utc>,
) -> Option<MirrorApplication> {
    let held = existing?;
    if held.shares <= Decimal::ZERO {
        return None;
    }

    let requested_shares = dollars / price;
    let (sold_shares, sold_dollars) = if requested_shares > held.shares {
        (held.shares, held.shares * price)
    } else {
        (requested_shares, dollars)
    };

    let remaining = held.shares - sold_shares;
    let holding = if remaining < DUST_SHARE_THRESHOLD {
        HoldingMutation::Remove {
            ticker: benchmark_ticker.to_string(),
        }
    } else {
        HoldingMutation::Upsert(HoldingUpsert {
            ticker: benchmark_ticker.to_string(),
            shares: remaining,
            avg_cost: held.avg_cost,
        })
    };

    Some(MirrorApplication {
        trade: mirror_trade(
            portfolio_id,
            benchmark_ticker,
            TradeSide::Sell,
            sold_dollars,
            sold_shares,
            price,
            executed_at,
        ),
        holding,
    })
}

#[allow(clippy::too_many_arguments)]
fn mirror_trade(
    portfolio_id: &str,
    ticker: &str,
    side: TradeSide,
    dollars: Decimal,
    shares: Decimal,
    price: Decimal,
    executed_at: DateTime<Utc>,
) -> NewTrade {
    NewTrade {
        portfolio_id: portfolio_id.to_string(),
        user_id: None,
        ticker: ticker.to_string(),
        side,
        dollars,
        shares,
        price,
        rationale: None,
        executed_at,
    }
}

/// Benchmark cash is never stored; it is derived from the mirrored dollar
/// flows: `starting_cash - Σ(buy dollars - sell dollars)`.
pub fn derived_cash(starting_cash: Decimal, benchmark_trades: &[Trade]) -> Decimal {
    let net_invested: Decimal = benchmark_trades
        .iter()
        .map(|t| match t.side {
            TradeSide::Buy => t.dollars,
            TradeSide::Sell => -t.dollars,
        })
        .sum();
    starting_cash - net_invested
}

/// Return percent of the shadow portfolio: mirrored holdings at current
/// prices plus derived cash, against starting cash. Holdings left frozen
/// under a previous benchmark ticker are valued at their own ticker's price
/// (falling back to their cost basis when no quote resolves).
pub fn benchmark_return_pct(
    portfolio: &Portfolio,
    benchmark_holdings: &[Holding],
    benchmark_trades: &[Trade],
    quotes: &HashMap<String, Quote>,
) -> Decimal {
    if portfolio.starting_cash.is_zero() {
        return Decimal::ZERO;
    }

    let holdings_value: Decimal = benchmark_holdings
        .iter()
        .map(|h| {
            let price = quotes
                .get(&h.ticker)
                .and_then(Quote::valuation_price)
                .unwrap_or(h.avg_cost);
            h.shares * price
        })
        .sum();

    let total = holdings_value + derived_cash(portfolio.starting_cash, benchmark_trades);
    (total - portfolio.starting_cash) / portfolio.starting_cash * Decimal::from(100)
}
