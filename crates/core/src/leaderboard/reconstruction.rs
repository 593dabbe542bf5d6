//! As-of reconstruction: derive a portfolio's past state by reversing the
//! trades newer than a target instant, instead of storing per-day snapshots.
//!
//! Precondition: the trade log is sorted newest-first by execution time.
//! The walk stops at the first trade at or before the target instant, which
//! is only correct under that ordering — an unsorted log silently produces
//! wrong results, not an error.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::constants::RECONSTRUCTION_SHARE_EPSILON;
use crate::portfolios::{Holding, Trade, TradeSide};

/// Share counts per ticker as of `as_of`: start from the current holdings
/// and undo every later trade (subtract a buy's shares, add back a sell's).
/// Positions at or under the exit epsilon are dropped.
pub fn reconstruct_holdings_as_of(
    current_holdings: &[Holding],
    trades_desc: &[Trade],
    as_of: DateTime<Utc>,
) -> HashMap<String, Decimal> {
    let mut shares_by_ticker: HashMap<String, Decimal> = current_holdings
        .iter()
        .map(|h| (h.ticker.clone(), h.shares))
        .collect();

    for trade in trades_desc {
        if trade.executed_at <= as_of {
            break;
        }
        let entry = shares_by_ticker
            .entry(trade.ticker.clone())
            .or_insert(Decimal::ZERO);
        match trade.side {
            TradeSide::Buy => *entry -= trade.shares,
            TradeSide::Sell => *entry += trade.shares,
        }
    }

    shares_by_ticker.retain(|_, shares| *shares > RECONSTRUCTION_SHARE_EPSILON);
    shares_by_ticker
}

/// Cash balance as of `as_of`: the same walk over dollar flow — add back a
/// buy's dollars, subtract a sell's.
pub fn reconstruct_cash_as_of(
    current_cash: Decimal,
    trades_desc: &[Trade],
    as_of: DateTime<Utc>,
) -> Decimal {
    let mut cash = current_cash;
    for trade in trades_desc {
        if trade.executed_at <= as_of {
            break;
        }
        match trade.side {
            TradeSide::Buy => cash += trade.dollars,
            TradeSide::Sell => cash -= trade.dollars,
        }
    }
    cash
}
