//! Pure return metrics for leaderboard rows.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use std::collections::HashMap;

use crate::constants::{DAYS_PER_YEAR, MIN_ANNUALIZATION_DAYS};
use crate::market_data::{CompanyProfile, Quote};
use crate::portfolios::Holding;

/// `(current - past) / past * 100`. Defined as 0 when `past` is 0 — a
/// division-by-zero guard, not a mathematically faithful value.
pub fn period_return_pct(past: Decimal, current: Decimal) -> Decimal {
    if past.is_zero() {
        return Decimal::ZERO;
    }
    (current - past) / past * Decimal::from(100)
}

/// Approximate calendar-day return: the portfolio valued at each holding's
/// previous close against the same holdings at current prices, cash held
/// constant. Today's holdings are used for both valuations, so the figure
/// is slightly biased when holdings changed intraday.
pub fn today_return_pct(
    holdings: &[Holding],
    quotes: &HashMap<String, Quote>,
    cash: Decimal,
) -> Decimal {
    let yesterday_value: Decimal = holdings
        .iter()
        .map(|h| {
            let prev_close = quotes
                .get(&h.ticker)
                .and_then(|q| {
                    q.previous_close
                        .filter(|p| !p.is_zero())
                        .or_else(|| q.price.filter(|p| !p.is_zero()))
                })
                .unwrap_or(Decimal::ZERO);
            h.shares * prev_close
        })
        .sum::<Decimal>()
        + cash;

    let current_value: Decimal = holdings
        .iter()
        .map(|h| {
            let price = quotes
                .get(&h.ticker)
                .and_then(|q| q.price)
                .unwrap_or(Decimal::ZERO);
            h.shares * price
        })
        .sum::<Decimal>()
        + cash;

    period_return_pct(yesterday_value, current_value)
}

/// Compound annual growth rate of a total return over the portfolio's
/// lifetime.
///
/// Portfolios younger than 18 days report their raw total return —
/// annualizing a days-old window turns noise into absurd figures. A total
/// loss (or worse) clamps to exactly −100% rather than producing a complex
/// or NaN result from a negative base.
pub fn annualized_return_pct(
    total_return_pct: Decimal,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Decimal {
    let days = Decimal::from((now - created_at).num_seconds()) / dec!(86400);
    if days < Decimal::from(MIN_ANNUALIZATION_DAYS) {
        return total_return_pct;
    }

    let multiplier = Decimal::ONE + total_return_pct / Decimal::from(100);
    if multiplier <= Decimal::ZERO {
        return dec!(-100);
    }

    let years = days / DAYS_PER_YEAR;
    (multiplier.powd(Decimal::ONE / years) - Decimal::ONE) * Decimal::from(100)
}

/// Total return divided by the portfolio's share-weighted beta. Holdings
/// without usable beta data carry no weight; when none have it (or the
/// weighted beta sums to zero), the raw return is returned unchanged.
pub fn risk_adjusted_return_pct(
    return_pct: Decimal,
    holdings: &[Holding],
    profiles: &HashMap<String, CompanyProfile>,
) -> Decimal {
    let mut total_weight = Decimal::ZERO;
    let mut weighted_beta = Decimal::ZERO;

    for holding in holdings {
        if let Some(beta) = profiles.get(&holding.ticker).and_then(|p| p.beta) {
            if beta > Decimal::ZERO {
                total_weight += holding.shares;
                weighted_beta += holding.shares * beta;
            }
        }
    }

    if total_weight.is_zero() || weighted_beta.is_zero() {
        return return_pct;
    }

    return_pct / (weighted_beta / total_weight)
}
