//! Pure restriction checks for a proposed trade.
//!
//! `validate_trade` is a function of its inputs only — the caller supplies
//! priced holdings, the latest same-ticker trade instant, and `now` — so the
//! same inputs always produce the same outcome.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::restrictions_model::RestrictionSet;
use crate::portfolios::{PricedHolding, TradeSide};

/// Everything the checks need to know about a proposed trade.
#[derive(Debug, Clone)]
pub struct TradeContext<'a> {
    pub side: TradeSide,
    pub ticker: &'a str,
    pub dollars: Decimal,
    /// Current holdings enriched with live prices.
    pub holdings: &'a [PricedHolding],
    /// Execution instant of the most recent trade on this ticker, if any.
    pub last_trade_on_ticker: Option<DateTime<Utc>>,
    pub approval_code: Option<&'a str>,
    pub rationale: Option<&'a str>,
    /// The class/competition starting cash, the base for position-percent
    /// caps.
    pub starting_cash: Decimal,
    pub now: DateTime<Utc>,
}

/// Outcome of the checks: valid when no violations were collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestrictionCheck {
    pub errors: Vec<String>,
}

impl RestrictionCheck {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs every applicable check and collects all violations, so the trader
/// sees the full list at once rather than one rejection at a time.
pub fn validate_trade(context: &TradeContext, rules: &RestrictionSet) -> RestrictionCheck {
    let mut errors = Vec::new();

    if let Some(expected) = rules.approval_code.as_deref() {
        if context.approval_code != Some(expected) {
            errors.push("Invalid trade approval code".to_string());
        }
    }

    if let Some(window_start) = rules.trade_frequency.window_start(context.now) {
        if context
            .last_trade_on_ticker
            .is_some_and(|last| last >= window_start)
        {
            errors.push(format!(
                "Only one trade per {} allowed on {}",
                rules.trade_frequency.period_name(),
                context.ticker
            ));
        }
    }

    if rules.require_rationale
        && context
            .rationale
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .is_none()
    {
        errors.push("A trade rationale is required".to_string());
    }

    match context.side {
        TradeSide::Buy => check_buy(context, rules, &mut errors),
        TradeSide::Sell => check_sell(context, rules, &mut errors),
    }

    RestrictionCheck { errors }
}

fn check_buy(context: &TradeContext, rules: &RestrictionSet, errors: &mut Vec<String>) {
    if rules.blocked_tickers.iter().any(|t| t == context.ticker) {
        errors.push(format!("{} is blocked by your class rules", context.ticker));
    }
    if rules.restricted_tickers.iter().any(|t| t == context.ticker) {
        errors.push(format!(
            "{} is restricted in this competition",
            context.ticker
        ));
    }

    let existing_position: Decimal = context
        .holdings
        .iter()
        .filter(|h| h.ticker == context.ticker)
        .map(PricedHolding::position_value)
        .sum();
    let projected = existing_position + context.dollars;

    if let Some(cap_pct) = rules.max_position_pct {
        if context.starting_cash > Decimal::ZERO {
            let pct = projected / context.starting_cash * Decimal::from(100);
            if pct > cap_pct {
                errors.push(format!(
                    "Position would exceed {}% limit ({:.1}%)",
                    cap_pct, pct
                ));
            }
        }
    }

    if let Some(cap) = rules.max_dollars_per_stock {
        if projected > cap {
            errors.push(format!(
                "Position in {} would exceed the ${} per-stock cap",
                context.ticker, cap
            ));
        }
    }

    if let Some(max_stocks) = rules.max_stocks_per_portfolio {
        let already_held = context.holdings.iter().any(|h| h.ticker == context.ticker);
        if !already_held && context.holdings.len() as u32 >= max_stocks {
            errors.push(format!("Portfolio is limited to {} stocks", max_stocks));
        }
    }
}

fn check_sell(context: &TradeContext, rules: &RestrictionSet, errors: &mut Vec<String>) {
    let Some(min_stocks) = rules.min_stocks else {
        return;
    };
    let Some(held) = context
        .holdings
        .iter()
        .find(|h| h.ticker == context.ticker)
    else {
        return;
    };

    // A sell within a penny of the position's value liquidates it.
    let would_sell_all = context.dollars >= held.position_value() - dec!(0.01);
    if would_sell_all && (context.holdings.len() as u32) <= min_stocks {
        errors.push(format!("Must maintain at least {} stocks", min_stocks));
    }
}
