//! Leaderboard view models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::portfolios::OwnerKind;

/// One ranked portfolio with its full metric set, ready for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub portfolio_id: String,
    pub owner_kind: OwnerKind,
    pub owner_id: String,
    pub total_value: Decimal,
    pub total_return_pct: Decimal,
    pub today_return_pct: Decimal,
    pub week_return_pct: Decimal,
    pub month_return_pct: Decimal,
    pub annualized_return_pct: Decimal,
    pub risk_adjusted_return_pct: Decimal,
    pub benchmark_return_pct: Decimal,
    pub holdings_count: usize,
}
