use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Default cash balance granted to a new portfolio.
pub const DEFAULT_STARTING_CASH: Decimal = dec!(100000);

/// Default benchmark ticker mirrored by the shadow portfolio.
pub const DEFAULT_BENCHMARK_TICKER: &str = "SPY";

/// Tolerance applied when checking a sell against the held share count.
/// Absorbs floating-point drift accumulated by repeated fractional-share
/// trades; a sell is rejected only when it exceeds the position by more
/// than this.
pub const SELL_SHARE_TOLERANCE: Decimal = dec!(0.0001);

/// Positions with fewer shares than this are treated as fully exited and
/// removed from the holdings table.
pub const DUST_SHARE_THRESHOLD: Decimal = dec!(0.001);

/// Share threshold below which a reconstructed historical position is
/// considered closed and excluded from as-of results.
pub const RECONSTRUCTION_SHARE_EPSILON: Decimal = dec!(0.0001);

/// Portfolios younger than this are reported with their raw total return;
/// annualizing very short windows produces extreme, misleading values.
pub const MIN_ANNUALIZATION_DAYS: i64 = 18;

/// Average days per year, accounting for leap years.
pub const DAYS_PER_YEAR: Decimal = dec!(365.25);
