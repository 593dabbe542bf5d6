/// Seconds a cached quote or company profile stays fresh.
pub const QUOTE_CACHE_TTL_SECS: i64 = 60;

/// Days of history requested around a target date when resolving a
/// historical close; wide enough to skip over weekends and holidays.
pub const HISTORICAL_CLOSE_LOOKBACK_DAYS: i64 = 7;
