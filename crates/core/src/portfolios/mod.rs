pub mod benchmark_mirror;
pub mod ledger_service;
pub mod portfolios_model;
pub mod portfolios_traits;
pub mod snapshot_service;

#[cfg(test)]
pub(crate) mod test_fixtures;

#[cfg(test)]
mod ledger_service_tests;

use thiserror::Error;

pub use ledger_service::LedgerService;
pub use portfolios_model::*;
pub use portfolios_traits::PortfolioRepositoryTrait;
pub use snapshot_service::SnapshotService;

/// Trade and lifecycle failures surfaced to the caller. The message text is
/// the user-visible string; nothing here is panicked.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Portfolio not found")]
    PortfolioNotFound,

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Insufficient cash")]
    InsufficientCash,

    #[error("You don't own this stock")]
    NoPosition,

    #[error("Not enough shares")]
    InsufficientShares,

    #[error("No price available for {0}")]
    PriceUnavailable(String),

    #[error("Trade not allowed: {}", .0.join("; "))]
    RestrictionViolation(Vec<String>),

    #[error("Reset is not allowed for this portfolio")]
    ResetNotAllowed,

    #[error("Only individual portfolios can be closed")]
    CloseNotAllowed,
}
