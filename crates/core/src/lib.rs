//! Paper-trading core: trade ledger, benchmark mirror, snapshots,
//! restriction checks, and leaderboard analytics.
//!
//! This crate is database-agnostic; it defines repository traits that are
//! implemented by the `beatspy-storage-sqlite` crate.

pub mod constants;
pub mod errors;
pub mod leaderboard;
pub mod market_data;
pub mod portfolios;
pub mod restrictions;
pub mod utils;

pub use errors::Error;
pub use errors::Result;
