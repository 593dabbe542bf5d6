//! SQLite storage for the paper-trading core.
//!
//! The only crate that knows about Diesel. It implements the repository
//! traits defined in `beatspy-core`:
//! - connection pooling and embedded migrations
//! - a single-writer actor that serializes every mutation
//! - the portfolio repository (portfolios, holdings, trades, benchmark
//!   tables, snapshots)

pub mod db;
pub mod errors;
pub mod portfolios;
pub mod schema;

pub use db::{create_pool, get_connection, run_migrations, spawn_writer, DbPool, WriteHandle};
pub use errors::StorageError;
pub use portfolios::PortfolioRepository;
