//! # SQLite Storage Module
//!
//! - **connection.rs** - pool management and schema setup
//! - **repositories/** - outlet directory and ledger repositories

pub mod connection;
pub mod repositories;

#[cfg(test)]
pub mod test_support;

pub use connection::DbConnection;
pub use repositories::{LedgerRepository as SqliteLedgerRepository, OutletRepository as SqliteOutletRepository};
