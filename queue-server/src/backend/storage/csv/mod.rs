//! # CSV Storage Module
//!
//! Flat-file storage: the outlet directory in YAML, each day's ledger as a
//! CSV file plus a YAML aggregate.

pub mod connection;
pub mod ledger_repository;
pub mod outlet_repository;

#[cfg(test)]
pub mod test_utils;

pub use connection::CsvConnection;
pub use ledger_repository::LedgerRepository as CsvLedgerRepository;
pub use outlet_repository::OutletRepository as CsvOutletRepository;
