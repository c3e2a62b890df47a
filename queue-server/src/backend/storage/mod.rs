//! # Storage Module
//!
//! Persistence for the outlet directory and the queue ledgers.
//!
//! The domain layer only sees the traits in `traits.rs`. Two backends
//! implement them:
//!
//! - **sqlite**: SQLx over a single SQLite database; uniqueness rules are
//!   enforced by indexes and each commit is one SQL transaction
//! - **csv**: one directory per (outlet, day) holding `customers.csv` and
//!   `queue.yaml`, written through temp files and renamed into place

pub mod csv;
pub mod sqlite;
pub mod traits;

pub use traits::{Connection, EntryUpdate, LedgerCommit, LedgerStorage, OutletStorage, StorageConflict};
