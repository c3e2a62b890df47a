pub mod ledger_repository;
pub mod outlet_repository;

pub use ledger_repository::LedgerRepository;
pub use outlet_repository::OutletRepository;
