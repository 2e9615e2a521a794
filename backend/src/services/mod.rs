//! Business logic services for the Crate Logistics Management platform

pub mod ledger;
pub mod settlement;
pub mod stock;

pub use ledger::LedgerService;
pub use settlement::SettlementService;
pub use stock::StockService;
