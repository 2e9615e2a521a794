//! HTTP handlers for the Crate Logistics Management platform

pub mod health;
pub mod ledger;
pub mod settlement;
pub mod stock;

pub use health::*;
pub use ledger::*;
pub use settlement::*;
pub use stock::*;
