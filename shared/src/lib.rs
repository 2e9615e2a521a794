//! Shared types and domain rules for the Crate Logistics Management platform
//!
//! This crate contains the models and pure bookkeeping logic shared between
//! the backend services and their test suites. It has no database or HTTP
//! dependency.

pub mod models;
pub mod settlement;
pub mod types;
pub mod validation;

pub use models::*;
pub use settlement::*;
pub use types::*;
pub use validation::*;
