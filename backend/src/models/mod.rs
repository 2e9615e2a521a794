//! Database models for the Crate Logistics Management platform
//!
//! Re-exports models from the shared crate

pub use shared::models::*;
