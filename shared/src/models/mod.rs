//! Domain models for the Crate Logistics Management platform

mod conflict;
mod stock;
mod tour;

pub use conflict::*;
pub use stock::*;
pub use tour::*;
