//! Tour reference models
//!
//! Tours are owned by the tour workflow; the ledger only references them and
//! needs their status vocabulary to compute in-transit stock.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a delivery tour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TourStatus {
    Planned,
    Departed,
    Returning,
    Closed,
    Cancelled,
}

impl TourStatus {
    /// Statuses during which a tour's crates count as in transit.
    pub const ACTIVE: &'static [TourStatus] = &[TourStatus::Departed, TourStatus::Returning];

    pub fn as_str(&self) -> &'static str {
        match self {
            TourStatus::Planned => "planned",
            TourStatus::Departed => "departed",
            TourStatus::Returning => "returning",
            TourStatus::Closed => "closed",
            TourStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "planned" => Some(TourStatus::Planned),
            "departed" => Some(TourStatus::Departed),
            "returning" => Some(TourStatus::Returning),
            "closed" => Some(TourStatus::Closed),
            "cancelled" => Some(TourStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }
}
