//! Conflict (crate shortage) and settlement models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Settlement status of a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    Pending,
    Resolved,
    /// Set by the tour workflow, never by the settlement engine.
    Cancelled,
}

impl ConflictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStatus::Pending => "pending",
            ConflictStatus::Resolved => "resolved",
            ConflictStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ConflictStatus::Pending),
            "resolved" => Some(ConflictStatus::Resolved),
            "cancelled" => Some(ConflictStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal conflicts refuse every further settlement action.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConflictStatus::Pending)
    }
}

/// A detected crate shortage under settlement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub id: Uuid,
    pub tour_id: Uuid,
    /// Crates unaccounted for at detection time. Fixed at creation.
    pub quantity_lost: i64,
    /// Crates physically recovered so far. Monotonically non-decreasing,
    /// never exceeds `quantity_lost`.
    pub quantity_returned: i64,
    /// Money paid so far. Monotonically non-decreasing.
    pub amount_paid: Decimal,
    pub status: ConflictStatus,
    pub opened_by: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// How a payment was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    Cash,
    SalaryDeduction,
}

impl PaymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Cash => "cash",
            PaymentMode::SalaryDeduction => "salary_deduction",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cash" => Some(PaymentMode::Cash),
            "salary_deduction" => Some(PaymentMode::SalaryDeduction),
            _ => None,
        }
    }
}

/// Kind of settlement action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionType {
    CrateReturn,
    Payment,
}

impl ResolutionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionType::CrateReturn => "crate_return",
            ResolutionType::Payment => "payment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "crate_return" => Some(ResolutionType::CrateReturn),
            "payment" => Some(ResolutionType::Payment),
            _ => None,
        }
    }
}

/// One immutable settlement action; the conflict's aggregate fields summarize
/// these records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionRecord {
    pub id: Uuid,
    pub conflict_id: Uuid,
    pub resolution_type: ResolutionType,
    pub quantity: Option<i64>,
    pub amount: Option<Decimal>,
    pub payment_mode: Option<PaymentMode>,
    pub actor_id: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_is_not_terminal() {
        assert!(!ConflictStatus::Pending.is_terminal());
    }

    #[test]
    fn test_resolved_and_cancelled_are_terminal() {
        assert!(ConflictStatus::Resolved.is_terminal());
        assert!(ConflictStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            ConflictStatus::Pending,
            ConflictStatus::Resolved,
            ConflictStatus::Cancelled,
        ] {
            assert_eq!(ConflictStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn test_payment_mode_round_trip() {
        for m in [PaymentMode::Cash, PaymentMode::SalaryDeduction] {
            assert_eq!(PaymentMode::parse(m.as_str()), Some(m));
        }
        assert_eq!(PaymentMode::parse("cheque"), None);
    }
}
