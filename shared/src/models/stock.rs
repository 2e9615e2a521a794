//! Stock account and movement ledger models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The stock account. Exactly one exists once the ledger is initialized;
/// `stock_current` is the authoritative running balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAccount {
    pub stock_initial: i64,
    pub stock_current: i64,
    /// Snapshot of `stock_current` taken at the last alert acknowledgement
    /// or purchase; drawdown is measured against this reference.
    pub last_alert_reference: i64,
    /// Percentage drop from the reference that raises the alert.
    pub alert_threshold_pct: i32,
    pub initialized_at: DateTime<Utc>,
    pub initialized_by: Option<Uuid>,
}

impl StockAccount {
    /// Whether the drawdown since the last alert reference has reached the
    /// configured threshold. Division-free so a zero reference never panics:
    /// `(reference - current) / reference >= pct / 100` becomes
    /// `(reference - current) * 100 >= reference * pct`.
    pub fn alert_active(&self) -> bool {
        self.last_alert_reference > 0
            && (self.last_alert_reference - self.stock_current) * 100
                >= self.last_alert_reference * i64::from(self.alert_threshold_pct)
    }
}

/// Types of balance-affecting (or audit-only) ledger movements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Initialize,
    Depart,
    Return,
    Surplus,
    Adjustment,
    Purchase,
    ConflictReturn,
    /// Audit-only: quantity is always zero. The stock already reflected the
    /// loss at departure/return time and must not be decremented twice.
    ConflictLossConfirmed,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Initialize => "initialize",
            MovementType::Depart => "depart",
            MovementType::Return => "return",
            MovementType::Surplus => "surplus",
            MovementType::Adjustment => "adjustment",
            MovementType::Purchase => "purchase",
            MovementType::ConflictReturn => "conflict_return",
            MovementType::ConflictLossConfirmed => "conflict_loss_confirmed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "initialize" => Some(MovementType::Initialize),
            "depart" => Some(MovementType::Depart),
            "return" => Some(MovementType::Return),
            "surplus" => Some(MovementType::Surplus),
            "adjustment" => Some(MovementType::Adjustment),
            "purchase" => Some(MovementType::Purchase),
            "conflict_return" => Some(MovementType::ConflictReturn),
            "conflict_loss_confirmed" => Some(MovementType::ConflictLossConfirmed),
            _ => None,
        }
    }
}

/// One immutable ledger entry. `balance_after` snapshots `stock_current`
/// immediately after this movement's effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: i64,
    pub movement_type: MovementType,
    /// Signed delta applied to the balance; zero for audit-only movements.
    pub quantity: i64,
    pub balance_after: i64,
    pub tour_id: Option<Uuid>,
    pub conflict_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a tour return: either a surplus (more crates came back than
/// departed) or a loss (the shortfall the tour workflow may turn into a
/// conflict). Never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnOutcome {
    pub surplus: i64,
    pub loss: i64,
}

impl ReturnOutcome {
    pub fn from_counts(departed: i64, returned: i64) -> Self {
        let difference = departed - returned;
        if difference < 0 {
            Self {
                surplus: -difference,
                loss: 0,
            }
        } else {
            Self {
                surplus: 0,
                loss: difference,
            }
        }
    }
}

/// Aggregated stock snapshot served by the read path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockState {
    pub initialized: bool,
    pub stock_current: i64,
    /// Crates out with tours in an active status: departed minus returned so
    /// far, summed over those tours.
    pub stock_in_transit: i64,
    /// Portion of resolved conflicts that was settled by payment rather than
    /// physical return.
    pub stock_lost_to_date: i64,
    pub alert_active: bool,
    pub last_alert_reference: i64,
    pub alert_threshold_pct: i32,
}

impl StockState {
    /// Well-defined state before `initialize` has ever run.
    pub fn uninitialized() -> Self {
        Self {
            initialized: false,
            stock_current: 0,
            stock_in_transit: 0,
            stock_lost_to_date: 0,
            alert_active: false,
            last_alert_reference: 0,
            alert_threshold_pct: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(current: i64, reference: i64, pct: i32) -> StockAccount {
        StockAccount {
            stock_initial: reference,
            stock_current: current,
            last_alert_reference: reference,
            alert_threshold_pct: pct,
            initialized_at: Utc::now(),
            initialized_by: None,
        }
    }

    #[test]
    fn test_alert_triggers_at_threshold() {
        // 20% of 1000 is 200; a drop to 800 is exactly at the threshold
        assert!(account(800, 1000, 20).alert_active());
        assert!(account(700, 1000, 20).alert_active());
    }

    #[test]
    fn test_alert_quiet_below_threshold() {
        assert!(!account(801, 1000, 20).alert_active());
        assert!(!account(1000, 1000, 20).alert_active());
    }

    #[test]
    fn test_alert_quiet_when_stock_grew() {
        assert!(!account(1200, 1000, 20).alert_active());
    }

    #[test]
    fn test_alert_zero_reference_never_fires() {
        assert!(!account(-5, 0, 20).alert_active());
    }

    #[test]
    fn test_return_outcome_loss() {
        let outcome = ReturnOutcome::from_counts(50, 45);
        assert_eq!(outcome.loss, 5);
        assert_eq!(outcome.surplus, 0);
    }

    #[test]
    fn test_return_outcome_surplus() {
        let outcome = ReturnOutcome::from_counts(40, 50);
        assert_eq!(outcome.surplus, 10);
        assert_eq!(outcome.loss, 0);
    }

    #[test]
    fn test_return_outcome_exact() {
        let outcome = ReturnOutcome::from_counts(30, 30);
        assert_eq!(outcome.surplus, 0);
        assert_eq!(outcome.loss, 0);
    }

    #[test]
    fn test_movement_type_round_trip() {
        let types = [
            MovementType::Initialize,
            MovementType::Depart,
            MovementType::Return,
            MovementType::Surplus,
            MovementType::Adjustment,
            MovementType::Purchase,
            MovementType::ConflictReturn,
            MovementType::ConflictLossConfirmed,
        ];
        for t in types {
            assert_eq!(MovementType::parse(t.as_str()), Some(t));
        }
        assert_eq!(MovementType::parse("unknown"), None);
    }
}
