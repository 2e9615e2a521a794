//! Settlement progress math for crate shortage conflicts
//!
//! Pure value computations: the services load and lock the rows, this module
//! decides how far a conflict is from being covered. A conflict is resolved
//! when every lost crate came back physically, or when the value of returns
//! plus payments covers the value of the original loss. Mixed settlement is
//! the common case.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Rounding tolerance on monetary comparisons (one cent).
pub fn rounding_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// Derived settlement position of a conflict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementState {
    pub remaining_crates: i64,
    /// Outstanding monetary value, clamped at zero.
    pub remaining_amount: Decimal,
    /// Settlement progress in percent, capped at 100, two decimals.
    pub progress_pct: Decimal,
    pub is_resolved: bool,
    pub unit_value: Decimal,
}

/// Compute the settlement position from a conflict's accumulators and the
/// configured value per crate.
pub fn settlement_state(
    quantity_lost: i64,
    quantity_returned: i64,
    amount_paid: Decimal,
    unit_value: Decimal,
) -> SettlementState {
    let remaining_crates = quantity_lost - quantity_returned;
    let total_value = Decimal::from(quantity_lost) * unit_value;
    let settled_value = Decimal::from(quantity_returned) * unit_value + amount_paid;

    let is_resolved = quantity_returned == quantity_lost || settled_value >= total_value;

    let remaining_amount =
        (Decimal::from(remaining_crates) * unit_value - amount_paid).max(Decimal::ZERO);

    let progress_pct = if total_value.is_zero() {
        Decimal::ONE_HUNDRED
    } else {
        (settled_value / total_value * Decimal::ONE_HUNDRED)
            .min(Decimal::ONE_HUNDRED)
            .round_dp(2)
    };

    SettlementState {
        remaining_crates,
        remaining_amount,
        progress_pct,
        is_resolved,
        unit_value,
    }
}

/// Whether a payment overshoots the outstanding value beyond the rounding
/// tolerance.
pub fn payment_exceeds_remaining(amount: Decimal, remaining_amount: Decimal) -> bool {
    amount > remaining_amount + rounding_tolerance()
}

/// How many whole crates a payment covers at the configured unit value.
/// Used for the audit-only confirmed-loss movement.
pub fn crates_covered_by_payment(amount: Decimal, unit_value: Decimal) -> i64 {
    if unit_value <= Decimal::ZERO {
        return 0;
    }
    (amount / unit_value).floor().to_i64().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_fresh_conflict_state() {
        let state = settlement_state(5, 0, Decimal::ZERO, dec("50"));
        assert_eq!(state.remaining_crates, 5);
        assert_eq!(state.remaining_amount, dec("250"));
        assert_eq!(state.progress_pct, Decimal::ZERO);
        assert!(!state.is_resolved);
    }

    #[test]
    fn test_mixed_settlement_resolves() {
        // 5 lost at 50 each: 3 returned (150) + 100 paid covers the 250 total
        let state = settlement_state(5, 3, dec("100"), dec("50"));
        assert!(state.is_resolved);
        assert_eq!(state.remaining_amount, Decimal::ZERO);
        assert_eq!(state.progress_pct, Decimal::ONE_HUNDRED);
    }

    #[test]
    fn test_partial_settlement_progress() {
        // 3 returned of 5 at 50: 150 of 250 settled
        let state = settlement_state(5, 3, Decimal::ZERO, dec("50"));
        assert!(!state.is_resolved);
        assert_eq!(state.remaining_crates, 2);
        assert_eq!(state.remaining_amount, dec("100"));
        assert_eq!(state.progress_pct, dec("60.00"));
    }

    #[test]
    fn test_full_physical_return_resolves() {
        let state = settlement_state(4, 4, Decimal::ZERO, dec("50"));
        assert!(state.is_resolved);
        assert_eq!(state.remaining_crates, 0);
        assert_eq!(state.remaining_amount, Decimal::ZERO);
    }

    #[test]
    fn test_zero_loss_is_fully_settled() {
        let state = settlement_state(0, 0, Decimal::ZERO, dec("50"));
        assert!(state.is_resolved);
        assert_eq!(state.progress_pct, Decimal::ONE_HUNDRED);
    }

    #[test]
    fn test_remaining_amount_clamps_at_zero() {
        // Paid slightly over the outstanding value (within tolerance)
        let state = settlement_state(2, 0, dec("100.01"), dec("50"));
        assert_eq!(state.remaining_amount, Decimal::ZERO);
        assert!(state.is_resolved);
    }

    #[test]
    fn test_payment_overshoot_guard() {
        assert!(!payment_exceeds_remaining(dec("100.00"), dec("100.00")));
        assert!(!payment_exceeds_remaining(dec("100.01"), dec("100.00")));
        assert!(payment_exceeds_remaining(dec("100.02"), dec("100.00")));
    }

    #[test]
    fn test_crates_covered_by_payment() {
        assert_eq!(crates_covered_by_payment(dec("100"), dec("50")), 2);
        assert_eq!(crates_covered_by_payment(dec("149.99"), dec("50")), 2);
        assert_eq!(crates_covered_by_payment(dec("49.99"), dec("50")), 0);
        assert_eq!(crates_covered_by_payment(dec("100"), Decimal::ZERO), 0);
    }

    #[test]
    fn test_progress_rounding() {
        // 1 of 3 returned at 50: 50/150 = 33.33%
        let state = settlement_state(3, 1, Decimal::ZERO, dec("50"));
        assert_eq!(state.progress_pct, dec("33.33"));
    }
}
