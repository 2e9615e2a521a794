//! Stock aggregation service
//!
//! Pure read path combining the ledger balance with live tour data and
//! settled conflicts. Performs no writes and tolerates an uninitialized
//! account.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{ConflictStatus, StockAccount, StockState, TourStatus};

/// Read-only stock state service
#[derive(Clone)]
pub struct StockService {
    db: PgPool,
}

/// Row for the stock account
#[derive(Debug, FromRow)]
struct AccountRow {
    stock_initial: i64,
    stock_current: i64,
    last_alert_reference: i64,
    alert_threshold_pct: i32,
    initialized_at: DateTime<Utc>,
    initialized_by: Option<Uuid>,
}

impl StockService {
    /// Create a new StockService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get the aggregated stock snapshot
    pub async fn get_state(&self) -> AppResult<StockState> {
        let account = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT stock_initial, stock_current, last_alert_reference, alert_threshold_pct,
                   initialized_at, initialized_by
            FROM stock_accounts
            WHERE id = 1
            "#,
        )
        .fetch_optional(&self.db)
        .await?;

        let Some(account) = account else {
            return Ok(StockState::uninitialized());
        };

        // Crates currently out with active tours: departures minus what came
        // back so far, derived from the movement log so the audit trail stays
        // the single source of truth.
        let active: Vec<String> = TourStatus::ACTIVE
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        let in_transit = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(-SUM(m.quantity), 0)::BIGINT
            FROM stock_movements m
            JOIN tours t ON t.id = m.tour_id
            WHERE t.status = ANY($1)
              AND m.movement_type IN ('depart', 'return', 'surplus')
            "#,
        )
        .bind(&active)
        .fetch_one(&self.db)
        .await?;

        // Crates definitively lost: the part of each resolved conflict that
        // was settled by payment rather than physical return.
        let lost_to_date = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(quantity_lost - quantity_returned), 0)::BIGINT
            FROM conflicts
            WHERE status = $1
            "#,
        )
        .bind(ConflictStatus::Resolved.as_str())
        .fetch_one(&self.db)
        .await?;

        let account = StockAccount {
            stock_initial: account.stock_initial,
            stock_current: account.stock_current,
            last_alert_reference: account.last_alert_reference,
            alert_threshold_pct: account.alert_threshold_pct,
            initialized_at: account.initialized_at,
            initialized_by: account.initialized_by,
        };

        Ok(StockState {
            initialized: true,
            stock_current: account.stock_current,
            stock_in_transit: in_transit,
            stock_lost_to_date: lost_to_date,
            alert_active: account.alert_active(),
            last_alert_reference: account.last_alert_reference,
            alert_threshold_pct: account.alert_threshold_pct,
        })
    }
}
