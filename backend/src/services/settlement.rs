//! Conflict settlement service
//!
//! Drives a shortage from detection to resolution through partial crate
//! returns and partial payments. Every mutation runs in one transaction that
//! locks the conflict row, appends the resolution record and records the
//! matching ledger movement, so a settlement can never be written without its
//! stock counterpart.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Conflict, ConflictStatus, PaymentMode, ResolutionRecord, ResolutionType};
use crate::services::ledger::LedgerService;
use shared::settlement::{
    crates_covered_by_payment, payment_exceeds_remaining, settlement_state, SettlementState,
};
use shared::validation::{validate_note, validate_positive_amount, validate_positive_quantity};

/// Settlement service for crate shortage conflicts
#[derive(Clone)]
pub struct SettlementService {
    db: PgPool,
    /// Value of one crate, injected at construction. Settlement never reads
    /// mutable configuration mid-transaction.
    unit_value: Decimal,
}

/// Input for opening a conflict after a tour reported a loss
#[derive(Debug, Deserialize)]
pub struct OpenConflictInput {
    pub tour_id: Uuid,
    pub quantity_lost: i64,
    pub actor_id: Uuid,
    pub note: Option<String>,
}

/// Input for a physical crate return against a conflict
#[derive(Debug, Deserialize)]
pub struct RegisterCrateReturnInput {
    pub quantity: i64,
    pub actor_id: Uuid,
    pub note: Option<String>,
    pub idempotency_key: Uuid,
}

/// Input for a payment against a conflict
#[derive(Debug, Deserialize)]
pub struct RegisterPaymentInput {
    pub amount: Decimal,
    pub payment_mode: PaymentMode,
    pub actor_id: Uuid,
    pub note: Option<String>,
    pub idempotency_key: Uuid,
}

/// Input for cancelling a pending conflict
#[derive(Debug, Deserialize)]
pub struct CancelConflictInput {
    pub note: Option<String>,
}

/// Result of a settlement action
#[derive(Debug, Serialize)]
pub struct SettlementOutcome {
    pub conflict: Conflict,
    pub state: SettlementState,
}

/// Row for a conflict
#[derive(Debug, FromRow)]
struct ConflictRow {
    id: Uuid,
    tour_id: Uuid,
    quantity_lost: i64,
    quantity_returned: i64,
    amount_paid: Decimal,
    status: String,
    opened_by: Option<Uuid>,
    note: Option<String>,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl TryFrom<ConflictRow> for Conflict {
    type Error = AppError;

    fn try_from(row: ConflictRow) -> Result<Self, Self::Error> {
        let status = ConflictStatus::parse(&row.status)
            .ok_or_else(|| AppError::Internal(format!("unknown conflict status: {}", row.status)))?;
        Ok(Conflict {
            id: row.id,
            tour_id: row.tour_id,
            quantity_lost: row.quantity_lost,
            quantity_returned: row.quantity_returned,
            amount_paid: row.amount_paid,
            status,
            opened_by: row.opened_by,
            note: row.note,
            created_at: row.created_at,
            resolved_at: row.resolved_at,
        })
    }
}

/// Row for a resolution record
#[derive(Debug, FromRow)]
struct ResolutionRow {
    id: Uuid,
    conflict_id: Uuid,
    resolution_type: String,
    quantity: Option<i64>,
    amount: Option<Decimal>,
    payment_mode: Option<String>,
    actor_id: Option<Uuid>,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ResolutionRow> for ResolutionRecord {
    type Error = AppError;

    fn try_from(row: ResolutionRow) -> Result<Self, Self::Error> {
        let resolution_type = ResolutionType::parse(&row.resolution_type).ok_or_else(|| {
            AppError::Internal(format!("unknown resolution type: {}", row.resolution_type))
        })?;
        let payment_mode = match row.payment_mode.as_deref() {
            Some(s) => Some(
                PaymentMode::parse(s)
                    .ok_or_else(|| AppError::Internal(format!("unknown payment mode: {}", s)))?,
            ),
            None => None,
        };
        Ok(ResolutionRecord {
            id: row.id,
            conflict_id: row.conflict_id,
            resolution_type,
            quantity: row.quantity,
            amount: row.amount,
            payment_mode,
            actor_id: row.actor_id,
            note: row.note,
            created_at: row.created_at,
        })
    }
}

impl SettlementService {
    /// Create a new SettlementService instance
    pub fn new(db: PgPool, unit_value: Decimal) -> AppResult<Self> {
        if unit_value <= Decimal::ZERO {
            return Err(AppError::Configuration(
                "crate unit value must be positive".to_string(),
            ));
        }
        Ok(Self { db, unit_value })
    }

    /// Open a conflict for a tour's crate shortfall. Called by the tour
    /// workflow after `register_return` reported a loss; the stock already
    /// reflects the missing crates, so opening a conflict writes no movement.
    pub async fn open_conflict(&self, input: OpenConflictInput) -> AppResult<Conflict> {
        validate_positive_quantity(input.quantity_lost).map_err(|_| AppError::InvalidQuantity {
            field: "quantity_lost".to_string(),
            message: "Lost quantity must be positive".to_string(),
            message_fr: "La quantité perdue doit être positive".to_string(),
        })?;
        self.validate_note_input(input.note.as_deref())?;

        let tour_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM tours WHERE id = $1)")
                .bind(input.tour_id)
                .fetch_one(&self.db)
                .await?;

        if !tour_exists {
            return Err(AppError::NotFound("Tour".to_string()));
        }

        let row = sqlx::query_as::<_, ConflictRow>(
            r#"
            INSERT INTO conflicts (tour_id, quantity_lost, opened_by, note)
            VALUES ($1, $2, $3, $4)
            RETURNING id, tour_id, quantity_lost, quantity_returned, amount_paid, status,
                      opened_by, note, created_at, resolved_at
            "#,
        )
        .bind(input.tour_id)
        .bind(input.quantity_lost)
        .bind(input.actor_id)
        .bind(&input.note)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            conflict_id = %row.id,
            tour_id = %input.tour_id,
            quantity_lost = input.quantity_lost,
            "conflict opened"
        );

        row.try_into()
    }

    /// Register crates physically recovered against a conflict
    pub async fn register_crate_return(
        &self,
        conflict_id: Uuid,
        input: RegisterCrateReturnInput,
    ) -> AppResult<SettlementOutcome> {
        validate_positive_quantity(input.quantity).map_err(|_| AppError::InvalidQuantity {
            field: "quantity".to_string(),
            message: "Returned quantity must be positive".to_string(),
            message_fr: "La quantité restituée doit être positive".to_string(),
        })?;
        self.validate_note_input(input.note.as_deref())?;

        let mut tx = self.db.begin().await?;

        if let Some(outcome) = self.replay(&mut tx, input.idempotency_key).await? {
            tx.commit().await?;
            return Ok(outcome);
        }

        let row = Self::lock_conflict(&mut tx, conflict_id).await?;
        let status = Self::parse_status(&row)?;
        if status.is_terminal() {
            return Err(AppError::AlreadyResolved(row.status));
        }

        let remaining = row.quantity_lost - row.quantity_returned;
        if input.quantity > remaining {
            return Err(AppError::ExceedsRemaining {
                message: format!(
                    "Return of {} exceeds the {} crate(s) still outstanding",
                    input.quantity, remaining
                ),
                message_fr: format!(
                    "Le retour de {} dépasse les {} caisse(s) restant à restituer",
                    input.quantity, remaining
                ),
            });
        }

        let updated = sqlx::query_as::<_, ConflictRow>(
            r#"
            UPDATE conflicts
            SET quantity_returned = quantity_returned + $1
            WHERE id = $2
            RETURNING id, tour_id, quantity_lost, quantity_returned, amount_paid, status,
                      opened_by, note, created_at, resolved_at
            "#,
        )
        .bind(input.quantity)
        .bind(conflict_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO resolution_records
                (conflict_id, resolution_type, quantity, actor_id, note, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(conflict_id)
        .bind(ResolutionType::CrateReturn.as_str())
        .bind(input.quantity)
        .bind(input.actor_id)
        .bind(&input.note)
        .bind(input.idempotency_key)
        .execute(&mut *tx)
        .await?;

        // Credit the recovered crates back into physical stock, in the same
        // transaction as the settlement bookkeeping.
        LedgerService::record_conflict_return(
            &mut tx,
            conflict_id,
            input.quantity,
            input.actor_id,
            input.note.as_deref(),
        )
        .await?;

        let state = settlement_state(
            updated.quantity_lost,
            updated.quantity_returned,
            updated.amount_paid,
            self.unit_value,
        );

        let final_row = if state.is_resolved {
            Self::mark_resolved(&mut tx, conflict_id).await?
        } else {
            updated
        };

        tx.commit().await?;

        Ok(SettlementOutcome {
            conflict: final_row.try_into()?,
            state,
        })
    }

    /// Register a payment against a conflict. Payments confirm the loss:
    /// stock is untouched, only an audit movement is written.
    pub async fn register_payment(
        &self,
        conflict_id: Uuid,
        input: RegisterPaymentInput,
    ) -> AppResult<SettlementOutcome> {
        validate_positive_amount(input.amount).map_err(|_| AppError::InvalidQuantity {
            field: "amount".to_string(),
            message: "Payment amount must be positive".to_string(),
            message_fr: "Le montant du paiement doit être positif".to_string(),
        })?;
        self.validate_note_input(input.note.as_deref())?;

        let mut tx = self.db.begin().await?;

        if let Some(outcome) = self.replay(&mut tx, input.idempotency_key).await? {
            tx.commit().await?;
            return Ok(outcome);
        }

        let row = Self::lock_conflict(&mut tx, conflict_id).await?;
        let status = Self::parse_status(&row)?;
        if status.is_terminal() {
            return Err(AppError::AlreadyResolved(row.status));
        }

        let before = settlement_state(
            row.quantity_lost,
            row.quantity_returned,
            row.amount_paid,
            self.unit_value,
        );
        if payment_exceeds_remaining(input.amount, before.remaining_amount) {
            return Err(AppError::ExceedsRemaining {
                message: format!(
                    "Payment of {} exceeds the outstanding value of {}",
                    input.amount, before.remaining_amount
                ),
                message_fr: format!(
                    "Le paiement de {} dépasse la valeur restant due de {}",
                    input.amount, before.remaining_amount
                ),
            });
        }

        let updated = sqlx::query_as::<_, ConflictRow>(
            r#"
            UPDATE conflicts
            SET amount_paid = amount_paid + $1
            WHERE id = $2
            RETURNING id, tour_id, quantity_lost, quantity_returned, amount_paid, status,
                      opened_by, note, created_at, resolved_at
            "#,
        )
        .bind(input.amount)
        .bind(conflict_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO resolution_records
                (conflict_id, resolution_type, amount, payment_mode, actor_id, note, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(conflict_id)
        .bind(ResolutionType::Payment.as_str())
        .bind(input.amount)
        .bind(input.payment_mode.as_str())
        .bind(input.actor_id)
        .bind(&input.note)
        .bind(input.idempotency_key)
        .execute(&mut *tx)
        .await?;

        let crates_covered = crates_covered_by_payment(input.amount, self.unit_value);
        LedgerService::record_confirmed_loss(
            &mut tx,
            conflict_id,
            crates_covered,
            input.amount,
            input.actor_id,
            input.note.as_deref(),
        )
        .await?;

        let state = settlement_state(
            updated.quantity_lost,
            updated.quantity_returned,
            updated.amount_paid,
            self.unit_value,
        );

        let final_row = if state.is_resolved {
            Self::mark_resolved(&mut tx, conflict_id).await?
        } else {
            updated
        };

        tx.commit().await?;

        Ok(SettlementOutcome {
            conflict: final_row.try_into()?,
            state,
        })
    }

    /// Cancel a pending conflict. Terminal conflicts refuse, like every other
    /// settlement mutation.
    pub async fn cancel_conflict(
        &self,
        conflict_id: Uuid,
        input: CancelConflictInput,
    ) -> AppResult<Conflict> {
        self.validate_note_input(input.note.as_deref())?;

        let mut tx = self.db.begin().await?;

        let row = Self::lock_conflict(&mut tx, conflict_id).await?;
        let status = Self::parse_status(&row)?;
        if status.is_terminal() {
            return Err(AppError::AlreadyResolved(row.status));
        }

        let updated = sqlx::query_as::<_, ConflictRow>(
            r#"
            UPDATE conflicts
            SET status = $1, note = COALESCE($2, note)
            WHERE id = $3
            RETURNING id, tour_id, quantity_lost, quantity_returned, amount_paid, status,
                      opened_by, note, created_at, resolved_at
            "#,
        )
        .bind(ConflictStatus::Cancelled.as_str())
        .bind(&input.note)
        .bind(conflict_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        updated.try_into()
    }

    /// Get a conflict's current settlement position without side effects
    pub async fn get_state(&self, conflict_id: Uuid) -> AppResult<SettlementState> {
        let row = self.fetch_conflict(conflict_id).await?;
        Ok(settlement_state(
            row.quantity_lost,
            row.quantity_returned,
            row.amount_paid,
            self.unit_value,
        ))
    }

    /// Get a conflict by ID
    pub async fn get_conflict(&self, conflict_id: Uuid) -> AppResult<Conflict> {
        self.fetch_conflict(conflict_id).await?.try_into()
    }

    /// List conflicts, newest first, optionally filtered by status
    pub async fn list_conflicts(&self, status: Option<ConflictStatus>) -> AppResult<Vec<Conflict>> {
        let rows = if let Some(status) = status {
            sqlx::query_as::<_, ConflictRow>(
                r#"
                SELECT id, tour_id, quantity_lost, quantity_returned, amount_paid, status,
                       opened_by, note, created_at, resolved_at
                FROM conflicts
                WHERE status = $1
                ORDER BY created_at DESC
                "#,
            )
            .bind(status.as_str())
            .fetch_all(&self.db)
            .await?
        } else {
            sqlx::query_as::<_, ConflictRow>(
                r#"
                SELECT id, tour_id, quantity_lost, quantity_returned, amount_paid, status,
                       opened_by, note, created_at, resolved_at
                FROM conflicts
                ORDER BY created_at DESC
                "#,
            )
            .fetch_all(&self.db)
            .await?
        };

        rows.into_iter().map(Conflict::try_from).collect()
    }

    /// List the resolution records behind a conflict's aggregates
    pub async fn list_resolutions(&self, conflict_id: Uuid) -> AppResult<Vec<ResolutionRecord>> {
        // Validate the conflict exists so an unknown id is a 404, not an
        // empty list
        self.fetch_conflict(conflict_id).await?;

        let rows = sqlx::query_as::<_, ResolutionRow>(
            r#"
            SELECT id, conflict_id, resolution_type, quantity, amount, payment_mode,
                   actor_id, note, created_at
            FROM resolution_records
            WHERE conflict_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(conflict_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(ResolutionRecord::try_from).collect()
    }

    /// Idempotent replay: if the key was already consumed, return the current
    /// position of the conflict it belongs to without applying anything.
    async fn replay(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        idempotency_key: Uuid,
    ) -> AppResult<Option<SettlementOutcome>> {
        let seen = sqlx::query_scalar::<_, Uuid>(
            "SELECT conflict_id FROM resolution_records WHERE idempotency_key = $1",
        )
        .bind(idempotency_key)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(conflict_id) = seen else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, ConflictRow>(
            r#"
            SELECT id, tour_id, quantity_lost, quantity_returned, amount_paid, status,
                   opened_by, note, created_at, resolved_at
            FROM conflicts
            WHERE id = $1
            "#,
        )
        .bind(conflict_id)
        .fetch_one(&mut **tx)
        .await?;

        let state = settlement_state(
            row.quantity_lost,
            row.quantity_returned,
            row.amount_paid,
            self.unit_value,
        );

        Ok(Some(SettlementOutcome {
            conflict: row.try_into()?,
            state,
        }))
    }

    async fn lock_conflict(
        tx: &mut Transaction<'_, Postgres>,
        conflict_id: Uuid,
    ) -> AppResult<ConflictRow> {
        sqlx::query_as::<_, ConflictRow>(
            r#"
            SELECT id, tour_id, quantity_lost, quantity_returned, amount_paid, status,
                   opened_by, note, created_at, resolved_at
            FROM conflicts
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(conflict_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Conflict".to_string()))
    }

    async fn mark_resolved(
        tx: &mut Transaction<'_, Postgres>,
        conflict_id: Uuid,
    ) -> AppResult<ConflictRow> {
        let row = sqlx::query_as::<_, ConflictRow>(
            r#"
            UPDATE conflicts
            SET status = $1, resolved_at = now()
            WHERE id = $2
            RETURNING id, tour_id, quantity_lost, quantity_returned, amount_paid, status,
                      opened_by, note, created_at, resolved_at
            "#,
        )
        .bind(ConflictStatus::Resolved.as_str())
        .bind(conflict_id)
        .fetch_one(&mut **tx)
        .await?;

        tracing::info!(conflict_id = %conflict_id, "conflict fully settled");

        Ok(row)
    }

    async fn fetch_conflict(&self, conflict_id: Uuid) -> AppResult<ConflictRow> {
        sqlx::query_as::<_, ConflictRow>(
            r#"
            SELECT id, tour_id, quantity_lost, quantity_returned, amount_paid, status,
                   opened_by, note, created_at, resolved_at
            FROM conflicts
            WHERE id = $1
            "#,
        )
        .bind(conflict_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Conflict".to_string()))
    }

    fn parse_status(row: &ConflictRow) -> AppResult<ConflictStatus> {
        ConflictStatus::parse(&row.status)
            .ok_or_else(|| AppError::Internal(format!("unknown conflict status: {}", row.status)))
    }

    fn validate_note_input(&self, note: Option<&str>) -> AppResult<()> {
        validate_note(note).map_err(|_| AppError::Validation {
            field: "note".to_string(),
            message: "Note is too long".to_string(),
            message_fr: "La note est trop longue".to_string(),
        })
    }
}
