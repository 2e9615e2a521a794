//! Movement ledger service
//!
//! Owns the singleton stock account and its append-only movement log. Every
//! mutating operation runs as one transaction that locks the account row with
//! `SELECT ... FOR UPDATE`, applies the balance change and appends the
//! movement record, so the balance and the audit trail can never diverge.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{MovementType, ReturnOutcome, StockAccount, StockMovement};
use shared::validation::{
    validate_non_negative_quantity, validate_note, validate_positive_quantity,
    validate_required_reason,
};
use shared::{DateRange, PaginatedResponse, Pagination, PaginationMeta};

/// Ledger service for the stock account and its movements
#[derive(Clone)]
pub struct LedgerService {
    db: PgPool,
    /// Alert threshold copied onto the account row at initialization
    alert_threshold_pct: i32,
}

/// Input for initializing the stock account
#[derive(Debug, Deserialize)]
pub struct InitializeStockInput {
    pub quantity: i64,
    pub actor_id: Uuid,
}

/// Input for registering a tour departure
#[derive(Debug, Deserialize)]
pub struct RegisterDepartureInput {
    pub tour_id: Uuid,
    pub quantity: i64,
    pub actor_id: Uuid,
}

/// Input for registering a tour return
#[derive(Debug, Deserialize)]
pub struct RegisterReturnInput {
    pub tour_id: Uuid,
    pub quantity_departed: i64,
    pub quantity_returned: i64,
    pub actor_id: Uuid,
}

/// Input for a manual stock adjustment
#[derive(Debug, Deserialize)]
pub struct AdjustStockInput {
    pub delta: i64,
    pub actor_id: Uuid,
    pub reason: String,
}

/// Input for registering a crate purchase
#[derive(Debug, Deserialize)]
pub struct PurchaseInput {
    pub quantity: i64,
    pub actor_id: Uuid,
    pub note: Option<String>,
    pub idempotency_key: Uuid,
}

/// Query parameters for the movement listing
#[derive(Debug, Default, Deserialize)]
pub struct MovementQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub start: Option<chrono::NaiveDate>,
    pub end: Option<chrono::NaiveDate>,
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

impl From<AccountRow> for StockAccount {
    fn from(row: AccountRow) -> Self {
        StockAccount {
            stock_initial: row.stock_initial,
            stock_current: row.stock_current,
            last_alert_reference: row.last_alert_reference,
            alert_threshold_pct: row.alert_threshold_pct,
            initialized_at: row.initialized_at,
            initialized_by: row.initialized_by,
        }
    }
}

/// Row for a movement record
#[derive(Debug, FromRow)]
struct MovementRow {
    id: i64,
    movement_type: String,
    quantity: i64,
    balance_after: i64,
    tour_id: Option<Uuid>,
    conflict_id: Option<Uuid>,
    actor_id: Option<Uuid>,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let movement_type = MovementType::parse(&row.movement_type).ok_or_else(|| {
            AppError::Internal(format!("unknown movement type: {}", row.movement_type))
        })?;
        Ok(StockMovement {
            id: row.id,
            movement_type,
            quantity: row.quantity,
            balance_after: row.balance_after,
            tour_id: row.tour_id,
            conflict_id: row.conflict_id,
            actor_id: row.actor_id,
            note: row.note,
            created_at: row.created_at,
        })
    }
}

/// Fields of a movement about to be appended
struct NewMovement<'a> {
    movement_type: MovementType,
    quantity: i64,
    balance_after: i64,
    tour_id: Option<Uuid>,
    conflict_id: Option<Uuid>,
    actor_id: Option<Uuid>,
    note: Option<&'a str>,
    idempotency_key: Option<Uuid>,
}

impl LedgerService {
    /// Create a new LedgerService instance
    pub fn new(db: PgPool, alert_threshold_pct: i32) -> Self {
        Self {
            db,
            alert_threshold_pct,
        }
    }

    /// Initialize the stock account. Fails if it already exists; the ledger
    /// has no silent re-initialization.
    pub async fn initialize(&self, input: InitializeStockInput) -> AppResult<StockAccount> {
        validate_positive_quantity(input.quantity).map_err(|_| AppError::InvalidQuantity {
            field: "quantity".to_string(),
            message: "Initial quantity must be positive".to_string(),
            message_fr: "La quantité initiale doit être positive".to_string(),
        })?;

        let mut tx = self.db.begin().await?;

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM stock_accounts WHERE id = 1)",
        )
        .fetch_one(&mut *tx)
        .await?;

        if exists {
            return Err(AppError::AlreadyInitialized);
        }

        let account = sqlx::query_as::<_, AccountRow>(
            r#"
            INSERT INTO stock_accounts
                (id, stock_initial, stock_current, last_alert_reference, alert_threshold_pct, initialized_by)
            VALUES (1, $1, $1, $1, $2, $3)
            RETURNING stock_initial, stock_current, last_alert_reference, alert_threshold_pct,
                      initialized_at, initialized_by
            "#,
        )
        .bind(input.quantity)
        .bind(self.alert_threshold_pct)
        .bind(input.actor_id)
        .fetch_one(&mut *tx)
        .await?;

        Self::insert_movement(
            &mut tx,
            NewMovement {
                movement_type: MovementType::Initialize,
                quantity: input.quantity,
                balance_after: input.quantity,
                tour_id: None,
                conflict_id: None,
                actor_id: Some(input.actor_id),
                note: None,
                idempotency_key: None,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(quantity = input.quantity, "stock account initialized");

        Ok(account.into())
    }

    /// Register a tour departure: crates leave the warehouse
    pub async fn register_departure(
        &self,
        input: RegisterDepartureInput,
    ) -> AppResult<StockMovement> {
        validate_positive_quantity(input.quantity).map_err(|_| AppError::InvalidQuantity {
            field: "quantity".to_string(),
            message: "Departure quantity must be positive".to_string(),
            message_fr: "La quantité au départ doit être positive".to_string(),
        })?;

        self.validate_tour_exists(input.tour_id).await?;

        let mut tx = self.db.begin().await?;

        let account = Self::lock_account(&mut tx).await?;
        let new_balance = account.stock_current - input.quantity;

        Self::update_balance(&mut tx, new_balance).await?;

        let movement = Self::insert_movement(
            &mut tx,
            NewMovement {
                movement_type: MovementType::Depart,
                quantity: -input.quantity,
                balance_after: new_balance,
                tour_id: Some(input.tour_id),
                conflict_id: None,
                actor_id: Some(input.actor_id),
                note: None,
                idempotency_key: None,
            },
        )
        .await?;

        tx.commit().await?;

        movement.try_into()
    }

    /// Register a tour return. Credits what physically came back; a shortfall
    /// is NOT deducted here, since the stock already left at departure time.
    /// The tour workflow decides whether to open a conflict for the loss.
    pub async fn register_return(&self, input: RegisterReturnInput) -> AppResult<ReturnOutcome> {
        for (field, value, label_fr) in [
            ("quantity_departed", input.quantity_departed, "au départ"),
            ("quantity_returned", input.quantity_returned, "au retour"),
        ] {
            validate_non_negative_quantity(value).map_err(|_| AppError::InvalidQuantity {
                field: field.to_string(),
                message: format!("{} cannot be negative", field),
                message_fr: format!("La quantité {} ne peut pas être négative", label_fr),
            })?;
        }

        self.validate_tour_exists(input.tour_id).await?;

        let outcome = ReturnOutcome::from_counts(input.quantity_departed, input.quantity_returned);

        let mut tx = self.db.begin().await?;

        let account = Self::lock_account(&mut tx).await?;

        if outcome.surplus > 0 {
            // More came back than departed: credit the departed count as a
            // regular return, then the overage as a separate surplus record.
            let after_return = account.stock_current + input.quantity_departed;
            Self::insert_movement(
                &mut tx,
                NewMovement {
                    movement_type: MovementType::Return,
                    quantity: input.quantity_departed,
                    balance_after: after_return,
                    tour_id: Some(input.tour_id),
                    conflict_id: None,
                    actor_id: Some(input.actor_id),
                    note: None,
                    idempotency_key: None,
                },
            )
            .await?;

            let after_surplus = after_return + outcome.surplus;
            Self::insert_movement(
                &mut tx,
                NewMovement {
                    movement_type: MovementType::Surplus,
                    quantity: outcome.surplus,
                    balance_after: after_surplus,
                    tour_id: Some(input.tour_id),
                    conflict_id: None,
                    actor_id: Some(input.actor_id),
                    note: None,
                    idempotency_key: None,
                },
            )
            .await?;

            Self::update_balance(&mut tx, after_surplus).await?;
        } else {
            let new_balance = account.stock_current + input.quantity_returned;
            Self::insert_movement(
                &mut tx,
                NewMovement {
                    movement_type: MovementType::Return,
                    quantity: input.quantity_returned,
                    balance_after: new_balance,
                    tour_id: Some(input.tour_id),
                    conflict_id: None,
                    actor_id: Some(input.actor_id),
                    note: None,
                    idempotency_key: None,
                },
            )
            .await?;

            Self::update_balance(&mut tx, new_balance).await?;
        }

        tx.commit().await?;

        if outcome.loss > 0 {
            tracing::info!(
                tour_id = %input.tour_id,
                loss = outcome.loss,
                "tour returned with a crate shortfall"
            );
        }

        Ok(outcome)
    }

    /// Credit crates recovered through conflict settlement. Runs inside the
    /// settlement transaction; the settlement engine is the single source of
    /// truth for validating the quantity against the conflict.
    pub async fn record_conflict_return(
        tx: &mut Transaction<'_, Postgres>,
        conflict_id: Uuid,
        quantity: i64,
        actor_id: Uuid,
        note: Option<&str>,
    ) -> AppResult<()> {
        let account = Self::lock_account(tx).await?;
        let new_balance = account.stock_current + quantity;

        Self::update_balance(tx, new_balance).await?;

        Self::insert_movement(
            tx,
            NewMovement {
                movement_type: MovementType::ConflictReturn,
                quantity,
                balance_after: new_balance,
                tour_id: None,
                conflict_id: Some(conflict_id),
                actor_id: Some(actor_id),
                note,
                idempotency_key: None,
            },
        )
        .await?;

        Ok(())
    }

    /// Record a loss confirmed by payment. Audit-only: the quantity is zero
    /// and the balance is untouched, because the stock was already short from
    /// the moment the tour came back incomplete.
    pub async fn record_confirmed_loss(
        tx: &mut Transaction<'_, Postgres>,
        conflict_id: Uuid,
        crates_covered: i64,
        amount: rust_decimal::Decimal,
        actor_id: Uuid,
        note: Option<&str>,
    ) -> AppResult<()> {
        let account = Self::lock_account(tx).await?;

        let default_note = format!(
            "{} crate(s) confirmed lost, covered by payment of {}",
            crates_covered, amount
        );

        Self::insert_movement(
            tx,
            NewMovement {
                movement_type: MovementType::ConflictLossConfirmed,
                quantity: 0,
                balance_after: account.stock_current,
                tour_id: None,
                conflict_id: Some(conflict_id),
                actor_id: Some(actor_id),
                note: Some(note.unwrap_or(&default_note)),
                idempotency_key: None,
            },
        )
        .await?;

        Ok(())
    }

    /// Manual stock correction. The only operation allowed to move the
    /// balance without a matching physical event, which is why the reason is
    /// mandatory.
    pub async fn adjust(&self, input: AdjustStockInput) -> AppResult<StockMovement> {
        validate_required_reason(&input.reason).map_err(|_| AppError::Validation {
            field: "reason".to_string(),
            message: "A reason is required for manual adjustments".to_string(),
            message_fr: "Un motif est obligatoire pour les ajustements manuels".to_string(),
        })?;

        let mut tx = self.db.begin().await?;

        let account = Self::lock_account(&mut tx).await?;
        let new_balance = account.stock_current + input.delta;

        Self::update_balance(&mut tx, new_balance).await?;

        let movement = Self::insert_movement(
            &mut tx,
            NewMovement {
                movement_type: MovementType::Adjustment,
                quantity: input.delta,
                balance_after: new_balance,
                tour_id: None,
                conflict_id: None,
                actor_id: Some(input.actor_id),
                note: Some(&input.reason),
                idempotency_key: None,
            },
        )
        .await?;

        tx.commit().await?;

        movement.try_into()
    }

    /// Register a crate purchase: grows both the current balance and the
    /// reference quantity, and rebases the alert reference so drawdown is
    /// measured from the new baseline.
    pub async fn purchase(&self, input: PurchaseInput) -> AppResult<StockAccount> {
        validate_positive_quantity(input.quantity).map_err(|_| AppError::InvalidQuantity {
            field: "quantity".to_string(),
            message: "Purchase quantity must be positive".to_string(),
            message_fr: "La quantité achetée doit être positive".to_string(),
        })?;
        validate_note(input.note.as_deref()).map_err(|_| AppError::Validation {
            field: "note".to_string(),
            message: "Note is too long".to_string(),
            message_fr: "La note est trop longue".to_string(),
        })?;

        let mut tx = self.db.begin().await?;

        // Idempotent replay: a retried purchase returns the current account
        // state without applying anything.
        let seen = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM stock_movements WHERE idempotency_key = $1",
        )
        .bind(input.idempotency_key)
        .fetch_optional(&mut *tx)
        .await?;

        if seen.is_some() {
            let account = Self::lock_account(&mut tx).await?;
            tx.commit().await?;
            return Ok(account.into());
        }

        let account = Self::lock_account(&mut tx).await?;
        let new_balance = account.stock_current + input.quantity;

        let updated = sqlx::query_as::<_, AccountRow>(
            r#"
            UPDATE stock_accounts
            SET stock_current = $1,
                stock_initial = stock_initial + $2,
                last_alert_reference = $1
            WHERE id = 1
            RETURNING stock_initial, stock_current, last_alert_reference, alert_threshold_pct,
                      initialized_at, initialized_by
            "#,
        )
        .bind(new_balance)
        .bind(input.quantity)
        .fetch_one(&mut *tx)
        .await?;

        Self::insert_movement(
            &mut tx,
            NewMovement {
                movement_type: MovementType::Purchase,
                quantity: input.quantity,
                balance_after: new_balance,
                tour_id: None,
                conflict_id: None,
                actor_id: Some(input.actor_id),
                note: input.note.as_deref(),
                idempotency_key: Some(input.idempotency_key),
            },
        )
        .await?;

        tx.commit().await?;

        Ok(updated.into())
    }

    /// Acknowledge the current drawdown: rebases the alert reference on the
    /// current balance. Pure acknowledgement, no movement is written.
    pub async fn reset_alert_reference(&self) -> AppResult<StockAccount> {
        let account = sqlx::query_as::<_, AccountRow>(
            r#"
            UPDATE stock_accounts
            SET last_alert_reference = stock_current
            WHERE id = 1
            RETURNING stock_initial, stock_current, last_alert_reference, alert_threshold_pct,
                      initialized_at, initialized_by
            "#,
        )
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotInitialized)?;

        Ok(account.into())
    }

    /// Get the current stock account
    pub async fn get_account(&self) -> AppResult<StockAccount> {
        let account = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT stock_initial, stock_current, last_alert_reference, alert_threshold_pct,
                   initialized_at, initialized_by
            FROM stock_accounts
            WHERE id = 1
            "#,
        )
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotInitialized)?;

        Ok(account.into())
    }

    /// List movements, newest first, optionally restricted to a date range
    pub async fn list_movements(
        &self,
        query: MovementQuery,
    ) -> AppResult<PaginatedResponse<StockMovement>> {
        let pagination = Pagination {
            page: query.page.unwrap_or(1),
            per_page: query.per_page.unwrap_or(Pagination::default().per_page),
        };
        let range = match (query.start, query.end) {
            (Some(start), Some(end)) => Some(DateRange { start, end }),
            _ => None,
        };

        let (total, rows) = if let Some(range) = &range {
            let total = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM stock_movements WHERE created_at::date BETWEEN $1 AND $2",
            )
            .bind(range.start)
            .bind(range.end)
            .fetch_one(&self.db)
            .await?;

            let rows = sqlx::query_as::<_, MovementRow>(
                r#"
                SELECT id, movement_type, quantity, balance_after, tour_id, conflict_id,
                       actor_id, note, created_at
                FROM stock_movements
                WHERE created_at::date BETWEEN $1 AND $2
                ORDER BY id DESC
                LIMIT $3 OFFSET $4
                "#,
            )
            .bind(range.start)
            .bind(range.end)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.db)
            .await?;

            (total, rows)
        } else {
            let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM stock_movements")
                .fetch_one(&self.db)
                .await?;

            let rows = sqlx::query_as::<_, MovementRow>(
                r#"
                SELECT id, movement_type, quantity, balance_after, tour_id, conflict_id,
                       actor_id, note, created_at
                FROM stock_movements
                ORDER BY id DESC
                LIMIT $1 OFFSET $2
                "#,
            )
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.db)
            .await?;

            (total, rows)
        };

        let data = rows
            .into_iter()
            .map(StockMovement::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta {
                page: pagination.page,
                per_page: pagination.per_page,
                total_items: total.max(0) as u64,
            },
        })
    }

    /// Lock the singleton account row for the duration of the transaction
    async fn lock_account(tx: &mut Transaction<'_, Postgres>) -> AppResult<AccountRow> {
        sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT stock_initial, stock_current, last_alert_reference, alert_threshold_pct,
                   initialized_at, initialized_by
            FROM stock_accounts
            WHERE id = 1
            FOR UPDATE
            "#,
        )
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppError::NotInitialized)
    }

    async fn update_balance(tx: &mut Transaction<'_, Postgres>, new_balance: i64) -> AppResult<()> {
        sqlx::query("UPDATE stock_accounts SET stock_current = $1 WHERE id = 1")
            .bind(new_balance)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn insert_movement(
        tx: &mut Transaction<'_, Postgres>,
        movement: NewMovement<'_>,
    ) -> AppResult<MovementRow> {
        let row = sqlx::query_as::<_, MovementRow>(
            r#"
            INSERT INTO stock_movements
                (movement_type, quantity, balance_after, tour_id, conflict_id, actor_id, note, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, movement_type, quantity, balance_after, tour_id, conflict_id,
                      actor_id, note, created_at
            "#,
        )
        .bind(movement.movement_type.as_str())
        .bind(movement.quantity)
        .bind(movement.balance_after)
        .bind(movement.tour_id)
        .bind(movement.conflict_id)
        .bind(movement.actor_id)
        .bind(movement.note)
        .bind(movement.idempotency_key)
        .fetch_one(&mut **tx)
        .await?;

        Ok(row)
    }

    async fn validate_tour_exists(&self, tour_id: Uuid) -> AppResult<()> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM tours WHERE id = $1)")
                .bind(tour_id)
                .fetch_one(&self.db)
                .await?;

        if !exists {
            return Err(AppError::NotFound("Tour".to_string()));
        }

        Ok(())
    }
}
