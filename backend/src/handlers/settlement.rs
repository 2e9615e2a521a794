//! HTTP handlers for conflict settlement endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Conflict, ConflictStatus, ResolutionRecord};
use crate::services::settlement::{
    CancelConflictInput, OpenConflictInput, RegisterCrateReturnInput, RegisterPaymentInput,
    SettlementOutcome, SettlementService,
};
use crate::AppState;
use shared::settlement::SettlementState;

/// Query parameters for the conflict listing
#[derive(Debug, Default, Deserialize)]
pub struct ConflictQuery {
    pub status: Option<ConflictStatus>,
}

fn settlement_service(state: AppState) -> AppResult<SettlementService> {
    SettlementService::new(state.db, state.config.stock.unit_value())
}

/// Open a conflict for a tour's crate shortfall
pub async fn open_conflict(
    State(state): State<AppState>,
    Json(input): Json<OpenConflictInput>,
) -> AppResult<Json<Conflict>> {
    let service = settlement_service(state)?;
    let conflict = service.open_conflict(input).await?;
    Ok(Json(conflict))
}

/// Register crates physically recovered against a conflict
pub async fn register_crate_return(
    State(state): State<AppState>,
    Path(conflict_id): Path<Uuid>,
    Json(input): Json<RegisterCrateReturnInput>,
) -> AppResult<Json<SettlementOutcome>> {
    let service = settlement_service(state)?;
    let outcome = service.register_crate_return(conflict_id, input).await?;
    Ok(Json(outcome))
}

/// Register a payment against a conflict
pub async fn register_payment(
    State(state): State<AppState>,
    Path(conflict_id): Path<Uuid>,
    Json(input): Json<RegisterPaymentInput>,
) -> AppResult<Json<SettlementOutcome>> {
    let service = settlement_service(state)?;
    let outcome = service.register_payment(conflict_id, input).await?;
    Ok(Json(outcome))
}

/// Cancel a pending conflict
pub async fn cancel_conflict(
    State(state): State<AppState>,
    Path(conflict_id): Path<Uuid>,
    Json(input): Json<CancelConflictInput>,
) -> AppResult<Json<Conflict>> {
    let service = settlement_service(state)?;
    let conflict = service.cancel_conflict(conflict_id, input).await?;
    Ok(Json(conflict))
}

/// Get a conflict's settlement position
pub async fn get_settlement_state(
    State(state): State<AppState>,
    Path(conflict_id): Path<Uuid>,
) -> AppResult<Json<SettlementState>> {
    let service = settlement_service(state)?;
    let settlement = service.get_state(conflict_id).await?;
    Ok(Json(settlement))
}

/// Get a conflict by ID
pub async fn get_conflict(
    State(state): State<AppState>,
    Path(conflict_id): Path<Uuid>,
) -> AppResult<Json<Conflict>> {
    let service = settlement_service(state)?;
    let conflict = service.get_conflict(conflict_id).await?;
    Ok(Json(conflict))
}

/// List conflicts
pub async fn list_conflicts(
    State(state): State<AppState>,
    Query(query): Query<ConflictQuery>,
) -> AppResult<Json<Vec<Conflict>>> {
    let service = settlement_service(state)?;
    let conflicts = service.list_conflicts(query.status).await?;
    Ok(Json(conflicts))
}

/// List the resolution records of a conflict
pub async fn list_resolutions(
    State(state): State<AppState>,
    Path(conflict_id): Path<Uuid>,
) -> AppResult<Json<Vec<ResolutionRecord>>> {
    let service = settlement_service(state)?;
    let resolutions = service.list_resolutions(conflict_id).await?;
    Ok(Json(resolutions))
}
