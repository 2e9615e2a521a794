//! HTTP handlers for the movement ledger endpoints

use axum::{
    extract::{Query, State},
    Json,
};

use crate::error::AppResult;
use crate::models::{ReturnOutcome, StockAccount, StockMovement};
use crate::services::ledger::{
    AdjustStockInput, InitializeStockInput, LedgerService, MovementQuery, PurchaseInput,
    RegisterDepartureInput, RegisterReturnInput,
};
use crate::AppState;
use shared::PaginatedResponse;

/// Initialize the stock account
pub async fn initialize_stock(
    State(state): State<AppState>,
    Json(input): Json<InitializeStockInput>,
) -> AppResult<Json<StockAccount>> {
    let service = LedgerService::new(state.db, state.config.stock.alert_threshold_pct);
    let account = service.initialize(input).await?;
    Ok(Json(account))
}

/// Register a tour departure
pub async fn register_departure(
    State(state): State<AppState>,
    Json(input): Json<RegisterDepartureInput>,
) -> AppResult<Json<StockMovement>> {
    let service = LedgerService::new(state.db, state.config.stock.alert_threshold_pct);
    let movement = service.register_departure(input).await?;
    Ok(Json(movement))
}

/// Register a tour return; reports the surplus or loss to the caller
pub async fn register_return(
    State(state): State<AppState>,
    Json(input): Json<RegisterReturnInput>,
) -> AppResult<Json<ReturnOutcome>> {
    let service = LedgerService::new(state.db, state.config.stock.alert_threshold_pct);
    let outcome = service.register_return(input).await?;
    Ok(Json(outcome))
}

/// Apply a manual stock adjustment
pub async fn adjust_stock(
    State(state): State<AppState>,
    Json(input): Json<AdjustStockInput>,
) -> AppResult<Json<StockMovement>> {
    let service = LedgerService::new(state.db, state.config.stock.alert_threshold_pct);
    let movement = service.adjust(input).await?;
    Ok(Json(movement))
}

/// Register a crate purchase
pub async fn purchase_crates(
    State(state): State<AppState>,
    Json(input): Json<PurchaseInput>,
) -> AppResult<Json<StockAccount>> {
    let service = LedgerService::new(state.db, state.config.stock.alert_threshold_pct);
    let account = service.purchase(input).await?;
    Ok(Json(account))
}

/// Acknowledge the current drawdown and rebase the alert reference
pub async fn reset_alert_reference(
    State(state): State<AppState>,
) -> AppResult<Json<StockAccount>> {
    let service = LedgerService::new(state.db, state.config.stock.alert_threshold_pct);
    let account = service.reset_alert_reference().await?;
    Ok(Json(account))
}

/// Get the stock account
pub async fn get_stock_account(State(state): State<AppState>) -> AppResult<Json<StockAccount>> {
    let service = LedgerService::new(state.db, state.config.stock.alert_threshold_pct);
    let account = service.get_account().await?;
    Ok(Json(account))
}

/// List ledger movements
pub async fn list_movements(
    State(state): State<AppState>,
    Query(query): Query<MovementQuery>,
) -> AppResult<Json<PaginatedResponse<StockMovement>>> {
    let service = LedgerService::new(state.db, state.config.stock.alert_threshold_pct);
    let movements = service.list_movements(query).await?;
    Ok(Json(movements))
}
