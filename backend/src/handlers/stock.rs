//! HTTP handlers for the aggregated stock read path

use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::models::StockState;
use crate::services::stock::StockService;
use crate::AppState;

/// Get the aggregated stock snapshot
pub async fn get_stock_state(State(state): State<AppState>) -> AppResult<Json<StockState>> {
    let service = StockService::new(state.db);
    let stock_state = service.get_state().await?;
    Ok(Json(stock_state))
}
