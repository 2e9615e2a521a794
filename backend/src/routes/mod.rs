//! Route definitions for the Crate Logistics Management platform

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Movement ledger
        .nest("/ledger", ledger_routes())
        // Aggregated stock read path
        .nest("/stock", stock_routes())
        // Conflict settlement
        .nest("/conflicts", conflict_routes())
}

/// Movement ledger routes
fn ledger_routes() -> Router<AppState> {
    Router::new()
        .route("/initialize", post(handlers::initialize_stock))
        .route("/departures", post(handlers::register_departure))
        .route("/returns", post(handlers::register_return))
        .route("/adjustments", post(handlers::adjust_stock))
        .route("/purchases", post(handlers::purchase_crates))
        .route("/alert-reference/reset", post(handlers::reset_alert_reference))
        .route("/movements", get(handlers::list_movements))
        .route("/account", get(handlers::get_stock_account))
}

/// Aggregated stock routes
fn stock_routes() -> Router<AppState> {
    Router::new().route("/state", get(handlers::get_stock_state))
}

/// Conflict settlement routes
fn conflict_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_conflicts).post(handlers::open_conflict))
        .route("/:conflict_id", get(handlers::get_conflict))
        .route("/:conflict_id/state", get(handlers::get_settlement_state))
        .route("/:conflict_id/resolutions", get(handlers::list_resolutions))
        .route("/:conflict_id/returns", post(handlers::register_crate_return))
        .route("/:conflict_id/payments", post(handlers::register_payment))
        .route("/:conflict_id/cancel", post(handlers::cancel_conflict))
}
