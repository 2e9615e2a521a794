//! Error handling for the Crate Logistics Management platform
//!
//! Provides consistent error responses in English and French

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Ledger lifecycle errors
    #[error("Stock account not initialized")]
    NotInitialized,

    #[error("Stock account already initialized")]
    AlreadyInitialized,

    // Lookup errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    // Settlement errors
    #[error("Conflict is already in terminal state: {0}")]
    AlreadyResolved(String),

    #[error("Exceeds remaining balance: {message}")]
    ExceedsRemaining { message: String, message_fr: String },

    // Input errors
    #[error("Invalid quantity: {message}")]
    InvalidQuantity {
        field: String,
        message: String,
        message_fr: String,
    },

    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_fr: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_fr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::NotInitialized => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "STOCK_NOT_INITIALIZED".to_string(),
                    message_en: "The stock account has not been initialized yet".to_string(),
                    message_fr: "Le stock n'a pas encore été initialisé".to_string(),
                    field: None,
                },
            ),
            AppError::AlreadyInitialized => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "STOCK_ALREADY_INITIALIZED".to_string(),
                    message_en: "The stock account has already been initialized".to_string(),
                    message_fr: "Le stock a déjà été initialisé".to_string(),
                    field: None,
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message_en: format!("{} not found", resource),
                    message_fr: format!("{} introuvable", resource),
                    field: None,
                },
            ),
            AppError::AlreadyResolved(status) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "CONFLICT_ALREADY_SETTLED".to_string(),
                    message_en: format!("Conflict is already {} and cannot be modified", status),
                    message_fr: format!("Le litige est déjà {} et ne peut plus être modifié", status),
                    field: None,
                },
            ),
            AppError::ExceedsRemaining { message, message_fr } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "EXCEEDS_REMAINING".to_string(),
                    message_en: message.clone(),
                    message_fr: message_fr.clone(),
                    field: None,
                },
            ),
            AppError::InvalidQuantity {
                field,
                message,
                message_fr,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "INVALID_QUANTITY".to_string(),
                    message_en: message.clone(),
                    message_fr: message_fr.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::Validation {
                field,
                message,
                message_fr,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: message.clone(),
                    message_fr: message_fr.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "CONFIGURATION_ERROR".to_string(),
                    message_en: format!("Configuration error: {}", msg),
                    message_fr: format!("Erreur de configuration : {}", msg),
                    field: None,
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "DATABASE_ERROR".to_string(),
                    message_en: "A database error occurred".to_string(),
                    message_fr: "Une erreur de base de données est survenue".to_string(),
                    field: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_fr: "Erreur interne du serveur".to_string(),
                    field: None,
                },
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: "An internal server error occurred".to_string(),
                    message_fr: "Erreur interne du serveur".to_string(),
                    field: None,
                },
            ),
        };

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
