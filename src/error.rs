//! Failure taxonomy for the whole service.
//!
//! Every variant carries a message in the storefront's language that can be
//! shown to the buyer as-is; only storage failures are replaced by a generic
//! message on the wire.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::transaction_aware::TransactionError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed or missing input (empty cart, incomplete address, missing
    /// payment proof, unknown status value).
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid credential.
    #[error("{0}")]
    Unauthorized(String),

    /// The principal may not perform this mutation.
    #[error("{0}")]
    Forbidden(String),

    /// Referenced order/product/item/user does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Illegal state transition (e.g. changing a terminal order).
    #[error("{0}")]
    Conflict(String),

    /// Requested quantity exceeds what is available, named per product so
    /// the buyer can adjust and resubmit.
    #[error("Stock insuficiente para \"{nombre}\". Disponible: {disponible}")]
    InsufficientStock { nombre: String, disponible: i32 },

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error("Error de base de datos: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::InsufficientStock { .. } => StatusCode::CONFLICT,
            AppError::Transaction(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "storage failure");
            "Error interno del servidor".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
