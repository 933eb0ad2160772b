use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bigdecimal::BigDecimal;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failure taxonomy for the marketplace. Every variant maps to one HTTP
/// status; the response body is always `{"message": <string>}`.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Only {available} kg available!")]
    InsufficientStock { available: BigDecimal },

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl MarketError {
    pub fn status(&self) -> StatusCode {
        match self {
            MarketError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            MarketError::Conflict(_) => StatusCode::BAD_REQUEST,
            MarketError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            MarketError::Forbidden(_) => StatusCode::FORBIDDEN,
            MarketError::NotFound(_) => StatusCode::NOT_FOUND,
            MarketError::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
            MarketError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn internal<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        MarketError::Internal(anyhow::Error::new(err))
    }
}

impl From<diesel::result::Error> for MarketError {
    fn from(err: diesel::result::Error) -> Self {
        MarketError::Internal(err.into())
    }
}

impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        if let MarketError::Internal(err) = &self {
            // Details stay on the server side; the client gets a generic body.
            error!("internal error: {err:#}");
        }
        (self.status(), Json(json!({ "message": self.to_string() }))).into_response()
    }
}
