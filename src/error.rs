use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::db::StoreError;
use crate::stock::StockError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Stock(#[from] StockError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::Stock(err) => match err {
                StockError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                StockError::Conflict { .. } => (StatusCode::CONFLICT, "version_conflict"),
                StockError::InsufficientStock { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_stock")
                }
                StockError::Timeout(_) => (StatusCode::SERVICE_UNAVAILABLE, "store_timeout"),
                StockError::Store(store) => store_status(store),
            },
            Self::Store(store) => store_status(store),
        }
    }
}

fn store_status(err: &StoreError) -> (StatusCode, &'static str) {
    match err {
        StoreError::Duplicate(_) => (StatusCode::CONFLICT, "duplicate"),
        StoreError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable"),
        StoreError::Overflow(_) => (StatusCode::UNPROCESSABLE_ENTITY, "overflow"),
        StoreError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "Request failed");
            "internal error".to_string()
        } else {
            self.to_string()
        };

        (
            status,
            Json(json!({
                "error": code,
                "message": message,
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn stock_outcomes_map_to_distinct_statuses() {
        let id = Uuid::new_v4();
        assert_eq!(status_of(StockError::NotFound(id).into()), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(StockError::Conflict { id, expected: 1, current: 2 }.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(StockError::InsufficientStock { id, available: 1, delta: -2 }.into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(StockError::Timeout(Duration::from_millis(5)).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(StockError::Store(StoreError::Unavailable("down".into())).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn duplicate_is_a_conflict_but_not_a_version_conflict() {
        let err = AppError::Store(StoreError::Duplicate("sku".into()));
        assert_eq!(err.status_and_code(), (StatusCode::CONFLICT, "duplicate"));
    }

    #[test]
    fn database_errors_hide_details() {
        let err = AppError::Store(StoreError::Database(sqlx::Error::RowNotFound));
        assert_eq!(status_of(err), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
