use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use sea_orm::DbErr;
use thiserror::Error;

use crate::models::ApiResponse;

pub type AppResult<T> = Result<T, AppError>;

/// Client-facing failure classes produced by the subscription service.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("subscription already exists")]
    AlreadyExists,

    #[error("subscription not found")]
    NotFound,

    #[error("0 subscriptions were found")]
    NoSubscriptionsFound,

    #[error("internal server error: {0}")]
    InternalError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),
}

/// Failures reported by a repository implementation.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("duplicate subscription")]
    Duplicate,

    #[error("subscription not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("{0}")]
    Other(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::AlreadyExists => "ALREADY_EXISTS",
            AppError::NotFound => "NOT_FOUND",
            AppError::NoSubscriptionsFound => "NO_SUBSCRIPTIONS_FOUND",
            AppError::InternalError(_) => "INTERNAL_ERROR",
            AppError::ConfigError(_) => "CONFIG_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::AlreadyExists => StatusCode::CONFLICT,
            AppError::NotFound | AppError::NoSubscriptionsFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::InvalidRequest(reason) => {
                log::warn!("Invalid request: {reason}");
                reason.clone()
            }
            AppError::AlreadyExists | AppError::NotFound | AppError::NoSubscriptionsFound => {
                self.to_string()
            }
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                "Database error".to_string()
            }
            _ => {
                log::error!("Internal error: {self}");
                "Internal server error".to_string()
            }
        };

        HttpResponse::build(self.status_code()).json(ApiResponse::error(self.code(), message))
    }
}
