//! Typed error type for the db crate.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlx error: {0}")]
    Sqlx(sqlx::Error),

    #[error("row not found")]
    NotFound,

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Input rejected before it reached the database.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The unique `(form_id, version, tenant)` constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::Conflict(db_err.message().to_string())
            }
            _ => Self::Sqlx(err),
        }
    }
}

/// Payload returned by `create_from_dict` for every failure, whatever the cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{error_type}: {message}")]
pub struct BadRequest {
    #[serde(rename = "type")]
    pub error_type: &'static str,
    pub message: &'static str,
    #[serde(skip)]
    pub status: u16,
}

impl BadRequest {
    pub const STATUS: u16 = 400;

    pub fn invalid_request() -> Self {
        Self {
            error_type: "Bad Request Error",
            message: "Invalid application request passed",
            status: Self::STATUS,
        }
    }
}
