use std::fmt;

use axum::http::StatusCode;
use thiserror::Error;

/// Which unique account attribute collided on registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictField {
    Username,
    Email,
}

impl fmt::Display for ConflictField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictField::Username => f.write_str("username"),
            ConflictField::Email => f.write_str("email address"),
        }
    }
}

/// Failures of the auth and catalog services.
///
/// The first four variants are user-facing and end up as flash notices on a
/// re-rendered view. `Store` and `Hash` are not and surface as a 500.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{field} is required")]
    Validation { field: &'static str },
    #[error("this {0} is already in use")]
    Conflict(ConflictField),
    #[error("incorrect password for this user")]
    Auth,
    #[error("user {0} does not exist")]
    NotFound(String),
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    Hash(String),
}

impl ServiceError {
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, ServiceError::Store(_) | ServiceError::Hash(_))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Auth => StatusCode::UNAUTHORIZED,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Store(_) | ServiceError::Hash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Rejects an empty (or whitespace-only) required field.
pub fn require(field: &'static str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::Validation { field });
    }
    Ok(())
}
