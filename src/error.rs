//! Authentication Error Types
//!
//! Centralized error handling for all authentication operations.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Authentication errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Password does not meet requirements")]
    WeakPassword,

    #[error("Email and password are required")]
    MissingCredentials,

    // Covers both unknown email and wrong password so callers cannot
    // enumerate registered addresses.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is temporarily locked. Try again later")]
    AccountLocked,

    #[error("Account is not active")]
    AccountInactive,

    #[error("Current password is incorrect")]
    InvalidCurrentPassword,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Refresh token is required")]
    MissingRefreshToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Authentication required")]
    MissingToken,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid reset token")]
    InvalidResetToken,

    #[error("Invalid or expired reset token")]
    InvalidOrExpiredToken,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error")]
    Internal,
}

impl AuthError {
    /// Stable machine-readable code carried in error responses
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::DuplicateEmail => "duplicate_email",
            AuthError::WeakPassword => "weak_password",
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::AccountLocked => "account_locked",
            AuthError::AccountInactive => "account_inactive",
            AuthError::InvalidCurrentPassword => "invalid_current_password",
            AuthError::InvalidRefreshToken => "invalid_refresh_token",
            AuthError::MissingRefreshToken => "missing_refresh_token",
            AuthError::InvalidToken => "invalid_token",
            AuthError::ExpiredToken => "expired_token",
            AuthError::MissingToken => "missing_token",
            AuthError::UserNotFound => "user_not_found",
            AuthError::InvalidResetToken => "invalid_reset_token",
            AuthError::InvalidOrExpiredToken => "invalid_or_expired_token",
            AuthError::Validation(_) => "validation_error",
            AuthError::Database(_) => "internal_error",
            AuthError::Config(_) => "configuration_error",
            AuthError::Internal => "internal_error",
        }
    }

    /// HTTP status for the error
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::DuplicateEmail
            | AuthError::WeakPassword
            | AuthError::MissingCredentials
            | AuthError::InvalidCurrentPassword
            | AuthError::InvalidResetToken
            | AuthError::InvalidOrExpiredToken
            | AuthError::Validation(_) => StatusCode::BAD_REQUEST,

            AuthError::InvalidCredentials
            | AuthError::AccountInactive
            | AuthError::InvalidRefreshToken
            | AuthError::MissingRefreshToken
            | AuthError::InvalidToken
            | AuthError::ExpiredToken
            | AuthError::MissingToken
            | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,

            // Distinct status so clients can tell "wrong password" from
            // "too many wrong passwords".
            AuthError::AccountLocked => StatusCode::LOCKED,

            AuthError::Database(_) | AuthError::Config(_) | AuthError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match &self {
            // Internals never leak detail to clients.
            AuthError::Database(_) | AuthError::Internal => {
                "An internal error occurred".to_string()
            }
            AuthError::Config(_) => "Server configuration error".to_string(),
            other => other.to_string(),
        };

        (
            self.status(),
            Json(serde_json::json!({
                "error": self.code(),
                "message": message
            })),
        )
            .into_response()
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return AuthError::DuplicateEmail;
            }
        }
        tracing::error!("Database error: {:?}", err);
        AuthError::Database(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        tracing::error!("Password hashing error: {:?}", err);
        AuthError::Internal
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        tracing::debug!("JWT error: {:?}", err);
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            _ => AuthError::InvalidToken,
        }
    }
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(err: tokio::task::JoinError) -> Self {
        tracing::error!("Blocking task failed: {:?}", err);
        AuthError::Internal
    }
}
