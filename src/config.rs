//! Authentication Configuration
//!
//! All configuration values are loaded from environment variables.
//! No hardcoded secrets or sensitive data.

use crate::error::AuthError;
use std::env;

/// Authentication configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret for signing access tokens (from JWT_ACCESS_SECRET env var)
    pub access_secret: String,

    /// Secret for signing refresh tokens (from JWT_REFRESH_SECRET env var)
    pub refresh_secret: String,

    /// Secret for signing password-reset tokens (from JWT_RESET_SECRET env var)
    pub reset_secret: String,

    /// Access token expiration in seconds (from JWT_ACCESS_EXPIRATION env var)
    pub access_token_expiration: i64,

    /// Refresh token expiration in seconds (from JWT_REFRESH_EXPIRATION env var)
    pub refresh_token_expiration: i64,

    /// Password reset token expiration in seconds (from PASSWORD_RESET_EXPIRATION env var)
    pub password_reset_expiration: i64,

    /// Argon2 memory cost in KiB (from ARGON2_MEMORY_COST env var)
    pub argon2_memory_cost: u32,

    /// Argon2 time cost (iterations) (from ARGON2_TIME_COST env var)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (from ARGON2_PARALLELISM env var)
    pub argon2_parallelism: u32,

    /// Maximum failed login attempts before lockout (from MAX_LOGIN_ATTEMPTS env var)
    pub max_login_attempts: i32,

    /// Account lockout duration in seconds (from LOCKOUT_DURATION env var)
    pub lockout_duration: i64,

    /// Minimum password length (from MIN_PASSWORD_LENGTH env var)
    pub min_password_length: usize,

    /// Maximum refresh tokens retained per user (from MAX_REFRESH_TOKENS env var)
    pub max_refresh_tokens: usize,

    /// Whether the refresh cookie carries the Secure attribute (from COOKIE_SECURE env var)
    pub cookie_secure: bool,
}

fn required(name: &str) -> Result<String, AuthError> {
    env::var(name).map_err(|_| AuthError::Config(format!("{} must be set", name)))
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl AuthConfig {
    /// Load configuration from environment variables
    ///
    /// Each token class requires its own signing secret. There is
    /// deliberately no shared-secret fallback, in any environment.
    pub fn from_env() -> Result<Self, AuthError> {
        Ok(Self {
            access_secret: required("JWT_ACCESS_SECRET")?,
            refresh_secret: required("JWT_REFRESH_SECRET")?,
            reset_secret: required("JWT_RESET_SECRET")?,

            access_token_expiration: parsed_or("JWT_ACCESS_EXPIRATION", 86400), // 24 hours
            refresh_token_expiration: parsed_or("JWT_REFRESH_EXPIRATION", 604800), // 7 days
            password_reset_expiration: parsed_or("PASSWORD_RESET_EXPIRATION", 3600), // 1 hour

            argon2_memory_cost: parsed_or("ARGON2_MEMORY_COST", 65536), // 64 MiB
            argon2_time_cost: parsed_or("ARGON2_TIME_COST", 3),
            argon2_parallelism: parsed_or("ARGON2_PARALLELISM", 4),

            max_login_attempts: parsed_or("MAX_LOGIN_ATTEMPTS", 5),
            lockout_duration: parsed_or("LOCKOUT_DURATION", 7200), // 2 hours

            min_password_length: parsed_or("MIN_PASSWORD_LENGTH", 8),
            max_refresh_tokens: parsed_or("MAX_REFRESH_TOKENS", 5),

            cookie_secure: env::var("COOKIE_SECURE")
                .ok()
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AuthError> {
        for (name, secret) in [
            ("JWT_ACCESS_SECRET", &self.access_secret),
            ("JWT_REFRESH_SECRET", &self.refresh_secret),
            ("JWT_RESET_SECRET", &self.reset_secret),
        ] {
            if secret.len() < 32 {
                return Err(AuthError::Config(format!(
                    "{} must be at least 32 characters",
                    name
                )));
            }
        }

        // Token classes must not be cross-verifiable.
        if self.access_secret == self.refresh_secret
            || self.access_secret == self.reset_secret
            || self.refresh_secret == self.reset_secret
        {
            return Err(AuthError::Config(
                "JWT signing secrets must be distinct per token class".to_string(),
            ));
        }

        if self.access_token_expiration <= 0 {
            return Err(AuthError::Config(
                "JWT_ACCESS_EXPIRATION must be positive".to_string(),
            ));
        }

        if self.refresh_token_expiration <= self.access_token_expiration {
            return Err(AuthError::Config(
                "JWT_REFRESH_EXPIRATION must be greater than JWT_ACCESS_EXPIRATION".to_string(),
            ));
        }

        if self.min_password_length < 8 {
            return Err(AuthError::Config(
                "MIN_PASSWORD_LENGTH must be at least 8".to_string(),
            ));
        }

        if self.max_refresh_tokens == 0 {
            return Err(AuthError::Config(
                "MAX_REFRESH_TOKENS must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
