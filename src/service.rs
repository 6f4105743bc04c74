//! Authentication Service
//!
//! Orchestrates the credential store, token issuer, lockout policy, and
//! notification seam. All operations are terminal on failure; nothing here
//! retries, and every store mutation is an explicit read-modify-write of a
//! loaded record.

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::lockout::{self, LockoutPolicy};
use crate::models::*;
use crate::notify::Mailer;
use crate::store::UserStore;
use crate::token::{TokenIssuer, TokenKind};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Authentication service
pub struct AuthService {
    store: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    tokens: TokenIssuer,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(store: Arc<dyn UserStore>, mailer: Arc<dyn Mailer>, config: AuthConfig) -> Self {
        let tokens = TokenIssuer::new(&config);
        Self {
            store,
            mailer,
            tokens,
            config,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    fn lockout_policy(&self) -> LockoutPolicy {
        LockoutPolicy::new(self.config.max_login_attempts, self.config.lockout_duration)
    }

    // ============================================
    // Password Hashing
    // ============================================

    /// Hash a password with Argon2id.
    ///
    /// The hash is CPU-bound, so it runs on the blocking pool rather than
    /// the request task.
    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_string();
        let (memory, time, parallelism) = (
            self.config.argon2_memory_cost,
            self.config.argon2_time_cost,
            self.config.argon2_parallelism,
        );

        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            let params =
                Params::new(memory, time, parallelism, None).map_err(|_| AuthError::Internal)?;
            let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

            let hash = argon2
                .hash_password(password.as_bytes(), &salt)?
                .to_string();
            Ok(hash)
        })
        .await?
    }

    /// Verify a password against a stored hash, off the event loop.
    /// Comparison comes from the password-hash API and does not
    /// short-circuit on mismatch.
    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let password = password.to_string();
        let hash = hash.to_string();

        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&hash).map_err(|_| AuthError::Internal)?;
            Ok(Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok())
        })
        .await?
    }

    /// Password strength policy: minimum length plus at least one
    /// uppercase letter, one lowercase letter, and one digit.
    fn validate_password(&self, password: &str) -> Result<(), AuthError> {
        // Characters, not bytes; multibyte passwords count per character.
        if password.chars().count() < self.config.min_password_length {
            return Err(AuthError::WeakPassword);
        }

        let has_upper = password.chars().any(|c| c.is_uppercase());
        let has_lower = password.chars().any(|c| c.is_lowercase());
        let has_digit = password.chars().any(|c| c.is_ascii_digit());

        if !has_upper || !has_lower || !has_digit {
            return Err(AuthError::WeakPassword);
        }

        Ok(())
    }

    // ============================================
    // Signup / Login
    // ============================================

    /// Register a new identity and issue its first token pair
    pub async fn signup(&self, req: SignupRequest) -> Result<AuthResponse, AuthError> {
        if req.email.trim().is_empty() || req.password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        // Refuse taken addresses before spending an Argon2 hash; the
        // unique index still backstops a concurrent signup race.
        if self.store.find_by_email(&req.email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        self.validate_password(&req.password)?;

        let password_hash = self.hash_password(&req.password).await?;

        let mut user = self
            .store
            .create(NewUser {
                email: canonical_email(&req.email),
                password_hash,
                profile: req.profile.unwrap_or_default(),
            })
            .await?;

        let access_token = self.tokens.issue(&user, TokenKind::Access)?;
        let refresh_token = self.tokens.issue(&user, TokenKind::Refresh)?;

        self.append_refresh_token(&mut user, refresh_token.clone());
        self.store.save(&user).await?;

        tracing::info!(user_id = %user.id, "User registered");

        Ok(AuthResponse {
            user: UserView::from(&user),
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.access_expiration(),
        })
    }

    /// Authenticate credentials and issue a new token pair.
    ///
    /// Unknown email and wrong password produce the same error, so the
    /// response never reveals whether an address is registered. A lock is
    /// reported distinctly once lookup has already succeeded.
    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, AuthError> {
        if req.email.trim().is_empty() || req.password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let mut user = self
            .store
            .find_by_email(&req.email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let now = Utc::now();

        if lockout::is_locked(&user, now) {
            tracing::warn!(user_id = %user.id, "Login attempt on locked account");
            return Err(AuthError::AccountLocked);
        }

        if !user.is_active() {
            return Err(AuthError::AccountInactive);
        }

        if !self.verify_password(&req.password, &user.password_hash).await? {
            let tripped = lockout::record_failure(&mut user, now, &self.lockout_policy());
            self.store.save(&user).await?;

            if tripped {
                tracing::warn!(user_id = %user.id, "Account locked after repeated failures");
                return Err(AuthError::AccountLocked);
            }
            return Err(AuthError::InvalidCredentials);
        }

        lockout::record_success(&mut user);
        user.last_login = Some(now);

        let access_token = self.tokens.issue(&user, TokenKind::Access)?;
        let refresh_token = self.tokens.issue(&user, TokenKind::Refresh)?;
        self.append_refresh_token(&mut user, refresh_token.clone());

        self.store.save(&user).await?;

        tracing::debug!(user_id = %user.id, "Login succeeded");

        Ok(AuthResponse {
            user: UserView::from(&user),
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.access_expiration(),
        })
    }

    /// Append a refresh token, evicting the oldest beyond the cap
    fn append_refresh_token(&self, user: &mut User, token: String) {
        user.refresh_tokens.push(token);
        while user.refresh_tokens.len() > self.config.max_refresh_tokens {
            user.refresh_tokens.remove(0);
        }
    }

    // ============================================
    // Token Refresh / Logout
    // ============================================

    /// Exchange a refresh token for a new access token.
    ///
    /// The presented token must still be in the identity's stored set: a
    /// token removed by logout, logout-all, or a password change can no
    /// longer mint access tokens even while its signature is valid. All
    /// failures collapse into `InvalidRefreshToken`.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AccessTokenResponse, AuthError> {
        let claims = self
            .tokens
            .verify(refresh_token, TokenKind::Refresh)
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        let user = self
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        if !user.refresh_tokens.iter().any(|t| t.as_str() == refresh_token) {
            tracing::debug!(user_id = %user.id, "Refresh attempt with revoked token");
            return Err(AuthError::InvalidRefreshToken);
        }

        let access_token = self.tokens.issue(&user, TokenKind::Access)?;

        Ok(AccessTokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.access_expiration(),
        })
    }

    /// Remove one refresh token from the identity's set. Always succeeds;
    /// an absent token or identity is a no-op.
    pub async fn logout(&self, user_id: Uuid, refresh_token: Option<&str>) -> Result<(), AuthError> {
        let Some(token) = refresh_token else {
            return Ok(());
        };

        let Some(mut user) = self.store.find_by_id(user_id).await? else {
            return Ok(());
        };

        let before = user.refresh_tokens.len();
        user.refresh_tokens.retain(|t| t.as_str() != token);

        if user.refresh_tokens.len() != before {
            self.store.save(&user).await?;
        }

        Ok(())
    }

    /// Clear the identity's entire refresh-token set
    pub async fn logout_all(&self, user_id: Uuid) -> Result<(), AuthError> {
        let Some(mut user) = self.store.find_by_id(user_id).await? else {
            return Ok(());
        };

        user.refresh_tokens.clear();
        self.store.save(&user).await?;

        tracing::debug!(user_id = %user_id, "All sessions revoked");
        Ok(())
    }

    // ============================================
    // Password Management
    // ============================================

    /// Change password for an authenticated identity; every outstanding
    /// refresh token is revoked so other sessions must log in again.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        req: ChangePasswordRequest,
    ) -> Result<(), AuthError> {
        let mut user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !self
            .verify_password(&req.current_password, &user.password_hash)
            .await?
        {
            return Err(AuthError::InvalidCurrentPassword);
        }

        self.validate_password(&req.new_password)?;

        user.password_hash = self.hash_password(&req.new_password).await?;
        user.refresh_tokens.clear();
        self.store.save(&user).await?;

        tracing::info!(user_id = %user.id, "Password changed, sessions revoked");
        Ok(())
    }

    /// Begin a password reset. The response is identical whether or not
    /// the email is registered; when it is, the reset token and its expiry
    /// are stored on the record and handed to the mailer.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let Some(mut user) = self.store.find_by_email(email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = self.tokens.issue_reset(&user)?;
        user.password_reset_token = Some(token.clone());
        user.password_reset_expires =
            Some(Utc::now() + Duration::seconds(self.config.password_reset_expiration));
        self.store.save(&user).await?;

        self.mailer.send_password_reset(&user.email, &token).await;
        Ok(())
    }

    /// Complete a password reset. The token must be reset-class with the
    /// right purpose, exactly match the stored pending token, and be
    /// within the stored expiry; consuming it clears both reset fields
    /// and every refresh token.
    pub async fn reset_password(&self, req: ResetPasswordRequest) -> Result<(), AuthError> {
        let claims = self.tokens.verify_reset(&req.token)?;

        let mut user = self
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        match &user.password_reset_token {
            Some(stored) if *stored == req.token => {}
            _ => return Err(AuthError::InvalidOrExpiredToken),
        }

        match user.password_reset_expires {
            Some(expires) if expires > Utc::now() => {}
            _ => return Err(AuthError::InvalidOrExpiredToken),
        }

        self.validate_password(&req.new_password)?;

        user.password_hash = self.hash_password(&req.new_password).await?;
        user.password_reset_token = None;
        user.password_reset_expires = None;
        user.refresh_tokens.clear();
        self.store.save(&user).await?;

        tracing::info!(user_id = %user.id, "Password reset completed, sessions revoked");
        Ok(())
    }

    // ============================================
    // Request Gate Support
    // ============================================

    /// Load a user by id
    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AuthError> {
        self.store.find_by_id(user_id).await
    }

    /// Verify a bearer access token and load its identity. Used by the
    /// request gate on every protected route; the record is re-read from
    /// the store each time, never cached.
    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.tokens.verify(token, TokenKind::Access)?;

        let user = self
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !user.is_active() {
            return Err(AuthError::AccountInactive);
        }

        Ok(user)
    }
}
