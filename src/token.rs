//! Token Issuer
//!
//! JWT issuance and verification for the three token classes. Each class
//! signs with its own secret, so a token presented against the wrong class
//! fails signature verification outright; the reset class additionally
//! carries a `purpose` claim that is checked on decode.

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::models::User;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Purpose claim value carried by reset-class tokens
pub const RESET_PURPOSE: &str = "password-reset";

/// Token class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
    Reset,
}

/// Claims for access and refresh tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// User email at issuance
    pub email: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Unique token id; keeps tokens minted in the same second distinct
    pub jti: Uuid,
}

/// Claims for password-reset tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetClaims {
    pub sub: Uuid,
    pub email: String,
    /// Must equal [`RESET_PURPOSE`]; anything else is rejected
    pub purpose: String,
    pub iat: i64,
    pub exp: i64,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Signs and verifies the three token classes
pub struct TokenIssuer {
    access: KeyPair,
    refresh: KeyPair,
    reset: KeyPair,
    access_expiration: i64,
    refresh_expiration: i64,
    reset_expiration: i64,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access: KeyPair::from_secret(&config.access_secret),
            refresh: KeyPair::from_secret(&config.refresh_secret),
            reset: KeyPair::from_secret(&config.reset_secret),
            access_expiration: config.access_token_expiration,
            refresh_expiration: config.refresh_token_expiration,
            reset_expiration: config.password_reset_expiration,
        }
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
            TokenKind::Reset => &self.reset,
        }
    }

    fn expiration(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.access_expiration,
            TokenKind::Refresh => self.refresh_expiration,
            TokenKind::Reset => self.reset_expiration,
        }
    }

    /// Seconds until a freshly issued access token expires
    pub fn access_expiration(&self) -> i64 {
        self.access_expiration
    }

    /// Seconds until a freshly issued refresh token expires
    pub fn refresh_expiration(&self) -> i64 {
        self.refresh_expiration
    }

    /// Issue an access or refresh token for the user
    pub fn issue(&self, user: &User, kind: TokenKind) -> Result<String, AuthError> {
        debug_assert!(kind != TokenKind::Reset, "reset tokens use issue_reset");

        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.expiration(kind))).timestamp(),
            jti: Uuid::new_v4(),
        };

        Ok(encode(&Header::default(), &claims, &self.keys(kind).encoding)?)
    }

    /// Issue a short-lived, purpose-scoped password-reset token
    pub fn issue_reset(&self, user: &User) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = ResetClaims {
            sub: user.id,
            email: user.email.clone(),
            purpose: RESET_PURPOSE.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.reset_expiration)).timestamp(),
        };

        Ok(encode(&Header::default(), &claims, &self.reset.encoding)?)
    }

    /// Verify a token against the given class.
    ///
    /// A token signed with another class's secret fails here with
    /// `InvalidToken`; an expired one with `ExpiredToken`. Reset tokens do
    /// not satisfy this call even against the reset keys, since their
    /// claims lack the `jti` field [`Claims`] requires; use
    /// [`TokenIssuer::verify_reset`] for those.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.keys(kind).decoding, &Validation::default())?;
        Ok(data.claims)
    }

    /// Verify a reset-class token, enforcing the `purpose` claim
    pub fn verify_reset(&self, token: &str) -> Result<ResetClaims, AuthError> {
        let data = decode::<ResetClaims>(token, &self.reset.decoding, &Validation::default())
            .map_err(|err| match AuthError::from(err) {
                AuthError::ExpiredToken => AuthError::InvalidOrExpiredToken,
                _ => AuthError::InvalidResetToken,
            })?;

        if data.claims.purpose != RESET_PURPOSE {
            return Err(AuthError::InvalidResetToken);
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{UserRole, UserStatus};

    fn config() -> AuthConfig {
        AuthConfig {
            access_secret: "access-secret-access-secret-access".to_string(),
            refresh_secret: "refresh-secret-refresh-secret-refr".to_string(),
            reset_secret: "reset-secret-reset-secret-reset-se".to_string(),
            access_token_expiration: 86400,
            refresh_token_expiration: 604800,
            password_reset_expiration: 3600,
            argon2_memory_cost: 8,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            max_login_attempts: 5,
            lockout_duration: 7200,
            min_password_length: 8,
            max_refresh_tokens: 5,
            cookie_secure: false,
        }
    }

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            password_hash: "hash".to_string(),
            role: UserRole::User,
            status: UserStatus::Active,
            first_name: None,
            last_name: None,
            university: None,
            graduation_year: None,
            phone: None,
            linkedin_url: None,
            refresh_tokens: Vec::new(),
            login_attempts: 0,
            lock_until: None,
            last_login: None,
            password_reset_token: None,
            password_reset_expires: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_round_trip_per_class() {
        let issuer = TokenIssuer::new(&config());
        let u = user();

        let access = issuer.issue(&u, TokenKind::Access).unwrap();
        let claims = issuer.verify(&access, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, u.id);
        assert_eq!(claims.email, u.email);

        let refresh = issuer.issue(&u, TokenKind::Refresh).unwrap();
        let claims = issuer.verify(&refresh, TokenKind::Refresh).unwrap();
        assert_eq!(claims.sub, u.id);
    }

    #[test]
    fn test_cross_class_verification_fails() {
        let issuer = TokenIssuer::new(&config());
        let u = user();

        let access = issuer.issue(&u, TokenKind::Access).unwrap();
        let refresh = issuer.issue(&u, TokenKind::Refresh).unwrap();

        assert!(matches!(
            issuer.verify(&access, TokenKind::Refresh),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            issuer.verify(&refresh, TokenKind::Access),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_reset_token_rejected_as_access_or_refresh() {
        let issuer = TokenIssuer::new(&config());
        let u = user();

        let reset = issuer.issue_reset(&u).unwrap();
        assert!(issuer.verify(&reset, TokenKind::Access).is_err());
        assert!(issuer.verify(&reset, TokenKind::Refresh).is_err());

        let claims = issuer.verify_reset(&reset).unwrap();
        assert_eq!(claims.purpose, RESET_PURPOSE);
        assert_eq!(claims.sub, u.id);
    }

    #[test]
    fn test_wrong_purpose_claim_is_rejected() {
        let issuer = TokenIssuer::new(&config());
        let u = user();
        let now = Utc::now();

        // Well-formed, unexpired, correctly signed, wrong purpose.
        let claims = ResetClaims {
            sub: u.id,
            email: u.email.clone(),
            purpose: "email-verification".to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        let forged = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config().reset_secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            issuer.verify_reset(&forged),
            Err(AuthError::InvalidResetToken)
        ));
    }

    #[test]
    fn test_expired_token_reports_expired() {
        let issuer = TokenIssuer::new(&config());
        let u = user();
        let now = Utc::now();

        let claims = Claims {
            sub: u.id,
            email: u.email.clone(),
            iat: (now - Duration::hours(2)).timestamp(),
            exp: (now - Duration::hours(1)).timestamp(),
            jti: Uuid::new_v4(),
        };
        let expired = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config().access_secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            issuer.verify(&expired, TokenKind::Access),
            Err(AuthError::ExpiredToken)
        ));
    }

    #[test]
    fn test_garbage_token_is_invalid() {
        let issuer = TokenIssuer::new(&config());
        assert!(matches!(
            issuer.verify("not-a-jwt", TokenKind::Access),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            issuer.verify_reset("not-a-jwt"),
            Err(AuthError::InvalidResetToken)
        ));
    }
}
