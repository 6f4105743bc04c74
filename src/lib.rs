//! Pipeline Auth
//!
//! Authentication and session-lifecycle core for the Pipeline job-search
//! CRM backend, providing:
//! - User signup and login with Argon2id password hashing
//! - JWT access and refresh tokens signed with independent secrets
//! - A bounded per-user refresh-token set with oldest-first eviction
//! - Account lockout after repeated failed password attempts
//! - Password change and purpose-scoped password reset flows
//! - A request gate that loads the identity for every protected route
//!
//! # Configuration
//!
//! All configuration is loaded from environment variables:
//! - `JWT_ACCESS_SECRET` / `JWT_REFRESH_SECRET` / `JWT_RESET_SECRET` -
//!   per-class signing secrets (required, min 32 chars, must be distinct)
//! - `JWT_ACCESS_EXPIRATION` - Access token expiration in seconds (default: 86400)
//! - `JWT_REFRESH_EXPIRATION` - Refresh token expiration in seconds (default: 604800)
//! - `PASSWORD_RESET_EXPIRATION` - Reset token expiration in seconds (default: 3600)
//! - `MAX_LOGIN_ATTEMPTS` / `LOCKOUT_DURATION` - Lockout policy (default: 5 / 7200)
//! - `DATABASE_URL` - PostgreSQL connection string (required by the binary)
//!
//! # Usage
//!
//! ```rust,ignore
//! use pipeline_auth::{AuthConfig, AuthService, create_routes, LogMailer, PgUserStore};
//! use std::sync::Arc;
//!
//! let config = AuthConfig::from_env()?;
//! config.validate()?;
//!
//! let store = Arc::new(PgUserStore::new(pool));
//! let service = Arc::new(AuthService::new(store, Arc::new(LogMailer), config));
//! let app = create_routes(service);
//! ```
//!
//! The CRM resource routers (contacts, interviews, documents, tasks,
//! goals, analytics) mount behind [`middleware::require_auth`] and read
//! the authenticated identity through the [`CurrentUser`] extractor.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod lockout;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod service;
pub mod store;
pub mod token;

// Re-export commonly used types
pub use config::AuthConfig;
pub use error::AuthError;
pub use extractors::CurrentUser;
pub use handlers::{create_routes, AuthState};
pub use models::*;
pub use notify::{LogMailer, Mailer};
pub use service::AuthService;
pub use store::{MemoryStore, PgUserStore, UserStore};
pub use token::{TokenIssuer, TokenKind};
