//! Request Gate
//!
//! Middleware that verifies the bearer access token and loads the identity
//! behind it before a protected handler runs. Unlike a claims-only check,
//! the credential record is re-read on every request so revoked or
//! deactivated accounts are refused immediately, not at token expiry.

use crate::error::AuthError;
use crate::extractors::CurrentUser;
use crate::handlers::AuthState;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

/// Pull the bearer token out of the Authorization header
fn bearer_token(req: &Request) -> Result<&str, AuthError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    header.strip_prefix("Bearer ").ok_or(AuthError::MissingToken)
}

/// Require an authenticated, active identity.
///
/// On success the hash-stripped identity is stored in request extensions
/// for the [`CurrentUser`] extractor. Failures map to the token taxonomy:
/// `MissingToken`, `InvalidToken`, `ExpiredToken`, `UserNotFound`,
/// `AccountInactive`.
pub async fn require_auth(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(&req)?;
    let user = auth.authenticate(token).await?;

    req.extensions_mut().insert(CurrentUser::from(&user));
    Ok(next.run(req).await)
}

/// Attach the identity when a valid token is present, but never fail the
/// request. Handlers that can serve both anonymous and authenticated
/// callers read the extension through `Option<CurrentUser>`.
pub async fn optional_auth(State(auth): State<AuthState>, mut req: Request, next: Next) -> Response {
    if let Ok(token) = bearer_token(&req) {
        if let Ok(user) = auth.authenticate(token).await {
            req.extensions_mut().insert(CurrentUser::from(&user));
        }
    }

    next.run(req).await
}
