//! Authentication HTTP Handlers
//!
//! REST API endpoints for authentication operations.

use crate::error::AuthError;
use crate::extractors::CurrentUser;
use crate::middleware;
use crate::models::*;
use crate::service::AuthService;

use axum::{
    extract::State,
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, StatusCode,
    },
    middleware as axum_middleware,
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use validator::Validate;

/// Shared auth service state
pub type AuthState = Arc<AuthService>;

/// Cookie carrying the refresh token between browser sessions
const REFRESH_COOKIE: &str = "refresh_token";

// ============================================
// Route Builder
// ============================================

/// Create authentication routes
pub fn create_routes(auth_service: AuthState) -> Router {
    // Public routes (no authentication required)
    let public = Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh_token))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password));

    // Protected routes (require authentication)
    let protected = Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/logout-all", post(logout_all))
        .route("/auth/change-password", post(change_password))
        .route("/auth/verify", get(verify))
        .layer(axum_middleware::from_fn_with_state(
            auth_service.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .with_state(auth_service)
}

// ============================================
// Cookie Handling
// ============================================

/// Build the Set-Cookie value for a refresh token
fn refresh_cookie(token: &str, max_age: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Strict",
        REFRESH_COOKIE, token, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Expire the refresh cookie
fn clear_refresh_cookie(secure: bool) -> String {
    refresh_cookie("", 0, secure)
}

/// Read the refresh token from the Cookie header, if present
fn refresh_token_from_cookie(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == REFRESH_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

// ============================================
// Signup / Login
// ============================================

/// POST /auth/signup
///
/// Register a new user and return the first token pair
pub async fn signup(
    State(auth): State<AuthState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, AuthError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    req.validate()
        .map_err(|e| AuthError::Validation(e.to_string()))?;

    let response = auth.signup(req).await?;
    let cookie = refresh_cookie(
        &response.refresh_token,
        auth.config().refresh_token_expiration,
        auth.config().cookie_secure,
    );

    Ok((
        StatusCode::CREATED,
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(response),
    ))
}

/// POST /auth/login
///
/// Authenticate and return a fresh token pair
pub async fn login(
    State(auth): State<AuthState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let response = auth.login(req).await?;
    let cookie = refresh_cookie(
        &response.refresh_token,
        auth.config().refresh_token_expiration,
        auth.config().cookie_secure,
    );

    Ok((AppendHeaders([(SET_COOKIE, cookie)]), Json(response)))
}

// ============================================
// Token Refresh / Logout
// ============================================

/// POST /auth/refresh
///
/// Exchange a refresh token (body or cookie) for a new access token
pub async fn refresh_token(
    State(auth): State<AuthState>,
    headers: HeaderMap,
    req: Option<Json<RefreshTokenRequest>>,
) -> Result<impl IntoResponse, AuthError> {
    let token = req
        .and_then(|Json(body)| body.refresh_token)
        .or_else(|| refresh_token_from_cookie(&headers))
        .ok_or(AuthError::MissingRefreshToken)?;

    let response = auth.refresh(&token).await?;
    Ok(Json(response))
}

/// POST /auth/logout
///
/// Remove the presented refresh token from the session set. Always
/// succeeds, and expires the refresh cookie either way.
pub async fn logout(
    State(auth): State<AuthState>,
    user: CurrentUser,
    headers: HeaderMap,
    req: Option<Json<RefreshTokenRequest>>,
) -> Result<impl IntoResponse, AuthError> {
    let token = req
        .and_then(|Json(body)| body.refresh_token)
        .or_else(|| refresh_token_from_cookie(&headers));

    auth.logout(user.id, token.as_deref()).await?;

    Ok((
        AppendHeaders([(SET_COOKIE, clear_refresh_cookie(auth.config().cookie_secure))]),
        Json(MessageResponse::new("Logged out successfully")),
    ))
}

/// POST /auth/logout-all
///
/// Revoke every refresh token for the authenticated user
pub async fn logout_all(
    State(auth): State<AuthState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, AuthError> {
    auth.logout_all(user.id).await?;

    Ok((
        AppendHeaders([(SET_COOKIE, clear_refresh_cookie(auth.config().cookie_secure))]),
        Json(MessageResponse::new("Logged out of all sessions")),
    ))
}

// ============================================
// Password Management
// ============================================

/// POST /auth/change-password
///
/// Change password for the authenticated user; revokes all sessions
pub async fn change_password(
    State(auth): State<AuthState>,
    user: CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AuthError> {
    req.validate()
        .map_err(|e| AuthError::Validation(e.to_string()))?;

    auth.change_password(user.id, req).await?;

    Ok(Json(MessageResponse::new(
        "Password changed successfully. Please login again on all devices.",
    )))
}

/// POST /auth/forgot-password
///
/// Initiate a password reset. The response body is identical whether or
/// not the email is registered.
pub async fn forgot_password(
    State(auth): State<AuthState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AuthError> {
    req.validate()
        .map_err(|e| AuthError::Validation(e.to_string()))?;

    auth.forgot_password(&req.email).await?;

    Ok(Json(MessageResponse::new(
        "If an account with that email exists, a password reset link has been sent.",
    )))
}

/// POST /auth/reset-password
///
/// Complete a password reset with a reset token
pub async fn reset_password(
    State(auth): State<AuthState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AuthError> {
    req.validate()
        .map_err(|e| AuthError::Validation(e.to_string()))?;

    auth.reset_password(req).await?;

    Ok(Json(MessageResponse::new(
        "Password reset successful. Please login with your new password.",
    )))
}

// ============================================
// Verification
// ============================================

/// GET /auth/verify
///
/// Confirm the access token and return the current user
pub async fn verify(
    State(auth): State<AuthState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, AuthError> {
    let user = auth
        .get_user(user.id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    Ok(Json(serde_json::json!({ "user": UserView::from(&user) })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::notify::LogMailer;
    use crate::store::{MemoryStore, UserStore};

    use axum::body::{to_bytes, Body};
    use axum::http::{header::AUTHORIZATION, Request};
    use tower::util::ServiceExt;

    fn test_state() -> AuthState {
        test_state_with(Arc::new(MemoryStore::new()))
    }

    fn test_state_with(store: Arc<MemoryStore>) -> AuthState {
        let config = AuthConfig {
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
        };
        Arc::new(AuthService::new(store, Arc::new(LogMailer), config))
    }

    fn post_json(path: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_signup_sets_refresh_cookie() {
        let app = create_routes(test_state());

        let response = app
            .oneshot(post_json(
                "/auth/signup",
                serde_json::json!({ "email": "a@x.com", "password": "Passw0rd" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("refresh_token="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));

        let body = body_json(response).await;
        assert_eq!(body["user"]["email"], "a@x.com");
        assert!(body["access_token"].as_str().is_some());
        assert!(body["user"].get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_login_failures_map_to_statuses() {
        let state = test_state();
        let app = create_routes(state.clone());

        app.clone()
            .oneshot(post_json(
                "/auth/signup",
                serde_json::json!({ "email": "a@x.com", "password": "Passw0rd" }),
            ))
            .await
            .unwrap();

        // Wrong password and unknown email are both 401 with the same code.
        for email in ["a@x.com", "nobody@x.com"] {
            let response = app
                .clone()
                .oneshot(post_json(
                    "/auth/login",
                    serde_json::json!({ "email": email, "password": "WrongPw0" }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            let body = body_json(response).await;
            assert_eq!(body["error"], "invalid_credentials");
        }

        // One failure is already on the counter; the fifth trips the lock.
        for _ in 0..3 {
            app.clone()
                .oneshot(post_json(
                    "/auth/login",
                    serde_json::json!({ "email": "a@x.com", "password": "WrongPw0" }),
                ))
                .await
                .unwrap();
        }
        let response = app
            .clone()
            .oneshot(post_json(
                "/auth/login",
                serde_json::json!({ "email": "a@x.com", "password": "WrongPw0" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::LOCKED);

        // Correct password is also refused while locked.
        let response = app
            .oneshot(post_json(
                "/auth/login",
                serde_json::json!({ "email": "a@x.com", "password": "Passw0rd" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::LOCKED);
    }

    #[tokio::test]
    async fn test_refresh_from_cookie() {
        let app = create_routes(test_state());

        let signup = app
            .clone()
            .oneshot(post_json(
                "/auth/signup",
                serde_json::json!({ "email": "a@x.com", "password": "Passw0rd" }),
            ))
            .await
            .unwrap();
        let cookie = signup
            .headers()
            .get(SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/refresh")
                    .header(COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["access_token"].as_str().is_some());

        // Without body or cookie the token is missing.
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/refresh")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"], "missing_refresh_token");
    }

    #[tokio::test]
    async fn test_forgot_password_bodies_are_identical() {
        let app = create_routes(test_state());

        app.clone()
            .oneshot(post_json(
                "/auth/signup",
                serde_json::json!({ "email": "a@x.com", "password": "Passw0rd" }),
            ))
            .await
            .unwrap();

        let known = app
            .clone()
            .oneshot(post_json(
                "/auth/forgot-password",
                serde_json::json!({ "email": "a@x.com" }),
            ))
            .await
            .unwrap();
        let unknown = app
            .oneshot(post_json(
                "/auth/forgot-password",
                serde_json::json!({ "email": "unknown@x.com" }),
            ))
            .await
            .unwrap();

        assert_eq!(known.status(), StatusCode::OK);
        assert_eq!(unknown.status(), StatusCode::OK);
        assert_eq!(body_json(known).await, body_json(unknown).await);
    }

    #[tokio::test]
    async fn test_protected_routes_require_bearer_token() {
        let app = create_routes(test_state());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/auth/verify")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"], "missing_token");

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/auth/verify")
                    .header(AUTHORIZATION, "Bearer not-a-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid_token");
    }

    #[tokio::test]
    async fn test_gate_rejects_suspended_account() {
        let store = Arc::new(MemoryStore::new());
        let app = create_routes(test_state_with(store.clone()));

        let signup = app
            .clone()
            .oneshot(post_json(
                "/auth/signup",
                serde_json::json!({ "email": "a@x.com", "password": "Passw0rd" }),
            ))
            .await
            .unwrap();
        let access = body_json(signup).await["access_token"]
            .as_str()
            .unwrap()
            .to_string();

        let mut user = store.find_by_email("a@x.com").await.unwrap().unwrap();
        user.status = UserStatus::Suspended;
        store.save(&user).await.unwrap();

        // The token is still valid but the account no longer is.
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/auth/verify")
                    .header(AUTHORIZATION, format!("Bearer {}", access))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"], "account_inactive");
    }

    #[tokio::test]
    async fn test_optional_auth_never_blocks() {
        async fn whoami(user: Option<CurrentUser>) -> Json<serde_json::Value> {
            Json(serde_json::json!({ "email": user.map(|u| u.email) }))
        }

        let state = test_state();
        let app = Router::new()
            .route("/whoami", get(whoami))
            .layer(axum_middleware::from_fn_with_state(
                state.clone(),
                middleware::optional_auth,
            ))
            .merge(create_routes(state));

        // No token at all still reaches the handler, anonymously.
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["email"], serde_json::Value::Null);

        // So does a garbage token.
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header(AUTHORIZATION, "Bearer not-a-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["email"], serde_json::Value::Null);

        // A valid token attaches the identity.
        let signup = app
            .clone()
            .oneshot(post_json(
                "/auth/signup",
                serde_json::json!({ "email": "a@x.com", "password": "Passw0rd" }),
            ))
            .await
            .unwrap();
        let access = body_json(signup).await["access_token"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header(AUTHORIZATION, format!("Bearer {}", access))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["email"], "a@x.com");
    }

    #[tokio::test]
    async fn test_verify_returns_current_user() {
        let app = create_routes(test_state());

        let signup = app
            .clone()
            .oneshot(post_json(
                "/auth/signup",
                serde_json::json!({
                    "email": "a@x.com",
                    "password": "Passw0rd",
                    "profile": { "first_name": "Ada", "university": "LSE" }
                }),
            ))
            .await
            .unwrap();
        let access = body_json(signup).await["access_token"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/auth/verify")
                    .header(AUTHORIZATION, format!("Bearer {}", access))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["user"]["email"], "a@x.com");
        assert_eq!(body["user"]["first_name"], "Ada");
        assert_eq!(body["user"]["university"], "LSE");
    }

    #[tokio::test]
    async fn test_logout_clears_cookie_and_revokes_token() {
        let app = create_routes(test_state());

        let signup = app
            .clone()
            .oneshot(post_json(
                "/auth/signup",
                serde_json::json!({ "email": "a@x.com", "password": "Passw0rd" }),
            ))
            .await
            .unwrap();
        let body = body_json(signup).await;
        let access = body["access_token"].as_str().unwrap().to_string();
        let refresh = body["refresh_token"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/logout")
                    .header(AUTHORIZATION, format!("Bearer {}", access))
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({ "refresh_token": refresh }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.contains("Max-Age=0"));

        // The revoked token no longer refreshes.
        let response = app
            .oneshot(post_json(
                "/auth/refresh",
                serde_json::json!({ "refresh_token": refresh }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
