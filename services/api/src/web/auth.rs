//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, logout, and session
//! introspection.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shelfmark_core::domain::{
    username_from_email, validate_password, NewProfile, PASSWORD_TOO_SHORT,
};
use shelfmark_core::ports::PortError;
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::middleware::session_token;
use crate::web::state::AppState;

/// Name of the cookie that carries the session token.
pub const SESSION_COOKIE: &str = "session";

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

type AuthFailure = (StatusCode, Json<serde_json::Value>);

fn auth_error(status: StatusCode, message: &str) -> AuthFailure {
    (status, Json(json!({ "error": message })))
}

fn session_cookie(token: &str, max_age: Duration) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        token,
        max_age.num_seconds()
    )
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid request"),
        (status = 500, description = "Internal server error")
    ),
    tag = "auth"
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, AuthFailure> {
    // 1. Enforce the password policy before touching the hasher
    if validate_password(&req.password).is_err() {
        return Err(auth_error(StatusCode::BAD_REQUEST, PASSWORD_TOO_SHORT));
    }

    // 2. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            auth_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password")
        })?
        .to_string();

    // 3. Create the user in the database
    let user = state
        .db
        .create_user_with_email(&req.email, &password_hash)
        .await
        .map_err(|e| match e {
            PortError::Invalid(message) => auth_error(StatusCode::BAD_REQUEST, &message),
            other => {
                error!("Failed to create user: {:?}", other);
                auth_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create user")
            }
        })?;

    // 4. Bootstrap a profile; the account is usable even if this fails
    let profile = NewProfile {
        id: user.id,
        username: Some(username_from_email(&req.email)),
        full_name: req.full_name.clone(),
    };
    if let Err(e) = state.db.create_profile_if_absent(&profile).await {
        warn!("Could not create profile for {}: {}", user.id, e);
    }

    // 5. Generate an auth session token
    let token = Uuid::new_v4().to_string();

    // 6. Set expiration from config
    let ttl = Duration::days(state.config.session_ttl_days);
    let expires_at = Utc::now() + ttl;

    // 7. Create the auth session in the database
    state
        .db
        .create_auth_session(&token, user.id, expires_at)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            auth_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session")
        })?;

    // 8. Return the response with the session cookie
    let response = AuthResponse {
        user_id: user.id,
        email: user.email,
        expires_at,
    };

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, session_cookie(&token, ttl))],
        Json(response),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthFailure> {
    // 1. Get the stored credentials by email
    let creds = state.db.get_user_by_email(&req.email).await.map_err(|e| {
        if !matches!(e, PortError::NotFound(_)) {
            error!("Failed to get user: {:?}", e);
        }
        auth_error(StatusCode::UNAUTHORIZED, "Invalid email or password")
    })?;

    // 2. Verify the password
    let parsed_hash = PasswordHash::new(&creds.password_hash).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        auth_error(StatusCode::INTERNAL_SERVER_ERROR, "Authentication error")
    })?;

    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();

    if !valid {
        return Err(auth_error(
            StatusCode::UNAUTHORIZED,
            "Invalid email or password",
        ));
    }

    // 3. Generate an auth session token
    let token = Uuid::new_v4().to_string();

    // 4. Set expiration from config
    let ttl = Duration::days(state.config.session_ttl_days);
    let expires_at = Utc::now() + ttl;

    // 5. Create the auth session in the database
    state
        .db
        .create_auth_session(&token, creds.user_id, expires_at)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            auth_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session")
        })?;

    // 6. Return the response with the session cookie
    let response = AuthResponse {
        user_id: creds.user_id,
        email: creds.email,
        expires_at,
    };

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&token, ttl))],
        Json(response),
    ))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthFailure> {
    // 1. Extract the session token from the cookie header
    let token = session_token(&headers)
        .ok_or_else(|| auth_error(StatusCode::UNAUTHORIZED, "No session found"))?
        .to_string();

    // 2. Delete the auth session from the database
    state.db.delete_auth_session(&token).await.map_err(|e| {
        error!("Failed to delete auth session: {:?}", e);
        auth_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout")
    })?;

    // 3. Clear the cookie
    let cookie = format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE
    );

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]))
}

/// GET /auth/session - Inspect the current session
///
/// Always answers 200; a missing or expired session comes back as
/// `{"session": null}` rather than an error.
#[utoipa::path(
    get,
    path = "/auth/session",
    responses(
        (status = 200, description = "Current session, or null when signed out")
    ),
    tag = "auth"
)]
pub async fn session_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<serde_json::Value> {
    let session = match session_token(&headers) {
        Some(token) => state.db.validate_auth_session(token).await.ok(),
        None => None,
    };
    Json(json!({
        "session": session.map(|s| json!({
            "token": s.token,
            "user_id": s.user.id,
            "email": s.user.email,
            "expires_at": s.expires_at,
        })),
    }))
}
