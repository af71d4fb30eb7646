//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting API routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::error::ApiError;
use crate::web::auth::SESSION_COOKIE;
use crate::web::state::AppState;

/// Pulls the session token out of the request's cookie header, if present.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie_header.split(';').find_map(|part| {
        part.trim()
            .strip_prefix(SESSION_COOKIE)?
            .strip_prefix('=')
    })
}

/// Middleware that validates the auth session cookie and extracts the user.
///
/// If valid, inserts the authenticated user into request extensions for
/// handlers to use. If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Extract the session token from the cookie header
    let token = session_token(req.headers())
        .ok_or_else(ApiError::unauthenticated)?
        .to_string();

    // 2. Validate the auth session in the database
    let session = state.db.validate_auth_session(&token).await.map_err(|e| {
        debug!("Rejected session token: {}", e);
        ApiError::unauthenticated()
    })?;

    // 3. Insert the user into request extensions
    req.extensions_mut().insert(session.user);

    // 4. Continue to the handler
    Ok(next.run(req).await)
}
