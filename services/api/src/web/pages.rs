//! services/api/src/web/pages.rs
//!
//! Server-side page routes. Every page resolves the session from the
//! cookie, runs the route guard, and either serves the static shell or
//! answers with a 303 redirect — the same decisions the client-side
//! guard makes, so deep links land correctly before any script runs.

use axum::{
    extract::{OriginalUri, State},
    http::{header, HeaderMap},
    response::{Html, IntoResponse, Redirect, Response},
};
use shelfmark_core::guard::{decide, GuardDecision};
use shelfmark_core::session::{SessionSnapshot, SIGNED_OUT_DESTINATION};
use std::sync::Arc;
use tracing::warn;

use crate::web::auth::SESSION_COOKIE;
use crate::web::middleware::session_token;
use crate::web::state::AppState;

/// GET handler shared by every page route.
pub async fn page_handler(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    let path = uri.path();
    let query = uri.query().unwrap_or("");

    // Resolve the session; a bad or missing cookie is simply signed out
    let session = match session_token(&headers) {
        Some(token) => state.db.validate_auth_session(token).await.ok(),
        None => None,
    };
    let snapshot = SessionSnapshot {
        loading: false,
        session,
    };

    match decide(&snapshot, path, query) {
        GuardDecision::Redirect(target) => Redirect::to(&target).into_response(),
        GuardDecision::Stay => shell(path).into_response(),
    }
}

/// GET /auth/signout - Delete the session and land on the public home page
///
/// Always clears the cookie and redirects, even when the backend delete
/// fails; the failure only means the server-side row outlives the cookie.
pub async fn signout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(token) = session_token(&headers) {
        if let Err(e) = state.db.delete_auth_session(token).await {
            warn!("Failed to delete session on sign-out: {}", e);
        }
    }
    let cookie = format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE
    );
    (
        [(header::SET_COOKIE, cookie)],
        Redirect::to(SIGNED_OUT_DESTINATION),
    )
}

fn page_title(path: &str) -> &'static str {
    match path {
        "/dashboard" => "Dashboard",
        "/books" => "My Books",
        "/books/track" => "Track Progress",
        "/search" => "Discover",
        "/friends" => "Friends",
        "/messages" => "Messages",
        "/profile" => "Profile",
        "/onboarding" => "Welcome",
        "/auth/signin" => "Sign In",
        "/auth/signup" => "Sign Up",
        _ => "Shelfmark",
    }
}

fn shell(path: &str) -> Html<String> {
    let title = page_title(path);
    Html(format!(
        "<!doctype html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title} · Shelfmark</title>\n\
         </head>\n\
         <body>\n\
         <main id=\"app\" data-page=\"{path}\">\n\
         <h1>{title}</h1>\n\
         </main>\n\
         </body>\n\
         </html>\n"
    ))
}
