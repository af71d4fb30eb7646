//! services/api/src/web/mod.rs

pub mod auth;
pub mod catalog;
pub mod middleware;
pub mod pages;
pub mod profile;
pub mod progress;
pub mod rest;
pub mod shelves;
pub mod social;
pub mod state;

// Re-export the pieces the binary needs to assemble the server.
pub use middleware::require_auth;
pub use rest::ApiDoc;
pub use state::AppState;

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Builds the complete application router: page shells and auth endpoints in
/// the open, everything under `/api` behind the session middleware.
pub fn api_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(state.config.cors_allow_origin.clone())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required). `/auth/signup` doubles as a page on
    // GET and the account endpoint on POST.
    let public_routes = Router::new()
        .route(
            "/auth/signup",
            post(auth::signup_handler).get(pages::page_handler),
        )
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/session", get(auth::session_handler))
        .route("/auth/signin", get(pages::page_handler))
        .route("/auth/signout", get(pages::signout_handler))
        .route("/", get(pages::page_handler))
        .route("/dashboard", get(pages::page_handler))
        .route("/books", get(pages::page_handler))
        .route("/books/track", get(pages::page_handler))
        .route("/search", get(pages::page_handler))
        .route("/friends", get(pages::page_handler))
        .route("/messages", get(pages::page_handler))
        .route("/profile", get(pages::page_handler))
        .route("/onboarding", get(pages::page_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/my-books", get(shelves::my_books_handler))
        .route("/api/shelf", post(shelves::add_to_shelf_handler))
        .route(
            "/api/shelf/{user_book_id}",
            axum::routing::patch(shelves::update_shelf_handler)
                .delete(shelves::delete_shelf_handler),
        )
        .route(
            "/api/shelf/{user_book_id}/progress",
            get(progress::list_progress_handler),
        )
        .route("/api/progress", post(progress::track_progress_handler))
        .route("/api/books/search", get(catalog::search_books_handler))
        .route("/api/books", post(catalog::create_book_handler))
        .route(
            "/api/books/{book_id}/review",
            put(catalog::put_review_handler),
        )
        .route(
            "/api/books/{book_id}/reviews",
            get(catalog::list_reviews_handler),
        )
        .route(
            "/api/profile",
            get(profile::get_profile_handler).patch(profile::update_profile_handler),
        )
        .route("/api/users/search", get(profile::search_users_handler))
        .route(
            "/api/preferences",
            get(profile::get_preferences_handler).put(profile::put_preferences_handler),
        )
        .route("/api/dashboard", get(profile::dashboard_handler))
        .route("/api/friends", get(social::list_friends_handler))
        .route(
            "/api/friends/requests",
            post(social::send_friend_request_handler),
        )
        .route(
            "/api/friends/requests/{request_id}/accept",
            post(social::accept_friend_request_handler),
        )
        .route(
            "/api/friends/requests/{request_id}/decline",
            post(social::decline_friend_request_handler),
        )
        .route("/api/messages", get(social::list_conversations_handler))
        .route(
            "/api/messages/{user_id}",
            get(social::get_conversation_handler).post(social::send_message_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(state)
}
