//! services/api/src/web/catalog.rs
//!
//! Catalog endpoints: external metadata search with in-process genre
//! filter and sort, manual book creation, and per-book reviews.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfmark_core::discover::{filter_by_genre, sort_hits, DiscoverSort};
use shelfmark_core::domain::{validate_rating, AuthUser, BookSearchHit, NewReview, Review};
use shelfmark_core::ports::PortError;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::shelves::{BookDraftDto, BookDto};
use crate::web::state::AppState;

const SEARCH_RESULT_CAP: u32 = 20;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize)]
pub struct BookSearchParams {
    pub q: Option<String>,
    pub genre: Option<String>,
    pub sort: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SearchHitDto {
    pub external_id: Option<String>,
    pub title: String,
    pub authors: Vec<String>,
    pub cover_url: Option<String>,
    pub description: Option<String>,
    pub total_pages: Option<i32>,
    pub published_date: Option<String>,
    pub publisher: Option<String>,
    pub isbn_13: Option<String>,
    pub isbn_10: Option<String>,
    pub categories: Vec<String>,
    pub average_rating: Option<f64>,
}

impl From<BookSearchHit> for SearchHitDto {
    fn from(hit: BookSearchHit) -> Self {
        Self {
            external_id: hit.external_id,
            title: hit.title,
            authors: hit.authors,
            cover_url: hit.cover_url,
            description: hit.description,
            total_pages: hit.total_pages,
            published_date: hit.published_date,
            publisher: hit.publisher,
            isbn_13: hit.isbn_13,
            isbn_10: hit.isbn_10,
            categories: hit.categories,
            average_rating: hit.average_rating,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct BookSearchResponse {
    /// "live" when the external API answered, "fallback" otherwise.
    pub source: String,
    pub items: Vec<SearchHitDto>,
}

#[derive(Deserialize, ToSchema)]
pub struct ReviewRequest {
    pub rating: i16,
    pub content: Option<String>,
    #[serde(default = "default_is_public")]
    pub is_public: bool,
}

fn default_is_public() -> bool {
    true
}

#[derive(Serialize, ToSchema)]
pub struct ReviewDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub user_book_id: Option<Uuid>,
    pub rating: i16,
    pub content: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Review> for ReviewDto {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            user_id: review.user_id,
            book_id: review.book_id,
            user_book_id: review.user_book_id,
            rating: review.rating,
            content: review.content,
            is_public: review.is_public,
            created_at: review.created_at,
            updated_at: review.updated_at,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/books/search?q=&genre=&sort= - Search external book metadata
///
/// Genre filtering and sorting run in-process over whatever the catalog
/// returned, so live and fallback results behave identically.
#[utoipa::path(
    get,
    path = "/api/books/search",
    params(
        ("q" = String, Query, description = "Free-text query"),
        ("genre" = Option<String>, Query, description = "Category substring filter"),
        ("sort" = Option<String>, Query, description = "relevance | rating | newest | oldest")
    ),
    responses(
        (status = 200, description = "Search hits with their source", body = BookSearchResponse),
        (status = 400, description = "Empty query or unknown sort")
    ),
    tag = "catalog"
)]
pub async fn search_books_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BookSearchParams>,
) -> Result<Json<BookSearchResponse>, ApiError> {
    let query = params.q.unwrap_or_default();
    let query = query.trim();
    if query.is_empty() {
        return Err(PortError::Invalid("Search query cannot be empty".to_string()).into());
    }
    let sort = match params.sort.as_deref() {
        Some(raw) => DiscoverSort::parse(raw)?,
        None => DiscoverSort::default(),
    };

    let outcome = state.books.search(query, SEARCH_RESULT_CAP).await?;
    let mut hits = filter_by_genre(outcome.hits, params.genre.as_deref().map(str::trim));
    sort_hits(&mut hits, sort);

    Ok(Json(BookSearchResponse {
        source: outcome.source.as_str().to_string(),
        items: hits.into_iter().map(SearchHitDto::from).collect(),
    }))
}

/// POST /api/books - Create a catalog row from a draft
#[utoipa::path(
    post,
    path = "/api/books",
    request_body = BookDraftDto,
    responses(
        (status = 201, description = "The catalog row (existing or new)", body = BookDto),
        (status = 400, description = "Invalid draft")
    ),
    tag = "catalog"
)]
pub async fn create_book_handler(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<BookDraftDto>,
) -> Result<impl IntoResponse, ApiError> {
    let new_book = draft.into_domain().normalize()?;
    let book = state.db.find_or_create_book(&new_book).await?;
    Ok((StatusCode::CREATED, Json(BookDto::from(book))))
}

/// PUT /api/books/{book_id}/review - Upsert the caller's review
#[utoipa::path(
    put,
    path = "/api/books/{book_id}/review",
    params(("book_id" = Uuid, Path, description = "Catalog book id")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "The saved review", body = ReviewDto),
        (status = 400, description = "Rating out of range"),
        (status = 404, description = "Unknown book")
    ),
    tag = "catalog"
)]
pub async fn put_review_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(book_id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<ReviewDto>, ApiError> {
    validate_rating(req.rating)?;
    let book = state.db.get_book(book_id).await?;

    // Link the review to the caller's shelf entry when there is one
    let user_book_id = state
        .db
        .find_shelf_entry_by_book(user.id, book.id)
        .await?
        .map(|entry| entry.id);

    let review = state
        .db
        .upsert_review(&NewReview {
            user_id: user.id,
            book_id: book.id,
            user_book_id,
            rating: req.rating,
            content: req.content,
            is_public: req.is_public,
        })
        .await?;
    Ok(Json(ReviewDto::from(review)))
}

/// GET /api/books/{book_id}/reviews - Public reviews plus the caller's own
#[utoipa::path(
    get,
    path = "/api/books/{book_id}/reviews",
    params(("book_id" = Uuid, Path, description = "Catalog book id")),
    responses(
        (status = 200, description = "Reviews, newest first", body = [ReviewDto]),
        (status = 404, description = "Unknown book")
    ),
    tag = "catalog"
)]
pub async fn list_reviews_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(book_id): Path<Uuid>,
) -> Result<Json<Vec<ReviewDto>>, ApiError> {
    let book = state.db.get_book(book_id).await?;
    let reviews = state
        .db
        .list_reviews_for_book(book.id, Some(user.id))
        .await?;
    Ok(Json(reviews.into_iter().map(ReviewDto::from).collect()))
}
