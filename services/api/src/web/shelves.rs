//! services/api/src/web/shelves.rs
//!
//! Shelf endpoints: the partitioned my-books view and the per-entry CRUD.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shelfmark_core::domain::{
    clamp_current_page, validate_rating, AuthUser, Book, BookDraft, BookStatus, ShelfEntry,
    UserBookPatch,
};
use shelfmark_core::shelf::{partition_shelves, progress_percent};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct BookDto {
    pub id: Uuid,
    pub google_books_id: Option<String>,
    pub title: String,
    pub author: String,
    pub cover_url: Option<String>,
    pub description: Option<String>,
    pub total_pages: Option<i32>,
    pub published_date: Option<String>,
    pub publisher: Option<String>,
    pub isbn_13: Option<String>,
    pub isbn_10: Option<String>,
    pub genre: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Book> for BookDto {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            google_books_id: book.google_books_id,
            title: book.title,
            author: book.author,
            cover_url: book.cover_url,
            description: book.description,
            total_pages: book.total_pages,
            published_date: book.published_date,
            publisher: book.publisher,
            isbn_13: book.isbn_13,
            isbn_10: book.isbn_10,
            genre: book.genre,
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

/// One shelf entry joined with its book, as served by the my-books view.
#[derive(Serialize, ToSchema)]
pub struct ShelfEntryDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub current_page: Option<i32>,
    pub rating: Option<i16>,
    pub start_date: Option<NaiveDate>,
    pub finish_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub added_to_shelf_at: DateTime<Utc>,
    pub last_progress_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    /// Percent read, when the book's page count is known.
    pub progress: Option<u8>,
    pub books: BookDto,
}

impl From<ShelfEntry> for ShelfEntryDto {
    fn from(shelf: ShelfEntry) -> Self {
        let progress = progress_percent(shelf.entry.current_page, shelf.book.total_pages);
        Self {
            id: shelf.entry.id,
            user_id: shelf.entry.user_id,
            status: shelf.entry.status.as_str().to_string(),
            current_page: shelf.entry.current_page,
            rating: shelf.entry.rating,
            start_date: shelf.entry.start_date,
            finish_date: shelf.entry.finish_date,
            notes: shelf.entry.notes,
            added_to_shelf_at: shelf.entry.added_to_shelf_at,
            last_progress_at: shelf.entry.last_progress_at,
            updated_at: shelf.entry.updated_at,
            progress,
            books: BookDto::from(shelf.book),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MyBooksResponse {
    pub currently_reading: Vec<ShelfEntryDto>,
    pub reading_list: Vec<ShelfEntryDto>,
    pub completed_books: Vec<ShelfEntryDto>,
}

/// A book draft as submitted by a client, tagged by where it came from.
#[derive(Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BookDraftDto {
    SearchResult {
        external_id: Option<String>,
        title: String,
        #[serde(default)]
        authors: Vec<String>,
        cover_url: Option<String>,
        description: Option<String>,
        total_pages: Option<i32>,
        published_date: Option<String>,
        publisher: Option<String>,
        isbn_13: Option<String>,
        isbn_10: Option<String>,
        #[serde(default)]
        categories: Vec<String>,
    },
    ManualEntry {
        title: String,
        author: String,
        total_pages: Option<i32>,
        isbn: Option<String>,
        genre: Option<String>,
    },
}

impl BookDraftDto {
    pub fn into_domain(self) -> BookDraft {
        match self {
            BookDraftDto::SearchResult {
                external_id,
                title,
                authors,
                cover_url,
                description,
                total_pages,
                published_date,
                publisher,
                isbn_13,
                isbn_10,
                categories,
            } => BookDraft::SearchResult {
                external_id,
                title,
                authors,
                cover_url,
                description,
                total_pages,
                published_date,
                publisher,
                isbn_13,
                isbn_10,
                categories,
            },
            BookDraftDto::ManualEntry {
                title,
                author,
                total_pages,
                isbn,
                genre,
            } => BookDraft::ManualEntry {
                title,
                author,
                total_pages,
                isbn,
                genre,
            },
        }
    }
}

/// Either an existing catalog row or a draft to get-or-create.
#[derive(Deserialize, ToSchema)]
#[serde(untagged)]
pub enum BookRef {
    Existing { book_id: Uuid },
    Draft(BookDraftDto),
}

#[derive(Deserialize, ToSchema)]
pub struct AddToShelfRequest {
    pub book: BookRef,
    /// Defaults to `want_to_read`.
    pub status: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateShelfRequest {
    pub status: Option<String>,
    pub current_page: Option<i32>,
    pub rating: Option<i16>,
    pub notes: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub finish_date: Option<NaiveDate>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/my-books - The current user's shelves, partitioned by status
///
/// Entries carry their book record and computed progress percent, ordered
/// by most recent progress first (never-tracked entries last). On-hold and
/// dropped entries are not part of this view.
#[utoipa::path(
    get,
    path = "/api/my-books",
    responses(
        (status = 200, description = "Shelves partitioned by status", body = MyBooksResponse),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Upstream failure")
    ),
    tag = "shelves"
)]
pub async fn my_books_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MyBooksResponse>, ApiError> {
    let entries = state.db.list_shelf(user.id).await?;
    let partition = partition_shelves(entries);
    Ok(Json(MyBooksResponse {
        currently_reading: partition
            .currently_reading
            .into_iter()
            .map(ShelfEntryDto::from)
            .collect(),
        reading_list: partition
            .reading_list
            .into_iter()
            .map(ShelfEntryDto::from)
            .collect(),
        completed_books: partition
            .completed_books
            .into_iter()
            .map(ShelfEntryDto::from)
            .collect(),
    }))
}

/// POST /api/shelf - Add a book to the current user's shelf
#[utoipa::path(
    post,
    path = "/api/shelf",
    request_body = AddToShelfRequest,
    responses(
        (status = 201, description = "Shelf entry created or updated", body = ShelfEntryDto),
        (status = 400, description = "Invalid draft or status"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "shelves"
)]
pub async fn add_to_shelf_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<AddToShelfRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Resolve the target status
    let status = match req.status.as_deref() {
        Some(raw) => BookStatus::parse(raw)?,
        None => BookStatus::WantToRead,
    };

    // 2. Resolve the book: existing row, or get-or-create from the draft
    let book = match req.book {
        BookRef::Existing { book_id } => state.db.get_book(book_id).await?,
        BookRef::Draft(dto) => {
            let draft = dto.into_domain().normalize()?;
            state.db.find_or_create_book(&draft).await?
        }
    };

    // 3. Upsert the shelf entry
    let entry = state.db.add_to_shelf(user.id, book.id, status).await?;

    Ok((
        StatusCode::CREATED,
        Json(ShelfEntryDto::from(ShelfEntry { entry, book })),
    ))
}

/// PATCH /api/shelf/{user_book_id} - Update one shelf entry
#[utoipa::path(
    patch,
    path = "/api/shelf/{user_book_id}",
    params(("user_book_id" = Uuid, Path, description = "Shelf entry id")),
    request_body = UpdateShelfRequest,
    responses(
        (status = 200, description = "Updated entry", body = ShelfEntryDto),
        (status = 400, description = "Invalid patch"),
        (status = 404, description = "No such entry for this user")
    ),
    tag = "shelves"
)]
pub async fn update_shelf_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(user_book_id): Path<Uuid>,
    Json(req): Json<UpdateShelfRequest>,
) -> Result<Json<ShelfEntryDto>, ApiError> {
    // 1. Load the entry and its book to validate against
    let shelf = state.db.get_shelf_entry(user.id, user_book_id).await?;

    // 2. Validate and assemble the patch
    let mut patch = UserBookPatch {
        notes: req.notes,
        start_date: req.start_date,
        finish_date: req.finish_date,
        ..UserBookPatch::default()
    };
    if let Some(raw) = req.status.as_deref() {
        patch.status = Some(BookStatus::parse(raw)?);
    }
    if let Some(rating) = req.rating {
        validate_rating(rating)?;
        patch.rating = Some(rating);
    }
    if let Some(page) = req.current_page {
        patch.current_page = Some(clamp_current_page(page, shelf.book.total_pages));
    }
    // Completing a book always lands it with a finish date
    if patch.status == Some(BookStatus::Completed)
        && patch.finish_date.is_none()
        && shelf.entry.finish_date.is_none()
    {
        patch.finish_date = Some(Utc::now().date_naive());
    }

    // 3. Apply and return the fresh entry
    let updated = state
        .db
        .update_shelf_entry(user.id, user_book_id, &patch)
        .await?;
    Ok(Json(ShelfEntryDto::from(ShelfEntry {
        entry: updated,
        book: shelf.book,
    })))
}

/// DELETE /api/shelf/{user_book_id} - Remove a book from the shelf
#[utoipa::path(
    delete,
    path = "/api/shelf/{user_book_id}",
    params(("user_book_id" = Uuid, Path, description = "Shelf entry id")),
    responses(
        (status = 204, description = "Entry removed"),
        (status = 404, description = "No such entry for this user")
    ),
    tag = "shelves"
)]
pub async fn delete_shelf_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(user_book_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.db.remove_from_shelf(user.id, user_book_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
