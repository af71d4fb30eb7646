//! services/api/src/web/progress.rs
//!
//! Progress tracking: one endpoint that turns a track action into the
//! append-only log entry, the shelf-entry update, and the profile
//! aggregate bump, plus the per-entry log listing.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfmark_core::domain::{
    next_streak, plan_progress, AuthUser, BookStatus, NewProgressUpdate, ProgressUpdate,
    ShelfEntry, StatsDelta, TrackAction, UserBookPatch,
};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::profile::load_or_bootstrap_profile;
use crate::web::shelves::ShelfEntryDto;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// What the user did in this sitting.
#[derive(Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackActionDto {
    /// New absolute position in the book.
    Pages { current_page: i32 },
    /// Minutes spent reading.
    Minutes { minutes: i32 },
    /// Mark the book finished.
    Completed,
}

impl TrackActionDto {
    fn into_domain(self) -> TrackAction {
        match self {
            TrackActionDto::Pages { current_page } => TrackAction::Pages { current_page },
            TrackActionDto::Minutes { minutes } => TrackAction::Minutes { minutes },
            TrackActionDto::Completed => TrackAction::Completed,
        }
    }
}

fn default_is_public() -> bool {
    true
}

#[derive(Deserialize, ToSchema)]
pub struct TrackRequest {
    pub user_book_id: Uuid,
    pub action: TrackActionDto,
    pub note: Option<String>,
    #[serde(default = "default_is_public")]
    pub is_public: bool,
}

#[derive(Serialize, ToSchema)]
pub struct ProgressUpdateDto {
    pub id: Uuid,
    pub user_book_id: Uuid,
    pub user_id: Uuid,
    pub pages_read: Option<i32>,
    pub minutes: Option<i32>,
    pub note: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ProgressUpdate> for ProgressUpdateDto {
    fn from(update: ProgressUpdate) -> Self {
        Self {
            id: update.id,
            user_book_id: update.user_book_id,
            user_id: update.user_id,
            pages_read: update.pages_read,
            minutes: update.minutes,
            note: update.note,
            is_public: update.is_public,
            created_at: update.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TrackResponse {
    pub entry: ShelfEntryDto,
    pub update: ProgressUpdateDto,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/progress - Log one reading sitting
///
/// Validation runs before any write, so a rejected action leaves the log,
/// the shelf entry, and the profile aggregates untouched.
#[utoipa::path(
    post,
    path = "/api/progress",
    request_body = TrackRequest,
    responses(
        (status = 201, description = "Progress recorded", body = TrackResponse),
        (status = 400, description = "Invalid action"),
        (status = 404, description = "No such shelf entry for this user")
    ),
    tag = "progress"
)]
pub async fn track_progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<TrackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Load the entry and plan the whole effect up front
    let shelf = state.db.get_shelf_entry(user.id, req.user_book_id).await?;
    let plan = plan_progress(
        &shelf.entry,
        shelf.book.total_pages,
        req.action.into_domain(),
    )?;

    // 2. Append to the log (also stamps last_progress_at on the entry)
    let logged = state
        .db
        .record_progress(&NewProgressUpdate {
            user_book_id: shelf.entry.id,
            user_id: user.id,
            pages_read: (plan.minutes == 0).then_some(plan.pages_delta),
            minutes: (plan.minutes > 0).then_some(plan.minutes),
            note: req.note,
            is_public: req.is_public,
        })
        .await?;

    // 3. Update the shelf entry
    let today = Utc::now().date_naive();
    let mut patch = UserBookPatch {
        current_page: plan.new_current_page,
        ..UserBookPatch::default()
    };
    if plan.mark_completed {
        patch.status = Some(BookStatus::Completed);
        if shelf.entry.finish_date.is_none() {
            patch.finish_date = Some(today);
        }
    } else if matches!(
        shelf.entry.status,
        BookStatus::WantToRead | BookStatus::OnHold
    ) {
        // Tracking on a parked entry moves it onto the reading shelf
        patch.status = Some(BookStatus::Reading);
        if shelf.entry.start_date.is_none() {
            patch.start_date = Some(today);
        }
    }
    let updated = state
        .db
        .update_shelf_entry(user.id, shelf.entry.id, &patch)
        .await?;

    // 4. Bump the profile aggregates and the streak
    let profile = load_or_bootstrap_profile(&state, &user).await?;
    let newly_completed = plan.mark_completed && shelf.entry.status != BookStatus::Completed;
    let delta = StatsDelta {
        pages: plan.pages_delta as i64,
        minutes: plan.minutes as i64,
        books: if newly_completed { 1 } else { 0 },
        streak: Some(next_streak(
            profile.current_streak,
            profile.last_activity_date,
            today,
        )),
    };
    state.db.apply_stats_delta(user.id, &delta).await?;

    Ok((
        StatusCode::CREATED,
        Json(TrackResponse {
            entry: ShelfEntryDto::from(ShelfEntry {
                entry: updated,
                book: shelf.book,
            }),
            update: ProgressUpdateDto::from(logged),
        }),
    ))
}

/// GET /api/shelf/{user_book_id}/progress - The entry's append-only log
#[utoipa::path(
    get,
    path = "/api/shelf/{user_book_id}/progress",
    params(("user_book_id" = Uuid, Path, description = "Shelf entry id")),
    responses(
        (status = 200, description = "Logged sittings, newest first", body = [ProgressUpdateDto]),
        (status = 404, description = "No such entry for this user")
    ),
    tag = "progress"
)]
pub async fn list_progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(user_book_id): Path<Uuid>,
) -> Result<Json<Vec<ProgressUpdateDto>>, ApiError> {
    // Resolve the entry first so unknown ids are a 404, not an empty list
    state.db.get_shelf_entry(user.id, user_book_id).await?;
    let updates = state
        .db
        .list_progress_for_entry(user.id, user_book_id)
        .await?;
    Ok(Json(
        updates.into_iter().map(ProgressUpdateDto::from).collect(),
    ))
}
