//! services/api/src/web/profile.rs
//!
//! Profile, preferences, reader search, and the dashboard assembly.

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shelfmark_core::domain::{
    goal_progress_percent, username_from_email, AuthUser, NewProfile, PreferencesUpdate, Profile,
    ProfilePatch, UserPreferences,
};
use shelfmark_core::ports::PortError;
use shelfmark_core::shelf::partition_shelves;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::shelves::ShelfEntryDto;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct ProfileDto {
    pub id: Uuid,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub books_read: i32,
    pub pages_read: i64,
    pub reading_time: i64,
    pub current_streak: i32,
    pub last_activity_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Profile> for ProfileDto {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            username: profile.username,
            full_name: profile.full_name,
            bio: profile.bio,
            avatar_url: profile.avatar_url,
            books_read: profile.books_read,
            pages_read: profile.pages_read,
            reading_time: profile.reading_time,
            current_streak: profile.current_streak,
            last_activity_date: profile.last_activity_date,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PreferencesDto {
    pub id: Uuid,
    pub favorite_genres: Vec<String>,
    pub books_read_count: Option<String>,
    pub pages_per_day: i32,
    pub yearly_goal: i32,
    pub onboarding_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserPreferences> for PreferencesDto {
    fn from(prefs: UserPreferences) -> Self {
        Self {
            id: prefs.id,
            favorite_genres: prefs.favorite_genres,
            books_read_count: prefs.books_read_count,
            pages_per_day: prefs.pages_per_day,
            yearly_goal: prefs.yearly_goal,
            onboarding_completed: prefs.onboarding_completed,
            created_at: prefs.created_at,
            updated_at: prefs.updated_at,
        }
    }
}

fn default_pages_per_day() -> i32 {
    20
}

fn default_yearly_goal() -> i32 {
    12
}

#[derive(Deserialize, ToSchema)]
pub struct UpdatePreferencesRequest {
    #[serde(default)]
    pub favorite_genres: Vec<String>,
    pub books_read_count: Option<String>,
    #[serde(default = "default_pages_per_day")]
    pub pages_per_day: i32,
    #[serde(default = "default_yearly_goal")]
    pub yearly_goal: i32,
}

#[derive(Deserialize)]
pub struct UserSearchParams {
    pub q: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct DashboardStats {
    pub books_read: i32,
    pub pages_read: i64,
    pub reading_time: i64,
    pub current_streak: i32,
}

#[derive(Serialize, ToSchema)]
pub struct GoalsDto {
    pub yearly_goal: i32,
    pub completed_this_year: i64,
    pub progress_percent: u8,
    pub pages_per_day: i32,
}

#[derive(Serialize, ToSchema)]
pub struct DashboardResponse {
    pub profile: ProfileDto,
    pub stats: DashboardStats,
    pub goals: GoalsDto,
    pub recently_completed: Vec<ShelfEntryDto>,
}

//=========================================================================================
// Shared Helper
//=========================================================================================

/// Loads the user's profile, creating the default one first if signup's
/// bootstrap never ran for this account.
pub(crate) async fn load_or_bootstrap_profile(
    state: &Arc<AppState>,
    user: &AuthUser,
) -> Result<Profile, ApiError> {
    match state.db.get_profile(user.id).await {
        Ok(profile) => Ok(profile),
        Err(PortError::NotFound(_)) => {
            let bootstrap = NewProfile {
                id: user.id,
                username: Some(username_from_email(&user.email)),
                full_name: None,
            };
            state.db.create_profile_if_absent(&bootstrap).await?;
            Ok(state.db.get_profile(user.id).await?)
        }
        Err(e) => Err(e.into()),
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/profile - The current user's profile
#[utoipa::path(
    get,
    path = "/api/profile",
    responses(
        (status = 200, description = "The profile", body = ProfileDto),
        (status = 401, description = "Not authenticated")
    ),
    tag = "profile"
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ProfileDto>, ApiError> {
    let profile = load_or_bootstrap_profile(&state, &user).await?;
    Ok(Json(ProfileDto::from(profile)))
}

/// PATCH /api/profile - Update display fields
#[utoipa::path(
    patch,
    path = "/api/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = ProfileDto),
        (status = 400, description = "Invalid patch")
    ),
    tag = "profile"
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileDto>, ApiError> {
    // Make sure there is a row to patch
    load_or_bootstrap_profile(&state, &user).await?;

    let username = match req.username {
        Some(raw) => {
            let trimmed = raw.trim().to_string();
            if trimmed.is_empty() {
                return Err(PortError::Invalid("Username cannot be empty".to_string()).into());
            }
            Some(trimmed)
        }
        None => None,
    };
    let patch = ProfilePatch {
        username,
        full_name: req.full_name,
        bio: req.bio,
        avatar_url: req.avatar_url,
    };
    let updated = state.db.update_profile(user.id, &patch).await?;
    Ok(Json(ProfileDto::from(updated)))
}

/// GET /api/users/search?q= - Find readers by username or name
#[utoipa::path(
    get,
    path = "/api/users/search",
    params(("q" = String, Query, description = "Substring of username or full name")),
    responses(
        (status = 200, description = "Matching profiles", body = [ProfileDto]),
        (status = 400, description = "Empty query")
    ),
    tag = "profile"
)]
pub async fn search_users_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<UserSearchParams>,
) -> Result<Json<Vec<ProfileDto>>, ApiError> {
    let query = params.q.unwrap_or_default();
    let query = query.trim();
    if query.is_empty() {
        return Err(PortError::Invalid("Search query cannot be empty".to_string()).into());
    }
    let profiles = state.db.search_profiles(query, user.id, 20).await?;
    Ok(Json(profiles.into_iter().map(ProfileDto::from).collect()))
}

/// GET /api/preferences - Onboarding answers, if any
#[utoipa::path(
    get,
    path = "/api/preferences",
    responses(
        (status = 200, description = "Preferences, or null before onboarding")
    ),
    tag = "profile"
)]
pub async fn get_preferences_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Option<PreferencesDto>>, ApiError> {
    let prefs = state.db.get_preferences(user.id).await?;
    Ok(Json(prefs.map(PreferencesDto::from)))
}

/// PUT /api/preferences - Save onboarding answers
///
/// Always marks onboarding as completed; saving again overwrites.
#[utoipa::path(
    put,
    path = "/api/preferences",
    request_body = UpdatePreferencesRequest,
    responses(
        (status = 200, description = "Saved preferences", body = PreferencesDto),
        (status = 400, description = "Invalid goals")
    ),
    tag = "profile"
)]
pub async fn put_preferences_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<UpdatePreferencesRequest>,
) -> Result<Json<PreferencesDto>, ApiError> {
    if req.pages_per_day <= 0 {
        return Err(PortError::Invalid("pages_per_day must be positive".to_string()).into());
    }
    if req.yearly_goal <= 0 {
        return Err(PortError::Invalid("yearly_goal must be positive".to_string()).into());
    }
    let update = PreferencesUpdate {
        favorite_genres: req.favorite_genres,
        books_read_count: req.books_read_count,
        pages_per_day: req.pages_per_day,
        yearly_goal: req.yearly_goal,
        onboarding_completed: true,
    };
    let saved = state.db.upsert_preferences(user.id, &update).await?;
    Ok(Json(PreferencesDto::from(saved)))
}

/// GET /api/dashboard - Stat cards, goal progress, and recent finishes
#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Dashboard data", body = DashboardResponse)
    ),
    tag = "profile"
)]
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let profile = load_or_bootstrap_profile(&state, &user).await?;
    let prefs = state.db.get_preferences(user.id).await?;
    let entries = state.db.list_shelf(user.id).await?;
    let partition = partition_shelves(entries);

    let year = Utc::now().date_naive().year();
    let completed_this_year = partition
        .completed_books
        .iter()
        .filter(|shelf| {
            shelf
                .entry
                .finish_date
                .map(|date| date.year() == year)
                .unwrap_or(false)
        })
        .count() as i64;

    let yearly_goal = prefs
        .as_ref()
        .map(|p| p.yearly_goal)
        .unwrap_or_else(default_yearly_goal);
    let pages_per_day = prefs
        .as_ref()
        .map(|p| p.pages_per_day)
        .unwrap_or_else(default_pages_per_day);

    let mut recent = partition.completed_books;
    recent.sort_by(|a, b| b.entry.finish_date.cmp(&a.entry.finish_date));
    recent.truncate(5);

    Ok(Json(DashboardResponse {
        stats: DashboardStats {
            books_read: profile.books_read,
            pages_read: profile.pages_read,
            reading_time: profile.reading_time,
            current_streak: profile.current_streak,
        },
        goals: GoalsDto {
            yearly_goal,
            completed_this_year,
            progress_percent: goal_progress_percent(completed_this_year, yearly_goal as i64),
            pages_per_day,
        },
        recently_completed: recent.into_iter().map(ShelfEntryDto::from).collect(),
        profile: ProfileDto::from(profile),
    }))
}
