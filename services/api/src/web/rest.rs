//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification. Handlers live in
//! their feature modules; this collects every annotated path and schema.

use utoipa::OpenApi;

use crate::web::{auth, catalog, profile, progress, shelves, social};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::session_handler,
        shelves::my_books_handler,
        shelves::add_to_shelf_handler,
        shelves::update_shelf_handler,
        shelves::delete_shelf_handler,
        progress::track_progress_handler,
        progress::list_progress_handler,
        catalog::search_books_handler,
        catalog::create_book_handler,
        catalog::put_review_handler,
        catalog::list_reviews_handler,
        profile::get_profile_handler,
        profile::update_profile_handler,
        profile::search_users_handler,
        profile::get_preferences_handler,
        profile::put_preferences_handler,
        profile::dashboard_handler,
        social::list_friends_handler,
        social::send_friend_request_handler,
        social::accept_friend_request_handler,
        social::decline_friend_request_handler,
        social::list_conversations_handler,
        social::get_conversation_handler,
        social::send_message_handler,
    ),
    components(schemas(
        auth::SignupRequest,
        auth::LoginRequest,
        auth::AuthResponse,
        shelves::MyBooksResponse,
        shelves::ShelfEntryDto,
        shelves::BookDto,
        shelves::BookDraftDto,
        shelves::BookRef,
        shelves::AddToShelfRequest,
        shelves::UpdateShelfRequest,
        progress::TrackRequest,
        progress::TrackActionDto,
        progress::TrackResponse,
        progress::ProgressUpdateDto,
        catalog::BookSearchResponse,
        catalog::SearchHitDto,
        catalog::ReviewRequest,
        catalog::ReviewDto,
        profile::ProfileDto,
        profile::UpdateProfileRequest,
        profile::PreferencesDto,
        profile::UpdatePreferencesRequest,
        profile::DashboardResponse,
        profile::DashboardStats,
        profile::GoalsDto,
        social::FriendsResponse,
        social::FriendDto,
        social::FriendRequestDto,
        social::FriendRequestBody,
        social::FriendshipDto,
        social::MessageDto,
        social::ConversationDto,
        social::SendMessageBody,
    )),
    tags(
        (name = "auth", description = "Account signup, login, and session lifecycle."),
        (name = "shelves", description = "The user's shelves and per-entry CRUD."),
        (name = "progress", description = "Reading sittings and the per-entry log."),
        (name = "catalog", description = "Book metadata search and reviews."),
        (name = "profile", description = "Profiles, preferences, and the dashboard."),
        (name = "social", description = "Friends and direct messages.")
    )
)]
pub struct ApiDoc;
