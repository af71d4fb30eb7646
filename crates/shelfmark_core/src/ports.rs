//! crates/shelfmark_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

use crate::domain::{
    AuthSession, AuthUser, Book, BookStatus, ConversationSummary, FriendEntry, FriendRequest,
    Friendship, Message, NewBook, NewProfile, NewProgressUpdate, NewReview, PreferencesUpdate,
    Profile, ProfilePatch, ProgressUpdate, Review, SearchOutcome, ShelfEntry, SignUpMetadata,
    StatsDelta, UserBook, UserBookPatch, UserCredentials, UserPreferences,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Identity
//=========================================================================================

/// One event on the identity backend's change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChange {
    SignedIn(AuthSession),
    TokenRefreshed(AuthSession),
    SignedOut,
}

impl AuthChange {
    /// The session carried by the event, if any.
    pub fn session(&self) -> Option<&AuthSession> {
        match self {
            AuthChange::SignedIn(s) | AuthChange::TokenRefreshed(s) => Some(s),
            AuthChange::SignedOut => None,
        }
    }
}

/// The authentication backend as seen from the client side: current
/// session lookup, credential flows, and a change feed. The session
/// store is the only consumer.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// The session for the current context, or `None` when signed out.
    async fn get_session(&self) -> PortResult<Option<AuthSession>>;

    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> PortResult<AuthSession>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
    ) -> PortResult<AuthSession>;

    async fn sign_out(&self) -> PortResult<()>;

    /// Subscribes to session changes. Each subscription gets its own
    /// stream; the backend pushes an event for every sign-in, token
    /// refresh, and sign-out.
    fn on_auth_state_change(&self) -> Pin<Box<dyn Stream<Item = AuthChange> + Send>>;
}

/// Best-effort profile creation after sign-up. Must be idempotent:
/// calling it for an existing profile is a no-op, never an error.
#[async_trait]
pub trait ProfileBootstrap: Send + Sync {
    async fn ensure_profile(&self, profile: &NewProfile) -> PortResult<()>;
}

//=========================================================================================
// Data Store
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth Methods ---
    async fn create_user_with_email(
        &self,
        email: &str,
        password_hash: &str,
    ) -> PortResult<AuthUser>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves a session token to the full session (user plus expiry).
    /// Expired or unknown tokens are `Unauthorized`.
    async fn validate_auth_session(&self, token: &str) -> PortResult<AuthSession>;

    async fn delete_auth_session(&self, token: &str) -> PortResult<()>;

    // --- Profiles ---
    async fn create_profile_if_absent(&self, profile: &NewProfile) -> PortResult<()>;

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Profile>;

    /// Exact-username lookup, used when addressing a friend request.
    async fn get_profile_by_username(&self, username: &str) -> PortResult<Profile>;

    async fn update_profile(&self, user_id: Uuid, patch: &ProfilePatch) -> PortResult<Profile>;

    /// Folds a progress write into the profile's cumulative stats.
    async fn apply_stats_delta(&self, user_id: Uuid, delta: &StatsDelta) -> PortResult<()>;

    /// Username/full-name prefix search for the friends page, excluding
    /// the searching user.
    async fn search_profiles(
        &self,
        query: &str,
        exclude: Uuid,
        limit: i64,
    ) -> PortResult<Vec<Profile>>;

    // --- Books ---
    async fn get_book(&self, book_id: Uuid) -> PortResult<Book>;

    /// Returns the existing catalog row matching the draft's identifiers
    /// (external id, then ISBN-13, then title+author) or inserts a new
    /// one.
    async fn find_or_create_book(&self, draft: &NewBook) -> PortResult<Book>;

    // --- Shelves ---
    async fn list_shelf(&self, user_id: Uuid) -> PortResult<Vec<ShelfEntry>>;

    async fn get_shelf_entry(&self, user_id: Uuid, user_book_id: Uuid) -> PortResult<ShelfEntry>;

    async fn find_shelf_entry_by_book(
        &self,
        user_id: Uuid,
        book_id: Uuid,
    ) -> PortResult<Option<UserBook>>;

    /// Adds a book to the user's shelf, or moves the existing entry to
    /// `status`. At most one entry per (user, book) ever exists.
    async fn add_to_shelf(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        status: BookStatus,
    ) -> PortResult<UserBook>;

    async fn update_shelf_entry(
        &self,
        user_id: Uuid,
        user_book_id: Uuid,
        patch: &UserBookPatch,
    ) -> PortResult<UserBook>;

    async fn remove_from_shelf(&self, user_id: Uuid, user_book_id: Uuid) -> PortResult<()>;

    // --- Progress Log ---
    /// Appends one log entry and stamps the shelf entry's
    /// last_progress_at. The log is append-only; nothing edits or
    /// deletes rows.
    async fn record_progress(&self, update: &NewProgressUpdate) -> PortResult<ProgressUpdate>;

    async fn list_progress_for_entry(
        &self,
        user_id: Uuid,
        user_book_id: Uuid,
    ) -> PortResult<Vec<ProgressUpdate>>;

    // --- Reviews ---
    /// One review per (user, book); a second write replaces rating and
    /// content.
    async fn upsert_review(&self, review: &NewReview) -> PortResult<Review>;

    /// Public reviews for a book, plus the viewer's own regardless of
    /// visibility.
    async fn list_reviews_for_book(
        &self,
        book_id: Uuid,
        viewer: Option<Uuid>,
    ) -> PortResult<Vec<Review>>;

    // --- Preferences ---
    async fn get_preferences(&self, user_id: Uuid) -> PortResult<Option<UserPreferences>>;

    async fn upsert_preferences(
        &self,
        user_id: Uuid,
        update: &PreferencesUpdate,
    ) -> PortResult<UserPreferences>;

    // --- Social ---
    async fn find_friendship(&self, a: Uuid, b: Uuid) -> PortResult<Option<Friendship>>;

    async fn create_friend_request(
        &self,
        requester: Uuid,
        addressee: Uuid,
    ) -> PortResult<Friendship>;

    /// Only the addressee may accept.
    async fn accept_friend_request(
        &self,
        addressee: Uuid,
        friendship_id: Uuid,
    ) -> PortResult<Friendship>;

    /// Declining removes the request entirely so it can be re-sent.
    async fn decline_friend_request(&self, addressee: Uuid, friendship_id: Uuid)
        -> PortResult<()>;

    async fn list_friends(&self, user_id: Uuid) -> PortResult<Vec<FriendEntry>>;

    async fn list_incoming_requests(&self, user_id: Uuid) -> PortResult<Vec<FriendRequest>>;

    // --- Messages ---
    async fn send_message(
        &self,
        sender: Uuid,
        recipient: Uuid,
        body: &str,
    ) -> PortResult<Message>;

    /// Full history between the user and one peer, oldest first.
    async fn list_conversation(&self, user_id: Uuid, peer_id: Uuid) -> PortResult<Vec<Message>>;

    /// Marks the peer's messages to the user as read; returns how many
    /// changed.
    async fn mark_conversation_read(&self, user_id: Uuid, peer_id: Uuid) -> PortResult<u64>;

    async fn list_conversations(&self, user_id: Uuid) -> PortResult<Vec<ConversationSummary>>;
}

//=========================================================================================
// Book Metadata Search
//=========================================================================================

#[async_trait]
pub trait BookSearchService: Send + Sync {
    /// Free-text metadata search against the external catalog.
    /// `max_results` is a hint; implementations may return fewer.
    async fn search(&self, query: &str, max_results: u32) -> PortResult<SearchOutcome>;
}
