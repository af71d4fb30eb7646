//! crates/shelfmark_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::ports::PortError;

/// Exact message for the local password rule. Sign-up rejects short
/// passwords before any identity or network call is made.
pub const PASSWORD_TOO_SHORT: &str = "Password must be at least 8 characters long";

pub const MIN_PASSWORD_LEN: usize = 8;

// --- Identity ---

/// The identity-provider view of a user. Carries at minimum id and email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub password_hash: String,
}

/// An authenticated identity plus the opaque token that proves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub user: AuthUser,
    pub expires_at: DateTime<Utc>,
}

/// Extra fields supplied at sign-up alongside the credentials.
#[derive(Debug, Clone, Default)]
pub struct SignUpMetadata {
    pub full_name: Option<String>,
}

// --- Profiles ---

/// One per user, keyed by the identity id. Cumulative stats are owned by
/// the server and recomputed on progress writes, never trusted from
/// clients.
#[derive(Debug, Clone)]
pub struct Profile {
    pub id: Uuid,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub books_read: i32,
    pub pages_read: i64,
    /// Total tracked reading time, in minutes.
    pub reading_time: i64,
    pub current_streak: i32,
    /// Day of the most recent progress write; drives streak updates.
    pub last_activity_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProfile {
    pub id: Uuid,
    pub username: Option<String>,
    pub full_name: Option<String>,
}

/// Owner-editable profile fields. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

/// Aggregate adjustments applied alongside a progress write.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsDelta {
    pub pages: i64,
    pub minutes: i64,
    pub books: i32,
    pub streak: Option<i32>,
}

// --- Books ---

/// Canonical catalog entry, shared between users. Created on first
/// reference; edits are rare and last-writer-wins.
#[derive(Debug, Clone)]
pub struct Book {
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

/// A canonical book draft, ready for persistence. Both search results and
/// manual entries normalize into this one shape before any insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
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
}

/// Where a to-be-persisted book came from. The two arms carry exactly the
/// fields their flow can know; `normalize` folds both into [`NewBook`].
#[derive(Debug, Clone)]
pub enum BookDraft {
    /// Picked from the external metadata search.
    SearchResult {
        external_id: Option<String>,
        title: String,
        authors: Vec<String>,
        cover_url: Option<String>,
        description: Option<String>,
        total_pages: Option<i32>,
        published_date: Option<String>,
        publisher: Option<String>,
        isbn_13: Option<String>,
        isbn_10: Option<String>,
        categories: Vec<String>,
    },
    /// Typed in by hand on the track page.
    ManualEntry {
        title: String,
        author: String,
        total_pages: Option<i32>,
        isbn: Option<String>,
        genre: Option<String>,
    },
}

impl BookDraft {
    /// Folds either arm into the canonical draft shape. Search results
    /// join the author list with ", " and take the first category as the
    /// genre; manual ISBNs land in `isbn_13` or `isbn_10` by length.
    pub fn normalize(self) -> Result<NewBook, PortError> {
        match self {
            BookDraft::SearchResult {
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
            } => {
                let title = non_empty(title, "title")?;
                let author = if authors.is_empty() {
                    "Unknown".to_string()
                } else {
                    authors.join(", ")
                };
                Ok(NewBook {
                    google_books_id: external_id,
                    title,
                    author,
                    cover_url,
                    description,
                    total_pages: positive_or_none(total_pages),
                    published_date,
                    publisher,
                    isbn_13,
                    isbn_10,
                    genre: categories.into_iter().next(),
                })
            }
            BookDraft::ManualEntry {
                title,
                author,
                total_pages,
                isbn,
                genre,
            } => {
                let title = non_empty(title, "title")?;
                let author = non_empty(author, "author")?;
                let digits: Option<String> =
                    isbn.map(|raw| raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect());
                let (isbn_13, isbn_10) = match digits {
                    Some(d) if d.len() == 13 => (Some(d), None),
                    Some(d) if d.len() == 10 => (None, Some(d)),
                    _ => (None, None),
                };
                Ok(NewBook {
                    google_books_id: None,
                    title,
                    author,
                    cover_url: None,
                    description: None,
                    total_pages: positive_or_none(total_pages),
                    published_date: None,
                    publisher: None,
                    isbn_13,
                    isbn_10,
                    genre,
                })
            }
        }
    }
}

/// One item from the external metadata search, before normalization.
/// `average_rating` is shown and sorted on but never persisted.
#[derive(Debug, Clone)]
pub struct BookSearchHit {
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

impl BookSearchHit {
    pub fn into_draft(self) -> BookDraft {
        BookDraft::SearchResult {
            external_id: self.external_id,
            title: self.title,
            authors: self.authors,
            cover_url: self.cover_url,
            description: self.description,
            total_pages: self.total_pages,
            published_date: self.published_date,
            publisher: self.publisher,
            isbn_13: self.isbn_13,
            isbn_10: self.isbn_10,
            categories: self.categories,
        }
    }
}

/// Whether search hits came from the live API or the built-in fallback
/// set used when no API key is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSource {
    Live,
    Fallback,
}

impl SearchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchSource::Live => "live",
            SearchSource::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub source: SearchSource,
    pub hits: Vec<BookSearchHit>,
}

// --- Shelves ---

/// Shelf slot for a UserBook. Transitions freely among the five values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookStatus {
    WantToRead,
    Reading,
    Completed,
    OnHold,
    Dropped,
}

impl BookStatus {
    pub const ALL: [BookStatus; 5] = [
        BookStatus::WantToRead,
        BookStatus::Reading,
        BookStatus::Completed,
        BookStatus::OnHold,
        BookStatus::Dropped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::WantToRead => "want_to_read",
            BookStatus::Reading => "reading",
            BookStatus::Completed => "completed",
            BookStatus::OnHold => "on_hold",
            BookStatus::Dropped => "dropped",
        }
    }

    pub fn parse(value: &str) -> Result<Self, PortError> {
        match value {
            "want_to_read" => Ok(BookStatus::WantToRead),
            "reading" => Ok(BookStatus::Reading),
            "completed" => Ok(BookStatus::Completed),
            "on_hold" => Ok(BookStatus::OnHold),
            "dropped" => Ok(BookStatus::Dropped),
            other => Err(PortError::Invalid(format!("unknown book status '{other}'"))),
        }
    }
}

impl std::str::FromStr for BookStatus {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookStatus::parse(s)
    }
}

/// A user's shelf entry: the (user, book) join row. Exactly one exists
/// per pair.
#[derive(Debug, Clone)]
pub struct UserBook {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub status: BookStatus,
    pub current_page: Option<i32>,
    pub rating: Option<i16>,
    pub start_date: Option<NaiveDate>,
    pub finish_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub added_to_shelf_at: DateTime<Utc>,
    pub last_progress_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// A shelf entry joined with its catalog record, the unit every shelf
/// read returns.
#[derive(Debug, Clone)]
pub struct ShelfEntry {
    pub entry: UserBook,
    pub book: Book,
}

/// Owner-supplied changes to a shelf entry. `None` leaves the field
/// untouched; rating and current_page are validated before persisting.
#[derive(Debug, Clone, Default)]
pub struct UserBookPatch {
    pub status: Option<BookStatus>,
    pub current_page: Option<i32>,
    pub rating: Option<i16>,
    pub notes: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub finish_date: Option<NaiveDate>,
}

// --- Progress log ---

/// Append-only log entry for one tracked sitting: pages read in that
/// sitting or minutes spent.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub id: Uuid,
    pub user_book_id: Uuid,
    pub user_id: Uuid,
    pub pages_read: Option<i32>,
    pub minutes: Option<i32>,
    pub note: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProgressUpdate {
    pub user_book_id: Uuid,
    pub user_id: Uuid,
    pub pages_read: Option<i32>,
    pub minutes: Option<i32>,
    pub note: Option<String>,
    pub is_public: bool,
}

/// What the user chose to track on the track page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackAction {
    /// New absolute position in the book.
    Pages { current_page: i32 },
    /// Minutes spent in this sitting.
    Minutes { minutes: i32 },
    /// Mark the book finished.
    Completed,
}

/// The planned effect of one track action against the current shelf
/// entry, computed before any write so failures leave no partial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackPlan {
    pub new_current_page: Option<i32>,
    /// Pages read in this sitting (non-negative delta from the previous
    /// position), recorded in the append-only log.
    pub pages_delta: i32,
    pub minutes: i32,
    pub mark_completed: bool,
}

/// Computes the effect of a track action. Pages are clamped to the book's
/// total; moving backwards records a zero-page sitting rather than a
/// negative one.
pub fn plan_progress(
    entry: &UserBook,
    total_pages: Option<i32>,
    action: TrackAction,
) -> Result<TrackPlan, PortError> {
    match action {
        TrackAction::Pages { current_page } => {
            if current_page < 0 {
                return Err(PortError::Invalid(
                    "current_page must be non-negative".into(),
                ));
            }
            let clamped = clamp_current_page(current_page, total_pages);
            let previous = entry.current_page.unwrap_or(0);
            Ok(TrackPlan {
                new_current_page: Some(clamped),
                pages_delta: (clamped - previous).max(0),
                minutes: 0,
                mark_completed: false,
            })
        }
        TrackAction::Minutes { minutes } => {
            if minutes <= 0 {
                return Err(PortError::Invalid("minutes must be positive".into()));
            }
            Ok(TrackPlan {
                new_current_page: None,
                pages_delta: 0,
                minutes,
                mark_completed: false,
            })
        }
        TrackAction::Completed => {
            let previous = entry.current_page.unwrap_or(0);
            let final_page = total_pages.unwrap_or(previous);
            Ok(TrackPlan {
                new_current_page: total_pages,
                pages_delta: (final_page - previous).max(0),
                minutes: 0,
                mark_completed: true,
            })
        }
    }
}

// --- Reviews ---

/// A user's rating + text for a book; one per (user, book), upserted by
/// the owner.
#[derive(Debug, Clone)]
pub struct Review {
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

#[derive(Debug, Clone)]
pub struct NewReview {
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub user_book_id: Option<Uuid>,
    pub rating: i16,
    pub content: Option<String>,
    pub is_public: bool,
}

// --- Preferences ---

/// Per-user onboarding answers.
#[derive(Debug, Clone)]
pub struct UserPreferences {
    pub id: Uuid,
    pub favorite_genres: Vec<String>,
    /// Self-reported bracket such as "0-10"; free-form by design.
    pub books_read_count: Option<String>,
    pub pages_per_day: i32,
    pub yearly_goal: i32,
    pub onboarding_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PreferencesUpdate {
    pub favorite_genres: Vec<String>,
    pub books_read_count: Option<String>,
    pub pages_per_day: i32,
    pub yearly_goal: i32,
    pub onboarding_completed: bool,
}

// --- Social ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendshipStatus {
    Pending,
    Accepted,
}

impl FriendshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FriendshipStatus::Pending => "pending",
            FriendshipStatus::Accepted => "accepted",
        }
    }

    pub fn parse(value: &str) -> Result<Self, PortError> {
        match value {
            "pending" => Ok(FriendshipStatus::Pending),
            "accepted" => Ok(FriendshipStatus::Accepted),
            other => Err(PortError::Invalid(format!(
                "unknown friendship status '{other}'"
            ))),
        }
    }
}

/// A directed friend request; the friendship exists once accepted in
/// either direction.
#[derive(Debug, Clone)]
pub struct Friendship {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub addressee_id: Uuid,
    pub status: FriendshipStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

/// An accepted friend with the reading context the friends page shows.
#[derive(Debug, Clone)]
pub struct FriendEntry {
    pub profile: Profile,
    pub currently_reading: Option<String>,
    pub friends_since: DateTime<Utc>,
}

/// An incoming, still-pending request.
#[derive(Debug, Clone)]
pub struct FriendRequest {
    pub id: Uuid,
    pub from: Profile,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// One row of the conversation list: the peer, the latest message, and
/// how many of their messages are still unread.
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub peer: Profile,
    pub last_message: Message,
    pub unread_count: i64,
}

// --- Validation and small policies ---

pub fn validate_password(password: &str) -> Result<(), PortError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(PortError::Invalid(PASSWORD_TOO_SHORT.to_string()));
    }
    Ok(())
}

pub fn validate_rating(rating: i16) -> Result<(), PortError> {
    if !(1..=5).contains(&rating) {
        return Err(PortError::Invalid(
            "rating must be between 1 and 5".to_string(),
        ));
    }
    Ok(())
}

/// Default username for a fresh profile: the local part of the sign-up
/// email.
pub fn username_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

/// UserBook.current_page never exceeds Book.total_pages when both are
/// known.
pub fn clamp_current_page(current_page: i32, total_pages: Option<i32>) -> i32 {
    let floored = current_page.max(0);
    match total_pages {
        Some(total) if total > 0 => floored.min(total),
        _ => floored,
    }
}

/// Streak bookkeeping at progress-write time: consecutive days increment,
/// a same-day repeat holds, anything else restarts at 1.
pub fn next_streak(previous: i32, last_activity: Option<NaiveDate>, today: NaiveDate) -> i32 {
    match last_activity {
        Some(day) if day == today => previous.max(1),
        Some(day) if today.signed_duration_since(day).num_days() == 1 => previous.max(0) + 1,
        _ => 1,
    }
}

/// Percent of a goal reached, rounded, capped at 100.
pub fn goal_progress_percent(done: i64, target: i64) -> u8 {
    if target <= 0 {
        return 0;
    }
    let pct = (done as f64 / target as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

fn non_empty(value: String, field: &str) -> Result<String, PortError> {
    let trimmed = value.trim().to_string();
    if trimmed.is_empty() {
        return Err(PortError::Invalid(format!("{field} must not be empty")));
    }
    Ok(trimmed)
}

fn positive_or_none(pages: Option<i32>) -> Option<i32> {
    pages.filter(|p| *p > 0)
}
