//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use shelfmark_core::domain::{
    AuthSession, AuthUser, Book, BookStatus, ConversationSummary, FriendEntry, FriendRequest,
    Friendship, FriendshipStatus, Message, NewBook, NewProfile, NewProgressUpdate, NewReview,
    PreferencesUpdate, Profile, ProfilePatch, ProgressUpdate, Review, ShelfEntry, StatsDelta,
    UserBook, UserBookPatch, UserCredentials, UserPreferences,
};
use shelfmark_core::ports::{DatabaseService, PortError, PortResult, ProfileBootstrap};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

//=========================================================================================
// Column Lists (shared between queries that return the same record)
//=========================================================================================

const PROFILE_COLS: &str = "id, username, full_name, bio, avatar_url, books_read, pages_read, \
     reading_time, current_streak, last_activity_date, created_at, updated_at";

const BOOK_COLS: &str = "id, google_books_id, title, author, cover_url, description, \
     total_pages, published_date, publisher, isbn_13, isbn_10, genre, created_at, updated_at";

const USER_BOOK_COLS: &str = "id, user_id, book_id, status, current_page, rating, start_date, \
     finish_date, notes, added_to_shelf_at, last_progress_at, updated_at";

const SHELF_SELECT: &str = "SELECT ub.id, ub.user_id, ub.book_id, ub.status, ub.current_page, \
     ub.rating, ub.start_date, ub.finish_date, ub.notes, ub.added_to_shelf_at, \
     ub.last_progress_at, ub.updated_at, b.google_books_id, b.title, b.author, b.cover_url, \
     b.description, b.total_pages, b.published_date, b.publisher, b.isbn_13, b.isbn_10, \
     b.genre, b.created_at AS book_created_at, b.updated_at AS book_updated_at \
     FROM user_books ub JOIN books b ON b.id = ub.book_id";

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct AuthUserRecord {
    user_id: Uuid,
    email: String,
}
impl AuthUserRecord {
    fn to_domain(self) -> AuthUser {
        AuthUser {
            id: self.user_id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            password_hash: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct AuthSessionRow {
    id: String,
    expires_at: DateTime<Utc>,
    user_id: Uuid,
    email: String,
}
impl AuthSessionRow {
    fn to_domain(self) -> AuthSession {
        AuthSession {
            token: self.id,
            user: AuthUser {
                id: self.user_id,
                email: self.email,
            },
            expires_at: self.expires_at,
        }
    }
}

#[derive(FromRow)]
struct ProfileRecord {
    id: Uuid,
    username: Option<String>,
    full_name: Option<String>,
    bio: Option<String>,
    avatar_url: Option<String>,
    books_read: i32,
    pages_read: i64,
    reading_time: i64,
    current_streak: i32,
    last_activity_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ProfileRecord {
    fn to_domain(self) -> Profile {
        Profile {
            id: self.id,
            username: self.username,
            full_name: self.full_name,
            bio: self.bio,
            avatar_url: self.avatar_url,
            books_read: self.books_read,
            pages_read: self.pages_read,
            reading_time: self.reading_time,
            current_streak: self.current_streak,
            last_activity_date: self.last_activity_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct BookRecord {
    id: Uuid,
    google_books_id: Option<String>,
    title: String,
    author: String,
    cover_url: Option<String>,
    description: Option<String>,
    total_pages: Option<i32>,
    published_date: Option<String>,
    publisher: Option<String>,
    isbn_13: Option<String>,
    isbn_10: Option<String>,
    genre: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl BookRecord {
    fn to_domain(self) -> Book {
        Book {
            id: self.id,
            google_books_id: self.google_books_id,
            title: self.title,
            author: self.author,
            cover_url: self.cover_url,
            description: self.description,
            total_pages: self.total_pages,
            published_date: self.published_date,
            publisher: self.publisher,
            isbn_13: self.isbn_13,
            isbn_10: self.isbn_10,
            genre: self.genre,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct UserBookRecord {
    id: Uuid,
    user_id: Uuid,
    book_id: Uuid,
    status: String,
    current_page: Option<i32>,
    rating: Option<i16>,
    start_date: Option<NaiveDate>,
    finish_date: Option<NaiveDate>,
    notes: Option<String>,
    added_to_shelf_at: DateTime<Utc>,
    last_progress_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}
impl UserBookRecord {
    fn to_domain(self) -> PortResult<UserBook> {
        Ok(UserBook {
            id: self.id,
            user_id: self.user_id,
            book_id: self.book_id,
            status: BookStatus::parse(&self.status)?,
            current_page: self.current_page,
            rating: self.rating,
            start_date: self.start_date,
            finish_date: self.finish_date,
            notes: self.notes,
            added_to_shelf_at: self.added_to_shelf_at,
            last_progress_at: self.last_progress_at,
            updated_at: self.updated_at,
        })
    }
}

/// One flattened row of a shelf entry joined with its book.
#[derive(FromRow)]
struct ShelfRow {
    id: Uuid,
    user_id: Uuid,
    book_id: Uuid,
    status: String,
    current_page: Option<i32>,
    rating: Option<i16>,
    start_date: Option<NaiveDate>,
    finish_date: Option<NaiveDate>,
    notes: Option<String>,
    added_to_shelf_at: DateTime<Utc>,
    last_progress_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    google_books_id: Option<String>,
    title: String,
    author: String,
    cover_url: Option<String>,
    description: Option<String>,
    total_pages: Option<i32>,
    published_date: Option<String>,
    publisher: Option<String>,
    isbn_13: Option<String>,
    isbn_10: Option<String>,
    genre: Option<String>,
    book_created_at: DateTime<Utc>,
    book_updated_at: DateTime<Utc>,
}
impl ShelfRow {
    fn to_domain(self) -> PortResult<ShelfEntry> {
        Ok(ShelfEntry {
            entry: UserBook {
                id: self.id,
                user_id: self.user_id,
                book_id: self.book_id,
                status: BookStatus::parse(&self.status)?,
                current_page: self.current_page,
                rating: self.rating,
                start_date: self.start_date,
                finish_date: self.finish_date,
                notes: self.notes,
                added_to_shelf_at: self.added_to_shelf_at,
                last_progress_at: self.last_progress_at,
                updated_at: self.updated_at,
            },
            book: Book {
                id: self.book_id,
                google_books_id: self.google_books_id,
                title: self.title,
                author: self.author,
                cover_url: self.cover_url,
                description: self.description,
                total_pages: self.total_pages,
                published_date: self.published_date,
                publisher: self.publisher,
                isbn_13: self.isbn_13,
                isbn_10: self.isbn_10,
                genre: self.genre,
                created_at: self.book_created_at,
                updated_at: self.book_updated_at,
            },
        })
    }
}

#[derive(FromRow)]
struct ProgressRecord {
    id: Uuid,
    user_book_id: Uuid,
    user_id: Uuid,
    pages_read: Option<i32>,
    minutes: Option<i32>,
    note: Option<String>,
    is_public: bool,
    created_at: DateTime<Utc>,
}
impl ProgressRecord {
    fn to_domain(self) -> ProgressUpdate {
        ProgressUpdate {
            id: self.id,
            user_book_id: self.user_book_id,
            user_id: self.user_id,
            pages_read: self.pages_read,
            minutes: self.minutes,
            note: self.note,
            is_public: self.is_public,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ReviewRecord {
    id: Uuid,
    user_id: Uuid,
    book_id: Uuid,
    user_book_id: Option<Uuid>,
    rating: i16,
    content: Option<String>,
    is_public: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ReviewRecord {
    fn to_domain(self) -> Review {
        Review {
            id: self.id,
            user_id: self.user_id,
            book_id: self.book_id,
            user_book_id: self.user_book_id,
            rating: self.rating,
            content: self.content,
            is_public: self.is_public,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct PreferencesRecord {
    id: Uuid,
    favorite_genres: Vec<String>,
    books_read_count: Option<String>,
    pages_per_day: i32,
    yearly_goal: i32,
    onboarding_completed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl PreferencesRecord {
    fn to_domain(self) -> UserPreferences {
        UserPreferences {
            id: self.id,
            favorite_genres: self.favorite_genres,
            books_read_count: self.books_read_count,
            pages_per_day: self.pages_per_day,
            yearly_goal: self.yearly_goal,
            onboarding_completed: self.onboarding_completed,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct FriendshipRecord {
    id: Uuid,
    requester_id: Uuid,
    addressee_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
    responded_at: Option<DateTime<Utc>>,
}
impl FriendshipRecord {
    fn to_domain(self) -> PortResult<Friendship> {
        Ok(Friendship {
            id: self.id,
            requester_id: self.requester_id,
            addressee_id: self.addressee_id,
            status: FriendshipStatus::parse(&self.status)?,
            created_at: self.created_at,
            responded_at: self.responded_at,
        })
    }
}

#[derive(FromRow)]
struct FriendRow {
    #[sqlx(flatten)]
    profile: ProfileRecord,
    friends_since: DateTime<Utc>,
    currently_reading: Option<String>,
}

#[derive(FromRow)]
struct RequestRow {
    request_id: Uuid,
    requested_at: DateTime<Utc>,
    #[sqlx(flatten)]
    from: ProfileRecord,
}

#[derive(FromRow)]
struct MessageRecord {
    id: Uuid,
    sender_id: Uuid,
    recipient_id: Uuid,
    body: String,
    sent_at: DateTime<Utc>,
    read_at: Option<DateTime<Utc>>,
}
impl MessageRecord {
    fn to_domain(self) -> Message {
        Message {
            id: self.id,
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            body: self.body,
            sent_at: self.sent_at,
            read_at: self.read_at,
        }
    }
}

#[derive(FromRow)]
struct ConversationRow {
    message_id: Uuid,
    sender_id: Uuid,
    recipient_id: Uuid,
    body: String,
    sent_at: DateTime<Utc>,
    read_at: Option<DateTime<Utc>>,
    #[sqlx(flatten)]
    peer: ProfileRecord,
    unread_count: i64,
}

//=========================================================================================
// Internal Lookup Helpers
//=========================================================================================

impl DbAdapter {
    /// Finds an existing catalog row for a draft, trying the external id,
    /// then ISBN-13, then a case-insensitive (title, author) match.
    async fn lookup_book(&self, draft: &NewBook) -> PortResult<Option<Book>> {
        if let Some(gid) = &draft.google_books_id {
            let sql = format!("SELECT {BOOK_COLS} FROM books WHERE google_books_id = $1");
            let found = sqlx::query_as::<_, BookRecord>(&sql)
                .bind(gid)
                .fetch_optional(&self.pool)
                .await
                .map_err(unexpected)?;
            if let Some(record) = found {
                return Ok(Some(record.to_domain()));
            }
        }
        if let Some(isbn) = &draft.isbn_13 {
            let sql = format!("SELECT {BOOK_COLS} FROM books WHERE isbn_13 = $1");
            let found = sqlx::query_as::<_, BookRecord>(&sql)
                .bind(isbn)
                .fetch_optional(&self.pool)
                .await
                .map_err(unexpected)?;
            if let Some(record) = found {
                return Ok(Some(record.to_domain()));
            }
        }
        let sql = format!(
            "SELECT {BOOK_COLS} FROM books \
             WHERE lower(title) = lower($1) AND lower(author) = lower($2) LIMIT 1"
        );
        let found = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(&draft.title)
            .bind(&draft.author)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(found.map(BookRecord::to_domain))
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    // --- Auth Methods ---

    async fn create_user_with_email(
        &self,
        email: &str,
        password_hash: &str,
    ) -> PortResult<AuthUser> {
        let record = sqlx::query_as::<_, AuthUserRecord>(
            "INSERT INTO users (email, hashed_password) VALUES ($1, $2) \
             RETURNING user_id, email",
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Invalid("An account with this email already exists".to_string())
            } else {
                unexpected(e)
            }
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("No account for {}", email)))?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, token: &str) -> PortResult<AuthSession> {
        let row = sqlx::query_as::<_, AuthSessionRow>(
            "SELECT s.id, s.expires_at, u.user_id, u.email \
             FROM auth_sessions s JOIN users u ON u.user_id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > now()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        row.map(AuthSessionRow::to_domain)
            .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, token: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    // --- Profiles ---

    async fn create_profile_if_absent(&self, profile: &NewProfile) -> PortResult<()> {
        let insert = sqlx::query(
            "INSERT INTO profiles (id, username, full_name) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(profile.id)
        .bind(&profile.username)
        .bind(&profile.full_name)
        .execute(&self.pool)
        .await;
        match insert {
            Ok(_) => Ok(()),
            // The default username can collide with another profile's;
            // create the profile unnamed rather than failing sign-up.
            Err(e) if is_unique_violation(&e) => {
                sqlx::query(
                    "INSERT INTO profiles (id, full_name) VALUES ($1, $2) \
                     ON CONFLICT (id) DO NOTHING",
                )
                .bind(profile.id)
                .bind(&profile.full_name)
                .execute(&self.pool)
                .await
                .map_err(unexpected)?;
                Ok(())
            }
            Err(e) => Err(unexpected(e)),
        }
    }

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        let sql = format!("SELECT {PROFILE_COLS} FROM profiles WHERE id = $1");
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Profile {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn get_profile_by_username(&self, username: &str) -> PortResult<Profile> {
        let sql = format!("SELECT {PROFILE_COLS} FROM profiles WHERE username = $1");
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("No reader named {}", username)))?;
        Ok(record.to_domain())
    }

    async fn update_profile(&self, user_id: Uuid, patch: &ProfilePatch) -> PortResult<Profile> {
        let sql = format!(
            "UPDATE profiles SET \
                username = COALESCE($2, username), \
                full_name = COALESCE($3, full_name), \
                bio = COALESCE($4, bio), \
                avatar_url = COALESCE($5, avatar_url), \
                updated_at = now() \
             WHERE id = $1 RETURNING {PROFILE_COLS}"
        );
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(user_id)
            .bind(&patch.username)
            .bind(&patch.full_name)
            .bind(&patch.bio)
            .bind(&patch.avatar_url)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    PortError::Invalid("That username is taken".to_string())
                } else {
                    unexpected(e)
                }
            })?
            .ok_or_else(|| PortError::NotFound(format!("Profile {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn apply_stats_delta(&self, user_id: Uuid, delta: &StatsDelta) -> PortResult<()> {
        sqlx::query(
            "UPDATE profiles SET \
                pages_read = pages_read + $2, \
                reading_time = reading_time + $3, \
                books_read = books_read + $4, \
                current_streak = COALESCE($5, current_streak), \
                last_activity_date = CURRENT_DATE, \
                updated_at = now() \
             WHERE id = $1",
        )
        .bind(user_id)
        .bind(delta.pages)
        .bind(delta.minutes)
        .bind(delta.books)
        .bind(delta.streak)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn search_profiles(
        &self,
        query: &str,
        exclude: Uuid,
        limit: i64,
    ) -> PortResult<Vec<Profile>> {
        let sql = format!(
            "SELECT {PROFILE_COLS} FROM profiles \
             WHERE id <> $2 AND (username ILIKE '%' || $1 || '%' \
                OR full_name ILIKE '%' || $1 || '%') \
             ORDER BY username NULLS LAST LIMIT $3"
        );
        let records = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(query)
            .bind(exclude)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(ProfileRecord::to_domain).collect())
    }

    // --- Books ---

    async fn get_book(&self, book_id: Uuid) -> PortResult<Book> {
        let sql = format!("SELECT {BOOK_COLS} FROM books WHERE id = $1");
        let record = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Book {} not found", book_id)))?;
        Ok(record.to_domain())
    }

    async fn find_or_create_book(&self, draft: &NewBook) -> PortResult<Book> {
        if let Some(existing) = self.lookup_book(draft).await? {
            return Ok(existing);
        }
        let sql = format!(
            "INSERT INTO books (google_books_id, title, author, cover_url, description, \
                total_pages, published_date, publisher, isbn_13, isbn_10, genre) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT DO NOTHING RETURNING {BOOK_COLS}"
        );
        let inserted = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(&draft.google_books_id)
            .bind(&draft.title)
            .bind(&draft.author)
            .bind(&draft.cover_url)
            .bind(&draft.description)
            .bind(draft.total_pages)
            .bind(&draft.published_date)
            .bind(&draft.publisher)
            .bind(&draft.isbn_13)
            .bind(&draft.isbn_10)
            .bind(&draft.genre)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        match inserted {
            Some(record) => Ok(record.to_domain()),
            // A concurrent insert won the conflict; the row must exist now.
            None => self.lookup_book(draft).await?.ok_or_else(|| {
                PortError::Unexpected("catalog insert raced and lookup found nothing".to_string())
            }),
        }
    }

    // --- Shelves ---

    async fn list_shelf(&self, user_id: Uuid) -> PortResult<Vec<ShelfEntry>> {
        let sql = format!(
            "{SHELF_SELECT} WHERE ub.user_id = $1 \
             ORDER BY ub.last_progress_at DESC NULLS LAST, ub.added_to_shelf_at DESC"
        );
        let rows = sqlx::query_as::<_, ShelfRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        rows.into_iter().map(ShelfRow::to_domain).collect()
    }

    async fn get_shelf_entry(&self, user_id: Uuid, user_book_id: Uuid) -> PortResult<ShelfEntry> {
        let sql = format!("{SHELF_SELECT} WHERE ub.user_id = $1 AND ub.id = $2");
        let row = sqlx::query_as::<_, ShelfRow>(&sql)
            .bind(user_id)
            .bind(user_book_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| {
                PortError::NotFound(format!("Shelf entry {} not found", user_book_id))
            })?;
        row.to_domain()
    }

    async fn find_shelf_entry_by_book(
        &self,
        user_id: Uuid,
        book_id: Uuid,
    ) -> PortResult<Option<UserBook>> {
        let sql = format!(
            "SELECT {USER_BOOK_COLS} FROM user_books WHERE user_id = $1 AND book_id = $2"
        );
        let record = sqlx::query_as::<_, UserBookRecord>(&sql)
            .bind(user_id)
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        record.map(UserBookRecord::to_domain).transpose()
    }

    async fn add_to_shelf(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        status: BookStatus,
    ) -> PortResult<UserBook> {
        let sql = format!(
            "INSERT INTO user_books (user_id, book_id, status, start_date) \
             VALUES ($1, $2, $3, CASE WHEN $3 = 'reading' THEN CURRENT_DATE END) \
             ON CONFLICT (user_id, book_id) \
             DO UPDATE SET status = EXCLUDED.status, updated_at = now() \
             RETURNING {USER_BOOK_COLS}"
        );
        let record = sqlx::query_as::<_, UserBookRecord>(&sql)
            .bind(user_id)
            .bind(book_id)
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        record.to_domain()
    }

    async fn update_shelf_entry(
        &self,
        user_id: Uuid,
        user_book_id: Uuid,
        patch: &UserBookPatch,
    ) -> PortResult<UserBook> {
        let sql = format!(
            "UPDATE user_books SET \
                status = COALESCE($3, status), \
                current_page = COALESCE($4, current_page), \
                rating = COALESCE($5, rating), \
                notes = COALESCE($6, notes), \
                start_date = COALESCE($7, start_date), \
                finish_date = COALESCE($8, finish_date), \
                updated_at = now() \
             WHERE user_id = $1 AND id = $2 RETURNING {USER_BOOK_COLS}"
        );
        let record = sqlx::query_as::<_, UserBookRecord>(&sql)
            .bind(user_id)
            .bind(user_book_id)
            .bind(patch.status.map(|s| s.as_str()))
            .bind(patch.current_page)
            .bind(patch.rating)
            .bind(&patch.notes)
            .bind(patch.start_date)
            .bind(patch.finish_date)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| {
                PortError::NotFound(format!("Shelf entry {} not found", user_book_id))
            })?;
        record.to_domain()
    }

    async fn remove_from_shelf(&self, user_id: Uuid, user_book_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM user_books WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(user_book_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Shelf entry {} not found",
                user_book_id
            )));
        }
        Ok(())
    }

    // --- Progress Log ---

    async fn record_progress(&self, update: &NewProgressUpdate) -> PortResult<ProgressUpdate> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let record = sqlx::query_as::<_, ProgressRecord>(
            "INSERT INTO reading_progress_updates \
                (user_book_id, user_id, pages_read, minutes, note, is_public) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, user_book_id, user_id, pages_read, minutes, note, is_public, created_at",
        )
        .bind(update.user_book_id)
        .bind(update.user_id)
        .bind(update.pages_read)
        .bind(update.minutes)
        .bind(&update.note)
        .bind(update.is_public)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;
        sqlx::query(
            "UPDATE user_books SET last_progress_at = now(), updated_at = now() \
             WHERE id = $1 AND user_id = $2",
        )
        .bind(update.user_book_id)
        .bind(update.user_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_progress_for_entry(
        &self,
        user_id: Uuid,
        user_book_id: Uuid,
    ) -> PortResult<Vec<ProgressUpdate>> {
        let records = sqlx::query_as::<_, ProgressRecord>(
            "SELECT id, user_book_id, user_id, pages_read, minutes, note, is_public, created_at \
             FROM reading_progress_updates \
             WHERE user_id = $1 AND user_book_id = $2 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .bind(user_book_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(ProgressRecord::to_domain).collect())
    }

    // --- Reviews ---

    async fn upsert_review(&self, review: &NewReview) -> PortResult<Review> {
        let record = sqlx::query_as::<_, ReviewRecord>(
            "INSERT INTO reviews (user_id, book_id, user_book_id, rating, content, is_public) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (user_id, book_id) DO UPDATE SET \
                rating = EXCLUDED.rating, \
                content = EXCLUDED.content, \
                is_public = EXCLUDED.is_public, \
                user_book_id = EXCLUDED.user_book_id, \
                updated_at = now() \
             RETURNING id, user_id, book_id, user_book_id, rating, content, is_public, \
                created_at, updated_at",
        )
        .bind(review.user_id)
        .bind(review.book_id)
        .bind(review.user_book_id)
        .bind(review.rating)
        .bind(&review.content)
        .bind(review.is_public)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_reviews_for_book(
        &self,
        book_id: Uuid,
        viewer: Option<Uuid>,
    ) -> PortResult<Vec<Review>> {
        let records = sqlx::query_as::<_, ReviewRecord>(
            "SELECT id, user_id, book_id, user_book_id, rating, content, is_public, \
                created_at, updated_at \
             FROM reviews WHERE book_id = $1 AND (is_public OR user_id = $2) \
             ORDER BY created_at DESC",
        )
        .bind(book_id)
        .bind(viewer)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(ReviewRecord::to_domain).collect())
    }

    // --- Preferences ---

    async fn get_preferences(&self, user_id: Uuid) -> PortResult<Option<UserPreferences>> {
        let record = sqlx::query_as::<_, PreferencesRecord>(
            "SELECT id, favorite_genres, books_read_count, pages_per_day, yearly_goal, \
                onboarding_completed, created_at, updated_at \
             FROM user_preferences WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(PreferencesRecord::to_domain))
    }

    async fn upsert_preferences(
        &self,
        user_id: Uuid,
        update: &PreferencesUpdate,
    ) -> PortResult<UserPreferences> {
        let record = sqlx::query_as::<_, PreferencesRecord>(
            "INSERT INTO user_preferences \
                (id, favorite_genres, books_read_count, pages_per_day, yearly_goal, \
                 onboarding_completed) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (id) DO UPDATE SET \
                favorite_genres = EXCLUDED.favorite_genres, \
                books_read_count = EXCLUDED.books_read_count, \
                pages_per_day = EXCLUDED.pages_per_day, \
                yearly_goal = EXCLUDED.yearly_goal, \
                onboarding_completed = EXCLUDED.onboarding_completed, \
                updated_at = now() \
             RETURNING id, favorite_genres, books_read_count, pages_per_day, yearly_goal, \
                onboarding_completed, created_at, updated_at",
        )
        .bind(user_id)
        .bind(&update.favorite_genres)
        .bind(&update.books_read_count)
        .bind(update.pages_per_day)
        .bind(update.yearly_goal)
        .bind(update.onboarding_completed)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    // --- Social ---

    async fn find_friendship(&self, a: Uuid, b: Uuid) -> PortResult<Option<Friendship>> {
        let record = sqlx::query_as::<_, FriendshipRecord>(
            "SELECT id, requester_id, addressee_id, status, created_at, responded_at \
             FROM friendships \
             WHERE (requester_id = $1 AND addressee_id = $2) \
                OR (requester_id = $2 AND addressee_id = $1)",
        )
        .bind(a)
        .bind(b)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(FriendshipRecord::to_domain).transpose()
    }

    async fn create_friend_request(
        &self,
        requester: Uuid,
        addressee: Uuid,
    ) -> PortResult<Friendship> {
        let record = sqlx::query_as::<_, FriendshipRecord>(
            "INSERT INTO friendships (requester_id, addressee_id) VALUES ($1, $2) \
             RETURNING id, requester_id, addressee_id, status, created_at, responded_at",
        )
        .bind(requester)
        .bind(addressee)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Invalid("A friend request already exists".to_string())
            } else {
                unexpected(e)
            }
        })?;
        record.to_domain()
    }

    async fn accept_friend_request(
        &self,
        addressee: Uuid,
        friendship_id: Uuid,
    ) -> PortResult<Friendship> {
        let record = sqlx::query_as::<_, FriendshipRecord>(
            "UPDATE friendships SET status = 'accepted', responded_at = now() \
             WHERE id = $2 AND addressee_id = $1 AND status = 'pending' \
             RETURNING id, requester_id, addressee_id, status, created_at, responded_at",
        )
        .bind(addressee)
        .bind(friendship_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| {
            PortError::NotFound(format!("Friend request {} not found", friendship_id))
        })?;
        record.to_domain()
    }

    async fn decline_friend_request(
        &self,
        addressee: Uuid,
        friendship_id: Uuid,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "DELETE FROM friendships \
             WHERE id = $2 AND addressee_id = $1 AND status = 'pending'",
        )
        .bind(addressee)
        .bind(friendship_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Friend request {} not found",
                friendship_id
            )));
        }
        Ok(())
    }

    async fn list_friends(&self, user_id: Uuid) -> PortResult<Vec<FriendEntry>> {
        let sql = "SELECT p.id, p.username, p.full_name, p.bio, p.avatar_url, p.books_read, \
                p.pages_read, p.reading_time, p.current_streak, p.last_activity_date, \
                p.created_at, p.updated_at, \
                COALESCE(f.responded_at, f.created_at) AS friends_since, \
                (SELECT b.title FROM user_books ub JOIN books b ON b.id = ub.book_id \
                 WHERE ub.user_id = p.id AND ub.status = 'reading' \
                 ORDER BY ub.last_progress_at DESC NULLS LAST LIMIT 1) AS currently_reading \
             FROM friendships f \
             JOIN profiles p ON p.id = CASE \
                WHEN f.requester_id = $1 THEN f.addressee_id ELSE f.requester_id END \
             WHERE (f.requester_id = $1 OR f.addressee_id = $1) AND f.status = 'accepted' \
             ORDER BY friends_since DESC";
        let rows = sqlx::query_as::<_, FriendRow>(sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(rows
            .into_iter()
            .map(|row| FriendEntry {
                profile: row.profile.to_domain(),
                currently_reading: row.currently_reading,
                friends_since: row.friends_since,
            })
            .collect())
    }

    async fn list_incoming_requests(&self, user_id: Uuid) -> PortResult<Vec<FriendRequest>> {
        let sql = "SELECT f.id AS request_id, f.created_at AS requested_at, \
                p.id, p.username, p.full_name, p.bio, p.avatar_url, p.books_read, \
                p.pages_read, p.reading_time, p.current_streak, p.last_activity_date, \
                p.created_at, p.updated_at \
             FROM friendships f JOIN profiles p ON p.id = f.requester_id \
             WHERE f.addressee_id = $1 AND f.status = 'pending' \
             ORDER BY f.created_at DESC";
        let rows = sqlx::query_as::<_, RequestRow>(sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(rows
            .into_iter()
            .map(|row| FriendRequest {
                id: row.request_id,
                from: row.from.to_domain(),
                requested_at: row.requested_at,
            })
            .collect())
    }

    // --- Messages ---

    async fn send_message(
        &self,
        sender: Uuid,
        recipient: Uuid,
        body: &str,
    ) -> PortResult<Message> {
        let record = sqlx::query_as::<_, MessageRecord>(
            "INSERT INTO messages (sender_id, recipient_id, body) VALUES ($1, $2, $3) \
             RETURNING id, sender_id, recipient_id, body, sent_at, read_at",
        )
        .bind(sender)
        .bind(recipient)
        .bind(body)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_conversation(&self, user_id: Uuid, peer_id: Uuid) -> PortResult<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT id, sender_id, recipient_id, body, sent_at, read_at FROM messages \
             WHERE (sender_id = $1 AND recipient_id = $2) \
                OR (sender_id = $2 AND recipient_id = $1) \
             ORDER BY sent_at ASC",
        )
        .bind(user_id)
        .bind(peer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(MessageRecord::to_domain).collect())
    }

    async fn mark_conversation_read(&self, user_id: Uuid, peer_id: Uuid) -> PortResult<u64> {
        let result = sqlx::query(
            "UPDATE messages SET read_at = now() \
             WHERE recipient_id = $1 AND sender_id = $2 AND read_at IS NULL",
        )
        .bind(user_id)
        .bind(peer_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected())
    }

    async fn list_conversations(&self, user_id: Uuid) -> PortResult<Vec<ConversationSummary>> {
        let sql = "WITH thread AS ( \
                SELECT m.id, m.sender_id, m.recipient_id, m.body, m.sent_at, m.read_at, \
                    CASE WHEN m.sender_id = $1 THEN m.recipient_id ELSE m.sender_id END \
                        AS peer_id \
                FROM messages m WHERE m.sender_id = $1 OR m.recipient_id = $1 \
             ), latest AS ( \
                SELECT DISTINCT ON (peer_id) * FROM thread ORDER BY peer_id, sent_at DESC \
             ) \
             SELECT l.id AS message_id, l.sender_id, l.recipient_id, l.body, l.sent_at, \
                l.read_at, \
                p.id, p.username, p.full_name, p.bio, p.avatar_url, p.books_read, \
                p.pages_read, p.reading_time, p.current_streak, p.last_activity_date, \
                p.created_at, p.updated_at, \
                (SELECT count(*) FROM messages um \
                 WHERE um.sender_id = p.id AND um.recipient_id = $1 AND um.read_at IS NULL) \
                    AS unread_count \
             FROM latest l JOIN profiles p ON p.id = l.peer_id \
             ORDER BY l.sent_at DESC";
        let rows = sqlx::query_as::<_, ConversationRow>(sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(rows
            .into_iter()
            .map(|row| ConversationSummary {
                peer: row.peer.to_domain(),
                last_message: Message {
                    id: row.message_id,
                    sender_id: row.sender_id,
                    recipient_id: row.recipient_id,
                    body: row.body,
                    sent_at: row.sent_at,
                    read_at: row.read_at,
                },
                unread_count: row.unread_count,
            })
            .collect())
    }
}

//=========================================================================================
// `ProfileBootstrap` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProfileBootstrap for DbAdapter {
    async fn ensure_profile(&self, profile: &NewProfile) -> PortResult<()> {
        self.create_profile_if_absent(profile).await
    }
}
