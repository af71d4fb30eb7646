//! services/api/tests/support/mod.rs
//!
//! Shared harness for the integration tests: an in-memory `DatabaseService`,
//! a canned `BookSearchService`, and a helper that serves the real router on
//! an ephemeral port.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::HeaderValue;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use api_lib::config::Config;
use api_lib::web::{api_router, AppState};
use shelfmark_core::domain::{
    AuthSession, AuthUser, Book, BookSearchHit, BookStatus, ConversationSummary, FriendEntry,
    FriendRequest, Friendship, FriendshipStatus, Message, NewBook, NewProfile, NewProgressUpdate,
    NewReview, PreferencesUpdate, Profile, ProfilePatch, ProgressUpdate, Review, SearchOutcome,
    SearchSource, ShelfEntry, StatsDelta, UserBook, UserBookPatch, UserCredentials,
    UserPreferences,
};
use shelfmark_core::ports::{
    BookSearchService, DatabaseService, PortError, PortResult, ProfileBootstrap,
};
use shelfmark_core::shelf::sort_by_last_progress;

pub const TEST_PASSWORD: &str = "longenough";

//=========================================================================================
// In-Memory Database
//=========================================================================================

#[derive(Clone)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
}

#[derive(Clone)]
struct SessionRow {
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    users: Vec<UserRow>,
    sessions: HashMap<String, SessionRow>,
    profiles: HashMap<Uuid, Profile>,
    books: Vec<Book>,
    user_books: Vec<UserBook>,
    progress: Vec<ProgressUpdate>,
    reviews: Vec<Review>,
    preferences: HashMap<Uuid, UserPreferences>,
    friendships: Vec<Friendship>,
    messages: Vec<Message>,
}

/// A `DatabaseService` over plain vectors and maps, mirroring the SQL
/// adapter's observable behavior (orderings, upserts, error messages).
#[derive(Default)]
pub struct FakeDb {
    inner: Mutex<Inner>,
}

fn blank_profile(id: Uuid, username: Option<String>, full_name: Option<String>) -> Profile {
    let now = Utc::now();
    Profile {
        id,
        username,
        full_name,
        bio: None,
        avatar_url: None,
        books_read: 0,
        pages_read: 0,
        reading_time: 0,
        current_streak: 0,
        last_activity_date: None,
        created_at: now,
        updated_at: now,
    }
}

impl FakeDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.inner.lock().unwrap().users.len()
    }

    pub fn session_count(&self) -> usize {
        self.inner.lock().unwrap().sessions.len()
    }

    pub fn profile_of(&self, user_id: Uuid) -> Option<Profile> {
        self.inner.lock().unwrap().profiles.get(&user_id).cloned()
    }

    pub fn progress_count(&self) -> usize {
        self.inner.lock().unwrap().progress.len()
    }

    /// Backdates an entry's progress stamp so ordering tests can force a
    /// known recency without sleeping.
    pub fn set_last_progress(&self, user_book_id: Uuid, at: Option<DateTime<Utc>>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.user_books.iter_mut().find(|ub| ub.id == user_book_id) {
            entry.last_progress_at = at;
        }
    }
}

#[async_trait]
impl DatabaseService for FakeDb {
    async fn create_user_with_email(
        &self,
        email: &str,
        password_hash: &str,
    ) -> PortResult<AuthUser> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.iter().any(|u| u.email == email) {
            return Err(PortError::Invalid(
                "An account with this email already exists".to_string(),
            ));
        }
        let row = UserRow {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
        };
        inner.users.push(row.clone());
        Ok(AuthUser {
            id: row.id,
            email: row.email,
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let inner = self.inner.lock().unwrap();
        inner
            .users
            .iter()
            .find(|u| u.email == email)
            .map(|u| UserCredentials {
                user_id: u.id,
                email: u.email.clone(),
                password_hash: u.password_hash.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("No account for {}", email)))
    }

    async fn create_auth_session(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .sessions
            .insert(token.to_string(), SessionRow { user_id, expires_at });
        Ok(())
    }

    async fn validate_auth_session(&self, token: &str) -> PortResult<AuthSession> {
        let inner = self.inner.lock().unwrap();
        let row = inner.sessions.get(token).ok_or(PortError::Unauthorized)?;
        if row.expires_at <= Utc::now() {
            return Err(PortError::Unauthorized);
        }
        let user = inner
            .users
            .iter()
            .find(|u| u.id == row.user_id)
            .ok_or(PortError::Unauthorized)?;
        Ok(AuthSession {
            token: token.to_string(),
            user: AuthUser {
                id: user.id,
                email: user.email.clone(),
            },
            expires_at: row.expires_at,
        })
    }

    async fn delete_auth_session(&self, token: &str) -> PortResult<()> {
        self.inner.lock().unwrap().sessions.remove(token);
        Ok(())
    }

    async fn create_profile_if_absent(&self, profile: &NewProfile) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.profiles.contains_key(&profile.id) {
            return Ok(());
        }
        let username_taken = profile.username.as_ref().is_some_and(|name| {
            inner
                .profiles
                .values()
                .any(|p| p.username.as_deref() == Some(name))
        });
        let username = if username_taken {
            None
        } else {
            profile.username.clone()
        };
        inner.profiles.insert(
            profile.id,
            blank_profile(profile.id, username, profile.full_name.clone()),
        );
        Ok(())
    }

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        self.inner
            .lock()
            .unwrap()
            .profiles
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Profile {} not found", user_id)))
    }

    async fn get_profile_by_username(&self, username: &str) -> PortResult<Profile> {
        self.inner
            .lock()
            .unwrap()
            .profiles
            .values()
            .find(|p| p.username.as_deref() == Some(username))
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("No reader named {}", username)))
    }

    async fn update_profile(&self, user_id: Uuid, patch: &ProfilePatch) -> PortResult<Profile> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(name) = &patch.username {
            let collision = inner
                .profiles
                .values()
                .any(|p| p.id != user_id && p.username.as_deref() == Some(name));
            if collision {
                return Err(PortError::Invalid("That username is taken".to_string()));
            }
        }
        let profile = inner
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("Profile {} not found", user_id)))?;
        if let Some(name) = &patch.username {
            profile.username = Some(name.clone());
        }
        if let Some(full_name) = &patch.full_name {
            profile.full_name = Some(full_name.clone());
        }
        if let Some(bio) = &patch.bio {
            profile.bio = Some(bio.clone());
        }
        if let Some(avatar_url) = &patch.avatar_url {
            profile.avatar_url = Some(avatar_url.clone());
        }
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn apply_stats_delta(&self, user_id: Uuid, delta: &StatsDelta) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let profile = inner
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("Profile {} not found", user_id)))?;
        profile.pages_read += delta.pages;
        profile.reading_time += delta.minutes;
        profile.books_read += delta.books;
        if let Some(streak) = delta.streak {
            profile.current_streak = streak;
        }
        profile.last_activity_date = Some(Utc::now().date_naive());
        profile.updated_at = Utc::now();
        Ok(())
    }

    async fn search_profiles(
        &self,
        query: &str,
        exclude: Uuid,
        limit: i64,
    ) -> PortResult<Vec<Profile>> {
        let needle = query.to_lowercase();
        let inner = self.inner.lock().unwrap();
        let mut found: Vec<Profile> = inner
            .profiles
            .values()
            .filter(|p| p.id != exclude)
            .filter(|p| {
                p.username
                    .as_deref()
                    .is_some_and(|u| u.to_lowercase().contains(&needle))
                    || p.full_name
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| match (&a.username, &b.username) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }

    async fn get_book(&self, book_id: Uuid) -> PortResult<Book> {
        self.inner
            .lock()
            .unwrap()
            .books
            .iter()
            .find(|b| b.id == book_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Book {} not found", book_id)))
    }

    async fn find_or_create_book(&self, draft: &NewBook) -> PortResult<Book> {
        let mut inner = self.inner.lock().unwrap();
        let existing = inner.books.iter().find(|b| {
            (draft.google_books_id.is_some() && b.google_books_id == draft.google_books_id)
                || (draft.isbn_13.is_some() && b.isbn_13 == draft.isbn_13)
                || (b.title.to_lowercase() == draft.title.to_lowercase()
                    && b.author.to_lowercase() == draft.author.to_lowercase())
        });
        if let Some(book) = existing {
            return Ok(book.clone());
        }
        let now = Utc::now();
        let book = Book {
            id: Uuid::new_v4(),
            google_books_id: draft.google_books_id.clone(),
            title: draft.title.clone(),
            author: draft.author.clone(),
            cover_url: draft.cover_url.clone(),
            description: draft.description.clone(),
            total_pages: draft.total_pages,
            published_date: draft.published_date.clone(),
            publisher: draft.publisher.clone(),
            isbn_13: draft.isbn_13.clone(),
            isbn_10: draft.isbn_10.clone(),
            genre: draft.genre.clone(),
            created_at: now,
            updated_at: now,
        };
        inner.books.push(book.clone());
        Ok(book)
    }

    async fn list_shelf(&self, user_id: Uuid) -> PortResult<Vec<ShelfEntry>> {
        let inner = self.inner.lock().unwrap();
        let mut entries: Vec<ShelfEntry> = inner
            .user_books
            .iter()
            .filter(|ub| ub.user_id == user_id)
            .map(|ub| {
                let book = inner
                    .books
                    .iter()
                    .find(|b| b.id == ub.book_id)
                    .cloned()
                    .expect("user_book points at a seeded book");
                ShelfEntry {
                    entry: ub.clone(),
                    book,
                }
            })
            .collect();
        // Never-tracked entries tie-break on shelf recency, like the SQL.
        entries.sort_by(|a, b| b.entry.added_to_shelf_at.cmp(&a.entry.added_to_shelf_at));
        sort_by_last_progress(&mut entries);
        Ok(entries)
    }

    async fn get_shelf_entry(&self, user_id: Uuid, user_book_id: Uuid) -> PortResult<ShelfEntry> {
        let inner = self.inner.lock().unwrap();
        let entry = inner
            .user_books
            .iter()
            .find(|ub| ub.user_id == user_id && ub.id == user_book_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Shelf entry {} not found", user_book_id)))?;
        let book = inner
            .books
            .iter()
            .find(|b| b.id == entry.book_id)
            .cloned()
            .expect("user_book points at a seeded book");
        Ok(ShelfEntry { entry, book })
    }

    async fn find_shelf_entry_by_book(
        &self,
        user_id: Uuid,
        book_id: Uuid,
    ) -> PortResult<Option<UserBook>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .user_books
            .iter()
            .find(|ub| ub.user_id == user_id && ub.book_id == book_id)
            .cloned())
    }

    async fn add_to_shelf(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        status: BookStatus,
    ) -> PortResult<UserBook> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        if let Some(entry) = inner
            .user_books
            .iter_mut()
            .find(|ub| ub.user_id == user_id && ub.book_id == book_id)
        {
            entry.status = status;
            entry.updated_at = now;
            return Ok(entry.clone());
        }
        let entry = UserBook {
            id: Uuid::new_v4(),
            user_id,
            book_id,
            status,
            current_page: None,
            rating: None,
            start_date: (status == BookStatus::Reading).then(|| now.date_naive()),
            finish_date: None,
            notes: None,
            added_to_shelf_at: now,
            last_progress_at: None,
            updated_at: now,
        };
        inner.user_books.push(entry.clone());
        Ok(entry)
    }

    async fn update_shelf_entry(
        &self,
        user_id: Uuid,
        user_book_id: Uuid,
        patch: &UserBookPatch,
    ) -> PortResult<UserBook> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .user_books
            .iter_mut()
            .find(|ub| ub.user_id == user_id && ub.id == user_book_id)
            .ok_or_else(|| PortError::NotFound(format!("Shelf entry {} not found", user_book_id)))?;
        if let Some(status) = patch.status {
            entry.status = status;
        }
        if let Some(page) = patch.current_page {
            entry.current_page = Some(page);
        }
        if let Some(rating) = patch.rating {
            entry.rating = Some(rating);
        }
        if let Some(notes) = &patch.notes {
            entry.notes = Some(notes.clone());
        }
        if let Some(start) = patch.start_date {
            entry.start_date = Some(start);
        }
        if let Some(finish) = patch.finish_date {
            entry.finish_date = Some(finish);
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn remove_from_shelf(&self, user_id: Uuid, user_book_id: Uuid) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.user_books.len();
        inner
            .user_books
            .retain(|ub| !(ub.user_id == user_id && ub.id == user_book_id));
        if inner.user_books.len() == before {
            return Err(PortError::NotFound(format!(
                "Shelf entry {} not found",
                user_book_id
            )));
        }
        Ok(())
    }

    async fn record_progress(&self, update: &NewProgressUpdate) -> PortResult<ProgressUpdate> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let logged = ProgressUpdate {
            id: Uuid::new_v4(),
            user_book_id: update.user_book_id,
            user_id: update.user_id,
            pages_read: update.pages_read,
            minutes: update.minutes,
            note: update.note.clone(),
            is_public: update.is_public,
            created_at: now,
        };
        inner.progress.push(logged.clone());
        if let Some(entry) = inner
            .user_books
            .iter_mut()
            .find(|ub| ub.id == update.user_book_id && ub.user_id == update.user_id)
        {
            entry.last_progress_at = Some(now);
            entry.updated_at = now;
        }
        Ok(logged)
    }

    async fn list_progress_for_entry(
        &self,
        user_id: Uuid,
        user_book_id: Uuid,
    ) -> PortResult<Vec<ProgressUpdate>> {
        let inner = self.inner.lock().unwrap();
        let mut updates: Vec<ProgressUpdate> = inner
            .progress
            .iter()
            .filter(|p| p.user_id == user_id && p.user_book_id == user_book_id)
            .cloned()
            .collect();
        updates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(updates)
    }

    async fn upsert_review(&self, review: &NewReview) -> PortResult<Review> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        if let Some(existing) = inner
            .reviews
            .iter_mut()
            .find(|r| r.user_id == review.user_id && r.book_id == review.book_id)
        {
            existing.rating = review.rating;
            existing.content = review.content.clone();
            existing.is_public = review.is_public;
            existing.user_book_id = review.user_book_id;
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        let fresh = Review {
            id: Uuid::new_v4(),
            user_id: review.user_id,
            book_id: review.book_id,
            user_book_id: review.user_book_id,
            rating: review.rating,
            content: review.content.clone(),
            is_public: review.is_public,
            created_at: now,
            updated_at: now,
        };
        inner.reviews.push(fresh.clone());
        Ok(fresh)
    }

    async fn list_reviews_for_book(
        &self,
        book_id: Uuid,
        viewer: Option<Uuid>,
    ) -> PortResult<Vec<Review>> {
        let inner = self.inner.lock().unwrap();
        let mut reviews: Vec<Review> = inner
            .reviews
            .iter()
            .filter(|r| r.book_id == book_id)
            .filter(|r| r.is_public || viewer == Some(r.user_id))
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn get_preferences(&self, user_id: Uuid) -> PortResult<Option<UserPreferences>> {
        Ok(self.inner.lock().unwrap().preferences.get(&user_id).cloned())
    }

    async fn upsert_preferences(
        &self,
        user_id: Uuid,
        update: &PreferencesUpdate,
    ) -> PortResult<UserPreferences> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let prefs = inner
            .preferences
            .entry(user_id)
            .or_insert_with(|| UserPreferences {
                id: user_id,
                favorite_genres: Vec::new(),
                books_read_count: None,
                pages_per_day: 20,
                yearly_goal: 12,
                onboarding_completed: false,
                created_at: now,
                updated_at: now,
            });
        prefs.favorite_genres = update.favorite_genres.clone();
        prefs.books_read_count = update.books_read_count.clone();
        prefs.pages_per_day = update.pages_per_day;
        prefs.yearly_goal = update.yearly_goal;
        prefs.onboarding_completed = update.onboarding_completed;
        prefs.updated_at = now;
        Ok(prefs.clone())
    }

    async fn find_friendship(&self, a: Uuid, b: Uuid) -> PortResult<Option<Friendship>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .friendships
            .iter()
            .find(|f| {
                (f.requester_id == a && f.addressee_id == b)
                    || (f.requester_id == b && f.addressee_id == a)
            })
            .cloned())
    }

    async fn create_friend_request(
        &self,
        requester: Uuid,
        addressee: Uuid,
    ) -> PortResult<Friendship> {
        let mut inner = self.inner.lock().unwrap();
        let exists = inner
            .friendships
            .iter()
            .any(|f| f.requester_id == requester && f.addressee_id == addressee);
        if exists {
            return Err(PortError::Invalid(
                "A friend request already exists".to_string(),
            ));
        }
        let friendship = Friendship {
            id: Uuid::new_v4(),
            requester_id: requester,
            addressee_id: addressee,
            status: FriendshipStatus::Pending,
            created_at: Utc::now(),
            responded_at: None,
        };
        inner.friendships.push(friendship.clone());
        Ok(friendship)
    }

    async fn accept_friend_request(
        &self,
        addressee: Uuid,
        friendship_id: Uuid,
    ) -> PortResult<Friendship> {
        let mut inner = self.inner.lock().unwrap();
        let friendship = inner
            .friendships
            .iter_mut()
            .find(|f| {
                f.id == friendship_id
                    && f.addressee_id == addressee
                    && f.status == FriendshipStatus::Pending
            })
            .ok_or_else(|| {
                PortError::NotFound(format!("Friend request {} not found", friendship_id))
            })?;
        friendship.status = FriendshipStatus::Accepted;
        friendship.responded_at = Some(Utc::now());
        Ok(friendship.clone())
    }

    async fn decline_friend_request(
        &self,
        addressee: Uuid,
        friendship_id: Uuid,
    ) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.friendships.len();
        inner.friendships.retain(|f| {
            !(f.id == friendship_id
                && f.addressee_id == addressee
                && f.status == FriendshipStatus::Pending)
        });
        if inner.friendships.len() == before {
            return Err(PortError::NotFound(format!(
                "Friend request {} not found",
                friendship_id
            )));
        }
        Ok(())
    }

    async fn list_friends(&self, user_id: Uuid) -> PortResult<Vec<FriendEntry>> {
        let inner = self.inner.lock().unwrap();
        let mut friends: Vec<FriendEntry> = inner
            .friendships
            .iter()
            .filter(|f| f.status == FriendshipStatus::Accepted)
            .filter(|f| f.requester_id == user_id || f.addressee_id == user_id)
            .filter_map(|f| {
                let peer_id = if f.requester_id == user_id {
                    f.addressee_id
                } else {
                    f.requester_id
                };
                let profile = inner.profiles.get(&peer_id)?.clone();
                let mut reading: Vec<&UserBook> = inner
                    .user_books
                    .iter()
                    .filter(|ub| ub.user_id == peer_id && ub.status == BookStatus::Reading)
                    .collect();
                reading.sort_by(|a, b| match (b.last_progress_at, a.last_progress_at) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Greater,
                    (None, Some(_)) => std::cmp::Ordering::Less,
                    (None, None) => std::cmp::Ordering::Equal,
                });
                let currently_reading = reading.first().and_then(|ub| {
                    inner
                        .books
                        .iter()
                        .find(|b| b.id == ub.book_id)
                        .map(|b| b.title.clone())
                });
                Some(FriendEntry {
                    profile,
                    currently_reading,
                    friends_since: f.responded_at.unwrap_or(f.created_at),
                })
            })
            .collect();
        friends.sort_by(|a, b| b.friends_since.cmp(&a.friends_since));
        Ok(friends)
    }

    async fn list_incoming_requests(&self, user_id: Uuid) -> PortResult<Vec<FriendRequest>> {
        let inner = self.inner.lock().unwrap();
        let mut requests: Vec<FriendRequest> = inner
            .friendships
            .iter()
            .filter(|f| f.addressee_id == user_id && f.status == FriendshipStatus::Pending)
            .filter_map(|f| {
                inner.profiles.get(&f.requester_id).map(|p| FriendRequest {
                    id: f.id,
                    from: p.clone(),
                    requested_at: f.created_at,
                })
            })
            .collect();
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(requests)
    }

    async fn send_message(
        &self,
        sender: Uuid,
        recipient: Uuid,
        body: &str,
    ) -> PortResult<Message> {
        let message = Message {
            id: Uuid::new_v4(),
            sender_id: sender,
            recipient_id: recipient,
            body: body.to_string(),
            sent_at: Utc::now(),
            read_at: None,
        };
        self.inner.lock().unwrap().messages.push(message.clone());
        Ok(message)
    }

    async fn list_conversation(&self, user_id: Uuid, peer_id: Uuid) -> PortResult<Vec<Message>> {
        let inner = self.inner.lock().unwrap();
        let mut thread: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| {
                (m.sender_id == user_id && m.recipient_id == peer_id)
                    || (m.sender_id == peer_id && m.recipient_id == user_id)
            })
            .cloned()
            .collect();
        thread.sort_by(|a, b| a.sent_at.cmp(&b.sent_at));
        Ok(thread)
    }

    async fn mark_conversation_read(&self, user_id: Uuid, peer_id: Uuid) -> PortResult<u64> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let mut changed = 0;
        for message in inner
            .messages
            .iter_mut()
            .filter(|m| m.recipient_id == user_id && m.sender_id == peer_id && m.read_at.is_none())
        {
            message.read_at = Some(now);
            changed += 1;
        }
        Ok(changed)
    }

    async fn list_conversations(&self, user_id: Uuid) -> PortResult<Vec<ConversationSummary>> {
        let inner = self.inner.lock().unwrap();
        let mut latest: HashMap<Uuid, Message> = HashMap::new();
        for message in inner
            .messages
            .iter()
            .filter(|m| m.sender_id == user_id || m.recipient_id == user_id)
        {
            let peer_id = if message.sender_id == user_id {
                message.recipient_id
            } else {
                message.sender_id
            };
            let replace = latest
                .get(&peer_id)
                .is_none_or(|current| message.sent_at > current.sent_at);
            if replace {
                latest.insert(peer_id, message.clone());
            }
        }
        let mut summaries: Vec<ConversationSummary> = latest
            .into_iter()
            .filter_map(|(peer_id, last_message)| {
                let peer = inner.profiles.get(&peer_id)?.clone();
                let unread_count = inner
                    .messages
                    .iter()
                    .filter(|m| {
                        m.sender_id == peer_id && m.recipient_id == user_id && m.read_at.is_none()
                    })
                    .count() as i64;
                Some(ConversationSummary {
                    peer,
                    last_message,
                    unread_count,
                })
            })
            .collect();
        summaries.sort_by(|a, b| b.last_message.sent_at.cmp(&a.last_message.sent_at));
        Ok(summaries)
    }
}

#[async_trait]
impl ProfileBootstrap for FakeDb {
    async fn ensure_profile(&self, profile: &NewProfile) -> PortResult<()> {
        self.create_profile_if_absent(profile).await
    }
}

//=========================================================================================
// Canned Book Search
//=========================================================================================

/// A `BookSearchService` that answers every query with the hits it was
/// built with, filtered by a case-insensitive title match.
pub struct FakeBooks {
    hits: Vec<BookSearchHit>,
}

impl FakeBooks {
    pub fn new(hits: Vec<BookSearchHit>) -> Self {
        Self { hits }
    }
}

#[async_trait]
impl BookSearchService for FakeBooks {
    async fn search(&self, query: &str, max_results: u32) -> PortResult<SearchOutcome> {
        let needle = query.to_lowercase();
        let hits = self
            .hits
            .iter()
            .filter(|hit| hit.title.to_lowercase().contains(&needle))
            .take(max_results as usize)
            .cloned()
            .collect();
        Ok(SearchOutcome {
            source: SearchSource::Live,
            hits,
        })
    }
}

pub fn hit(title: &str, author: &str) -> BookSearchHit {
    BookSearchHit {
        external_id: Some(format!("ext-{}", title.to_lowercase().replace(' ', "-"))),
        title: title.to_string(),
        authors: vec![author.to_string()],
        cover_url: None,
        description: None,
        total_pages: Some(300),
        published_date: Some("2020".to_string()),
        publisher: None,
        isbn_13: None,
        isbn_10: None,
        categories: vec!["Fiction".to_string()],
        average_rating: Some(4.0),
    }
}

//=========================================================================================
// Server Harness
//=========================================================================================

pub struct Session {
    pub token: String,
    pub user_id: Uuid,
}

pub struct TestApp {
    pub base_url: String,
    pub db: Arc<FakeDb>,
    pub client: reqwest::Client,
}

fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: String::new(),
        log_level: tracing::Level::INFO,
        books_api_url: "http://127.0.0.1:9".to_string(),
        books_api_key: None,
        session_ttl_days: 30,
        cors_allow_origin: HeaderValue::from_static("http://localhost:3000"),
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with_books(Vec::new()).await
}

pub async fn spawn_app_with_books(hits: Vec<BookSearchHit>) -> TestApp {
    let db = Arc::new(FakeDb::new());
    let state = Arc::new(AppState {
        db: db.clone(),
        books: Arc::new(FakeBooks::new(hits)),
        config: Arc::new(test_config()),
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind an ephemeral port");
    let addr: SocketAddr = listener.local_addr().unwrap();
    let app = api_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestApp {
        base_url: format!("http://{}", addr),
        db,
        // Redirects are asserted on, never followed.
        client: reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap(),
    }
}

pub fn cookie(session: &Session) -> String {
    format!("session={}", session.token)
}

/// Pulls the session token out of a response's Set-Cookie header.
pub fn session_token_from(response: &reqwest::Response) -> Option<String> {
    let raw = response
        .headers()
        .get(reqwest::header::SET_COOKIE)?
        .to_str()
        .ok()?;
    raw.split(';')
        .next()?
        .strip_prefix("session=")
        .map(str::to_string)
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// A request with the session cookie attached.
    pub fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        session: &Session,
    ) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header(reqwest::header::COOKIE, cookie(session))
    }

    /// Signs up a fresh account and returns its session.
    pub async fn signup(&self, email: &str) -> Session {
        let response = self
            .client
            .post(self.url("/auth/signup"))
            .json(&serde_json::json!({ "email": email, "password": TEST_PASSWORD }))
            .send()
            .await
            .expect("signup request");
        assert_eq!(response.status(), 201, "signup failed for {}", email);
        let token = session_token_from(&response).expect("signup sets a session cookie");
        let body: serde_json::Value = response.json().await.unwrap();
        let user_id = Uuid::parse_str(body["user_id"].as_str().unwrap()).unwrap();
        Session { token, user_id }
    }

    /// Adds a manually-entered book to the user's shelf and returns the
    /// shelf entry as served.
    pub async fn add_manual_book(
        &self,
        session: &Session,
        title: &str,
        total_pages: Option<i32>,
        status: &str,
    ) -> serde_json::Value {
        let response = self
            .request(reqwest::Method::POST, "/api/shelf", session)
            .json(&serde_json::json!({
                "book": {
                    "kind": "manual_entry",
                    "title": title,
                    "author": "Test Author",
                    "total_pages": total_pages,
                },
                "status": status,
            }))
            .send()
            .await
            .expect("add to shelf");
        assert_eq!(response.status(), 201, "adding {} to the shelf failed", title);
        response.json().await.unwrap()
    }
}
