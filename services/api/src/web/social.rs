//! services/api/src/web/social.rs
//!
//! Friends and direct messages: request/accept/decline, the friends list
//! with live reading status, conversation summaries, and threads.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfmark_core::domain::{
    AuthUser, ConversationSummary, FriendEntry, FriendRequest, Friendship, FriendshipStatus,
    Message,
};
use shelfmark_core::ports::PortError;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::profile::ProfileDto;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct FriendDto {
    pub profile: ProfileDto,
    /// Title of the book they are currently reading, if any.
    pub currently_reading: Option<String>,
    pub friends_since: DateTime<Utc>,
}

impl From<FriendEntry> for FriendDto {
    fn from(entry: FriendEntry) -> Self {
        Self {
            profile: ProfileDto::from(entry.profile),
            currently_reading: entry.currently_reading,
            friends_since: entry.friends_since,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct FriendRequestDto {
    pub id: Uuid,
    pub from: ProfileDto,
    pub requested_at: DateTime<Utc>,
}

impl From<FriendRequest> for FriendRequestDto {
    fn from(request: FriendRequest) -> Self {
        Self {
            id: request.id,
            from: ProfileDto::from(request.from),
            requested_at: request.requested_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct FriendsResponse {
    pub friends: Vec<FriendDto>,
    pub incoming_requests: Vec<FriendRequestDto>,
}

#[derive(Deserialize, ToSchema)]
pub struct FriendRequestBody {
    pub username: String,
}

#[derive(Serialize, ToSchema)]
pub struct FriendshipDto {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub addressee_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl From<Friendship> for FriendshipDto {
    fn from(friendship: Friendship) -> Self {
        Self {
            id: friendship.id,
            requester_id: friendship.requester_id,
            addressee_id: friendship.addressee_id,
            status: friendship.status.as_str().to_string(),
            created_at: friendship.created_at,
            responded_at: friendship.responded_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct MessageDto {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl From<Message> for MessageDto {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            body: message.body,
            sent_at: message.sent_at,
            read_at: message.read_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ConversationDto {
    pub peer: ProfileDto,
    pub last_message: MessageDto,
    pub unread_count: i64,
}

impl From<ConversationSummary> for ConversationDto {
    fn from(summary: ConversationSummary) -> Self {
        Self {
            peer: ProfileDto::from(summary.peer),
            last_message: MessageDto::from(summary.last_message),
            unread_count: summary.unread_count,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SendMessageBody {
    pub body: String,
}

//=========================================================================================
// Friend Handlers
//=========================================================================================

/// GET /api/friends - Accepted friends plus pending incoming requests
#[utoipa::path(
    get,
    path = "/api/friends",
    responses(
        (status = 200, description = "Friends and incoming requests", body = FriendsResponse)
    ),
    tag = "social"
)]
pub async fn list_friends_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<FriendsResponse>, ApiError> {
    let friends = state.db.list_friends(user.id).await?;
    let incoming = state.db.list_incoming_requests(user.id).await?;
    Ok(Json(FriendsResponse {
        friends: friends.into_iter().map(FriendDto::from).collect(),
        incoming_requests: incoming.into_iter().map(FriendRequestDto::from).collect(),
    }))
}

/// POST /api/friends/requests - Send a friend request by username
#[utoipa::path(
    post,
    path = "/api/friends/requests",
    request_body = FriendRequestBody,
    responses(
        (status = 201, description = "Request sent", body = FriendshipDto),
        (status = 400, description = "Already befriended or requested"),
        (status = 404, description = "Unknown username")
    ),
    tag = "social"
)]
pub async fn send_friend_request_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<FriendRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let target = state.db.get_profile_by_username(req.username.trim()).await?;
    if target.id == user.id {
        return Err(PortError::Invalid("You cannot befriend yourself".to_string()).into());
    }
    if let Some(existing) = state.db.find_friendship(user.id, target.id).await? {
        let message = match existing.status {
            FriendshipStatus::Accepted => "You are already friends",
            FriendshipStatus::Pending => "A friend request already exists",
        };
        return Err(PortError::Invalid(message.to_string()).into());
    }
    let friendship = state.db.create_friend_request(user.id, target.id).await?;
    Ok((StatusCode::CREATED, Json(FriendshipDto::from(friendship))))
}

/// POST /api/friends/requests/{id}/accept - Accept an incoming request
#[utoipa::path(
    post,
    path = "/api/friends/requests/{id}/accept",
    params(("id" = Uuid, Path, description = "Friendship id")),
    responses(
        (status = 200, description = "Now friends", body = FriendshipDto),
        (status = 404, description = "No such pending request addressed to the caller")
    ),
    tag = "social"
)]
pub async fn accept_friend_request_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<FriendshipDto>, ApiError> {
    let friendship = state.db.accept_friend_request(user.id, id).await?;
    Ok(Json(FriendshipDto::from(friendship)))
}

/// POST /api/friends/requests/{id}/decline - Decline an incoming request
#[utoipa::path(
    post,
    path = "/api/friends/requests/{id}/decline",
    params(("id" = Uuid, Path, description = "Friendship id")),
    responses(
        (status = 204, description = "Request removed"),
        (status = 404, description = "No such pending request addressed to the caller")
    ),
    tag = "social"
)]
pub async fn decline_friend_request_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.db.decline_friend_request(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Message Handlers
//=========================================================================================

/// GET /api/messages - Conversation summaries, newest first
#[utoipa::path(
    get,
    path = "/api/messages",
    responses(
        (status = 200, description = "One summary per peer", body = [ConversationDto])
    ),
    tag = "social"
)]
pub async fn list_conversations_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<ConversationDto>>, ApiError> {
    let conversations = state.db.list_conversations(user.id).await?;
    Ok(Json(
        conversations.into_iter().map(ConversationDto::from).collect(),
    ))
}

/// GET /api/messages/{user_id} - One thread, oldest first
///
/// Opening a thread marks the peer's messages as read.
#[utoipa::path(
    get,
    path = "/api/messages/{user_id}",
    params(("user_id" = Uuid, Path, description = "Peer user id")),
    responses(
        (status = 200, description = "The thread in send order", body = [MessageDto])
    ),
    tag = "social"
)]
pub async fn get_conversation_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(peer_id): Path<Uuid>,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    state.db.mark_conversation_read(user.id, peer_id).await?;
    let messages = state.db.list_conversation(user.id, peer_id).await?;
    Ok(Json(messages.into_iter().map(MessageDto::from).collect()))
}

/// POST /api/messages/{user_id} - Send a direct message to a friend
#[utoipa::path(
    post,
    path = "/api/messages/{user_id}",
    params(("user_id" = Uuid, Path, description = "Peer user id")),
    request_body = SendMessageBody,
    responses(
        (status = 201, description = "The sent message", body = MessageDto),
        (status = 400, description = "Empty body or not friends")
    ),
    tag = "social"
)]
pub async fn send_message_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(peer_id): Path<Uuid>,
    Json(req): Json<SendMessageBody>,
) -> Result<impl IntoResponse, ApiError> {
    let body = req.body.trim();
    if body.is_empty() {
        return Err(PortError::Invalid("Message cannot be empty".to_string()).into());
    }
    let befriended = state
        .db
        .find_friendship(user.id, peer_id)
        .await?
        .map(|f| f.status == FriendshipStatus::Accepted)
        .unwrap_or(false);
    if !befriended {
        return Err(PortError::Invalid("You can only message friends".to_string()).into());
    }
    let message = state.db.send_message(user.id, peer_id, body).await?;
    Ok((StatusCode::CREATED, Json(MessageDto::from(message))))
}
