//! services/api/src/adapters/identity.rs
//!
//! This module contains the HTTP client adapter for the identity backend.
//! It implements the `IdentityService` port from the `core` crate against the
//! service's own `/auth` endpoints, holding the session token between calls
//! and fanning auth events out to change-feed subscribers.

use std::pin::Pin;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use shelfmark_core::domain::{AuthSession, AuthUser, SignUpMetadata};
use shelfmark_core::ports::{AuthChange, IdentityService, PortError, PortResult};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::web::auth::SESSION_COOKIE;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `IdentityService` port by calling the
/// service's own auth endpoints over HTTP.
pub struct HttpIdentityClient {
    http: reqwest::Client,
    base_url: String,
    /// The current session token. Held here rather than in a cookie jar:
    /// the cookie is marked `Secure`, and a jar would silently refuse to
    /// replay it to a plain-http development server.
    token: Mutex<Option<String>>,
    listeners: Mutex<Vec<mpsc::UnboundedSender<AuthChange>>>,
}

impl HttpIdentityClient {
    /// Creates a new `HttpIdentityClient`.
    pub fn new(base_url: String) -> PortResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| PortError::Unexpected(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url,
            token: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn stored_token(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_token(&self, token: Option<String>) {
        *self
            .token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = token;
    }

    /// Attaches the session cookie to a request when signed in.
    fn with_session(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.stored_token() {
            Some(token) => request.header(
                reqwest::header::COOKIE,
                format!("{}={}", SESSION_COOKIE, token),
            ),
            None => request,
        }
    }

    /// Pushes one event to every live subscriber, dropping closed ones.
    fn broadcast(&self, change: AuthChange) {
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        listeners.retain(|tx| tx.send(change.clone()).is_ok());
    }

    /// Reads the session cookie plus the JSON body of a successful auth
    /// response and assembles the session.
    async fn session_from_response(&self, response: reqwest::Response) -> PortResult<AuthSession> {
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }
        let token = response
            .cookies()
            .find(|cookie| cookie.name() == SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string());
        let body: AuthResponseBody = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Bad auth response: {}", e)))?;
        let token = token.ok_or_else(|| {
            PortError::Unexpected("Auth response did not set a session cookie".to_string())
        })?;
        Ok(AuthSession {
            token,
            user: AuthUser {
                id: body.user_id,
                email: body.email,
            },
            expires_at: body.expires_at,
        })
    }
}

fn transport(e: reqwest::Error) -> PortError {
    PortError::Unexpected(format!("Identity request failed: {}", e))
}

/// Maps a failed auth response to a port error, keeping the server's
/// message where there is one.
async fn error_from(response: reqwest::Response) -> PortError {
    let status = response.status();
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => PortError::Invalid(message),
        StatusCode::NOT_FOUND => PortError::NotFound(message),
        _ => PortError::Unexpected(message),
    }
}

//=========================================================================================
// `IdentityService` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityService for HttpIdentityClient {
    async fn get_session(&self) -> PortResult<Option<AuthSession>> {
        let response = self
            .with_session(self.http.get(self.endpoint("/auth/session")))
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }
        let envelope: SessionEnvelope = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Bad session response: {}", e)))?;
        Ok(envelope.session.map(|body| AuthSession {
            token: body.token,
            user: AuthUser {
                id: body.user_id,
                email: body.email,
            },
            expires_at: body.expires_at,
        }))
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> PortResult<AuthSession> {
        let response = self
            .http
            .post(self.endpoint("/auth/login"))
            .json(&LoginBody { email, password })
            .send()
            .await
            .map_err(transport)?;
        let session = self.session_from_response(response).await?;
        self.set_token(Some(session.token.clone()));
        self.broadcast(AuthChange::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
    ) -> PortResult<AuthSession> {
        let response = self
            .http
            .post(self.endpoint("/auth/signup"))
            .json(&SignupBody {
                email,
                password,
                full_name: metadata.full_name.as_deref(),
            })
            .send()
            .await
            .map_err(transport)?;
        let session = self.session_from_response(response).await?;
        self.set_token(Some(session.token.clone()));
        self.broadcast(AuthChange::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> PortResult<()> {
        let response = self
            .with_session(self.http.post(self.endpoint("/auth/logout")))
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }
        self.set_token(None);
        self.broadcast(AuthChange::SignedOut);
        Ok(())
    }

    fn on_auth_state_change(&self) -> Pin<Box<dyn Stream<Item = AuthChange> + Send>> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(tx);
        Box::pin(async_stream::stream! {
            while let Some(change) = rx.recv().await {
                yield change;
            }
        })
    }
}

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignupBody<'a> {
    email: &'a str,
    password: &'a str,
    full_name: Option<&'a str>,
}

#[derive(Deserialize)]
struct AuthResponseBody {
    user_id: Uuid,
    email: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct SessionEnvelope {
    session: Option<SessionBody>,
}

#[derive(Deserialize)]
struct SessionBody {
    token: String,
    user_id: Uuid,
    email: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}
