//! crates/shelfmark_core/src/session.rs
//!
//! The session store: a single-writer, observable holder of the current
//! auth state. It owns the initial session fetch and the identity change
//! feed; everything else reads snapshots or subscribes for changes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::domain::{
    username_from_email, validate_password, AuthSession, NewProfile, SignUpMetadata,
};
use crate::guard::{self, GuardDecision};
use crate::ports::{IdentityService, PortResult, ProfileBootstrap};

/// Where sign-out lands.
pub const SIGNED_OUT_DESTINATION: &str = "/";

/// One observable view of the auth state. `loading` is true from
/// construction until the initial fetch or the first feed event lands;
/// the route guard treats that window as "don't decide yet".
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub loading: bool,
    pub session: Option<AuthSession>,
}

pub struct SessionStore {
    identity: Arc<dyn IdentityService>,
    bootstrap: Arc<dyn ProfileBootstrap>,
    state: watch::Sender<SessionSnapshot>,
    shutdown: CancellationToken,
    /// Set once any authoritative value has been applied (feed event or
    /// explicit sign-in/out). A still-in-flight initial fetch must not
    /// overwrite such a value when it finally resolves.
    settled: AtomicBool,
}

impl SessionStore {
    pub fn new(identity: Arc<dyn IdentityService>, bootstrap: Arc<dyn ProfileBootstrap>) -> Self {
        let (state, _) = watch::channel(SessionSnapshot {
            loading: true,
            session: None,
        });
        SessionStore {
            identity,
            bootstrap,
            state,
            shutdown: CancellationToken::new(),
            settled: AtomicBool::new(false),
        }
    }

    /// Kicks off the initial session fetch and the change-feed pump.
    /// Call once after construction; both tasks stop at `shutdown`.
    pub fn start(self: &Arc<Self>) {
        let store = Arc::clone(self);
        tokio::spawn(async move { store.run_initial_fetch().await });
        let store = Arc::clone(self);
        tokio::spawn(async move { store.pump_changes().await });
    }

    /// Stops the background tasks. A fetch still in flight is abandoned
    /// and its result discarded.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// A receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Runs the route guard against the current snapshot.
    pub fn route_decision(&self, path: &str, query: &str) -> GuardDecision {
        guard::decide(&self.snapshot(), path, query)
    }

    /// Signs in and applies the new session. On failure the state is
    /// left untouched and the error goes back to the caller.
    pub async fn sign_in(&self, email: &str, password: &str) -> PortResult<AuthSession> {
        let session = self.identity.sign_in_with_password(email, password).await?;
        self.apply(Some(session.clone()));
        Ok(session)
    }

    /// Signs up, then best-effort creates the user's profile. The
    /// password rule is checked locally first, so a short password never
    /// reaches the identity backend. A failed profile write is logged
    /// and the sign-up still succeeds; the profile is recreated lazily
    /// elsewhere.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
    ) -> PortResult<AuthSession> {
        validate_password(password)?;
        let session = self
            .identity
            .sign_up(email, password, metadata.clone())
            .await?;
        let profile = NewProfile {
            id: session.user.id,
            username: Some(username_from_email(&session.user.email)),
            full_name: metadata.full_name,
        };
        if let Err(err) = self.bootstrap.ensure_profile(&profile).await {
            warn!(error = %err, user_id = %profile.id, "profile bootstrap after sign-up failed");
        }
        self.apply(Some(session.clone()));
        Ok(session)
    }

    /// Clears the local session and returns the landing route. The
    /// backend call is attempted first, but a failure there never keeps
    /// the user signed in locally.
    pub async fn sign_out(&self) -> &'static str {
        if let Err(err) = self.identity.sign_out().await {
            warn!(error = %err, "backend sign-out failed; clearing local session anyway");
        }
        self.apply(None);
        SIGNED_OUT_DESTINATION
    }

    fn apply(&self, session: Option<AuthSession>) {
        self.settled.store(true, Ordering::Release);
        self.state.send_modify(|snap| {
            snap.session = session;
            snap.loading = false;
        });
    }

    async fn run_initial_fetch(&self) {
        let result = tokio::select! {
            _ = self.shutdown.cancelled() => return,
            result = self.identity.get_session() => result,
        };
        match result {
            Ok(initial) => self.state.send_modify(|snap| {
                // A feed event or an explicit sign-in beat us to it;
                // the stale fetch only gets to clear the loading flag.
                if !self.settled.load(Ordering::Acquire) {
                    snap.session = initial;
                }
                snap.loading = false;
            }),
            Err(err) => {
                warn!(error = %err, "initial session fetch failed; treating as signed out");
                self.state.send_modify(|snap| snap.loading = false);
            }
        }
    }

    async fn pump_changes(&self) {
        let mut feed = self.identity.on_auth_state_change();
        loop {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => return,
                event = feed.next() => match event {
                    Some(event) => event,
                    None => return,
                },
            };
            self.apply(event.session().cloned());
        }
    }
}
