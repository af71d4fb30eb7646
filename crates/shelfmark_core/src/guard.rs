//! crates/shelfmark_core/src/guard.rs
//!
//! Pure routing policy: given the current auth snapshot and location,
//! decide whether to stay or redirect. The decision is a value; callers
//! (the page router, tests) perform the actual navigation.

use crate::session::SessionSnapshot;

pub const DASHBOARD: &str = "/dashboard";
pub const SIGN_IN: &str = "/auth/signin";
const SIGN_OUT: &str = "/auth/signout";

/// Route prefixes that require a session. Matching is segment-aware:
/// "/books/track" is protected, "/booksmith" is not.
pub const PROTECTED_PREFIXES: [&str; 5] =
    ["/dashboard", "/books", "/friends", "/messages", "/profile"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Stay,
    Redirect(String),
}

/// Applies the routing rules in priority order:
///
/// 1. While auth state is loading, stay put; never redirect on a guess.
/// 2. Signed in on an auth page: go to the sanitized `redirect` query
///    param, or the dashboard.
/// 3. Signed in on the landing page: go to the dashboard.
/// 4. Signed out on a protected path: go to sign-in, carrying the full
///    current location in a `redirect` param.
/// 5. Otherwise stay.
///
/// A redirect targeting the current location collapses to `Stay`, so
/// re-running the guard after navigation is always a no-op.
pub fn decide(snapshot: &SessionSnapshot, path: &str, query: &str) -> GuardDecision {
    if snapshot.loading {
        return GuardDecision::Stay;
    }
    let signed_in = snapshot.session.is_some();

    let target = if signed_in && is_auth_page(path) {
        Some(post_auth_destination(query))
    } else if signed_in && path == "/" {
        Some(DASHBOARD.to_string())
    } else if !signed_in && is_protected(path) {
        Some(sign_in_with_return_to(path, query))
    } else {
        None
    };

    match target {
        Some(t) if t != full_location(path, query) => GuardDecision::Redirect(t),
        _ => GuardDecision::Stay,
    }
}

/// Whether a path requires a session.
pub fn is_protected(path: &str) -> bool {
    PROTECTED_PREFIXES.iter().any(|prefix| {
        path == *prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// Sign-in and sign-up live under /auth. The sign-out page is excluded:
/// it must stay reachable while a session still exists.
fn is_auth_page(path: &str) -> bool {
    (path == "/auth" || path.starts_with("/auth/")) && path != SIGN_OUT
}

/// Where to land after authenticating on an auth page: the `redirect`
/// query param when present and safe, else the dashboard. Only local
/// paths are honored; anything not starting with a single '/' falls
/// back, which keeps open-redirect targets out.
fn post_auth_destination(query: &str) -> String {
    redirect_param(query)
        .filter(|t| t.starts_with('/') && !t.starts_with("//"))
        .unwrap_or_else(|| DASHBOARD.to_string())
}

fn sign_in_with_return_to(path: &str, query: &str) -> String {
    let here = full_location(path, query);
    format!("{SIGN_IN}?redirect={}", urlencoding::encode(&here))
}

fn full_location(path: &str, query: &str) -> String {
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{query}")
    }
}

fn redirect_param(query: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "redirect")
        .and_then(|(_, value)| urlencoding::decode(value).ok())
        .map(|decoded| decoded.into_owned())
        .filter(|decoded| !decoded.is_empty())
}
