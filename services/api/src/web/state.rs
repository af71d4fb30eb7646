//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use shelfmark_core::ports::{BookSearchService, DatabaseService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub books: Arc<dyn BookSearchService>,
    pub config: Arc<Config>,
}
