pub mod discover;
pub mod domain;
pub mod guard;
pub mod ports;
pub mod session;
pub mod shelf;

pub use domain::{
    AuthSession, AuthUser, Book, BookDraft, BookSearchHit, BookStatus, NewBook, Profile,
    SearchOutcome, SearchSource, ShelfEntry, SignUpMetadata, UserBook, UserCredentials,
};
pub use guard::GuardDecision;
pub use ports::{
    AuthChange, BookSearchService, DatabaseService, IdentityService, PortError, PortResult,
    ProfileBootstrap,
};
pub use session::{SessionSnapshot, SessionStore};
