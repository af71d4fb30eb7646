pub mod books;
pub mod db;
pub mod identity;

pub use books::GoogleBooksAdapter;
pub use db::DbAdapter;
pub use identity::HttpIdentityClient;
