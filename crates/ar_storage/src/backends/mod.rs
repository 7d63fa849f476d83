pub mod http;
pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use http::HttpArticleStore;
pub use memory::MemoryArticleStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SQLiteArticleStore;
