use std::sync::Arc;
use ar_core::{ArticleStore, Error, Result};

pub mod backends;
pub mod validation;

pub use backends::*;

/// Builds the article store named by `kind`.
///
/// `location` is the API base URL for `http` and the database path for `sqlite`.
pub async fn create_store(kind: &str, location: Option<&str>) -> Result<Arc<dyn ArticleStore>> {
    match kind.to_lowercase().as_str() {
        "http" => {
            let base_url = location.unwrap_or(http::DEFAULT_API_URL);
            Ok(Arc::new(HttpArticleStore::new(base_url)?))
        }
        "memory" => Ok(Arc::new(MemoryArticleStore::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let path = std::path::PathBuf::from(location.unwrap_or("articles.db"));
            Ok(Arc::new(SQLiteArticleStore::new_with_path(&path).await?))
        }
        other => Err(Error::Config(format!("Unknown store backend: {}", other))),
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::create_store;
    pub use ar_core::ArticleStore;
}
