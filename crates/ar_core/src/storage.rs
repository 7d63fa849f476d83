use async_trait::async_trait;
use crate::types::{NewArticle, SeedArticle};
use crate::Result;

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Most recently created article that is not itself a rewrite
    async fn latest_unprocessed(&self) -> Result<Option<SeedArticle>>;

    /// Persists an article and returns its assigned id.
    ///
    /// Validation failures come back as [`crate::Error::Rejected`].
    async fn create_article(&self, article: &NewArticle) -> Result<i64>;
}
