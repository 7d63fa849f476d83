use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use ar_core::{ArticleStore, Error, NewArticle, Result, SeedArticle};
use crate::validation::validate_new_article;

/// A stored row; ids are assigned in creation order.
#[derive(Debug, Clone)]
pub struct StoredArticle {
    pub id: i64,
    pub article: NewArticle,
}

#[derive(Default)]
struct MemoryStore {
    articles: Vec<StoredArticle>,
    next_id: i64,
}

impl MemoryStore {
    fn insert(&mut self, article: &NewArticle) -> Result<i64> {
        let errors = validate_new_article(article, |id| self.articles.iter().any(|a| a.id == id));
        if !errors.is_empty() {
            return Err(Error::Rejected(errors));
        }
        self.next_id += 1;
        self.articles.push(StoredArticle {
            id: self.next_id,
            article: article.clone(),
        });
        Ok(self.next_id)
    }

    fn latest_unprocessed(&self) -> Option<SeedArticle> {
        self.articles
            .iter()
            .rev()
            .find(|a| !a.article.is_updated)
            .map(|a| SeedArticle {
                id: a.id,
                title: a.article.title.clone(),
                content: a.article.content.clone(),
                author: a.article.author.clone(),
                published_date: a.article.published_date,
            })
    }
}

/// In-process article store for dry runs and tests.
#[derive(Clone, Default)]
pub struct MemoryArticleStore {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn articles(&self) -> Vec<StoredArticle> {
        self.store.read().await.articles.clone()
    }
}

#[async_trait]
impl ArticleStore for MemoryArticleStore {
    async fn latest_unprocessed(&self) -> Result<Option<SeedArticle>> {
        Ok(self.store.read().await.latest_unprocessed())
    }

    async fn create_article(&self, article: &NewArticle) -> Result<i64> {
        self.store.write().await.insert(article)
    }
}
