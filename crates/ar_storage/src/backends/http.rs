use std::time::Duration;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use ar_core::{ArticleStore, Error, NewArticle, Result, SeedArticle, ValidationErrors};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    errors: Option<ValidationErrors>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct Created {
    id: i64,
}

/// Article store backed by the article REST API.
#[derive(Debug, Clone)]
pub struct HttpArticleStore {
    client: Client,
    base_url: String,
}

impl HttpArticleStore {
    pub fn new(base_url: &str) -> Result<Self> {
        url::Url::parse(base_url).map_err(|e| Error::InvalidUrl(format!("{}: {}", base_url, e)))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ArticleStore for HttpArticleStore {
    async fn latest_unprocessed(&self) -> Result<Option<SeedArticle>> {
        let url = format!("{}/articles/latest", self.base_url);
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::Storage(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        let envelope = response.json::<Envelope<SeedArticle>>().await?;
        Ok(envelope.data)
    }

    async fn create_article(&self, article: &NewArticle) -> Result<i64> {
        let url = format!("{}/articles", self.base_url);
        debug!("POST {}", url);
        let response = self.client.post(&url).json(article).send().await?;
        let status = response.status();

        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let envelope = response.json::<Envelope<Created>>().await?;
            return Err(Error::Rejected(envelope.errors.unwrap_or_default()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Storage(format!("{} returned {}: {}", url, status, body)));
        }

        let envelope = response.json::<Envelope<Created>>().await?;
        envelope.data.map(|created| created.id).ok_or_else(|| {
            Error::Storage(format!(
                "create response carried no article id{}",
                envelope.message.map(|m| format!(" ({})", m)).unwrap_or_default()
            ))
        })
    }
}
