use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Characters kept from the final content when deriving the excerpt.
pub const EXCERPT_CHARS: usize = 200;

/// Author recorded on rewritten articles whose seed has none.
pub const DEFAULT_AUTHOR: &str = "AI Editor";

/// An existing article chosen as the basis for a rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedArticle {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, with = "lenient_date")]
    pub published_date: Option<NaiveDate>,
}

/// A discovered external page considered as supporting material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateReference {
    pub title: String,
    pub url: String,
}

impl CandidateReference {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub url: String,
    pub title: String,
    pub content: String,
    pub success: bool,
}

impl ScrapeResult {
    /// Builds a result whose `success` flag is derived from the content length.
    pub fn from_text(url: &str, title: String, content: String, min_length: usize) -> Self {
        let success = content.chars().count() > min_length;
        Self {
            url: url.to_string(),
            title,
            content,
            success,
        }
    }

    pub fn failed(url: &str, sentinel: &str) -> Self {
        Self {
            url: url.to_string(),
            title: String::new(),
            content: sentinel.to_string(),
            success: false,
        }
    }
}

/// Whether the model's rewrite was used or the original was kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RewriteOutcome {
    Enhanced,
    Degraded { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteResult {
    pub title: String,
    pub content: String,
    pub reference_urls: Vec<String>,
    pub outcome: RewriteOutcome,
}

impl RewriteResult {
    pub fn is_degraded(&self) -> bool {
        matches!(self.outcome, RewriteOutcome::Degraded { .. })
    }
}

/// The rewritten article handed to the persistence sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalArticle {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub is_updated: bool,
    pub original_article_id: i64,
    pub author: String,
    pub published_date: NaiveDate,
    #[serde(rename = "references")]
    pub reference_urls: Vec<String>,
}

impl FinalArticle {
    /// Combines the seed, the rewrite and the already rendered citation section.
    pub fn assemble(
        seed: &SeedArticle,
        rewrite: RewriteResult,
        citation_section: &str,
        published_date: NaiveDate,
    ) -> Self {
        let content = format!("{}{}", rewrite.content, citation_section);
        let excerpt = excerpt_of(&content);
        Self {
            title: rewrite.title,
            content,
            excerpt,
            is_updated: true,
            original_article_id: seed.id,
            author: seed
                .author
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .unwrap_or(DEFAULT_AUTHOR)
                .to_string(),
            published_date,
            reference_urls: rewrite.reference_urls,
        }
    }
}

/// Payload accepted by the article sink, shared by rewritten and imported articles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub published_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_updated: bool,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub original_article_id: Option<i64>,
}

impl From<&FinalArticle> for NewArticle {
    fn from(article: &FinalArticle) -> Self {
        Self {
            title: article.title.clone(),
            content: article.content.clone(),
            excerpt: Some(article.excerpt.clone()),
            url: None,
            author: Some(article.author.clone()),
            published_date: Some(article.published_date),
            is_updated: article.is_updated,
            references: article.reference_urls.clone(),
            original_article_id: Some(article.original_article_id),
        }
    }
}

/// First [`EXCERPT_CHARS`] characters followed by an ellipsis marker.
pub fn excerpt_of(content: &str) -> String {
    let head: String = content.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", head)
}

/// Accepts `YYYY-MM-DD` as well as full timestamps, keeping only the date.
mod lenient_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => s.serialize_str(&d.format("%Y-%m-%d").to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        Ok(raw.and_then(|value| {
            let head: String = value.trim().chars().take(10).collect();
            NaiveDate::parse_from_str(&head, "%Y-%m-%d").ok()
        }))
    }
}
