//! Imports seed articles from a paginated blog listing.
//!
//! The oldest posts live on the last listing page, so the importer reads the
//! pagination links first and then scrapes the posts linked from that page.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use tokio::time::sleep;
use tracing::{info, warn};
use url::Url;

use ar_core::{excerpt_of, ArticleStore, CandidateReference, ContentExtractor, Error, NewArticle, Result};

use crate::extractor::{ExtractionProfile, Extractor, ExtractorConfig};

pub const DEFAULT_BLOG_URL: &str = "https://beyondchats.com/blogs/";
pub const IMPORT_AUTHOR: &str = "BeyondChats";

lazy_static! {
    static ref PAGINATION: Selector = Selector::parse(".pagination a, .page-link, .page-numbers").unwrap();
    static ref BLOG_LINK: Selector = Selector::parse("a[href*='/blogs/']").unwrap();
}

#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub listing_url: String,
    pub limit: usize,
    pub pacing: Duration,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            listing_url: DEFAULT_BLOG_URL.to_string(),
            limit: 5,
            pacing: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub links_found: usize,
    pub saved: Vec<i64>,
    pub failed: usize,
}

pub struct BlogImporter {
    store: Arc<dyn ArticleStore>,
    extractor: Extractor,
    config: ImportConfig,
}

impl BlogImporter {
    pub fn new(store: Arc<dyn ArticleStore>, extractor_config: &ExtractorConfig, config: ImportConfig) -> Result<Self> {
        Ok(Self {
            store,
            extractor: Extractor::new(extractor_config, ExtractionProfile::full_article())?,
            config,
        })
    }

    pub async fn import(&self) -> Result<ImportReport> {
        let listing = Url::parse(&self.config.listing_url)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", self.config.listing_url, e)))?;

        info!("🕸️ Scraping blog listing {}", listing);
        let first_page = self.extractor.fetch_html(listing.as_str()).await?;
        let last_page = last_page_url(&listing, &first_page);

        info!("📄 Scraping last page: {}", last_page);
        let page = if last_page == listing {
            first_page
        } else {
            self.extractor.fetch_html(last_page.as_str()).await?
        };

        let links = collect_links(&page, &listing);
        let mut report = ImportReport {
            links_found: links.len(),
            ..ImportReport::default()
        };
        info!("🔗 Found {} blog links on last page", links.len());
        if links.is_empty() {
            warn!("❌ No blog links detected on last page");
            return Ok(report);
        }

        let today = Utc::now().date_naive();
        for (i, link) in links.iter().take(self.config.limit).enumerate() {
            if i > 0 && !self.config.pacing.is_zero() {
                sleep(self.config.pacing).await;
            }
            info!("📰 Scraping full content [{}]: {}", i + 1, link.title);
            let scraped = self.extractor.extract(&link.url).await;

            let article = NewArticle {
                title: link.title.clone(),
                excerpt: Some(excerpt_of(&scraped.content)),
                content: scraped.content,
                url: Some(link.url.clone()),
                author: Some(IMPORT_AUTHOR.to_string()),
                published_date: Some(today),
                is_updated: false,
                references: Vec::new(),
                original_article_id: None,
            };
            match self.store.create_article(&article).await {
                Ok(id) => {
                    info!("💾 Saved: {} (id {})", article.title, id);
                    report.saved.push(id);
                }
                Err(e) => {
                    warn!("❌ Failed to save {}: {}", article.title, e);
                    report.failed += 1;
                }
            }
        }

        info!("✅ Imported {} articles", report.saved.len());
        Ok(report)
    }
}

/// The listing page with the highest page number found in its pagination links.
pub fn last_page_url(listing: &Url, html: &str) -> Url {
    let doc = Html::parse_document(html);
    let last = doc
        .root_element()
        .select(&PAGINATION)
        .filter_map(|el| el.text().collect::<String>().trim().parse::<u32>().ok())
        .max()
        .unwrap_or(1);

    if last <= 1 {
        return listing.clone();
    }
    let mut url = listing.clone();
    url.query_pairs_mut().append_pair("page", &last.to_string());
    url
}

/// Unique post links on a listing page, resolved against `base`.
pub fn collect_links(html: &str, base: &Url) -> Vec<CandidateReference> {
    let doc = Html::parse_document(html);
    let mut links: Vec<CandidateReference> = Vec::new();

    for anchor in doc.root_element().select(&BLOG_LINK) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let title = anchor.text().collect::<Vec<_>>().join(" ");
        let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
        if title.is_empty() {
            continue;
        }
        let Ok(url) = base.join(href.trim()) else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }
        let url = url.to_string();
        if links.iter().all(|l| l.url != url) {
            links.push(CandidateReference::new(title, url));
        }
    }

    links
}
