//! Finds candidate reference pages for a topic through a search engine.
//!
//! The search page is rendered by a real browser session; the session is
//! opened once per call and closed before [`SearchDiscoverer::discover`]
//! returns, whatever the outcome.

use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use url::Url;

use ar_core::{CandidateReference, Discovery, ReferenceDiscoverer, Result};

pub mod chromium;

pub use chromium::ChromiumBrowser;

/// Placeholders used when the results page never renders (block, CAPTCHA, markup change).
pub const FALLBACK_REFERENCES: [(&str, &str); 2] = [
    ("AI Trends 2025", "https://en.wikipedia.org/wiki/Artificial_intelligence"),
    ("Future of Tech", "https://www.ibm.com/topics/artificial-intelligence"),
];

lazy_static! {
    static ref RESULT_CONTAINER: Selector = Selector::parse("div.g, div[data-sokoban-container]").unwrap();
    static ref RESULT_LINK: Selector = Selector::parse("a[href]").unwrap();
    static ref RESULT_HEADING: Selector = Selector::parse("h3").unwrap();
}

/// A browser able to open one isolated page session.
#[async_trait]
pub trait SearchBrowser: Send + Sync {
    async fn open(&self) -> Result<Box<dyn SearchSession>>;
}

#[async_trait]
pub trait SearchSession: Send {
    async fn goto(&mut self, url: &str) -> Result<()>;

    /// Current rendered DOM.
    async fn content(&mut self) -> Result<String>;

    async fn close(self: Box<Self>) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub search_url: String,
    pub limit: usize,
    /// How long to wait for the results to render
    pub results_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            search_url: "https://www.google.com/search".to_string(),
            limit: 2,
            results_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
        }
    }
}

pub struct SearchDiscoverer<B> {
    browser: B,
    config: DiscoveryConfig,
}

impl<B: SearchBrowser> SearchDiscoverer<B> {
    pub fn new(browser: B, config: DiscoveryConfig) -> Self {
        Self { browser, config }
    }

    pub fn search_url(&self, topic: &str) -> Result<String> {
        let url = Url::parse_with_params(&self.config.search_url, &[("q", topic)])
            .map_err(|e| ar_core::Error::InvalidUrl(format!("{}: {}", self.config.search_url, e)))?;
        Ok(url.to_string())
    }

    async fn search(&self, session: &mut dyn SearchSession, topic: &str) -> Discovery {
        let url = match self.search_url(topic) {
            Ok(url) => url,
            Err(e) => return Discovery::Empty { reason: e.to_string() },
        };
        if let Err(e) = session.goto(&url).await {
            warn!("❌ Search navigation failed: {}", e);
            return Discovery::Empty { reason: e.to_string() };
        }

        match self.wait_for_results(session).await {
            Some(html) => Discovery::Found(parse_results(&html, self.config.limit)),
            None => {
                warn!("⚠️ Search results never rendered; you might be blocked or seeing a CAPTCHA");
                Discovery::Degraded(fallback_references())
            }
        }
    }

    async fn wait_for_results(&self, session: &mut dyn SearchSession) -> Option<String> {
        let deadline = Instant::now() + self.config.results_timeout;
        loop {
            match session.content().await {
                Ok(html) if has_results(&html) => return Some(html),
                Ok(_) => {}
                Err(e) => debug!("Reading search page failed: {}", e),
            }
            if Instant::now() >= deadline {
                return None;
            }
            sleep(self.config.poll_interval).await;
        }
    }
}

#[async_trait]
impl<B: SearchBrowser> ReferenceDiscoverer for SearchDiscoverer<B> {
    async fn discover(&self, topic: &str) -> Discovery {
        let topic = topic.trim();
        if topic.is_empty() {
            return Discovery::Empty {
                reason: "empty search topic".to_string(),
            };
        }

        info!("🔍 Searching for: \"{}\"", topic);
        let mut session = match self.browser.open().await {
            Ok(session) => session,
            Err(e) => {
                warn!("❌ Could not start a browser session: {}", e);
                return Discovery::Empty { reason: e.to_string() };
            }
        };

        let outcome = self.search(session.as_mut(), topic).await;
        if let Err(e) = session.close().await {
            warn!("⚠️ Closing the browser session failed: {}", e);
        }

        match &outcome {
            Discovery::Found(found) => info!("✨ Found {} candidate references", found.len()),
            Discovery::Degraded(found) => info!("🩹 Using {} placeholder references", found.len()),
            Discovery::Empty { reason } => info!("🕳️ No candidate references: {}", reason),
        }
        outcome
    }
}

/// Whether the rendered page carries result headings yet.
pub fn has_results(html: &str) -> bool {
    Html::parse_document(html)
        .root_element()
        .select(&RESULT_HEADING)
        .next()
        .is_some()
}

/// Reads up to `limit` organic results, skipping entries without an absolute http(s) link or heading.
pub fn parse_results(html: &str, limit: usize) -> Vec<CandidateReference> {
    let doc = Html::parse_document(html);
    let mut results: Vec<CandidateReference> = Vec::new();

    for container in doc.root_element().select(&RESULT_CONTAINER) {
        if results.len() >= limit {
            break;
        }
        let Some(href) = container
            .select(&RESULT_LINK)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };
        let Some(url) = absolute_http_url(href) else {
            continue;
        };
        let title = container
            .select(&RESULT_HEADING)
            .next()
            .map(|h| h.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();
        if title.is_empty() || results.iter().any(|r| r.url == url) {
            continue;
        }
        results.push(CandidateReference::new(title, url));
    }

    results
}

fn absolute_http_url(href: &str) -> Option<String> {
    let url = Url::parse(href.trim()).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Some(url.to_string()),
        _ => None,
    }
}

pub fn fallback_references() -> Vec<CandidateReference> {
    FALLBACK_REFERENCES
        .iter()
        .map(|(title, url)| CandidateReference::new(*title, *url))
        .collect()
}
