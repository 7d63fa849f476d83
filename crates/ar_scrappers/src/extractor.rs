//! Readable-text extraction from arbitrary third-party pages.
//!
//! Pages are stripped of boilerplate, then a prioritized list of container
//! strategies is tried in order. When no container yields enough text the
//! extractor falls back to every sufficiently long paragraph on the page.
//! Extraction never fails: a page that cannot be fetched or read becomes a
//! [`ScrapeResult`] with `success = false`.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use ar_core::{ContentExtractor, Error, Result, ScrapeResult};

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";

/// How a matched container is turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerText {
    /// Paragraph texts joined by blank lines
    Paragraphs,
    /// All text below the container
    WholeText,
}

/// One selector/extractor pair of the fallback chain.
pub struct Strategy {
    pub name: &'static str,
    selector: Selector,
    text: ContainerText,
}

impl Strategy {
    fn new(css: &'static str, text: ContainerText) -> Self {
        Self {
            name: css,
            selector: Selector::parse(css).unwrap(),
            text,
        }
    }

    /// Text of the outermost matching containers, or `None` when nothing matched
    /// or the matches hold no text.
    pub fn extract(&self, doc: &Html) -> Option<String> {
        let matched: Vec<ElementRef> = doc.root_element().select(&self.selector).collect();
        if matched.is_empty() {
            return None;
        }

        let ids: HashSet<_> = matched.iter().map(|el| el.id()).collect();
        let outermost = matched
            .iter()
            .filter(|el| !el.ancestors().any(|a| ids.contains(&a.id())));

        let text = match self.text {
            ContainerText::Paragraphs => outermost
                .flat_map(|el| el.select(&PARAGRAPH))
                .map(|p| p.text().collect::<String>().trim().to_string())
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
                .join("\n\n"),
            ContainerText::WholeText => outermost
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n\n"),
        };

        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

lazy_static! {
    static ref PARAGRAPH: Selector = Selector::parse("p").unwrap();
    static ref HEADING: Selector = Selector::parse("h1").unwrap();
    static ref TITLE: Selector = Selector::parse("title").unwrap();

    static ref REFERENCE_NOISE: Selector = Selector::parse(
        "script, style, nav, header, footer, .nav, .menu, .sidebar, .advertisement, .ads, .social-share"
    ).unwrap();
    static ref REFERENCE_STRATEGIES: Vec<Strategy> = [
        "article",
        r#"[role="article"]"#,
        ".article-content",
        ".post-content",
        ".entry-content",
        ".blog-content",
        "main article",
        "main",
        ".content",
    ]
    .into_iter()
    .map(|css| Strategy::new(css, ContainerText::Paragraphs))
    .collect();

    static ref ARTICLE_NOISE: Selector = Selector::parse(
        "script, style, nav, header, footer, .sidebar, .comments"
    ).unwrap();
    static ref ARTICLE_STRATEGIES: Vec<Strategy> = [
        "article",
        ".article-content",
        ".post-content",
        ".entry-content",
        "main",
        ".content",
        ".blog-content",
    ]
    .into_iter()
    .map(|css| Strategy::new(css, ContainerText::WholeText))
    .collect();
}

/// Thresholds, noise filter and strategy chain for one kind of extraction.
#[derive(Clone, Copy)]
pub struct ExtractionProfile {
    pub name: &'static str,
    /// Content must be longer than this (in characters) to count as usable
    pub min_length: usize,
    /// Fallback paragraphs must be longer than this
    pub min_paragraph_len: usize,
    pub paragraph_cap: Option<usize>,
    /// Content used when the page could not be fetched
    pub failure_sentinel: &'static str,
    /// Content used when nothing readable was found
    pub empty_sentinel: &'static str,
    noise: &'static Selector,
    strategies: &'static [Strategy],
}

impl ExtractionProfile {
    /// Supporting material for a rewrite.
    pub fn reference() -> Self {
        Self {
            name: "reference",
            min_length: 300,
            min_paragraph_len: 50,
            paragraph_cap: None,
            failure_sentinel: "Failed to scrape content",
            empty_sentinel: "Content not available",
            noise: &REFERENCE_NOISE,
            strategies: &REFERENCE_STRATEGIES,
        }
    }

    /// Whole blog posts imported as seed articles.
    pub fn full_article() -> Self {
        Self {
            name: "full_article",
            min_length: 500,
            min_paragraph_len: 50,
            paragraph_cap: Some(20),
            failure_sentinel: "Content not available",
            empty_sentinel: "Full content not available",
            noise: &ARTICLE_NOISE,
            strategies: &ARTICLE_STRATEGIES,
        }
    }

    pub fn strategies(&self) -> &[Strategy] {
        self.strategies
    }

    /// Runs the heuristic chain over an already fetched page.
    pub fn extract_document(&self, url: &str, html: &str) -> ScrapeResult {
        let mut doc = Html::parse_document(html);
        strip_noise(&mut doc, self.noise);
        let title = resolve_title(&doc);

        let mut best = String::new();
        let mut source = "none";
        for strategy in self.strategies {
            let Some(text) = strategy.extract(&doc) else {
                continue;
            };
            let text = normalize_whitespace(&text);
            let len = text.chars().count();
            if len > best.chars().count() {
                best = text;
                source = strategy.name;
            }
            if len > self.min_length {
                break;
            }
        }

        if best.chars().count() <= self.min_length {
            let fallback = normalize_whitespace(&self.fallback_paragraphs(&doc));
            if fallback.chars().count() > best.chars().count() {
                best = fallback;
                source = "paragraphs";
            }
        }
        debug!("📄 {} [{}] extracted via {}", url, self.name, source);

        let mut result = ScrapeResult::from_text(url, title, best, self.min_length);
        if result.content.is_empty() {
            result.content = self.empty_sentinel.to_string();
        }
        result
    }

    fn fallback_paragraphs(&self, doc: &Html) -> String {
        let paragraphs = doc
            .root_element()
            .select(&PARAGRAPH)
            .map(|p| p.text().collect::<String>().trim().to_string())
            .filter(|p| p.chars().count() > self.min_paragraph_len);
        let paragraphs: Vec<String> = match self.paragraph_cap {
            Some(cap) => paragraphs.take(cap).collect(),
            None => paragraphs.collect(),
        };
        paragraphs.join("\n\n")
    }
}

/// Detaches every node matching `noise` so later selections cannot reach it.
fn strip_noise(doc: &mut Html, noise: &Selector) {
    let ids: Vec<_> = doc.root_element().select(noise).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// First `h1`, falling back to the document title.
pub fn resolve_title(doc: &Html) -> String {
    let first_text = |selector: &Selector| {
        doc.root_element()
            .select(selector)
            .map(|el| el.text().collect::<Vec<_>>().join(" "))
            .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
            .find(|t| !t.is_empty())
    };
    first_text(&*HEADING)
        .or_else(|| first_text(&*TITLE))
        .unwrap_or_default()
}

/// Collapses runs of whitespace inside lines and runs of blank lines.
pub fn normalize_whitespace(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut pending_blank = false;
    for raw in text.lines() {
        let line = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            pending_blank = !lines.is_empty();
            continue;
        }
        if pending_blank {
            lines.push(String::new());
            pending_blank = false;
        }
        lines.push(line);
    }
    lines.join("\n")
}

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

pub struct Extractor {
    client: Client,
    profile: ExtractionProfile,
}

impl Extractor {
    pub fn new(config: &ExtractorConfig, profile: ExtractionProfile) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, profile })
    }

    pub fn profile(&self) -> &ExtractionProfile {
        &self.profile
    }

    /// Fetches a page body, treating non-2xx statuses as errors.
    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        let parsed = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(format!("{}: unsupported scheme", url)));
        }
        let response = self.client.get(parsed).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl ContentExtractor for Extractor {
    async fn extract(&self, url: &str) -> ScrapeResult {
        info!("🕸️ Scraping content from: {}", url);
        match self.fetch_html(url).await {
            Ok(html) => {
                let result = self.profile.extract_document(url, &html);
                info!("📄 Scraped {} characters from {}", result.content.chars().count(), url);
                result
            }
            Err(e) => {
                warn!("❌ Error scraping {}: {}", url, e);
                ScrapeResult::failed(url, self.profile.failure_sentinel)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    const URL: &str = "https://example.com/post";

    fn long_paragraph(seed: &str, len: usize) -> String {
        seed.chars().cycle().take(len).collect()
    }

    #[test]
    fn test_threshold_boundary_reference() {
        let at = format!("<html><body><article><p>{}</p></article></body></html>", "a".repeat(300));
        let above = format!("<html><body><article><p>{}</p></article></body></html>", "a".repeat(301));

        let profile = ExtractionProfile::reference();
        assert!(!profile.extract_document(URL, &at).success);
        assert!(profile.extract_document(URL, &above).success);
    }

    #[test]
    fn test_threshold_boundary_full_article() {
        let at = format!("<html><body><article>{}</article></body></html>", "b".repeat(500));
        let above = format!("<html><body><article>{}</article></body></html>", "b".repeat(501));

        let profile = ExtractionProfile::full_article();
        assert!(!profile.extract_document(URL, &at).success);
        assert!(profile.extract_document(URL, &above).success);
    }

    #[test]
    fn test_strategy_joins_paragraphs() {
        let doc = Html::parse_document(
            "<div class='post-content'><p> One </p><p></p><div><p>Two</p></div></div>",
        );
        let strategy = Strategy::new(".post-content", ContainerText::Paragraphs);
        assert_eq!(strategy.extract(&doc).as_deref(), Some("One\n\nTwo"));

        let missing = Strategy::new(".entry-content", ContainerText::Paragraphs);
        assert_eq!(missing.extract(&doc), None);
    }

    #[test]
    fn test_strategy_skips_nested_matches() {
        let doc = Html::parse_document("<article><p>Outer</p><article><p>Inner</p></article></article>");
        let strategy = Strategy::new("article", ContainerText::Paragraphs);
        assert_eq!(strategy.extract(&doc).as_deref(), Some("Outer\n\nInner"));
    }

    #[test]
    fn test_strategy_whole_text() {
        let doc = Html::parse_document("<main><h2>Heading</h2>\n<div>Body text</div></main>");
        let strategy = Strategy::new("main", ContainerText::WholeText);
        let text = normalize_whitespace(&strategy.extract(&doc).unwrap());
        assert_eq!(text, "Heading\nBody text");
    }

    #[test]
    fn test_reference_chain_order() {
        let names: Vec<&str> = ExtractionProfile::reference().strategies().iter().map(|s| s.name).collect();
        assert_eq!(names.first(), Some(&"article"));
        assert_eq!(names.last(), Some(&".content"));
        assert_eq!(names.len(), 9);
    }

    #[test]
    fn test_noise_is_stripped_before_extraction() {
        let body = long_paragraph("real content ", 320);
        let html = format!(
            "<html><body><nav><p>{nav}</p></nav><article><p>{body}</p><script>var x = 1;</script>\
             <div class='ads'><p>BUY NOW BUY NOW</p></div></article><footer><p>{nav}</p></footer></body></html>",
            nav = long_paragraph("navigation ", 80),
            body = body,
        );
        let result = ExtractionProfile::reference().extract_document(URL, &html);
        assert!(result.success);
        assert!(!result.content.contains("BUY NOW"));
        assert!(!result.content.contains("navigation"));
        assert!(!result.content.contains("var x"));
    }

    #[test]
    fn test_first_adequate_container_wins() {
        let html = format!(
            "<html><body><div class='entry-content'><p>{}</p></div><main><p>{}</p></main></body></html>",
            long_paragraph("entry ", 400),
            long_paragraph("main ", 900),
        );
        let result = ExtractionProfile::reference().extract_document(URL, &html);
        assert!(result.content.starts_with("entry"));
        assert!(!result.content.contains("main main"));
    }

    #[test]
    fn test_falls_back_to_long_paragraphs() {
        let html = format!(
            "<html><body><article><p>tiny</p></article><div><p>{}</p><p>short one</p><p>{}</p></div></body></html>",
            long_paragraph("first ", 200),
            long_paragraph("second ", 200),
        );
        let result = ExtractionProfile::reference().extract_document(URL, &html);
        assert!(result.success);
        assert!(result.content.starts_with("first"));
        assert!(result.content.contains("\n\nsecond"));
        assert!(!result.content.contains("short one"));
    }

    #[test]
    fn test_full_article_caps_paragraphs() {
        let paragraphs: String = (0..25)
            .map(|i| format!("<p>{}</p>", long_paragraph(&format!("para{} ", i), 60)))
            .collect();
        let html = format!("<html><body><div>{}</div></body></html>", paragraphs);
        let result = ExtractionProfile::full_article().extract_document(URL, &html);
        assert!(result.content.contains("para19"));
        assert!(!result.content.contains("para20"));
    }

    #[test]
    fn test_empty_page_uses_sentinel() {
        let result = ExtractionProfile::reference().extract_document(URL, "<html><body></body></html>");
        assert!(!result.success);
        assert_eq!(result.content, "Content not available");

        let result = ExtractionProfile::full_article().extract_document(URL, "<html></html>");
        assert_eq!(result.content, "Full content not available");
    }

    #[test]
    fn test_title_resolution() {
        let html = "<html><head><title>Doc Title</title></head><body><h1>  Main\n Heading </h1></body></html>";
        assert_eq!(resolve_title(&Html::parse_document(html)), "Main Heading");

        let html = "<html><head><title>Doc Title</title></head><body><p>x</p></body></html>";
        assert_eq!(resolve_title(&Html::parse_document(html)), "Doc Title");

        assert_eq!(resolve_title(&Html::parse_document("<p>x</p>")), "");
    }

    #[test]
    fn test_normalize_whitespace() {
        let text = "  Hello   \t world \n\n\n\n  second\u{a0}\u{a0}line  \n \n third ";
        assert_eq!(normalize_whitespace(text), "Hello world\n\nsecond line\n\nthird");
        assert_eq!(normalize_whitespace("\n\n  \n"), "");
    }

    #[tokio::test]
    async fn test_extract_fetches_with_browser_identity() {
        let server = MockServer::start().await;
        let body = format!(
            "<html><head><title>T</title></head><body><article><h1>Headline</h1><p>{}</p></article></body></html>",
            long_paragraph("words ", 400)
        );
        Mock::given(method("GET"))
            .and(path("/post"))
            .and(|req: &Request| {
                req.headers.get("user-agent").and_then(|v| v.to_str().ok()) == Some(USER_AGENT)
            })
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let extractor = Extractor::new(&ExtractorConfig::default(), ExtractionProfile::reference()).unwrap();
        let url = format!("{}/post", server.uri());
        let result = extractor.extract(&url).await;
        assert!(result.success);
        assert_eq!(result.url, url);
        assert_eq!(result.title, "Headline");
    }

    #[tokio::test]
    async fn test_extract_failures_are_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let extractor = Extractor::new(&ExtractorConfig::default(), ExtractionProfile::reference()).unwrap();

        let blocked = extractor.extract(&format!("{}/blocked", server.uri())).await;
        assert!(!blocked.success);
        assert_eq!(blocked.content, "Failed to scrape content");
        assert_eq!(blocked.title, "");

        let malformed = extractor.extract("not a url").await;
        assert!(!malformed.success);

        let unsupported = extractor.extract("ftp://example.com/file").await;
        assert!(!unsupported.success);
    }

    #[tokio::test]
    async fn test_extract_timeout_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let config = ExtractorConfig {
            timeout: Duration::from_millis(50),
            ..ExtractorConfig::default()
        };
        let extractor = Extractor::new(&config, ExtractionProfile::reference()).unwrap();
        let result = extractor.extract(&server.uri()).await;
        assert!(!result.success);
        assert_eq!(result.content, "Failed to scrape content");
    }
}
