//! Citation block rendering for the rewritten article.

use ar_core::ScrapeResult;

pub const REFERENCES_HEADING: &str = "## References";

/// Renders a numbered Markdown list, one line per url in `urls` order.
///
/// Each url takes the title of the first scrape result with the same url,
/// or `Reference N` when there is none (or its title is blank).
pub fn reconcile(urls: &[String], scrapes: &[ScrapeResult]) -> String {
    urls.iter()
        .enumerate()
        .map(|(i, url)| {
            let n = i + 1;
            let title = scrapes
                .iter()
                .find(|s| &s.url == url)
                .map(|s| s.title.trim())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Reference {}", n));
            format!("{}. [{}]({})", n, title, url)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The section appended to the article body, or nothing without references.
pub fn citation_section(urls: &[String], scrapes: &[ScrapeResult]) -> String {
    if urls.is_empty() {
        return String::new();
    }
    format!("\n\n---\n\n{}\n\n{}", REFERENCES_HEADING, reconcile(urls, scrapes))
}
