//! Rewrites a seed article with the help of scraped reference material.
//!
//! The model is asked for a JSON object carrying an enhanced `title` and
//! markdown `content`. Anything that goes wrong between building the prompt and
//! reading that object back degrades to the original article with a visible
//! note; [`Rewriter::rewrite`] never returns an error.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use ar_core::{Error, GenerativeModel, Result, RewriteOutcome, RewriteResult, ScrapeResult, SeedArticle};

/// Appended to the original content when the rewrite could not be used.
pub const DEGRADATION_NOTE: &str = "[Note: AI enhancement failed. Showing original content.]";

/// Hard cutoff applied to each reference before it goes into the prompt.
pub const DEFAULT_SNIPPET_CHARS: usize = 3000;

/// Where the rewritten article's reference list comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferencePolicy {
    /// Cite every reference that was given to the model
    #[default]
    InputSet,
    /// Cite what the model says it used, restricted to the given references
    TrustModel,
}

impl FromStr for ReferencePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "input" | "input-set" => Ok(Self::InputSet),
            "model" | "trust-model" => Ok(Self::TrustModel),
            other => Err(format!("Invalid reference policy: {} (expected input-set or trust-model)", other)),
        }
    }
}

impl fmt::Display for ReferencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InputSet => write!(f, "input-set"),
            Self::TrustModel => write!(f, "trust-model"),
        }
    }
}

#[derive(Deserialize)]
struct RawDraft {
    title: Option<Value>,
    content: Option<Value>,
    #[serde(default)]
    references: Option<Value>,
}

/// A model reply that passed the structural checks.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub title: String,
    pub content: String,
    pub references: Vec<String>,
}

pub struct Rewriter {
    model: Arc<dyn GenerativeModel>,
    policy: ReferencePolicy,
    snippet_chars: usize,
}

impl Rewriter {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self {
            model,
            policy: ReferencePolicy::default(),
            snippet_chars: DEFAULT_SNIPPET_CHARS,
        }
    }

    pub fn with_policy(mut self, policy: ReferencePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_snippet_chars(mut self, snippet_chars: usize) -> Self {
        self.snippet_chars = snippet_chars;
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub async fn rewrite(&self, seed: &SeedArticle, references: &[ScrapeResult]) -> RewriteResult {
        let usable: Vec<&ScrapeResult> = references.iter().filter(|r| r.success).collect();
        if usable.is_empty() {
            warn!("⚠️ No usable references for \"{}\", keeping the original", seed.title);
            return degrade(seed, &usable, "no usable references".to_string());
        }

        let prompt = self.build_prompt(seed, &usable);
        info!(
            "🤖 Rewriting \"{}\" with {} ({} references)",
            seed.title,
            self.model.name(),
            usable.len()
        );

        let reply = self.model.generate_json(&prompt).await;
        match reply.and_then(|text| parse_draft(&text)) {
            Ok(draft) => {
                info!("✨ {} rewrote the article as \"{}\"", self.model.name(), draft.title);
                let reference_urls = self.cited_urls(&usable, &draft.references);
                RewriteResult {
                    title: draft.title,
                    content: draft.content,
                    reference_urls,
                    outcome: RewriteOutcome::Enhanced,
                }
            }
            Err(e) => {
                warn!("❌ {} rewrite failed, keeping the original: {}", self.model.name(), e);
                degrade(seed, &usable, e.to_string())
            }
        }
    }

    /// Renders the single prompt sent to the model.
    pub fn build_prompt(&self, seed: &SeedArticle, references: &[&ScrapeResult]) -> String {
        let context = references
            .iter()
            .enumerate()
            .map(|(i, r)| {
                format!(
                    "REFERENCE {}:\nSource: {}\nContent Snippet: {}",
                    i + 1,
                    r.url,
                    truncate_chars(&r.content, self.snippet_chars)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let (keys, shape) = match self.policy {
            ReferencePolicy::InputSet => (
                "exactly two keys: \"title\" and \"content\"",
                "{\n  \"title\": \"The enhanced title\",\n  \"content\": \"The full markdown content\"\n}",
            ),
            ReferencePolicy::TrustModel => (
                "exactly three keys: \"title\", \"content\" and \"references\" (the Source URLs you actually used)",
                "{\n  \"title\": \"The enhanced title\",\n  \"content\": \"The full markdown content\",\n  \"references\": [\"https://...\"]\n}",
            ),
        };

        format!(
            "You are a professional technical editor. Rewrite the \"Original Article\" \
by incorporating facts, data, and context from the provided \"Reference Articles\".\n\n\
ORIGINAL ARTICLE:\nTitle: {title}\nContent: {content}\n\n\
REFERENCE ARTICLES (RESEARCH):\n{context}\n\n\
REQUIREMENTS:\n\
1. Length: Expand the content to be between 800-1200 words.\n\
2. Formatting: Use Markdown (H2, H3, **bolding**, and bullet points).\n\
3. Tone: Professional and informative.\n\
4. Output: You must return a JSON object with {keys}.\n\n\
JSON structure:\n{shape}\n",
            title = seed.title,
            content = seed.content,
            context = context,
            keys = keys,
            shape = shape,
        )
    }

    fn cited_urls(&self, usable: &[&ScrapeResult], from_model: &[String]) -> Vec<String> {
        let input: Vec<String> = usable.iter().map(|r| r.url.clone()).collect();
        if self.policy == ReferencePolicy::InputSet {
            return input;
        }

        let mut cited: Vec<String> = Vec::new();
        for url in from_model {
            let url = url.trim();
            if input.iter().any(|u| u == url) && !cited.iter().any(|c| c == url) {
                cited.push(url.to_string());
            }
        }
        if cited.is_empty() {
            input
        } else {
            cited
        }
    }
}

fn degrade(seed: &SeedArticle, usable: &[&ScrapeResult], reason: String) -> RewriteResult {
    RewriteResult {
        title: seed.title.clone(),
        content: format!("{}\n\n{}", seed.content, DEGRADATION_NOTE),
        reference_urls: usable.iter().map(|r| r.url.clone()).collect(),
        outcome: RewriteOutcome::Degraded { reason },
    }
}

/// Parses a model reply, tolerating a surrounding markdown code fence.
pub fn parse_draft(text: &str) -> Result<Draft> {
    let body = strip_code_fence(text);
    let value: Value = serde_json::from_str(body)?;
    if !value.is_object() {
        return Err(Error::Inference("model reply is not a JSON object".to_string()));
    }
    let raw: RawDraft = serde_json::from_value(value)?;

    let title = non_empty_string(raw.title)
        .ok_or_else(|| Error::Inference("model reply is missing \"title\"".to_string()))?;
    let content = non_empty_string(raw.content)
        .ok_or_else(|| Error::Inference("model reply is missing \"content\"".to_string()))?;
    let references = match raw.references {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };

    Ok(Draft {
        title,
        content,
        references,
    })
}

fn non_empty_string(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let without_open = match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        None => return trimmed,
    };
    without_open.trim_end().trim_end_matches("```").trim()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
