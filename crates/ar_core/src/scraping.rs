use async_trait::async_trait;
use serde::Serialize;
use crate::types::{CandidateReference, ScrapeResult};

/// Outcome of a discovery call. Discovery never fails with an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Discovery {
    /// Organic results read from the search page
    Found(Vec<CandidateReference>),
    /// The results never rendered; static placeholders stand in
    Degraded(Vec<CandidateReference>),
    /// The search session could not be used at all
    Empty { reason: String },
}

impl Discovery {
    pub fn candidates(&self) -> &[CandidateReference] {
        match self {
            Discovery::Found(c) | Discovery::Degraded(c) => c,
            Discovery::Empty { .. } => &[],
        }
    }

    pub fn into_candidates(self) -> Vec<CandidateReference> {
        match self {
            Discovery::Found(c) | Discovery::Degraded(c) => c,
            Discovery::Empty { .. } => Vec::new(),
        }
    }
}

#[async_trait]
pub trait ReferenceDiscoverer: Send + Sync {
    async fn discover(&self, topic: &str) -> Discovery;
}

#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Fetches `url` and isolates its readable text. Failure is a normal outcome.
    async fn extract(&self, url: &str) -> ScrapeResult;
}
