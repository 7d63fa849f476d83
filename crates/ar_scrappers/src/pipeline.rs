//! One refresh pass: fetch a seed, find references, extract them, rewrite, persist.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::time::sleep;

use ar_core::{
    ArticleStore, CandidateReference, ContentExtractor, Discovery, Error, FinalArticle, NewArticle,
    ReferenceDiscoverer, Result, RewriteOutcome, RewriteResult, ScrapeResult, SeedArticle,
};
use ar_inference::Rewriter;

use crate::lease::SeedLease;
use crate::logging::Logger;
use crate::references::citation_section;

const FALLBACK_REFERENCE_TITLE: &str = "Reference";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    FetchSeed,
    Discover,
    Extract,
    Rewrite,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::FetchSeed => "fetch-seed",
            Stage::Discover => "discover",
            Stage::Extract => "extract",
            Stage::Rewrite => "rewrite",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed { article_id: i64, article: FinalArticle },
    AbortedAt { stage: Stage, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtractionYield {
    pub attempted: usize,
    pub succeeded: usize,
}

/// What a pass did, whether or not it completed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub seed_id: Option<i64>,
    pub outcome: RunOutcome,
    pub extraction: Option<ExtractionYield>,
    pub rewrite: Option<RewriteOutcome>,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Delay between two reference fetches
    pub pacing: Duration,
    /// Where seed leases are taken; `None` disables the guard.
    pub lease_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pacing: Duration::from_secs(2),
            lease_dir: Some(SeedLease::default_dir()),
        }
    }
}

/// State carried from one stage to the next.
struct PipelineRun {
    seed: SeedArticle,
    _lease: Option<SeedLease>,
    candidates: Vec<CandidateReference>,
    scrapes: Vec<ScrapeResult>,
    extraction: Option<ExtractionYield>,
    rewrite: Option<RewriteResult>,
}

impl PipelineRun {
    fn new(seed: SeedArticle, lease: Option<SeedLease>) -> Self {
        Self {
            seed,
            _lease: lease,
            candidates: Vec::new(),
            scrapes: Vec::new(),
            extraction: None,
            rewrite: None,
        }
    }

    fn report(&self, outcome: RunOutcome) -> RunReport {
        RunReport {
            seed_id: Some(self.seed.id),
            outcome,
            extraction: self.extraction,
            rewrite: self.rewrite.as_ref().map(|r| r.outcome.clone()),
        }
    }

    fn abort(self, stage: Stage, reason: impl Into<String>) -> Step {
        Step::Abort(self.report(RunOutcome::AbortedAt {
            stage,
            reason: reason.into(),
        }))
    }
}

enum Step {
    Continue(PipelineRun),
    Abort(RunReport),
}

pub struct Pipeline {
    store: Arc<dyn ArticleStore>,
    discoverer: Arc<dyn ReferenceDiscoverer>,
    extractor: Arc<dyn ContentExtractor>,
    rewriter: Rewriter,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        discoverer: Arc<dyn ReferenceDiscoverer>,
        extractor: Arc<dyn ContentExtractor>,
        rewriter: Rewriter,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            discoverer,
            extractor,
            rewriter,
            config,
        }
    }

    fn logger(stage: Stage) -> Logger {
        Logger::new().with_prefix(format!("[{}]", stage))
    }

    /// Runs every stage in order. Only a failure to reach the seed source is an `Err`.
    pub async fn run(&self) -> Result<RunReport> {
        let run = match self.fetch_seed().await? {
            Step::Continue(run) => run,
            Step::Abort(report) => return Ok(self.finish(report)),
        };
        let run = match self.discover(run).await {
            Step::Continue(run) => run,
            Step::Abort(report) => return Ok(self.finish(report)),
        };
        let run = match self.extract(run).await {
            Step::Continue(run) => run,
            Step::Abort(report) => return Ok(self.finish(report)),
        };
        let run = self.rewrite(run).await;
        Ok(self.finish(self.persist(run).await))
    }

    fn finish(&self, report: RunReport) -> RunReport {
        match &report.outcome {
            RunOutcome::Completed { article_id, article } => {
                tracing::info!("✅ Stored \"{}\" as article {}", article.title, article_id)
            }
            RunOutcome::AbortedAt { stage, reason } => {
                tracing::warn!("🛑 Run aborted at {}: {}", stage, reason)
            }
        }
        report
    }

    async fn fetch_seed(&self) -> Result<Step> {
        let log = Self::logger(Stage::FetchSeed);
        log.info("📥 Fetching latest unprocessed article");

        let Some(seed) = self.store.latest_unprocessed().await? else {
            return Ok(Step::Abort(RunReport {
                seed_id: None,
                outcome: RunOutcome::AbortedAt {
                    stage: Stage::FetchSeed,
                    reason: "no unprocessed article".to_string(),
                },
                extraction: None,
                rewrite: None,
            }));
        };
        log.info(&format!("📰 Seed article {}: {}", seed.id, seed.title));

        let lease = match &self.config.lease_dir {
            Some(dir) => match SeedLease::acquire(dir, seed.id)? {
                Some(lease) => Some(lease),
                None => {
                    let reason = format!("article {} is being processed by another run", seed.id);
                    return Ok(PipelineRun::new(seed, None).abort(Stage::FetchSeed, reason));
                }
            },
            None => None,
        };

        Ok(Step::Continue(PipelineRun::new(seed, lease)))
    }

    async fn discover(&self, mut run: PipelineRun) -> Step {
        let log = Self::logger(Stage::Discover);
        let discovery = self.discoverer.discover(&run.seed.title).await;

        let reason = match &discovery {
            Discovery::Empty { reason } => reason.clone(),
            _ => "search returned no usable results".to_string(),
        };
        if let Discovery::Degraded(_) = discovery {
            log.warn("⚠️ Continuing with placeholder references");
        }

        run.candidates = discovery.into_candidates();
        if run.candidates.is_empty() {
            return run.abort(Stage::Discover, reason);
        }
        log.info(&format!("🔗 {} candidate references", run.candidates.len()));
        Step::Continue(run)
    }

    async fn extract(&self, mut run: PipelineRun) -> Step {
        let log = Self::logger(Stage::Extract);
        let mut scrapes = Vec::with_capacity(run.candidates.len());

        for (i, candidate) in run.candidates.iter().enumerate() {
            if i > 0 && !self.config.pacing.is_zero() {
                sleep(self.config.pacing).await;
            }
            let mut result = self.extractor.extract(&candidate.url).await;
            if result.success {
                let title = candidate.title.trim();
                result.title = if title.is_empty() {
                    FALLBACK_REFERENCE_TITLE.to_string()
                } else {
                    title.to_string()
                };
            } else {
                log.warn(&format!("❌ Could not extract {}", candidate.url));
            }
            scrapes.push(result);
        }

        let extraction = ExtractionYield {
            attempted: scrapes.len(),
            succeeded: scrapes.iter().filter(|s| s.success).count(),
        };
        log.info(&format!(
            "📄 Extracted {}/{} references",
            extraction.succeeded, extraction.attempted
        ));
        run.scrapes = scrapes;
        run.extraction = Some(extraction);

        if extraction.succeeded == 0 {
            return run.abort(Stage::Extract, "no reference could be extracted");
        }
        Step::Continue(run)
    }

    async fn rewrite(&self, mut run: PipelineRun) -> PipelineRun {
        let log = Self::logger(Stage::Rewrite);
        let rewrite = self.rewriter.rewrite(&run.seed, &run.scrapes).await;
        match &rewrite.outcome {
            RewriteOutcome::Enhanced => log.info(&format!("✨ Rewritten as \"{}\"", rewrite.title)),
            RewriteOutcome::Degraded { reason } => {
                log.warn(&format!("🩹 Keeping the original content: {}", reason))
            }
        }
        run.rewrite = Some(rewrite);
        run
    }

    async fn persist(&self, mut run: PipelineRun) -> RunReport {
        let log = Self::logger(Stage::Persist);
        let Some(rewrite) = run.rewrite.take() else {
            return run.report(RunOutcome::AbortedAt {
                stage: Stage::Persist,
                reason: "nothing to persist".to_string(),
            });
        };
        let rewrite_outcome = rewrite.outcome.clone();

        let citations = citation_section(&rewrite.reference_urls, &run.scrapes);
        let article = FinalArticle::assemble(&run.seed, rewrite, &citations, Utc::now().date_naive());

        log.info(&format!("💾 Storing \"{}\"", article.title));
        let outcome = match self.store.create_article(&NewArticle::from(&article)).await {
            Ok(article_id) => RunOutcome::Completed { article_id, article },
            Err(Error::Rejected(errors)) => {
                log.error(&format!("❌ Article rejected: {}", errors));
                RunOutcome::AbortedAt {
                    stage: Stage::Persist,
                    reason: format!("rejected: {}", errors),
                }
            }
            Err(e) => {
                log.error(&format!("❌ Failed to store article: {}", e));
                RunOutcome::AbortedAt {
                    stage: Stage::Persist,
                    reason: e.to_string(),
                }
            }
        };

        let mut report = run.report(outcome);
        report.rewrite = Some(rewrite_outcome);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use async_trait::async_trait;
    use ar_inference::models::dummy::DummyModel;
    use ar_storage::backends::MemoryArticleStore;
    use tempfile::tempdir;

    struct FixedDiscoverer(Discovery);

    #[async_trait]
    impl ReferenceDiscoverer for FixedDiscoverer {
        async fn discover(&self, _topic: &str) -> Discovery {
            self.0.clone()
        }
    }

    /// Serves canned pages; unknown urls fail.
    #[derive(Default)]
    struct FakeExtractor {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl FakeExtractor {
        fn with_page(mut self, url: &str, content: &str) -> Self {
            self.pages.insert(url.to_string(), content.to_string());
            self
        }
    }

    #[async_trait]
    impl ContentExtractor for FakeExtractor {
        async fn extract(&self, url: &str) -> ScrapeResult {
            self.requested.lock().unwrap().push(url.to_string());
            match self.pages.get(url) {
                Some(content) => ScrapeResult::from_text(url, "Page title".to_string(), content.clone(), 300),
                None => ScrapeResult::failed(url, "Failed to scrape content"),
            }
        }
    }

    fn seed_article(title: &str) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            content: "Original body about chatbots.".to_string(),
            excerpt: None,
            url: None,
            author: Some("BeyondChats".to_string()),
            published_date: None,
            is_updated: false,
            references: vec![],
            original_article_id: None,
        }
    }

    fn found(pairs: &[(&str, &str)]) -> Discovery {
        Discovery::Found(pairs.iter().map(|(t, u)| CandidateReference::new(*t, *u)).collect())
    }

    fn long_text() -> String {
        "Customer support automation keeps improving. ".repeat(10)
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            pacing: Duration::ZERO,
            lease_dir: None,
        }
    }

    fn pipeline(
        store: Arc<dyn ArticleStore>,
        discovery: Discovery,
        extractor: Arc<FakeExtractor>,
        model: Arc<DummyModel>,
        config: PipelineConfig,
    ) -> Pipeline {
        Pipeline::new(
            store,
            Arc::new(FixedDiscoverer(discovery)),
            extractor,
            Rewriter::new(model),
            config,
        )
    }

    fn aborted_at(report: &RunReport) -> Option<Stage> {
        match &report.outcome {
            RunOutcome::AbortedAt { stage, .. } => Some(*stage),
            RunOutcome::Completed { .. } => None,
        }
    }

    #[tokio::test]
    async fn test_no_seed_aborts_at_fetch_seed() {
        let store = MemoryArticleStore::new();
        let pipeline = pipeline(
            Arc::new(store),
            found(&[("A", "https://a.example")]),
            Arc::new(FakeExtractor::default()),
            Arc::new(DummyModel::new()),
            config(),
        );
        let report = pipeline.run().await.unwrap();
        assert_eq!(aborted_at(&report), Some(Stage::FetchSeed));
        assert_eq!(report.seed_id, None);
    }

    #[tokio::test]
    async fn test_empty_discovery_aborts_at_discover() {
        let store = MemoryArticleStore::new();
        store.create_article(&seed_article("Seed")).await.unwrap();
        let extractor = Arc::new(FakeExtractor::default());
        let pipeline = pipeline(
            Arc::new(store),
            Discovery::Empty {
                reason: "browser unavailable".to_string(),
            },
            extractor.clone(),
            Arc::new(DummyModel::new()),
            config(),
        );

        let report = pipeline.run().await.unwrap();
        match &report.outcome {
            RunOutcome::AbortedAt { stage, reason } => {
                assert_eq!(*stage, Stage::Discover);
                assert_eq!(reason, "browser unavailable");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(extractor.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_extraction_aborts_at_extract() {
        let store = MemoryArticleStore::new();
        store.create_article(&seed_article("Seed")).await.unwrap();
        let model = Arc::new(DummyModel::new());
        let pipeline = pipeline(
            Arc::new(store.clone()),
            found(&[("A", "https://a.example"), ("B", "https://b.example")]),
            Arc::new(FakeExtractor::default().with_page("https://a.example", "too short")),
            model.clone(),
            config(),
        );

        let report = pipeline.run().await.unwrap();
        assert_eq!(aborted_at(&report), Some(Stage::Extract));
        assert_eq!(report.extraction, Some(ExtractionYield { attempted: 2, succeeded: 0 }));
        assert!(model.prompts().is_empty());
        assert_eq!(store.articles().await.len(), 1);
    }

    #[tokio::test]
    async fn test_rejection_aborts_at_persist() {
        let store = MemoryArticleStore::new();
        store.create_article(&seed_article("Seed")).await.unwrap();
        let long_title = "T".repeat(300);
        let reply = serde_json::json!({ "title": long_title, "content": "Rewritten body" }).to_string();
        let pipeline = pipeline(
            Arc::new(store.clone()),
            found(&[("A", "https://a.example")]),
            Arc::new(FakeExtractor::default().with_page("https://a.example", &long_text())),
            Arc::new(DummyModel::with_response(reply)),
            config(),
        );

        let report = pipeline.run().await.unwrap();
        assert_eq!(aborted_at(&report), Some(Stage::Persist));
        assert_eq!(report.rewrite, Some(RewriteOutcome::Enhanced));
        assert_eq!(store.articles().await.len(), 1);
    }

    #[tokio::test]
    async fn test_end_to_end_cites_only_extracted_references() {
        let store = MemoryArticleStore::new();
        store.create_article(&seed_article("Old")).await.unwrap();
        let seed_id = store.create_article(&seed_article("Seed")).await.unwrap();

        let extractor = Arc::new(FakeExtractor::default().with_page("https://u1.example", &long_text()));
        let model = Arc::new(DummyModel::new());
        let pipeline = pipeline(
            Arc::new(store.clone()),
            found(&[("A", "https://u1.example"), ("B", "https://u2.example")]),
            extractor.clone(),
            model.clone(),
            config(),
        );

        let report = pipeline.run().await.unwrap();
        assert_eq!(report.seed_id, Some(seed_id));
        assert_eq!(report.extraction, Some(ExtractionYield { attempted: 2, succeeded: 1 }));
        assert_eq!(report.rewrite, Some(RewriteOutcome::Enhanced));
        assert_eq!(
            *extractor.requested.lock().unwrap(),
            vec!["https://u1.example".to_string(), "https://u2.example".to_string()]
        );

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("https://u1.example"));
        assert!(!prompts[0].contains("https://u2.example"));

        let (article_id, article) = match report.outcome {
            RunOutcome::Completed { article_id, article } => (article_id, article),
            other => panic!("unexpected outcome {:?}", other),
        };
        assert!(article.content.ends_with("## References\n\n1. [A](https://u1.example)"));
        assert_eq!(article.original_article_id, seed_id);
        assert_eq!(article.title, "Seed");
        assert_eq!(article.author, "BeyondChats");
        assert!(article.is_updated);
        assert_eq!(article.reference_urls, vec!["https://u1.example".to_string()]);
        let head: String = article.content.chars().take(200).collect();
        assert_eq!(article.excerpt, format!("{}...", head));

        let stored = store.articles().await;
        let row = stored.iter().find(|a| a.id == article_id).unwrap();
        assert_eq!(row.article.original_article_id, Some(seed_id));
        assert_eq!(row.article.references, vec!["https://u1.example".to_string()]);
    }

    #[tokio::test]
    async fn test_degraded_rewrite_is_still_persisted() {
        let store = MemoryArticleStore::new();
        store.create_article(&seed_article("Seed")).await.unwrap();
        let pipeline = pipeline(
            Arc::new(store.clone()),
            found(&[("", "https://a.example")]),
            Arc::new(FakeExtractor::default().with_page("https://a.example", &long_text())),
            Arc::new(DummyModel::failing("quota exceeded")),
            config(),
        );

        let report = pipeline.run().await.unwrap();
        assert!(report.is_completed());
        assert!(matches!(report.rewrite, Some(RewriteOutcome::Degraded { .. })));
        if let RunOutcome::Completed { article, .. } = report.outcome {
            assert!(article.content.contains(ar_inference::DEGRADATION_NOTE));
            assert!(article.content.ends_with("1. [Reference](https://a.example)"));
        }
    }

    #[tokio::test]
    async fn test_degraded_discovery_continues_with_placeholders() {
        let store = MemoryArticleStore::new();
        store.create_article(&seed_article("Seed")).await.unwrap();
        let placeholders = crate::discovery::fallback_references();
        let urls: Vec<String> = placeholders.iter().map(|c| c.url.clone()).collect();

        let extractor = Arc::new(
            FakeExtractor::default()
                .with_page(&urls[0], &long_text())
                .with_page(&urls[1], &long_text()),
        );
        let pipeline = pipeline(
            Arc::new(store.clone()),
            Discovery::Degraded(placeholders),
            extractor.clone(),
            Arc::new(DummyModel::new()),
            config(),
        );

        let report = pipeline.run().await.unwrap();
        assert!(report.is_completed());
        assert_eq!(*extractor.requested.lock().unwrap(), urls);
        assert_eq!(report.extraction, Some(ExtractionYield { attempted: 2, succeeded: 2 }));
        if let RunOutcome::Completed { article, .. } = report.outcome {
            assert!(article.content.ends_with(&format!(
                "## References\n\n1. [AI Trends 2025]({})\n2. [Future of Tech]({})",
                urls[0], urls[1]
            )));
        }
        assert_eq!(store.articles().await.len(), 2);
    }

    #[tokio::test]
    async fn test_held_lease_aborts_at_fetch_seed() {
        let dir = tempdir().unwrap();
        let store = MemoryArticleStore::new();
        let seed_id = store.create_article(&seed_article("Seed")).await.unwrap();
        let _held = SeedLease::acquire(dir.path(), seed_id).unwrap().unwrap();

        let extractor = Arc::new(FakeExtractor::default());
        let pipeline = pipeline(
            Arc::new(store),
            found(&[("A", "https://a.example")]),
            extractor.clone(),
            Arc::new(DummyModel::new()),
            PipelineConfig {
                pacing: Duration::ZERO,
                lease_dir: Some(dir.path().to_path_buf()),
            },
        );

        let report = pipeline.run().await.unwrap();
        assert_eq!(aborted_at(&report), Some(Stage::FetchSeed));
        assert_eq!(report.seed_id, Some(seed_id));
        assert!(extractor.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lease_released_after_run() {
        let dir = tempdir().unwrap();
        let store = MemoryArticleStore::new();
        let seed_id = store.create_article(&seed_article("Seed")).await.unwrap();
        let pipeline = pipeline(
            Arc::new(store),
            Discovery::Empty { reason: "offline".to_string() },
            Arc::new(FakeExtractor::default()),
            Arc::new(DummyModel::new()),
            PipelineConfig {
                pacing: Duration::ZERO,
                lease_dir: Some(dir.path().to_path_buf()),
            },
        );

        pipeline.run().await.unwrap();
        assert!(SeedLease::acquire(dir.path(), seed_id).unwrap().is_some());
    }
}
