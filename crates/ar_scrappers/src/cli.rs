use std::sync::Arc;

use clap::Subcommand;
use tracing::info;

use ar_core::{ArticleStore, ContentExtractor, ReferenceDiscoverer, Result};
use ar_inference::{create_model, Config as ModelConfig, ReferencePolicy, Rewriter};

use crate::blogs::{BlogImporter, ImportConfig, DEFAULT_BLOG_URL};
use crate::discovery::{ChromiumBrowser, DiscoveryConfig, SearchDiscoverer};
use crate::extractor::{ExtractionProfile, Extractor, ExtractorConfig};
use crate::pipeline::{Pipeline, PipelineConfig, RunReport};

#[derive(Subcommand, Debug, Clone)]
pub enum ToolCommands {
    /// Import the oldest posts of a blog listing as seed articles
    Seed {
        #[arg(long, default_value = DEFAULT_BLOG_URL)]
        listing_url: String,
        /// How many posts to import
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Extract the readable text of one page
    Extract {
        url: String,
        /// Use the full-article profile instead of the reference one
        #[arg(long)]
        full: bool,
    },
    /// Show the references a search would yield for a topic
    Discover {
        topic: String,
    },
}

/// Everything a command may need; collaborators are built on demand.
#[derive(Clone)]
pub struct Context {
    pub store: Arc<dyn ArticleStore>,
    pub model: ModelConfig,
    pub reference_policy: ReferencePolicy,
    pub browser: ChromiumBrowser,
    pub discovery: DiscoveryConfig,
    pub extractor: ExtractorConfig,
    pub pipeline: PipelineConfig,
}

impl Context {
    fn discoverer(&self) -> SearchDiscoverer<ChromiumBrowser> {
        SearchDiscoverer::new(self.browser.clone(), self.discovery.clone())
    }

    pub fn build_pipeline(&self) -> Result<Pipeline> {
        let model = create_model(&self.model)?;
        info!("🧠 Inference model initialized (using {})", model.name());
        let rewriter = Rewriter::new(model).with_policy(self.reference_policy);
        let extractor = Extractor::new(&self.extractor, ExtractionProfile::reference())?;

        Ok(Pipeline::new(
            self.store.clone(),
            Arc::new(self.discoverer()),
            Arc::new(extractor),
            rewriter,
            self.pipeline.clone(),
        ))
    }
}

/// One refresh pass; aborts are reported, not returned as errors.
pub async fn run_once(pipeline: &Pipeline) -> Result<RunReport> {
    let report = pipeline.run().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report)
}

pub async fn handle_command(command: ToolCommands, ctx: &Context) -> Result<()> {
    match command {
        ToolCommands::Seed { listing_url, limit } => {
            let importer = BlogImporter::new(
                ctx.store.clone(),
                &ctx.extractor,
                ImportConfig {
                    listing_url,
                    limit,
                    ..ImportConfig::default()
                },
            )?;
            let report = importer.import().await?;
            println!(
                "Found {} links, saved {} articles, {} failed",
                report.links_found,
                report.saved.len(),
                report.failed
            );
        }
        ToolCommands::Extract { url, full } => {
            let profile = if full {
                ExtractionProfile::full_article()
            } else {
                ExtractionProfile::reference()
            };
            let result = Extractor::new(&ctx.extractor, profile)?.extract(&url).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        ToolCommands::Discover { topic } => {
            let discovery = ctx.discoverer().discover(&topic).await;
            println!("{}", serde_json::to_string_pretty(&discovery)?);
        }
    }
    Ok(())
}
