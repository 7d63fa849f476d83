pub mod blogs;
pub mod cli;
pub mod discovery;
pub mod extractor;
pub mod lease;
pub mod logging;
pub mod pipeline;
pub mod references;

pub use cli::{handle_command, run_once, Context, ToolCommands};
pub use extractor::{ExtractionProfile, Extractor, ExtractorConfig};
pub use pipeline::{Pipeline, PipelineConfig, RunOutcome, RunReport, Stage};

pub mod prelude {
    pub use super::discovery::{SearchBrowser, SearchDiscoverer, SearchSession};
    pub use super::extractor::{ExtractionProfile, Extractor};
    pub use super::pipeline::{Pipeline, RunOutcome, Stage};
    pub use ar_core::{ContentExtractor, Discovery, ReferenceDiscoverer, Result, Error};
}
