pub mod error;
pub mod models;
pub mod scraping;
pub mod storage;
pub mod types;

pub use error::{Error, Result, ValidationErrors};
pub use models::GenerativeModel;
pub use scraping::{ContentExtractor, Discovery, ReferenceDiscoverer};
pub use storage::ArticleStore;
pub use types::{
    excerpt_of, CandidateReference, FinalArticle, NewArticle, RewriteOutcome, RewriteResult,
    ScrapeResult, SeedArticle,
};
