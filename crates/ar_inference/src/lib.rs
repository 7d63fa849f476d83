use std::fmt;
use std::time::Duration;

pub mod models;
pub mod rewrite;

/// Settings for the generative model backend.
#[derive(Clone)]
pub struct Config {
    /// One of `gemini`, `deepseek` or `dummy`
    pub backend: String,
    pub api_key: Option<String>,
    pub model_name: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("backend", &self.backend)
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("model_name", &self.model_name)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: "gemini".to_string(),
            api_key: None,
            model_name: None,
            base_url: None,
            timeout: Duration::from_secs(120),
        }
    }
}

pub mod prelude {
    pub use super::Config;
    pub use super::models::create_model;
    pub use super::rewrite::{ReferencePolicy, Rewriter};
    pub use ar_core::{GenerativeModel, Result, Error};
}

pub use models::create_model;
pub use rewrite::{ReferencePolicy, Rewriter, DEGRADATION_NOTE};
