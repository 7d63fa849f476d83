use std::sync::Arc;
use ar_core::{Error, Result};

pub use ar_core::GenerativeModel;

use crate::Config;

pub mod deepseek;
pub mod dummy;
pub mod gemini;

/// Builds the backend named in `config.backend`.
pub fn create_model(config: &Config) -> Result<Arc<dyn GenerativeModel>> {
    match config.backend.to_lowercase().as_str() {
        "gemini" => Ok(Arc::new(gemini::GeminiModel::new(config)?)),
        "deepseek" => Ok(Arc::new(deepseek::DeepSeekModel::new(config)?)),
        "dummy" => Ok(Arc::new(dummy::DummyModel::new())),
        other => Err(Error::Config(format!(
            "Unknown model backend: {} (expected gemini, deepseek or dummy)",
            other
        ))),
    }
}

/// Turns a non-success response into an inference error that keeps the body.
pub(crate) async fn check_status(model: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(500).collect();
    Err(Error::Inference(format!("{} returned {}: {}", model, status, body)))
}
