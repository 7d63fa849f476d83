use async_trait::async_trait;
use std::fmt;
use crate::Result;

#[async_trait]
pub trait GenerativeModel: Send + Sync + fmt::Debug {
    /// Short backend name used in log lines
    fn name(&self) -> &str;

    /// Sends `prompt` in structured-output mode and returns the raw JSON text
    async fn generate_json(&self, prompt: &str) -> Result<String>;
}
