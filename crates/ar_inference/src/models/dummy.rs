use std::fmt;
use std::sync::Mutex;
use ar_core::{Error, Result};
use super::GenerativeModel;

enum Reply {
    Echo,
    Fixed(String),
    Fail(String),
}

/// Offline model for dry runs and tests.
///
/// By default it answers with a well-formed draft that reuses the title found
/// in the prompt; it can also be scripted to return a fixed body or to fail.
pub struct DummyModel {
    reply: Reply,
    prompts: Mutex<Vec<String>>,
}

impl fmt::Debug for DummyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyModel").finish()
    }
}

impl Default for DummyModel {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyModel {
    pub fn new() -> Self {
        Self {
            reply: Reply::Echo,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(body: impl Into<String>) -> Self {
        Self {
            reply: Reply::Fixed(body.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Reply::Fail(message.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl GenerativeModel for DummyModel {
    fn name(&self) -> &str {
        "Dummy"
    }

    async fn generate_json(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        match &self.reply {
            Reply::Fixed(body) => Ok(body.clone()),
            Reply::Fail(message) => Err(Error::Inference(message.clone())),
            Reply::Echo => {
                let title = prompt
                    .lines()
                    .map(str::trim)
                    .find_map(|l| l.strip_prefix("Title:"))
                    .map(str::trim)
                    .unwrap_or("Untitled");
                let draft = serde_json::json!({
                    "title": title,
                    "content": format!("## {}\n\nThis draft was produced offline without a language model.", title),
                });
                Ok(draft.to_string())
            }
        }
    }
}
