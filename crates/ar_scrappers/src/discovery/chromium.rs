use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use ar_core::{Error, Result};

use super::{SearchBrowser, SearchSession};
use crate::extractor::USER_AGENT;

/// Launches a local Chromium for each search session.
#[derive(Debug, Clone)]
pub struct ChromiumBrowser {
    pub headless: bool,
    pub user_agent: String,
    pub navigation_timeout: Duration,
    pub executable: Option<PathBuf>,
}

impl Default for ChromiumBrowser {
    fn default() -> Self {
        Self {
            headless: true,
            user_agent: USER_AGENT.to_string(),
            navigation_timeout: Duration::from_secs(60),
            executable: None,
        }
    }
}

impl ChromiumBrowser {
    pub fn new(headless: bool) -> Self {
        Self {
            headless,
            ..Self::default()
        }
    }

    fn config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder();
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        if !self.headless {
            builder = builder.with_head();
        }
        builder
            .args(vec![
                "--no-sandbox".to_string(),
                "--disable-setuid-sandbox".to_string(),
                format!("--user-agent={}", self.user_agent),
            ])
            .request_timeout(self.navigation_timeout)
            .build()
            .map_err(|e| Error::Browser(format!("Config failed: {}", e)))
    }
}

#[async_trait]
impl SearchBrowser for ChromiumBrowser {
    async fn open(&self) -> Result<Box<dyn SearchSession>> {
        let (mut browser, mut handler) = Browser::launch(self.config()?)
            .await
            .map_err(|e| Error::Browser(format!("Failed to launch chromium: {}", e)))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
            debug!("Chromium event loop exited");
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                handler_task.abort();
                return Err(Error::Browser(format!("Failed to open page: {}", e)));
            }
        };

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
            navigation_timeout: self.navigation_timeout,
        }))
    }
}

struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    navigation_timeout: Duration,
}

#[async_trait]
impl SearchSession for ChromiumSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        tokio::time::timeout(self.navigation_timeout, self.page.goto(url))
            .await
            .map_err(|_| Error::Browser(format!("Navigation to {} timed out", url)))?
            .map_err(|e| Error::Browser(format!("Navigation to {} failed: {}", url, e)))?;
        Ok(())
    }

    async fn content(&mut self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| Error::Browser(e.to_string()))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let ChromiumSession {
            mut browser,
            page,
            handler_task,
            ..
        } = *self;

        if let Err(e) = page.close().await {
            debug!("Closing page failed: {}", e);
        }
        let closed = browser
            .close()
            .await
            .map_err(|e| Error::Browser(format!("Failed to close chromium: {}", e)));
        if let Err(e) = browser.wait().await {
            warn!("Waiting for chromium to exit failed: {}", e);
        }
        handler_task.abort();
        closed.map(|_| ())
    }
}
