use std::error::Error as StdError;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{PageRenderer, SessionLost};

/// Headless Chromium session with a single reused tab.
pub struct ChromiumRenderer {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumRenderer {
    /// Start the browser. Failure here is fatal for the run.
    pub async fn launch() -> Result<Self> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .build()
            .map_err(|e| anyhow!("invalid browser config: {}", e))?;

        let (browser, mut events) = Browser::launch(config)
            .await
            .context("Failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    debug!("Browser event loop ended: {}", e);
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open browser tab")?;

        Ok(Self {
            browser,
            page,
            handler,
        })
    }
}

#[async_trait]
impl PageRenderer for ChromiumRenderer {
    async fn render(&mut self, url: &str) -> Result<()> {
        if let Err(e) = self.page.goto(url).await {
            return Err(page_error(
                self.handler.is_finished(),
                e,
                format!("Navigation to {} failed", url),
            ));
        }
        Ok(())
    }

    async fn content(&mut self) -> Result<String> {
        match self.page.content().await {
            Ok(markup) => Ok(markup),
            Err(e) => Err(page_error(
                self.handler.is_finished(),
                e,
                "Failed to read page source".to_string(),
            )),
        }
    }

    async fn close(&mut self) -> Result<()> {
        let closed = self.browser.close().await.map(|_| ());
        if closed.is_ok() {
            if let Err(e) = self.browser.wait().await {
                warn!("Chromium did not exit cleanly: {}", e);
            }
        }
        stop_event_loop(closed, &self.handler)
    }
}

/// A page operation failed. Once the event loop has ended the browser
/// connection is gone, so the failure is reported as [`SessionLost`].
fn page_error<E>(session_ended: bool, err: E, what: String) -> anyhow::Error
where
    E: StdError + Send + Sync + 'static,
{
    if session_ended {
        anyhow::Error::new(SessionLost(format!("{}: {}", what, err)))
    } else {
        anyhow::Error::new(err).context(what)
    }
}

/// Abort the event loop task, then report how closing the browser went.
fn stop_event_loop<E>(closed: std::result::Result<(), E>, handler: &JoinHandle<()>) -> Result<()>
where
    E: StdError + Send + Sync + 'static,
{
    handler.abort();
    closed.context("Failed to close Chromium")
}
