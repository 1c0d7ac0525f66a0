use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{matches_selector, PageRenderer, Readiness};

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Renderer for pages whose listings are present in the served HTML.
///
/// No script runs, so what the server sends is what gets parsed. The readiness
/// timeout is not used: a page without listing cards in its served HTML is
/// reported as timed out straight away.
pub struct HttpRenderer {
    client: Client,
    body: Option<String>,
}

impl HttpRenderer {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, body: None })
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn render(&mut self, url: &str) -> Result<()> {
        self.body = None;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("GET {} returned HTTP {}", url, status);
        }

        let text = resp.text().await.context("Failed to read page body")?;
        debug!("Fetched {} ({} bytes)", url, text.len());
        self.body = Some(text);
        Ok(())
    }

    async fn content(&mut self) -> Result<String> {
        match &self.body {
            Some(body) => Ok(body.clone()),
            None => bail!("no page has been rendered"),
        }
    }

    // Served markup never changes after the fetch; one check, no waiting.
    async fn wait_for(&mut self, selector: &str, _timeout: Duration) -> Result<Readiness> {
        let markup = self.content().await?;
        if matches_selector(&markup, selector)? {
            Ok(Readiness::Ready(markup))
        } else {
            Ok(Readiness::TimedOut)
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.body = None;
        Ok(())
    }
}
