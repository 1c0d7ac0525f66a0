//! Page rendering collaborators.
//!
//! A renderer owns one browsing session that is reused for every category
//! page of a run and released with [`PageRenderer::close`].

#[cfg(feature = "chromium")]
pub mod chromium;
pub mod http;

use std::fmt;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use tokio::time::Instant;

use crate::config::POLL_INTERVAL;

/// The browsing session itself is gone (browser exited, connection dropped).
///
/// Renderers return this instead of a plain navigation error when no later
/// page could succeed either; the run stops instead of skipping the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLost(pub String);

impl fmt::Display for SessionLost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "renderer session lost: {}", self.0)
    }
}

impl std::error::Error for SessionLost {}

/// Whether `err`, or anything it wraps, is a [`SessionLost`].
pub fn is_session_lost(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<SessionLost>())
}

/// Outcome of waiting for a readiness selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// The selector matched; carries the markup it matched in.
    Ready(String),
    TimedOut,
}

#[async_trait]
pub trait PageRenderer: Send {
    /// Navigate the session to `url`.
    async fn render(&mut self, url: &str) -> Result<()>;

    /// Current markup of the rendered page.
    async fn content(&mut self) -> Result<String>;

    /// Poll the rendered page until `selector` matches or `timeout` elapses.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<Readiness> {
        let deadline = Instant::now() + timeout;
        loop {
            let markup = self.content().await?;
            if matches_selector(&markup, selector)? {
                return Ok(Readiness::Ready(markup));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(Readiness::TimedOut);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// Release the session. Called once at the end of a run.
    async fn close(&mut self) -> Result<()>;
}

/// Whether any element in `markup` matches the CSS `selector`.
pub fn matches_selector(markup: &str, selector: &str) -> Result<bool> {
    let selector =
        Selector::parse(selector).map_err(|e| anyhow!("invalid selector {:?}: {}", selector, e))?;
    let document = Html::parse_document(markup);
    let found = document.select(&selector).next().is_some();
    Ok(found)
}
