use std::fmt;
use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

use crate::config::LISTING_SELECTOR;
use crate::parser::{self, ListingRecord};
use crate::render::{is_session_lost, PageRenderer, Readiness};

/// How one category page ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageStatus {
    Parsed,
    /// No listing appeared before the readiness timeout.
    TimedOut,
    /// Navigation or content retrieval failed for this page only.
    Failed(String),
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageStatus::Parsed => write!(f, "parsed"),
            PageStatus::TimedOut => write!(f, "timed out"),
            PageStatus::Failed(msg) => write!(f, "failed: {msg}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageResult {
    pub url: String,
    pub status: PageStatus,
    pub records: Vec<ListingRecord>,
}

impl PageResult {
    fn skipped(url: &str, status: PageStatus) -> Self {
        Self {
            url: url.to_string(),
            status,
            records: Vec::new(),
        }
    }
}

/// Scrape stats returned after completion.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScrapeStats {
    pub total: usize,
    pub parsed: usize,
    pub timed_out: usize,
    pub failed: usize,
    pub records: usize,
}

impl ScrapeStats {
    pub fn from_pages(pages: &[PageResult]) -> Self {
        let mut stats = ScrapeStats {
            total: pages.len(),
            ..Default::default()
        };
        for page in pages {
            match page.status {
                PageStatus::Parsed => stats.parsed += 1,
                PageStatus::TimedOut => stats.timed_out += 1,
                PageStatus::Failed(_) => stats.failed += 1,
            }
            stats.records += page.records.len();
        }
        stats
    }
}

/// Render one category page, wait for listings, and parse them.
///
/// Timeouts and per-page errors come back as a skipped result. Only a lost
/// renderer session is returned as `Err`, since no later page can load either.
pub async fn fetch_page<R>(renderer: &mut R, url: &str, timeout: Duration) -> Result<PageResult>
where
    R: PageRenderer + ?Sized,
{
    info!("URL to scrape: {}", url);

    if let Err(e) = renderer.render(url).await {
        if is_session_lost(&e) {
            return Err(e.context(format!("Lost renderer while loading {}", url)));
        }
        warn!("Render failed for {}: {:#}", url, e);
        return Ok(PageResult::skipped(url, PageStatus::Failed(e.to_string())));
    }

    let markup = match renderer.wait_for(LISTING_SELECTOR, timeout).await {
        Ok(Readiness::Ready(markup)) => markup,
        Ok(Readiness::TimedOut) => {
            error!("Timed out waiting for page to load: {}", url);
            return Ok(PageResult::skipped(url, PageStatus::TimedOut));
        }
        Err(e) if is_session_lost(&e) => {
            return Err(e.context(format!("Lost renderer while reading {}", url)));
        }
        Err(e) => {
            warn!("Could not read rendered page {}: {:#}", url, e);
            return Ok(PageResult::skipped(url, PageStatus::Failed(e.to_string())));
        }
    };

    let records = parser::parse_listings(&markup);
    info!("Parsed {} listings from {}", records.len(), url);

    Ok(PageResult {
        url: url.to_string(),
        status: PageStatus::Parsed,
        records,
    })
}

/// Scrape every category URL in order with one renderer session.
///
/// The renderer is consumed and closed exactly once, whatever happened to
/// the individual pages. If the session is lost the remaining pages are not
/// attempted and the error is returned after closing.
pub async fn scrape_categories<R>(
    mut renderer: R,
    urls: &[String],
    timeout: Duration,
) -> Result<(Vec<PageResult>, ScrapeStats)>
where
    R: PageRenderer,
{
    let pb = ProgressBar::new(urls.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut pages = Vec::with_capacity(urls.len());
    let mut lost = None;
    for url in urls {
        pb.set_message(url.clone());
        match fetch_page(&mut renderer, url, timeout).await {
            Ok(page) => pages.push(page),
            Err(e) => {
                error!("{:#}", e);
                lost = Some(e);
                break;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if let Err(e) = renderer.close().await {
        warn!("Failed to close renderer: {:#}", e);
    }

    if let Some(e) = lost {
        return Err(e.context(format!(
            "Scrape aborted after {} of {} pages",
            pages.len(),
            urls.len()
        )));
    }

    let stats = ScrapeStats::from_pages(&pages);
    info!(
        "Scraped {} pages ({} parsed, {} timed out, {} failed, {} listings)",
        stats.total, stats.parsed, stats.timed_out, stats.failed, stats.records
    );
    for page in pages.iter().filter(|p| p.status != PageStatus::Parsed) {
        warn!("Skipped {} ({})", page.url, page.status);
    }

    Ok((pages, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use anyhow::bail;
    use async_trait::async_trait;

    use crate::render::SessionLost;

    const SHORT: Duration = Duration::from_millis(20);

    const TWO_CARDS: &str = r#"
        <div class="grid">
          <a href="/voertuig/1?x=1">
            <img src="https://img.example/category/ID-1/a.jpg">
            <span class="text-brand-500">Renault Master</span>
            <span data-testid="VehicleCard.price">€ 75,-</span>
          </a>
          <a href="/voertuig/2"><span class="text-brand-500">Fiat Ducato</span></a>
        </div>"#;

    /// Serves canned markup per URL; unknown URLs render an empty shell.
    struct FakeRenderer {
        pages: HashMap<String, String>,
        broken: Vec<String>,
        /// Session dies after this many successful renders.
        dies_after: Option<usize>,
        renders: usize,
        current: Option<String>,
        closes: Arc<AtomicUsize>,
    }

    impl FakeRenderer {
        fn new(pages: &[(&str, &str)], closes: Arc<AtomicUsize>) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(u, m)| (u.to_string(), m.to_string()))
                    .collect(),
                broken: Vec::new(),
                dies_after: None,
                renders: 0,
                current: None,
                closes,
            }
        }
    }

    #[async_trait]
    impl PageRenderer for FakeRenderer {
        async fn render(&mut self, url: &str) -> Result<()> {
            if self.dies_after.is_some_and(|n| self.renders >= n) {
                return Err(SessionLost("browser process exited".into()).into());
            }
            self.renders += 1;
            if self.broken.iter().any(|b| b == url) {
                bail!("net::ERR_CONNECTION_RESET");
            }
            self.current = Some(
                self.pages
                    .get(url)
                    .cloned()
                    .unwrap_or_else(|| "<div id=\"app\"></div>".into()),
            );
            Ok(())
        }

        async fn content(&mut self) -> Result<String> {
            Ok(self.current.clone().unwrap_or_default())
        }

        async fn close(&mut self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn ready_page_is_parsed() {
        let mut r = FakeRenderer::new(&[("https://diks.net/a", TWO_CARDS)], Default::default());
        let page = fetch_page(&mut r, "https://diks.net/a", SHORT).await.unwrap();
        assert_eq!(page.status, PageStatus::Parsed);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].url(), Some("https://diks.net/voertuig/1"));
    }

    #[tokio::test]
    async fn timeout_skips_page() {
        let mut r = FakeRenderer::new(&[], Default::default());
        let page = fetch_page(&mut r, "https://diks.net/slow", SHORT).await.unwrap();
        assert_eq!(page.status, PageStatus::TimedOut);
        assert!(page.records.is_empty());
    }

    #[tokio::test]
    async fn render_error_skips_page() {
        let mut r = FakeRenderer::new(&[], Default::default());
        r.broken.push("https://diks.net/down".into());
        let page = fetch_page(&mut r, "https://diks.net/down", SHORT).await.unwrap();
        assert!(matches!(page.status, PageStatus::Failed(ref m) if m.contains("RESET")));
        assert!(page.records.is_empty());
    }

    #[tokio::test]
    async fn categories_keep_order_and_close_once() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut r = FakeRenderer::new(
            &[
                ("https://diks.net/a", TWO_CARDS),
                ("https://diks.net/c", TWO_CARDS),
            ],
            closes.clone(),
        );
        r.broken.push("https://diks.net/d".into());
        let urls: Vec<String> = ["a", "b", "c", "d"]
            .iter()
            .map(|p| format!("https://diks.net/{p}"))
            .collect();

        let (pages, stats) = scrape_categories(r, &urls, SHORT).await.unwrap();

        assert_eq!(closes.load(Ordering::SeqCst), 1);
        let order: Vec<&str> = pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(order, urls.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(
            stats,
            ScrapeStats {
                total: 4,
                parsed: 2,
                timed_out: 1,
                failed: 1,
                records: 4,
            }
        );
    }

    #[tokio::test]
    async fn all_pages_timing_out_still_closes() {
        let closes = Arc::new(AtomicUsize::new(0));
        let r = FakeRenderer::new(&[], closes.clone());
        let urls = vec!["https://diks.net/x".to_string(), "https://diks.net/y".to_string()];

        let (pages, stats) = scrape_categories(r, &urls, SHORT).await.unwrap();

        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(pages.len(), 2);
        assert_eq!(stats.records, 0);
        assert_eq!(stats.timed_out, 2);
    }

    #[tokio::test]
    async fn lost_session_is_an_error_not_a_skip() {
        let mut r = FakeRenderer::new(&[], Default::default());
        r.dies_after = Some(0);
        let err = fetch_page(&mut r, "https://diks.net/a", SHORT)
            .await
            .unwrap_err();
        assert!(is_session_lost(&err));
        assert!(format!("{:#}", err).contains("https://diks.net/a"));
    }

    #[tokio::test]
    async fn lost_session_stops_run_and_still_closes() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut r = FakeRenderer::new(&[("https://diks.net/a", TWO_CARDS)], closes.clone());
        r.dies_after = Some(1);
        let urls: Vec<String> = ["a", "b", "c"]
            .iter()
            .map(|p| format!("https://diks.net/{p}"))
            .collect();

        let err = scrape_categories(r, &urls, SHORT).await.unwrap_err();

        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(is_session_lost(&err));
        let msg = format!("{:#}", err);
        assert!(msg.contains("after 1 of 3 pages"), "{msg}");
        assert!(msg.contains("https://diks.net/b"), "{msg}");
    }
}
