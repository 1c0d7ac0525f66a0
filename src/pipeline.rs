use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::aggregate;
use crate::config::{FeedConfig, REMOTE_PATH};
use crate::feed;
use crate::fetcher::{self, ScrapeStats};
use crate::publish::{self, BlobStore, PublishOutcome};
use crate::render::PageRenderer;

/// A serialized feed plus how the scrape went.
pub struct BuiltFeed {
    pub document: Vec<u8>,
    pub stats: ScrapeStats,
}

/// Scrape all categories with `renderer` and serialize the feed.
///
/// Yields a document even when every page was skipped. A lost renderer
/// session is returned as `Err` and nothing is serialized.
pub async fn build_feed<R>(
    renderer: R,
    config: &FeedConfig,
    generated_at: DateTime<Utc>,
) -> Result<BuiltFeed>
where
    R: PageRenderer,
{
    let (pages, stats) =
        fetcher::scrape_categories(renderer, &config.category_urls, config.ready_timeout)
            .await?;

    let aggregator = aggregate::aggregate(pages);
    if aggregator.is_empty() {
        warn!(
            "No listings found on any of {} pages; the feed will have no items",
            stats.total
        );
    } else {
        info!(
            "Aggregated {} records from {} pages ({} skipped)",
            aggregator.len(),
            stats.parsed,
            stats.timed_out + stats.failed
        );
    }

    let document = feed::serialize(aggregator.records(), generated_at)?;
    Ok(BuiltFeed { document, stats })
}

/// Build the feed and write it to the configured output path.
pub async fn scrape_to_file<R>(renderer: R, config: &FeedConfig) -> Result<BuiltFeed>
where
    R: PageRenderer,
{
    let built = build_feed(renderer, config, Utc::now()).await?;
    feed::save(&config.output_path, &built.document)?;
    info!("Data saved to RSS XML file: {}", config.output_path.display());
    Ok(built)
}

/// Upload a feed file from disk to the remote store.
pub async fn publish_file<S>(store: &S, input: &Path) -> Result<PublishOutcome>
where
    S: BlobStore + ?Sized,
{
    let content =
        std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    publish::publish(store, REMOTE_PATH, &content).await
}
