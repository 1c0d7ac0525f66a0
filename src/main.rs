mod aggregate;
mod config;
mod feed;
mod fetcher;
mod parser;
mod pipeline;
mod publish;
mod render;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use config::{FeedConfig, GitHubConfig, FEED_PATH, REMOTE_PATH};
use pipeline::BuiltFeed;
use publish::github::GitHubStore;
use publish::PublishOutcome;
use render::http::HttpRenderer;

#[derive(Parser)]
#[command(name = "diks_feed", about = "Diks vehicle listings to RSS feed")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape all category pages and write the feed locally
    Scrape(ScrapeArgs),
    /// Upload an existing feed file to GitHub
    Publish {
        /// Feed file to upload
        #[arg(short, long, default_value = FEED_PATH)]
        input: PathBuf,
    },
    /// Scrape, write, then publish
    Run(ScrapeArgs),
    /// Parse a saved category page and print its listings as JSON
    Parse {
        /// HTML file to parse
        file: PathBuf,
    },
}

#[derive(Args)]
struct ScrapeArgs {
    /// Where to write the feed document
    #[arg(short, long, default_value = FEED_PATH)]
    output: PathBuf,
    /// Seconds to wait for listings to appear on each page
    #[arg(short, long, default_value = "10")]
    timeout: u64,
    /// Page renderer to use. `http` runs no JavaScript and checks each page
    /// once, so pages that build their listings in the browser are skipped as
    /// timed out without waiting; use `chromium` for those
    #[arg(short, long, value_enum, default_value_t)]
    renderer: RendererKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum RendererKind {
    /// Plain HTTP fetch, no script execution; ignores --timeout
    Http,
    /// Headless Chromium (needs the `chromium` feature)
    Chromium,
}

impl Default for RendererKind {
    fn default() -> Self {
        if cfg!(feature = "chromium") {
            RendererKind::Chromium
        } else {
            RendererKind::Http
        }
    }
}

impl ScrapeArgs {
    fn config(&self) -> FeedConfig {
        FeedConfig {
            ready_timeout: Duration::from_secs(self.timeout),
            output_path: self.output.clone(),
            ..FeedConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scrape(args) => {
            let config = args.config();
            let built = scrape(args.renderer, &config).await?;
            print_scrape(&built, &config);
            Ok(())
        }
        Commands::Publish { input } => publish_feed(&input).await,
        Commands::Run(args) => {
            let config = args.config();
            let built = scrape(args.renderer, &config).await?;
            print_scrape(&built, &config);
            publish_feed(&config.output_path).await
        }
        Commands::Parse { file } => {
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let records = parser::parse_listings(&html);
            println!("{}", serde_json::to_string_pretty(&records)?);
            eprintln!("{} listings", records.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn scrape(kind: RendererKind, config: &FeedConfig) -> Result<BuiltFeed> {
    info!(
        "Scraping {} category pages with the {:?} renderer",
        config.category_urls.len(),
        kind
    );
    match kind {
        RendererKind::Http => {
            warn!(
                "The http renderer does not run scripts and does not wait {:?} for listings; \
                 script-rendered pages will be skipped",
                config.ready_timeout
            );
            pipeline::scrape_to_file(HttpRenderer::new()?, config).await
        }
        RendererKind::Chromium => scrape_chromium(config).await,
    }
}

#[cfg(feature = "chromium")]
async fn scrape_chromium(config: &FeedConfig) -> Result<BuiltFeed> {
    let renderer = render::chromium::ChromiumRenderer::launch().await?;
    pipeline::scrape_to_file(renderer, config).await
}

#[cfg(not(feature = "chromium"))]
async fn scrape_chromium(_config: &FeedConfig) -> Result<BuiltFeed> {
    anyhow::bail!("built without the `chromium` feature; use --renderer http")
}

async fn publish_feed(input: &std::path::Path) -> Result<()> {
    let github = GitHubConfig::from_env()?;
    let store = GitHubStore::new(&github)?;
    let outcome = pipeline::publish_file(&store, input).await?;
    match outcome {
        PublishOutcome::Created => println!("Created {} on {}", REMOTE_PATH, github.branch),
        PublishOutcome::Updated { previous_revision } => println!(
            "Updated {} on {} (previous revision {})",
            REMOTE_PATH, github.branch, previous_revision
        ),
    }
    println!("File has been uploaded and can be accessed at:");
    println!("{}", store.blob_url(REMOTE_PATH));
    Ok(())
}

fn print_scrape(built: &BuiltFeed, config: &FeedConfig) {
    let s = &built.stats;
    println!(
        "Scraped {} pages ({} parsed, {} timed out, {} failed): {} listings.",
        s.total, s.parsed, s.timed_out, s.failed, s.records
    );
    println!(
        "Feed saved to {} ({} bytes)",
        config.output_path.display(),
        built.document.len()
    );
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
