use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

pub const CATEGORY_URLS: &[&str] = &[
    "https://diks.net/voertuigen/1/personenautos",
    "https://diks.net/voertuigen/2/bestelbussen",
    "https://diks.net/voertuigen/3/personenbussen",
    "https://diks.net/voertuigen/4/koelwagens",
    "https://diks.net/voertuigen/6/autotransporters",
    "https://diks.net/voertuigen/7/vrachtwagens",
    "https://diks.net/voertuigen/62/elektrisch",
];

/// Origin that relative listing links are resolved against.
pub const BASE_URL: &str = "https://diks.net/";

pub const LISTING_SELECTOR: &str = ".grid a";
pub const NAME_SELECTOR: &str = ".text-brand-500";
pub const PRICE_SELECTOR: &str = r#"[data-testid="VehicleCard.price"]"#;
pub const IMAGE_SELECTOR: &str = "img";

pub const READY_TIMEOUT: Duration = Duration::from_secs(10);
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub const FEED_PATH: &str = "scraped_products.xml";
pub const REMOTE_PATH: &str = "scraped_products.xml";
pub const DEFAULT_BRANCH: &str = "main";

/// Settings for one scrape run.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub category_urls: Vec<String>,
    pub ready_timeout: Duration,
    pub output_path: PathBuf,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            category_urls: CATEGORY_URLS.iter().map(|u| u.to_string()).collect(),
            ready_timeout: READY_TIMEOUT,
            output_path: PathBuf::from(FEED_PATH),
        }
    }
}

/// Where the feed gets published. Read from the environment.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub token: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl GitHubConfig {
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN")
            .context("GITHUB_TOKEN environment variable must be set")?;
        let full = std::env::var("GITHUB_REPO")
            .context("GITHUB_REPO environment variable must be set (owner/name)")?;
        let branch = std::env::var("GITHUB_BRANCH").unwrap_or_else(|_| DEFAULT_BRANCH.into());
        let (owner, repo) = parse_repo(&full)?;

        Ok(Self {
            token,
            owner,
            repo,
            branch,
        })
    }
}

fn parse_repo(full: &str) -> Result<(String, String)> {
    match full.trim().split_once('/') {
        Some((owner, repo))
            if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') =>
        {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => bail!("GITHUB_REPO must look like owner/name, got {:?}", full),
    }
}
