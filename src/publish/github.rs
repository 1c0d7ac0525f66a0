use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{BlobStore, FileLookup};
use crate::config::GitHubConfig;

const API_BASE: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("diks_feed/", env!("CARGO_PKG_VERSION"));

/// Blob store backed by the GitHub contents API of one repository branch.
pub struct GitHubStore {
    client: Client,
    owner: String,
    repo: String,
    branch: String,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Debug, Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

impl GitHubStore {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .context("GITHUB_TOKEN contains invalid header characters")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .context("Failed to build GitHub client")?;

        Ok(Self {
            client,
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
        })
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            API_BASE,
            self.owner,
            self.repo,
            path.trim_start_matches('/')
        )
    }

    /// Browsable location of a published file.
    pub fn blob_url(&self, path: &str) -> String {
        format!(
            "https://github.com/{}/{}/blob/{}/{}",
            self.owner,
            self.repo,
            self.branch,
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl BlobStore for GitHubStore {
    async fn get_file(&self, path: &str) -> Result<FileLookup> {
        let resp = self
            .client
            .get(self.contents_url(path))
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await
            .context("GitHub contents request failed")?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            debug!("{} not found on {}", path, self.branch);
            return Ok(FileLookup::NotFound);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("GitHub returned HTTP {} for {}: {}", status, path, body);
        }

        let contents: ContentsResponse = resp
            .json()
            .await
            .context("Unexpected GitHub contents response")?;
        let content = decode_content(&contents)?;

        Ok(FileLookup::Found {
            content,
            revision: contents.sha,
        })
    }

    async fn put_file(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        revision: Option<&str>,
    ) -> Result<()> {
        let body = put_request(message, content, &self.branch, revision);
        let resp = self
            .client
            .put(self.contents_url(path))
            .json(&body)
            .send()
            .await
            .context("GitHub upload request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("GitHub rejected upload of {} (HTTP {}): {}", path, status, body);
        }
        Ok(())
    }
}

fn put_request<'a>(
    message: &'a str,
    content: &[u8],
    branch: &'a str,
    sha: Option<&'a str>,
) -> PutRequest<'a> {
    PutRequest {
        message,
        content: STANDARD.encode(content),
        branch,
        sha,
    }
}

// Large files come back without inline content.
fn decode_content(contents: &ContentsResponse) -> Result<Vec<u8>> {
    if contents.encoding != "base64" {
        return Ok(Vec::new());
    }
    let packed: String = contents
        .content
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    STANDARD
        .decode(packed)
        .context("GitHub returned invalid base64 content")
}
