pub mod github;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

const UPDATE_MESSAGE: &str = "Update XML file";
const CREATE_MESSAGE: &str = "Add XML file";

/// Result of looking up a path in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileLookup {
    Found { content: Vec<u8>, revision: String },
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Created,
    Updated { previous_revision: String },
}

/// Version-controlled file storage.
///
/// Lookup failures other than a missing file are returned as `Err`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get_file(&self, path: &str) -> Result<FileLookup>;

    /// Create the file when `revision` is `None`, otherwise update it.
    async fn put_file(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        revision: Option<&str>,
    ) -> Result<()>;
}

/// Create or update `path` with `content`.
pub async fn publish<S>(store: &S, path: &str, content: &[u8]) -> Result<PublishOutcome>
where
    S: BlobStore + ?Sized,
{
    let lookup = store
        .get_file(path)
        .await
        .with_context(|| format!("Failed to look up {}", path))?;

    match lookup {
        FileLookup::Found { content: current, revision } => {
            debug!("Remote {} is {} bytes at {}", path, current.len(), revision);
            store
                .put_file(path, content, UPDATE_MESSAGE, Some(&revision))
                .await
                .with_context(|| format!("Failed to update {}", path))?;
            info!("Updated {} (was {})", path, revision);
            Ok(PublishOutcome::Updated {
                previous_revision: revision,
            })
        }
        FileLookup::NotFound => {
            store
                .put_file(path, content, CREATE_MESSAGE, None)
                .await
                .with_context(|| format!("Failed to create {}", path))?;
            info!("Created {}", path);
            Ok(PublishOutcome::Created)
        }
    }
}
