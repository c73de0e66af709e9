use std::io;
use std::path::Path;
use std::sync::Arc;

use futures_util::StreamExt;
use ghost_core::{DownloadOptions, ProviderError, RemoteNode, RemoteProvider};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::backoff::Backoff;
use super::outcome::{SyncOutcome, SyncTask};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote fetch failed after {attempts} attempt(s): {source}")]
    Remote {
        attempts: u32,
        #[source]
        source: ProviderError,
    },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("remote entry {0} is not a file")]
    NotAFile(String),
}

/// Failure of a single download attempt, split by which side failed.
enum AttemptError {
    Remote(ProviderError),
    Local(io::Error),
}

/// Fetches single files, skipping ones that are already complete locally.
#[derive(Clone)]
pub struct FileSyncExecutor {
    provider: Arc<dyn RemoteProvider>,
    backoff: Backoff,
    options: DownloadOptions,
}

impl FileSyncExecutor {
    pub fn new(
        provider: Arc<dyn RemoteProvider>,
        backoff: Backoff,
        options: DownloadOptions,
    ) -> Self {
        Self {
            provider,
            backoff,
            options,
        }
    }

    pub async fn sync(&self, task: SyncTask) -> SyncOutcome {
        match self.try_sync(&task).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(path = %task.target().display(), error = %err, "file sync failed");
                SyncOutcome::Failed(err.to_string())
            }
        }
    }

    pub async fn try_sync(&self, task: &SyncTask) -> Result<SyncOutcome, SyncError> {
        let target = task.target();
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if is_sufficient(target, task.node().size()).await {
            debug!(path = %target.display(), "local copy is complete; skipping");
            return Ok(SyncOutcome::Skipped);
        }
        let bytes = self.download(task.node(), target).await?;
        debug!(path = %target.display(), bytes, "downloaded");
        Ok(SyncOutcome::Downloaded)
    }

    /// Streams `node` into `target`, overwriting it. Remote failures are
    /// retried with backoff; local I/O failures end the download at once.
    /// Returns the number of bytes written.
    pub async fn download(&self, node: &RemoteNode, target: &Path) -> Result<u64, SyncError> {
        if node.is_directory() {
            return Err(SyncError::NotAFile(node.locator.path.clone()));
        }
        let mut attempt = 0u32;
        loop {
            match self.download_once(node, target).await {
                Ok(bytes) => return Ok(bytes),
                Err(AttemptError::Local(err)) => return Err(SyncError::Io(err)),
                Err(AttemptError::Remote(err)) => {
                    let delay = if err.is_retryable() {
                        self.backoff.next_delay(attempt)
                    } else {
                        None
                    };
                    let Some(delay) = delay else {
                        return Err(SyncError::Remote {
                            attempts: attempt + 1,
                            source: err,
                        });
                    };
                    warn!(
                        path = %target.display(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "remote fetch failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn download_once(&self, node: &RemoteNode, target: &Path) -> Result<u64, AttemptError> {
        let mut stream = self
            .provider
            .open_download_stream(node, self.options)
            .await
            .map_err(AttemptError::Remote)?;
        let mut file = tokio::fs::File::create(target)
            .await
            .map_err(AttemptError::Local)?;
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(AttemptError::Remote)?;
            file.write_all(&chunk).await.map_err(AttemptError::Local)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(AttemptError::Local)?;
        Ok(written)
    }
}

/// A local file at least as large as the remote one is taken as complete.
/// Unknown or zero remote sizes never count as complete.
async fn is_sufficient(target: &Path, remote_size: Option<u64>) -> bool {
    let Some(remote_size) = remote_size.filter(|size| *size > 0) else {
        return false;
    };
    match tokio::fs::metadata(target).await {
        Ok(meta) => meta.is_file() && meta.len() >= remote_size,
        Err(_) => false,
    }
}
