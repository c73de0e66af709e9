use std::path::Path;
use std::sync::Arc;

use ghost_core::RemoteProvider;
use thiserror::Error;
use tracing::{info, warn};

use super::executor::{FileSyncExecutor, SyncError};

/// Smallest credential file that is worth handing to the session layer.
pub const MIN_CREDENTIAL_BYTES: u64 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DegradedReason {
    #[error("no credential locator configured")]
    NoLocator,
    #[error("credential file too small ({bytes} bytes)")]
    Undersized { bytes: u64 },
    #[error("credential fetch failed: {0}")]
    Fetch(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapReport {
    /// A valid file was already on disk; nothing was fetched.
    Existing { bytes: u64 },
    Downloaded { bytes: u64 },
    /// No usable file; the caller falls back to interactive login.
    Degraded(DegradedReason),
}

impl BootstrapReport {
    pub fn is_degraded(&self) -> bool {
        matches!(self, BootstrapReport::Degraded(_))
    }
}

/// Fetches the one credential file the session layer needs at startup.
pub struct BootstrapFetcher {
    provider: Arc<dyn RemoteProvider>,
    executor: FileSyncExecutor,
}

impl BootstrapFetcher {
    pub fn new(provider: Arc<dyn RemoteProvider>, executor: FileSyncExecutor) -> Self {
        Self { provider, executor }
    }

    /// Never fails: every problem becomes a degraded report, and any partial
    /// or undersized file is removed.
    pub async fn fetch(&self, locator: Option<&str>, target: &Path) -> BootstrapReport {
        if let Some(bytes) = local_len(target).await {
            if bytes >= MIN_CREDENTIAL_BYTES {
                info!(path = %target.display(), bytes, "existing credential file found");
                return BootstrapReport::Existing { bytes };
            }
            remove_quietly(target).await;
        }

        let Some(locator) = locator.map(str::trim).filter(|l| !l.is_empty()) else {
            info!("no credential locator configured; interactive login required");
            return BootstrapReport::Degraded(DegradedReason::NoLocator);
        };

        info!(path = %target.display(), "downloading credential file");
        let report = match self.download(locator, target).await {
            Ok(()) => match local_len(target).await {
                Some(bytes) if bytes >= MIN_CREDENTIAL_BYTES => {
                    BootstrapReport::Downloaded { bytes }
                }
                bytes => BootstrapReport::Degraded(DegradedReason::Undersized {
                    bytes: bytes.unwrap_or(0),
                }),
            },
            Err(err) => BootstrapReport::Degraded(DegradedReason::Fetch(err.to_string())),
        };

        match &report {
            BootstrapReport::Degraded(reason) => {
                remove_quietly(target).await;
                warn!(path = %target.display(), %reason, "credential bootstrap degraded");
            }
            _ => info!(path = %target.display(), "credential file downloaded"),
        }
        report
    }

    async fn download(&self, locator: &str, target: &Path) -> Result<(), SyncError> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let node = self
            .provider
            .load_root_node(locator)
            .await
            .map_err(|source| SyncError::Remote {
                attempts: 1,
                source,
            })?;
        self.executor.download(&node, target).await?;
        Ok(())
    }
}

async fn local_len(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path)
        .await
        .ok()
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
}

async fn remove_quietly(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await
        && err.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %err, "failed to remove credential file");
    }
}
