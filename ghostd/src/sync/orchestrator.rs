use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::join_all;
use ghost_core::RemoteProvider;
use tracing::{debug, info, warn};

use super::executor::FileSyncExecutor;
use super::limiter::Limiter;
use super::outcome::{AggregateReport, SyncOutcome};
use super::walker::{TreeWalker, WalkOutput};
use crate::config::{FolderSpec, SyncConfig};

/// Makes sure the workspace folders exist and fills remote-backed ones that
/// are missing or empty.
pub struct SyncOrchestrator {
    provider: Arc<dyn RemoteProvider>,
    workspace: PathBuf,
    config: SyncConfig,
}

impl SyncOrchestrator {
    pub fn new(provider: Arc<dyn RemoteProvider>, workspace: PathBuf, config: SyncConfig) -> Self {
        Self {
            provider,
            workspace,
            config,
        }
    }

    pub fn executor(&self) -> FileSyncExecutor {
        FileSyncExecutor::new(
            Arc::clone(&self.provider),
            self.config.backoff(),
            self.config.download_options(),
        )
    }

    /// Folders are walked one after another, but every file task goes through
    /// one limiter, and all of them settle before the report is returned.
    pub async fn ensure_assets(&self, folders: &[FolderSpec]) -> AggregateReport {
        let mut report = AggregateReport::default();

        let mut pending = Vec::new();
        for folder in folders {
            let path = self.workspace.join(&folder.name);
            if let Err(err) = tokio::fs::create_dir_all(&path).await {
                warn!(folder = %folder.name, error = %err, "failed to create folder");
                report.record_failure(&folder.name, path, err.to_string());
                continue;
            }
            if let Some(locator) = folder.locator()
                && is_missing_or_empty(&path).await
            {
                pending.push((folder.name.as_str(), locator, path));
            }
        }

        if pending.is_empty() {
            debug!("asset folders already populated");
            return report;
        }
        info!(
            folders = ?pending.iter().map(|(name, _, _)| *name).collect::<Vec<_>>(),
            "downloading asset folders"
        );

        let limiter = Limiter::new(self.config.concurrency);
        let executor = self.executor();
        let mut scheduled = Vec::new();
        for (name, locator, path) in pending {
            let root = match self.provider.load_root_node(locator).await {
                Ok(root) => root,
                Err(err) => {
                    warn!(folder = name, error = %err, "failed to load remote folder");
                    report.record_failure(name, path, err.to_string());
                    continue;
                }
            };
            if !root.is_directory() {
                info!(folder = name, "remote entry is not a folder; nothing to sync");
                continue;
            }

            let mut walked = WalkOutput::default();
            TreeWalker::new(self.provider.as_ref(), name)
                .walk(root, path, &mut walked)
                .await;
            report.populated.push(name.to_string());
            for failure in walked.failures {
                report.record_failure(&failure.folder, failure.path, failure.reason);
            }
            debug!(folder = name, files = walked.tasks.len(), "queued folder files");

            for task in walked.tasks {
                let target = task.target().clone();
                let executor = executor.clone();
                let handle = limiter.schedule(async move { executor.sync(task).await });
                scheduled.push((name, target, handle));
            }
        }

        let (labels, handles): (Vec<_>, Vec<_>) = scheduled
            .into_iter()
            .map(|(name, target, handle)| ((name, target), handle))
            .unzip();
        for ((name, target), result) in labels.into_iter().zip(join_all(handles).await) {
            let outcome = result.unwrap_or_else(|err| SyncOutcome::Failed(err.to_string()));
            report.record(name, target, outcome);
        }

        if report.failed == 0 {
            info!(
                downloaded = report.downloaded,
                skipped = report.skipped,
                "asset folders ready"
            );
        } else {
            warn!(
                downloaded = report.downloaded,
                skipped = report.skipped,
                failed = report.failed,
                "asset folders partially synchronized"
            );
        }
        report
    }
}

async fn is_missing_or_empty(path: &Path) -> bool {
    match tokio::fs::read_dir(path).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
        Err(_) => true,
    }
}
