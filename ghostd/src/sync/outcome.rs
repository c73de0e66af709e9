use std::path::PathBuf;

use ghost_core::RemoteNode;

/// One remote file to fetch into one local path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTask {
    node: RemoteNode,
    target: PathBuf,
}

impl SyncTask {
    pub fn new(node: RemoteNode, target: PathBuf) -> Self {
        Self { node, target }
    }

    pub fn node(&self) -> &RemoteNode {
        &self.node
    }

    pub fn target(&self) -> &PathBuf {
        &self.target
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Skipped,
    Downloaded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub folder: String,
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AggregateReport {
    pub skipped: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub failures: Vec<SyncFailure>,
    /// Folders that were found missing or empty and fetched from the remote.
    pub populated: Vec<String>,
}

impl AggregateReport {
    pub fn record(&mut self, folder: &str, path: PathBuf, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Skipped => self.skipped += 1,
            SyncOutcome::Downloaded => self.downloaded += 1,
            SyncOutcome::Failed(reason) => self.record_failure(folder, path, reason),
        }
    }

    pub fn record_failure(&mut self, folder: &str, path: PathBuf, reason: impl Into<String>) {
        self.failed += 1;
        self.failures.push(SyncFailure {
            folder: folder.to_string(),
            path,
            reason: reason.into(),
        });
    }

    pub fn succeeded(&self) -> usize {
        self.skipped + self.downloaded
    }

    pub fn is_empty(&self) -> bool {
        self.succeeded() == 0 && self.failed == 0 && self.populated.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_counts_each_outcome() {
        let mut report = AggregateReport::default();
        assert!(report.is_empty());

        report.record("lib", "/w/lib/a".into(), SyncOutcome::Skipped);
        report.record("lib", "/w/lib/b".into(), SyncOutcome::Downloaded);
        report.record("lib", "/w/lib/c".into(), SyncOutcome::Failed("boom".into()));

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed, 1);
        assert_eq!(
            report.failures,
            vec![SyncFailure {
                folder: "lib".into(),
                path: "/w/lib/c".into(),
                reason: "boom".into(),
            }]
        );
        assert!(!report.is_empty());
    }
}
