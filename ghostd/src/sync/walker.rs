use std::path::PathBuf;

use ghost_core::{RemoteNode, RemoteProvider};
use tracing::{debug, warn};

use super::outcome::{SyncFailure, SyncTask};
use super::paths::child_path;

/// Flattened result of walking one remote tree.
#[derive(Debug, Default)]
pub struct WalkOutput {
    pub tasks: Vec<SyncTask>,
    pub failures: Vec<SyncFailure>,
}

/// Expands a remote directory into file tasks, creating local directories
/// on the way down.
pub struct TreeWalker<'a> {
    provider: &'a dyn RemoteProvider,
    folder: &'a str,
}

impl<'a> TreeWalker<'a> {
    pub fn new(provider: &'a dyn RemoteProvider, folder: &'a str) -> Self {
        Self { provider, folder }
    }

    /// Depth-first walk of `node` into `target`. Tasks are appended in the
    /// provider's listing order. A directory whose listing fails is created
    /// but left empty; a directory that cannot be created locally is skipped
    /// with a failure entry.
    pub async fn walk(&self, node: RemoteNode, target: PathBuf, out: &mut WalkOutput) {
        let mut stack = vec![(node, target)];
        while let Some((mut node, target)) = stack.pop() {
            if !node.is_directory() {
                out.tasks.push(SyncTask::new(node, target));
                continue;
            }

            if let Err(err) = tokio::fs::create_dir_all(&target).await {
                warn!(
                    folder = self.folder,
                    path = %target.display(),
                    error = %err,
                    "failed to create local directory; skipping subtree"
                );
                out.failures.push(self.failure(target, err.to_string()));
                continue;
            }

            let listed = node.ensure_loaded(self.provider).await.map(|_| ());
            if let Err(err) = listed {
                warn!(
                    folder = self.folder,
                    path = %target.display(),
                    remote = %node.locator.path,
                    error = %err,
                    "failed to list remote directory; continuing without its entries"
                );
            }

            let mut children = Vec::new();
            for child in node.into_children() {
                match child_path(&target, &child.name) {
                    Ok(path) => children.push((child, path)),
                    Err(err) => {
                        warn!(
                            folder = self.folder,
                            path = %target.display(),
                            name = %child.name,
                            error = %err,
                            "skipping remote entry"
                        );
                        let reason = format!("remote entry {:?} skipped: {err}", child.name);
                        out.failures.push(self.failure(target.clone(), reason));
                    }
                }
            }
            debug!(
                folder = self.folder,
                path = %target.display(),
                entries = children.len(),
                "expanded remote directory"
            );
            stack.extend(children.into_iter().rev());
        }
    }

    fn failure(&self, path: PathBuf, reason: String) -> SyncFailure {
        SyncFailure {
            folder: self.folder.to_string(),
            path,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::FakeProvider;
    use ghost_core::NodeLocator;
    use tempfile::tempdir;

    fn relative(tasks: &[SyncTask], root: &std::path::Path) -> Vec<String> {
        tasks
            .iter()
            .map(|task| {
                task.target()
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[tokio::test]
    async fn flattens_tree_in_provider_order() {
        let provider = FakeProvider::new().folder(
            "lib-key",
            &[
                ("a.js", "a"),
                ("sub/b.js", "bb"),
                ("sub/c.js", "ccc"),
                ("d.js", "dddd"),
            ],
        );
        let dir = tempdir().unwrap();
        let root = provider.load_root_node("lib-key").await.unwrap();

        let mut out = WalkOutput::default();
        TreeWalker::new(&provider, "lib")
            .walk(root, dir.path().join("lib"), &mut out)
            .await;

        assert_eq!(
            relative(&out.tasks, dir.path()),
            vec!["lib/a.js", "lib/sub/b.js", "lib/sub/c.js", "lib/d.js"]
        );
        assert!(dir.path().join("lib/sub").is_dir());
        assert_eq!(out.tasks[2].node().size(), Some(3));
        assert!(out.failures.is_empty());
    }

    #[tokio::test]
    async fn failed_listing_leaves_empty_directory() {
        let provider = FakeProvider::new()
            .folder("lib-key", &[("broken/x.js", "x"), ("ok/y.js", "y")])
            .fail_listing("lib-key", "/broken");
        let dir = tempdir().unwrap();
        let root = provider.load_root_node("lib-key").await.unwrap();

        let mut out = WalkOutput::default();
        TreeWalker::new(&provider, "lib")
            .walk(root, dir.path().to_path_buf(), &mut out)
            .await;

        assert_eq!(relative(&out.tasks, dir.path()), vec!["ok/y.js"]);
        assert!(dir.path().join("broken").is_dir());
        assert_eq!(std::fs::read_dir(dir.path().join("broken")).unwrap().count(), 0);
        assert!(out.failures.is_empty());
    }

    #[tokio::test]
    async fn empty_directory_yields_no_tasks() {
        let provider = FakeProvider::new().folder("empty-key", &[]);
        let dir = tempdir().unwrap();
        let root = provider.load_root_node("empty-key").await.unwrap();

        let mut out = WalkOutput::default();
        TreeWalker::new(&provider, "cookies")
            .walk(root, dir.path().join("cookies"), &mut out)
            .await;

        assert!(out.tasks.is_empty());
        assert!(dir.path().join("cookies").is_dir());
    }

    #[tokio::test]
    async fn file_node_becomes_single_task() {
        let provider = FakeProvider::new();
        let dir = tempdir().unwrap();
        let node = RemoteNode::file("creds.json", NodeLocator::new("k", "/"), Some(10));

        let mut out = WalkOutput::default();
        TreeWalker::new(&provider, "auth")
            .walk(node, dir.path().join("creds.json"), &mut out)
            .await;

        assert_eq!(out.tasks.len(), 1);
        assert_eq!(provider.remote_calls(), 0);
    }

    #[tokio::test]
    async fn escaping_names_are_reported_not_followed() {
        let provider = FakeProvider::new();
        let dir = tempdir().unwrap();
        let root = RemoteNode::directory("lib", NodeLocator::new("k", "/")).with_children(vec![
            RemoteNode::file("..", NodeLocator::new("k", "/.."), Some(1)),
            RemoteNode::file("ok.js", NodeLocator::new("k", "/ok.js"), Some(1)),
        ]);

        let mut out = WalkOutput::default();
        TreeWalker::new(&provider, "lib")
            .walk(root, dir.path().to_path_buf(), &mut out)
            .await;

        assert_eq!(relative(&out.tasks, dir.path()), vec!["ok.js"]);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].folder, "lib");
        assert_eq!(out.failures[0].path, dir.path());
        assert!(out.failures[0].reason.contains("\"..\""), "{}", out.failures[0].reason);
    }

    #[tokio::test]
    async fn empty_name_is_reported_against_parent() {
        let provider = FakeProvider::new();
        let dir = tempdir().unwrap();
        let root = RemoteNode::directory("lib", NodeLocator::new("k", "/"))
            .with_children(vec![RemoteNode::file("", NodeLocator::new("k", "/"), Some(1))]);

        let mut out = WalkOutput::default();
        TreeWalker::new(&provider, "lib")
            .walk(root, dir.path().join("lib"), &mut out)
            .await;

        assert!(out.tasks.is_empty());
        assert_eq!(out.failures[0].path, dir.path().join("lib"));
        assert!(out.failures[0].reason.contains("empty"), "{}", out.failures[0].reason);
    }

    #[tokio::test]
    async fn blocked_local_directory_is_a_failure() {
        let provider = FakeProvider::new().folder("k", &[("sub/a.js", "a")]);
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("sub"), b"not a dir").unwrap();
        let root = provider.load_root_node("k").await.unwrap();

        let mut out = WalkOutput::default();
        TreeWalker::new(&provider, "lib")
            .walk(root, dir.path().to_path_buf(), &mut out)
            .await;

        assert!(out.tasks.is_empty());
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].path, dir.path().join("sub"));
    }
}
