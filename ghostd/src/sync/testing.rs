use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use ghost_core::{
    ByteStream, DownloadOptions, NodeLocator, ProviderError, RemoteNode, RemoteProvider,
    StatusCode,
};

type Key = (String, String);

fn key(public_key: &str, path: &str) -> Key {
    (public_key.to_string(), path.to_string())
}

/// In-memory remote tree with scripted failures and call accounting.
#[derive(Default)]
pub struct FakeProvider {
    listings: HashMap<Key, Vec<RemoteNode>>,
    contents: HashMap<Key, Vec<u8>>,
    file_shares: HashMap<String, String>,
    failing_listings: HashSet<Key>,
    download_failures: Mutex<HashMap<Key, u32>>,
    broken_streams: Mutex<HashMap<Key, u32>>,
    remote_calls: AtomicUsize,
    downloads: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a folder share with files given as share-relative paths.
    pub fn folder(mut self, public_key: &str, files: &[(&str, &str)]) -> Self {
        self.listings.entry(key(public_key, "/")).or_default();
        for (rel, body) in files {
            let mut parent = "/".to_string();
            let parts: Vec<&str> = rel.split('/').collect();
            for (i, part) in parts.iter().enumerate() {
                let path = if parent == "/" {
                    format!("/{part}")
                } else {
                    format!("{parent}/{part}")
                };
                let locator = NodeLocator::new(public_key, path.clone());
                let is_file = i + 1 == parts.len();
                let siblings = self.listings.entry(key(public_key, &parent)).or_default();
                if !siblings.iter().any(|node| node.name == *part) {
                    let node = if is_file {
                        RemoteNode::file(*part, locator, Some(body.len() as u64))
                    } else {
                        RemoteNode::directory(*part, locator)
                    };
                    siblings.push(node);
                }
                if is_file {
                    self.contents
                        .insert(key(public_key, &path), body.as_bytes().to_vec());
                } else {
                    self.listings.entry(key(public_key, &path)).or_default();
                }
                parent = path;
            }
        }
        self
    }

    pub fn single_file(mut self, public_key: &str, name: &str, body: &[u8]) -> Self {
        self.file_shares
            .insert(public_key.to_string(), name.to_string());
        self.contents.insert(key(public_key, "/"), body.to_vec());
        self
    }

    pub fn fail_listing(mut self, public_key: &str, path: &str) -> Self {
        self.failing_listings.insert(key(public_key, path));
        self
    }

    /// The next `times` download attempts of the file fail with a 503.
    pub fn fail_downloads(self, public_key: &str, path: &str, times: u32) -> Self {
        self.download_failures
            .lock()
            .unwrap()
            .insert(key(public_key, path), times);
        self
    }

    /// The next `times` downloads of the file send the first half of the body
    /// and then fail with a 502.
    pub fn break_streams(self, public_key: &str, path: &str, times: u32) -> Self {
        self.broken_streams
            .lock()
            .unwrap()
            .insert(key(public_key, path), times);
        self
    }

    pub fn remote_calls(&self) -> usize {
        self.remote_calls.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    fn unavailable() -> ProviderError {
        ProviderError::Api {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: "unavailable".into(),
        }
    }

    fn not_found() -> ProviderError {
        ProviderError::Api {
            status: StatusCode::NOT_FOUND,
            body: "not found".into(),
        }
    }
}

#[async_trait]
impl RemoteProvider for FakeProvider {
    async fn load_root_node(&self, locator: &str) -> Result<RemoteNode, ProviderError> {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
        let root = NodeLocator::new(locator, "/");
        if let Some(name) = self.file_shares.get(locator) {
            let size = self.contents.get(&key(locator, "/")).map(|b| b.len() as u64);
            return Ok(RemoteNode::file(name.clone(), root, size));
        }
        if self.listings.contains_key(&key(locator, "/")) {
            return Ok(RemoteNode::directory(locator, root));
        }
        Err(Self::not_found())
    }

    async fn load_children(&self, node: &RemoteNode) -> Result<Vec<RemoteNode>, ProviderError> {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
        let id = key(&node.locator.public_key, &node.locator.path);
        if self.failing_listings.contains(&id) {
            return Err(Self::unavailable());
        }
        self.listings
            .get(&id)
            .cloned()
            .ok_or_else(|| ProviderError::NotADirectory(node.locator.path.clone()))
    }

    async fn open_download_stream(
        &self,
        node: &RemoteNode,
        _options: DownloadOptions,
    ) -> Result<ByteStream, ProviderError> {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
        let id = key(&node.locator.public_key, &node.locator.path);
        if let Some(remaining) = self.download_failures.lock().unwrap().get_mut(&id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Self::unavailable());
            }
        }
        let body = self.contents.get(&id).cloned().ok_or_else(Self::not_found)?;
        self.downloads.lock().unwrap().push(node.locator.path.clone());
        let mid = body.len() / 2;
        let mut broken = false;
        if let Some(remaining) = self.broken_streams.lock().unwrap().get_mut(&id)
            && *remaining > 0
        {
            *remaining -= 1;
            broken = true;
        }
        let tail = if broken {
            Err(ProviderError::Api {
                status: StatusCode::BAD_GATEWAY,
                body: "connection reset".into(),
            })
        } else {
            Ok(Bytes::copy_from_slice(&body[mid..]))
        };
        let chunks = vec![Ok(Bytes::copy_from_slice(&body[..mid])), tail];
        Ok(stream::iter(chunks).boxed())
    }
}
