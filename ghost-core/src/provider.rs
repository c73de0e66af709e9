use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;

use crate::error::ProviderError;
use crate::node::RemoteNode;

/// Body of a remote file, yielded in order.
pub type ByteStream = BoxStream<'static, Result<Bytes, ProviderError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Upper bound on parallel connections used for a single file.
    pub max_connections: usize,
    /// Rewrite plain-http download links to https.
    pub force_secure_transport: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            max_connections: 6,
            force_secure_transport: false,
        }
    }
}

/// Remote content-storage tree as seen by the sync engine.
#[async_trait]
pub trait RemoteProvider: Send + Sync {
    /// Resolves a share locator to its root entry.
    async fn load_root_node(&self, locator: &str) -> Result<RemoteNode, ProviderError>;

    /// Lists the direct children of a directory node, in provider order.
    async fn load_children(&self, node: &RemoteNode) -> Result<Vec<RemoteNode>, ProviderError>;

    async fn open_download_stream(
        &self,
        node: &RemoteNode,
        options: DownloadOptions,
    ) -> Result<ByteStream, ProviderError>;
}
