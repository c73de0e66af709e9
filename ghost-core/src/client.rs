use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use reqwest::header::RANGE;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ProviderError;
use crate::node::{NodeLocator, RemoteNode};
use crate::provider::{ByteStream, DownloadOptions, RemoteProvider};

const DEFAULT_BASE_URL: &str = "https://cloud-api.yandex.net";
const LIST_PAGE_SIZE: u32 = 200;
const RANGE_CHUNK_BYTES: u64 = 1024 * 1024;

/// Client for publicly shared folders and files. Shares are addressed by their
/// public key (or public link); no token is needed.
#[derive(Clone)]
pub struct PublicShareClient {
    http: Client,
    base_url: Url,
}

impl PublicShareClient {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, ProviderError> {
        Self::with_http(Client::new(), base_url)
    }

    pub fn with_http(http: Client, base_url: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
        })
    }

    pub async fn get_public_resource(
        &self,
        public_key: &str,
        path: &str,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<PublicResource, ProviderError> {
        let mut url = self.endpoint("/v1/disk/public/resources")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("public_key", public_key);
            if !is_share_root(path) {
                query.append_pair("path", path);
            }
            if let Some(limit) = limit {
                query.append_pair("limit", &limit.to_string());
            }
            if let Some(offset) = offset {
                query.append_pair("offset", &offset.to_string());
            }
        }
        let response = self.http.get(url).send().await?;
        Self::handle_response(response).await
    }

    pub async fn list_public_directory_all(
        &self,
        public_key: &str,
        path: &str,
        page_size: u32,
    ) -> Result<Vec<PublicResource>, ProviderError> {
        let page_size = page_size.max(1);
        let mut offset = 0u32;
        let mut items = Vec::new();
        loop {
            let resource = self
                .get_public_resource(public_key, path, Some(page_size), Some(offset))
                .await?;
            if resource.resource_type != ResourceType::Dir {
                return Err(ProviderError::NotADirectory(path.to_string()));
            }
            let page = resource.embedded.ok_or(ProviderError::MissingEmbedded)?;
            let received = page.items.len() as u32;
            offset = offset.saturating_add(received);
            let total = page.total;
            items.extend(page.items);
            if received == 0 || offset >= total {
                break;
            }
        }
        Ok(items)
    }

    pub async fn get_public_download_link(
        &self,
        public_key: &str,
        path: &str,
    ) -> Result<TransferLink, ProviderError> {
        let mut url = self.endpoint("/v1/disk/public/resources/download")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("public_key", public_key);
            if !is_share_root(path) {
                query.append_pair("path", path);
            }
        }
        let response = self.http.get(url).send().await?;
        Self::handle_response(response).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            Err(Self::api_error(response).await)
        }
    }

    async fn api_error(response: reqwest::Response) -> ProviderError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        ProviderError::Api { status, body }
    }

    /// Downloads `href` as consecutive ranges with up to `connections` requests
    /// in flight. Falls back to a plain stream when the server ignores `Range`.
    async fn ranged_stream(
        &self,
        href: Url,
        size: u64,
        connections: usize,
    ) -> Result<ByteStream, ProviderError> {
        let mut ranges = chunk_ranges(size, RANGE_CHUNK_BYTES).into_iter();
        let Some((start, end)) = ranges.next() else {
            return Ok(stream::empty().boxed());
        };
        let first = self
            .http
            .get(href.clone())
            .header(RANGE, format!("bytes={start}-{end}"))
            .send()
            .await?;
        match first.status() {
            StatusCode::PARTIAL_CONTENT => {}
            status if status.is_success() => return Ok(body_stream(first)),
            _ => return Err(Self::api_error(first).await),
        }
        let head = first.bytes().await?;

        let http = self.http.clone();
        let rest = stream::iter(ranges)
            .map(move |(start, end)| fetch_range(http.clone(), href.clone(), start, end))
            .buffered(connections.max(1));
        Ok(stream::once(async move { Ok::<_, ProviderError>(head) })
            .chain(rest)
            .boxed())
    }
}

#[async_trait]
impl RemoteProvider for PublicShareClient {
    async fn load_root_node(&self, locator: &str) -> Result<RemoteNode, ProviderError> {
        let root = self
            .get_public_resource(locator, "/", Some(LIST_PAGE_SIZE), Some(0))
            .await?;
        Ok(root.into_node(locator))
    }

    async fn load_children(&self, node: &RemoteNode) -> Result<Vec<RemoteNode>, ProviderError> {
        if !node.is_directory() {
            return Err(ProviderError::NotADirectory(node.locator.path.clone()));
        }
        let public_key = node.locator.public_key.as_str();
        let items = self
            .list_public_directory_all(public_key, &node.locator.path, LIST_PAGE_SIZE)
            .await?;
        Ok(items
            .into_iter()
            .map(|item| item.into_child_node(&node.locator))
            .collect())
    }

    async fn open_download_stream(
        &self,
        node: &RemoteNode,
        options: DownloadOptions,
    ) -> Result<ByteStream, ProviderError> {
        let link = self
            .get_public_download_link(&node.locator.public_key, &node.locator.path)
            .await?;
        let href = if options.force_secure_transport {
            secure_href(link.href)
        } else {
            link.href
        };

        match node.size() {
            Some(size) if options.max_connections > 1 && size > RANGE_CHUNK_BYTES => {
                self.ranged_stream(href, size, options.max_connections).await
            }
            _ => {
                let response = self.http.get(href).send().await?;
                if !response.status().is_success() {
                    return Err(Self::api_error(response).await);
                }
                Ok(body_stream(response))
            }
        }
    }
}

async fn fetch_range(
    http: Client,
    href: Url,
    start: u64,
    end: u64,
) -> Result<Bytes, ProviderError> {
    let response = http
        .get(href)
        .header(RANGE, format!("bytes={start}-{end}"))
        .send()
        .await?;
    if response.status() != StatusCode::PARTIAL_CONTENT {
        return Err(PublicShareClient::api_error(response).await);
    }
    Ok(response.bytes().await?)
}

/// The share itself is addressed by its key alone; single-file shares reject
/// an explicit path.
fn is_share_root(path: &str) -> bool {
    path.is_empty() || path == "/"
}

fn body_stream(response: reqwest::Response) -> ByteStream {
    response
        .bytes_stream()
        .map(|chunk| chunk.map_err(ProviderError::from))
        .boxed()
}

fn secure_href(href: Url) -> Url {
    if href.scheme() != "http" {
        return href;
    }
    let mut secure = href.clone();
    match secure.set_scheme("https") {
        Ok(()) => secure,
        Err(()) => href,
    }
}

/// Inclusive byte ranges covering `size` bytes in `chunk`-sized pieces.
fn chunk_ranges(size: u64, chunk: u64) -> Vec<(u64, u64)> {
    let chunk = chunk.max(1);
    let mut ranges = Vec::new();
    let mut start = 0u64;
    while start < size {
        let end = start.saturating_add(chunk).min(size) - 1;
        ranges.push((start, end));
        start = end + 1;
    }
    ranges
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PublicResource {
    #[serde(default)]
    pub path: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(rename = "_embedded", default)]
    pub embedded: Option<ResourceList>,
}

impl PublicResource {
    fn into_node(self, public_key: &str) -> RemoteNode {
        let locator = NodeLocator::new(public_key, self.path.as_deref().unwrap_or("/"));
        self.into_node_at(locator)
    }

    fn into_child_node(self, parent: &NodeLocator) -> RemoteNode {
        let locator = match self.path.as_deref() {
            Some(path) => NodeLocator::new(parent.public_key.clone(), path),
            None => parent.child(&self.name),
        };
        self.into_node_at(locator)
    }

    fn into_node_at(self, locator: NodeLocator) -> RemoteNode {
        match self.resource_type {
            ResourceType::File => RemoteNode::file(self.name, locator, self.size),
            ResourceType::Dir => {
                let node = RemoteNode::directory(self.name, locator);
                // A first page that already holds every item saves a listing.
                match self.embedded {
                    Some(page) if page.offset == 0 && page.items.len() as u32 >= page.total => {
                        let children: Vec<RemoteNode> = page
                            .items
                            .into_iter()
                            .map(|item| item.into_child_node(&node.locator))
                            .collect();
                        node.with_children(children)
                    }
                    _ => node,
                }
            }
        }
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    File,
    Dir,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ResourceList {
    pub items: Vec<PublicResource>,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub total: u32,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TransferLink {
    pub href: Url,
    pub method: String,
    #[serde(default)]
    pub templated: bool,
}
