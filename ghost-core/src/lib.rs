mod client;
mod error;
mod node;
mod provider;

pub use client::{PublicResource, PublicShareClient, ResourceList, ResourceType, TransferLink};
pub use error::{ApiErrorClass, ProviderError};
pub use node::{Children, NodeKind, NodeLocator, RemoteNode};
pub use provider::{ByteStream, DownloadOptions, RemoteProvider};

pub use reqwest::StatusCode;
