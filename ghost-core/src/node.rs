use crate::error::ProviderError;
use crate::provider::RemoteProvider;

/// Where an entry lives on the provider: the share it belongs to and the
/// path inside that share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLocator {
    pub public_key: String,
    pub path: String,
}

impl NodeLocator {
    pub fn new(public_key: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            path: path.into(),
        }
    }

    pub fn child(&self, name: &str) -> Self {
        let path = if self.path.ends_with('/') {
            format!("{}{name}", self.path)
        } else {
            format!("{}/{name}", self.path)
        };
        Self {
            public_key: self.public_key.clone(),
            path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Children {
    Unloaded,
    Loaded(Vec<RemoteNode>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    File { size: Option<u64> },
    Directory { children: Children },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteNode {
    pub name: String,
    pub locator: NodeLocator,
    pub kind: NodeKind,
}

impl RemoteNode {
    pub fn file(name: impl Into<String>, locator: NodeLocator, size: Option<u64>) -> Self {
        Self {
            name: name.into(),
            locator,
            kind: NodeKind::File { size },
        }
    }

    pub fn directory(name: impl Into<String>, locator: NodeLocator) -> Self {
        Self {
            name: name.into(),
            locator,
            kind: NodeKind::Directory {
                children: Children::Unloaded,
            },
        }
    }

    pub fn with_children(mut self, loaded: Vec<RemoteNode>) -> Self {
        if let NodeKind::Directory { children } = &mut self.kind {
            *children = Children::Loaded(loaded);
        }
        self
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    /// Byte size of a file; `None` for directories and unknown sizes.
    pub fn size(&self) -> Option<u64> {
        match self.kind {
            NodeKind::File { size } => size,
            NodeKind::Directory { .. } => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Directory {
                children: Children::Loaded(_)
            }
        )
    }

    /// Loads the children of a directory once. Later calls return the cached
    /// list without contacting the provider. Files have no children.
    pub async fn ensure_loaded<P>(&mut self, provider: &P) -> Result<&[RemoteNode], ProviderError>
    where
        P: RemoteProvider + ?Sized,
    {
        if matches!(
            self.kind,
            NodeKind::Directory {
                children: Children::Unloaded
            }
        ) {
            let loaded = provider.load_children(self).await?;
            if let NodeKind::Directory { children } = &mut self.kind {
                *children = Children::Loaded(loaded);
            }
        }
        Ok(match &self.kind {
            NodeKind::Directory {
                children: Children::Loaded(children),
            } => children.as_slice(),
            _ => &[],
        })
    }

    /// Consumes the node, returning loaded children (empty when unloaded).
    pub fn into_children(self) -> Vec<RemoteNode> {
        match self.kind {
            NodeKind::Directory {
                children: Children::Loaded(children),
            } => children,
            _ => Vec::new(),
        }
    }
}
