use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("remote entry name is empty")]
    Empty,
    #[error("remote entry name {0:?} is not a single path component")]
    UnsupportedComponent(String),
}

/// Local path for a remote entry called `name` inside `parent`.
///
/// Names come from the remote provider, so anything that would leave `parent`
/// (`..`, separators, absolute paths) is rejected.
pub fn child_path(parent: &Path, name: &str) -> Result<PathBuf, PathError> {
    if name.is_empty() {
        return Err(PathError::Empty);
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == name => Ok(parent.join(part)),
        _ => Err(PathError::UnsupportedComponent(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_plain_names() {
        let parent = PathBuf::from("/work/plugins");
        assert_eq!(
            child_path(&parent, "menu.js").unwrap(),
            PathBuf::from("/work/plugins/menu.js")
        );
    }

    #[test]
    fn rejects_escaping_names() {
        let parent = PathBuf::from("/work/plugins");
        assert_eq!(child_path(&parent, ""), Err(PathError::Empty));
        for name in ["..", ".", "a/b", "/etc", "a/"] {
            assert!(
                matches!(
                    child_path(&parent, name),
                    Err(PathError::UnsupportedComponent(_))
                ),
                "{name}"
            );
        }
    }
}
