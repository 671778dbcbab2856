use anyhow::{anyhow, Result};
use std::path::Path;
use tracing::debug;

/// Last path component as an owned string, or the whole path when there is
/// no component to take.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Recursively deletes a directory tree.
///
/// Refuses the filesystem root and empty paths. A tree that is already gone
/// is not an error.
///
/// # Errors
///
/// Returns an error for the refused paths and for any filesystem failure
/// other than the tree being absent.
pub async fn remove_tree(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() || path == Path::new("/") {
        return Err(anyhow!("refusing to delete {}", path.display()));
    }

    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("{} already removed", path.display());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn file_name_takes_the_last_component() {
        assert_eq!(file_name(Path::new("/ws/projects/shop")), "shop");
        assert_eq!(file_name(Path::new("shop")), "shop");
    }

    #[tokio::test]
    async fn remove_tree_refuses_root_and_empty() {
        assert!(remove_tree(Path::new("/")).await.is_err());
        assert!(remove_tree(Path::new("")).await.is_err());
    }

    #[tokio::test]
    async fn remove_tree_deletes_recursively_and_tolerates_absence() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("meta");
        std::fs::create_dir_all(root.join("nested")).unwrap();
        std::fs::write(root.join("nested/info.json"), "{}").unwrap();

        remove_tree(&root).await.unwrap();
        assert!(!root.exists());

        // Second removal is a no-op.
        remove_tree(&root).await.unwrap();

        assert!(remove_tree(&PathBuf::from("/")).await.is_err());
    }
}
