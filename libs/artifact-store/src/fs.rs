//! Filesystem backed artifact store
use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use tracing::debug;

use crate::{ArtifactStore, StoreError};

/// longest single path component most filesystems accept
pub const MAX_COMPONENT_LEN: usize = 255;
/// longest full path accepted before even trying the write
pub const MAX_PATH_LEN: usize = 4096;

/// Writes artifacts as files below a root directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// New store rooted at `root`. The directory is created lazily on the
    /// first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// the directory artifacts are written below
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path an artifact called `name` is written to. Only plain relative
    /// names are accepted, anything that would land outside the root is
    /// refused.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(name);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(StoreError::OutsideRoot {
                path: relative.to_path_buf(),
            });
        }
        Ok(self.root.join(relative))
    }
}

fn check_len(path: &Path) -> Result<(), StoreError> {
    let len = path.as_os_str().len();
    if len > MAX_PATH_LEN {
        return Err(StoreError::PathTooLong {
            path: path.to_path_buf(),
            len,
        });
    }
    if let Some(len) = path
        .components()
        .map(|c| c.as_os_str().len())
        .find(|len| *len > MAX_COMPONENT_LEN)
    {
        return Err(StoreError::PathTooLong {
            path: path.to_path_buf(),
            len,
        });
    }
    Ok(())
}

impl ArtifactStore for FsStore {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        check_len(&path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| StoreError::from_io(parent, err))?;
        }
        fs::write(&path, bytes).map_err(|err| StoreError::from_io(&path, err))?;
        debug!(path = %path.display(), len = bytes.len(), "wrote artifact");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        env,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    static DIR_SEQ: AtomicUsize = AtomicUsize::new(0);

    fn scratch_dir() -> PathBuf {
        env::temp_dir().join(format!(
            "artifact-store-fs-{}-{}",
            std::process::id(),
            DIR_SEQ.fetch_add(1, Ordering::Relaxed)
        ))
    }

    #[test]
    fn test_write_creates_parents() {
        let root = scratch_dir();
        let store = FsStore::new(&root);
        store.write("nested/deeper/shot.png", b"png").unwrap();

        let written = fs::read(root.join("nested/deeper/shot.png")).unwrap();
        assert_eq!(written, b"png");
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_component_too_long() {
        let root = scratch_dir();
        let store = FsStore::new(&root);
        let name = "x".repeat(MAX_COMPONENT_LEN + 1);
        let err = store.write(&name, b"data").unwrap_err();
        assert!(matches!(err, StoreError::PathTooLong { len, .. } if len == MAX_COMPONENT_LEN + 1));
        // nothing was created
        assert!(!root.exists());
    }

    #[test]
    fn test_names_stay_below_root() {
        let parent = scratch_dir();
        let root = parent.join("root");
        let store = FsStore::new(&root);
        assert_eq!(store.root(), root.as_path());

        let absolute = parent.join("escaped.txt");
        for name in [absolute.to_str().unwrap(), "../escaped.txt", "a/../../escaped.txt"] {
            let err = store.write(name, b"data").unwrap_err();
            assert_eq!(err.reason(), "outside_root", "{name}");
        }
        assert!(!parent.exists());

        store.write("./ok/shot.png", b"png").unwrap();
        assert!(root.join("ok/shot.png").exists());
        fs::remove_dir_all(&parent).unwrap();
    }

    #[test]
    fn test_path_too_long() {
        let store = FsStore::new(scratch_dir());
        let name = vec!["y".repeat(200); 25].join("/");
        let err = store.write(&name, b"data").unwrap_err();
        assert_eq!(err.reason(), "path_length");
    }
}
