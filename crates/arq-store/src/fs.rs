//! Directory-rooted store.
//!
//! Objects are files under a root directory. A sibling `<file>.lock` marks
//! the object as held by another session (uploads fail with
//! [`StoreError::Locked`]). Writes go to a temporary file that is renamed
//! over the target.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::store::{check_preconditions, etag, RemoteObject, RemoteStore, StoreError, StoreResult, UploadOptions};

#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an object path under the root. Absolute paths and `..` are
    /// rejected.
    fn object_path(&self, path: &str) -> StoreResult<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.trim().is_empty() || escapes {
            return Err(StoreError::Other(format!("invalid object path: {path}")));
        }
        Ok(self.root.join(relative))
    }

    /// Lock marker for an object.
    #[must_use]
    pub fn lock_path(&self, path: &str) -> PathBuf {
        let mut name = self.root.join(path).into_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn read(full: &Path) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(full) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

impl RemoteStore for FsStore {
    fn download(&self, path: &str) -> StoreResult<Option<RemoteObject>> {
        let full = self.object_path(path)?;
        Ok(Self::read(&full)?.map(RemoteObject::new))
    }

    fn upload(&self, path: &str, bytes: &[u8], options: &UploadOptions) -> StoreResult<String> {
        let full = self.object_path(path)?;
        if self.lock_path(path).exists() {
            return Err(StoreError::Locked(path.to_string()));
        }
        let current = Self::read(&full)?;
        check_preconditions(current.as_deref(), options)?;

        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = full.clone().into_os_string();
        tmp.push(format!(".tmp-{}", std::process::id()));
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, bytes)?;
        if let Err(e) = fs::rename(&tmp, &full) {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::Io(e));
        }

        let tag = etag(bytes);
        debug!(path, etag = %tag, size = bytes.len(), "object written");
        Ok(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, FsStore) {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn missing_object_downloads_as_none() {
        let (_dir, store) = store();
        assert!(store.download("arquivo.json").unwrap().is_none());
    }

    #[test]
    fn upload_then_download() {
        let (_dir, store) = store();
        let tag = store
            .upload("sub/arquivo.json", b"{}", &UploadOptions::overwrite())
            .unwrap();
        let object = store.download("sub/arquivo.json").unwrap().unwrap();
        assert_eq!(object.bytes, b"{}");
        assert_eq!(object.etag, tag);
    }

    #[test]
    fn lock_file_blocks_uploads() {
        let (_dir, store) = store();
        fs::write(store.lock_path("arquivo.json"), "").unwrap();
        let err = store
            .upload("arquivo.json", b"{}", &UploadOptions::overwrite())
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.status(), Some(423));
    }

    #[test]
    fn stale_etag_is_rejected() {
        let (_dir, store) = store();
        let first = store.upload("a.json", b"1", &UploadOptions::overwrite()).unwrap();
        store.upload("a.json", b"2", &UploadOptions::overwrite()).unwrap();

        let err = store
            .upload("a.json", b"3", &UploadOptions::overwrite().if_match(Some(first)))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { status: 412 }));
        assert_eq!(store.download("a.json").unwrap().unwrap().bytes, b"2");
    }

    #[test]
    fn no_overwrite_on_existing_object_conflicts() {
        let (_dir, store) = store();
        store.upload("a.json", b"1", &UploadOptions::default()).unwrap();
        let err = store.upload("a.json", b"2", &UploadOptions::default()).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { status: 409 }));
    }

    #[test]
    fn paths_may_not_escape_the_root() {
        let (_dir, store) = store();
        assert!(matches!(store.download("../x.json"), Err(StoreError::Other(_))));
        assert!(matches!(store.download("/etc/passwd"), Err(StoreError::Other(_))));
    }
}
