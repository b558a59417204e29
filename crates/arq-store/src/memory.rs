//! In-process store with scriptable failures.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::store::{check_preconditions, etag, RemoteObject, RemoteStore, StoreError, StoreResult, UploadOptions};

#[derive(Debug, Default)]
struct Inner {
    objects: HashMap<String, Vec<u8>>,
    /// Scripted outcomes for the next upload attempts; `None` lets one through.
    failures: VecDeque<Option<StoreError>>,
    attempts: usize,
    uploads: usize,
}

/// Objects kept in memory. Scripted outcomes are consumed by the next upload
/// attempts in order, before any precondition is checked.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store an object directly, bypassing preconditions and counters.
    pub fn put_object(&self, path: &str, bytes: impl Into<Vec<u8>>) {
        self.lock().objects.insert(path.to_string(), bytes.into());
    }

    #[must_use]
    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(path).cloned()
    }

    /// Make the next upload attempt fail with `error`.
    pub fn fail_next_upload(&self, error: StoreError) {
        self.lock().failures.push_back(Some(error));
    }

    /// Let the next upload attempt through, so failures queued after it hit
    /// later attempts.
    pub fn pass_next_upload(&self) {
        self.lock().failures.push_back(None);
    }

    /// Upload calls made, failed ones included.
    #[must_use]
    pub fn upload_attempts(&self) -> usize {
        self.lock().attempts
    }

    /// Uploads that changed the stored object.
    #[must_use]
    pub fn uploads(&self) -> usize {
        self.lock().uploads
    }
}

impl RemoteStore for MemoryStore {
    fn download(&self, path: &str) -> StoreResult<Option<RemoteObject>> {
        Ok(self.lock().objects.get(path).cloned().map(RemoteObject::new))
    }

    fn upload(&self, path: &str, bytes: &[u8], options: &UploadOptions) -> StoreResult<String> {
        let mut inner = self.lock();
        inner.attempts += 1;
        if let Some(Some(error)) = inner.failures.pop_front() {
            return Err(error);
        }
        check_preconditions(inner.objects.get(path).map(Vec::as_slice), options)?;
        inner.objects.insert(path.to_string(), bytes.to_vec());
        inner.uploads += 1;
        Ok(etag(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_failures_come_first() {
        let store = MemoryStore::new();
        store.fail_next_upload(StoreError::Conflict { status: 409 });

        let opts = UploadOptions::overwrite();
        assert!(store.upload("wb", b"1", &opts).is_err());
        assert!(store.upload("wb", b"1", &opts).is_ok());
        assert_eq!(store.upload_attempts(), 2);
        assert_eq!(store.uploads(), 1);
        assert_eq!(store.object("wb").unwrap(), b"1");
    }

    #[test]
    fn passed_upload_defers_the_next_failure() {
        let store = MemoryStore::new();
        store.pass_next_upload();
        store.fail_next_upload(StoreError::Other("quota exceeded".to_string()));

        let opts = UploadOptions::overwrite();
        assert!(store.upload("wb", b"1", &opts).is_ok());
        assert!(store.upload("wb", b"2", &opts).is_err());
        assert_eq!(store.object("wb").unwrap(), b"1");
    }

    #[test]
    fn put_object_changes_the_etag() {
        let store = MemoryStore::new();
        store.put_object("wb", "a");
        let seen = store.download("wb").unwrap().unwrap().etag;
        store.put_object("wb", "b");

        let err = store
            .upload("wb", b"c", &UploadOptions::overwrite().if_match(Some(seen)))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { status: 412 }));
        assert_eq!(store.uploads(), 0);
    }
}
