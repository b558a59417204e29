//! Remote document store abstraction.
//!
//! The workbook lives as a single object in a store that only offers whole
//! object download and upload. Contention shows up as conflict or lock
//! errors, which [`StoreError::is_retryable`] recognizes.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Platform lock code reported by hosted spreadsheets while another session
/// holds the file.
pub const LOCK_CODE: &str = "-2147018894";

/// HTTP statuses treated as transient contention.
pub const RETRYABLE_STATUSES: &[u16] = &[409, 412, 423, 429];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("remote conflict (HTTP {status})")]
    Conflict { status: u16 },

    #[error("object is locked: {0}")]
    Locked(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Other(String),
}

impl From<StoreError> for arq_core::ArqError {
    fn from(e: StoreError) -> Self {
        arq_core::ArqError::Store(e.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

fn mentions_lock(message: &str) -> bool {
    message.contains(LOCK_CODE) || message.to_lowercase().contains("lock")
}

impl StoreError {
    /// Classify an HTTP-style failure.
    #[must_use]
    pub fn from_status(status: u16, message: &str) -> Self {
        match status {
            404 => Self::NotFound(message.to_string()),
            423 => Self::Locked(message.to_string()),
            s if RETRYABLE_STATUSES.contains(&s) => Self::Conflict { status: s },
            _ => Self::from_message(message),
        }
    }

    /// Classify a bare error message.
    #[must_use]
    pub fn from_message(message: &str) -> Self {
        if mentions_lock(message) {
            Self::Locked(message.to_string())
        } else {
            Self::Other(message.to_string())
        }
    }

    /// HTTP status equivalent, when there is one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Conflict { status } => Some(*status),
            Self::Locked(_) => Some(423),
            Self::NotFound(_) => Some(404),
            Self::Io(_) | Self::Other(_) => None,
        }
    }

    /// Whether the failure is contention that a later attempt may clear.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Conflict { status } => RETRYABLE_STATUSES.contains(status),
            Self::Locked(_) => true,
            Self::Other(message) => mentions_lock(message),
            Self::NotFound(_) | Self::Io(_) => false,
        }
    }
}

/// Entity tag of an object's bytes: lowercase SHA-256 hex.
#[must_use]
pub fn etag(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Downloaded object and its entity tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub bytes: Vec<u8>,
    pub etag: String,
}

impl RemoteObject {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        let etag = etag(&bytes);
        Self { bytes, etag }
    }
}

/// Upload preconditions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Replace an existing object; otherwise an existing object is a 409.
    pub overwrite: bool,
    /// Entity tag the current object must still have, else 412.
    pub if_match: Option<String>,
}

impl UploadOptions {
    #[must_use]
    pub fn overwrite() -> Self {
        Self {
            overwrite: true,
            if_match: None,
        }
    }

    #[must_use]
    pub fn if_match(mut self, etag: Option<String>) -> Self {
        self.if_match = etag;
        self
    }
}

/// Check upload preconditions against the object currently stored.
pub(crate) fn check_preconditions(current: Option<&[u8]>, options: &UploadOptions) -> StoreResult<()> {
    match (current, &options.if_match) {
        (Some(_), _) if !options.overwrite => Err(StoreError::Conflict { status: 409 }),
        (Some(bytes), Some(expected)) if etag(bytes) != *expected => {
            Err(StoreError::Conflict { status: 412 })
        }
        (None, Some(_)) => Err(StoreError::Conflict { status: 412 }),
        _ => Ok(()),
    }
}

/// Whole-object store holding the workbook.
pub trait RemoteStore {
    /// Fetch an object; `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] for anything other than absence.
    fn download(&self, path: &str) -> StoreResult<Option<RemoteObject>>;

    /// Write an object, returning its new entity tag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when a precondition fails and
    /// [`StoreError::Locked`] while another session holds the object.
    fn upload(&self, path: &str, bytes: &[u8], options: &UploadOptions) -> StoreResult<String>;
}

impl<S: RemoteStore + ?Sized> RemoteStore for &S {
    fn download(&self, path: &str) -> StoreResult<Option<RemoteObject>> {
        (**self).download(path)
    }

    fn upload(&self, path: &str, bytes: &[u8], options: &UploadOptions) -> StoreResult<String> {
        (**self).upload(path, bytes, options)
    }
}

impl<S: RemoteStore + ?Sized> RemoteStore for Box<S> {
    fn download(&self, path: &str) -> StoreResult<Option<RemoteObject>> {
        (**self).download(path)
    }

    fn upload(&self, path: &str, bytes: &[u8], options: &UploadOptions) -> StoreResult<String> {
        (**self).upload(path, bytes, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contention_statuses_are_retryable() {
        for status in [409, 412, 429] {
            let err = StoreError::from_status(status, "busy");
            assert!(err.is_retryable(), "{status}");
            assert_eq!(err.status(), Some(status));
        }
        assert!(matches!(StoreError::from_status(423, "x"), StoreError::Locked(_)));
        assert!(!StoreError::from_status(500, "boom").is_retryable());
        assert!(!StoreError::from_status(404, "gone").is_retryable());
    }

    #[test]
    fn lock_messages_are_retryable() {
        assert!(StoreError::from_message("error -2147018894 while saving").is_retryable());
        assert!(StoreError::from_message("The resource is LOCKED").is_retryable());
        assert!(StoreError::Other("file is locked by another user".to_string()).is_retryable());
        assert!(!StoreError::from_message("disk full").is_retryable());
        assert!(!StoreError::Io(std::io::Error::other("lock")).is_retryable());
    }

    #[test]
    fn etag_is_sha256_hex() {
        assert_eq!(
            etag(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(RemoteObject::new(b"x".to_vec()).etag, etag(b"x"));
    }

    #[test]
    fn preconditions() {
        let over = UploadOptions::overwrite();
        assert!(check_preconditions(None, &UploadOptions::default()).is_ok());
        assert!(check_preconditions(Some(b"a".as_slice()), &over).is_ok());
        assert!(matches!(
            check_preconditions(Some(b"a".as_slice()), &UploadOptions::default()),
            Err(StoreError::Conflict { status: 409 })
        ));
        assert!(check_preconditions(Some(b"a".as_slice()), &over.clone().if_match(Some(etag(b"a")))).is_ok());
        assert!(matches!(
            check_preconditions(Some(b"b".as_slice()), &over.clone().if_match(Some(etag(b"a")))),
            Err(StoreError::Conflict { status: 412 })
        ));
        assert!(matches!(
            check_preconditions(None, &over.if_match(Some(etag(b"a")))),
            Err(StoreError::Conflict { status: 412 })
        ));
    }
}
