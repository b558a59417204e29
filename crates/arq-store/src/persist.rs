//! Download, merge, upload with retry.
//!
//! Every attempt starts from a fresh download so concurrent writers' rows
//! survive an append. The upload carries the downloaded entity tag as an
//! `if_match` precondition; a store that honors it turns a lost update into
//! a retryable 412.

use std::thread;
use std::time::Duration;

use arq_core::{ArqError, Sheet};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::store::{RemoteStore, StoreError, UploadOptions};
use crate::workbook::Workbook;

/// Attempts and spacing for contended saves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("stored workbook is not readable: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("workbook could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("save failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: StoreError },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<PersistError> for ArqError {
    fn from(e: PersistError) -> Self {
        ArqError::Store(e.to_string())
    }
}

/// How a sheet is merged into the downloaded workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the sheet.
    Overwrite,
    /// Union the columns and add the rows after the existing ones.
    Append,
}

/// One sheet to write. `aliases[0]` is the name written.
#[derive(Debug, Clone)]
pub struct SheetWrite {
    pub aliases: &'static [&'static str],
    pub sheet: Sheet,
    pub mode: WriteMode,
}

impl SheetWrite {
    #[must_use]
    pub fn overwrite(aliases: &'static [&'static str], sheet: Sheet) -> Self {
        Self {
            aliases,
            sheet,
            mode: WriteMode::Overwrite,
        }
    }

    #[must_use]
    pub fn append(aliases: &'static [&'static str], sheet: Sheet) -> Self {
        Self {
            aliases,
            sheet,
            mode: WriteMode::Append,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.aliases.first().copied().unwrap_or_default()
    }

    fn apply(&self, workbook: &mut Workbook) {
        match self.mode {
            WriteMode::Overwrite => workbook.put(self.name(), self.aliases, self.sheet.clone()),
            WriteMode::Append => workbook.append(self.name(), self.aliases, &self.sheet),
        }
    }
}

/// Workbook as downloaded, with the tag it was read at.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub workbook: Workbook,
    pub etag: Option<String>,
}

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub attempts: u32,
    pub etag: String,
}

/// Download and decode the workbook. A missing object is an empty workbook.
///
/// # Errors
///
/// Returns [`PersistError::Store`] if the download fails and
/// [`PersistError::Decode`] if the stored bytes are not a workbook.
pub fn load<S: RemoteStore + ?Sized>(store: &S, path: &str) -> Result<Snapshot, PersistError> {
    match store.download(path)? {
        Some(object) => Ok(Snapshot {
            workbook: Workbook::from_bytes(&object.bytes).map_err(PersistError::Decode)?,
            etag: Some(object.etag),
        }),
        None => Ok(Snapshot::default()),
    }
}

fn attempt<S: RemoteStore + ?Sized>(store: &S, path: &str, writes: &[SheetWrite]) -> Result<String, PersistError> {
    let Snapshot { mut workbook, etag } = load(store, path)?;
    for write in writes {
        write.apply(&mut workbook);
    }
    let bytes = workbook.to_bytes().map_err(PersistError::Encode)?;
    // a missing object is created without overwrite so a concurrent creator conflicts
    let options = UploadOptions {
        overwrite: etag.is_some(),
        if_match: etag,
    };
    Ok(store.upload(path, &bytes, &options)?)
}

/// Merge `writes` into the stored workbook, retrying on contention.
///
/// # Errors
///
/// Returns [`PersistError::RetriesExhausted`] when every attempt hit a
/// retryable conflict; any other failure is returned at once.
pub fn save<S: RemoteStore + ?Sized>(
    store: &S,
    path: &str,
    writes: &[SheetWrite],
    policy: &RetryPolicy,
) -> Result<SaveReport, PersistError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;
    loop {
        attempts += 1;
        match attempt(store, path, writes) {
            Ok(etag) => {
                info!(path, attempts, sheets = writes.len(), "workbook saved");
                return Ok(SaveReport { attempts, etag });
            }
            Err(PersistError::Store(e)) if e.is_retryable() => {
                if attempts >= max_attempts {
                    warn!(path, attempts, error = %e, "giving up on save");
                    return Err(PersistError::RetriesExhausted { attempts, last: e });
                }
                warn!(path, attempt = attempts, error = %e, "save contended, retrying");
                if !policy.delay.is_zero() {
                    thread::sleep(policy.delay);
                }
            }
            Err(e) => {
                debug!(path, attempts, error = %e, "save failed");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::{RemoteObject, StoreResult};
    use crate::workbook::sheets;
    use std::cell::Cell;

    const PATH: &str = "arquivo.json";

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::ZERO,
        }
    }

    fn one_row(id: &str) -> Sheet {
        let mut sheet = Sheet::with_columns(["ID"]);
        sheet.push_row([("ID", id)]);
        sheet
    }

    fn stored(store: &MemoryStore) -> Workbook {
        Workbook::from_bytes(&store.object(PATH).unwrap()).unwrap()
    }

    // === Retry ===

    #[test]
    fn conflict_then_success_saves_on_second_attempt() {
        let store = MemoryStore::new();
        store.fail_next_upload(StoreError::Conflict { status: 409 });

        let report = save(&store, PATH, &[SheetWrite::overwrite(sheets::RECORDS, one_row("A"))], &fast(5)).unwrap();
        assert_eq!(report.attempts, 2);
        assert_eq!(store.uploads(), 1);
        assert_eq!(stored(&store).sheet(sheets::RECORDS).unwrap().cell(0, "ID"), "A");
    }

    #[test]
    fn exhausted_retries_report_last_error() {
        let store = MemoryStore::new();
        for _ in 0..5 {
            store.fail_next_upload(StoreError::from_message("-2147018894"));
        }
        let err = save(&store, PATH, &[SheetWrite::overwrite(sheets::RECORDS, one_row("A"))], &fast(5)).unwrap_err();
        match err {
            PersistError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 5);
                assert!(matches!(last, StoreError::Locked(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.uploads(), 0);
        assert!(store.object(PATH).is_none());
    }

    #[test]
    fn non_retryable_errors_surface_immediately() {
        let store = MemoryStore::new();
        store.fail_next_upload(StoreError::Other("quota exceeded".to_string()));
        let err = save(&store, PATH, &[SheetWrite::overwrite(sheets::RECORDS, one_row("A"))], &fast(5)).unwrap_err();
        assert!(matches!(err, PersistError::Store(StoreError::Other(_))));
        assert_eq!(store.upload_attempts(), 1);
    }

    #[test]
    fn unreadable_workbook_is_not_overwritten() {
        let store = MemoryStore::new();
        store.put_object(PATH, "not a workbook");
        let err = save(&store, PATH, &[SheetWrite::overwrite(sheets::RECORDS, one_row("A"))], &fast(5)).unwrap_err();
        assert!(matches!(err, PersistError::Decode(_)));
        assert_eq!(store.object(PATH).unwrap(), b"not a workbook");
    }

    // === Merge ===

    #[test]
    fn append_keeps_existing_rows_and_overwrite_replaces() {
        let store = MemoryStore::new();
        let writes = [
            SheetWrite::overwrite(sheets::RECORDS, one_row("A")),
            SheetWrite::append(sheets::HISTORY, one_row("A")),
        ];
        save(&store, PATH, &writes, &fast(1)).unwrap();
        let writes = [
            SheetWrite::overwrite(sheets::RECORDS, one_row("B")),
            SheetWrite::append(sheets::HISTORY, one_row("B")),
        ];
        save(&store, PATH, &writes, &fast(1)).unwrap();

        let wb = stored(&store);
        let records = wb.sheet(sheets::RECORDS).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records.cell(0, "ID"), "B");
        let history = wb.sheet(sheets::HISTORY).unwrap();
        assert_eq!(history.distinct("ID"), vec!["A", "B"]);
    }

    /// Store where another session appends history right after our first
    /// download.
    struct Interfering {
        inner: MemoryStore,
        armed: Cell<bool>,
    }

    impl RemoteStore for Interfering {
        fn download(&self, path: &str) -> StoreResult<Option<RemoteObject>> {
            let seen = self.inner.download(path)?;
            if self.armed.replace(false) {
                let mut wb = Workbook::new();
                wb.append(sheets::HISTORY[0], sheets::HISTORY, &one_row("OTHER"));
                self.inner.put_object(path, wb.to_bytes().unwrap());
            }
            Ok(seen)
        }

        fn upload(&self, path: &str, bytes: &[u8], options: &UploadOptions) -> StoreResult<String> {
            self.inner.upload(path, bytes, options)
        }
    }

    #[test]
    fn concurrent_change_is_detected_and_merged() {
        let store = Interfering {
            inner: MemoryStore::new(),
            armed: Cell::new(true),
        };
        store.inner.put_object(PATH, Workbook::new().to_bytes().unwrap());

        let report = save(&store, PATH, &[SheetWrite::append(sheets::HISTORY, one_row("MINE"))], &fast(5)).unwrap();
        assert_eq!(report.attempts, 2);

        let wb = Workbook::from_bytes(&store.inner.object(PATH).unwrap()).unwrap();
        assert_eq!(wb.sheet(sheets::HISTORY).unwrap().distinct("ID"), vec!["OTHER", "MINE"]);
    }
}
