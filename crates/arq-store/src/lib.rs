//! # arq-store
//!
//! Persistence for ARQ. The whole archive is one workbook object in a
//! [`RemoteStore`]; [`persist::save`] merges sheet writes into it with
//! retry, and [`Archive`] runs complete operations on top.

pub mod archive;
pub mod fs;
pub mod memory;
pub mod persist;
pub mod store;
pub mod workbook;

pub use archive::{Archive, Outcome, Settings};
pub use fs::FsStore;
pub use memory::MemoryStore;
pub use persist::{PersistError, RetryPolicy, SheetWrite, WriteMode};
pub use store::{RemoteObject, RemoteStore, StoreError, UploadOptions};
pub use workbook::{sanitize_sheet_name, Workbook};
