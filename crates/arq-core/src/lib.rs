//! # arq-core
//!
//! Core types, identifier allocation, and record lifecycle for ARQ, a
//! records manager for physical archive boxes.
//!
//! - [`IdCodec`]: fixed-width `PPPP` + digits + letter identifiers
//! - [`PrefixResolver`] and [`RandomPairSession`]: the four-letter prefix
//! - [`AllocatorState`]: session-scoped next-index cache
//! - [`Record`] and [`Status`]: one archive box
//! - [`lifecycle`]: create, retrieve, return, move, edit
//! - [`audit`]: history entries and queries
//! - [`Sheet`]: the tabular model everything persists through
//! - Error hierarchy ([`ArqError`], [`IdError`], [`LifecycleError`])

pub mod allocator;
pub mod audit;
pub mod error;
pub mod identifier;
pub mod lifecycle;
pub mod options;
pub mod prefix;
pub mod record;
pub mod retention;
pub mod sheet;

pub use allocator::AllocatorState;
pub use audit::{AuditEntry, AuditFilter, EventKind, FieldChange};
pub use error::{ArqError, IdError, LifecycleError, Result};
pub use identifier::IdCodec;
pub use lifecycle::{MoveOutcome, NewRecord, Placement, RecordEdit, Transition};
pub use options::{OptionTables, RetentionTable, Selectboxes, SpacesTable};
pub use prefix::{PrefixResolver, PrefixStrategy, RandomPairSession};
pub use record::{Record, Status};
pub use retention::RetentionPolicy;
pub use sheet::Sheet;
