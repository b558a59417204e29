//! The archive service: complete operations over a remote workbook.
//!
//! Each mutating operation loads the workbook, applies a lifecycle
//! transition in memory, and saves the records sheet (overwrite) through
//! [`persist::save`]. The new history rows are appended in a second save;
//! when that one fails the records stay saved and the outcome carries a
//! warning.
//!
//! Two processes that load the same table can still reserve the same id:
//! the records sheet is last-writer-wins. With `if_match` the later upload
//! conflicts and is retried, but the retry carries rows computed from the
//! stale table, so a caller that needs certainty re-runs the operation.

use arq_core::audit::{self, AuditEntry, AuditFilter, EventKind, FieldChange};
use arq_core::lifecycle::{self, MoveOutcome, NewRecord, Placement, RecordEdit, Transition};
use arq_core::options::columns as opt;
use arq_core::record::{self, columns, Record, Status};
use arq_core::{
    AllocatorState, ArqError, IdCodec, LifecycleError, OptionTables, PrefixResolver, PrefixStrategy,
    RandomPairSession, Result, RetentionTable, Selectboxes, Sheet, SpacesTable,
};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::persist::{self, RetryPolicy, SheetWrite};
use crate::store::{RemoteStore, StoreError, UploadOptions};
use crate::workbook::{sheets, Workbook};

/// Service settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Workbook object path in the store.
    pub workbook: String,
    pub codec: IdCodec,
    pub strategy: PrefixStrategy,
    pub retry: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workbook: "arquivo.json".to_string(),
            codec: IdCodec::default(),
            strategy: PrefixStrategy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Result of a committed operation.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    /// Save attempts used; 0 when nothing needed saving.
    pub attempts: u32,
    /// Set when the history rows could not be written. The records were
    /// still saved.
    pub audit_warning: Option<String>,
}

/// Workbook contents relevant to one operation.
struct Loaded {
    records_sheet: Sheet,
    records: Vec<Record>,
    options: OptionTables,
    history: Sheet,
}

impl Loaded {
    fn from_workbook(workbook: &Workbook) -> Self {
        let records_sheet = workbook.sheet_or_empty(sheets::RECORDS);
        let records = record::records_from_sheet(&records_sheet);
        Self {
            records_sheet,
            records,
            options: OptionTables {
                selectboxes: Selectboxes::new(workbook.sheet_or_empty(sheets::SELECTBOXES)),
                retention: RetentionTable::new(workbook.sheet_or_empty(sheets::RETENTION)),
                spaces: SpacesTable::new(workbook.sheet_or_empty(sheets::SPACES)),
            },
            history: workbook.sheet_or_empty(sheets::HISTORY),
        }
    }

    fn position(&self, id: &str) -> Result<usize> {
        let wanted = id.trim();
        self.records
            .iter()
            .position(|r| r.id.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                LifecycleError::RecordNotFound {
                    id: wanted.to_uppercase(),
                }
                .into()
            })
    }
}

/// History rows for `entries`, or the reason they could not be produced.
fn history_write(entries: &[AuditEntry]) -> std::result::Result<Option<SheetWrite>, String> {
    if entries.is_empty() {
        return Ok(None);
    }
    let mut sheet = audit::empty_history();
    for entry in entries {
        audit::append_entry(&mut sheet, entry).map_err(|e| e.to_string())?;
    }
    Ok(Some(SheetWrite::append(sheets::HISTORY, sheet)))
}

/// Empty sheets with the expected headers, for a new workbook.
#[must_use]
pub fn blank_workbook() -> Workbook {
    let mut workbook = Workbook::new();
    let blank: [(&[&str], Sheet); 5] = [
        (sheets::RECORDS, Sheet::with_columns(columns::ALL.iter().copied())),
        (
            sheets::SELECTBOXES,
            Sheet::with_columns([
                opt::CATEGORIES,
                opt::CATEGORY_ABBR,
                opt::DOCUMENT_TYPES,
                opt::DOCUMENT_TYPE_ABBR,
                opt::RESPONSIBLES,
            ]),
        ),
        (sheets::RETENTION, Sheet::with_columns([opt::RETENTION_ORIGIN, opt::RETENTION_PERIOD])),
        (
            sheets::SPACES,
            Sheet::with_columns([opt::SPACE_NAME, opt::SPACE_SHELVES, opt::SPACE_RACKS]),
        ),
        (sheets::HISTORY, audit::empty_history()),
    ];
    for (aliases, sheet) in blank {
        workbook.put(aliases[0], aliases, sheet);
    }
    workbook
}

/// Records manager over a remote store.
pub struct Archive<S> {
    store: S,
    settings: Settings,
    allocator: AllocatorState,
    session: RandomPairSession,
    clock: fn() -> DateTime<Utc>,
}

impl<S: RemoteStore> Archive<S> {
    pub fn new(store: S, settings: Settings) -> Self {
        Self {
            store,
            allocator: AllocatorState::new(settings.codec),
            settings,
            session: RandomPairSession::new(),
            clock: Utc::now,
        }
    }

    /// Replace the wall clock, for reproducible timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn load(&self) -> Result<Loaded> {
        let snapshot = persist::load(&self.store, &self.settings.workbook)?;
        Ok(Loaded::from_workbook(&snapshot.workbook))
    }

    /// Save the records sheet, then the history rows.
    fn commit(&self, loaded: &Loaded, entries: &[AuditEntry]) -> Result<(u32, Option<String>)> {
        let records = SheetWrite::overwrite(
            sheets::RECORDS,
            record::records_to_sheet(&loaded.records, &loaded.records_sheet),
        );
        let report = persist::save(&self.store, &self.settings.workbook, &[records], &self.settings.retry)?;
        Ok((report.attempts, self.write_history(entries)))
    }

    /// Append history rows in a save of their own. Returns the failure
    /// reason instead of an error.
    fn write_history(&self, entries: &[AuditEntry]) -> Option<String> {
        let written = history_write(entries).and_then(|write| match write {
            Some(write) => persist::save(&self.store, &self.settings.workbook, &[write], &self.settings.retry)
                .map(|_| ())
                .map_err(|e| e.to_string()),
            None => Ok(()),
        });
        match written {
            Ok(()) => None,
            Err(reason) => {
                warn!(error = %reason, entries = entries.len(), "history rows not written");
                Some(reason)
            }
        }
    }

    /// Create the workbook with empty sheets. Returns `false` when it
    /// already exists.
    ///
    /// # Errors
    ///
    /// Returns [`ArqError::Store`] if the store fails.
    pub fn init(&self) -> Result<bool> {
        let bytes = blank_workbook()
            .to_bytes()
            .map_err(|e| ArqError::Serialization(e.to_string()))?;
        match self.store.upload(&self.settings.workbook, &bytes, &UploadOptions::default()) {
            Ok(_) => {
                info!(workbook = %self.settings.workbook, "workbook created");
                Ok(true)
            }
            Err(StoreError::Conflict { status: 409 }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Option tables as currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the workbook cannot be loaded.
    pub fn options(&self) -> Result<OptionTables> {
        Ok(self.load()?.options)
    }

    fn prefix(&mut self, selectboxes: Selectboxes, category: &str, document_type: &str) -> String {
        PrefixResolver::new(selectboxes).resolve(
            self.settings.strategy,
            category,
            document_type,
            &mut self.session,
            &mut rand::thread_rng(),
        )
    }

    /// The id the next registration with these values would get. Nothing is
    /// reserved; with the random-pair strategy the pair drawn here is kept
    /// for the next registration of the same document type.
    ///
    /// # Errors
    ///
    /// Returns [`arq_core::IdError::CapacityExhausted`] when the prefix is
    /// full.
    pub fn preview_id(&mut self, category: &str, document_type: &str) -> Result<String> {
        let loaded = self.load()?;
        let prefix = self.prefix(loaded.options.selectboxes, category, document_type);
        self.allocator.invalidate();
        let index = self.allocator.peek(&prefix, &loaded.records, &[])?;
        Ok(self.allocator.codec().format_id(&prefix, index)?)
    }

    /// Register a new box.
    ///
    /// Validation happens before an id is reserved.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::MissingRequiredField`],
    /// [`arq_core::IdError::CapacityExhausted`], or a store error.
    pub fn register(&mut self, input: &NewRecord) -> Result<Outcome<Record>> {
        input.validate()?;
        let mut loaded = self.load()?;
        let prefix = self.prefix(loaded.options.selectboxes.clone(), &input.category, &input.document_type);
        let id = self.allocator.reserve(&prefix, &loaded.records)?;

        let saved = lifecycle::create(id.clone(), input, &loaded.options.retention, (self.clock)())
            .map_err(ArqError::from)
            .and_then(|(record, entry)| {
                loaded.records.push(record.clone());
                let (attempts, audit_warning) = self.commit(&loaded, &[entry])?;
                Ok((record, attempts, audit_warning))
            });
        let (record, attempts, audit_warning) = match saved {
            Ok(saved) => saved,
            Err(e) => {
                self.allocator.release(&id);
                warn!(id = %id, error = %e, "registration not saved");
                return Err(e);
            }
        };

        self.session.clear();
        info!(id = %record.id, prefix = %prefix, "box registered");
        Ok(Outcome {
            value: record,
            attempts,
            audit_warning,
        })
    }

    /// Mark a box as retrieved.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::RecordNotFound`],
    /// [`LifecycleError::AlreadyRetrieved`], or a store error.
    pub fn retrieve(&mut self, id: &str, transition: &Transition) -> Result<Outcome<Record>> {
        self.transition(id, |record, now| lifecycle::retrieve(record, transition, now))
    }

    /// Return a retrieved box to the archive.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::RecordNotFound`],
    /// [`LifecycleError::NotRetrieved`], or a store error.
    pub fn return_to_archive(&mut self, id: &str, transition: &Transition) -> Result<Outcome<Record>> {
        self.transition(id, |record, now| lifecycle::return_to_archive(record, transition, now))
    }

    /// Edit descriptive metadata of a box.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::RecordNotFound`],
    /// [`LifecycleError::NothingToChange`], or a store error.
    pub fn edit(&mut self, id: &str, changes: &RecordEdit, actor: &str, note: Option<&str>) -> Result<Outcome<Record>> {
        self.transition(id, |record, now| lifecycle::edit(record, changes, actor, note, now))
    }

    fn transition<F>(&mut self, id: &str, apply: F) -> Result<Outcome<Record>>
    where
        F: FnOnce(&mut Record, DateTime<Utc>) -> std::result::Result<AuditEntry, LifecycleError>,
    {
        let mut loaded = self.load()?;
        let index = loaded.position(id)?;
        let entry = apply(&mut loaded.records[index], (self.clock)())?;
        let (attempts, audit_warning) = self.commit(&loaded, &[entry])?;
        let record = loaded.records.swap_remove(index);
        info!(id = %record.id, status = %record.status, "box updated");
        Ok(Outcome {
            value: record,
            attempts,
            audit_warning,
        })
    }

    /// Move archived boxes to a new placement.
    ///
    /// # Errors
    ///
    /// Returns an error if the placement is invalid or the save fails;
    /// unknown and retrieved boxes are reported in the outcome instead.
    pub fn move_records(&mut self, ids: &[String], target: &Placement, actor: &str) -> Result<Outcome<MoveOutcome>> {
        let mut loaded = self.load()?;
        let outcome = lifecycle::move_records(
            &mut loaded.records,
            ids,
            target,
            &loaded.options.spaces,
            actor,
            (self.clock)(),
        )?;
        if outcome.moved.is_empty() {
            return Ok(Outcome {
                value: outcome,
                attempts: 0,
                audit_warning: None,
            });
        }
        let (attempts, audit_warning) = self.commit(&loaded, &outcome.entries)?;
        info!(
            moved = outcome.moved.len(),
            ineligible = outcome.ineligible.len(),
            missing = outcome.missing.len(),
            "boxes moved"
        );
        Ok(Outcome {
            value: outcome,
            attempts,
            audit_warning,
        })
    }

    /// One box by id.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::RecordNotFound`].
    pub fn show(&self, id: &str) -> Result<Record> {
        let mut loaded = self.load()?;
        let index = loaded.position(id)?;
        Ok(loaded.records.swap_remove(index))
    }

    /// All boxes, optionally only those with `status`, in table order.
    ///
    /// # Errors
    ///
    /// Returns an error if the workbook cannot be loaded.
    pub fn list(&self, status: Option<Status>) -> Result<Vec<Record>> {
        let mut records = self.load()?.records;
        if let Some(status) = status {
            records.retain(|r| r.status == status);
        }
        Ok(records)
    }

    /// History entries matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the workbook cannot be loaded.
    pub fn history(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        let loaded = self.load()?;
        Ok(filter.apply(&audit::entries_from_sheet(&loaded.history)))
    }

    /// Replace one option sheet wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`ArqError::Config`] for an unknown sheet name, or a store
    /// error.
    pub fn set_options(&mut self, name: &str, sheet: Sheet, actor: &str) -> Result<Outcome<()>> {
        let aliases = sheets::option_aliases(name)
            .ok_or_else(|| ArqError::Config(format!("unknown option sheet '{name}'")))?;
        if actor.trim().is_empty() {
            return Err(LifecycleError::MissingRequiredField {
                field: "responsible".to_string(),
            }
            .into());
        }
        let snapshot = persist::load(&self.store, &self.settings.workbook)?;
        let before = snapshot.workbook.sheet(aliases).map_or(0, Sheet::len);

        let entry = AuditEntry::new(EventKind::OptionsUpdated, "", actor.trim(), (self.clock)())
            .with_changes(vec![FieldChange::new("rows", before.to_string(), sheet.len().to_string())])
            .with_note(aliases[0]);

        let write = SheetWrite::overwrite(aliases, sheet);
        let report = persist::save(&self.store, &self.settings.workbook, &[write], &self.settings.retry)?;
        let audit_warning = self.write_history(&[entry]);
        self.allocator.invalidate();
        info!(sheet = aliases[0], "options replaced");
        Ok(Outcome {
            value: (),
            attempts: report.attempts,
            audit_warning,
        })
    }
}
