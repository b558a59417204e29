//! Sequence allocation: the next unused suffix index for a prefix.
//!
//! The highest index in use per prefix is derived data. [`AllocatorState`]
//! caches it for one session; the record table stays the source of truth and
//! [`AllocatorState::reserve`] always rebuilds from it before claiming.
//!
//! Only in-process allocations are serialized (through `&mut self`). Two
//! processes that read the same table can still compute the same next id;
//! the deployment relies on a single writer at a time.

use std::collections::HashMap;

use tracing::debug;

use crate::error::IdError;
use crate::identifier::IdCodec;
use crate::record::Record;

/// Highest index in use per prefix among `records`.
fn scan<'a>(codec: &IdCodec, ids: impl IntoIterator<Item = &'a str>) -> HashMap<String, u32> {
    let mut last: HashMap<String, u32> = HashMap::new();
    for id in ids {
        if let Some((prefix, index)) = codec.split_id(id) {
            last.entry(prefix)
                .and_modify(|current| *current = (*current).max(index))
                .or_insert(index);
        }
    }
    last
}

fn bump(codec: &IdCodec, prefix: &str, base: Option<u32>) -> Result<u32, IdError> {
    let next = base.map_or(0, |b| b.saturating_add(1));
    if next >= codec.capacity() {
        return Err(IdError::CapacityExhausted {
            prefix: prefix.to_string(),
            capacity: codec.capacity(),
        });
    }
    Ok(next)
}

/// Next index for `prefix` given every known record: one past the highest
/// decoded index among ids with that prefix, or 0 when there are none.
///
/// # Errors
///
/// Returns [`IdError::CapacityExhausted`] when the namespace is full.
pub fn next_index(codec: &IdCodec, prefix: &str, records: &[Record]) -> Result<u32, IdError> {
    let last = scan(codec, records.iter().map(|r| r.id.as_str()));
    bump(codec, prefix, last.get(prefix).copied())
}

/// Session-scoped allocation cache, owned by the caller.
#[derive(Debug, Clone, Default)]
pub struct AllocatorState {
    codec: IdCodec,
    scanned: HashMap<String, u32>,
    claimed: HashMap<String, u32>,
    built: bool,
}

impl AllocatorState {
    #[must_use]
    pub fn new(codec: IdCodec) -> Self {
        Self {
            codec,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn codec(&self) -> &IdCodec {
        &self.codec
    }

    /// Whether the per-prefix cache has been built since the last
    /// invalidation.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Rebuild the per-prefix cache from a full scan of `records`.
    pub fn rebuild(&mut self, records: &[Record]) {
        self.scanned = scan(&self.codec, records.iter().map(|r| r.id.as_str()));
        self.built = true;
        debug!(prefixes = self.scanned.len(), "allocator cache rebuilt");
    }

    /// Drop the scanned cache; the next lookup rescans.
    pub fn invalidate(&mut self) {
        self.scanned.clear();
        self.built = false;
    }

    /// Highest index known for `prefix`, from the scan or from an id claimed
    /// in this session.
    #[must_use]
    pub fn last_index(&self, prefix: &str) -> Option<u32> {
        let scanned = self.scanned.get(prefix).copied();
        let claimed = self.claimed.get(prefix).copied();
        scanned.max(claimed)
    }

    /// Next index without claiming it, for previews.
    ///
    /// Uses the memoized cache (building it from `records` on first use) and
    /// also looks at `pending` records created in this session that the cache
    /// has not seen yet.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::CapacityExhausted`] when the namespace is full.
    pub fn peek(&mut self, prefix: &str, records: &[Record], pending: &[Record]) -> Result<u32, IdError> {
        if !self.built {
            self.rebuild(records);
        }
        let pending_last = scan(&self.codec, pending.iter().map(|r| r.id.as_str()))
            .get(prefix)
            .copied();
        bump(&self.codec, prefix, self.last_index(prefix).max(pending_last))
    }

    /// Claim the next id for `prefix`.
    ///
    /// Rebuilds the cache from `records` (the freshly loaded table plus any
    /// in-memory additions), computes the next index, and records the claim
    /// so later reservations in this session never reuse it, even before
    /// the table reflects the new record.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::CapacityExhausted`] when the namespace is full; the
    /// cache is rebuilt but nothing is claimed.
    pub fn reserve(&mut self, prefix: &str, records: &[Record]) -> Result<String, IdError> {
        self.rebuild(records);
        let index = bump(&self.codec, prefix, self.last_index(prefix))?;
        let id = self.codec.format_id(prefix, index)?;
        self.claimed.insert(prefix.to_string(), index);
        debug!(prefix, index, id = %id, "identifier reserved");
        Ok(id)
    }

    /// Give back the claim on `id` after the record it named was not saved.
    ///
    /// Only the latest claim for a prefix can be released; anything else is
    /// ignored.
    pub fn release(&mut self, id: &str) {
        let Some((prefix, index)) = self.codec.split_id(id) else {
            return;
        };
        if self.claimed.get(&prefix) != Some(&index) {
            return;
        }
        match index.checked_sub(1) {
            Some(previous) => self.claimed.insert(prefix.clone(), previous),
            None => self.claimed.remove(&prefix),
        };
        debug!(prefix = %prefix, index, "identifier released");
    }
}
