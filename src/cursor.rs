//! Detached fail-fast cursors.
//!
//! A cursor holds no borrow of its map: every call takes `&map` or
//! `&mut map` explicitly, the way handles address their owner in a
//! handle-based map. That is what makes the fail-fast contract observable
//! at all -- between two cursor calls the caller is free to mutate the
//! table, and the cursor snapshots the table's generation so it can refuse
//! to continue after a structural change it did not make itself.
//!
//! `remove` is the one sanctioned mid-iteration mutation: it vacates the
//! slot yielded by the last `next`, then re-synchronizes the cursor to the
//! table's new generation so iteration can go on. Exhaustion is `Ok(None)`,
//! not an error.

use crate::probe_hash_map::ProbeHashMap;
use crate::raw_table::RawTable;
use core::fmt;

/// Why a cursor call refused to proceed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorError {
    /// The table changed structurally (new-key insert, removal, rehash, or
    /// clear) since the cursor was created or last re-synchronized.
    TableModified,
    /// `remove` was called before any successful `next`, or a second time
    /// for the same yielded entry.
    NothingToRemove,
}

impl fmt::Display for CursorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CursorError::TableModified => {
                f.write_str("table was structurally modified behind the cursor")
            }
            CursorError::NothingToRemove => {
                f.write_str("cursor has no freshly yielded entry to remove")
            }
        }
    }
}

impl std::error::Error for CursorError {}

/// Slot-walk state shared by the three typed cursors.
#[derive(Clone, Debug)]
struct RawCursor {
    /// First slot index not yet examined.
    next_index: usize,
    /// Slot index of the most recent successful `next`.
    last_index: usize,
    /// Set by a successful `next`, consumed by `remove`.
    armed: bool,
    expected_generation: u64,
}

impl RawCursor {
    fn new(generation: u64) -> Self {
        Self {
            next_index: 0,
            last_index: 0,
            armed: false,
            expected_generation: generation,
        }
    }

    fn has_next<K, V>(&self, table: &RawTable<K, V>) -> bool {
        table.next_occupied(self.next_index).is_some()
    }

    /// Advance to the next occupied slot. The generation check comes
    /// first: a desynced cursor must not report exhaustion.
    fn advance<K, V>(
        &mut self,
        table: &RawTable<K, V>,
        generation: u64,
    ) -> Result<Option<usize>, CursorError> {
        if generation != self.expected_generation {
            return Err(CursorError::TableModified);
        }
        match table.next_occupied(self.next_index) {
            Some(index) => {
                self.last_index = index;
                self.next_index = index + 1;
                self.armed = true;
                Ok(Some(index))
            }
            None => Ok(None),
        }
    }

    /// Yield the slot index `remove` should vacate, disarming the cursor.
    /// The generation is checked here too: after an external rehash the
    /// remembered index may address a different entry.
    fn removal_index(&mut self, generation: u64) -> Result<usize, CursorError> {
        if generation != self.expected_generation {
            return Err(CursorError::TableModified);
        }
        if !self.armed {
            return Err(CursorError::NothingToRemove);
        }
        self.armed = false;
        Ok(self.last_index)
    }

    fn resync(&mut self, generation: u64) {
        self.expected_generation = generation;
    }
}

macro_rules! cursor_common {
    () => {
        /// Whether a further `next` would yield an entry. Scans forward
        /// without advancing the cursor.
        pub fn has_next<K, V, S>(&self, map: &ProbeHashMap<K, V, S>) -> bool {
            self.raw.has_next(map.raw())
        }

        /// Remove the entry yielded by the last `next`, returning it.
        ///
        /// Fails with [`CursorError::NothingToRemove`] unless it directly
        /// follows a successful `next` not already consumed by a prior
        /// `remove`, and with [`CursorError::TableModified`] if the table
        /// changed behind the cursor. On success the cursor re-synchronizes
        /// and iteration continues.
        pub fn remove<K, V, S>(
            &mut self,
            map: &mut ProbeHashMap<K, V, S>,
        ) -> Result<(K, V), CursorError> {
            let index = self.raw.removal_index(map.generation())?;
            let entry = map
                .remove_at(index)
                .expect("armed cursor must address an occupied slot");
            self.raw.resync(map.generation());
            Ok(entry)
        }
    };
}

/// Fail-fast cursor yielding keys.
#[derive(Clone, Debug)]
pub struct KeyCursor {
    raw: RawCursor,
}

impl KeyCursor {
    pub(crate) fn new<K, V, S>(map: &ProbeHashMap<K, V, S>) -> Self {
        Self {
            raw: RawCursor::new(map.generation()),
        }
    }

    /// Next key in ascending slot order, or `Ok(None)` when exhausted.
    pub fn next<'a, K, V, S>(
        &mut self,
        map: &'a ProbeHashMap<K, V, S>,
    ) -> Result<Option<&'a K>, CursorError> {
        let index = self.raw.advance(map.raw(), map.generation())?;
        Ok(index.and_then(|i| map.raw().entry(i)).map(|(key, _)| key))
    }

    cursor_common!();
}

/// Fail-fast cursor yielding values.
#[derive(Clone, Debug)]
pub struct ValueCursor {
    raw: RawCursor,
}

impl ValueCursor {
    pub(crate) fn new<K, V, S>(map: &ProbeHashMap<K, V, S>) -> Self {
        Self {
            raw: RawCursor::new(map.generation()),
        }
    }

    /// Next value in ascending slot order, or `Ok(None)` when exhausted.
    pub fn next<'a, K, V, S>(
        &mut self,
        map: &'a ProbeHashMap<K, V, S>,
    ) -> Result<Option<&'a V>, CursorError> {
        let index = self.raw.advance(map.raw(), map.generation())?;
        Ok(index.and_then(|i| map.raw().entry(i)).map(|(_, value)| value))
    }

    cursor_common!();
}

/// Fail-fast cursor yielding key/value pairs.
#[derive(Clone, Debug)]
pub struct EntryCursor {
    raw: RawCursor,
}

impl EntryCursor {
    pub(crate) fn new<K, V, S>(map: &ProbeHashMap<K, V, S>) -> Self {
        Self {
            raw: RawCursor::new(map.generation()),
        }
    }

    /// Next pair in ascending slot order, or `Ok(None)` when exhausted.
    pub fn next<'a, K, V, S>(
        &mut self,
        map: &'a ProbeHashMap<K, V, S>,
    ) -> Result<Option<(&'a K, &'a V)>, CursorError> {
        let index = self.raw.advance(map.raw(), map.generation())?;
        Ok(index.and_then(|i| map.raw().entry(i)))
    }

    cursor_common!();
}
