//! probe-hashmap: a key→value map built from scratch on an open-addressed,
//! quadratically probed, prime-sized slot array, with tombstone deletion,
//! load-factor growth, live views, and fail-fast cursors.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: own the whole map contract -- probing, resizing, iteration --
//!   without delegating storage to a built-in table, in layers that can be
//!   reasoned about independently.
//! - Layers:
//!   - prime: primality test and next-prime search; every capacity the
//!     crate allocates comes from here.
//!   - raw_table: tagged slots (Empty / Occupied / Tombstone), the slot
//!     array with its occupied/tombstone counters, and the quadratic probe
//!     resolver. Hash-free: callers pass a 64-bit hash and an equality
//!     closure.
//!   - probe_hash_map: the public `ProbeHashMap` -- construction
//!     coercions, core operations, the rehash engine, the structural
//!     generation counter, and the structural traits.
//!   - view: live, non-copying windows (keys / values / entries) with
//!     plain borrowing iterators.
//!   - cursor: detached fail-fast cursors that take the map per call and
//!     support removal mid-iteration.
//!
//! Constraints
//! - Single-threaded: no internal locking; callers supply their own
//!   mutual exclusion if they share the map.
//! - Capacity is always prime and occupancy (occupied plus tombstones)
//!   never passes half of it, which is what guarantees every probe scan
//!   reaches an empty slot.
//! - Keys are unique: at most one occupied slot per key, always.
//! - Structural changes bump a generation counter; value-only overwrites
//!   do not.
//!
//! Why this split?
//! - Localize invariants: raw_table never hashes and never grows; the map
//!   layer owns both policies, so probe-coverage preconditions live in
//!   exactly one place.
//! - The storage layer never runs user code outside the equality closure
//!   of a probe scan.
//! - Cursors hold no borrow of the map, so the fail-fast contract is a
//!   real runtime behavior rather than something the borrow checker makes
//!   unreachable.
//!
//! Notes and non-goals
//! - No persistence, no networking, no `Send`/`Sync` promises beyond what
//!   the auto-traits derive.
//! - Removal never shrinks the table; `clear` restores the construction
//!   capacity.
//! - Public surface: `ProbeHashMap`, its views and iterators, the three
//!   cursors, and `CursorError`.

mod cursor;
mod prime;
mod probe_hash_map;
mod probe_hash_map_proptest;
mod raw_table;
mod view;

// Public surface
pub use cursor::{CursorError, EntryCursor, KeyCursor, ValueCursor};
pub use probe_hash_map::{
    IntoIter, ProbeHashMap, DEFAULT_CAPACITY, DEFAULT_LOAD_FACTOR, MAX_LOAD_FACTOR,
};
pub use view::{Entries, EntriesView, Keys, KeysView, Values, ValuesView};
