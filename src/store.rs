//! Holds the single published snapshot.
//!
//! Readers take an `Arc` to whatever was last published; the writer builds a
//! complete `Snapshot` off to the side and swaps it in. The swap is the only
//! shared mutation, so a reader never sees a half-built value.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::types::Snapshot;

pub struct SnapshotStore {
    current: ArcSwap<Snapshot>,
}

impl SnapshotStore {
    /// Starts out holding the empty-leaderboard placeholder.
    pub fn new() -> Self {
        Self::with_initial(Snapshot::default())
    }

    pub fn with_initial(snapshot: Snapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(snapshot),
        }
    }

    /// Replace the visible snapshot. Readers holding the previous one keep it
    /// until they drop their `Arc`.
    pub fn publish(&self, snapshot: Snapshot) {
        self.current.store(Arc::new(snapshot));
    }

    /// The most recently published snapshot.
    pub fn current(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
