//! Single-writer / multi-reader snapshot slot.
//!
//! The camera callback and the control loop run on independent cadences and
//! only share "the most recent estimate". The writer swaps in a whole new
//! `Arc<T>`; readers clone the `Arc` they find, so a reader never observes a
//! half-written value and never blocks the writer for longer than a pointer copy.

use parking_lot::RwLock;
use std::sync::Arc;

/// Create a slot seeded with `initial` and return its only writer plus a reader.
pub fn snapshot_slot<T>(initial: T) -> (SnapshotWriter<T>, SnapshotReader<T>) {
    let slot = Arc::new(RwLock::new(Arc::new(initial)));
    (
        SnapshotWriter {
            slot: Arc::clone(&slot),
        },
        SnapshotReader { slot },
    )
}

/// Publishing side. Not `Clone`: there is exactly one writer per slot.
#[derive(Debug)]
pub struct SnapshotWriter<T> {
    slot: Arc<RwLock<Arc<T>>>,
}

impl<T> SnapshotWriter<T> {
    /// Replace the published value.
    pub fn publish(&self, value: T) {
        let next = Arc::new(value);
        *self.slot.write() = next;
    }

    /// Value most recently published by this writer.
    pub fn current(&self) -> Arc<T> {
        Arc::clone(&self.slot.read())
    }

    /// A new reader handle onto this slot.
    pub fn reader(&self) -> SnapshotReader<T> {
        SnapshotReader {
            slot: Arc::clone(&self.slot),
        }
    }
}

/// Consuming side. Cheap to clone and safe to move to other threads.
#[derive(Debug)]
pub struct SnapshotReader<T> {
    slot: Arc<RwLock<Arc<T>>>,
}

impl<T> Clone for SnapshotReader<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> SnapshotReader<T> {
    /// Latest fully-formed snapshot.
    pub fn load(&self) -> Arc<T> {
        Arc::clone(&self.slot.read())
    }
}

impl<T: Copy> SnapshotReader<T> {
    /// Copy of the latest snapshot.
    pub fn get(&self) -> T {
        **self.slot.read()
    }
}
