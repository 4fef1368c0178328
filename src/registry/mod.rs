// Registry of monitored disks behind a reader/writer lock.
// Sampling passes iterate under the shared lock; create/remove take the exclusive lock.

mod entry;

pub use entry::DiskEntry;
pub(crate) use entry::DiskEntryState;

use crate::identifier::DeviceIdentifier;
use crate::models::DiskSnapshot;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Caller contract violations on the registry.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    #[error("device {0} is already registered")]
    DuplicateDevice(DeviceIdentifier),

    #[error("device {0} is not registered")]
    NotRegistered(DeviceIdentifier),
}

/// All monitored disks in insertion order. Construct once and share via `Arc`.
#[derive(Debug)]
pub struct DiskRegistry {
    entries: RwLock<Vec<Arc<DiskEntry>>>,
    sample_count: AtomicUsize,
}

impl DiskRegistry {
    pub fn new(sample_count: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            sample_count: AtomicUsize::new(sample_count),
        }
    }

    /// Buffer capacity given to entries created from now on.
    pub fn sample_count(&self) -> usize {
        self.sample_count.load(Ordering::Relaxed)
    }

    /// Existing entries keep the capacity they were created with.
    pub fn set_sample_count(&self, sample_count: usize) {
        self.sample_count.store(sample_count, Ordering::Relaxed);
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<DiskEntry>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<DiskEntry>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates and links an entry for `identifier`. The returned handle shares ownership with
    /// the registry.
    pub fn create_entry(
        &self,
        identifier: DeviceIdentifier,
    ) -> Result<Arc<DiskEntry>, RegistryError> {
        let entry = Arc::new(DiskEntry::new(identifier, self.sample_count()));
        let mut entries = self.write();
        if entries.iter().any(|e| e.identifier() == identifier) {
            return Err(RegistryError::DuplicateDevice(identifier));
        }
        entries.push(Arc::clone(&entry));
        drop(entries);
        tracing::debug!(device = %identifier, operation = "create_entry", "disk entry created");
        Ok(entry)
    }

    /// Retires and unlinks `entry`. Sampling passes that already hold a reference keep a valid
    /// entry; its resources are freed when the last reference drops.
    pub fn remove_entry(&self, entry: &Arc<DiskEntry>) -> Result<(), RegistryError> {
        entry.retire();
        let mut entries = self.write();
        let Some(pos) = entries.iter().position(|e| Arc::ptr_eq(e, entry)) else {
            return Err(RegistryError::NotRegistered(entry.identifier()));
        };
        let unlinked = entries.remove(pos);
        drop(entries);
        tracing::debug!(
            device = %unlinked.identifier(),
            operation = "remove_entry",
            "disk entry unlinked"
        );
        Ok(())
    }

    /// Visits every linked entry under the shared lock, in insertion order.
    /// The visitor must not call back into create/remove on this registry.
    pub fn for_each_entry<F>(&self, mut visitor: F)
    where
        F: FnMut(&Arc<DiskEntry>),
    {
        let entries = self.read();
        for entry in entries.iter() {
            visitor(entry);
        }
    }

    pub fn find(&self, identifier: DeviceIdentifier) -> Option<Arc<DiskEntry>> {
        self.read()
            .iter()
            .find(|e| e.identifier() == identifier)
            .cloned()
    }

    pub fn identifiers(&self) -> Vec<DeviceIdentifier> {
        self.read().iter().map(|e| e.identifier()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn snapshots(&self, with_history: bool) -> Vec<DiskSnapshot> {
        self.read()
            .iter()
            .map(|e| e.snapshot(with_history))
            .collect()
    }
}
