// One monitored disk: identity, liveness flag, and the sample state the sampler updates.

use crate::circular_buffer::CircularBuffer;
use crate::identifier::DeviceIdentifier;
use crate::models::DiskSnapshot;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared via `Arc`: the registry holds one reference while the entry is linked, callers and
/// sampling passes hold others. Owned resources are released when the last reference drops.
#[derive(Debug)]
pub struct DiskEntry {
    identifier: DeviceIdentifier,
    retired: AtomicBool,
    state: Mutex<DiskEntryState>,
}

/// Mutable sample state. Counter fields hold the raw cumulative values from the previous sample.
#[derive(Debug)]
pub(crate) struct DiskEntryState {
    pub(crate) display_name: Option<String>,
    pub(crate) read_buffer: CircularBuffer<u64>,
    pub(crate) write_buffer: CircularBuffer<u64>,

    pub(crate) last_read_time: u64,
    pub(crate) last_write_time: u64,
    pub(crate) last_idle_time: u64,
    pub(crate) last_query_time: u64,
    pub(crate) last_bytes_read: u64,
    pub(crate) last_bytes_written: u64,

    pub(crate) bytes_read_delta: u64,
    pub(crate) bytes_written_delta: u64,
    pub(crate) response_time_ms: u64,
    pub(crate) active_time_percent: f32,
    pub(crate) queue_depth: u32,
    pub(crate) split_count: u32,

    pub(crate) has_first_sample: bool,
}

impl DiskEntryState {
    pub(crate) fn new(sample_count: usize) -> Self {
        Self {
            display_name: None,
            read_buffer: CircularBuffer::new(sample_count),
            write_buffer: CircularBuffer::new(sample_count),
            last_read_time: 0,
            last_write_time: 0,
            last_idle_time: 0,
            last_query_time: 0,
            last_bytes_read: 0,
            last_bytes_written: 0,
            bytes_read_delta: 0,
            bytes_written_delta: 0,
            response_time_ms: 0,
            active_time_percent: 0.0,
            queue_depth: 0,
            split_count: 0,
            has_first_sample: false,
        }
    }
}

impl DiskEntry {
    pub(crate) fn new(identifier: DeviceIdentifier, sample_count: usize) -> Self {
        Self {
            identifier,
            retired: AtomicBool::new(false),
            state: Mutex::new(DiskEntryState::new(sample_count)),
        }
    }

    pub fn identifier(&self) -> DeviceIdentifier {
        self.identifier
    }

    /// Takes a new reference unless the entry has been retired.
    pub fn try_reference(self: &Arc<Self>) -> Option<Arc<Self>> {
        if self.is_retired() {
            return None;
        }
        Some(Arc::clone(self))
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    // A panic mid-update leaves plain counters behind; keep serving them.
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, DiskEntryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn display_name(&self) -> Option<String> {
        self.lock_state().display_name.clone()
    }

    pub fn has_first_sample(&self) -> bool {
        self.lock_state().has_first_sample
    }

    pub fn bytes_read_delta(&self) -> u64 {
        self.lock_state().bytes_read_delta
    }

    pub fn bytes_written_delta(&self) -> u64 {
        self.lock_state().bytes_written_delta
    }

    pub fn response_time_ms(&self) -> u64 {
        self.lock_state().response_time_ms
    }

    pub fn active_time_percent(&self) -> f32 {
        self.lock_state().active_time_percent
    }

    pub fn queue_depth(&self) -> u32 {
        self.lock_state().queue_depth
    }

    pub fn split_count(&self) -> u32 {
        self.lock_state().split_count
    }

    pub fn buffer_capacity(&self) -> usize {
        self.lock_state().read_buffer.capacity()
    }

    /// Read-throughput history, oldest first.
    pub fn read_history(&self) -> Vec<u64> {
        self.lock_state().read_buffer.to_vec()
    }

    /// Write-throughput history, oldest first.
    pub fn write_history(&self) -> Vec<u64> {
        self.lock_state().write_buffer.to_vec()
    }

    /// Consistent view of all metrics taken under one lock.
    pub fn snapshot(&self, with_history: bool) -> DiskSnapshot {
        let state = self.lock_state();
        DiskSnapshot {
            device_number: self.identifier.device_number(),
            display_name: state.display_name.clone(),
            bytes_read_delta: state.bytes_read_delta,
            bytes_written_delta: state.bytes_written_delta,
            response_time_ms: state.response_time_ms,
            active_time_percent: state.active_time_percent,
            queue_depth: state.queue_depth,
            split_count: state.split_count,
            has_first_sample: state.has_first_sample,
            read_history: with_history.then(|| state.read_buffer.to_vec()),
            write_history: with_history.then(|| state.write_buffer.to_vec()),
        }
    }
}

impl Drop for DiskEntry {
    fn drop(&mut self) {
        tracing::debug!(
            device = %self.identifier,
            operation = "release_entry",
            "disk entry released"
        );
    }
}
