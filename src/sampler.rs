// Sampling pass: query every registered disk once and turn cumulative counters into deltas.

use crate::device_query::{DeviceQuery, DiskPerformance, TICKS_PER_MS};
use crate::registry::{DiskEntry, DiskEntryState, DiskRegistry};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, instrument};

/// What happened during one `run_one_tick`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Entries visited.
    pub entries: usize,
    /// Entries whose counters were queried and recorded.
    pub sampled: usize,
    /// Entries retired while the pass was running.
    pub skipped_retired: usize,
    pub open_failed: usize,
    pub query_failed: usize,
}

pub struct Sampler<Q> {
    registry: Arc<DiskRegistry>,
    query: Q,
    run_count: AtomicU64,
}

impl<Q: DeviceQuery> Sampler<Q> {
    pub fn new(registry: Arc<DiskRegistry>, query: Q) -> Self {
        Self {
            registry,
            query,
            run_count: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<DiskRegistry> {
        &self.registry
    }

    pub fn query(&self) -> &Q {
        &self.query
    }

    /// Completed passes since creation.
    pub fn run_count(&self) -> u64 {
        self.run_count.load(Ordering::Relaxed)
    }

    /// One pass over the registry. Per-device failures only skip that device for this pass.
    #[instrument(level = "debug", skip(self), fields(operation = "run_one_tick"))]
    pub fn run_one_tick(&self) -> TickSummary {
        let mut summary = TickSummary::default();
        self.registry.for_each_entry(|linked| {
            summary.entries += 1;
            let Some(entry) = linked.try_reference() else {
                summary.skipped_retired += 1;
                return;
            };
            self.sample_entry(&entry, &mut summary);
        });
        self.run_count.fetch_add(1, Ordering::Relaxed);
        summary
    }

    fn sample_entry(&self, entry: &DiskEntry, summary: &mut TickSummary) {
        let device = entry.identifier();
        let handle = match self.query.open(device) {
            Ok(h) => h,
            Err(e) => {
                debug!(device = %device, error = %e, operation = "open", "device open failed");
                summary.open_failed += 1;
                return;
            }
        };

        let performance = match self.query.query_performance(&handle) {
            Ok(p) => Some(p),
            Err(e) => {
                debug!(device = %device, error = %e, operation = "query_performance", "counter query failed");
                summary.query_failed += 1;
                None
            }
        };

        let display_name = if entry.display_name().is_none() {
            match self.query.query_display_name(&handle) {
                Ok(name) if !name.is_empty() => Some(name),
                Ok(_) => None,
                Err(e) => {
                    debug!(device = %device, error = %e, operation = "query_display_name", "name lookup failed");
                    None
                }
            }
        } else {
            None
        };
        drop(handle);

        let mut state = entry.lock_state();
        if state.display_name.is_none() {
            state.display_name = display_name;
        }
        if let Some(performance) = performance {
            let (bytes_read, bytes_written) = apply_performance(&mut state, &performance);
            record_sample(&mut state, bytes_read, bytes_written);
            summary.sampled += 1;
        }
    }
}

/// Updates derived metrics and baselines from a new cumulative reading.
/// Returns the raw byte deltas since the previous reading.
pub(crate) fn apply_performance(
    state: &mut DiskEntryState,
    performance: &DiskPerformance,
) -> (u64, u64) {
    let read_time = performance.read_time.saturating_sub(state.last_read_time);
    let write_time = performance.write_time.saturating_sub(state.last_write_time);
    let idle_time = performance.idle_time.saturating_sub(state.last_idle_time);
    let query_time = performance.query_time.saturating_sub(state.last_query_time);

    let bytes_read = performance.bytes_read.saturating_sub(state.last_bytes_read);
    let bytes_written = performance
        .bytes_written
        .saturating_sub(state.last_bytes_written);

    if query_time != 0 {
        state.response_time_ms = response_time_ms(read_time, write_time, query_time);
        state.active_time_percent = active_time_percent(query_time, idle_time);
    } else {
        // Window shorter than the counter resolution.
        state.response_time_ms = 0;
        state.active_time_percent = 0.0;
    }
    state.active_time_percent = clamp_active_time(state.active_time_percent);

    state.last_read_time = performance.read_time;
    state.last_write_time = performance.write_time;
    state.last_idle_time = performance.idle_time;
    state.last_query_time = performance.query_time;
    state.last_bytes_read = performance.bytes_read;
    state.last_bytes_written = performance.bytes_written;
    state.queue_depth = performance.queue_depth;
    state.split_count = performance.split_count;

    (bytes_read, bytes_written)
}

/// Appends byte deltas to history. The first sample only establishes the baseline.
pub(crate) fn record_sample(state: &mut DiskEntryState, bytes_read: u64, bytes_written: u64) {
    let (bytes_read, bytes_written) = if state.has_first_sample {
        (bytes_read, bytes_written)
    } else {
        state.has_first_sample = true;
        (0, 0)
    };
    state.read_buffer.push(bytes_read);
    state.write_buffer.push(bytes_written);
    state.bytes_read_delta = bytes_read;
    state.bytes_written_delta = bytes_written;
}

// Approximation: write time is divided by the window before being added to read time.
fn response_time_ms(read_time: u64, write_time: u64, query_time: u64) -> u64 {
    read_time.saturating_add(write_time / query_time) / TICKS_PER_MS
}

fn active_time_percent(query_time: u64, idle_time: u64) -> f32 {
    ((query_time as f64 - idle_time as f64) / query_time as f64 * 100.0) as f32
}

/// Out-of-range (and NaN) values become 0, not the nearest bound.
fn clamp_active_time(percent: f32) -> f32 {
    if (0.0..=100.0).contains(&percent) {
        percent
    } else {
        0.0
    }
}
