// Background collector: drives one sampling pass per interval and publishes the results.
// Disk rescans (hot-plug) and stats logging run on their own intervals in the same loop.

use crate::device_query::{DeviceDiscovery, DeviceQuery};
use crate::identifier::DeviceIdentifier;
use crate::models::DiskSnapshot;
use crate::registry::{DiskRegistry, RegistryError};
use crate::sampler::{Sampler, TickSummary};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tokio::time::{Duration, Instant, interval};
use tracing::Instrument;

/// Rate limit for "no receivers" message (avoid logging every tick when no one is on /ws/disks)
const NO_RECEIVERS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Sampler, channels, and shutdown for the worker.
pub struct WorkerDeps<Q> {
    pub sampler: Arc<Sampler<Q>>,
    pub tx: broadcast::Sender<Vec<DiskSnapshot>>,
    pub ws_disk_connections: Arc<AtomicUsize>,
    pub shutdown_rx: tokio::sync::oneshot::Receiver<()>,
}

/// Worker timing. Stats logging and rescans use real-time intervals, independent of sampling.
pub struct WorkerConfig {
    pub sample_interval_ms: u64,
    pub stats_log_interval_secs: u64,
    pub rescan_interval_secs: u64,
}

/// Registry changes made by one rescan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub added: usize,
    pub removed: usize,
}

/// Brings the registry in line with the attached disks: new ones are created, vanished ones
/// removed. Removal still waits for in-flight sampling references before teardown.
pub fn sync_devices(registry: &DiskRegistry, discovered: &[DeviceIdentifier]) -> SyncSummary {
    let discovered_set: HashSet<DeviceIdentifier> = discovered.iter().copied().collect();
    let current: HashSet<DeviceIdentifier> = registry.identifiers().into_iter().collect();
    let mut summary = SyncSummary::default();

    for id in discovered.iter().filter(|id| !current.contains(id)) {
        match registry.create_entry(*id) {
            Ok(_) => summary.added += 1,
            // A concurrent caller registered it first.
            Err(RegistryError::DuplicateDevice(_)) => {}
            Err(e) => tracing::warn!(device = %id, error = %e, "create_entry failed"),
        }
    }

    for id in current.iter().filter(|id| !discovered_set.contains(id)) {
        let Some(entry) = registry.find(*id) else {
            continue;
        };
        match registry.remove_entry(&entry) {
            Ok(()) => summary.removed += 1,
            Err(e) => tracing::debug!(device = %id, error = %e, "remove_entry skipped"),
        }
    }

    if summary.added > 0 || summary.removed > 0 {
        tracing::info!(
            added = summary.added,
            removed = summary.removed,
            devices = registry.len(),
            "disk set changed"
        );
    }
    summary
}

/// Enumerates attached disks and syncs the registry. Enumeration failure leaves the registry as is.
pub fn rescan<D: DeviceDiscovery + ?Sized>(discovery: &D, registry: &DiskRegistry) -> SyncSummary {
    match discovery.enumerate() {
        Ok(discovered) => sync_devices(registry, &discovered),
        Err(e) => {
            tracing::warn!(error = %e, operation = "enumerate", "disk enumeration failed");
            SyncSummary::default()
        }
    }
}

pub fn spawn<Q>(deps: WorkerDeps<Q>, config: WorkerConfig) -> tokio::task::JoinHandle<()>
where
    Q: DeviceQuery + DeviceDiscovery + 'static,
{
    let WorkerDeps {
        sampler,
        tx,
        ws_disk_connections,
        mut shutdown_rx,
    } = deps;
    let WorkerConfig {
        sample_interval_ms,
        stats_log_interval_secs,
        rescan_interval_secs,
    } = config;

    let worker_span = tracing::span!(tracing::Level::DEBUG, "worker", sample_interval_ms);

    let task = async move {
        let mut tick = interval(Duration::from_millis(sample_interval_ms));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut stats_log_tick = interval(Duration::from_secs(stats_log_interval_secs));
        stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut rescan_tick = interval(Duration::from_secs(rescan_interval_secs));
        rescan_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // Startup sync happens before spawn; skip the immediate first rescan.
        rescan_tick.reset();

        let mut last_no_receivers_log: Option<Instant> = None;
        let mut last_summary = TickSummary::default();

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let s = sampler.clone();
                    let summary = match tokio::task::spawn_blocking(move || s.run_one_tick()).await {
                        Ok(summary) => summary,
                        Err(e) => {
                            tracing::warn!(error = %e, operation = "run_one_tick", "sampling task failed");
                            continue;
                        }
                    };
                    last_summary = summary;

                    let snapshots = sampler.registry().snapshots(false);
                    if tx.send(snapshots).is_err() {
                        let should_log = last_no_receivers_log
                            .is_none_or(|t| t.elapsed() >= NO_RECEIVERS_LOG_INTERVAL);
                        if should_log {
                            tracing::debug!(
                                operation = "broadcast_snapshots",
                                "No active WebSocket clients; broadcast channel has no receivers"
                            );
                            last_no_receivers_log = Some(Instant::now());
                        }
                    }
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("Worker shutting down");
                    break;
                }
                _ = stats_log_tick.tick() => {
                    tracing::info!(
                        devices = sampler.registry().len(),
                        ticks_total = sampler.run_count(),
                        last_sampled = last_summary.sampled,
                        last_open_failed = last_summary.open_failed,
                        last_query_failed = last_summary.query_failed,
                        ws_disk_clients = ws_disk_connections.load(Ordering::Relaxed),
                        "collector stats"
                    );
                }
                _ = rescan_tick.tick() => {
                    let s = sampler.clone();
                    let result = tokio::task::spawn_blocking(move || {
                        rescan(s.query(), s.registry())
                    })
                    .await;
                    if let Err(e) = result {
                        tracing::warn!(error = %e, operation = "rescan", "rescan task failed");
                    }
                }
            }
        }
    };
    tokio::spawn(task.instrument(worker_span))
}
