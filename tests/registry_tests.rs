// Registry lifecycle tests: duplicates, deferred teardown, removal racing a sampling pass

mod common;

use common::{ClockQuery, ScriptedQuery, perf};
use diskmon::{
    DeviceError, DeviceIdentifier, DeviceQuery, DiskPerformance, DiskRegistry, RegistryError,
    Sampler,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, Weak};
use std::thread;

/// Blocks inside `open` for one device until released, so a test can act mid-pass.
struct GatedQuery {
    gate: DeviceIdentifier,
    entered: mpsc::Sender<()>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl DeviceQuery for GatedQuery {
    type Handle = DeviceIdentifier;

    fn open(&self, device: DeviceIdentifier) -> Result<DeviceIdentifier, DeviceError> {
        if device == self.gate {
            let _ = self.entered.send(());
            let _ = self.release.lock().unwrap().recv();
        }
        Ok(device)
    }

    fn query_performance(&self, _handle: &DeviceIdentifier) -> Result<DiskPerformance, DeviceError> {
        Ok(DiskPerformance::default())
    }

    fn query_display_name(&self, handle: &DeviceIdentifier) -> Result<String, DeviceError> {
        Ok(handle.to_string())
    }
}

fn gated(gate: DeviceIdentifier) -> (GatedQuery, mpsc::Receiver<()>, mpsc::Sender<()>) {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let query = GatedQuery {
        gate,
        entered: entered_tx,
        release: Mutex::new(release_rx),
    };
    (query, entered_rx, release_tx)
}

#[test]
fn create_and_find_entries() {
    let registry = DiskRegistry::new(16);
    assert!(registry.is_empty());
    let a = registry.create_entry(DeviceIdentifier::new(0)).unwrap();
    registry.create_entry(DeviceIdentifier::new(1)).unwrap();
    assert_eq!(registry.len(), 2);
    assert_eq!(a.buffer_capacity(), 16);

    let found = registry.find(DeviceIdentifier::new(0)).unwrap();
    assert!(Arc::ptr_eq(&found, &a));
    assert!(registry.find(DeviceIdentifier::new(2)).is_none());
}

#[test]
fn duplicate_identifier_is_rejected() {
    let registry = DiskRegistry::new(4);
    let id = DeviceIdentifier::new(3);
    registry.create_entry(id).unwrap();
    let err = registry.create_entry(DeviceIdentifier::new(3)).unwrap_err();
    assert_eq!(err, RegistryError::DuplicateDevice(id));
    assert_eq!(registry.len(), 1);
}

#[test]
fn removing_twice_reports_not_registered() {
    let registry = DiskRegistry::new(4);
    let id = DeviceIdentifier::new(1);
    let entry = registry.create_entry(id).unwrap();
    registry.remove_entry(&entry).unwrap();
    assert_eq!(
        registry.remove_entry(&entry),
        Err(RegistryError::NotRegistered(id))
    );
    assert!(entry.is_retired());
}

#[test]
fn identifier_can_be_registered_again_after_removal() {
    let registry = DiskRegistry::new(4);
    let id = DeviceIdentifier::new(1);
    let first = registry.create_entry(id).unwrap();
    registry.remove_entry(&first).unwrap();
    let second = registry.create_entry(id).unwrap();
    assert!(!second.is_retired());
    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn removed_entry_lives_until_last_holder_drops() {
    let registry = Arc::new(DiskRegistry::new(4));
    let sampler = Sampler::new(registry.clone(), ScriptedQuery::new());
    let id = DeviceIdentifier::new(2);
    let entry = registry.create_entry(id).unwrap();
    sampler.query().push_sample(id, perf(10, 10, 10, 0));
    sampler.run_one_tick();
    let weak = Arc::downgrade(&entry);

    registry.remove_entry(&entry).unwrap();
    assert!(weak.upgrade().is_some());
    assert!(entry.try_reference().is_none());
    // A retired entry still answers reads.
    assert!(entry.has_first_sample());

    let summary = sampler.run_one_tick();
    assert_eq!(summary.entries, 0);

    drop(entry);
    assert!(weak.upgrade().is_none());
}

#[test]
fn entry_retired_mid_pass_is_skipped() {
    let registry = Arc::new(DiskRegistry::new(4));
    let gate = DeviceIdentifier::new(1);
    let _first = registry.create_entry(gate).unwrap();
    let victim = registry.create_entry(DeviceIdentifier::new(2)).unwrap();
    let (query, entered_rx, release_tx) = gated(gate);
    let sampler = Sampler::new(registry.clone(), query);

    thread::scope(|s| {
        let tick = s.spawn(|| sampler.run_one_tick());
        entered_rx.recv().unwrap();

        let remover = s.spawn(|| registry.remove_entry(&victim));
        while !victim.is_retired() {
            thread::yield_now();
        }
        release_tx.send(()).unwrap();

        let summary = tick.join().unwrap();
        assert_eq!(summary.entries, 2);
        assert_eq!(summary.sampled, 1);
        assert_eq!(summary.skipped_retired, 1);
        remover.join().unwrap().unwrap();
    });
    assert_eq!(registry.len(), 1);
    assert!(!victim.has_first_sample());
}

#[test]
fn unlink_waits_for_running_pass() {
    let registry = Arc::new(DiskRegistry::new(4));
    let id = DeviceIdentifier::new(7);
    let entry = registry.create_entry(id).unwrap();
    let weak: Weak<_> = Arc::downgrade(&entry);
    let (query, entered_rx, release_tx) = gated(id);
    let sampler = Sampler::new(registry.clone(), query);
    let registry_ref = &registry;

    thread::scope(|s| {
        let tick = s.spawn(|| sampler.run_one_tick());
        entered_rx.recv().unwrap();

        // The owner removes and drops its handle while the pass is still inside `open`.
        let remover = s.spawn(move || {
            let result = registry_ref.remove_entry(&entry);
            drop(entry);
            result
        });
        while !weak.upgrade().is_some_and(|e| e.is_retired()) {
            thread::yield_now();
        }
        // Retired but still linked: unlinking needs the write lock the pass holds shared.
        thread::sleep(std::time::Duration::from_millis(20));
        assert!(!remover.is_finished());
        release_tx.send(()).unwrap();

        let summary = tick.join().unwrap();
        assert_eq!(summary.sampled, 1);
        remover.join().unwrap().unwrap();
    });

    assert!(registry.is_empty());
    assert!(weak.upgrade().is_none());
}

#[test]
fn concurrent_create_remove_and_sampling_stress() {
    let registry = Arc::new(DiskRegistry::new(8));
    let sampler = Sampler::new(registry.clone(), ClockQuery::default());
    let stable: Vec<_> = (0..4)
        .map(|n| registry.create_entry(DeviceIdentifier::new(n)).unwrap())
        .collect();
    let stop = AtomicBool::new(false);

    let churned: Vec<Weak<_>> = thread::scope(|s| {
        s.spawn(|| {
            while !stop.load(Ordering::Relaxed) {
                let summary = sampler.run_one_tick();
                assert_eq!(
                    summary.entries,
                    summary.sampled
                        + summary.skipped_retired
                        + summary.open_failed
                        + summary.query_failed
                );
            }
        });
        s.spawn(|| {
            while !stop.load(Ordering::Relaxed) {
                for snapshot in registry.snapshots(true) {
                    assert!((0.0..=100.0).contains(&snapshot.active_time_percent));
                    assert!(snapshot.read_history.map_or(0, |h| h.len()) <= 8);
                }
            }
        });

        let churners: Vec<_> = (1..=3u32)
            .map(|t| {
                let registry = &registry;
                s.spawn(move || {
                    let mut weaks = Vec::new();
                    for i in 0..400u32 {
                        let entry = registry
                            .create_entry(DeviceIdentifier::new(t * 1_000 + i))
                            .unwrap();
                        weaks.push(Arc::downgrade(&entry));
                        if i % 3 == 0 {
                            thread::yield_now();
                        }
                        registry.remove_entry(&entry).unwrap();
                    }
                    weaks
                })
            })
            .collect();

        let weaks = churners
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        stop.store(true, Ordering::Relaxed);
        weaks
    });

    sampler.run_one_tick();
    assert_eq!(registry.len(), stable.len());
    assert_eq!(churned.len(), 1_200);
    assert!(churned.iter().all(|w| w.upgrade().is_none()));
    for entry in &stable {
        assert!(entry.has_first_sample());
        assert!((0.0..=100.0).contains(&entry.active_time_percent()));
    }
}
