// Shared test helpers: scripted device backends

#![allow(dead_code)]

use diskmon::{DeviceDiscovery, DeviceError, DeviceIdentifier, DeviceQuery, DiskPerformance};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn perf(bytes_read: u64, bytes_written: u64, query_time: u64, idle_time: u64) -> DiskPerformance {
    DiskPerformance {
        bytes_read,
        bytes_written,
        query_time,
        idle_time,
        ..Default::default()
    }
}

/// Per-device queue of query results. `None` in the queue is a failed query.
#[derive(Default)]
pub struct ScriptedQuery {
    samples: Mutex<HashMap<DeviceIdentifier, VecDeque<Option<DiskPerformance>>>>,
    unavailable: Mutex<HashSet<DeviceIdentifier>>,
    names: Mutex<HashMap<DeviceIdentifier, String>>,
    attached: Mutex<Vec<DeviceIdentifier>>,
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
    name_queries: AtomicUsize,
}

pub struct ScriptedHandle {
    device: DeviceIdentifier,
    closed: Arc<AtomicUsize>,
}

impl Drop for ScriptedHandle {
    fn drop(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

impl ScriptedQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_sample(&self, device: DeviceIdentifier, sample: DiskPerformance) {
        self.samples
            .lock()
            .unwrap()
            .entry(device)
            .or_default()
            .push_back(Some(sample));
    }

    pub fn push_failure(&self, device: DeviceIdentifier) {
        self.samples
            .lock()
            .unwrap()
            .entry(device)
            .or_default()
            .push_back(None);
    }

    pub fn set_unavailable(&self, device: DeviceIdentifier, unavailable: bool) {
        let mut set = self.unavailable.lock().unwrap();
        if unavailable {
            set.insert(device);
        } else {
            set.remove(&device);
        }
    }

    pub fn set_name(&self, device: DeviceIdentifier, name: &str) {
        self.names.lock().unwrap().insert(device, name.to_string());
    }

    pub fn set_attached(&self, devices: &[DeviceIdentifier]) {
        *self.attached.lock().unwrap() = devices.to_vec();
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn name_queries(&self) -> usize {
        self.name_queries.load(Ordering::SeqCst)
    }
}

impl DeviceQuery for ScriptedQuery {
    type Handle = ScriptedHandle;

    fn open(&self, device: DeviceIdentifier) -> Result<ScriptedHandle, DeviceError> {
        if self.unavailable.lock().unwrap().contains(&device) {
            return Err(DeviceError::NotFound(device));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedHandle {
            device,
            closed: self.closed.clone(),
        })
    }

    fn query_performance(&self, handle: &ScriptedHandle) -> Result<DiskPerformance, DeviceError> {
        let next = self
            .samples
            .lock()
            .unwrap()
            .get_mut(&handle.device)
            .and_then(|q| q.pop_front());
        match next {
            Some(Some(sample)) => Ok(sample),
            Some(None) => Err(DeviceError::Query("scripted failure".into())),
            None => Err(DeviceError::Query("no scripted sample".into())),
        }
    }

    fn query_display_name(&self, handle: &ScriptedHandle) -> Result<String, DeviceError> {
        self.name_queries.fetch_add(1, Ordering::SeqCst);
        self.names
            .lock()
            .unwrap()
            .get(&handle.device)
            .cloned()
            .ok_or_else(|| DeviceError::Query("no name".into()))
    }
}

impl DeviceDiscovery for ScriptedQuery {
    fn enumerate(&self) -> Result<Vec<DeviceIdentifier>, DeviceError> {
        Ok(self.attached.lock().unwrap().clone())
    }
}

/// Every query succeeds with counters that keep growing; idle is a quarter of the window.
#[derive(Default)]
pub struct ClockQuery {
    clock: AtomicU64,
}

impl DeviceQuery for ClockQuery {
    type Handle = DeviceIdentifier;

    fn open(&self, device: DeviceIdentifier) -> Result<DeviceIdentifier, DeviceError> {
        Ok(device)
    }

    fn query_performance(&self, _handle: &DeviceIdentifier) -> Result<DiskPerformance, DeviceError> {
        let t = self.clock.fetch_add(4_000, Ordering::SeqCst) + 4_000;
        Ok(DiskPerformance {
            read_time: t / 2,
            write_time: t / 3,
            idle_time: t / 4,
            query_time: t,
            bytes_read: t * 8,
            bytes_written: t * 4,
            queue_depth: 1,
            split_count: 0,
        })
    }

    fn query_display_name(&self, handle: &DeviceIdentifier) -> Result<String, DeviceError> {
        Ok(handle.to_string())
    }
}
