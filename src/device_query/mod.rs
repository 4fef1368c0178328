// OS query primitives the sampler depends on. Backends live in submodules.

mod sysfs;

pub use sysfs::{SysfsDeviceQuery, SysfsHandle, parse_stat, parse_uptime_ticks};

use crate::identifier::DeviceIdentifier;
use thiserror::Error;

/// Counter time unit is 100 ns.
pub const TICKS_PER_MS: u64 = 10_000;

/// Errors from opening or querying a device.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("device {0} not found")]
    NotFound(DeviceIdentifier),

    #[error("failed to open device {device}: {source}")]
    Open {
        device: DeviceIdentifier,
        #[source]
        source: std::io::Error,
    },

    #[error("performance query failed: {0}")]
    Query(String),

    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse {file}: {reason}")]
    Parse { file: String, reason: String },
}

/// Cumulative counters as reported by the device. Times are in 100 ns ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskPerformance {
    pub read_time: u64,
    pub write_time: u64,
    pub idle_time: u64,
    pub query_time: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub queue_depth: u32,
    pub split_count: u32,
}

/// Transient per-device access. A handle is closed by dropping it.
pub trait DeviceQuery: Send + Sync {
    type Handle: Send;

    fn open(&self, device: DeviceIdentifier) -> Result<Self::Handle, DeviceError>;

    fn query_performance(&self, handle: &Self::Handle) -> Result<DiskPerformance, DeviceError>;

    fn query_display_name(&self, handle: &Self::Handle) -> Result<String, DeviceError>;
}

/// Lists the disks currently attached.
pub trait DeviceDiscovery: Send + Sync {
    fn enumerate(&self) -> Result<Vec<DeviceIdentifier>, DeviceError>;
}
