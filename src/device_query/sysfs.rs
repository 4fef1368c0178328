// Linux backend: /sys/dev/block/<major>:<minor>/stat and /proc/uptime.

use super::{DeviceDiscovery, DeviceError, DeviceQuery, DiskPerformance, TICKS_PER_MS};
use crate::identifier::DeviceIdentifier;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::instrument;

const SECTOR_SIZE: u64 = 512;
const TICKS_PER_SEC: f64 = 10_000_000.0;
const STAT_FIELDS: usize = 11;

/// Reads block device counters from sysfs. Roots are configurable so tests can point at a fake tree.
#[derive(Debug, Clone)]
pub struct SysfsDeviceQuery {
    sysfs_root: PathBuf,
    procfs_root: PathBuf,
}

/// Open `stat` file plus the device's sysfs directory.
#[derive(Debug)]
pub struct SysfsHandle {
    dir: PathBuf,
    stat: File,
}

impl SysfsDeviceQuery {
    pub fn with_roots(sysfs_root: impl Into<PathBuf>, procfs_root: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
            procfs_root: procfs_root.into(),
        }
    }

    fn device_dir(&self, device: DeviceIdentifier) -> PathBuf {
        self.sysfs_root
            .join("dev/block")
            .join(format!("{}:{}", device.major(), device.minor()))
    }

    fn query_clock(&self) -> Result<u64, DeviceError> {
        let path = self.procfs_root.join("uptime");
        let content = std::fs::read_to_string(&path)?;
        parse_uptime_ticks(&content).ok_or_else(|| DeviceError::Parse {
            file: path.display().to_string(),
            reason: "expected uptime seconds".into(),
        })
    }
}

impl DeviceQuery for SysfsDeviceQuery {
    type Handle = SysfsHandle;

    fn open(&self, device: DeviceIdentifier) -> Result<SysfsHandle, DeviceError> {
        let dir = self.device_dir(device);
        if !dir.exists() {
            return Err(DeviceError::NotFound(device));
        }
        let stat =
            File::open(dir.join("stat")).map_err(|source| DeviceError::Open { device, source })?;
        Ok(SysfsHandle { dir, stat })
    }

    fn query_performance(&self, handle: &SysfsHandle) -> Result<DiskPerformance, DeviceError> {
        let mut content = String::new();
        (&handle.stat).read_to_string(&mut content)?;
        let query_time = self.query_clock()?;
        parse_stat(&content, query_time).map_err(|reason| DeviceError::Parse {
            file: handle.dir.join("stat").display().to_string(),
            reason,
        })
    }

    fn query_display_name(&self, handle: &SysfsHandle) -> Result<String, DeviceError> {
        if let Some(model) = read_trimmed(&handle.dir.join("device/model")) {
            return Ok(model);
        }
        if let Ok(uevent) = std::fs::read_to_string(handle.dir.join("uevent"))
            && let Some(name) = uevent
                .lines()
                .find_map(|line| line.strip_prefix("DEVNAME="))
                .map(str::trim)
                .filter(|s| !s.is_empty())
        {
            return Ok(name.to_string());
        }
        let resolved = handle.dir.canonicalize()?;
        resolved
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| DeviceError::Query("device directory has no name".into()))
    }
}

impl DeviceDiscovery for SysfsDeviceQuery {
    #[instrument(skip(self), fields(backend = "sysfs", operation = "enumerate"))]
    fn enumerate(&self) -> Result<Vec<DeviceIdentifier>, DeviceError> {
        let mut devices = Vec::new();
        for dirent in std::fs::read_dir(self.sysfs_root.join("block"))? {
            let dirent = dirent?;
            let name = dirent.file_name().to_string_lossy().into_owned();
            if name.starts_with("loop") || name.starts_with("ram") || name.starts_with("zram") {
                continue;
            }
            let Some(dev) = read_trimmed(&dirent.path().join("dev")) else {
                continue;
            };
            match parse_major_minor(&dev) {
                Some((major, minor)) => devices.push(DeviceIdentifier::from_dev(major, minor)),
                None => tracing::debug!(device = %name, dev = %dev, "unparseable dev number"),
            }
        }
        devices.sort();
        Ok(devices)
    }
}

/// Parse a block device `stat` line into cumulative counters.
///
/// Fields: read_ios read_merges read_sectors read_ticks write_ios write_merges write_sectors
/// write_ticks in_flight io_ticks time_in_queue [discard/flush fields...]. Tick fields are ms.
/// Idle time is derived as `query_time - io_ticks`.
pub fn parse_stat(content: &str, query_time: u64) -> Result<DiskPerformance, String> {
    let fields = content
        .split_whitespace()
        .map(|f| f.parse::<u64>().map_err(|e| format!("field {:?}: {}", f, e)))
        .collect::<Result<Vec<u64>, String>>()?;
    if fields.len() < STAT_FIELDS {
        return Err(format!(
            "expected at least {} fields, got {}",
            STAT_FIELDS,
            fields.len()
        ));
    }
    let io_time = fields[9].saturating_mul(TICKS_PER_MS);
    Ok(DiskPerformance {
        read_time: fields[3].saturating_mul(TICKS_PER_MS),
        write_time: fields[7].saturating_mul(TICKS_PER_MS),
        idle_time: query_time.saturating_sub(io_time),
        query_time,
        bytes_read: fields[2].saturating_mul(SECTOR_SIZE),
        bytes_written: fields[6].saturating_mul(SECTOR_SIZE),
        queue_depth: u32::try_from(fields[8]).unwrap_or(u32::MAX),
        // No split I/O counter on Linux.
        split_count: 0,
    })
}

/// First field of /proc/uptime, in 100 ns ticks.
pub fn parse_uptime_ticks(content: &str) -> Option<u64> {
    let secs: f64 = content.split_whitespace().next()?.parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some((secs * TICKS_PER_SEC) as u64)
}

fn parse_major_minor(dev: &str) -> Option<(u32, u32)> {
    let (major, minor) = dev.split_once(':')?;
    Some((major.trim().parse().ok()?, minor.trim().parse().ok()?))
}

fn read_trimmed(path: &Path) -> Option<String> {
    let v = std::fs::read_to_string(path).ok()?;
    let v = v.trim();
    if v.is_empty() {
        return None;
    }
    Some(v.to_string())
}
