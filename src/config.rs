use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub devices: DevicesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingConfig {
    pub sample_interval_ms: u64,
    /// Rolling history length per disk (read and write buffers). Read when a disk is registered.
    pub sample_count: usize,
    /// How often to log collector stats at INFO level.
    pub stats_log_interval_secs: u64,
    /// Max number of per-tick snapshot batches kept for /ws/disks (slow clients may lag).
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_broadcast_capacity() -> usize {
    16
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevicesConfig {
    /// How often to re-enumerate attached disks (hot-plug).
    #[serde(default = "default_rescan_interval_secs")]
    pub rescan_interval_secs: u64,
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: String,
    #[serde(default = "default_procfs_root")]
    pub procfs_root: String,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            rescan_interval_secs: default_rescan_interval_secs(),
            sysfs_root: default_sysfs_root(),
            procfs_root: default_procfs_root(),
        }
    }
}

fn default_rescan_interval_secs() -> u64 {
    10
}

fn default_sysfs_root() -> String {
    "/sys".into()
}

fn default_procfs_root() -> String {
    "/proc".into()
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            self.sampling.sample_interval_ms > 0,
            "sampling.sample_interval_ms must be > 0, got {}",
            self.sampling.sample_interval_ms
        );
        anyhow::ensure!(
            self.sampling.sample_count > 0,
            "sampling.sample_count must be > 0, got {}",
            self.sampling.sample_count
        );
        anyhow::ensure!(
            self.sampling.stats_log_interval_secs > 0,
            "sampling.stats_log_interval_secs must be > 0, got {}",
            self.sampling.stats_log_interval_secs
        );
        anyhow::ensure!(
            self.sampling.broadcast_capacity > 0,
            "sampling.broadcast_capacity must be > 0, got {}",
            self.sampling.broadcast_capacity
        );
        anyhow::ensure!(
            self.devices.rescan_interval_secs > 0,
            "devices.rescan_interval_secs must be > 0, got {}",
            self.devices.rescan_interval_secs
        );
        anyhow::ensure!(
            !self.devices.sysfs_root.is_empty(),
            "devices.sysfs_root must be non-empty"
        );
        anyhow::ensure!(
            !self.devices.procfs_root.is_empty(),
            "devices.procfs_root must be non-empty"
        );
        Ok(())
    }
}
