// Disk I/O telemetry collector: registry, sampling engine, device backends, and reporting.

pub mod circular_buffer;
pub mod config;
pub mod device_query;
pub mod identifier;
pub mod models;
pub mod registry;
pub mod routes;
pub mod sampler;
pub mod worker;

pub use circular_buffer::CircularBuffer;
pub use device_query::{DeviceDiscovery, DeviceError, DeviceQuery, DiskPerformance};
pub use identifier::DeviceIdentifier;
pub use registry::{DiskEntry, DiskRegistry, RegistryError};
pub use sampler::{Sampler, TickSummary};
