// Per-disk metrics view

use serde::{Deserialize, Serialize};

/// Current metrics of one disk. History vectors are oldest first and only present on detail views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskSnapshot {
    pub device_number: u32,
    pub display_name: Option<String>,
    pub bytes_read_delta: u64,
    pub bytes_written_delta: u64,
    pub response_time_ms: u64,
    pub active_time_percent: f32,
    pub queue_depth: u32,
    pub split_count: u32,
    pub has_first_sample: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_history: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_history: Option<Vec<u64>>,
}
