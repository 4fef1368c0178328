// GET handlers: version, disk list, disk detail

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::AppState;
use crate::identifier::DeviceIdentifier;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// GET /version: service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/disks: current metrics of every monitored disk, without history.
pub(super) async fn list_disks_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.snapshots(false))
}

/// GET /api/disks/{device_number}: one disk including its read/write history.
pub(super) async fn disk_detail_handler(
    State(state): State<AppState>,
    Path(device_number): Path<u32>,
) -> Response {
    let id = DeviceIdentifier::new(device_number);
    match state.registry.find(id) {
        Some(entry) => Json(entry.snapshot(true)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("device {} is not monitored", id) })),
        )
            .into_response(),
    }
}
