// HTTP + WebSocket routes (read-only view of the registry)

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

use crate::models::DiskSnapshot;
use crate::registry::DiskRegistry;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) registry: Arc<DiskRegistry>,
    pub(crate) disks_tx: broadcast::Sender<Vec<DiskSnapshot>>,
    pub(crate) ws_disk_connections: Arc<AtomicUsize>,
}

pub fn app(
    registry: Arc<DiskRegistry>,
    disks_tx: broadcast::Sender<Vec<DiskSnapshot>>,
    ws_disk_connections: Arc<AtomicUsize>,
) -> Router {
    let state = AppState {
        registry,
        disks_tx,
        ws_disk_connections,
    };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/disks", get(http::list_disks_handler)) // GET /api/disks
        .route("/api/disks/{device_number}", get(http::disk_detail_handler)) // GET /api/disks/{n}
        .route("/ws/disks", get(ws::ws_disks)) // WS /ws/disks
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
