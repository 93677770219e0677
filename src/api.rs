//! Device API endpoints
//!
//! Exposes every attached device's bulk region and field attributes over
//! HTTP. Each bulk request opens a handle, runs one transaction and closes
//! it again, so requests from different clients share the device's region
//! lock exactly like concurrent file handles would.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::bulk::{Activity, Readiness};
use crate::device::{DeviceInfo, DeviceTable};
use crate::error::Result;

// ============================================================================
// Data structures
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegionQuery {
    /// Bytes to read; must equal the region size.
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct TransferResult {
    pub success: bool,
    pub bytes: usize,
}

#[derive(Debug, Serialize)]
pub struct ActivityEvent {
    pub device: String,
    pub activity: Activity,
}

// ============================================================================
// API handlers
// ============================================================================

/// GET /api/devices - List attached devices
async fn list_devices(State(devices): State<Arc<DeviceTable>>) -> Json<Vec<DeviceInfo>> {
    Json(devices.list())
}

/// GET /api/devices/:name - Describe one device
async fn get_device(
    State(devices): State<Arc<DeviceTable>>,
    Path(name): Path<String>,
) -> Result<Json<DeviceInfo>> {
    Ok(Json(devices.get(&name)?.info()))
}

/// GET /api/devices/:name/region?count=N - Bulk read
async fn read_region(
    State(devices): State<Arc<DeviceTable>>,
    Path(name): Path<String>,
    Query(query): Query<RegionQuery>,
) -> Result<impl IntoResponse> {
    let handle = devices.get(&name)?.open()?;
    let mut buf = Vec::new();
    handle.read_to(query.count, &mut buf)?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], buf))
}

/// PUT /api/devices/:name/region - Bulk write of the request body
async fn write_region(
    State(devices): State<Arc<DeviceTable>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<TransferResult>> {
    let handle = devices.get(&name)?.open()?;
    let bytes = handle.write(&body)?;
    Ok(Json(TransferResult {
        success: true,
        bytes,
    }))
}

/// GET /api/devices/:name/poll - Readiness of the bulk surface
async fn poll_device(
    State(devices): State<Arc<DeviceTable>>,
    Path(name): Path<String>,
) -> Result<Json<Readiness>> {
    let handle = devices.get(&name)?.open()?;
    Ok(Json(handle.poll()))
}

/// GET /api/devices/:name/activity - Wait for the next bulk transaction
///
/// Answers 503 if the device is detached while waiting.
async fn wait_activity(
    State(devices): State<Arc<DeviceTable>>,
    Path(name): Path<String>,
) -> Result<Json<ActivityEvent>> {
    let device = devices.get(&name)?;
    let activity = device.next_activity().await?;
    Ok(Json(ActivityEvent {
        device: name,
        activity,
    }))
}

/// GET /api/devices/:name/attr/:field - Field value as `0x..\n`
async fn show_attr(
    State(devices): State<Arc<DeviceTable>>,
    Path((name, field)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    let text = devices.get(&name)?.show(&field)?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text))
}

/// PUT /api/devices/:name/attr/:field - Store a field from text
async fn store_attr(
    State(devices): State<Arc<DeviceTable>>,
    Path((name, field)): Path<(String, String)>,
    body: String,
) -> Result<Json<TransferResult>> {
    let bytes = devices.get(&name)?.store(&field, &body)?;
    Ok(Json(TransferResult {
        success: true,
        bytes,
    }))
}

/// Create the device API router
pub fn device_router(devices: Arc<DeviceTable>) -> Router {
    Router::new()
        .route("/", get(list_devices))
        .route("/:name", get(get_device))
        .route("/:name/region", get(read_region).put(write_region))
        .route("/:name/poll", get(poll_device))
        .route("/:name/activity", get(wait_activity))
        .route(
            "/:name/attr/:field",
            get(show_attr).put(store_attr).post(store_attr),
        )
        .with_state(devices)
}

/// The whole application: the device API under `/api/devices`.
pub fn app(devices: Arc<DeviceTable>) -> Router {
    Router::new()
        .nest("/api/devices", device_router(devices))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
}
