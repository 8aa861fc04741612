//! HTTP tool surface: one GET route per telemetry operation, each
//! returning an `{ok, data | error}` envelope. A collector hard error
//! becomes a structured 500 payload, never a crash.

use crate::collectors::process::SortKey;
use crate::collectors::{CollectError, SystemMonitor};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

const TOOLS: &[&str] = &[
    "get_cpu_status",
    "get_memory_status",
    "get_gpu_status",
    "get_network_status",
    "get_disk_status",
    "get_process_list",
    "get_system_overview",
    "get_detailed_cpu_status",
    "get_detailed_memory_status",
    "get_detailed_gpu_status",
    "get_detailed_network_status",
    "get_detailed_process_status",
];

#[derive(Clone)]
pub struct ToolState {
    pub monitor: Arc<SystemMonitor>,
}

pub fn build_router(monitor: Arc<SystemMonitor>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/tools", get(list_tools))
        .route("/tools/get_cpu_status", get(get_cpu_status))
        .route("/tools/get_memory_status", get(get_memory_status))
        .route("/tools/get_gpu_status", get(get_gpu_status))
        .route("/tools/get_network_status", get(get_network_status))
        .route("/tools/get_disk_status", get(get_disk_status))
        .route("/tools/get_process_list", get(get_process_list))
        .route("/tools/get_system_overview", get(get_system_overview))
        .route("/tools/get_detailed_cpu_status", get(get_detailed_cpu_status))
        .route("/tools/get_detailed_memory_status", get(get_detailed_memory_status))
        .route("/tools/get_detailed_gpu_status", get(get_detailed_gpu_status))
        .route("/tools/get_detailed_network_status", get(get_detailed_network_status))
        .route("/tools/get_detailed_process_status", get(get_detailed_process_status))
        .with_state(ToolState { monitor })
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn list_tools() -> impl IntoResponse {
    Json(serde_json::json!({ "tools": TOOLS }))
}

fn tool_response<T: Serialize>(result: Result<T, CollectError>) -> Response {
    match result {
        Ok(data) => Json(serde_json::json!({ "ok": true, "data": data })).into_response(),
        Err(err) => {
            error!(error = %err, "tool call failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "ok": false, "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

async fn get_cpu_status(State(state): State<ToolState>) -> Response {
    tool_response(state.monitor.cpu().status().await)
}

async fn get_memory_status(State(state): State<ToolState>) -> Response {
    tool_response(state.monitor.memory().status().await)
}

async fn get_gpu_status(State(state): State<ToolState>) -> Response {
    tool_response(state.monitor.gpu().status().await)
}

async fn get_network_status(State(state): State<ToolState>) -> Response {
    tool_response(state.monitor.network().status().await)
}

async fn get_disk_status(State(state): State<ToolState>) -> Response {
    tool_response(state.monitor.disk().status().await)
}

#[derive(Debug, Deserialize)]
struct ProcessListQuery {
    #[serde(default)]
    sort_by: SortKey,
    #[serde(default = "default_limit")]
    limit: usize,
}

const fn default_limit() -> usize {
    10
}

async fn get_process_list(
    State(state): State<ToolState>,
    Query(query): Query<ProcessListQuery>,
) -> Response {
    tool_response(state.monitor.process().list(query.sort_by, query.limit).await)
}

#[derive(Debug, Deserialize)]
struct OverviewQuery {
    #[serde(default = "default_true")]
    include_analysis: bool,
}

const fn default_true() -> bool {
    true
}

async fn get_system_overview(
    State(state): State<ToolState>,
    Query(query): Query<OverviewQuery>,
) -> Response {
    tool_response(state.monitor.overview(query.include_analysis).await)
}

async fn get_detailed_cpu_status(State(state): State<ToolState>) -> Response {
    tool_response(state.monitor.cpu().detailed_status().await)
}

async fn get_detailed_memory_status(State(state): State<ToolState>) -> Response {
    tool_response(state.monitor.memory().detailed_status().await)
}

async fn get_detailed_gpu_status(State(state): State<ToolState>) -> Response {
    tool_response(state.monitor.gpu().detailed_status().await)
}

async fn get_detailed_network_status(State(state): State<ToolState>) -> Response {
    tool_response(state.monitor.network().detailed_status().await)
}

async fn get_detailed_process_status(State(state): State<ToolState>) -> Response {
    tool_response(state.monitor.process().detailed_status().await)
}
