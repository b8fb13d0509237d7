//! HTTP handlers for the bridge server.

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::bridge::{MethodCall, Reply};
use crate::platform::Platform;
use crate::transport::Adapter;

use super::state::AppState;

/// HTTP status for a bridge error code.
fn status_for(code: &str) -> StatusCode {
    match code {
        "PERMISSION_DENIED" => StatusCode::FORBIDDEN,
        "INVALID_ARGUMENTS" => StatusCode::BAD_REQUEST,
        "UNAVAILABLE" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Handle POST /api/call - dispatch one method call.
pub async fn call<A: Adapter, P: Platform>(
    State(state): State<Arc<AppState<A, P>>>,
    Json(call): Json<MethodCall>,
) -> (StatusCode, Json<Value>) {
    match state.bridge.handle(&call).await {
        Reply::Success(result) => (StatusCode::OK, Json(json!({ "ok": true, "result": result }))),
        Reply::Error { code, message } => (
            status_for(&code),
            Json(json!({ "ok": false, "code": code, "message": message })),
        ),
        Reply::NotImplemented => (
            StatusCode::NOT_IMPLEMENTED,
            Json(json!({
                "ok": false,
                "code": "NOT_IMPLEMENTED",
                "message": format!("Unknown method '{}'", call.method),
            })),
        ),
    }
}

/// Handle GET /api/health - uptime and connection snapshot.
pub async fn health<A: Adapter, P: Platform>(
    State(state): State<Arc<AppState<A, P>>>,
) -> Json<Value> {
    let connection = state.bridge.manager().connection_info().await;
    Json(json!({
        "uptime_secs": state.started.elapsed().as_secs(),
        "connection": connection,
    }))
}
