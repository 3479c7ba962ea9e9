//! Health endpoint

use axum::Json;
use serde_json::{json, Value};

/// Liveness check; requires no auth.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "module": "lyrad-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
