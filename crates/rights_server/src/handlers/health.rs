use std::sync::Arc;

use axum::{Extension, Json};
use rights_core::RightsService;
use serde_json::json;

/// GET /health: liveness plus change-event publish counters.
pub async fn health(
    Extension(service): Extension<Arc<dyn RightsService>>,
) -> Json<serde_json::Value> {
    let stats = service.publisher_stats();
    Json(json!({
        "status": "ok",
        "events": stats,
    }))
}
