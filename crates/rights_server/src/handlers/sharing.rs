//! PUT /aggregated-rights/:sku/shared-licenses: set per-scope shared license counts.

use std::sync::Arc;

use axum::{extract::Path, Extension, Json};
use rights_core::{types::SharedLicensesRequest, Caller, RightsService};

use crate::error::AppError;

pub async fn update_shared_licenses(
    Extension(caller): Extension<Caller>,
    Extension(service): Extension<Arc<dyn RightsService>>,
    Path(sku): Path<String>,
    Json(mut req): Json<SharedLicensesRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    req.sku = sku;
    let resp = service.update_aggrights_shared_licenses(&caller, req).await?;
    Ok(Json(serde_json::to_value(resp)?))
}
