//! Aggregated right handlers.
//!
//! * `POST /aggregated-rights`: create a right
//! * `PUT /aggregated-rights/:sku`: update a right
//! * `DELETE /aggregated-rights/:sku?scope=`: delete a right
//! * `GET /aggregated-rights/:sku/file?scope=`: download the attached file

use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use rights_core::{types::AggregatedRightRequest, Caller, RightsService};

use super::ScopeQuery;
use crate::error::AppError;

pub async fn create_aggregated_rights(
    Extension(caller): Extension<Caller>,
    Extension(service): Extension<Arc<dyn RightsService>>,
    Json(req): Json<AggregatedRightRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let resp = service.create_aggregated_rights(&caller, req).await?;
    Ok(Json(serde_json::to_value(resp)?))
}

pub async fn update_aggregated_rights(
    Extension(caller): Extension<Caller>,
    Extension(service): Extension<Arc<dyn RightsService>>,
    Path(sku): Path<String>,
    Json(req): Json<AggregatedRightRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let resp = service.update_aggregated_rights(&caller, &sku, req).await?;
    Ok(Json(serde_json::to_value(resp)?))
}

pub async fn delete_aggregated_rights(
    Extension(caller): Extension<Caller>,
    Extension(service): Extension<Arc<dyn RightsService>>,
    Path(sku): Path<String>,
    Query(query): Query<ScopeQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let resp = service
        .delete_aggregated_rights(&caller, &sku, &query.scope)
        .await?;
    Ok(Json(serde_json::to_value(resp)?))
}

pub async fn download_aggregated_rights_file(
    Extension(caller): Extension<Caller>,
    Extension(service): Extension<Arc<dyn RightsService>>,
    Path(sku): Path<String>,
    Query(query): Query<ScopeQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let file = service
        .download_aggregated_rights_file(&caller, &sku, &query.scope)
        .await?;
    Ok(Json(serde_json::to_value(file)?))
}
