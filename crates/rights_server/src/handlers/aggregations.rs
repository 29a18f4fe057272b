//! Aggregation handlers.
//!
//! * `POST /aggregations`: create an aggregation
//! * `PUT /aggregations/:id`: update an aggregation
//! * `DELETE /aggregations/:id?scope=`: delete an aggregation

use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use rights_core::{types::AggregationRequest, Caller, RightsService};

use super::ScopeQuery;
use crate::error::AppError;

pub async fn create_aggregation(
    Extension(caller): Extension<Caller>,
    Extension(service): Extension<Arc<dyn RightsService>>,
    Json(req): Json<AggregationRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let resp = service.create_aggregation(&caller, req).await?;
    Ok(Json(serde_json::to_value(resp)?))
}

pub async fn update_aggregation(
    Extension(caller): Extension<Caller>,
    Extension(service): Extension<Arc<dyn RightsService>>,
    Path(id): Path<i32>,
    Json(mut req): Json<AggregationRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    req.id = id;
    let resp = service.update_aggregation(&caller, req).await?;
    Ok(Json(serde_json::to_value(resp)?))
}

pub async fn delete_aggregation(
    Extension(caller): Extension<Caller>,
    Extension(service): Extension<Arc<dyn RightsService>>,
    Path(id): Path<i32>,
    Query(query): Query<ScopeQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let resp = service.delete_aggregation(&caller, id, &query.scope).await?;
    Ok(Json(serde_json::to_value(resp)?))
}
