//! Router construction for the aggregated rights server.

use std::sync::Arc;

use axum::{
    middleware as axum_mw,
    routing::{get, post, put},
    Extension, Router,
};
use rights_core::RightsService;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::jwt::{jwt_auth, JwtConfig};

/// Build the full axum router with all routes and middleware.
pub fn build_router(service: Arc<dyn RightsService>, jwt_config: JwtConfig) -> Router {
    // Routes that require JWT authentication
    let protected = Router::new()
        .route(
            "/aggregated-rights",
            post(handlers::aggregated_rights::create_aggregated_rights),
        )
        .route(
            "/aggregated-rights/:sku",
            put(handlers::aggregated_rights::update_aggregated_rights)
                .delete(handlers::aggregated_rights::delete_aggregated_rights),
        )
        .route(
            "/aggregated-rights/:sku/file",
            get(handlers::aggregated_rights::download_aggregated_rights_file),
        )
        .route(
            "/aggregated-rights/:sku/shared-licenses",
            put(handlers::sharing::update_shared_licenses),
        )
        .route(
            "/aggregations",
            post(handlers::aggregations::create_aggregation),
        )
        .route(
            "/aggregations/:id",
            put(handlers::aggregations::update_aggregation)
                .delete(handlers::aggregations::delete_aggregation),
        )
        .layer(axum_mw::from_fn(jwt_auth))
        .layer(Extension(jwt_config));

    // Public routes (no auth)
    let public = Router::new().route("/health", get(handlers::health::health));

    public
        .merge(protected)
        .layer(Extension(service))
        .layer(TraceLayer::new_for_http())
}
