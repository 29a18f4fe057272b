//! rights_server: standalone REST server for aggregated software-license rights.
//!
//! Configuration is read from `RIGHTS_*` env vars, see `config::ServerConfig`.

use std::sync::Arc;

use anyhow::Context;
use rights_core::ports::MetricCatalog;
use rights_core::{RightsService, RightsServiceImpl};
use rights_postgres::{apply_schema, PgStores};
use rights_server::config::ServerConfig;
use rights_server::metric_client::HttpMetricCatalog;
use rights_server::middleware::jwt::JwtConfig;
use rights_server::router::build_router;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rights_server=debug,rights_core=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_pool_size)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    tracing::info!("Connected to database");

    apply_schema(&pool).await?;

    let stores = PgStores::new(pool);
    let metrics: Arc<dyn MetricCatalog> = Arc::new(HttpMetricCatalog::new(
        config.metric_service_url.clone(),
        config.metric_timeout,
    )?);

    let service: Arc<dyn RightsService> = Arc::new(RightsServiceImpl::new(
        Arc::new(stores.rights),
        Arc::new(stores.aggregations),
        Arc::new(stores.products),
        Arc::new(stores.ledger),
        metrics,
        Arc::new(stores.jobs),
    ));

    let jwt_config = JwtConfig::from_secret(config.jwt_secret.as_bytes());
    let app = build_router(service, jwt_config);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;
    tracing::info!("rights_server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
