//! PostgreSQL adapters for the aggregated rights service.

mod sqlx_types;
pub mod store;

use anyhow::anyhow;
use sqlx::PgPool;

pub use store::{
    PgAggregatedRightStore, PgAggregationStore, PgJobQueue, PgLicenseLedger, PgProductStore,
};

/// Schema for every table the adapters touch.
pub const SCHEMA_SQL: &str = include_str!("../migrations/001_rights.sql");

/// Create the schema if it does not exist yet.
pub async fn apply_schema(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await
        .map_err(|e| anyhow!("applying rights schema: {e}"))?;
    tracing::info!("rights schema applied");
    Ok(())
}

/// One adapter per store port, all sharing a pool.
pub struct PgStores {
    pub rights: PgAggregatedRightStore,
    pub aggregations: PgAggregationStore,
    pub products: PgProductStore,
    pub ledger: PgLicenseLedger,
    pub jobs: PgJobQueue,
}

impl PgStores {
    pub fn new(pool: PgPool) -> Self {
        Self {
            rights: PgAggregatedRightStore::new(pool.clone()),
            aggregations: PgAggregationStore::new(pool.clone()),
            products: PgProductStore::new(pool.clone()),
            ledger: PgLicenseLedger::new(pool.clone()),
            jobs: PgJobQueue::new(pool),
        }
    }
}
