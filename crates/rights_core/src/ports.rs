//! Port traits for storage, the metric catalog and the job queue.
//! Implementations live in `rights_postgres`, `rights_server` and [`crate::memory`].
//!
//! Adapters return `RightsError::Internal` for driver failures and
//! `RightsError::Conflict` for uniqueness violations. The workflows decide how
//! those surface to callers.

use async_trait::async_trait;

use crate::error::RightsError;
use crate::events::Job;
use crate::types::{
    AcqRight, AggregatedRight, Aggregation, AggregationProduct, LicenseShare, LicenseSummary,
    Metric, NewAggregation, Product,
};

pub type Result<T> = std::result::Result<T, RightsError>;

#[async_trait]
pub trait AggregatedRightStore: Send + Sync {
    async fn get_aggregated_right(&self, sku: &str, scope: &str)
        -> Result<Option<AggregatedRight>>;

    /// Plain insert. An existing (sku, scope) row is a `Conflict`.
    async fn insert_aggregated_right(&self, right: &AggregatedRight, file_data: &[u8])
        -> Result<()>;

    /// Insert or replace keyed on (sku, scope). `created_by` is kept on replace.
    async fn upsert_aggregated_right(&self, right: &AggregatedRight, file_data: &[u8])
        -> Result<()>;

    async fn delete_aggregated_right(&self, sku: &str, scope: &str) -> Result<()>;

    async fn get_file_data(&self, sku: &str, scope: &str) -> Result<Option<Vec<u8>>>;
}

#[async_trait]
pub trait AggregationStore: Send + Sync {
    async fn get_aggregation_by_id(&self, id: i32, scope: &str) -> Result<Option<Aggregation>>;

    async fn get_aggregation_by_name(&self, name: &str, scope: &str)
        -> Result<Option<Aggregation>>;

    /// Returns the generated id.
    async fn insert_aggregation(&self, aggregation: &NewAggregation) -> Result<i32>;

    async fn update_aggregation(&self, aggregation: &Aggregation) -> Result<()>;

    async fn delete_aggregation(&self, id: i32, scope: &str) -> Result<()>;

    /// Products and acquired rights of `editor` in `scope` not yet claimed by any aggregation.
    async fn list_available_products(&self, editor: &str, scope: &str)
        -> Result<Vec<AggregationProduct>>;

    /// Products currently selected by aggregation `id`.
    async fn list_selected_products(&self, id: i32, scope: &str)
        -> Result<Vec<AggregationProduct>>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn acqright_exists(&self, sku: &str, scope: &str) -> Result<bool>;

    async fn get_product(&self, swidtag: &str, scope: &str) -> Result<Option<Product>>;

    async fn upsert_product(&self, product: &Product) -> Result<()>;

    async fn get_acqright_by_swidtag(&self, swidtag: &str, scope: &str)
        -> Result<Option<AcqRight>>;

    async fn upsert_acqright(&self, acqright: &AcqRight) -> Result<()>;
}

#[async_trait]
pub trait LicenseLedger: Send + Sync {
    /// Headroom of `sku` in its owning `scope`.
    async fn license_summary(&self, sku: &str, scope: &str) -> Result<LicenseSummary>;

    /// Record `share` in both the given and the received ledger.
    async fn upsert_share(&self, share: &LicenseShare) -> Result<()>;
}

#[async_trait]
pub trait MetricCatalog: Send + Sync {
    async fn list_metrics(&self, scope: &str) -> Result<Vec<Metric>>;

    /// Create `metric` in `receiver_scope` using the definition held by `sender_scope`.
    async fn copy_metric(&self, metric: &Metric, sender_scope: &str, receiver_scope: &str)
        -> Result<()>;
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Returns the queue-assigned job id.
    async fn push_job(&self, job: &Job) -> Result<i64>;
}
