//! RightsService: the aggregated rights, aggregation and license-sharing workflows.
//!
//! Takes port traits via `Arc<dyn Port>` so the same logic runs against Postgres
//! (`rights_postgres`) or the in-memory adapters used by tests.

mod aggregated_rights;
mod aggregations;
mod provisioning;
mod sharing;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    caller::Caller,
    error::RightsError,
    events::{ChangeEvent, EventPublisher, PublisherStats},
    ports::{
        AggregatedRightStore, AggregationStore, JobQueue, LicenseLedger, MetricCatalog,
        ProductStore,
    },
    types::*,
};

pub use provisioning::{ProvisionStep, MAX_PROVISION_STEPS};
pub use sharing::check_conservation;

pub type Result<T> = std::result::Result<T, RightsError>;

// ── RightsService trait ───────────────────────────────────────

/// Every method takes `&Caller` explicitly and authorizes the target scope
/// before doing anything else.
#[async_trait]
pub trait RightsService: Send + Sync {
    async fn create_aggregated_rights(
        &self,
        caller: &Caller,
        req: AggregatedRightRequest,
    ) -> Result<SuccessResponse>;

    /// `sku` identifies the stored right; `req.sku` must match it.
    async fn update_aggregated_rights(
        &self,
        caller: &Caller,
        sku: &str,
        req: AggregatedRightRequest,
    ) -> Result<SuccessResponse>;

    async fn delete_aggregated_rights(
        &self,
        caller: &Caller,
        sku: &str,
        scope: &str,
    ) -> Result<SuccessResponse>;

    async fn download_aggregated_rights_file(
        &self,
        caller: &Caller,
        sku: &str,
        scope: &str,
    ) -> Result<FileDownload>;

    /// Set the number of licenses of `req.sku` each receiving scope holds.
    async fn update_aggrights_shared_licenses(
        &self,
        caller: &Caller,
        req: SharedLicensesRequest,
    ) -> Result<SuccessResponse>;

    async fn create_aggregation(
        &self,
        caller: &Caller,
        req: AggregationRequest,
    ) -> Result<AggregationCreated>;

    async fn update_aggregation(
        &self,
        caller: &Caller,
        req: AggregationRequest,
    ) -> Result<SuccessResponse>;

    async fn delete_aggregation(
        &self,
        caller: &Caller,
        id: i32,
        scope: &str,
    ) -> Result<SuccessResponse>;

    fn publisher_stats(&self) -> PublisherStats;
}

// ── RightsServiceImpl ─────────────────────────────────────────

pub struct RightsServiceImpl {
    pub rights: Arc<dyn AggregatedRightStore>,
    pub aggregations: Arc<dyn AggregationStore>,
    pub products: Arc<dyn ProductStore>,
    pub ledger: Arc<dyn LicenseLedger>,
    pub metrics: Arc<dyn MetricCatalog>,
    events: EventPublisher,
}

impl RightsServiceImpl {
    pub fn new(
        rights: Arc<dyn AggregatedRightStore>,
        aggregations: Arc<dyn AggregationStore>,
        products: Arc<dyn ProductStore>,
        ledger: Arc<dyn LicenseLedger>,
        metrics: Arc<dyn MetricCatalog>,
        jobs: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            rights,
            aggregations,
            products,
            ledger,
            metrics,
            events: EventPublisher::new(jobs),
        }
    }

    async fn publish(&self, event: ChangeEvent) {
        // Outcome is logged by the publisher.
        let _ = self.events.publish(&event).await;
    }
}

/// Log a failed write and surface it as `Unknown(DBError)`. Conflicts pass through.
fn write_failed(op: &str, scope: &str, e: RightsError) -> RightsError {
    match e {
        RightsError::Conflict(_) => e,
        other => {
            tracing::error!(op, scope, error = %other, "store write failed");
            RightsError::db_write()
        }
    }
}

#[async_trait]
impl RightsService for RightsServiceImpl {
    async fn create_aggregated_rights(
        &self,
        caller: &Caller,
        req: AggregatedRightRequest,
    ) -> Result<SuccessResponse> {
        caller.authorize(&req.scope)?;
        self.create_right_in_scope(&caller.user_id, &req).await?;
        Ok(SuccessResponse::ok())
    }

    async fn update_aggregated_rights(
        &self,
        caller: &Caller,
        sku: &str,
        req: AggregatedRightRequest,
    ) -> Result<SuccessResponse> {
        caller.authorize(&req.scope)?;
        self.update_right(&caller.user_id, sku, &req).await?;
        Ok(SuccessResponse::ok())
    }

    async fn delete_aggregated_rights(
        &self,
        caller: &Caller,
        sku: &str,
        scope: &str,
    ) -> Result<SuccessResponse> {
        caller.authorize(scope)?;
        self.delete_right(sku, scope).await?;
        Ok(SuccessResponse::ok())
    }

    async fn download_aggregated_rights_file(
        &self,
        caller: &Caller,
        sku: &str,
        scope: &str,
    ) -> Result<FileDownload> {
        caller.authorize(scope)?;
        self.right_file(sku, scope).await
    }

    async fn update_aggrights_shared_licenses(
        &self,
        caller: &Caller,
        req: SharedLicensesRequest,
    ) -> Result<SuccessResponse> {
        caller.authorize(&req.scope)?;
        self.share_licenses(&caller.user_id, &req).await?;
        Ok(SuccessResponse::ok())
    }

    async fn create_aggregation(
        &self,
        caller: &Caller,
        req: AggregationRequest,
    ) -> Result<AggregationCreated> {
        caller.authorize(&req.scope)?;
        let id = self.create_aggregation_in_scope(&caller.user_id, &req).await?;
        Ok(AggregationCreated { success: true, id })
    }

    async fn update_aggregation(
        &self,
        caller: &Caller,
        req: AggregationRequest,
    ) -> Result<SuccessResponse> {
        caller.authorize(&req.scope)?;
        self.update_existing_aggregation(&caller.user_id, &req)
            .await?;
        Ok(SuccessResponse::ok())
    }

    async fn delete_aggregation(
        &self,
        caller: &Caller,
        id: i32,
        scope: &str,
    ) -> Result<SuccessResponse> {
        caller.authorize(scope)?;
        self.delete_existing_aggregation(id, scope).await?;
        Ok(SuccessResponse::ok())
    }

    fn publisher_stats(&self) -> PublisherStats {
        self.events.stats()
    }
}
