//! In-memory implementations of every port.
//!
//! Used by the workflow and HTTP tests. All ports share one [`MemoryState`]
//! behind a `tokio::sync::Mutex`, so a test can seed rows, flip failure
//! switches and inspect pushed jobs through [`InMemoryStores::state`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::RightsError;
use crate::events::Job;
use crate::ports::{
    AggregatedRightStore, AggregationStore, JobQueue, LicenseLedger, MetricCatalog, ProductStore,
    Result,
};
use crate::service::RightsServiceImpl;
use crate::types::*;

type ScopeKey = (String, String);

#[derive(Debug, Default)]
pub struct MemoryState {
    /// (scope, sku) → (right, file blob)
    pub aggregated_rights: BTreeMap<ScopeKey, (AggregatedRight, Vec<u8>)>,
    pub aggregations: BTreeMap<i32, Aggregation>,
    pub next_aggregation_id: i32,
    /// (scope, swidtag)
    pub products: BTreeMap<ScopeKey, Product>,
    /// (scope, sku)
    pub acqrights: BTreeMap<ScopeKey, AcqRight>,
    /// (owner scope, sku, recipient scope) → count
    pub shared: BTreeMap<(String, String, String), i32>,
    /// (recipient scope, sku, owner scope) → count
    pub received: BTreeMap<(String, String, String), i32>,
    /// scope → catalog
    pub metrics: BTreeMap<String, Vec<Metric>>,
    pub jobs: Vec<Job>,

    pub fail_job_push: bool,
    pub fail_right_writes: bool,
    pub metric_catalog_down: bool,
    /// Ledger writes towards this recipient scope fail.
    pub fail_share_writes_to: Option<String>,
}

fn key(a: &str, b: &str) -> ScopeKey {
    (a.to_string(), b.to_string())
}

impl MemoryState {
    pub fn add_metric(&mut self, scope: &str, name: &str) {
        self.metrics.entry(scope.to_string()).or_default().push(Metric {
            name: name.to_string(),
            metric_type: "oracle.processor.standard".to_string(),
            description: String::new(),
        });
    }

    pub fn add_product(&mut self, scope: &str, swidtag: &str, name: &str, editor: &str) {
        self.products.insert(
            key(scope, swidtag),
            Product {
                swidtag: swidtag.to_string(),
                scope: scope.to_string(),
                name: name.to_string(),
                editor: editor.to_string(),
                version: String::new(),
                created_by: "seed".to_string(),
            },
        );
    }

    pub fn add_acqright(&mut self, acqright: AcqRight) {
        self.acqrights
            .insert(key(&acqright.scope, &acqright.sku), acqright);
    }

    pub fn add_aggregation(&mut self, aggregation: Aggregation) {
        self.next_aggregation_id = self.next_aggregation_id.max(aggregation.id);
        self.aggregations.insert(aggregation.id, aggregation);
    }

    pub fn add_right(&mut self, right: AggregatedRight) {
        self.aggregated_rights
            .insert(key(&right.scope, &right.sku), (right, Vec::new()));
    }

    pub fn set_share(&mut self, sku: &str, owner: &str, recipient: &str, count: i32) {
        self.shared
            .insert((owner.into(), sku.into(), recipient.into()), count);
        self.received
            .insert((recipient.into(), sku.into(), owner.into()), count);
    }

    pub fn right(&self, sku: &str, scope: &str) -> Option<&AggregatedRight> {
        self.aggregated_rights.get(&key(scope, sku)).map(|(r, _)| r)
    }

    pub fn share(&self, sku: &str, owner: &str, recipient: &str) -> Option<i32> {
        self.shared
            .get(&(owner.to_string(), sku.to_string(), recipient.to_string()))
            .copied()
    }

    pub fn aggregation_named(&self, name: &str, scope: &str) -> Option<&Aggregation> {
        self.aggregations
            .values()
            .find(|a| a.name == name && a.scope == scope)
    }

    fn claimed_swidtags(&self, scope: &str) -> BTreeSet<&str> {
        self.aggregations
            .values()
            .filter(|a| a.scope == scope)
            .flat_map(|a| a.swidtags.iter().map(String::as_str))
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStores {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().await
    }

    pub async fn jobs(&self) -> Vec<Job> {
        self.state.lock().await.jobs.clone()
    }

    /// A service wired to these stores for every port.
    pub fn service(&self) -> RightsServiceImpl {
        let shared = Arc::new(self.clone());
        RightsServiceImpl::new(
            shared.clone(),
            shared.clone(),
            shared.clone(),
            shared.clone(),
            shared.clone(),
            shared,
        )
    }
}

fn injected(what: &str) -> RightsError {
    RightsError::Internal(anyhow!("injected failure: {what}"))
}

#[async_trait]
impl AggregatedRightStore for InMemoryStores {
    async fn get_aggregated_right(
        &self,
        sku: &str,
        scope: &str,
    ) -> Result<Option<AggregatedRight>> {
        Ok(self.state.lock().await.right(sku, scope).cloned())
    }

    async fn insert_aggregated_right(
        &self,
        right: &AggregatedRight,
        file_data: &[u8],
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.fail_right_writes {
            return Err(injected("aggregated right write"));
        }
        let k = key(&right.scope, &right.sku);
        if state.aggregated_rights.contains_key(&k) {
            return Err(RightsError::Conflict("aggregated right already exists".into()));
        }
        state
            .aggregated_rights
            .insert(k, (right.clone(), file_data.to_vec()));
        Ok(())
    }

    async fn upsert_aggregated_right(
        &self,
        right: &AggregatedRight,
        file_data: &[u8],
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.fail_right_writes {
            return Err(injected("aggregated right write"));
        }
        let k = key(&right.scope, &right.sku);
        let mut row = right.clone();
        if let Some((existing, _)) = state.aggregated_rights.get(&k) {
            row.created_by = existing.created_by.clone();
        }
        state.aggregated_rights.insert(k, (row, file_data.to_vec()));
        Ok(())
    }

    async fn delete_aggregated_right(&self, sku: &str, scope: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.fail_right_writes {
            return Err(injected("aggregated right delete"));
        }
        state.aggregated_rights.remove(&key(scope, sku));
        Ok(())
    }

    async fn get_file_data(&self, sku: &str, scope: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .state
            .lock()
            .await
            .aggregated_rights
            .get(&key(scope, sku))
            .map(|(_, data)| data.clone()))
    }
}

#[async_trait]
impl AggregationStore for InMemoryStores {
    async fn get_aggregation_by_id(&self, id: i32, scope: &str) -> Result<Option<Aggregation>> {
        Ok(self
            .state
            .lock()
            .await
            .aggregations
            .get(&id)
            .filter(|a| a.scope == scope)
            .cloned())
    }

    async fn get_aggregation_by_name(
        &self,
        name: &str,
        scope: &str,
    ) -> Result<Option<Aggregation>> {
        Ok(self.state.lock().await.aggregation_named(name, scope).cloned())
    }

    async fn insert_aggregation(&self, aggregation: &NewAggregation) -> Result<i32> {
        let mut state = self.state.lock().await;
        if state.aggregation_named(&aggregation.name, &aggregation.scope).is_some() {
            return Err(RightsError::Conflict("aggregation name already exists".into()));
        }
        state.next_aggregation_id += 1;
        let id = state.next_aggregation_id;
        state.aggregations.insert(
            id,
            Aggregation {
                id,
                name: aggregation.name.clone(),
                scope: aggregation.scope.clone(),
                product_editor: aggregation.product_editor.clone(),
                product_names: aggregation.product_names.clone(),
                swidtags: aggregation.swidtags.clone(),
                created_by: aggregation.created_by.clone(),
                updated_by: None,
            },
        );
        Ok(id)
    }

    async fn update_aggregation(&self, aggregation: &Aggregation) -> Result<()> {
        self.state
            .lock()
            .await
            .aggregations
            .insert(aggregation.id, aggregation.clone());
        Ok(())
    }

    async fn delete_aggregation(&self, id: i32, scope: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.aggregations.get(&id).is_some_and(|a| a.scope == scope) {
            state.aggregations.remove(&id);
        }
        Ok(())
    }

    async fn list_available_products(
        &self,
        editor: &str,
        scope: &str,
    ) -> Result<Vec<AggregationProduct>> {
        let state = self.state.lock().await;
        let claimed = state.claimed_swidtags(scope);
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();

        for p in state.products.values() {
            if p.scope == scope
                && p.editor == editor
                && !claimed.contains(p.swidtag.as_str())
                && seen.insert(p.swidtag.clone())
            {
                out.push(AggregationProduct {
                    swidtag: p.swidtag.clone(),
                    product_name: p.name.clone(),
                    product_editor: p.editor.clone(),
                    product_version: p.version.clone(),
                });
            }
        }
        for a in state.acqrights.values() {
            if a.scope == scope
                && a.product_editor == editor
                && !claimed.contains(a.swidtag.as_str())
                && seen.insert(a.swidtag.clone())
            {
                out.push(AggregationProduct {
                    swidtag: a.swidtag.clone(),
                    product_name: a.product_name.clone(),
                    product_editor: a.product_editor.clone(),
                    product_version: a.version.clone(),
                });
            }
        }
        Ok(out)
    }

    async fn list_selected_products(
        &self,
        id: i32,
        scope: &str,
    ) -> Result<Vec<AggregationProduct>> {
        let state = self.state.lock().await;
        let Some(aggregation) = state.aggregations.get(&id).filter(|a| a.scope == scope) else {
            return Ok(Vec::new());
        };
        Ok(aggregation
            .swidtags
            .iter()
            .map(|swidtag| AggregationProduct {
                swidtag: swidtag.clone(),
                product_name: String::new(),
                product_editor: aggregation.product_editor.clone(),
                product_version: String::new(),
            })
            .collect())
    }
}

#[async_trait]
impl ProductStore for InMemoryStores {
    async fn acqright_exists(&self, sku: &str, scope: &str) -> Result<bool> {
        Ok(self.state.lock().await.acqrights.contains_key(&key(scope, sku)))
    }

    async fn get_product(&self, swidtag: &str, scope: &str) -> Result<Option<Product>> {
        Ok(self.state.lock().await.products.get(&key(scope, swidtag)).cloned())
    }

    async fn upsert_product(&self, product: &Product) -> Result<()> {
        self.state
            .lock()
            .await
            .products
            .insert(key(&product.scope, &product.swidtag), product.clone());
        Ok(())
    }

    async fn get_acqright_by_swidtag(
        &self,
        swidtag: &str,
        scope: &str,
    ) -> Result<Option<AcqRight>> {
        Ok(self
            .state
            .lock()
            .await
            .acqrights
            .values()
            .find(|a| a.scope == scope && a.swidtag == swidtag)
            .cloned())
    }

    /// First writer wins; an existing acquired right is left untouched.
    async fn upsert_acqright(&self, acqright: &AcqRight) -> Result<()> {
        self.state
            .lock()
            .await
            .acqrights
            .entry(key(&acqright.scope, &acqright.sku))
            .or_insert_with(|| acqright.clone());
        Ok(())
    }
}

#[async_trait]
impl LicenseLedger for InMemoryStores {
    async fn license_summary(&self, sku: &str, scope: &str) -> Result<LicenseSummary> {
        let state = self.state.lock().await;
        let acquired = state.right(sku, scope).map(|r| r.num_licenses_acquired).unwrap_or(0);
        let shares: Vec<ScopeShare> = state
            .shared
            .iter()
            .filter(|((owner, s, _), _)| owner == scope && s == sku)
            .map(|((_, _, recipient), count)| ScopeShare {
                scope: recipient.clone(),
                shared_licenses: *count,
            })
            .collect();
        let total: i32 = shares.iter().map(|s| s.shared_licenses).sum();
        Ok(LicenseSummary {
            available_licenses: acquired - total,
            total_shared_licenses: total,
            shares,
        })
    }

    async fn upsert_share(&self, share: &LicenseShare) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.fail_share_writes_to.as_deref() == Some(share.recipient_scope.as_str()) {
            return Err(injected("license share write"));
        }
        state.set_share(
            &share.sku,
            &share.owner_scope,
            &share.recipient_scope,
            share.shared_licenses,
        );
        Ok(())
    }
}

#[async_trait]
impl MetricCatalog for InMemoryStores {
    async fn list_metrics(&self, scope: &str) -> Result<Vec<Metric>> {
        let state = self.state.lock().await;
        if state.metric_catalog_down {
            return Err(RightsError::ServiceUnavailable("ServiceError".into()));
        }
        Ok(state.metrics.get(scope).cloned().unwrap_or_default())
    }

    async fn copy_metric(
        &self,
        metric: &Metric,
        _sender_scope: &str,
        receiver_scope: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.metric_catalog_down {
            return Err(RightsError::ServiceUnavailable("ServiceError".into()));
        }
        let catalog = state.metrics.entry(receiver_scope.to_string()).or_default();
        if !catalog.iter().any(|m| m.name == metric.name) {
            catalog.push(metric.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl JobQueue for InMemoryStores {
    async fn push_job(&self, job: &Job) -> Result<i64> {
        let mut state = self.state.lock().await;
        if state.fail_job_push {
            return Err(injected("job push"));
        }
        state.jobs.push(job.clone());
        Ok(state.jobs.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn right(sku: &str, licenses: i32) -> AggregatedRight {
        AggregatedRight {
            sku: sku.into(),
            aggregation_id: 1,
            scope: "s1".into(),
            metrics: MetricNames(vec!["met1".into()]),
            num_licenses_acquired: licenses,
            num_licences_maintenance: 0,
            avg_unit_price: Decimal::ONE,
            avg_maintenance_unit_price: Decimal::ZERO,
            total_purchase_cost: Decimal::from(licenses),
            total_maintenance_cost: Decimal::ZERO,
            total_cost: Decimal::from(licenses),
            start_of_maintenance: None,
            end_of_maintenance: None,
            ordering_date: None,
            comment: None,
            corporate_sourcing_contract: String::new(),
            software_provider: String::new(),
            last_purchased_order: String::new(),
            support_numbers: Vec::new(),
            maintenance_provider: String::new(),
            file_name: String::new(),
            repartition: false,
            created_by: "first@test.com".into(),
            updated_by: None,
        }
    }

    fn acqright(sku: &str, licenses: i32) -> AcqRight {
        AcqRight {
            sku: sku.into(),
            scope: "s2".into(),
            swidtag: "sw1".into(),
            product_name: "db".into(),
            product_editor: "oracle".into(),
            version: String::new(),
            metrics: MetricNames(vec!["met1".into()]),
            num_licenses_acquired: licenses,
            num_licences_maintenance: 0,
            avg_unit_price: Decimal::ZERO,
            avg_maintenance_unit_price: Decimal::ZERO,
            created_by: "seed".into(),
        }
    }

    #[tokio::test]
    async fn insert_existing_right_is_conflict() {
        let stores = InMemoryStores::new();
        stores.insert_aggregated_right(&right("sku1", 10), b"a").await.unwrap();

        let mut second = right("sku1", 99);
        second.created_by = "second@test.com".into();
        let err = stores
            .insert_aggregated_right(&second, b"b")
            .await
            .unwrap_err();
        assert!(matches!(err, RightsError::Conflict(_)));

        let kept = stores.get_aggregated_right("sku1", "s1").await.unwrap().unwrap();
        assert_eq!(kept.num_licenses_acquired, 10);
        assert_eq!(kept.created_by, "first@test.com");
        assert_eq!(stores.get_file_data("sku1", "s1").await.unwrap().unwrap(), b"a");
    }

    #[tokio::test]
    async fn upsert_right_replaces_but_keeps_creator() {
        let stores = InMemoryStores::new();
        stores.insert_aggregated_right(&right("sku1", 10), &[]).await.unwrap();

        let mut update = right("sku1", 20);
        update.created_by = "other@test.com".into();
        stores.upsert_aggregated_right(&update, &[]).await.unwrap();

        let stored = stores.get_aggregated_right("sku1", "s1").await.unwrap().unwrap();
        assert_eq!(stored.num_licenses_acquired, 20);
        assert_eq!(stored.created_by, "first@test.com");
    }

    #[tokio::test]
    async fn acqright_write_keeps_existing_row() {
        let stores = InMemoryStores::new();
        stores.state().await.add_acqright(acqright("sku1", 25));

        stores.upsert_acqright(&acqright("sku1", 0)).await.unwrap();

        let state = stores.state().await;
        assert_eq!(state.acqrights.len(), 1);
        assert_eq!(
            state.acqrights[&("s2".to_string(), "sku1".to_string())].num_licenses_acquired,
            25
        );
    }
}
