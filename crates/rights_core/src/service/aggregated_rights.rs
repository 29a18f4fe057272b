//! Create, update, delete and file download for aggregated rights.

use chrono::{DateTime, SecondsFormat, Utc};

use super::{write_failed, Result, RightsServiceImpl};
use crate::error::RightsError;
use crate::events::{ChangeEvent, DeleteAggregatedRightPayload, UpsertAggregatedRightPayload};
use crate::normalize::{
    check_support_numbers, maintenance_window, parse_flexible_date, to_decimal, Costs,
};
use crate::types::{AggregatedRight, AggregatedRightRequest, FileDownload, MetricNames};
use crate::validate::{lookup_failed, validate_metrics};

/// A request that passed validation, in its persisted and event shapes.
struct ValidatedRight {
    record: AggregatedRight,
    event: UpsertAggregatedRightPayload,
}

fn wire_date(dt: Option<DateTime<Utc>>) -> String {
    dt.map(|d| d.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        .unwrap_or_default()
}

impl RightsServiceImpl {
    /// Create a right in `req.scope`. Scope authorization is the caller's job,
    /// so sharing can provision into scopes the caller does not hold.
    pub(super) async fn create_right_in_scope(
        &self,
        actor: &str,
        req: &AggregatedRightRequest,
    ) -> Result<()> {
        self.ensure_sku_free(&req.sku, &req.scope).await?;
        let validated = self.validate_right(req, actor).await?;
        self.rights
            .insert_aggregated_right(&validated.record, &req.file_data)
            .await
            .map_err(|e| write_failed("create aggregated right", &req.scope, e))?;
        tracing::info!(sku = %req.sku, scope = %req.scope, "aggregated right created");
        self.publish(ChangeEvent::UpsertAggregatedRight(validated.event))
            .await;
        Ok(())
    }

    async fn ensure_sku_free(&self, sku: &str, scope: &str) -> Result<()> {
        let existing = self
            .rights
            .get_aggregated_right(sku, scope)
            .await
            .map_err(|e| lookup_failed("get aggregated right", scope, e))?;
        let acqright = self
            .products
            .acqright_exists(sku, scope)
            .await
            .map_err(|e| lookup_failed("acqright exists", scope, e))?;
        if existing.is_some() || acqright {
            tracing::warn!(sku, scope, "sku already in use");
            return Err(RightsError::invalid("sku already exists"));
        }
        Ok(())
    }

    pub(super) async fn update_right(
        &self,
        actor: &str,
        sku: &str,
        req: &AggregatedRightRequest,
    ) -> Result<()> {
        let existing = self
            .rights
            .get_aggregated_right(sku, &req.scope)
            .await
            .map_err(|e| lookup_failed("get aggregated right", &req.scope, e))?
            .ok_or_else(|| RightsError::invalid("aggregated right does not exist"))?;
        if existing.sku != req.sku {
            return Err(RightsError::invalid("sku cannot be updated"));
        }

        let summary = self
            .ledger
            .license_summary(sku, &req.scope)
            .await
            .map_err(|e| lookup_failed("license summary", &req.scope, e))?;
        if req.num_licenses_acquired < summary.total_shared_licenses {
            tracing::warn!(
                sku,
                scope = %req.scope,
                acquired = req.num_licenses_acquired,
                shared = summary.total_shared_licenses,
                "acquired licences below shared licences"
            );
            return Err(RightsError::invalid(
                "AcquiredLicences less than sharedLicences",
            ));
        }

        let mut validated = self.validate_right(req, &existing.created_by).await?;
        validated.record.updated_by = Some(actor.to_string());
        self.rights
            .upsert_aggregated_right(&validated.record, &req.file_data)
            .await
            .map_err(|e| write_failed("update aggregated right", &req.scope, e))?;
        tracing::info!(sku, scope = %req.scope, "aggregated right updated");
        self.publish(ChangeEvent::UpsertAggregatedRight(validated.event))
            .await;
        Ok(())
    }

    pub(super) async fn delete_right(&self, sku: &str, scope: &str) -> Result<()> {
        self.rights
            .delete_aggregated_right(sku, scope)
            .await
            .map_err(|e| write_failed("delete aggregated right", scope, e))?;
        tracing::info!(sku, scope, "aggregated right deleted");
        self.publish(ChangeEvent::DeleteAggregatedRight(
            DeleteAggregatedRightPayload {
                sku: sku.to_string(),
                scope: scope.to_string(),
            },
        ))
        .await;
        Ok(())
    }

    pub(super) async fn right_file(&self, sku: &str, scope: &str) -> Result<FileDownload> {
        let right = self
            .rights
            .get_aggregated_right(sku, scope)
            .await
            .map_err(|e| lookup_failed("get aggregated right", scope, e))?
            .ok_or_else(|| RightsError::invalid("SKU does not exist"))?;
        let no_file = || RightsError::invalid("Aggregated Right does not contain file");
        if right.file_name.is_empty() {
            return Err(no_file());
        }
        let file_data = self
            .rights
            .get_file_data(sku, scope)
            .await
            .map_err(|e| lookup_failed("get file data", scope, e))?
            .filter(|data| !data.is_empty())
            .ok_or_else(no_file)?;
        Ok(FileDownload {
            file_name: right.file_name,
            file_data,
        })
    }

    /// Aggregation existence, metrics, dates, costs and support numbers, in that order.
    async fn validate_right(
        &self,
        req: &AggregatedRightRequest,
        created_by: &str,
    ) -> Result<ValidatedRight> {
        let aggregation = self
            .aggregations
            .get_aggregation_by_id(req.aggregation_id, &req.scope)
            .await
            .map_err(|e| lookup_failed("get aggregation", &req.scope, e))?;
        if aggregation.is_none() {
            return Err(RightsError::invalid("aggregation does not exists"));
        }

        validate_metrics(self.metrics.as_ref(), &req.scope, &req.metrics).await?;

        let ordering_date = parse_flexible_date("ordering", &req.ordering_date)?;
        let window = maintenance_window(
            req.num_licences_maintenance,
            &req.start_of_maintenance,
            &req.end_of_maintenance,
        )?;
        let costs = Costs::compute(
            req.avg_unit_price,
            req.num_licenses_acquired,
            req.avg_maintenance_unit_price,
            req.num_licences_maintenance,
        );
        let totals = costs.to_decimals()?;

        check_support_numbers(&req.support_numbers)?;

        let metrics = MetricNames(req.metrics.clone());
        let start = window.map(|w| w.start);
        let end = window.map(|w| w.end);

        let record = AggregatedRight {
            sku: req.sku.clone(),
            aggregation_id: req.aggregation_id,
            scope: req.scope.clone(),
            metrics: metrics.clone(),
            num_licenses_acquired: req.num_licenses_acquired,
            num_licences_maintenance: req.num_licences_maintenance,
            avg_unit_price: to_decimal("avg unit price", req.avg_unit_price)?,
            avg_maintenance_unit_price: to_decimal(
                "avg maintenance unit price",
                req.avg_maintenance_unit_price,
            )?,
            total_purchase_cost: totals.total_purchase,
            total_maintenance_cost: totals.total_maintenance,
            total_cost: totals.total,
            start_of_maintenance: start,
            end_of_maintenance: end,
            ordering_date,
            comment: (!req.comment.is_empty()).then(|| req.comment.clone()),
            corporate_sourcing_contract: req.corporate_sourcing_contract.clone(),
            software_provider: req.software_provider.clone(),
            last_purchased_order: req.last_purchased_order.clone(),
            support_numbers: req.support_numbers.clone(),
            maintenance_provider: req.maintenance_provider.clone(),
            file_name: req.file_name.clone(),
            repartition: req.repartition,
            created_by: created_by.to_string(),
            updated_by: None,
        };

        let event = UpsertAggregatedRightPayload {
            sku: req.sku.clone(),
            aggregation_id: req.aggregation_id,
            metric: metrics.join(),
            start_of_maintenance: wire_date(start),
            end_of_maintenance: wire_date(end),
            num_licenses_acquired: req.num_licenses_acquired,
            avg_unit_price: req.avg_unit_price,
            avg_maintenance_unit_price: req.avg_maintenance_unit_price,
            total_purchase_cost: costs.total_purchase,
            total_maintenance_cost: costs.total_maintenance,
            total_cost: costs.total,
            scope: req.scope.clone(),
            num_licences_maintenance: req.num_licences_maintenance,
            ordering_date: wire_date(ordering_date),
            corporate_sourcing_contract: req.corporate_sourcing_contract.clone(),
            software_provider: req.software_provider.clone(),
            last_purchased_order: req.last_purchased_order.clone(),
            support_number: req.support_numbers.join(","),
            maintenance_provider: req.maintenance_provider.clone(),
            repartition: req.repartition,
        };

        Ok(ValidatedRight { record, event })
    }
}
