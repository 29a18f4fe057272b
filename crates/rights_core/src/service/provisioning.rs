//! Provisioning of a shared right into a receiving scope.
//!
//! The work is an explicit plan of steps run from a worklist. A step may
//! expand into further steps (a missing aggregation needs its products, a
//! missing product may need a placeholder acquired right and its metrics), so
//! the plan is bounded by [`MAX_PROVISION_STEPS`].

use std::collections::VecDeque;

use anyhow::anyhow;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::{write_failed, Result, RightsServiceImpl};
use crate::error::RightsError;
use crate::types::{
    AcqRight, AggregatedRight, AggregatedRightRequest, Aggregation, AggregationRequest, Metric,
    Product,
};
use crate::validate::lookup_failed;

pub const MAX_PROVISION_STEPS: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum ProvisionStep {
    /// Copy a metric definition from the sender catalog if the receiver lacks it.
    EnsureMetric { name: String },
    /// Resolve the receiver aggregation with the owner aggregation's name.
    EnsureAggregation,
    /// Make `swidtag` referenceable in the receiver, as a product or acquired right.
    EnsureProduct { swidtag: String },
    /// Write a zero-quantity copy of the sender's acquired right.
    CopyAcqRight { acqright: AcqRight },
    CreateAggregation,
    CreateRight,
}

/// State carried between steps for one (sender, receiver) pair.
struct Provisioning<'a> {
    actor: &'a str,
    owner: &'a AggregatedRight,
    owner_aggregation: Aggregation,
    receiver: &'a str,
    sender_catalog: Option<Vec<Metric>>,
    receiver_catalog: Option<Vec<Metric>>,
    aggregation_id: Option<i32>,
}

impl RightsServiceImpl {
    /// Make sure `receiver` holds a copy of `owner`. No-op if it already does.
    pub(super) async fn provision_recipient(
        &self,
        actor: &str,
        owner: &AggregatedRight,
        receiver: &str,
    ) -> Result<()> {
        let held = self
            .rights
            .get_aggregated_right(&owner.sku, receiver)
            .await
            .map_err(|e| lookup_failed("get aggregated right", receiver, e))?;
        if held.is_some() {
            return Ok(());
        }

        let owner_aggregation = self
            .aggregations
            .get_aggregation_by_id(owner.aggregation_id, &owner.scope)
            .await
            .map_err(|e| lookup_failed("get aggregation", &owner.scope, e))?
            .ok_or_else(|| RightsError::invalid("aggregation does not exists"))?;

        let mut ctx = Provisioning {
            actor,
            owner,
            owner_aggregation,
            receiver,
            sender_catalog: None,
            receiver_catalog: None,
            aggregation_id: None,
        };

        let mut plan: VecDeque<ProvisionStep> = owner
            .metrics
            .iter()
            .map(|name| ProvisionStep::EnsureMetric {
                name: name.to_string(),
            })
            .collect();
        plan.push_back(ProvisionStep::EnsureAggregation);
        plan.push_back(ProvisionStep::CreateRight);

        let mut executed = 0usize;
        while let Some(step) = plan.pop_front() {
            executed += 1;
            if executed > MAX_PROVISION_STEPS {
                tracing::error!(sku = %owner.sku, receiver, "provisioning plan did not converge");
                return Err(RightsError::Internal(anyhow!(
                    "provisioning of {} into {} exceeded {} steps",
                    owner.sku,
                    receiver,
                    MAX_PROVISION_STEPS
                )));
            }
            let follow_up = self.run_step(&mut ctx, &step).await.map_err(|e| {
                tracing::error!(
                    ?step,
                    sku = %owner.sku,
                    sender = %owner.scope,
                    receiver,
                    error = %e,
                    "provisioning step failed"
                );
                e
            })?;
            for next in follow_up.into_iter().rev() {
                plan.push_front(next);
            }
        }
        tracing::info!(
            sku = %owner.sku,
            sender = %owner.scope,
            receiver,
            steps = executed,
            "right provisioned"
        );
        Ok(())
    }

    async fn run_step(
        &self,
        ctx: &mut Provisioning<'_>,
        step: &ProvisionStep,
    ) -> Result<Vec<ProvisionStep>> {
        match step {
            ProvisionStep::EnsureMetric { name } => {
                self.ensure_metric(ctx, name).await?;
                Ok(Vec::new())
            }
            ProvisionStep::EnsureAggregation => {
                let found = self
                    .aggregations
                    .get_aggregation_by_name(&ctx.owner_aggregation.name, ctx.receiver)
                    .await
                    .map_err(|e| lookup_failed("get aggregation by name", ctx.receiver, e))?;
                match found {
                    Some(aggregation) => {
                        ctx.aggregation_id = Some(aggregation.id);
                        Ok(Vec::new())
                    }
                    None => {
                        let mut steps: Vec<ProvisionStep> = ctx
                            .owner_aggregation
                            .swidtags
                            .iter()
                            .map(|swidtag| ProvisionStep::EnsureProduct {
                                swidtag: swidtag.clone(),
                            })
                            .collect();
                        steps.push(ProvisionStep::CreateAggregation);
                        Ok(steps)
                    }
                }
            }
            ProvisionStep::EnsureProduct { swidtag } => self.ensure_product(ctx, swidtag).await,
            ProvisionStep::CopyAcqRight { acqright } => {
                let placeholder = acqright.placeholder_for(ctx.receiver, ctx.actor);
                self.products
                    .upsert_acqright(&placeholder)
                    .await
                    .map_err(|e| write_failed("insert placeholder acqright", ctx.receiver, e))?;
                Ok(Vec::new())
            }
            ProvisionStep::CreateAggregation => {
                let source = &ctx.owner_aggregation;
                let req = AggregationRequest {
                    id: 0,
                    name: source.name.clone(),
                    scope: ctx.receiver.to_string(),
                    product_editor: source.product_editor.clone(),
                    product_names: source.product_names.clone(),
                    swidtags: source.swidtags.clone(),
                };
                let id = self.create_aggregation_in_scope(ctx.actor, &req).await?;
                ctx.aggregation_id = Some(id);
                Ok(Vec::new())
            }
            ProvisionStep::CreateRight => {
                let aggregation_id = ctx.aggregation_id.ok_or_else(|| {
                    RightsError::Internal(anyhow!("receiving aggregation was not resolved"))
                })?;
                let req = receiver_copy(ctx.owner, ctx.receiver, aggregation_id)?;
                self.create_right_in_scope(ctx.actor, &req).await?;
                Ok(Vec::new())
            }
        }
    }

    async fn ensure_metric(&self, ctx: &mut Provisioning<'_>, name: &str) -> Result<()> {
        if ctx.receiver_catalog.is_none() {
            ctx.receiver_catalog = Some(self.catalog(ctx.receiver).await?);
        }
        if ctx
            .receiver_catalog
            .as_ref()
            .is_some_and(|c| c.iter().any(|m| m.name == name))
        {
            return Ok(());
        }

        if ctx.sender_catalog.is_none() {
            ctx.sender_catalog = Some(self.catalog(&ctx.owner.scope).await?);
        }
        let metric = ctx
            .sender_catalog
            .as_ref()
            .and_then(|c| c.iter().find(|m| m.name == name))
            .cloned()
            .ok_or_else(|| RightsError::invalid("MetricNotExists"))?;

        self.metrics
            .copy_metric(&metric, &ctx.owner.scope, ctx.receiver)
            .await
            .map_err(|e| {
                tracing::error!(
                    metric = name,
                    receiver = ctx.receiver,
                    error = %e,
                    "metric copy failed"
                );
                RightsError::ServiceUnavailable("ServiceError".into())
            })?;
        if let Some(catalog) = ctx.receiver_catalog.as_mut() {
            catalog.push(metric);
        }
        Ok(())
    }

    async fn catalog(&self, scope: &str) -> Result<Vec<Metric>> {
        self.metrics.list_metrics(scope).await.map_err(|e| {
            tracing::error!(scope, error = %e, "metric catalog unavailable");
            RightsError::ServiceUnavailable("ServiceError".into())
        })
    }

    async fn ensure_product(
        &self,
        ctx: &Provisioning<'_>,
        swidtag: &str,
    ) -> Result<Vec<ProvisionStep>> {
        let sender = ctx.owner.scope.as_str();
        let receiver = ctx.receiver;

        let has_product = self
            .products
            .get_product(swidtag, receiver)
            .await
            .map_err(|e| lookup_failed("get product", receiver, e))?
            .is_some();
        let has_acqright = self
            .products
            .get_acqright_by_swidtag(swidtag, receiver)
            .await
            .map_err(|e| lookup_failed("get acqright", receiver, e))?
            .is_some();
        if has_product || has_acqright {
            return Ok(Vec::new());
        }

        if let Some(product) = self
            .products
            .get_product(swidtag, sender)
            .await
            .map_err(|e| lookup_failed("get product", sender, e))?
        {
            let copy = Product {
                scope: receiver.to_string(),
                created_by: ctx.actor.to_string(),
                ..product
            };
            self.products
                .upsert_product(&copy)
                .await
                .map_err(|e| write_failed("copy product", receiver, e))?;
            return Ok(Vec::new());
        }

        let acqright = self
            .products
            .get_acqright_by_swidtag(swidtag, sender)
            .await
            .map_err(|e| lookup_failed("get acqright", sender, e))?
            .ok_or_else(|| RightsError::NotFound("AcRightNotFound".into()))?;
        let mut steps: Vec<ProvisionStep> = acqright
            .metrics
            .iter()
            .map(|name| ProvisionStep::EnsureMetric {
                name: name.to_string(),
            })
            .collect();
        steps.push(ProvisionStep::CopyAcqRight { acqright });
        Ok(steps)
    }
}

/// Request creating the receiver's copy of `owner`: pricing, maintenance and
/// metadata carried over, nothing acquired, no attached file.
fn receiver_copy(
    owner: &AggregatedRight,
    receiver: &str,
    aggregation_id: i32,
) -> Result<AggregatedRightRequest> {
    let date = |d: Option<chrono::DateTime<chrono::Utc>>| {
        d.map(|d| d.to_rfc3339()).unwrap_or_default()
    };
    Ok(AggregatedRightRequest {
        sku: owner.sku.clone(),
        aggregation_id,
        scope: receiver.to_string(),
        metrics: owner.metrics.0.clone(),
        num_licenses_acquired: 0,
        avg_unit_price: decimal_to_f64(owner.avg_unit_price)?,
        num_licences_maintenance: owner.num_licences_maintenance,
        avg_maintenance_unit_price: decimal_to_f64(owner.avg_maintenance_unit_price)?,
        start_of_maintenance: date(owner.start_of_maintenance),
        end_of_maintenance: date(owner.end_of_maintenance),
        ordering_date: date(owner.ordering_date),
        comment: owner.comment.clone().unwrap_or_default(),
        corporate_sourcing_contract: owner.corporate_sourcing_contract.clone(),
        software_provider: owner.software_provider.clone(),
        last_purchased_order: owner.last_purchased_order.clone(),
        support_numbers: owner.support_numbers.clone(),
        maintenance_provider: owner.maintenance_provider.clone(),
        file_name: String::new(),
        file_data: Vec::new(),
        repartition: owner.repartition,
    })
}

fn decimal_to_f64(d: Decimal) -> Result<f64> {
    d.to_f64()
        .ok_or_else(|| RightsError::Internal(anyhow!("price {d} does not fit in f64")))
}
