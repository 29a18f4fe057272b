//! Aggregation create/update/delete.

use super::{write_failed, Result, RightsServiceImpl};
use crate::error::RightsError;
use crate::events::{ChangeEvent, DeleteAggregationPayload, UpsertAggregationPayload};
use crate::types::{Aggregation, AggregationRequest, NewAggregation};
use crate::validate::{lookup_failed, validate_membership};

fn upsert_event(id: i32, req: &AggregationRequest) -> ChangeEvent {
    ChangeEvent::UpsertAggregation(UpsertAggregationPayload {
        id,
        name: req.name.clone(),
        swidtags: req.swidtags.clone(),
        product_names: req.product_names.clone(),
        product_editor: req.product_editor.clone(),
        scope: req.scope.clone(),
    })
}

impl RightsServiceImpl {
    /// Create an aggregation in `req.scope` without authorizing the scope.
    pub(super) async fn create_aggregation_in_scope(
        &self,
        actor: &str,
        req: &AggregationRequest,
    ) -> Result<i32> {
        if req.name.is_empty() {
            return Err(RightsError::invalid("aggregation name is required"));
        }
        let clash = self
            .aggregations
            .get_aggregation_by_name(&req.name, &req.scope)
            .await
            .map_err(|e| lookup_failed("get aggregation by name", &req.scope, e))?;
        if clash.is_some() {
            return Err(RightsError::invalid("aggregation name already exists"));
        }

        validate_membership(
            self.aggregations.as_ref(),
            &req.product_editor,
            &req.scope,
            None,
            &req.swidtags,
        )
        .await?;

        let id = self
            .aggregations
            .insert_aggregation(&NewAggregation {
                name: req.name.clone(),
                scope: req.scope.clone(),
                product_editor: req.product_editor.clone(),
                product_names: req.product_names.clone(),
                swidtags: req.swidtags.clone(),
                created_by: actor.to_string(),
            })
            .await
            .map_err(|e| write_failed("insert aggregation", &req.scope, e))?;
        tracing::info!(id, name = %req.name, scope = %req.scope, "aggregation created");
        self.publish(upsert_event(id, req)).await;
        Ok(id)
    }

    pub(super) async fn update_existing_aggregation(
        &self,
        actor: &str,
        req: &AggregationRequest,
    ) -> Result<()> {
        let existing = self
            .aggregations
            .get_aggregation_by_id(req.id, &req.scope)
            .await
            .map_err(|e| lookup_failed("get aggregation", &req.scope, e))?
            .ok_or_else(|| RightsError::invalid("aggregation does not exist"))?;

        if existing.name != req.name {
            let clash = self
                .aggregations
                .get_aggregation_by_name(&req.name, &req.scope)
                .await
                .map_err(|e| lookup_failed("get aggregation by name", &req.scope, e))?;
            if clash.is_some_and(|other| other.id != existing.id) {
                return Err(RightsError::invalid("aggregation name already exists"));
            }
        }

        validate_membership(
            self.aggregations.as_ref(),
            &req.product_editor,
            &req.scope,
            Some(existing.id),
            &req.swidtags,
        )
        .await?;

        let updated = Aggregation {
            id: existing.id,
            name: req.name.clone(),
            scope: req.scope.clone(),
            product_editor: req.product_editor.clone(),
            product_names: req.product_names.clone(),
            swidtags: req.swidtags.clone(),
            created_by: existing.created_by,
            updated_by: Some(actor.to_string()),
        };
        self.aggregations
            .update_aggregation(&updated)
            .await
            .map_err(|e| write_failed("update aggregation", &req.scope, e))?;
        tracing::info!(id = updated.id, scope = %req.scope, "aggregation updated");
        self.publish(upsert_event(updated.id, req)).await;
        Ok(())
    }

    pub(super) async fn delete_existing_aggregation(&self, id: i32, scope: &str) -> Result<()> {
        let existing = self
            .aggregations
            .get_aggregation_by_id(id, scope)
            .await
            .map_err(|e| lookup_failed("get aggregation", scope, e))?;
        if existing.is_none() {
            return Err(RightsError::invalid("aggregation does not exist"));
        }
        self.aggregations
            .delete_aggregation(id, scope)
            .await
            .map_err(|e| write_failed("delete aggregation", scope, e))?;
        tracing::info!(id, scope, "aggregation deleted");
        self.publish(ChangeEvent::DeleteAggregation(DeleteAggregationPayload {
            id,
            scope: scope.to_string(),
        }))
        .await;
        Ok(())
    }
}
