//! Metric and aggregation-membership validation.

use std::collections::HashSet;

use crate::error::RightsError;
use crate::ports::{AggregationStore, MetricCatalog};
use crate::types::{AggregationProduct, Metric};

// ── Metrics ───────────────────────────────────────────────────

/// At least one name is required and every requested name must exist in
/// `catalog`. Exact, case-sensitive match.
pub fn check_metrics<'a>(
    catalog: &[Metric],
    requested: impl IntoIterator<Item = &'a str>,
) -> Result<(), RightsError> {
    if catalog.is_empty() {
        return Err(RightsError::invalid("MetricNotExists"));
    }
    let mut checked = 0usize;
    for name in requested {
        if !catalog.iter().any(|m| m.name == name) {
            tracing::debug!(metric = name, "metric not in catalog");
            return Err(RightsError::invalid("MetricNotExists"));
        }
        checked += 1;
    }
    if checked == 0 {
        tracing::debug!("no metric requested");
        return Err(RightsError::invalid("MetricNotExists"));
    }
    Ok(())
}

/// Fetch the scope's catalog and check `requested` against it.
///
/// The fetched catalog is returned so callers can reuse it.
pub async fn validate_metrics(
    catalog: &dyn MetricCatalog,
    scope: &str,
    requested: &[String],
) -> Result<Vec<Metric>, RightsError> {
    let metrics = catalog.list_metrics(scope).await.map_err(|e| {
        tracing::error!(scope, error = %e, "metric catalog unavailable");
        RightsError::ServiceUnavailable("ServiceError".into())
    })?;
    check_metrics(&metrics, requested.iter().map(String::as_str))?;
    Ok(metrics)
}

// ── Aggregation membership ────────────────────────────────────

/// On create `selected` is `None`: every swidtag must come from a non-empty
/// `available` pool. On update each swidtag may also come from `selected`.
pub fn check_membership(
    available: &[AggregationProduct],
    selected: Option<&[AggregationProduct]>,
    swidtags: &[String],
) -> Result<(), RightsError> {
    let mut pool: HashSet<&str> = available.iter().map(|p| p.swidtag.as_str()).collect();
    match selected {
        None if pool.is_empty() => {
            return Err(RightsError::invalid("ProductNotAvailable"));
        }
        None => {}
        Some(selected) => pool.extend(selected.iter().map(|p| p.swidtag.as_str())),
    }
    match swidtags.iter().find(|s| !pool.contains(s.as_str())) {
        Some(missing) => {
            tracing::debug!(swidtag = %missing, "swidtag not in product pool");
            Err(RightsError::invalid("ProductNotAvailable"))
        }
        None => Ok(()),
    }
}

/// Load the editor's pool (and, when `aggregation_id` is set, its current
/// selection) and check `swidtags` against it.
pub async fn validate_membership(
    store: &dyn AggregationStore,
    editor: &str,
    scope: &str,
    aggregation_id: Option<i32>,
    swidtags: &[String],
) -> Result<(), RightsError> {
    let available = store
        .list_available_products(editor, scope)
        .await
        .map_err(|e| lookup_failed("list available products", scope, e))?;
    let selected = match aggregation_id {
        Some(id) => Some(
            store
                .list_selected_products(id, scope)
                .await
                .map_err(|e| lookup_failed("list selected products", scope, e))?,
        ),
        None => None,
    };
    check_membership(&available, selected.as_deref(), swidtags)
}

/// Log a failed read and hide its detail behind `Internal(DBError)`.
pub(crate) fn lookup_failed(op: &str, scope: &str, e: RightsError) -> RightsError {
    match e {
        RightsError::Internal(inner) => {
            tracing::error!(op, scope, error = %inner, "store lookup failed");
            RightsError::Internal(inner)
        }
        other => other,
    }
}
