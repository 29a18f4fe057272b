//! Domain types for aggregated rights, aggregations and license sharing.
//!
//! Request types are what the transport hands to the workflows. Record types are
//! what the store ports read and write.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ── Metric names ──────────────────────────────────────────────

/// Ordered list of metric names attached to a right.
///
/// Comma-joined only when written to the database or an event payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricNames(pub Vec<String>);

impl MetricNames {
    pub const SEPARATOR: char = ',';

    /// Split a persisted value. Empty input gives an empty list.
    pub fn parse(joined: &str) -> Self {
        if joined.is_empty() {
            return Self(Vec::new());
        }
        Self(
            joined
                .split(Self::SEPARATOR)
                .map(|s| s.to_string())
                .collect(),
        )
    }

    pub fn join(&self) -> String {
        self.0.join(",")
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for MetricNames {
    fn from(v: Vec<String>) -> Self {
        Self(v)
    }
}

/// Metric definition as returned by the metric catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    #[serde(rename = "type")]
    pub metric_type: String,
    #[serde(default)]
    pub description: String,
}

/// Attached files travel as standard base64 strings on the wire.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

// ── Aggregated rights ─────────────────────────────────────────

/// Create/update request for an aggregated right.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatedRightRequest {
    pub sku: String,
    pub aggregation_id: i32,
    pub scope: String,
    pub metrics: Vec<String>,
    pub num_licenses_acquired: i32,
    pub avg_unit_price: f64,
    pub num_licences_maintenance: i32,
    pub avg_maintenance_unit_price: f64,
    /// Empty string means absent.
    pub start_of_maintenance: String,
    pub end_of_maintenance: String,
    pub ordering_date: String,
    pub comment: String,
    pub corporate_sourcing_contract: String,
    pub software_provider: String,
    pub last_purchased_order: String,
    pub support_numbers: Vec<String>,
    pub maintenance_provider: String,
    pub file_name: String,
    #[serde(with = "base64_bytes")]
    pub file_data: Vec<u8>,
    pub repartition: bool,
}

/// Persisted aggregated right. The attached file blob is stored alongside but
/// is only read through `AggregatedRightStore::get_file_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRight {
    pub sku: String,
    pub aggregation_id: i32,
    pub scope: String,
    pub metrics: MetricNames,
    pub num_licenses_acquired: i32,
    pub num_licences_maintenance: i32,
    pub avg_unit_price: Decimal,
    pub avg_maintenance_unit_price: Decimal,
    pub total_purchase_cost: Decimal,
    pub total_maintenance_cost: Decimal,
    pub total_cost: Decimal,
    pub start_of_maintenance: Option<DateTime<Utc>>,
    pub end_of_maintenance: Option<DateTime<Utc>>,
    pub ordering_date: Option<DateTime<Utc>>,
    pub comment: Option<String>,
    pub corporate_sourcing_contract: String,
    pub software_provider: String,
    pub last_purchased_order: String,
    pub support_numbers: Vec<String>,
    pub maintenance_provider: String,
    pub file_name: String,
    pub repartition: bool,
    pub created_by: String,
    pub updated_by: Option<String>,
}

// ── Aggregations ──────────────────────────────────────────────

/// Create/update request for an aggregation. `id` is ignored on create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationRequest {
    pub id: i32,
    pub name: String,
    pub scope: String,
    pub product_editor: String,
    pub product_names: Vec<String>,
    pub swidtags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    pub id: i32,
    pub name: String,
    pub scope: String,
    pub product_editor: String,
    pub product_names: Vec<String>,
    pub swidtags: Vec<String>,
    pub created_by: String,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAggregation {
    pub name: String,
    pub scope: String,
    pub product_editor: String,
    pub product_names: Vec<String>,
    pub swidtags: Vec<String>,
    pub created_by: String,
}

/// A product eligible for (or already part of) an aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationProduct {
    pub swidtag: String,
    pub product_name: String,
    pub product_editor: String,
    pub product_version: String,
}

// ── Products and plain acquired rights ────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub swidtag: String,
    pub scope: String,
    pub name: String,
    pub editor: String,
    pub version: String,
    pub created_by: String,
}

/// A plain (non-aggregated) acquired right on a single product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcqRight {
    pub sku: String,
    pub scope: String,
    pub swidtag: String,
    pub product_name: String,
    pub product_editor: String,
    pub version: String,
    pub metrics: MetricNames,
    pub num_licenses_acquired: i32,
    pub num_licences_maintenance: i32,
    pub avg_unit_price: Decimal,
    pub avg_maintenance_unit_price: Decimal,
    pub created_by: String,
}

impl AcqRight {
    /// Zero-quantity copy for a receiving scope. Exists only so the receiving
    /// scope can reference the product; it represents no purchase.
    pub fn placeholder_for(&self, scope: &str, created_by: &str) -> Self {
        Self {
            sku: self.sku.clone(),
            scope: scope.to_string(),
            swidtag: self.swidtag.clone(),
            product_name: self.product_name.clone(),
            product_editor: self.product_editor.clone(),
            version: self.version.clone(),
            metrics: self.metrics.clone(),
            num_licenses_acquired: 0,
            num_licences_maintenance: 0,
            avg_unit_price: Decimal::ZERO,
            avg_maintenance_unit_price: Decimal::ZERO,
            created_by: created_by.to_string(),
        }
    }
}

// ── License sharing ───────────────────────────────────────────

/// One line of a sharing request: how many licenses a receiving scope should hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedLicenseLine {
    pub recipient_scope: String,
    pub shared_licenses: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedLicensesRequest {
    pub sku: String,
    pub scope: String,
    pub lines: Vec<SharedLicenseLine>,
}

/// Current share held by one receiving scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeShare {
    pub scope: String,
    pub shared_licenses: i32,
}

/// Headroom summary of a right in its owning scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseSummary {
    pub available_licenses: i32,
    pub total_shared_licenses: i32,
    pub shares: Vec<ScopeShare>,
}

impl LicenseSummary {
    pub fn share_for(&self, scope: &str) -> i32 {
        self.shares
            .iter()
            .find(|s| s.scope == scope)
            .map(|s| s.shared_licenses)
            .unwrap_or(0)
    }
}

/// A ledger write: recorded as given by `owner_scope` and received by `recipient_scope`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseShare {
    pub sku: String,
    pub owner_scope: String,
    pub recipient_scope: String,
    pub shared_licenses: i32,
    pub updated_by: String,
}

// ── Responses ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationCreated {
    pub success: bool,
    pub id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDownload {
    pub file_name: String,
    #[serde(with = "base64_bytes")]
    pub file_data: Vec<u8>,
}
