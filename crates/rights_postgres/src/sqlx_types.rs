//! Row shapes read by the adapters, converted into `rights_core` types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use rights_core::types::{
    AcqRight, AggregatedRight, Aggregation, AggregationProduct, MetricNames, Product,
};

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PgAggregatedRightRow {
    pub sku: String,
    pub scope: String,
    pub aggregation_id: i32,
    pub metric: String,
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

impl From<PgAggregatedRightRow> for AggregatedRight {
    fn from(r: PgAggregatedRightRow) -> Self {
        Self {
            sku: r.sku,
            aggregation_id: r.aggregation_id,
            scope: r.scope,
            metrics: MetricNames::parse(&r.metric),
            num_licenses_acquired: r.num_licenses_acquired,
            num_licences_maintenance: r.num_licences_maintenance,
            avg_unit_price: r.avg_unit_price,
            avg_maintenance_unit_price: r.avg_maintenance_unit_price,
            total_purchase_cost: r.total_purchase_cost,
            total_maintenance_cost: r.total_maintenance_cost,
            total_cost: r.total_cost,
            start_of_maintenance: r.start_of_maintenance,
            end_of_maintenance: r.end_of_maintenance,
            ordering_date: r.ordering_date,
            comment: r.comment,
            corporate_sourcing_contract: r.corporate_sourcing_contract,
            software_provider: r.software_provider,
            last_purchased_order: r.last_purchased_order,
            support_numbers: r.support_numbers,
            maintenance_provider: r.maintenance_provider,
            file_name: r.file_name,
            repartition: r.repartition,
            created_by: r.created_by,
            updated_by: r.updated_by,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PgAggregationRow {
    pub id: i32,
    pub aggregation_name: String,
    pub scope: String,
    pub product_editor: String,
    pub product_names: Vec<String>,
    pub swidtags: Vec<String>,
    pub created_by: String,
    pub updated_by: Option<String>,
}

impl From<PgAggregationRow> for Aggregation {
    fn from(r: PgAggregationRow) -> Self {
        Self {
            id: r.id,
            name: r.aggregation_name,
            scope: r.scope,
            product_editor: r.product_editor,
            product_names: r.product_names,
            swidtags: r.swidtags,
            created_by: r.created_by,
            updated_by: r.updated_by,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PgAggregationProductRow {
    pub swidtag: String,
    pub product_name: String,
    pub product_editor: String,
    pub product_version: String,
}

impl From<PgAggregationProductRow> for AggregationProduct {
    fn from(r: PgAggregationProductRow) -> Self {
        Self {
            swidtag: r.swidtag,
            product_name: r.product_name,
            product_editor: r.product_editor,
            product_version: r.product_version,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PgProductRow {
    pub swidtag: String,
    pub scope: String,
    pub product_name: String,
    pub product_editor: String,
    pub product_version: String,
    pub created_by: String,
}

impl From<PgProductRow> for Product {
    fn from(r: PgProductRow) -> Self {
        Self {
            swidtag: r.swidtag,
            scope: r.scope,
            name: r.product_name,
            editor: r.product_editor,
            version: r.product_version,
            created_by: r.created_by,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PgAcqRightRow {
    pub sku: String,
    pub scope: String,
    pub swidtag: String,
    pub product_name: String,
    pub product_editor: String,
    pub version: String,
    pub metric: String,
    pub num_licenses_acquired: i32,
    pub num_licences_maintenance: i32,
    pub avg_unit_price: Decimal,
    pub avg_maintenance_unit_price: Decimal,
    pub created_by: String,
}

impl From<PgAcqRightRow> for AcqRight {
    fn from(r: PgAcqRightRow) -> Self {
        Self {
            sku: r.sku,
            scope: r.scope,
            swidtag: r.swidtag,
            product_name: r.product_name,
            product_editor: r.product_editor,
            version: r.version,
            metrics: MetricNames::parse(&r.metric),
            num_licenses_acquired: r.num_licenses_acquired,
            num_licences_maintenance: r.num_licences_maintenance,
            avg_unit_price: r.avg_unit_price,
            avg_maintenance_unit_price: r.avg_maintenance_unit_price,
            created_by: r.created_by,
        }
    }
}
