//! Postgres implementations of the rights_core store ports.
//!
//! Each adapter is a newtype wrapping PgPool. All SQL is runtime-checked
//! (sqlx::query, not sqlx::query!) so building needs no live database.

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};

use rights_core::error::RightsError;
use rights_core::events::Job;
use rights_core::ports::{
    AggregatedRightStore, AggregationStore, JobQueue, LicenseLedger, ProductStore, Result,
};
use rights_core::types::*;

use crate::sqlx_types::{
    PgAcqRightRow, PgAggregatedRightRow, PgAggregationProductRow, PgAggregationRow, PgProductRow,
};

/// Unique violations become `Conflict`; everything else is internal.
fn write_error(e: sqlx::Error) -> RightsError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return RightsError::Conflict(db.message().to_string());
        }
    }
    RightsError::Internal(anyhow!(e))
}

/// Column list shared by the plain insert and the upsert. Binds come from
/// `bind_right` in the same order.
const INSERT_RIGHT: &str = r#"
    INSERT INTO rights.aggregated_rights (
        sku, scope, aggregation_id, metric,
        num_licenses_acquired, num_licences_maintenance,
        avg_unit_price, avg_maintenance_unit_price,
        total_purchase_cost, total_maintenance_cost, total_cost,
        start_of_maintenance, end_of_maintenance, ordering_date,
        comment, corporate_sourcing_contract, software_provider,
        last_purchased_order, support_numbers, maintenance_provider,
        file_name, file_data, repartition, created_by, updated_by
    ) VALUES (
        $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
        $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25
    )
"#;

/// `created_by` is not touched on conflict.
const UPSERT_RIGHT_CONFLICT: &str = r#"
    ON CONFLICT (sku, scope) DO UPDATE SET
        aggregation_id = EXCLUDED.aggregation_id,
        metric = EXCLUDED.metric,
        num_licenses_acquired = EXCLUDED.num_licenses_acquired,
        num_licences_maintenance = EXCLUDED.num_licences_maintenance,
        avg_unit_price = EXCLUDED.avg_unit_price,
        avg_maintenance_unit_price = EXCLUDED.avg_maintenance_unit_price,
        total_purchase_cost = EXCLUDED.total_purchase_cost,
        total_maintenance_cost = EXCLUDED.total_maintenance_cost,
        total_cost = EXCLUDED.total_cost,
        start_of_maintenance = EXCLUDED.start_of_maintenance,
        end_of_maintenance = EXCLUDED.end_of_maintenance,
        ordering_date = EXCLUDED.ordering_date,
        comment = EXCLUDED.comment,
        corporate_sourcing_contract = EXCLUDED.corporate_sourcing_contract,
        software_provider = EXCLUDED.software_provider,
        last_purchased_order = EXCLUDED.last_purchased_order,
        support_numbers = EXCLUDED.support_numbers,
        maintenance_provider = EXCLUDED.maintenance_provider,
        file_name = EXCLUDED.file_name,
        file_data = EXCLUDED.file_data,
        repartition = EXCLUDED.repartition,
        updated_by = EXCLUDED.updated_by,
        updated_on = now()
"#;

fn bind_right<'q>(
    query: Query<'q, Postgres, PgArguments>,
    right: &'q AggregatedRight,
    file_data: &'q [u8],
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(&right.sku)
        .bind(&right.scope)
        .bind(right.aggregation_id)
        .bind(right.metrics.join())
        .bind(right.num_licenses_acquired)
        .bind(right.num_licences_maintenance)
        .bind(right.avg_unit_price)
        .bind(right.avg_maintenance_unit_price)
        .bind(right.total_purchase_cost)
        .bind(right.total_maintenance_cost)
        .bind(right.total_cost)
        .bind(right.start_of_maintenance)
        .bind(right.end_of_maintenance)
        .bind(right.ordering_date)
        .bind(&right.comment)
        .bind(&right.corporate_sourcing_contract)
        .bind(&right.software_provider)
        .bind(&right.last_purchased_order)
        .bind(&right.support_numbers)
        .bind(&right.maintenance_provider)
        .bind(&right.file_name)
        .bind(file_data)
        .bind(right.repartition)
        .bind(&right.created_by)
        .bind(&right.updated_by)
}

// ── PgAggregatedRightStore ────────────────────────────────────

pub struct PgAggregatedRightStore {
    pool: PgPool,
}

impl PgAggregatedRightStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AggregatedRightStore for PgAggregatedRightStore {
    async fn get_aggregated_right(
        &self,
        sku: &str,
        scope: &str,
    ) -> Result<Option<AggregatedRight>> {
        let row = sqlx::query_as::<_, PgAggregatedRightRow>(
            r#"
            SELECT sku, scope, aggregation_id, metric,
                   num_licenses_acquired, num_licences_maintenance,
                   avg_unit_price, avg_maintenance_unit_price,
                   total_purchase_cost, total_maintenance_cost, total_cost,
                   start_of_maintenance, end_of_maintenance, ordering_date,
                   comment, corporate_sourcing_contract, software_provider,
                   last_purchased_order, support_numbers, maintenance_provider,
                   file_name, repartition, created_by, updated_by
            FROM rights.aggregated_rights
            WHERE sku = $1 AND scope = $2
            "#,
        )
        .bind(sku)
        .bind(scope)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(row.map(Into::into))
    }

    async fn insert_aggregated_right(
        &self,
        right: &AggregatedRight,
        file_data: &[u8],
    ) -> Result<()> {
        bind_right(sqlx::query(INSERT_RIGHT), right, file_data)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(())
    }

    async fn upsert_aggregated_right(
        &self,
        right: &AggregatedRight,
        file_data: &[u8],
    ) -> Result<()> {
        let sql = format!("{INSERT_RIGHT}{UPSERT_RIGHT_CONFLICT}");
        bind_right(sqlx::query(&sql), right, file_data)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(())
    }

    async fn delete_aggregated_right(&self, sku: &str, scope: &str) -> Result<()> {
        sqlx::query("DELETE FROM rights.aggregated_rights WHERE sku = $1 AND scope = $2")
            .bind(sku)
            .bind(scope)
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(())
    }

    async fn get_file_data(&self, sku: &str, scope: &str) -> Result<Option<Vec<u8>>> {
        let row = sqlx::query_as::<_, (Option<Vec<u8>>,)>(
            "SELECT file_data FROM rights.aggregated_rights WHERE sku = $1 AND scope = $2",
        )
        .bind(sku)
        .bind(scope)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(row.and_then(|(data,)| data))
    }
}

// ── PgAggregationStore ────────────────────────────────────────

pub struct PgAggregationStore {
    pool: PgPool,
}

impl PgAggregationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const AGGREGATION_COLUMNS: &str = "id, aggregation_name, scope, product_editor, product_names, \
                                   swidtags, created_by, updated_by";

#[async_trait]
impl AggregationStore for PgAggregationStore {
    async fn get_aggregation_by_id(&self, id: i32, scope: &str) -> Result<Option<Aggregation>> {
        let query = format!(
            "SELECT {AGGREGATION_COLUMNS} FROM rights.aggregations WHERE id = $1 AND scope = $2"
        );
        let row = sqlx::query_as::<_, PgAggregationRow>(&query)
            .bind(id)
            .bind(scope)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(row.map(Into::into))
    }

    async fn get_aggregation_by_name(
        &self,
        name: &str,
        scope: &str,
    ) -> Result<Option<Aggregation>> {
        let query = format!(
            "SELECT {AGGREGATION_COLUMNS} FROM rights.aggregations \
             WHERE aggregation_name = $1 AND scope = $2"
        );
        let row = sqlx::query_as::<_, PgAggregationRow>(&query)
            .bind(name)
            .bind(scope)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(row.map(Into::into))
    }

    async fn insert_aggregation(&self, aggregation: &NewAggregation) -> Result<i32> {
        let (id,) = sqlx::query_as::<_, (i32,)>(
            r#"
            INSERT INTO rights.aggregations (
                aggregation_name, scope, product_editor, product_names, swidtags, created_by
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&aggregation.name)
        .bind(&aggregation.scope)
        .bind(&aggregation.product_editor)
        .bind(&aggregation.product_names)
        .bind(&aggregation.swidtags)
        .bind(&aggregation.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error)?;
        Ok(id)
    }

    async fn update_aggregation(&self, aggregation: &Aggregation) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE rights.aggregations
            SET aggregation_name = $3,
                product_editor = $4,
                product_names = $5,
                swidtags = $6,
                updated_by = $7,
                updated_on = now()
            WHERE id = $1 AND scope = $2
            "#,
        )
        .bind(aggregation.id)
        .bind(&aggregation.scope)
        .bind(&aggregation.name)
        .bind(&aggregation.product_editor)
        .bind(&aggregation.product_names)
        .bind(&aggregation.swidtags)
        .bind(&aggregation.updated_by)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;
        Ok(())
    }

    async fn delete_aggregation(&self, id: i32, scope: &str) -> Result<()> {
        sqlx::query("DELETE FROM rights.aggregations WHERE id = $1 AND scope = $2")
            .bind(id)
            .bind(scope)
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(())
    }

    async fn list_available_products(
        &self,
        editor: &str,
        scope: &str,
    ) -> Result<Vec<AggregationProduct>> {
        let rows = sqlx::query_as::<_, PgAggregationProductRow>(
            r#"
            SELECT p.swidtag, p.product_name, p.product_editor, p.product_version
            FROM rights.products p
            WHERE p.scope = $2
              AND p.product_editor = $1
              AND NOT EXISTS (
                  SELECT 1 FROM rights.aggregations a
                  WHERE a.scope = $2 AND p.swidtag = ANY(a.swidtags)
              )
            UNION
            SELECT q.swidtag, q.product_name, q.product_editor, q.version AS product_version
            FROM rights.acqrights q
            WHERE q.scope = $2
              AND q.product_editor = $1
              AND NOT EXISTS (
                  SELECT 1 FROM rights.aggregations a
                  WHERE a.scope = $2 AND q.swidtag = ANY(a.swidtags)
              )
              AND NOT EXISTS (
                  SELECT 1 FROM rights.products p2
                  WHERE p2.scope = $2 AND p2.swidtag = q.swidtag
              )
            ORDER BY swidtag
            "#,
        )
        .bind(editor)
        .bind(scope)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_selected_products(
        &self,
        id: i32,
        scope: &str,
    ) -> Result<Vec<AggregationProduct>> {
        let rows = sqlx::query_as::<_, PgAggregationProductRow>(
            r#"
            SELECT s.swidtag,
                   COALESCE(p.product_name, '') AS product_name,
                   a.product_editor,
                   COALESCE(p.product_version, '') AS product_version
            FROM rights.aggregations a
            CROSS JOIN LATERAL unnest(a.swidtags) AS s(swidtag)
            LEFT JOIN rights.products p ON p.scope = a.scope AND p.swidtag = s.swidtag
            WHERE a.id = $1 AND a.scope = $2
            "#,
        )
        .bind(id)
        .bind(scope)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// ── PgProductStore ────────────────────────────────────────────

pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ACQRIGHT_COLUMNS: &str = "sku, scope, swidtag, product_name, product_editor, version, metric, \
                                num_licenses_acquired, num_licences_maintenance, avg_unit_price, \
                                avg_maintenance_unit_price, created_by";

#[async_trait]
impl ProductStore for PgProductStore {
    async fn acqright_exists(&self, sku: &str, scope: &str) -> Result<bool> {
        let (exists,) = sqlx::query_as::<_, (bool,)>(
            "SELECT EXISTS(SELECT 1 FROM rights.acqrights WHERE sku = $1 AND scope = $2)",
        )
        .bind(sku)
        .bind(scope)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(exists)
    }

    async fn get_product(&self, swidtag: &str, scope: &str) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, PgProductRow>(
            r#"
            SELECT swidtag, scope, product_name, product_editor, product_version, created_by
            FROM rights.products
            WHERE swidtag = $1 AND scope = $2
            "#,
        )
        .bind(swidtag)
        .bind(scope)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(row.map(Into::into))
    }

    async fn upsert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO rights.products (
                swidtag, scope, product_name, product_editor, product_version, created_by
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (swidtag, scope) DO UPDATE SET
                product_name = EXCLUDED.product_name,
                product_editor = EXCLUDED.product_editor,
                product_version = EXCLUDED.product_version
            "#,
        )
        .bind(&product.swidtag)
        .bind(&product.scope)
        .bind(&product.name)
        .bind(&product.editor)
        .bind(&product.version)
        .bind(&product.created_by)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;
        Ok(())
    }

    async fn get_acqright_by_swidtag(
        &self,
        swidtag: &str,
        scope: &str,
    ) -> Result<Option<AcqRight>> {
        let query = format!(
            "SELECT {ACQRIGHT_COLUMNS} FROM rights.acqrights \
             WHERE swidtag = $1 AND scope = $2 ORDER BY sku LIMIT 1"
        );
        let row = sqlx::query_as::<_, PgAcqRightRow>(&query)
            .bind(swidtag)
            .bind(scope)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(row.map(Into::into))
    }

    async fn upsert_acqright(&self, acqright: &AcqRight) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO rights.acqrights (
                sku, scope, swidtag, product_name, product_editor, version, metric,
                num_licenses_acquired, num_licences_maintenance,
                avg_unit_price, avg_maintenance_unit_price, created_by
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (sku, scope) DO NOTHING
            "#,
        )
        .bind(&acqright.sku)
        .bind(&acqright.scope)
        .bind(&acqright.swidtag)
        .bind(&acqright.product_name)
        .bind(&acqright.product_editor)
        .bind(&acqright.version)
        .bind(acqright.metrics.join())
        .bind(acqright.num_licenses_acquired)
        .bind(acqright.num_licences_maintenance)
        .bind(acqright.avg_unit_price)
        .bind(acqright.avg_maintenance_unit_price)
        .bind(&acqright.created_by)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;
        Ok(())
    }
}

// ── PgLicenseLedger ───────────────────────────────────────────

pub struct PgLicenseLedger {
    pool: PgPool,
}

impl PgLicenseLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LicenseLedger for PgLicenseLedger {
    async fn license_summary(&self, sku: &str, scope: &str) -> Result<LicenseSummary> {
        let acquired = sqlx::query_as::<_, (i32,)>(
            "SELECT num_licenses_acquired FROM rights.aggregated_rights WHERE sku = $1 AND scope = $2",
        )
        .bind(sku)
        .bind(scope)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?
        .map(|(n,)| n)
        .unwrap_or(0);

        let rows = sqlx::query_as::<_, (String, i32)>(
            r#"
            SELECT sharing_scope, shared_licences
            FROM rights.shared_licenses
            WHERE sku = $1 AND scope = $2
            ORDER BY sharing_scope
            "#,
        )
        .bind(sku)
        .bind(scope)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        let shares: Vec<ScopeShare> = rows
            .into_iter()
            .map(|(scope, shared_licenses)| ScopeShare {
                scope,
                shared_licenses,
            })
            .collect();
        let total_shared_licenses: i32 = shares.iter().map(|s| s.shared_licenses).sum();
        Ok(LicenseSummary {
            available_licenses: acquired - total_shared_licenses,
            total_shared_licenses,
            shares,
        })
    }

    async fn upsert_share(&self, share: &LicenseShare) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;

        sqlx::query(
            r#"
            INSERT INTO rights.shared_licenses (sku, scope, sharing_scope, shared_licences, updated_by)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (sku, scope, sharing_scope) DO UPDATE SET
                shared_licences = EXCLUDED.shared_licences,
                updated_by = EXCLUDED.updated_by,
                updated_on = now()
            "#,
        )
        .bind(&share.sku)
        .bind(&share.owner_scope)
        .bind(&share.recipient_scope)
        .bind(share.shared_licenses)
        .bind(&share.updated_by)
        .execute(&mut *tx)
        .await
        .map_err(|e| anyhow!(e))?;

        sqlx::query(
            r#"
            INSERT INTO rights.received_licenses (sku, scope, sharing_scope, received_licences, updated_by)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (sku, scope, sharing_scope) DO UPDATE SET
                received_licences = EXCLUDED.received_licences,
                updated_by = EXCLUDED.updated_by,
                updated_on = now()
            "#,
        )
        .bind(&share.sku)
        .bind(&share.recipient_scope)
        .bind(&share.owner_scope)
        .bind(share.shared_licenses)
        .bind(&share.updated_by)
        .execute(&mut *tx)
        .await
        .map_err(|e| anyhow!(e))?;

        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(())
    }
}

// ── PgJobQueue ────────────────────────────────────────────────

pub struct PgJobQueue {
    pool: PgPool,
}

impl PgJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn push_job(&self, job: &Job) -> Result<i64> {
        let (job_id,) = sqlx::query_as::<_, (i64,)>(
            r#"
            INSERT INTO rights.jobs (queue, job_type, status, data)
            VALUES ($1, $2, $3, $4)
            RETURNING job_id
            "#,
        )
        .bind(&job.queue)
        .bind(&job.job_type)
        .bind(job.status.as_str())
        .bind(&job.data)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(job_id)
    }
}
