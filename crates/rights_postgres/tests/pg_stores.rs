//! Postgres adapter tests.
//!
//! Requires a running PostgreSQL database.
//! Run with: DATABASE_URL="postgresql:///rights_test" cargo test -p rights_postgres -- --ignored

use rights_core::error::RightsError;
use rights_core::events::{ChangeEvent, DeleteAggregatedRightPayload, Job};
use rights_core::ports::{AggregatedRightStore, AggregationStore, JobQueue, LicenseLedger};
use rights_core::types::{AggregatedRight, LicenseShare, MetricNames, NewAggregation};
use rights_postgres::{apply_schema, PgStores};
use sqlx::postgres::PgPoolOptions;
use rust_decimal::Decimal;
use sqlx::PgPool;

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("connect");
    apply_schema(&pool).await.expect("schema");
    pool
}

/// Scope name unique to this run so tests do not see each other's rows.
fn scope(tag: &str) -> String {
    format!(
        "{tag}-{}",
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    )
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn share_writes_both_ledgers() {
    let pool = pool().await;
    let stores = PgStores::new(pool.clone());
    let owner = scope("owner");
    let recipient = scope("recv");

    let share = LicenseShare {
        sku: "pg-sku".into(),
        owner_scope: owner.clone(),
        recipient_scope: recipient.clone(),
        shared_licenses: 3,
        updated_by: "test".into(),
    };
    stores.ledger.upsert_share(&share).await.unwrap();
    stores
        .ledger
        .upsert_share(&LicenseShare {
            shared_licenses: 5,
            ..share
        })
        .await
        .unwrap();

    let summary = stores.ledger.license_summary("pg-sku", &owner).await.unwrap();
    assert_eq!(summary.total_shared_licenses, 5);
    assert_eq!(summary.share_for(&recipient), 5);

    let (received,) = sqlx::query_as::<_, (i32,)>(
        "SELECT received_licences FROM rights.received_licenses WHERE sku = $1 AND scope = $2 AND sharing_scope = $3",
    )
    .bind("pg-sku")
    .bind(&recipient)
    .bind(&owner)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(received, 5);
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn duplicate_aggregation_name_is_conflict() {
    let pool = pool().await;
    let stores = PgStores::new(pool);
    let s = scope("agg");
    let new = NewAggregation {
        name: "dup".into(),
        scope: s.clone(),
        product_editor: "oracle".into(),
        product_names: vec![],
        swidtags: vec![],
        created_by: "test".into(),
    };
    let id = stores.aggregations.insert_aggregation(&new).await.unwrap();
    assert!(stores
        .aggregations
        .get_aggregation_by_id(id, &s)
        .await
        .unwrap()
        .is_some());
    let err = stores.aggregations.insert_aggregation(&new).await.unwrap_err();
    assert!(matches!(err, RightsError::Conflict(_)));
}

fn right(sku: &str, scope: &str, licenses: i32, created_by: &str) -> AggregatedRight {
    AggregatedRight {
        sku: sku.into(),
        aggregation_id: 1,
        scope: scope.into(),
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
        support_numbers: vec![],
        maintenance_provider: String::new(),
        file_name: String::new(),
        repartition: false,
        created_by: created_by.into(),
        updated_by: None,
    }
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn duplicate_aggregated_right_insert_is_conflict() {
    let pool = pool().await;
    let stores = PgStores::new(pool);
    let s = scope("right");

    stores
        .rights
        .insert_aggregated_right(&right("pg-sku", &s, 10, "first"), b"a")
        .await
        .unwrap();
    let err = stores
        .rights
        .insert_aggregated_right(&right("pg-sku", &s, 99, "second"), b"b")
        .await
        .unwrap_err();
    assert!(matches!(err, RightsError::Conflict(_)));

    let kept = stores
        .rights
        .get_aggregated_right("pg-sku", &s)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(kept.num_licenses_acquired, 10);
    assert_eq!(kept.created_by, "first");

    // The update path still replaces in place and keeps the creator.
    stores
        .rights
        .upsert_aggregated_right(&right("pg-sku", &s, 20, "second"), b"c")
        .await
        .unwrap();
    let updated = stores
        .rights
        .get_aggregated_right("pg-sku", &s)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.num_licenses_acquired, 20);
    assert_eq!(updated.created_by, "first");
    assert_eq!(
        stores.rights.get_file_data("pg-sku", &s).await.unwrap().unwrap(),
        b"c"
    );
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn push_job_returns_increasing_ids() {
    let pool = pool().await;
    let stores = PgStores::new(pool);
    let event = ChangeEvent::DeleteAggregatedRight(DeleteAggregatedRightPayload {
        sku: "pg-sku".into(),
        scope: scope("jobs"),
    });
    let job = Job::from_payload(event.message_type(), event.payload_json());
    let first = stores.jobs.push_job(&job).await.unwrap();
    let second = stores.jobs.push_job(&job).await.unwrap();
    assert!(second > first);
}
