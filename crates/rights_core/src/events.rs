//! Change events pushed to the aggregation worker queue.
//!
//! Every successful mutation publishes one typed envelope. Publishing is best
//! effort: serialization and enqueue failures are logged and counted, never
//! returned to the workflow that triggered them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ports::JobQueue;

/// Queue (and job type) consumed by the downstream graph-indexing worker.
pub const AGGREGATION_WORKER_QUEUE: &str = "aw";

// ── Envelope ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    UpsertAggregatedRights,
    DeleteAggregatedRights,
    UpsertAggregation,
    DeleteAggregation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "Type")]
    pub message_type: MessageType,
    #[serde(rename = "JSON")]
    pub json: serde_json::Value,
}

// ── Payloads ──────────────────────────────────────────────────

/// Field names follow what the worker decodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertAggregatedRightPayload {
    pub sku: String,
    #[serde(rename = "aggregationID")]
    pub aggregation_id: i32,
    /// Comma-joined metric names.
    pub metric: String,
    pub start_of_maintenance: String,
    pub end_of_maintenance: String,
    pub num_licenses_acquired: i32,
    pub avg_unit_price: f64,
    pub avg_maintenance_unit_price: f64,
    pub total_purchase_cost: f64,
    pub total_maintenance_cost: f64,
    pub total_cost: f64,
    pub scope: String,
    pub num_licences_maintenance: i32,
    #[serde(rename = "orderingDate")]
    pub ordering_date: String,
    #[serde(rename = "corporateSourcingContract")]
    pub corporate_sourcing_contract: String,
    #[serde(rename = "softwareProvider")]
    pub software_provider: String,
    #[serde(rename = "lastPurchasedOrder")]
    pub last_purchased_order: String,
    /// Comma-joined support numbers.
    #[serde(rename = "supportNumber")]
    pub support_number: String,
    #[serde(rename = "maintenanceProvider")]
    pub maintenance_provider: String,
    pub repartition: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAggregatedRightPayload {
    pub sku: String,
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertAggregationPayload {
    pub id: i32,
    pub name: String,
    pub swidtags: Vec<String>,
    pub product_names: Vec<String>,
    pub product_editor: String,
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAggregationPayload {
    pub id: i32,
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    UpsertAggregatedRight(UpsertAggregatedRightPayload),
    DeleteAggregatedRight(DeleteAggregatedRightPayload),
    UpsertAggregation(UpsertAggregationPayload),
    DeleteAggregation(DeleteAggregationPayload),
}

impl ChangeEvent {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::UpsertAggregatedRight(_) => MessageType::UpsertAggregatedRights,
            Self::DeleteAggregatedRight(_) => MessageType::DeleteAggregatedRights,
            Self::UpsertAggregation(_) => MessageType::UpsertAggregation,
            Self::DeleteAggregation(_) => MessageType::DeleteAggregation,
        }
    }

    pub fn payload_json(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::UpsertAggregatedRight(p) => serde_json::to_value(p),
            Self::DeleteAggregatedRight(p) => serde_json::to_value(p),
            Self::UpsertAggregation(p) => serde_json::to_value(p),
            Self::DeleteAggregation(p) => serde_json::to_value(p),
        }
    }

    /// Scope the event belongs to, for log context.
    pub fn scope(&self) -> &str {
        match self {
            Self::UpsertAggregatedRight(p) => &p.scope,
            Self::DeleteAggregatedRight(p) => &p.scope,
            Self::UpsertAggregation(p) => &p.scope,
            Self::DeleteAggregation(p) => &p.scope,
        }
    }
}

// ── Job ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub queue: String,
    pub job_type: String,
    pub status: JobStatus,
    /// Serialized [`Envelope`].
    pub data: Vec<u8>,
}

impl Job {
    /// Build the job for `message_type` from a payload that may have failed to
    /// serialize. A failed payload becomes JSON `null`; the job is still built.
    pub fn from_payload(
        message_type: MessageType,
        payload: serde_json::Result<serde_json::Value>,
    ) -> Self {
        let json = payload.unwrap_or_else(|e| {
            tracing::error!(?message_type, error = %e, "failed to serialize event payload");
            serde_json::Value::Null
        });
        let envelope = Envelope { message_type, json };
        let data = serde_json::to_vec(&envelope).unwrap_or_else(|e| {
            tracing::error!(?message_type, error = %e, "failed to serialize event envelope");
            Vec::new()
        });
        Self {
            queue: AGGREGATION_WORKER_QUEUE.to_string(),
            job_type: AGGREGATION_WORKER_QUEUE.to_string(),
            status: JobStatus::Pending,
            data,
        }
    }

    pub fn envelope(&self) -> serde_json::Result<Envelope> {
        serde_json::from_slice(&self.data)
    }
}

// ── Publisher ─────────────────────────────────────────────────

/// Counts of publish attempts since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublisherStats {
    pub published: u64,
    pub failed: u64,
}

pub struct EventPublisher {
    queue: Arc<dyn JobQueue>,
    published: AtomicU64,
    failed: AtomicU64,
}

impl EventPublisher {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self {
            queue,
            published: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Push `event` onto the worker queue. Returns the job id when the push succeeded.
    pub async fn publish(&self, event: &ChangeEvent) -> Option<i64> {
        let job = Job::from_payload(event.message_type(), event.payload_json());
        self.push(event.message_type(), event.scope(), &job).await
    }

    async fn push(&self, message_type: MessageType, scope: &str, job: &Job) -> Option<i64> {
        match self.queue.push_job(job).await {
            Ok(id) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                tracing::info!(job_id = id, ?message_type, scope, "change event queued");
                Some(id)
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(?message_type, scope, error = %e, "failed to push change event");
                None
            }
        }
    }

    pub fn stats(&self) -> PublisherStats {
        PublisherStats {
            published: self.published.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStores;

    fn delete_right(sku: &str) -> ChangeEvent {
        ChangeEvent::DeleteAggregatedRight(DeleteAggregatedRightPayload {
            sku: sku.into(),
            scope: "s1".into(),
        })
    }

    #[test]
    fn envelope_wire_names() {
        let job = Job::from_payload(
            MessageType::DeleteAggregatedRights,
            delete_right("sku1").payload_json(),
        );
        let raw: serde_json::Value = serde_json::from_slice(&job.data).unwrap();
        assert_eq!(raw["Type"], "DeleteAggregatedRights");
        assert_eq!(raw["JSON"]["sku"], "sku1");
        assert_eq!(raw["JSON"]["scope"], "s1");
        assert_eq!(job.queue, "aw");
        assert_eq!(job.job_type, "aw");
        assert_eq!(job.status.as_str(), "pending");
    }

    #[test]
    fn upsert_right_payload_uses_worker_field_names() {
        let payload = UpsertAggregatedRightPayload {
            sku: "aggsku".into(),
            aggregation_id: 1,
            metric: "met1,met2".into(),
            start_of_maintenance: String::new(),
            end_of_maintenance: String::new(),
            num_licenses_acquired: 10,
            avg_unit_price: 2.0,
            avg_maintenance_unit_price: 0.0,
            total_purchase_cost: 20.0,
            total_maintenance_cost: 0.0,
            total_cost: 20.0,
            scope: "s1".into(),
            num_licences_maintenance: 0,
            ordering_date: String::new(),
            corporate_sourcing_contract: "csc".into(),
            software_provider: String::new(),
            last_purchased_order: String::new(),
            support_number: "a,b".into(),
            maintenance_provider: String::new(),
            repartition: true,
        };
        let v = serde_json::to_value(&payload).unwrap();
        assert_eq!(v["aggregationID"], 1);
        assert_eq!(v["corporateSourcingContract"], "csc");
        assert_eq!(v["supportNumber"], "a,b");
        assert_eq!(v["metric"], "met1,met2");
        assert!(v.get("file_data").is_none());
    }

    #[test]
    fn failed_payload_still_builds_job() {
        let broken = serde_json::from_str::<serde_json::Value>("{");
        assert!(broken.is_err());
        let job = Job::from_payload(MessageType::DeleteAggregatedRights, broken);
        let envelope = job.envelope().unwrap();
        assert_eq!(envelope.message_type, MessageType::DeleteAggregatedRights);
        assert!(envelope.json.is_null());
    }

    #[tokio::test]
    async fn publish_records_job_and_counts() {
        let stores = InMemoryStores::new();
        let publisher = EventPublisher::new(Arc::new(stores.clone()));
        let id = publisher.publish(&delete_right("sku1")).await;
        assert!(id.is_some());
        assert_eq!(stores.jobs().await.len(), 1);
        assert_eq!(
            publisher.stats(),
            PublisherStats {
                published: 1,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn push_failure_is_swallowed() {
        let stores = InMemoryStores::new();
        stores.state().await.fail_job_push = true;
        let publisher = EventPublisher::new(Arc::new(stores.clone()));
        assert_eq!(publisher.publish(&delete_right("sku1")).await, None);
        assert_eq!(publisher.stats().failed, 1);
        assert!(stores.jobs().await.is_empty());
    }
}
