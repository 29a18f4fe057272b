//! HTTP-level tests for the aggregated rights server.
//!
//! Drive the full router (JWT middleware, handlers, error mapping) against the
//! in-memory adapters, so no database is needed.

use std::sync::Arc;

use axum::body::Body;
use http_body_util::BodyExt;
use hyper::{Request, StatusCode};
use jsonwebtoken::{encode, EncodingKey, Header};
use rights_core::memory::InMemoryStores;
use rights_core::types::{AggregatedRightRequest, Aggregation};
use rights_core::RightsService;
use rights_server::middleware::jwt::JwtConfig;
use rights_server::router::build_router;
use serde::Serialize;
use serde_json::{json, Value};
use tower::ServiceExt;

// ── Test JWT helpers ───────────────────────────────────────────

const TEST_JWT_SECRET: &[u8] = b"test-secret-for-http-tests";

#[derive(Debug, Serialize)]
struct TestClaims {
    sub: String,
    scopes: Vec<String>,
}

fn make_jwt(user: &str, scopes: &[&str]) -> String {
    let claims = TestClaims {
        sub: user.into(),
        scopes: scopes.iter().map(|s| s.to_string()).collect(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET),
    )
    .expect("failed to encode test JWT")
}

fn admin_jwt() -> String {
    make_jwt("admin@test.com", &["s1", "s2"])
}

// ── Test app builder ───────────────────────────────────────────

async fn seeded() -> InMemoryStores {
    let stores = InMemoryStores::new();
    {
        let mut s = stores.state().await;
        s.add_metric("s1", "met1");
        s.add_product("s1", "sw1", "db", "oracle");
        s.add_product("s1", "sw2", "weblogic", "oracle");
        s.add_aggregation(Aggregation {
            id: 1,
            name: "agg1".into(),
            scope: "s1".into(),
            product_editor: "oracle".into(),
            product_names: vec!["db".into()],
            swidtags: vec!["sw1".into()],
            created_by: "seed".into(),
            updated_by: None,
        });
    }
    stores
}

fn app(stores: &InMemoryStores) -> axum::Router {
    let service: Arc<dyn RightsService> = Arc::new(stores.service());
    build_router(service, JwtConfig::from_secret(TEST_JWT_SECRET))
}

fn right_body() -> AggregatedRightRequest {
    AggregatedRightRequest {
        sku: "aggsku".into(),
        aggregation_id: 1,
        scope: "s1".into(),
        metrics: vec!["met1".into()],
        num_licenses_acquired: 10,
        avg_unit_price: 2.0,
        num_licences_maintenance: 2,
        avg_maintenance_unit_price: 2.0,
        start_of_maintenance: "2020-01-01T10:58:56Z".into(),
        end_of_maintenance: "2023-01-01T05:40:56Z".into(),
        file_name: "contract.pdf".into(),
        file_data: vec![1, 2, 3],
        ..Default::default()
    }
}

async fn send(
    app: axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        builder = builder.header("authorization", format!("Bearer {t}"));
    }
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&b).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn create_right(stores: &InMemoryStores) {
    let (status, body) = send(
        app(stores),
        "POST",
        "/aggregated-rights",
        Some(&admin_jwt()),
        Some(serde_json::to_value(right_body()).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create failed: {body}");
}

// ── Authentication ─────────────────────────────────────────────

#[tokio::test]
async fn health_is_public() {
    let stores = seeded().await;
    let (status, body) = send(app(&stores), "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["events"]["published"], 0);
}

#[tokio::test]
async fn missing_token_is_401() {
    let stores = seeded().await;
    let (status, body) = send(
        app(&stores),
        "POST",
        "/aggregated-rights",
        None,
        Some(serde_json::to_value(right_body()).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");
    assert!(stores.state().await.aggregated_rights.is_empty());
}

#[tokio::test]
async fn token_signed_with_other_secret_is_401() {
    let stores = seeded().await;
    let forged = encode(
        &Header::default(),
        &TestClaims {
            sub: "admin@test.com".into(),
            scopes: vec!["s1".into()],
        },
        &EncodingKey::from_secret(b"not-the-secret"),
    )
    .unwrap();
    let (status, _) = send(
        app(&stores),
        "DELETE",
        "/aggregated-rights/aggsku?scope=s1",
        Some(&forged),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn scope_outside_claims_is_403() {
    let stores = seeded().await;
    let outsider = make_jwt("u@test.com", &["s9"]);
    let (status, body) = send(
        app(&stores),
        "POST",
        "/aggregated-rights",
        Some(&outsider),
        Some(serde_json::to_value(right_body()).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "ScopeValidationError");
    assert!(stores.jobs().await.is_empty());
}

// ── Aggregated rights ──────────────────────────────────────────

#[tokio::test]
async fn create_then_duplicate_is_400() {
    let stores = seeded().await;
    create_right(&stores).await;
    assert!(stores.state().await.right("aggsku", "s1").is_some());
    assert_eq!(stores.jobs().await.len(), 1);

    let (status, body) = send(
        app(&stores),
        "POST",
        "/aggregated-rights",
        Some(&admin_jwt()),
        Some(serde_json::to_value(right_body()).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"code": "INVALID_ARGUMENT", "message": "sku already exists"})
    );
}

#[tokio::test]
async fn update_with_mismatched_sku_is_400() {
    let stores = seeded().await;
    create_right(&stores).await;
    let mut req = right_body();
    req.sku = "renamed".into();
    let (status, body) = send(
        app(&stores),
        "PUT",
        "/aggregated-rights/aggsku",
        Some(&admin_jwt()),
        Some(serde_json::to_value(req).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "sku cannot be updated");
}

#[tokio::test]
async fn update_records_updater() {
    let stores = seeded().await;
    create_right(&stores).await;
    let mut req = right_body();
    req.num_licenses_acquired = 12;
    let (status, body) = send(
        app(&stores),
        "PUT",
        "/aggregated-rights/aggsku",
        Some(&make_jwt("editor@test.com", &["s1"])),
        Some(serde_json::to_value(req).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body, json!({"success": true}));

    let state = stores.state().await;
    let right = state.right("aggsku", "s1").unwrap();
    assert_eq!(right.num_licenses_acquired, 12);
    assert_eq!(right.created_by, "admin@test.com");
    assert_eq!(right.updated_by.as_deref(), Some("editor@test.com"));
}

#[tokio::test]
async fn download_returns_file() {
    let stores = seeded().await;
    create_right(&stores).await;
    let (status, body) = send(
        app(&stores),
        "GET",
        "/aggregated-rights/aggsku/file?scope=s1",
        Some(&admin_jwt()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["file_name"], "contract.pdf");
    assert_eq!(body["file_data"], "AQID");
}

#[tokio::test]
async fn delete_removes_right() {
    let stores = seeded().await;
    create_right(&stores).await;
    let (status, _) = send(
        app(&stores),
        "DELETE",
        "/aggregated-rights/aggsku?scope=s1",
        Some(&admin_jwt()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(stores.state().await.right("aggsku", "s1").is_none());
    assert_eq!(stores.jobs().await.len(), 2);
}

// ── Sharing ────────────────────────────────────────────────────

#[tokio::test]
async fn share_provisions_receiver() {
    let stores = seeded().await;
    create_right(&stores).await;
    let (status, body) = send(
        app(&stores),
        "PUT",
        "/aggregated-rights/aggsku/shared-licenses",
        Some(&admin_jwt()),
        Some(json!({
            "scope": "s1",
            "lines": [{"recipient_scope": "s2", "shared_licenses": 4}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let state = stores.state().await;
    assert_eq!(state.share("aggsku", "s1", "s2"), Some(4));
    assert_eq!(state.right("aggsku", "s2").unwrap().num_licenses_acquired, 0);
}

#[tokio::test]
async fn over_share_is_400_and_writes_nothing() {
    let stores = seeded().await;
    create_right(&stores).await;
    let (status, body) = send(
        app(&stores),
        "PUT",
        "/aggregated-rights/aggsku/shared-licenses",
        Some(&admin_jwt()),
        Some(json!({
            "scope": "s1",
            "lines": [{"recipient_scope": "s2", "shared_licenses": 11}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "LicencesNotAvailable");
    assert!(stores.state().await.shared.is_empty());
}

// ── Aggregations ───────────────────────────────────────────────

#[tokio::test]
async fn aggregation_create_update_delete() {
    let stores = seeded().await;
    let (status, created) = send(
        app(&stores),
        "POST",
        "/aggregations",
        Some(&admin_jwt()),
        Some(json!({
            "name": "middleware",
            "scope": "s1",
            "product_editor": "oracle",
            "product_names": ["weblogic"],
            "swidtags": ["sw2"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{created}");
    assert_eq!(created["success"], true);
    let id = created["id"].as_i64().unwrap();

    let (status, body) = send(
        app(&stores),
        "PUT",
        &format!("/aggregations/{id}"),
        Some(&admin_jwt()),
        Some(json!({
            "name": "middleware-renamed",
            "scope": "s1",
            "product_editor": "oracle",
            "product_names": ["weblogic"],
            "swidtags": ["sw2"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(stores
        .state()
        .await
        .aggregation_named("middleware-renamed", "s1")
        .is_some());

    let (status, _) = send(
        app(&stores),
        "DELETE",
        &format!("/aggregations/{id}?scope=s1"),
        Some(&admin_jwt()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(stores
        .state()
        .await
        .aggregation_named("middleware-renamed", "s1")
        .is_none());
}

#[tokio::test]
async fn aggregation_claiming_used_product_is_400() {
    let stores = seeded().await;
    let (status, body) = send(
        app(&stores),
        "POST",
        "/aggregations",
        Some(&admin_jwt()),
        Some(json!({
            "name": "dup-products",
            "scope": "s1",
            "product_editor": "oracle",
            "product_names": ["db"],
            "swidtags": ["sw1"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");
}
