use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use casper_server::config::DatabaseConfig;
use casper_server::{app, open_stores, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt; // for oneshot

fn test_app() -> (Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("casper.db").to_str().unwrap().to_string();
    let db = DatabaseConfig {
        read_connection: path.clone(),
        write_connection: path,
        ..DatabaseConfig::default()
    };
    let stores = open_stores(&db).unwrap();
    (app(AppState::new(stores).unwrap()), dir)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn health_check_returns_ok() {
    let (app, _dir) = test_app();
    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn customer_lifecycle() {
    let (app, _dir) = test_app();

    let (status, created) = call(
        &app,
        "POST",
        "/api/v1/customers",
        Some(json!({ "name": "Ann", "email": "ann@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "Ann");
    assert_eq!(created["version"], 1);
    let id = created["id"].as_i64().unwrap();

    let (status, fetched) = call(&app, "GET", &format!("/api/v1/customers/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, renamed) = call(
        &app,
        "PUT",
        &format!("/api/v1/customers/{id}"),
        Some(json!({ "name": "Anne", "expectedVersion": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["name"], "Anne");
    assert_eq!(renamed["version"], 2);

    let (status, _) = call(
        &app,
        "DELETE",
        &format!("/api/v1/customers/{id}?version=2"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = call(&app, "GET", &format!("/api/v1/customers/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("customer"));
}

#[tokio::test]
async fn list_uses_camel_case_query() {
    let (app, _dir) = test_app();
    for name in ["Ann", "Bob", "Andy"] {
        let (status, _) = call(
            &app,
            "POST",
            "/api/v1/customers",
            Some(json!({ "name": name })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = call(&app, "GET", "/api/v1/customers?namePrefix=An&limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Ann", "Andy"]);
}

#[tokio::test]
async fn validation_failure_is_bad_request() {
    let (app, _dir) = test_app();
    let (status, body) = call(
        &app,
        "POST",
        "/api/v1/customers",
        Some(json!({ "name": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = call(&app, "GET", "/api/v1/customers?limit=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_email_is_conflict() {
    let (app, _dir) = test_app();
    let body = json!({ "name": "Ann", "email": "ann@example.com" });

    let (status, _) = call(&app, "POST", "/api/v1/customers", Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = call(&app, "POST", "/api/v1/customers", Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn stale_version_is_conflict() {
    let (app, _dir) = test_app();
    let (_, created) = call(
        &app,
        "POST",
        "/api/v1/customers",
        Some(json!({ "name": "Ann" })),
    )
    .await;
    let id = created["id"].as_i64().unwrap();

    let (status, _) = call(
        &app,
        "PUT",
        &format!("/api/v1/customers/{id}"),
        Some(json!({ "name": "Anne", "expectedVersion": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &app,
        "DELETE",
        &format!("/api/v1/customers/{id}?version=5"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, fetched) = call(&app, "GET", &format!("/api/v1/customers/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "Ann");
}

#[test]
fn missing_read_store_fails_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let db = DatabaseConfig {
        read_connection: dir.path().join("replcia.db").to_str().unwrap().to_string(),
        write_connection: dir.path().join("primary.db").to_str().unwrap().to_string(),
        pool_max_size: 1,
        acquire_timeout_ms: 200,
        ..DatabaseConfig::default()
    };

    assert!(open_stores(&db).is_err());
    assert!(!dir.path().join("replcia.db").exists());
}
