//! Common test utilities
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::util::ServiceExt;

use erp_ledger::{api, db, InMemoryLedgerStore, PgLedgerStore};

/// Full application router over a fresh in-memory ledger
pub fn memory_app() -> Router {
    api::build_router(Arc::new(InMemoryLedgerStore::new()))
}

/// Send one request and return the status with the parsed JSON body
/// (`Value::Null` for empty bodies).
pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(json) => builder.body(Body::from(json.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Decimal fields are serialized as strings
pub fn decimal(value: &Value) -> rust_decimal::Decimal {
    value
        .as_str()
        .unwrap_or_else(|| panic!("expected decimal string, got {}", value))
        .parse()
        .unwrap()
}

/// Connect to the test database, or `None` when `DATABASE_URL` is unset.
///
/// Tests share the database and run in parallel, so nothing is truncated;
/// use [`unique_code`] for account codes.
pub async fn setup_test_db() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").ok()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    if !db::check_schema(&pool).await.expect("Failed to inspect schema") {
        db::run_migrations(&pool).await.expect("Failed to run migrations");
    }

    Some(pool)
}

pub async fn pg_store() -> Option<PgLedgerStore> {
    setup_test_db().await.map(PgLedgerStore::new)
}

/// Account or entry code that cannot collide across test runs
pub fn unique_code(prefix: &str) -> String {
    format!("{}-{}", prefix, &uuid::Uuid::new_v4().simple().to_string()[..12])
}
