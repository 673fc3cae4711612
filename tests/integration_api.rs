//! API Integration Tests
//!
//! Drive the full router, middleware included, over the in-memory store.

use axum::http::StatusCode;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

mod common;

use common::{decimal, memory_app, send};

async fn create_account(app: &axum::Router, code: &str, name: &str, account_type: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/accounts",
        Some(json!({"code": code, "name": name, "type": account_type})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "account {} creation failed: {}", code, body);
    body["id"].as_str().unwrap().to_string()
}

fn entry(date: &str, debit: &str, credit: &str, amount: &str) -> Value {
    json!({
        "date": date,
        "lines": [
            {"account_id": debit, "amount": amount, "type": "debit"},
            {"account_id": credit, "amount": amount, "type": "credit"}
        ]
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = memory_app();
    let response = tower::util::ServiceExt::oneshot(
        app,
        axum::http::Request::builder()
            .uri("/health")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_posting_and_reports_e2e() {
    let app = memory_app();
    let cash = create_account(&app, "1000", "Cash", "asset").await;
    let capital = create_account(&app, "3000", "Capital Contribution", "equity").await;
    let rent = create_account(&app, "6100", "Rent Expense", "expense").await;

    // 1. Capital contribution
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/journal-entries",
        Some(entry("2024-01-02", &cash, &capital, "1000")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["lines"][0]["account_code"], "1000");

    let (_, account) = send(&app, "GET", &format!("/api/v1/accounts/{}", capital), None).await;
    assert_eq!(decimal(&account["balance"]), dec!(-1000));

    // 2. Trial balance
    let (status, tb) = send(&app, "GET", "/api/v1/reports/trial-balance", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&tb["total_debits"]), dec!(1000));
    assert_eq!(decimal(&tb["total_credits"]), dec!(1000));
    assert_eq!(tb["is_balanced"], true);

    // 3. Rent paid in March
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/journal-entries",
        Some(entry("2024-03-01", &rent, &cash, "1500")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, statement) = send(
        &app,
        "GET",
        "/api/v1/reports/income-statement?start_date=2024-03-01&end_date=2024-03-31",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(statement["revenue"].as_array().unwrap().len(), 0);
    assert_eq!(statement["expenses"][0]["name"], "Rent Expense");
    assert_eq!(decimal(&statement["net_income"]), dec!(-1500));

    // 4. Fiscal year filter
    let (_, fiscal) = send(
        &app,
        "GET",
        "/api/v1/reports/income-statement?fiscal_year=2023",
        None,
    )
    .await;
    assert_eq!(fiscal["expenses"].as_array().unwrap().len(), 0);

    // 5. Balance sheet and cash flow
    let (status, sheet) = send(&app, "GET", "/api/v1/reports/balance-sheet", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&sheet["total_assets"]), dec!(-500));

    let (status, flow) = send(
        &app,
        "GET",
        "/api/v1/reports/cash-flow?start_date=2024-03-01&end_date=2024-03-31",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&flow["beginning_cash"]), dec!(1000));
    assert_eq!(decimal(&flow["total_operating"]), dec!(-1500));
    assert_eq!(decimal(&flow["ending_cash"]), dec!(-500));

    // 6. Account ledger
    let (status, ledger) = send(&app, "GET", &format!("/api/v1/accounts/{}/ledger", cash), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ledger["rows"].as_array().unwrap().len(), 2);
    assert_eq!(decimal(&ledger["closing_balance"]), dec!(-500));
}

#[tokio::test]
async fn test_error_mapping() {
    let app = memory_app();
    let cash = create_account(&app, "1000", "Cash", "asset").await;
    let capital = create_account(&app, "3000", "Capital", "equity").await;

    // Unbalanced entry -> 400
    let mut unbalanced = entry("2024-01-02", &cash, &capital, "100");
    unbalanced["lines"][1]["amount"] = json!("90");
    let (status, body) = send(&app, "POST", "/api/v1/journal-entries", Some(unbalanced)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "unbalanced_entry");

    // Single line -> 400
    let single = json!({
        "date": "2024-01-02",
        "lines": [{"account_id": cash, "amount": "1", "type": "debit"}]
    });
    let (status, _) = send(&app, "POST", "/api/v1/journal-entries", Some(single)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Invalid account type -> 400
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/accounts",
        Some(json!({"code": "9000", "name": "Misc", "type": "income"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_account_type");

    // Unknown entry -> 404
    let (status, _) = send(
        &app,
        "GET",
        "/api/v1/journal-entries/550e8400-e29b-41d4-a716-446655440000",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Duplicate code -> 409
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/accounts",
        Some(json!({"code": "1000", "name": "Other", "type": "asset"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_code"], "duplicate_account_code");

    // Account with lines -> 409
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/journal-entries",
        Some(entry("2024-01-02", &cash, &capital, "5")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = send(&app, "DELETE", &format!("/api/v1/accounts/{}", cash), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_code"], "account_has_journal_lines");
}

#[tokio::test]
async fn test_account_tree_and_updates() {
    let app = memory_app();
    let assets = create_account(&app, "1000", "Assets", "asset").await;
    let (status, current) = send(
        &app,
        "POST",
        "/api/v1/accounts",
        Some(json!({"code": "1100", "name": "Current", "type": "asset", "parent_id": assets})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let current = current["id"].as_str().unwrap().to_string();

    let (status, tree) = send(&app, "GET", "/api/v1/accounts/tree", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tree.as_array().unwrap().len(), 1);
    assert_eq!(tree[0]["code"], "1000");
    assert_eq!(tree[0]["children"][0]["code"], "1100");

    // Cycle -> 400
    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/v1/accounts/{}", assets),
        Some(json!({"parent_id": current})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "parent_cycle");

    // Detach with explicit null
    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/v1/accounts/{}", current),
        Some(json!({"parent_id": null, "name": "Current Assets"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["parent_id"], Value::Null);
    assert_eq!(body["name"], "Current Assets");

    let (status, _) = send(&app, "DELETE", &format!("/api/v1/accounts/{}", current), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, accounts) = send(&app, "GET", "/api/v1/accounts", None).await;
    assert_eq!(accounts.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_journal_update_delete_and_listing() {
    let app = memory_app();
    let cash = create_account(&app, "1000", "Cash", "asset").await;
    let sales = create_account(&app, "4000", "Sales", "revenue").await;

    let (_, first) = send(
        &app,
        "POST",
        "/api/v1/journal-entries",
        Some(entry("2024-01-10", &cash, &sales, "200")),
    )
    .await;
    let (_, second) = send(
        &app,
        "POST",
        "/api/v1/journal-entries",
        Some(entry("2024-02-10", &cash, &sales, "300")),
    )
    .await;
    let first_id = first["id"].as_str().unwrap();
    let second_id = second["id"].as_str().unwrap();

    let (_, listing) = send(&app, "GET", "/api/v1/journal-entries", None).await;
    assert_eq!(listing[0]["id"], second_id);

    let (_, january) = send(
        &app,
        "GET",
        "/api/v1/journal-entries?start_date=2024-01-01&end_date=2024-01-31",
        None,
    )
    .await;
    assert_eq!(january.as_array().unwrap().len(), 1);

    // Replace lines with a smaller amount
    let (status, updated) = send(
        &app,
        "PATCH",
        &format!("/api/v1/journal-entries/{}", first_id),
        Some(json!({
            "description": "corrected",
            "lines": [
                {"account_id": cash, "amount": "150", "type": "debit"},
                {"account_id": sales, "amount": "150", "type": "credit"}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["description"], "corrected");

    let (_, account) = send(&app, "GET", &format!("/api/v1/accounts/{}", cash), None).await;
    assert_eq!(decimal(&account["balance"]), dec!(450));

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/v1/journal-entries/{}", second_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, account) = send(&app, "GET", &format!("/api/v1/accounts/{}", sales), None).await;
    assert_eq!(decimal(&account["balance"]), dec!(-150));
}

#[tokio::test]
async fn test_reconciliation_and_settlements() {
    let app = memory_app();
    let bank = create_account(&app, "1010", "Bank", "asset").await;
    let receivable = create_account(&app, "1100", "Accounts Receivable", "asset").await;

    // No payable account: payment is skipped, not failed
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/settlements/supplier-payments",
        Some(json!({"amount": "40", "date": "2024-04-02"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["posted"], false);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/settlements/customer-receipts",
        Some(json!({"amount": "1040.00", "date": "2024-04-01", "reference": "INV-77"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["posted"], true);

    let (_, account) = send(&app, "GET", &format!("/api/v1/accounts/{}", receivable), None).await;
    assert_eq!(decimal(&account["balance"]), dec!(-1040));

    let (status, result) = send(
        &app,
        "POST",
        "/api/v1/reports/reconciliation",
        Some(json!({
            "account_id": bank,
            "statement_balance": "1040.00",
            "statement_date": "2024-04-30"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["reconciled"], true);
    assert_eq!(decimal(&result["difference"]), dec!(0));
    assert_eq!(result["lines"][0]["reference"], "INV-77");
}

#[tokio::test]
async fn test_correlation_id_is_echoed() {
    let app = memory_app();
    let correlation_id = "550e8400-e29b-41d4-a716-446655440099";

    let response = tower::util::ServiceExt::oneshot(
        app,
        axum::http::Request::builder()
            .uri("/api/v1/accounts")
            .header("x-correlation-id", correlation_id)
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-correlation-id").unwrap(),
        correlation_id
    );
}

#[tokio::test]
async fn test_malformed_requests_use_error_body() {
    let app = memory_app();

    // Missing required field
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/accounts",
        Some(json!({"code": "1000", "name": "Cash"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_request");
    assert!(body["details"].as_str().unwrap().contains("type"));

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/journal-entries",
        Some(json!({"lines": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_request");

    // Malformed path and query parameters
    let (status, body) = send(&app, "GET", "/api/v1/accounts/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_request");

    let (status, body) = send(
        &app,
        "GET",
        "/api/v1/reports/income-statement?start_date=yesterday",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_request");
}
