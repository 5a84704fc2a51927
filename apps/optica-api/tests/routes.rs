//! In-process tests of the HTTP surface.
//!
//! Each test builds the router over a fresh in-memory database with the
//! date pinned to 2025-03-14 and drives it with `oneshot`.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use optica_api::{build_app, AppState};
use optica_core::EventKind;
use optica_db::{Database, DbConfig};

fn march() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
}

async fn state() -> AppState {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    AppState::new(db, 16).with_fixed_date(march())
}

/// Percent-encodes the `/` of an identifier for use as a path segment.
fn seg(id: &str) -> String {
    id.replace('/', "%2F")
}

async fn call(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn send(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn as_admin(mut req: Request<Body>) -> Request<Body> {
    req.headers_mut().insert("x-actor-role", "admin".parse().unwrap());
    req
}

async fn register(router: &Router, first_name: &str) -> String {
    let (status, body) = call(
        router,
        send(
            Method::POST,
            "/clients",
            json!({ "first_name": first_name, "last_name": "Wanjiru", "phone": "0712345678" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["client"]["registration_number"].as_str().unwrap().to_string()
}

async fn examine(router: &Router, client_id: &str) {
    let (status, body) = call(
        router,
        send(
            Method::POST,
            "/prescriptions",
            json!({
                "client_id": client_id,
                "examined_by": "Dr. Otieno",
                "right": { "sphere": -1.25, "cylinder": -0.5, "axis": 180 },
                "left": { "sphere": -1.0 },
                "pupillary_distance": 63.0
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

fn sale_form(client_id: &str) -> Value {
    json!({
        "client_id": client_id,
        "brand": "Ray-Ban",
        "model": "RB5154",
        "amount_cents": 5000,
        "quantity": 2,
        "advance_cents": 3000
    })
}

#[tokio::test]
async fn test_health() {
    let router = build_app(state().await);
    let (status, body) = call(&router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["database"], true);
}

#[tokio::test]
async fn test_registration_to_collection() {
    let state = state().await;
    let mut events = state.events.subscribe();
    let router = build_app(state);

    let (_, body) = call(&router, get("/clients/next-id")).await;
    assert_eq!(body["next_id"], "M/2025/03/1");

    let first = register(&router, "Amani").await;
    let second = register(&router, "Baraka").await;
    assert_eq!(first, "M/2025/03/1");
    assert_eq!(second, "M/2025/03/2");

    let (status, body) = call(&router, get(&format!("/clients/{}", seg(&second)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["client"]["status"], "waiting_examination");
    assert!(body["latest_prescription"].is_null());

    examine(&router, &second).await;

    let (_, body) = call(&router, get("/sales/next-id")).await;
    assert_eq!(body["next_id"], "SALE/2025/03/001");

    let (status, body) = call(&router, send(Method::POST, "/sales", sale_form(&second))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let sale = &body["sale"];
    assert_eq!(sale["reference_number"], "SALE/2025/03/001");
    assert_eq!(sale["total_cents"], 10000);
    assert_eq!(sale["balance_cents"], 7000);
    assert_eq!(sale["status"], "pending_collection");

    let (status, body) = call(
        &router,
        send(
            Method::PATCH,
            &format!("/sales/{}/status", seg("SALE/2025/03/001")),
            json!({ "status": "collected" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["sale"]["status"], "collected");

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(event.kind);
    }
    assert_eq!(
        kinds,
        vec![
            EventKind::NewClient,
            EventKind::NewClient,
            EventKind::NewPrescription,
            EventKind::NewSale,
            EventKind::SaleStatusUpdate,
        ]
    );

    let (_, body) = call(&router, get(&format!("/clients/{}", seg(&second)))).await;
    assert_eq!(body["client"]["status"], "examined");
    assert_eq!(body["sales"].as_array().unwrap().len(), 1);
    assert!(body["latest_prescription"]["id"].is_string());
}

#[tokio::test]
async fn test_invalid_status_is_bad_request() {
    let router = build_app(state().await);
    let id = register(&router, "Amani").await;

    let (status, body) = call(
        &router,
        send(
            Method::PATCH,
            &format!("/clients/{}/status", seg(&id)),
            json!({ "status": "teleported" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_skipped_transition_needs_admin() {
    let router = build_app(state().await);
    let id = register(&router, "Amani").await;
    examine(&router, &id).await;
    call(&router, send(Method::POST, "/sales", sale_form(&id))).await;

    let uri = format!("/sales/{}/status", seg("SALE/2025/03/001"));
    let (status, body) = call(&router, send(Method::PATCH, &uri, json!({ "status": "pending_job" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "PRECONDITION_FAILED");

    let (status, body) = call(
        &router,
        as_admin(send(Method::PATCH, &uri, json!({ "status": "pending_job" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["sale"]["status"], "pending_job");
}

#[tokio::test]
async fn test_client_cannot_enter_sale_stage() {
    let router = build_app(state().await);
    let id = register(&router, "Amani").await;
    examine(&router, &id).await;

    let uri = format!("/clients/{}/status", seg(&id));
    let (status, body) = call(&router, send(Method::PATCH, &uri, json!({ "status": "pending_job" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "PRECONDITION_FAILED");

    let (status, _) = call(
        &router,
        as_admin(send(Method::PATCH, &uri, json!({ "status": "collected" }))),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = call(&router, send(Method::POST, "/sales", sale_form(&id))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn test_sale_preconditions() {
    let router = build_app(state().await);
    let id = register(&router, "Amani").await;

    // Not examined yet
    let (status, body) = call(&router, send(Method::POST, "/sales", sale_form(&id))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);

    examine(&router, &id).await;
    let mut form = sale_form(&id);
    form["prescription_id"] = json!("00000000-0000-0000-0000-000000000000");
    let (status, _) = call(&router, send(Method::POST, "/sales", form)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = call(&router, send(Method::POST, "/sales", sale_form("M/1999/01/1"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let mut form = sale_form(&id);
    form["advance_cents"] = json!(20000);
    let (status, body) = call(&router, send(Method::POST, "/sales", form)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    // No reference number was consumed by the failures
    let (_, body) = call(&router, get("/sales/next-id")).await;
    assert_eq!(body["next_id"], "SALE/2025/03/001");
}

#[tokio::test]
async fn test_malformed_json_uses_error_body() {
    let router = build_app(state().await);
    let req = Request::builder()
        .method(Method::POST)
        .uri("/clients")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let (status, body) = call(&router, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_actor_header() {
    let router = build_app(state().await);
    let id = register(&router, "Amani").await;

    let mut req = send(Method::POST, "/clients/bulk-delete", json!({ "ids": [id] }));
    req.headers_mut().insert("x-actor-role", "system".parse().unwrap());
    let (status, _) = call(&router, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(&router, send(Method::POST, "/clients/bulk-delete", json!({ "ids": [id] }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, body) = call(
        &router,
        as_admin(send(Method::POST, "/clients/bulk-delete", json!({ "ids": [id] }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["count"], 1);

    let (status, _) = call(&router, get(&format!("/clients/{}", seg(&id)))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Deleted numbers are not handed out again
    assert_eq!(register(&router, "Baraka").await, "M/2025/03/2");
}

#[tokio::test]
async fn test_client_search_and_update() {
    let router = build_app(state().await);
    let id = register(&router, "Amani").await;
    register(&router, "Baraka").await;

    let (_, body) = call(&router, get("/clients?search=aman")).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["clients"][0]["registration_number"], id.as_str());

    let (status, body) = call(
        &router,
        send(
            Method::PUT,
            &format!("/clients/{}", seg(&id)),
            json!({ "email": "amani@example.com" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["client"]["email"], "amani@example.com");

    let (status, _) = call(&router, get("/clients?limit=100000")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_notifications() {
    let router = build_app(state().await);
    register(&router, "Amani").await;
    register(&router, "Baraka").await;

    let (_, body) = call(&router, get("/notifications/unread-count")).await;
    assert_eq!(body["count"], 2);

    let (_, body) = call(&router, get("/notifications?unread=true")).await;
    let list = body["notifications"].as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["kind"], "newClient");
    let first = list[0]["id"].as_str().unwrap().to_string();

    let (status, _) = call(&router, send(Method::PATCH, &format!("/notifications/{first}/read"), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = call(&router, get("/notifications/unread-count")).await;
    assert_eq!(body["count"], 1);

    let (status, _) = call(&router, send(Method::PATCH, "/notifications/missing/read", json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = call(&router, send(Method::POST, "/notifications/read-all", json!({}))).await;
    assert_eq!(body["updated"], 1);

    let req = Request::builder()
        .method(Method::DELETE)
        .uri(format!("/notifications/{first}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(&router, req).await;
    assert_eq!(status, StatusCode::OK);

    let req = Request::builder()
        .method(Method::DELETE)
        .uri("/notifications")
        .body(Body::empty())
        .unwrap();
    let (_, body) = call(&router, req).await;
    assert_eq!(body["updated"], 1);
}

#[tokio::test]
async fn test_dashboard_summary() {
    let router = build_app(state().await);
    let id = register(&router, "Amani").await;
    register(&router, "Baraka").await;
    examine(&router, &id).await;
    call(&router, send(Method::POST, "/sales", sale_form(&id))).await;

    let (status, body) = call(&router, get("/dashboard/summary")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_clients"], 2);
    assert_eq!(body["total_sales"], 1);
    assert_eq!(body["revenue_cents"], 10000);
    assert_eq!(body["outstanding_cents"], 7000);
}

#[tokio::test]
async fn test_sale_amounts_and_listing() {
    let router = build_app(state().await);
    let id = register(&router, "Amani").await;
    examine(&router, &id).await;
    let (_, body) = call(&router, send(Method::POST, "/sales", sale_form(&id))).await;
    let uuid = body["sale"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        &router,
        send(Method::PATCH, &format!("/sales/{uuid}/amounts"), json!({ "advance_cents": 10000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["sale"]["balance_cents"], 0);

    let (_, body) = call(&router, get("/sales?status=pending_collection")).await;
    assert_eq!(body["count"], 1);
    let (_, body) = call(&router, get("/sales?status=collected")).await;
    assert_eq!(body["count"], 0);
    let (status, _) = call(&router, get("/sales?status=lost")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&router, get(&format!("/sales/{}", seg("SALE/2025/03/009")))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_prescription_history() {
    let router = build_app(state().await);
    let id = register(&router, "Amani").await;
    examine(&router, &id).await;
    examine(&router, &id).await;

    let (status, body) = call(&router, get(&format!("/clients/{}/prescriptions", seg(&id)))).await;
    assert_eq!(status, StatusCode::OK);
    let list = body["prescriptions"].as_array().unwrap();
    assert_eq!(list.len(), 2);

    let pid = list[0]["id"].as_str().unwrap();
    let (status, body) = call(&router, get(&format!("/prescriptions/{pid}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prescription"]["right_axis"], 180);

    let (status, body) = call(&router, get("/prescriptions/no-such-exam")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = call(&router, get(&format!("/clients/{}/prescriptions", seg("M/1999/01/1")))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
