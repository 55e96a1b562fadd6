//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::InMemoryStore;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> Router {
    let state = api::create_state(InMemoryStore::new(), api::config::Config::default());
    api::create_app(state, get_metrics_handle())
}

async fn send_with(
    app: &Router,
    request: Request<Body>,
) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()))
    };
    (status, headers, json)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let (status, _, json) = send_with(app, request).await;
    (status, json)
}

async fn create_client(app: &Router, email: &str) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/api/clients",
        Some(json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": email,
            "phone": "+44 20 7946 0000"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["id"].as_str().unwrap().to_string()
}

async fn create_product(app: &Router, name: &str, price: f64) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/api/products",
        Some(json!({ "name": name, "description": "A fine thing", "price": price })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["id"].as_str().unwrap().to_string()
}

async fn create_order(app: &Router, client_id: &str, items: Value) -> Value {
    let (status, json) = send(
        app,
        "POST",
        "/api/orders",
        Some(json!({ "clientId": client_id, "items": items })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();
    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_create_and_get_order() {
    let app = setup();
    let client = create_client(&app, "ada@example.com").await;
    let book = create_product(&app, "Book", 19.99).await;

    let created = create_order(&app, &client, json!([{ "productId": book, "quantity": 2 }])).await;
    assert_eq!(created["status"], "NEW");
    assert_eq!(created["clientId"], client.as_str());
    assert_eq!(created["itemsTotal"], 2);
    assert_eq!(created["items"][0]["name"], "Book");
    assert_eq!(created["items"][0]["price"].as_f64(), Some(19.99));

    let id = created["id"].as_str().unwrap();
    let (status, fetched) = send(&app, "GET", &format!("/api/orders/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], id);
    assert_eq!(fetched["createdAt"], created["createdAt"]);
    assert_eq!(fetched["items"][0]["quantity"], 2);
}

#[tokio::test]
async fn test_book_quantity_scenario() {
    let app = setup();
    let client = create_client(&app, "reader@example.com").await;
    let book = create_product(&app, "Book", 12.5).await;
    let order = create_order(&app, &client, json!([{ "productId": book, "quantity": 2 }])).await;
    let id = order["id"].as_str().unwrap();
    let item_uri = format!("/api/orders/{id}/items/{book}");

    let (status, json) = send(&app, "PATCH", &item_uri, Some(json!({ "quantity": 5 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["items"][0]["quantity"], 5);
    assert_eq!(json["itemsTotal"], 5);

    let (status, json) = send(&app, "DELETE", &item_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["items"].as_array().unwrap().len(), 0);
    assert_eq!(json["itemsTotal"], 0);

    let (status, json) = send(&app, "PATCH", &item_uri, Some(json!({ "quantity": 1 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_add_product_and_duplicate_conflict() {
    let app = setup();
    let client = create_client(&app, "dup@example.com").await;
    let pen = create_product(&app, "Pen", 1.5).await;
    let ink = create_product(&app, "Ink", 3.0).await;
    let order = create_order(&app, &client, json!([{ "productId": pen, "quantity": 1 }])).await;
    let uri = format!("/api/orders/{}", order["id"].as_str().unwrap());

    let (status, json) = send(&app, "POST", &uri, Some(json!({ "productId": ink, "quantity": 3 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["itemsTotal"], 4);

    let (status, json) = send(&app, "POST", &uri, Some(json!({ "productId": pen, "quantity": 1 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");

    let (status, _) = send(
        &app,
        "POST",
        "/api/orders",
        Some(json!({
            "clientId": client,
            "items": [{ "productId": pen, "quantity": 1 }, { "productId": pen, "quantity": 2 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_update_status_and_delete_order() {
    let app = setup();
    let client = create_client(&app, "status@example.com").await;
    let cup = create_product(&app, "Cup", 4.0).await;
    let order = create_order(&app, &client, json!([{ "productId": cup, "quantity": 1 }])).await;
    let uri = format!("/api/orders/{}", order["id"].as_str().unwrap());

    let (status, json) = send(&app, "PATCH", &format!("{uri}/status?status=COMPLETED"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "COMPLETED");

    let (status, _) = send(&app, "PATCH", &format!("{uri}/status?status=LOST"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(json, Value::Null);

    let (status, _) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_orders_with_filters_and_paging() {
    let app = setup();
    let client = create_client(&app, "lists@example.com").await;
    let tea = create_product(&app, "Tea", 2.0).await;
    let jam = create_product(&app, "Jam", 3.0).await;
    for _ in 0..3 {
        create_order(&app, &client, json!([{ "productId": tea, "quantity": 1 }])).await;
    }
    create_order(&app, &client, json!([{ "productId": jam, "quantity": 2 }])).await;

    let (status, json) = send(&app, "GET", "/api/orders?size=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalElements"], 4);
    assert_eq!(json["totalPages"], 2);
    assert_eq!(json["content"].as_array().unwrap().len(), 2);

    let (_, json) = send(&app, "GET", &format!("/api/orders?productId={jam}"), None).await;
    assert_eq!(json["totalElements"], 1);
    assert_eq!(json["content"][0]["items"][0]["name"], "Jam");

    let (_, json) = send(&app, "GET", "/api/orders?status=CANCELED", None).await;
    assert_eq!(json["totalElements"], 0);
    assert_eq!(json["content"].as_array().unwrap().len(), 0);

    let (_, json) = send(
        &app,
        "GET",
        "/api/orders?from=2000-01-01T00:00:00Z&sort=createdAt,asc&sort=id",
        None,
    )
    .await;
    assert_eq!(json["totalElements"], 4);

    let (status, json) = send(
        &app,
        "GET",
        "/api/orders?from=2000-01-01T00:00:00&to=2999-12-31T23:59:59.999",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalElements"], 4);

    let (_, json) = send(&app, "GET", "/api/orders?to=2000-01-01T00:00:00", None).await;
    assert_eq!(json["totalElements"], 0);
}

#[tokio::test]
async fn test_bad_requests() {
    let app = setup();

    let (status, json) = send(&app, "GET", "/api/orders/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");

    let (status, _) = send(&app, "GET", "/api/orders?sort=bogus,desc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/api/orders?from=yesterday", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method("POST")
        .uri("/api/orders")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, json) = send_with(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_validation_errors() {
    let app = setup();
    let (status, json) = send(
        &app,
        "POST",
        "/api/clients",
        Some(json!({ "firstName": "A", "lastName": "B", "email": "nope", "phone": "1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");

    let (status, json) = send(&app, "POST", "/api/products", Some(json!({ "name": "Free" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");

    let client = create_client(&app, "valid@example.com").await;
    let gum = create_product(&app, "Gum", 0.5).await;
    let (status, json) = send(
        &app,
        "POST",
        "/api/orders",
        Some(json!({ "clientId": client, "items": [{ "productId": gum, "quantity": 0 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");

    let (status, _) = send(
        &app,
        "POST",
        "/api/orders",
        Some(json!({ "clientId": client, "items": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_not_found_body_carries_path_and_request_id() {
    let app = setup();
    let uri = format!("/api/clients/{}", uuid::Uuid::new_v4());
    let request = Request::builder()
        .uri(&uri)
        .header("x-request-id", "trace-me-123")
        .body(Body::empty())
        .unwrap();

    let (status, headers, json) = send_with(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(headers["x-request-id"], "trace-me-123");
    assert_eq!(json["status"], 404);
    assert_eq!(json["error"], "Not Found");
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["path"], uri.as_str());
    assert_eq!(json["requestId"], "trace-me-123");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_request_id_is_generated_when_absent() {
    let app = setup();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (_, headers, _) = send_with(&app, request).await;
    let id = headers["x-request-id"].to_str().unwrap();
    assert!(!id.is_empty());
}

#[tokio::test]
async fn test_client_lifecycle_and_in_use_conflict() {
    let app = setup();
    let client = create_client(&app, "grace@example.com").await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/clients",
        Some(json!({ "firstName": "G", "lastName": "H", "email": "GRACE@example.com", "phone": "2" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = send(
        &app,
        "PUT",
        &format!("/api/clients/{client}"),
        Some(json!({ "firstName": "Grace", "lastName": "Hopper", "email": "grace@example.com", "phone": "3" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["lastName"], "Hopper");

    let cobol = create_product(&app, "Compiler", 99.0).await;
    create_order(&app, &client, json!([{ "productId": cobol, "quantity": 1 }])).await;

    let (_, json) = send(&app, "GET", "/api/clients?lastName=hop", None).await;
    assert_eq!(json["totalElements"], 1);
    assert_eq!(json["content"][0]["ordersCount"], 1);

    let (status, json) = send(&app, "DELETE", &format!("/api/clients/{client}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");

    let (status, _) = send(&app, "DELETE", &format!("/api/products/{cobol}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_product_search_and_update() {
    let app = setup();
    let cheap = create_product(&app, "Pencil", 0.99).await;
    create_product(&app, "Notebook", 5.0).await;
    create_product(&app, "Fountain pen", 45.0).await;

    let (_, json) = send(&app, "GET", "/api/products?priceMin=1&priceMax=50&sort=price,desc", None).await;
    assert_eq!(json["totalElements"], 2);
    assert_eq!(json["content"][0]["name"], "Fountain pen");

    let (_, json) = send(&app, "GET", "/api/products?name=PEN", None).await;
    assert_eq!(json["totalElements"], 2);

    let (status, json) = send(
        &app,
        "PUT",
        &format!("/api/products/{cheap}"),
        Some(json!({ "name": "Pencil", "description": "HB", "price": 1.25 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["price"].as_f64(), Some(1.25));

    let (status, _) = send(&app, "DELETE", &format!("/api/products/{cheap}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    let client = create_client(&app, "metrics@example.com").await;
    let widget = create_product(&app, "Widget", 1.0).await;
    create_order(&app, &client, json!([{ "productId": widget, "quantity": 1 }])).await;

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let (status, _, body) = send_with(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_str().unwrap_or_default().contains("orders_created_total"));
}
