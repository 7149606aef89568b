mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use common::{TestApp, ADMIN_KEY, WEBHOOK_SECRET};
use foodbuddy_settlement::create_app;
use foodbuddy_settlement::gateway::signature::{sign, SIGNATURE_HEADER};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn as_user(method: Method, uri: &str, user: Uuid, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-actor-id", user.to_string())
        .header("x-actor-role", "user");
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn callback(body: &Value, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/gateway/payment/callback")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn signed(body: &Value) -> Option<String> {
    Some(sign(WEBHOOK_SECRET, body.to_string().as_bytes()).unwrap())
}

/// Places a one-item order over HTTP and returns its id.
async fn place_order(test: &TestApp, app: &Router, user: Uuid) -> String {
    let product = test.product("120", "0").await;
    let (status, _) = send(
        app,
        as_user(
            Method::POST,
            "/user/cart/add",
            user,
            Some(json!({"product_id": product, "quantity": 1})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        app,
        as_user(
            Method::POST,
            "/user/order/placeorder",
            user,
            Some(json!({"restaurant_id": test.restaurant_id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], true);
    body["data"]["id"].as_str().unwrap().to_string()
}

async fn initiate(app: &Router, user: Uuid, order_id: &str) -> String {
    let (status, body) = send(
        app,
        as_user(
            Method::POST,
            "/user/order/initiatepayment",
            user,
            Some(json!({"order_id": order_id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["gateway_session_id"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn health_reports_connected_store() {
    let test = TestApp::new();
    let app = create_app(test.state.clone());

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "connected");
}

#[tokio::test]
async fn missing_actor_is_unauthorized() {
    let test = TestApp::new();
    let app = create_app(test.state.clone());

    let request = Request::builder()
        .uri("/user/order/history")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], false);
}

#[tokio::test]
async fn restaurant_cannot_use_user_routes() {
    let test = TestApp::new();
    let app = create_app(test.state.clone());

    let request = Request::builder()
        .uri("/user/wallet/all")
        .header("x-actor-id", test.restaurant_id.to_string())
        .header("x-actor-role", "restaurant")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_json_uses_the_error_envelope() {
    let test = TestApp::new();
    let app = create_app(test.state.clone());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/user/order/placeorder")
        .header("x-actor-id", Uuid::new_v4().to_string())
        .header("x-actor-role", "user")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"restaurant_id\": "))
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn order_flow_over_http() {
    let test = TestApp::new();
    let app = create_app(test.state.clone());
    let user = Uuid::new_v4();

    let order_id = place_order(&test, &app, user).await;
    let (status, body) = send(
        &app,
        as_user(Method::GET, &format!("/user/order/{}", order_id), user, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let final_amount = body["data"]["final_amount"].as_str().unwrap();
    assert_eq!(common::dec(final_amount), common::dec("120"));

    let (status, _) = send(
        &app,
        as_user(
            Method::GET,
            &format!("/user/order/{}", order_id),
            Uuid::new_v4(),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn callback_rejects_bad_signatures() {
    let test = TestApp::new();
    let app = create_app(test.state.clone());
    let body = json!({"session_id": "sandbox_x", "status": "succeeded"});

    let (status, _) = send(&app, callback(&body, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = Some(sign("wrong-secret", body.to_string().as_bytes()).unwrap());
    let (status, _) = send(&app, callback(&body, forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, callback(&body, Some("not-hex".to_string()))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn callback_acknowledges_unknown_sessions() {
    let test = TestApp::new();
    let app = create_app(test.state.clone());
    let body = json!({"session_id": "sandbox_unknown", "status": "succeeded"});

    let (status, response) = send(&app, callback(&body, signed(&body))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], true);
    assert!(response["data"].is_null());
}

#[tokio::test]
async fn verified_callback_finalizes_once() {
    let test = TestApp::new();
    let app = create_app(test.state.clone());
    let user = Uuid::new_v4();
    let order_id = place_order(&test, &app, user).await;
    let session_id = initiate(&app, user, &order_id).await;

    let body = json!({"session_id": session_id, "status": "succeeded"});
    let (status, first) = send(&app, callback(&body, signed(&body))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["replayed"], false);
    assert_eq!(first["data"]["payment"]["status"], "succeeded");

    let (status, replay) = send(&app, callback(&body, signed(&body))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay["data"]["replayed"], true);

    let (_, order) = send(
        &app,
        as_user(Method::GET, &format!("/user/order/{}", order_id), user, None),
    )
    .await;
    assert_eq!(order["data"]["payment_status"], "paid");
}

#[tokio::test]
async fn buyer_confirmation_requires_signature() {
    let test = TestApp::new();
    let app = create_app(test.state.clone());
    let user = Uuid::new_v4();
    let order_id = place_order(&test, &app, user).await;
    let session_id = initiate(&app, user, &order_id).await;
    let body = json!({"session_id": session_id, "status": "failed"});

    let unsigned = as_user(Method::POST, "/user/order/payment/confirm", user, Some(body.clone()));
    let (status, _) = send(&app, unsigned).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut request = as_user(Method::POST, "/user/order/payment/confirm", user, Some(body.clone()));
    request
        .headers_mut()
        .insert(SIGNATURE_HEADER, signed(&body).unwrap().parse().unwrap());
    let (status, response) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["data"]["payment"]["status"], "failed");
    assert_eq!(response["data"]["order"]["payment_status"], "failed");
}

#[tokio::test]
async fn admin_routes_require_the_admin_key() {
    let test = TestApp::new();
    let app = create_app(test.state.clone());
    let coupon = json!({
        "code": "welcome",
        "percentage": 15,
        "minimum_amount": "100",
        "maximum_usage": 2,
        "expiry": (chrono::Utc::now() + chrono::Duration::days(3)).to_rfc3339(),
    });

    let request = |key: Option<&str>| {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/admin/coupon/create")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(key) = key {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", key));
        }
        builder.body(Body::from(coupon.to_string())).unwrap()
    };

    let (status, _) = send(&app, request(None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, request(Some("nope"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, request(Some(ADMIN_KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["code"], "WELCOME");

    let listing = Request::builder()
        .uri("/public/coupon/all")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, listing).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn report_rejects_unknown_payment_status() {
    let test = TestApp::new();
    let app = create_app(test.state.clone());

    let request = Request::builder()
        .uri("/public/report/orders?from=2026-01-01&till=2026-01-31&payment_status=lost")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);
}
