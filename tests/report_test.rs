mod common;

use chrono::{Duration, Utc};
use common::TestApp;
use foodbuddy_settlement::domain::{PaymentMethod, PaymentStatus, VerifiedStatus};
use foodbuddy_settlement::error::AppError;
use uuid::Uuid;

#[tokio::test]
async fn counts_are_zero_filled_and_filterable() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    let product = app.product("40", "0").await;

    app.state.orders.add_to_cart(user, product, 1).await.unwrap();
    let paid = app
        .state
        .orders
        .place_order(user, app.restaurant_id, None)
        .await
        .unwrap();
    app.state.orders.add_to_cart(user, product, 2).await.unwrap();
    app.state
        .orders
        .place_order(user, app.restaurant_id, None)
        .await
        .unwrap();

    let record = app
        .state
        .payments
        .initiate(user, paid.order.id, PaymentMethod::Online)
        .await
        .unwrap();
    app.state
        .payments
        .finalize(&record.gateway_session_id, VerifiedStatus::Succeeded)
        .await
        .unwrap();
    app.state
        .orders
        .advance_item(app.restaurant_id, paid.order.id, paid.items[0].id, None)
        .await
        .unwrap();

    let today = Utc::now().date_naive();
    let all = app.state.reports.order_counts(today, today, None).await.unwrap();
    assert_eq!(all.counts.len(), 6);
    assert_eq!(all.counts["processing"], 1);
    assert_eq!(all.counts["in_preparation"], 1);
    assert_eq!(all.counts["delivered"], 0);
    assert_eq!(all.total, 2);

    let only_paid = app
        .state
        .reports
        .order_counts(today, today, Some(PaymentStatus::Paid))
        .await
        .unwrap();
    assert_eq!(only_paid.counts["processing"], 0);
    assert_eq!(only_paid.total, 1);

    let yesterday = today - Duration::days(1);
    let empty = app
        .state
        .reports
        .order_counts(yesterday, yesterday, None)
        .await
        .unwrap();
    assert_eq!(empty.total, 0);
}

#[tokio::test]
async fn inverted_range_is_rejected() {
    let app = TestApp::new();
    let today = Utc::now().date_naive();
    let err = app
        .state
        .reports
        .order_counts(today, today - Duration::days(2), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}
