mod common;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use common::{dec, TestApp};
use foodbuddy_settlement::domain::{
    ActorRef, Initiator, OrderDetails, PaymentMethod, PaymentState, PaymentStatus, VerifiedStatus,
    WalletReason,
};
use foodbuddy_settlement::error::AppError;
use foodbuddy_settlement::gateway::{GatewayError, GatewaySession, PaymentGateway};
use std::sync::Arc;
use uuid::Uuid;

struct DownGateway;

#[async_trait]
impl PaymentGateway for DownGateway {
    async fn initiate_session(
        &self,
        _order_id: Uuid,
        _amount: &BigDecimal,
    ) -> Result<GatewaySession, GatewayError> {
        Err(GatewayError::InvalidResponse("maintenance".to_string()))
    }
}

async fn order_for(app: &TestApp, user: Uuid, price: &str) -> OrderDetails {
    let product = app.product(price, "0").await;
    app.state.orders.add_to_cart(user, product, 1).await.unwrap();
    app.state
        .orders
        .place_order(user, app.restaurant_id, None)
        .await
        .unwrap()
}

async fn order_status(app: &TestApp, user: Uuid, order_id: Uuid) -> PaymentStatus {
    app.state
        .orders
        .get_order(Initiator::User(user), order_id)
        .await
        .unwrap()
        .order
        .payment_status
}

#[tokio::test]
async fn initiate_is_idempotent_while_pending() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    let details = order_for(&app, user, "120").await;

    let first = app
        .state
        .payments
        .initiate(user, details.order.id, PaymentMethod::Online)
        .await
        .unwrap();
    let second = app
        .state
        .payments
        .initiate(user, details.order.id, PaymentMethod::Online)
        .await
        .unwrap();

    assert_eq!(first.gateway_session_id, second.gateway_session_id);
    assert_eq!(first.amount, dec("120"));
    assert_eq!(first.status, PaymentState::Pending);
    let records = app
        .state
        .payments
        .payments_for_order(Initiator::User(user), details.order.id)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn finalize_replay_changes_nothing() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    let details = order_for(&app, user, "120").await;
    let record = app
        .state
        .payments
        .initiate(user, details.order.id, PaymentMethod::Online)
        .await
        .unwrap();

    let first = app
        .state
        .payments
        .finalize(&record.gateway_session_id, VerifiedStatus::Succeeded)
        .await
        .unwrap();
    assert!(!first.replayed);
    assert_eq!(first.payment.status, PaymentState::Succeeded);
    assert!(first.payment.confirmed_at.is_some());

    let replay = app
        .state
        .payments
        .finalize(&record.gateway_session_id, VerifiedStatus::Failed)
        .await
        .unwrap();
    assert!(replay.replayed);
    assert_eq!(replay.payment.status, PaymentState::Succeeded);
    assert_eq!(replay.payment.confirmed_at, first.payment.confirmed_at);
    assert_eq!(
        order_status(&app, user, details.order.id).await,
        PaymentStatus::Paid
    );

    let again = app
        .state
        .payments
        .initiate(user, details.order.id, PaymentMethod::Online)
        .await
        .unwrap_err();
    assert!(matches!(again, AppError::Conflict(_)));
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let app = TestApp::new();
    let err = app
        .state
        .payments
        .finalize("sandbox_missing", VerifiedStatus::Succeeded)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn failed_payment_can_be_retried_with_a_new_session() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    let details = order_for(&app, user, "75").await;
    let first = app
        .state
        .payments
        .initiate(user, details.order.id, PaymentMethod::Online)
        .await
        .unwrap();
    app.state
        .payments
        .finalize(&first.gateway_session_id, VerifiedStatus::Failed)
        .await
        .unwrap();
    assert_eq!(
        order_status(&app, user, details.order.id).await,
        PaymentStatus::Failed
    );

    let retry = app
        .state
        .payments
        .initiate(user, details.order.id, PaymentMethod::Online)
        .await
        .unwrap();
    assert_ne!(retry.gateway_session_id, first.gateway_session_id);
    app.state
        .payments
        .finalize(&retry.gateway_session_id, VerifiedStatus::Succeeded)
        .await
        .unwrap();
    assert_eq!(
        order_status(&app, user, details.order.id).await,
        PaymentStatus::Paid
    );
}

#[tokio::test]
async fn wallet_payment_debits_and_marks_paid() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    app.state
        .wallet
        .credit(ActorRef::user(user), dec("200"), WalletReason::Refund, None)
        .await
        .unwrap();
    let details = order_for(&app, user, "150").await;

    let record = app
        .state
        .payments
        .initiate(user, details.order.id, PaymentMethod::Wallet)
        .await
        .unwrap();

    assert_eq!(record.method, PaymentMethod::Wallet);
    assert_eq!(record.status, PaymentState::Succeeded);
    assert_eq!(
        order_status(&app, user, details.order.id).await,
        PaymentStatus::Paid
    );
    let balance = app.state.wallet.balance_of(ActorRef::user(user)).await.unwrap();
    assert_eq!(balance, dec("50"));
}

#[tokio::test]
async fn insufficient_wallet_balance_mutates_nothing() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    app.state
        .wallet
        .credit(ActorRef::user(user), dec("40"), WalletReason::Refund, None)
        .await
        .unwrap();
    let details = order_for(&app, user, "150").await;

    let err = app
        .state
        .payments
        .initiate(user, details.order.id, PaymentMethod::Wallet)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    assert_eq!(
        order_status(&app, user, details.order.id).await,
        PaymentStatus::Pending
    );
    let statement = app.state.wallet.statement(ActorRef::user(user)).await.unwrap();
    assert_eq!(statement.entries.len(), 1);
    assert_eq!(statement.balance, dec("40"));
    let records = app
        .state
        .payments
        .payments_for_order(Initiator::User(user), details.order.id)
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn gateway_failure_records_no_payment() {
    let app = TestApp::with_gateway(Arc::new(DownGateway));
    let user = Uuid::new_v4();
    let details = order_for(&app, user, "90").await;

    let err = app
        .state
        .payments
        .initiate(user, details.order.id, PaymentMethod::Online)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ExternalGateway(_)));

    let records = app
        .state
        .payments
        .payments_for_order(Initiator::User(user), details.order.id)
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn confirmation_is_limited_to_the_buyer() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    let details = order_for(&app, user, "60").await;
    let record = app
        .state
        .payments
        .initiate(user, details.order.id, PaymentMethod::Online)
        .await
        .unwrap();

    let err = app
        .state
        .payments
        .confirm(Uuid::new_v4(), &record.gateway_session_id, VerifiedStatus::Succeeded)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(
        order_status(&app, user, details.order.id).await,
        PaymentStatus::Pending
    );

    let outcome = app
        .state
        .payments
        .confirm(user, &record.gateway_session_id, VerifiedStatus::Succeeded)
        .await
        .unwrap();
    assert!(!outcome.replayed);
}

#[tokio::test]
async fn other_users_cannot_initiate_payment() {
    let app = TestApp::new();
    let details = order_for(&app, Uuid::new_v4(), "60").await;

    let err = app
        .state
        .payments
        .initiate(Uuid::new_v4(), details.order.id, PaymentMethod::Online)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
