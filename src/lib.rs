pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod validation;

use axum::{
    middleware as axum_middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::Settings;
use crate::gateway::PaymentGateway;
use crate::ports::Store;
use crate::services::{
    CouponEngine, OrderLedger, PaymentReconciler, ReferralSettlement, ReportService, WalletLedger,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub orders: OrderLedger,
    pub coupons: CouponEngine,
    pub payments: PaymentReconciler,
    pub wallet: WalletLedger,
    pub referrals: ReferralSettlement,
    pub reports: ReportService,
    pub webhook_secret: String,
    pub admin_api_key: String,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        settings: &Settings,
        webhook_secret: String,
        admin_api_key: String,
    ) -> Self {
        Self {
            orders: OrderLedger::new(store.clone()),
            coupons: CouponEngine::new(store.clone(), settings.coupon_policy()),
            payments: PaymentReconciler::new(store.clone(), gateway),
            wallet: WalletLedger::new(store.clone()),
            referrals: ReferralSettlement::new(
                store.clone(),
                settings.referral_reward_amount.clone(),
            ),
            reports: ReportService::new(store.clone()),
            store,
            webhook_secret,
            admin_api_key,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    use handlers::{callback, coupons, orders, payments, referral, reports, wallet};

    let user_routes = Router::new()
        .route("/cart/add", post(orders::add_to_cart))
        .route("/cart/all", get(orders::cart))
        .route("/order/placeorder", post(orders::place_order))
        .route("/order/applycoupon", post(coupons::apply_coupon))
        .route("/order/initiatepayment", post(payments::initiate_payment))
        .route("/order/payment/confirm", post(payments::confirm_payment))
        .route("/order/cancel", post(orders::cancel_item))
        .route("/order/history", get(orders::order_history))
        .route("/order/:order_id", get(orders::get_order))
        .route("/order/:order_id/payments", get(payments::order_payments))
        .route("/coupon/cart/:couponcode", get(coupons::preview_coupon))
        .route("/wallet/all", get(wallet::user_wallet))
        .route("/referral/activate", patch(referral::activate))
        .route("/referral/claim", get(referral::claim))
        .route("/referral/stats", get(referral::stats));

    let restaurant_routes = Router::new()
        .route("/order/nextstatus", post(orders::next_status))
        .route("/order/history/:status", get(orders::restaurant_history))
        .route("/order/:order_id", get(orders::get_order))
        .route("/order/:order_id/payments", get(payments::order_payments))
        .route("/wallet/all", get(wallet::restaurant_wallet));

    let admin_routes = Router::new()
        .route("/coupon/create", post(coupons::create_coupon))
        .route("/coupon/update", patch(coupons::update_coupon))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::admin_auth,
        ));

    let public_routes = Router::new()
        .route("/coupon/all", get(coupons::list_coupons))
        .route("/report/orders", get(reports::order_counts));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/gateway/payment/callback", post(callback::payment_callback))
        .nest("/user", user_routes)
        .nest("/restaurant", restaurant_routes)
        .nest("/admin", admin_routes)
        .nest("/public", public_routes)
        .layer(axum_middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
