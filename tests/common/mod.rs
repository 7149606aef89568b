#![allow(dead_code)]

use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use foodbuddy_settlement::adapters::MemoryStore;
use foodbuddy_settlement::config::Settings;
use foodbuddy_settlement::domain::{NewCoupon, Product};
use foodbuddy_settlement::gateway::{PaymentGateway, SandboxGateway};
use foodbuddy_settlement::AppState;

pub const WEBHOOK_SECRET: &str = "whsec_test";
pub const ADMIN_KEY: &str = "admin-test-key";

pub fn dec(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

pub struct TestApp {
    pub store: MemoryStore,
    pub state: AppState,
    pub restaurant_id: Uuid,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_gateway(Arc::new(SandboxGateway))
    }

    pub fn with_gateway(gateway: Arc<dyn PaymentGateway>) -> Self {
        let store = MemoryStore::new();
        let state = AppState::new(
            Arc::new(store.clone()),
            gateway,
            &Settings::default(),
            WEBHOOK_SECRET.to_string(),
            ADMIN_KEY.to_string(),
        );
        Self {
            store,
            state,
            restaurant_id: Uuid::new_v4(),
        }
    }

    pub async fn product(&self, price: &str, offer: &str) -> Uuid {
        self.product_at(self.restaurant_id, price, offer).await
    }

    pub async fn product_at(&self, restaurant_id: Uuid, price: &str, offer: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.store
            .seed_product(Product {
                id,
                restaurant_id,
                name: format!("dish-{}", &id.simple().to_string()[..6]),
                price: dec(price),
                offer_amount: dec(offer),
                in_stock: true,
            })
            .await;
        id
    }

    pub async fn coupon(&self, code: &str, percentage: i32, minimum: &str, max_usage: i32) {
        self.state
            .coupons
            .create(NewCoupon {
                code: code.to_string(),
                percentage,
                minimum_amount: dec(minimum),
                maximum_usage: max_usage,
                expiry: Utc::now() + Duration::days(7),
            })
            .await
            .unwrap();
    }
}
