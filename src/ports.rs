//! Storage ports.
//!
//! Services never talk to a database directly. They open a unit of work with
//! [`Store::begin`], perform row operations on the returned [`StoreTx`] and
//! call [`StoreTx::commit`]. Dropping a transaction without committing rolls
//! it back, so an early `?` return never leaves partial writes behind.
//!
//! Methods named `lock_*` serialize concurrent transactions on the natural
//! key of the contended resource (order id, payment session, referee, wallet
//! owner). Plain reads do not lock.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    ActorRef, CartItem, Coupon, ItemStatus, Order, OrderItem, PaymentRecord, PaymentStatus,
    Product, ReferralRecord, WalletEntry,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    Duplicate(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage error: {0}")]
    Storage(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> RepositoryResult<Box<dyn StoreTx>>;

    /// Cheap connectivity probe for health checks.
    async fn ping(&self) -> RepositoryResult<()>;
}

#[async_trait]
pub trait StoreTx: Send {
    async fn commit(self: Box<Self>) -> RepositoryResult<()>;

    // --- catalog & cart ---

    async fn get_product(&mut self, id: Uuid) -> RepositoryResult<Option<Product>>;
    /// Inserts the line or replaces its quantity.
    async fn upsert_cart_item(&mut self, item: &CartItem) -> RepositoryResult<()>;
    async fn cart_items(
        &mut self,
        user_id: Uuid,
        restaurant_id: Uuid,
    ) -> RepositoryResult<Vec<CartItem>>;
    async fn clear_cart(&mut self, user_id: Uuid, restaurant_id: Uuid) -> RepositoryResult<()>;

    // --- orders ---

    async fn insert_order(&mut self, order: &Order, items: &[OrderItem]) -> RepositoryResult<()>;
    async fn get_order(&mut self, id: Uuid) -> RepositoryResult<Option<Order>>;
    /// Reads the order and holds its key until the transaction ends. Item
    /// transitions always take this lock first.
    async fn lock_order(&mut self, id: Uuid) -> RepositoryResult<Option<Order>>;
    async fn order_items(&mut self, order_id: Uuid) -> RepositoryResult<Vec<OrderItem>>;
    /// Persists coupon fields, final amount and payment status.
    async fn update_order(&mut self, order: &Order) -> RepositoryResult<()>;
    async fn update_item_status(
        &mut self,
        item_id: Uuid,
        status: ItemStatus,
        at: DateTime<Utc>,
    ) -> RepositoryResult<()>;
    async fn orders_for_user(&mut self, user_id: Uuid) -> RepositoryResult<Vec<Order>>;
    async fn restaurant_items_by_status(
        &mut self,
        restaurant_id: Uuid,
        status: ItemStatus,
    ) -> RepositoryResult<Vec<OrderItem>>;
    /// Item counts grouped by status for orders placed in `[from, till]`.
    async fn item_status_counts(
        &mut self,
        from: DateTime<Utc>,
        till: DateTime<Utc>,
        payment_status: Option<PaymentStatus>,
    ) -> RepositoryResult<Vec<(ItemStatus, i64)>>;

    // --- coupons ---

    async fn insert_coupon(&mut self, coupon: &Coupon) -> RepositoryResult<()>;
    async fn get_coupon(&mut self, code: &str) -> RepositoryResult<Option<Coupon>>;
    async fn update_coupon(&mut self, coupon: &Coupon) -> RepositoryResult<()>;
    async fn list_coupons(&mut self) -> RepositoryResult<Vec<Coupon>>;
    async fn coupon_usage(&mut self, user_id: Uuid, code: &str) -> RepositoryResult<i32>;
    /// Atomically creates or increments the `(user_id, code)` usage row,
    /// refusing when the count has already reached `cap`. Returns the new
    /// count, or `None` when the cap was hit.
    async fn increment_coupon_usage(
        &mut self,
        user_id: Uuid,
        code: &str,
        cap: i32,
    ) -> RepositoryResult<Option<i32>>;

    // --- wallet ---

    async fn lock_wallet(&mut self, actor: ActorRef) -> RepositoryResult<()>;
    async fn wallet_balance(&mut self, actor: ActorRef) -> RepositoryResult<BigDecimal>;
    async fn insert_wallet_entry(&mut self, entry: &WalletEntry) -> RepositoryResult<()>;
    async fn wallet_entries(&mut self, actor: ActorRef) -> RepositoryResult<Vec<WalletEntry>>;

    // --- payments ---

    async fn insert_payment(&mut self, record: &PaymentRecord) -> RepositoryResult<()>;
    async fn pending_payment_for_order(
        &mut self,
        order_id: Uuid,
    ) -> RepositoryResult<Option<PaymentRecord>>;
    async fn lock_payment_by_session(
        &mut self,
        session_id: &str,
    ) -> RepositoryResult<Option<PaymentRecord>>;
    async fn update_payment(&mut self, record: &PaymentRecord) -> RepositoryResult<()>;
    async fn payments_for_order(&mut self, order_id: Uuid)
        -> RepositoryResult<Vec<PaymentRecord>>;

    // --- referrals ---

    async fn insert_referral(&mut self, record: &ReferralRecord) -> RepositoryResult<()>;
    async fn get_referral(&mut self, referee_id: Uuid)
        -> RepositoryResult<Option<ReferralRecord>>;
    async fn lock_referral(&mut self, referee_id: Uuid)
        -> RepositoryResult<Option<ReferralRecord>>;
    async fn update_referral(&mut self, record: &ReferralRecord) -> RepositoryResult<()>;
    async fn referrals_by_referrer(
        &mut self,
        referrer_id: Uuid,
    ) -> RepositoryResult<Vec<ReferralRecord>>;
}
