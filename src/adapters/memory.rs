//! In-memory implementation of the storage ports.
//!
//! A transaction takes the single store mutex for its whole lifetime and works
//! on a private copy of the tables, which replaces the shared state only on
//! commit. That makes every transaction serializable and rollback free, at the
//! cost of no parallelism between unrelated keys. Used by tests and the
//! `serve --in-memory` development mode.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::wallet::balance_of;
use crate::domain::{
    ActorRef, CartItem, Coupon, ItemStatus, Order, OrderItem, PaymentRecord, PaymentStatus,
    Product, ReferralRecord, WalletEntry,
};
use crate::ports::{RepositoryError, RepositoryResult, Store, StoreTx};

#[derive(Debug, Clone, Default)]
struct Tables {
    products: HashMap<Uuid, Product>,
    carts: BTreeMap<(Uuid, Uuid), CartItem>,
    orders: HashMap<Uuid, Order>,
    items: Vec<OrderItem>,
    coupons: BTreeMap<String, Coupon>,
    coupon_usage: HashMap<(Uuid, String), i32>,
    wallet: Vec<WalletEntry>,
    payments: Vec<PaymentRecord>,
    referrals: HashMap<Uuid, ReferralRecord>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog writes are owned by another service; this stands in for them.
    pub async fn seed_product(&self, product: Product) {
        self.tables
            .lock()
            .await
            .products
            .insert(product.id, product);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> RepositoryResult<Box<dyn StoreTx>> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn ping(&self) -> RepositoryResult<()> {
        Ok(())
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn commit(self: Box<Self>) -> RepositoryResult<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn get_product(&mut self, id: Uuid) -> RepositoryResult<Option<Product>> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn upsert_cart_item(&mut self, item: &CartItem) -> RepositoryResult<()> {
        self.working
            .carts
            .insert((item.user_id, item.product_id), item.clone());
        Ok(())
    }

    async fn cart_items(
        &mut self,
        user_id: Uuid,
        restaurant_id: Uuid,
    ) -> RepositoryResult<Vec<CartItem>> {
        Ok(self
            .working
            .carts
            .values()
            .filter(|item| item.user_id == user_id && item.restaurant_id == restaurant_id)
            .cloned()
            .collect())
    }

    async fn clear_cart(&mut self, user_id: Uuid, restaurant_id: Uuid) -> RepositoryResult<()> {
        self.working
            .carts
            .retain(|_, item| !(item.user_id == user_id && item.restaurant_id == restaurant_id));
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order, items: &[OrderItem]) -> RepositoryResult<()> {
        if self.working.orders.contains_key(&order.id) {
            return Err(RepositoryError::Duplicate(format!("order {}", order.id)));
        }
        self.working.orders.insert(order.id, order.clone());
        self.working.items.extend(items.iter().cloned());
        Ok(())
    }

    async fn get_order(&mut self, id: Uuid) -> RepositoryResult<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn lock_order(&mut self, id: Uuid) -> RepositoryResult<Option<Order>> {
        // The store mutex is already held for the whole transaction.
        self.get_order(id).await
    }

    async fn order_items(&mut self, order_id: Uuid) -> RepositoryResult<Vec<OrderItem>> {
        Ok(self
            .working
            .items
            .iter()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn update_order(&mut self, order: &Order) -> RepositoryResult<()> {
        match self.working.orders.get_mut(&order.id) {
            Some(existing) => {
                *existing = order.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("order {}", order.id))),
        }
    }

    async fn update_item_status(
        &mut self,
        item_id: Uuid,
        status: ItemStatus,
        at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let item = self
            .working
            .items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("order item {}", item_id)))?;
        item.status = status;
        item.updated_at = at;
        Ok(())
    }

    async fn orders_for_user(&mut self, user_id: Uuid) -> RepositoryResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .working
            .orders
            .values()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.ordered_at.cmp(&a.ordered_at));
        Ok(orders)
    }

    async fn restaurant_items_by_status(
        &mut self,
        restaurant_id: Uuid,
        status: ItemStatus,
    ) -> RepositoryResult<Vec<OrderItem>> {
        let orders = &self.working.orders;
        Ok(self
            .working
            .items
            .iter()
            .filter(|item| item.status == status)
            .filter(|item| {
                orders
                    .get(&item.order_id)
                    .is_some_and(|order| order.restaurant_id == restaurant_id)
            })
            .cloned()
            .collect())
    }

    async fn item_status_counts(
        &mut self,
        from: DateTime<Utc>,
        till: DateTime<Utc>,
        payment_status: Option<PaymentStatus>,
    ) -> RepositoryResult<Vec<(ItemStatus, i64)>> {
        let mut counts: HashMap<ItemStatus, i64> = HashMap::new();
        for item in &self.working.items {
            let Some(order) = self.working.orders.get(&item.order_id) else {
                continue;
            };
            let in_range = order.ordered_at >= from && order.ordered_at <= till;
            let status_matches = payment_status.map_or(true, |s| order.payment_status == s);
            if in_range && status_matches {
                *counts.entry(item.status).or_insert(0) += 1;
            }
        }
        Ok(ItemStatus::ALL
            .into_iter()
            .filter_map(|status| counts.get(&status).map(|count| (status, *count)))
            .collect())
    }

    async fn insert_coupon(&mut self, coupon: &Coupon) -> RepositoryResult<()> {
        if self.working.coupons.contains_key(&coupon.code) {
            return Err(RepositoryError::Duplicate(format!("coupon {}", coupon.code)));
        }
        self.working
            .coupons
            .insert(coupon.code.clone(), coupon.clone());
        Ok(())
    }

    async fn get_coupon(&mut self, code: &str) -> RepositoryResult<Option<Coupon>> {
        Ok(self.working.coupons.get(code).cloned())
    }

    async fn update_coupon(&mut self, coupon: &Coupon) -> RepositoryResult<()> {
        match self.working.coupons.get_mut(&coupon.code) {
            Some(existing) => {
                *existing = coupon.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("coupon {}", coupon.code))),
        }
    }

    async fn list_coupons(&mut self) -> RepositoryResult<Vec<Coupon>> {
        Ok(self.working.coupons.values().cloned().collect())
    }

    async fn coupon_usage(&mut self, user_id: Uuid, code: &str) -> RepositoryResult<i32> {
        Ok(self
            .working
            .coupon_usage
            .get(&(user_id, code.to_string()))
            .copied()
            .unwrap_or(0))
    }

    async fn increment_coupon_usage(
        &mut self,
        user_id: Uuid,
        code: &str,
        cap: i32,
    ) -> RepositoryResult<Option<i32>> {
        let count = self
            .working
            .coupon_usage
            .entry((user_id, code.to_string()))
            .or_insert(0);
        if *count >= cap {
            return Ok(None);
        }
        *count += 1;
        Ok(Some(*count))
    }

    async fn lock_wallet(&mut self, _actor: ActorRef) -> RepositoryResult<()> {
        Ok(())
    }

    async fn wallet_balance(&mut self, actor: ActorRef) -> RepositoryResult<BigDecimal> {
        Ok(balance_of(
            self.working.wallet.iter().filter(|entry| entry.actor == actor),
        ))
    }

    async fn insert_wallet_entry(&mut self, entry: &WalletEntry) -> RepositoryResult<()> {
        self.working.wallet.push(entry.clone());
        Ok(())
    }

    async fn wallet_entries(&mut self, actor: ActorRef) -> RepositoryResult<Vec<WalletEntry>> {
        Ok(self
            .working
            .wallet
            .iter()
            .filter(|entry| entry.actor == actor)
            .cloned()
            .collect())
    }

    async fn insert_payment(&mut self, record: &PaymentRecord) -> RepositoryResult<()> {
        let clashes = self.working.payments.iter().any(|existing| {
            existing.gateway_session_id == record.gateway_session_id
                || (record.is_pending()
                    && existing.is_pending()
                    && existing.order_id == record.order_id)
        });
        if clashes {
            return Err(RepositoryError::Duplicate(format!(
                "payment session {}",
                record.gateway_session_id
            )));
        }
        self.working.payments.push(record.clone());
        Ok(())
    }

    async fn pending_payment_for_order(
        &mut self,
        order_id: Uuid,
    ) -> RepositoryResult<Option<PaymentRecord>> {
        Ok(self
            .working
            .payments
            .iter()
            .find(|record| record.order_id == order_id && record.is_pending())
            .cloned())
    }

    async fn lock_payment_by_session(
        &mut self,
        session_id: &str,
    ) -> RepositoryResult<Option<PaymentRecord>> {
        Ok(self
            .working
            .payments
            .iter()
            .find(|record| record.gateway_session_id == session_id)
            .cloned())
    }

    async fn update_payment(&mut self, record: &PaymentRecord) -> RepositoryResult<()> {
        let existing = self
            .working
            .payments
            .iter_mut()
            .find(|existing| existing.id == record.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("payment {}", record.id)))?;
        *existing = record.clone();
        Ok(())
    }

    async fn payments_for_order(
        &mut self,
        order_id: Uuid,
    ) -> RepositoryResult<Vec<PaymentRecord>> {
        Ok(self
            .working
            .payments
            .iter()
            .filter(|record| record.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn insert_referral(&mut self, record: &ReferralRecord) -> RepositoryResult<()> {
        if self.working.referrals.contains_key(&record.referee_id) {
            return Err(RepositoryError::Duplicate(format!(
                "referral for {}",
                record.referee_id
            )));
        }
        self.working
            .referrals
            .insert(record.referee_id, record.clone());
        Ok(())
    }

    async fn get_referral(&mut self, referee_id: Uuid) -> RepositoryResult<Option<ReferralRecord>> {
        Ok(self.working.referrals.get(&referee_id).cloned())
    }

    async fn lock_referral(
        &mut self,
        referee_id: Uuid,
    ) -> RepositoryResult<Option<ReferralRecord>> {
        self.get_referral(referee_id).await
    }

    async fn update_referral(&mut self, record: &ReferralRecord) -> RepositoryResult<()> {
        match self.working.referrals.get_mut(&record.referee_id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!(
                "referral for {}",
                record.referee_id
            ))),
        }
    }

    async fn referrals_by_referrer(
        &mut self,
        referrer_id: Uuid,
    ) -> RepositoryResult<Vec<ReferralRecord>> {
        Ok(self
            .working
            .referrals
            .values()
            .filter(|record| record.referrer_id == referrer_id)
            .cloned()
            .collect())
    }
}
