//! Postgres implementation of the storage ports.
//!
//! Per-key serialization uses `SELECT ... FOR UPDATE` where a row exists and
//! transaction-scoped advisory locks where it may not (wallet owners). Coupon
//! usage is a single upsert that refuses to pass the cap.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{
    ActorKind, ActorRef, CartItem, Coupon, Direction, ItemStatus, Order, OrderItem,
    PaymentMethod, PaymentRecord, PaymentState, PaymentStatus, Product, ReferralRecord,
    WalletEntry, WalletReason,
};
use crate::ports::{RepositoryError, RepositoryResult, Store, StoreTx};

/// Postgres-backed store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> RepositoryResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

const ORDER_COLUMNS: &str = "id, user_id, restaurant_id, ordered_at, total_amount, coupon_code, \
     coupon_discount_amount, product_offer_amount, final_amount, payment_status";
const ITEM_COLUMNS: &str =
    "id, order_id, product_id, quantity, unit_price, unit_offer, status, updated_at";
const PAYMENT_COLUMNS: &str = "id, order_id, gateway_session_id, method, amount, status, \
     checkout_url, created_at, confirmed_at";
const REFERRAL_COLUMNS: &str = "referee_id, referrer_id, created_at, activated_at, qualified_at, \
     reward_claimed_at, reward_amount";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

fn corrupt(column: &str, value: &str) -> RepositoryError {
    RepositoryError::Storage(format!("unexpected {} value '{}'", column, value))
}

#[async_trait]
impl StoreTx for PgTx {
    async fn commit(self: Box<Self>) -> RepositoryResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn get_product(&mut self, id: Uuid) -> RepositoryResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, restaurant_id, name, price, offer_amount, in_stock FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(ProductRow::into_domain))
    }

    async fn upsert_cart_item(&mut self, item: &CartItem) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_items (user_id, restaurant_id, product_id, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity
            "#,
        )
        .bind(item.user_id)
        .bind(item.restaurant_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn cart_items(
        &mut self,
        user_id: Uuid,
        restaurant_id: Uuid,
    ) -> RepositoryResult<Vec<CartItem>> {
        let rows = sqlx::query_as::<_, CartItemRow>(
            r#"
            SELECT user_id, restaurant_id, product_id, quantity FROM cart_items
            WHERE user_id = $1 AND restaurant_id = $2
            ORDER BY product_id
            "#,
        )
        .bind(user_id)
        .bind(restaurant_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(CartItemRow::into_domain).collect())
    }

    async fn clear_cart(&mut self, user_id: Uuid, restaurant_id: Uuid) -> RepositoryResult<()> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND restaurant_id = $2")
            .bind(user_id)
            .bind(restaurant_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order, items: &[OrderItem]) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, restaurant_id, ordered_at, total_amount, coupon_code,
                coupon_discount_amount, product_offer_amount, final_amount, payment_status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(order.restaurant_id)
        .bind(order.ordered_at)
        .bind(&order.total_amount)
        .bind(&order.coupon_code)
        .bind(&order.coupon_discount_amount)
        .bind(&order.product_offer_amount)
        .bind(&order.final_amount)
        .bind(order.payment_status.as_str())
        .execute(&mut *self.tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, quantity, unit_price, unit_offer, status, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(item.id)
            .bind(item.order_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(&item.unit_price)
            .bind(&item.unit_offer)
            .bind(item.status.as_str())
            .bind(item.updated_at)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn get_order(&mut self, id: Uuid) -> RepositoryResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(OrderRow::into_domain).transpose()
    }

    async fn lock_order(&mut self, id: Uuid) -> RepositoryResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1 FOR UPDATE",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(OrderRow::into_domain).transpose()
    }

    async fn order_items(&mut self, order_id: Uuid) -> RepositoryResult<Vec<OrderItem>> {
        let rows = sqlx::query_as::<_, OrderItemRow>(&format!(
            "SELECT {} FROM order_items WHERE order_id = $1 ORDER BY id",
            ITEM_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(OrderItemRow::into_domain).collect()
    }

    async fn update_order(&mut self, order: &Order) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET coupon_code = $2, coupon_discount_amount = $3, final_amount = $4, payment_status = $5
            WHERE id = $1
            "#,
        )
        .bind(order.id)
        .bind(&order.coupon_code)
        .bind(&order.coupon_discount_amount)
        .bind(&order.final_amount)
        .bind(order.payment_status.as_str())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("order {}", order.id)));
        }
        Ok(())
    }

    async fn update_item_status(
        &mut self,
        item_id: Uuid,
        status: ItemStatus,
        at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE order_items SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(item_id)
            .bind(status.as_str())
            .bind(at)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("order item {}", item_id)));
        }
        Ok(())
    }

    async fn orders_for_user(&mut self, user_id: Uuid) -> RepositoryResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE user_id = $1 ORDER BY ordered_at DESC",
            ORDER_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(OrderRow::into_domain).collect()
    }

    async fn restaurant_items_by_status(
        &mut self,
        restaurant_id: Uuid,
        status: ItemStatus,
    ) -> RepositoryResult<Vec<OrderItem>> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT oi.id, oi.order_id, oi.product_id, oi.quantity, oi.unit_price, oi.unit_offer,
                   oi.status, oi.updated_at
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            WHERE o.restaurant_id = $1 AND oi.status = $2
            ORDER BY oi.updated_at DESC
            "#,
        )
        .bind(restaurant_id)
        .bind(status.as_str())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(OrderItemRow::into_domain).collect()
    }

    async fn item_status_counts(
        &mut self,
        from: DateTime<Utc>,
        till: DateTime<Utc>,
        payment_status: Option<PaymentStatus>,
    ) -> RepositoryResult<Vec<(ItemStatus, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT oi.status, COUNT(*) AS count
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            WHERE o.ordered_at BETWEEN $1 AND $2
              AND ($3::TEXT IS NULL OR o.payment_status = $3)
            GROUP BY oi.status
            "#,
        )
        .bind(from)
        .bind(till)
        .bind(payment_status.map(|s| s.as_str()))
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter()
            .map(|(status, count)| {
                ItemStatus::parse(&status)
                    .map(|s| (s, count))
                    .ok_or_else(|| corrupt("order_items.status", &status))
            })
            .collect()
    }

    async fn insert_coupon(&mut self, coupon: &Coupon) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO coupons (code, percentage, minimum_amount, maximum_usage, expiry, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&coupon.code)
        .bind(coupon.percentage)
        .bind(&coupon.minimum_amount)
        .bind(coupon.maximum_usage)
        .bind(coupon.expiry)
        .bind(coupon.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::Duplicate(format!("coupon {}", coupon.code))
            } else {
                RepositoryError::from(e)
            }
        })?;
        Ok(())
    }

    async fn get_coupon(&mut self, code: &str) -> RepositoryResult<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>(
            "SELECT code, percentage, minimum_amount, maximum_usage, expiry, created_at FROM coupons WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(CouponRow::into_domain))
    }

    async fn update_coupon(&mut self, coupon: &Coupon) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE coupons SET percentage = $2, maximum_usage = $3, expiry = $4 WHERE code = $1",
        )
        .bind(&coupon.code)
        .bind(coupon.percentage)
        .bind(coupon.maximum_usage)
        .bind(coupon.expiry)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("coupon {}", coupon.code)));
        }
        Ok(())
    }

    async fn list_coupons(&mut self) -> RepositoryResult<Vec<Coupon>> {
        let rows = sqlx::query_as::<_, CouponRow>(
            "SELECT code, percentage, minimum_amount, maximum_usage, expiry, created_at FROM coupons ORDER BY code",
        )
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(CouponRow::into_domain).collect())
    }

    async fn coupon_usage(&mut self, user_id: Uuid, code: &str) -> RepositoryResult<i32> {
        let count = sqlx::query_scalar::<_, i32>(
            "SELECT usage_count FROM coupon_usages WHERE user_id = $1 AND coupon_code = $2",
        )
        .bind(user_id)
        .bind(code)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(count.unwrap_or(0))
    }

    async fn increment_coupon_usage(
        &mut self,
        user_id: Uuid,
        code: &str,
        cap: i32,
    ) -> RepositoryResult<Option<i32>> {
        // The conflicting row is locked by ON CONFLICT, so the WHERE clause
        // sees the committed count of any concurrent winner.
        let count = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO coupon_usages (user_id, coupon_code, usage_count)
            SELECT $1, $2, 1 WHERE $3 >= 1
            ON CONFLICT (user_id, coupon_code)
            DO UPDATE SET usage_count = coupon_usages.usage_count + 1
            WHERE coupon_usages.usage_count < $3
            RETURNING usage_count
            "#,
        )
        .bind(user_id)
        .bind(code)
        .bind(cap)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn lock_wallet(&mut self, actor: ActorRef) -> RepositoryResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!("wallet:{}", actor))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn wallet_balance(&mut self, actor: ActorRef) -> RepositoryResult<BigDecimal> {
        let balance = sqlx::query_scalar::<_, BigDecimal>(
            r#"
            SELECT COALESCE(SUM(CASE WHEN direction = 'credit' THEN amount ELSE -amount END), 0)
            FROM wallet_entries
            WHERE actor_kind = $1 AND actor_id = $2
            "#,
        )
        .bind(actor.kind.as_str())
        .bind(actor.id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(balance)
    }

    async fn insert_wallet_entry(&mut self, entry: &WalletEntry) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wallet_entries (
                id, actor_kind, actor_id, amount, direction, reason, reference_order_id, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id)
        .bind(entry.actor.kind.as_str())
        .bind(entry.actor.id)
        .bind(&entry.amount)
        .bind(entry.direction.as_str())
        .bind(entry.reason.as_str())
        .bind(entry.reference_order_id)
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn wallet_entries(&mut self, actor: ActorRef) -> RepositoryResult<Vec<WalletEntry>> {
        let rows = sqlx::query_as::<_, WalletEntryRow>(
            r#"
            SELECT id, actor_kind, actor_id, amount, direction, reason, reference_order_id, created_at
            FROM wallet_entries
            WHERE actor_kind = $1 AND actor_id = $2
            ORDER BY created_at, id
            "#,
        )
        .bind(actor.kind.as_str())
        .bind(actor.id)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(WalletEntryRow::into_domain).collect()
    }

    async fn insert_payment(&mut self, record: &PaymentRecord) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, order_id, gateway_session_id, method, amount, status,
                checkout_url, created_at, confirmed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.id)
        .bind(record.order_id)
        .bind(&record.gateway_session_id)
        .bind(record.method.as_str())
        .bind(&record.amount)
        .bind(record.status.as_str())
        .bind(&record.checkout_url)
        .bind(record.created_at)
        .bind(record.confirmed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::Duplicate(format!(
                    "payment session {}",
                    record.gateway_session_id
                ))
            } else {
                RepositoryError::from(e)
            }
        })?;
        Ok(())
    }

    async fn pending_payment_for_order(
        &mut self,
        order_id: Uuid,
    ) -> RepositoryResult<Option<PaymentRecord>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE order_id = $1 AND status = 'pending'",
            PAYMENT_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(PaymentRow::into_domain).transpose()
    }

    async fn lock_payment_by_session(
        &mut self,
        session_id: &str,
    ) -> RepositoryResult<Option<PaymentRecord>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE gateway_session_id = $1 FOR UPDATE",
            PAYMENT_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(PaymentRow::into_domain).transpose()
    }

    async fn update_payment(&mut self, record: &PaymentRecord) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE payments SET status = $2, confirmed_at = $3 WHERE id = $1")
            .bind(record.id)
            .bind(record.status.as_str())
            .bind(record.confirmed_at)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("payment {}", record.id)));
        }
        Ok(())
    }

    async fn payments_for_order(
        &mut self,
        order_id: Uuid,
    ) -> RepositoryResult<Vec<PaymentRecord>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE order_id = $1 ORDER BY created_at",
            PAYMENT_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(PaymentRow::into_domain).collect()
    }

    async fn insert_referral(&mut self, record: &ReferralRecord) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO referrals (
                referee_id, referrer_id, created_at, activated_at, qualified_at,
                reward_claimed_at, reward_amount
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.referee_id)
        .bind(record.referrer_id)
        .bind(record.created_at)
        .bind(record.activated_at)
        .bind(record.qualified_at)
        .bind(record.reward_claimed_at)
        .bind(&record.reward_amount)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::Duplicate(format!("referral for {}", record.referee_id))
            } else {
                RepositoryError::from(e)
            }
        })?;
        Ok(())
    }

    async fn get_referral(&mut self, referee_id: Uuid) -> RepositoryResult<Option<ReferralRecord>> {
        let row = sqlx::query_as::<_, ReferralRow>(&format!(
            "SELECT {} FROM referrals WHERE referee_id = $1",
            REFERRAL_COLUMNS
        ))
        .bind(referee_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(ReferralRow::into_domain))
    }

    async fn lock_referral(
        &mut self,
        referee_id: Uuid,
    ) -> RepositoryResult<Option<ReferralRecord>> {
        let row = sqlx::query_as::<_, ReferralRow>(&format!(
            "SELECT {} FROM referrals WHERE referee_id = $1 FOR UPDATE",
            REFERRAL_COLUMNS
        ))
        .bind(referee_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(ReferralRow::into_domain))
    }

    async fn update_referral(&mut self, record: &ReferralRecord) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE referrals
            SET activated_at = $2, qualified_at = $3, reward_claimed_at = $4, reward_amount = $5
            WHERE referee_id = $1
            "#,
        )
        .bind(record.referee_id)
        .bind(record.activated_at)
        .bind(record.qualified_at)
        .bind(record.reward_claimed_at)
        .bind(&record.reward_amount)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!(
                "referral for {}",
                record.referee_id
            )));
        }
        Ok(())
    }

    async fn referrals_by_referrer(
        &mut self,
        referrer_id: Uuid,
    ) -> RepositoryResult<Vec<ReferralRecord>> {
        let rows = sqlx::query_as::<_, ReferralRow>(&format!(
            "SELECT {} FROM referrals WHERE referrer_id = $1 ORDER BY created_at",
            REFERRAL_COLUMNS
        ))
        .bind(referrer_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(ReferralRow::into_domain).collect())
    }
}

// Internal row types for SQLx. Not exposed outside the adapter.

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    restaurant_id: Uuid,
    name: String,
    price: BigDecimal,
    offer_amount: BigDecimal,
    in_stock: bool,
}

impl ProductRow {
    fn into_domain(self) -> Product {
        Product {
            id: self.id,
            restaurant_id: self.restaurant_id,
            name: self.name,
            price: self.price,
            offer_amount: self.offer_amount,
            in_stock: self.in_stock,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    user_id: Uuid,
    restaurant_id: Uuid,
    product_id: Uuid,
    quantity: i32,
}

impl CartItemRow {
    fn into_domain(self) -> CartItem {
        CartItem {
            user_id: self.user_id,
            restaurant_id: self.restaurant_id,
            product_id: self.product_id,
            quantity: self.quantity,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    restaurant_id: Uuid,
    ordered_at: DateTime<Utc>,
    total_amount: BigDecimal,
    coupon_code: Option<String>,
    coupon_discount_amount: BigDecimal,
    product_offer_amount: BigDecimal,
    final_amount: BigDecimal,
    payment_status: String,
}

impl OrderRow {
    fn into_domain(self) -> RepositoryResult<Order> {
        let payment_status = PaymentStatus::parse(&self.payment_status)
            .ok_or_else(|| corrupt("orders.payment_status", &self.payment_status))?;
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            restaurant_id: self.restaurant_id,
            ordered_at: self.ordered_at,
            total_amount: self.total_amount,
            coupon_code: self.coupon_code,
            coupon_discount_amount: self.coupon_discount_amount,
            product_offer_amount: self.product_offer_amount,
            final_amount: self.final_amount,
            payment_status,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    unit_price: BigDecimal,
    unit_offer: BigDecimal,
    status: String,
    updated_at: DateTime<Utc>,
}

impl OrderItemRow {
    fn into_domain(self) -> RepositoryResult<OrderItem> {
        let status = ItemStatus::parse(&self.status)
            .ok_or_else(|| corrupt("order_items.status", &self.status))?;
        Ok(OrderItem {
            id: self.id,
            order_id: self.order_id,
            product_id: self.product_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
            unit_offer: self.unit_offer,
            status,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    code: String,
    percentage: i32,
    minimum_amount: BigDecimal,
    maximum_usage: i32,
    expiry: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl CouponRow {
    fn into_domain(self) -> Coupon {
        Coupon {
            code: self.code,
            percentage: self.percentage,
            minimum_amount: self.minimum_amount,
            maximum_usage: self.maximum_usage,
            expiry: self.expiry,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WalletEntryRow {
    id: Uuid,
    actor_kind: String,
    actor_id: Uuid,
    amount: BigDecimal,
    direction: String,
    reason: String,
    reference_order_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl WalletEntryRow {
    fn into_domain(self) -> RepositoryResult<WalletEntry> {
        let kind = ActorKind::parse(&self.actor_kind)
            .ok_or_else(|| corrupt("wallet_entries.actor_kind", &self.actor_kind))?;
        let direction = Direction::parse(&self.direction)
            .ok_or_else(|| corrupt("wallet_entries.direction", &self.direction))?;
        let reason = WalletReason::parse(&self.reason)
            .ok_or_else(|| corrupt("wallet_entries.reason", &self.reason))?;
        Ok(WalletEntry {
            id: self.id,
            actor: ActorRef {
                kind,
                id: self.actor_id,
            },
            amount: self.amount,
            direction,
            reason,
            reference_order_id: self.reference_order_id,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    order_id: Uuid,
    gateway_session_id: String,
    method: String,
    amount: BigDecimal,
    status: String,
    checkout_url: Option<String>,
    created_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
}

impl PaymentRow {
    fn into_domain(self) -> RepositoryResult<PaymentRecord> {
        let method = PaymentMethod::parse(&self.method)
            .ok_or_else(|| corrupt("payments.method", &self.method))?;
        let status = PaymentState::parse(&self.status)
            .ok_or_else(|| corrupt("payments.status", &self.status))?;
        Ok(PaymentRecord {
            id: self.id,
            order_id: self.order_id,
            gateway_session_id: self.gateway_session_id,
            method,
            amount: self.amount,
            status,
            checkout_url: self.checkout_url,
            created_at: self.created_at,
            confirmed_at: self.confirmed_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReferralRow {
    referee_id: Uuid,
    referrer_id: Uuid,
    created_at: DateTime<Utc>,
    activated_at: Option<DateTime<Utc>>,
    qualified_at: Option<DateTime<Utc>>,
    reward_claimed_at: Option<DateTime<Utc>>,
    reward_amount: Option<BigDecimal>,
}

impl ReferralRow {
    fn into_domain(self) -> ReferralRecord {
        ReferralRecord {
            referee_id: self.referee_id,
            referrer_id: self.referrer_id,
            created_at: self.created_at,
            activated_at: self.activated_at,
            qualified_at: self.qualified_at,
            reward_claimed_at: self.reward_claimed_at,
            reward_amount: self.reward_amount,
        }
    }
}
