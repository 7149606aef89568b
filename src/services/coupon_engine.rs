//! Coupon administration, validation and exactly-once application.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::order::{compute_totals, OrderTotals, PricedLine};
use crate::domain::{
    Coupon, CouponPolicy, CouponRejection, CouponUpdate, NewCoupon, Order, PaymentStatus,
};
use crate::error::{AppError, AppResult};
use crate::ports::{Store, StoreTx};

#[derive(Clone)]
pub struct CouponEngine {
    store: Arc<dyn Store>,
    policy: CouponPolicy,
}

impl CouponEngine {
    pub fn new(store: Arc<dyn Store>, policy: CouponPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn create(&self, request: NewCoupon) -> AppResult<Coupon> {
        let now = Utc::now();
        self.policy.check_new(&request, now)?;

        let coupon = Coupon {
            code: request.code,
            percentage: request.percentage,
            minimum_amount: request.minimum_amount.round(2),
            maximum_usage: request.maximum_usage,
            expiry: request.expiry,
            created_at: now,
        };

        let mut tx = self.store.begin().await?;
        tx.insert_coupon(&coupon).await?;
        tx.commit().await?;

        tracing::info!(
            coupon_code = %coupon.code,
            percentage = coupon.percentage,
            maximum_usage = coupon.maximum_usage,
            "coupon created"
        );
        Ok(coupon)
    }

    /// Edits percentage, expiry and usage cap. The code itself never changes.
    pub async fn update(&self, request: CouponUpdate) -> AppResult<Coupon> {
        self.policy.check_update(&request, Utc::now())?;

        let mut tx = self.store.begin().await?;
        let mut coupon = tx
            .get_coupon(&request.code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("coupon {} not found", request.code)))?;

        coupon.percentage = request.percentage;
        coupon.maximum_usage = request.maximum_usage;
        coupon.expiry = request.expiry;
        tx.update_coupon(&coupon).await?;
        tx.commit().await?;

        tracing::info!(coupon_code = %coupon.code, "coupon updated");
        Ok(coupon)
    }

    pub async fn list(&self) -> AppResult<Vec<Coupon>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.list_coupons().await?)
    }

    /// Returns the discount `code` would give `user_id` on `cart_total`.
    pub async fn validate(
        &self,
        code: &str,
        user_id: Uuid,
        cart_total: &BigDecimal,
    ) -> AppResult<BigDecimal> {
        let mut tx = self.store.begin().await?;
        let coupon = check_coupon(tx.as_mut(), code, user_id, cart_total, Utc::now()).await?;
        Ok(coupon.discount_for(cart_total))
    }

    /// Totals for the caller's cart at one restaurant with `code` applied,
    /// computed exactly as placement would compute them.
    pub async fn preview(
        &self,
        user_id: Uuid,
        restaurant_id: Uuid,
        code: &str,
    ) -> AppResult<OrderTotals> {
        let mut tx = self.store.begin().await?;
        let cart = tx.cart_items(user_id, restaurant_id).await?;
        if cart.is_empty() {
            return Err(AppError::Validation("cart is empty".to_string()));
        }

        let mut lines = Vec::with_capacity(cart.len());
        for item in &cart {
            let product = tx
                .get_product(item.product_id)
                .await?
                .filter(|p| p.in_stock && p.restaurant_id == restaurant_id)
                .ok_or_else(|| {
                    AppError::Validation(format!("product {} is unavailable", item.product_id))
                })?;
            lines.push(PricedLine {
                product_id: product.id,
                quantity: item.quantity,
                unit_price: product.price,
                unit_offer: product.offer_amount,
            });
        }

        let subtotal = compute_totals(&lines, None);
        let coupon =
            check_coupon(tx.as_mut(), code, user_id, &subtotal.total_amount, Utc::now()).await?;
        Ok(compute_totals(&lines, Some(coupon.percentage)))
    }

    /// Applies `code` to an existing unpaid order owned by `user_id`.
    pub async fn apply(&self, user_id: Uuid, order_id: Uuid, code: &str) -> AppResult<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = tx
            .lock_order(order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))?;

        apply_in(tx.as_mut(), &mut order, code, Utc::now()).await?;
        tx.update_order(&order).await?;
        tx.commit().await?;
        Ok(order)
    }
}

async fn check_coupon(
    tx: &mut dyn StoreTx,
    code: &str,
    user_id: Uuid,
    cart_total: &BigDecimal,
    now: DateTime<Utc>,
) -> AppResult<Coupon> {
    let coupon = tx
        .get_coupon(code)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("coupon {} not found", code)))?;
    let usage = tx.coupon_usage(user_id, code).await?;
    coupon
        .check_usable(usage, cart_total, now)
        .map_err(|rejection| rejection_error(&coupon, rejection))?;
    Ok(coupon)
}

fn rejection_error(coupon: &Coupon, rejection: CouponRejection) -> AppError {
    match rejection {
        CouponRejection::Expired => AppError::Conflict(format!("coupon {} has expired", coupon.code)),
        CouponRejection::BelowMinimum(minimum) => AppError::Validation(format!(
            "cart total must be at least {} to use coupon {}",
            minimum, coupon.code
        )),
        CouponRejection::UsageLimitReached => AppError::Conflict(format!(
            "usage limit reached for coupon {}",
            coupon.code
        )),
    }
}

/// Writes the coupon discount onto `order` and counts the usage, inside the
/// caller's transaction. The caller persists the order.
///
/// The usage increment is a capped upsert, so two concurrent applications
/// for the same user and code cannot both get past the limit even when the
/// earlier usage read raced.
pub(crate) async fn apply_in(
    tx: &mut dyn StoreTx,
    order: &mut Order,
    code: &str,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if order.coupon_code.is_some() {
        return Err(AppError::Conflict("coupon already applied".to_string()));
    }
    if order.payment_status == PaymentStatus::Paid {
        return Err(AppError::Conflict(
            "coupon cannot be applied to a paid order".to_string(),
        ));
    }

    if tx.pending_payment_for_order(order.id).await?.is_some() {
        return Err(AppError::Conflict(
            "payment already initiated for this order".to_string(),
        ));
    }

    let coupon = check_coupon(tx, code, order.user_id, &order.total_amount, now).await?;
    let usage = tx
        .increment_coupon_usage(order.user_id, &coupon.code, coupon.maximum_usage)
        .await?
        .ok_or_else(|| rejection_error(&coupon, CouponRejection::UsageLimitReached))?;

    let discount = coupon.discount_for(&order.total_amount);
    order.attach_coupon(&coupon.code, discount);

    tracing::info!(
        order_id = %order.id,
        user_id = %order.user_id,
        coupon_code = %coupon.code,
        discount = %order.coupon_discount_amount,
        usage_count = usage,
        "coupon applied"
    );
    Ok(())
}
