//! Orders, their lines and the fulfillment state machine.
//!
//! Every item transition locks the parent order first and checks legality
//! against the persisted item status inside that lock. Concurrent cancel and
//! advance requests on the same order therefore serialize, and the loser sees
//! the winner's status.

use bigdecimal::Zero;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::order::{compute_totals, PricedLine};
use crate::domain::{
    ActorRef, CartItem, CartLine, Initiator, ItemStatus, Order, OrderDetails, OrderItem,
    PaymentStatus, WalletEntry, WalletReason,
};
use crate::error::{AppError, AppResult};
use crate::ports::{Store, StoreTx};
use crate::services::coupon_engine::apply_in;
use crate::services::referral_settlement::qualify_in;
use crate::services::wallet_ledger::credit_in;
use crate::validation::validate_quantity;

/// Result of a cancellation: the item in its new state and the refund entry,
/// if one was owed.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Cancellation {
    pub item: OrderItem,
    pub refund: Option<WalletEntry>,
}

#[derive(Clone)]
pub struct OrderLedger {
    store: Arc<dyn Store>,
}

impl OrderLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Adds a product to the caller's cart, replacing any previous quantity.
    pub async fn add_to_cart(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> AppResult<CartItem> {
        validate_quantity(quantity)?;

        let mut tx = self.store.begin().await?;
        let product = tx
            .get_product(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("product {} not found", product_id)))?;
        if !product.in_stock {
            return Err(AppError::Validation(format!(
                "product {} is out of stock",
                product_id
            )));
        }

        let item = CartItem {
            user_id,
            restaurant_id: product.restaurant_id,
            product_id,
            quantity,
        };
        tx.upsert_cart_item(&item).await?;
        tx.commit().await?;
        Ok(item)
    }

    pub async fn cart(&self, user_id: Uuid, restaurant_id: Uuid) -> AppResult<Vec<CartItem>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.cart_items(user_id, restaurant_id).await?)
    }

    /// Creates an order from explicit lines, optionally applying a coupon in
    /// the same transaction.
    pub async fn create_order(
        &self,
        user_id: Uuid,
        restaurant_id: Uuid,
        lines: Vec<CartLine>,
        coupon_code: Option<String>,
    ) -> AppResult<OrderDetails> {
        let mut tx = self.store.begin().await?;
        let details = create_order_in(
            tx.as_mut(),
            user_id,
            restaurant_id,
            &lines,
            coupon_code.as_deref(),
        )
        .await?;
        tx.commit().await?;
        log_created(&details);
        Ok(details)
    }

    /// Checks out the caller's cart for one restaurant and empties it.
    pub async fn place_order(
        &self,
        user_id: Uuid,
        restaurant_id: Uuid,
        coupon_code: Option<String>,
    ) -> AppResult<OrderDetails> {
        let mut tx = self.store.begin().await?;
        let lines: Vec<CartLine> = tx
            .cart_items(user_id, restaurant_id)
            .await?
            .iter()
            .map(CartLine::from)
            .collect();

        let details = create_order_in(
            tx.as_mut(),
            user_id,
            restaurant_id,
            &lines,
            coupon_code.as_deref(),
        )
        .await?;
        tx.clear_cart(user_id, restaurant_id).await?;
        tx.commit().await?;
        log_created(&details);
        Ok(details)
    }

    pub async fn get_order(&self, initiator: Initiator, order_id: Uuid) -> AppResult<OrderDetails> {
        let mut tx = self.store.begin().await?;
        let order = tx
            .get_order(order_id)
            .await?
            .filter(|o| o.visible_to(initiator))
            .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))?;
        let items = tx.order_items(order_id).await?;
        Ok(OrderDetails { order, items })
    }

    pub async fn order_history(&self, user_id: Uuid) -> AppResult<Vec<OrderDetails>> {
        let mut tx = self.store.begin().await?;
        let orders = tx.orders_for_user(user_id).await?;
        let mut history = Vec::with_capacity(orders.len());
        for order in orders {
            let items = tx.order_items(order.id).await?;
            history.push(OrderDetails { order, items });
        }
        Ok(history)
    }

    pub async fn restaurant_items(
        &self,
        restaurant_id: Uuid,
        status: ItemStatus,
    ) -> AppResult<Vec<OrderItem>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.restaurant_items_by_status(restaurant_id, status).await?)
    }

    /// Moves an item along the forward path on behalf of its restaurant.
    ///
    /// With no `target` the item advances one step. Progression requires the
    /// order's payment to have succeeded. Reaching `Delivered` credits the
    /// restaurant with the item's settlement and qualifies the buyer's
    /// referral, all in the same transaction.
    pub async fn advance_item(
        &self,
        restaurant_id: Uuid,
        order_id: Uuid,
        item_id: Uuid,
        target: Option<ItemStatus>,
    ) -> AppResult<OrderItem> {
        if target == Some(ItemStatus::Cancelled) {
            return Err(AppError::Validation(
                "use the cancel operation to cancel an item".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let order = tx
            .lock_order(order_id)
            .await?
            .filter(|o| o.restaurant_id == restaurant_id)
            .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))?;
        if order.payment_status != PaymentStatus::Paid {
            return Err(AppError::Conflict("payment not confirmed".to_string()));
        }

        let (items, mut item) = find_item(tx.as_mut(), order_id, item_id).await?;
        let target = match target.or_else(|| item.status.next()) {
            Some(target) => target,
            None => return Err(AppError::Conflict("status already advanced".to_string())),
        };
        item.status = item
            .status
            .transition(target)
            .map_err(|_| AppError::Conflict("status already advanced".to_string()))?;
        item.updated_at = Utc::now();
        tx.update_item_status(item.id, item.status, item.updated_at)
            .await?;

        if item.status == ItemStatus::Delivered {
            settle_delivery(tx.as_mut(), &order, &items, item.id).await?;
            qualify_in(tx.as_mut(), order.user_id, item.updated_at).await?;
        }

        tx.commit().await?;
        tracing::info!(
            order_id = %order_id,
            item_id = %item_id,
            status = %item.status,
            "order item advanced"
        );
        Ok(item)
    }

    /// Cancels an item that has not yet been prepared. A paid item's share is
    /// refunded to the buyer's wallet in the same transaction; coupon usage
    /// is left as counted. An item cancelled before payment is captured is
    /// refunded when the payment succeeds.
    pub async fn cancel_item(
        &self,
        initiator: Initiator,
        order_id: Uuid,
        item_id: Uuid,
    ) -> AppResult<Cancellation> {
        let mut tx = self.store.begin().await?;
        let order = tx
            .lock_order(order_id)
            .await?
            .filter(|o| o.visible_to(initiator))
            .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))?;

        let (items, mut item) = find_item(tx.as_mut(), order_id, item_id).await?;
        item.status = item
            .status
            .transition(ItemStatus::Cancelled)
            .map_err(|_| AppError::Conflict("order no longer cancellable".to_string()))?;
        item.updated_at = Utc::now();
        tx.update_item_status(item.id, item.status, item.updated_at)
            .await?;

        let mut refund = None;
        if order.payment_status == PaymentStatus::Paid {
            let share = order.paid_share(&items, item.id);
            if !share.is_zero() {
                refund = Some(
                    credit_in(
                        tx.as_mut(),
                        ActorRef::user(order.user_id),
                        share,
                        WalletReason::Refund,
                        Some(order.id),
                    )
                    .await?,
                );
            }
        }

        tx.commit().await?;
        tracing::info!(
            order_id = %order_id,
            item_id = %item_id,
            refunded = refund.is_some(),
            "order item cancelled"
        );
        Ok(Cancellation { item, refund })
    }
}

/// Builds and inserts an order inside the caller's transaction. Prices are
/// read from the catalog at this moment and frozen on the lines.
pub(crate) async fn create_order_in(
    tx: &mut dyn StoreTx,
    user_id: Uuid,
    restaurant_id: Uuid,
    lines: &[CartLine],
    coupon_code: Option<&str>,
) -> AppResult<OrderDetails> {
    if lines.is_empty() {
        return Err(AppError::Validation("cart is empty".to_string()));
    }

    let mut priced = Vec::with_capacity(lines.len());
    for line in lines {
        validate_quantity(line.quantity)?;
        let product = tx
            .get_product(line.product_id)
            .await?
            .filter(|p| p.in_stock && p.restaurant_id == restaurant_id)
            .ok_or_else(|| {
                AppError::Validation(format!("product {} is unavailable", line.product_id))
            })?;
        priced.push(PricedLine {
            product_id: product.id,
            quantity: line.quantity,
            unit_price: product.price,
            unit_offer: product.offer_amount,
        });
    }

    let totals = compute_totals(&priced, None);
    let mut order = Order::new(user_id, restaurant_id, &totals);
    let items: Vec<OrderItem> = priced
        .iter()
        .map(|line| OrderItem::new(order.id, line))
        .collect();

    if let Some(code) = coupon_code {
        apply_in(tx, &mut order, code, Utc::now()).await?;
    }

    tx.insert_order(&order, &items).await?;
    Ok(OrderDetails { order, items })
}

/// Refunds the paid share of every line cancelled while the order was still
/// unpaid. Runs in the transaction that marks the order paid.
pub(crate) async fn refund_cancelled_in(
    tx: &mut dyn StoreTx,
    order: &Order,
) -> AppResult<Vec<WalletEntry>> {
    let items = tx.order_items(order.id).await?;
    let mut refunds = Vec::new();
    for item in items.iter().filter(|i| i.status == ItemStatus::Cancelled) {
        let share = order.paid_share(&items, item.id);
        if share.is_zero() {
            continue;
        }
        refunds.push(
            credit_in(
                tx,
                ActorRef::user(order.user_id),
                share,
                WalletReason::Refund,
                Some(order.id),
            )
            .await?,
        );
        tracing::info!(
            order_id = %order.id,
            item_id = %item.id,
            "refunded line cancelled before payment"
        );
    }
    Ok(refunds)
}

/// Loads every line of the order along with the requested one.
async fn find_item(
    tx: &mut dyn StoreTx,
    order_id: Uuid,
    item_id: Uuid,
) -> AppResult<(Vec<OrderItem>, OrderItem)> {
    let items = tx.order_items(order_id).await?;
    let item = items
        .iter()
        .find(|item| item.id == item_id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("order item {} not found", item_id)))?;
    Ok((items, item))
}

/// Credits the restaurant for a delivered item: the buyer's paid share, plus
/// the platform-funded coupon share as a separate entry.
async fn settle_delivery(
    tx: &mut dyn StoreTx,
    order: &Order,
    items: &[OrderItem],
    item_id: Uuid,
) -> AppResult<()> {
    let restaurant = ActorRef::restaurant(order.restaurant_id);

    let paid = order.paid_share(items, item_id);
    if !paid.is_zero() {
        credit_in(
            tx,
            restaurant,
            paid,
            WalletReason::OrderSettlement,
            Some(order.id),
        )
        .await?;
    }

    let offset = order.coupon_share(items, item_id);
    if !offset.is_zero() {
        credit_in(
            tx,
            restaurant,
            offset,
            WalletReason::CouponOffset,
            Some(order.id),
        )
        .await?;
    }
    Ok(())
}

fn log_created(details: &OrderDetails) {
    tracing::info!(
        order_id = %details.order.id,
        user_id = %details.order.user_id,
        restaurant_id = %details.order.restaurant_id,
        items = details.items.len(),
        final_amount = %details.order.final_amount,
        "order created"
    );
}
