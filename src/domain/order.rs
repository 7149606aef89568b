//! Order and order-item entities.
//! Holds the fulfillment state machine and the pure totals computation shared
//! by cart previews and order placement.

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Fulfillment status of a single order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Processing,
    InPreparation,
    Prepared,
    OnTheWay,
    Delivered,
    Cancelled,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 6] = [
        ItemStatus::Processing,
        ItemStatus::InPreparation,
        ItemStatus::Prepared,
        ItemStatus::OnTheWay,
        ItemStatus::Delivered,
        ItemStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Processing => "processing",
            ItemStatus::InPreparation => "in_preparation",
            ItemStatus::Prepared => "prepared",
            ItemStatus::OnTheWay => "on_the_way",
            ItemStatus::Delivered => "delivered",
            ItemStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }

    /// The successor on the forward fulfillment path, if any.
    pub fn next(&self) -> Option<ItemStatus> {
        match self {
            ItemStatus::Processing => Some(ItemStatus::InPreparation),
            ItemStatus::InPreparation => Some(ItemStatus::Prepared),
            ItemStatus::Prepared => Some(ItemStatus::OnTheWay),
            ItemStatus::OnTheWay => Some(ItemStatus::Delivered),
            ItemStatus::Delivered | ItemStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Delivered | ItemStatus::Cancelled)
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(self, ItemStatus::Processing | ItemStatus::InPreparation)
    }

    /// Checks a requested move against this (persisted) status.
    ///
    /// Forward moves may only go to the immediate successor; cancellation is
    /// only reachable from `Processing` and `InPreparation`.
    pub fn transition(&self, target: ItemStatus) -> Result<ItemStatus, TransitionError> {
        let legal = match target {
            ItemStatus::Cancelled => self.is_cancellable(),
            _ => self.next() == Some(target),
        };

        if legal {
            Ok(target)
        } else {
            Err(TransitionError {
                from: *self,
                to: target,
            })
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot move item from {from} to {to}")]
pub struct TransitionError {
    pub from: ItemStatus,
    pub to: ItemStatus,
}

/// Aggregate payment state carried on the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(PaymentStatus::Pending),
            "paid" => Some(PaymentStatus::Paid),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

/// Who is asking for an order operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initiator {
    User(Uuid),
    Restaurant(Uuid),
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub restaurant_id: Uuid,
    pub ordered_at: DateTime<Utc>,
    pub total_amount: BigDecimal,
    pub coupon_code: Option<String>,
    pub coupon_discount_amount: BigDecimal,
    pub product_offer_amount: BigDecimal,
    pub final_amount: BigDecimal,
    pub payment_status: PaymentStatus,
}

impl Order {
    pub fn new(user_id: Uuid, restaurant_id: Uuid, totals: &OrderTotals) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            restaurant_id,
            ordered_at: Utc::now(),
            total_amount: totals.total_amount.clone(),
            coupon_code: None,
            coupon_discount_amount: BigDecimal::zero(),
            product_offer_amount: totals.product_offer_amount.clone(),
            final_amount: totals.final_amount.clone(),
            payment_status: PaymentStatus::Pending,
        }
    }

    pub fn visible_to(&self, initiator: Initiator) -> bool {
        match initiator {
            Initiator::User(id) => self.user_id == id,
            Initiator::Restaurant(id) => self.restaurant_id == id,
            Initiator::System => true,
        }
    }

    /// Writes a coupon discount onto the order and recomputes the final amount.
    pub fn attach_coupon(&mut self, code: &str, discount: BigDecimal) {
        self.final_amount = clamp_non_negative(
            self.total_amount.clone() - discount.clone() - self.product_offer_amount.clone(),
        );
        self.coupon_code = Some(code.to_string());
        self.coupon_discount_amount = discount;
    }

    /// Share of the order's final amount attributable to one line, after the
    /// line's own product offer and its part of the coupon discount. `items`
    /// must be every line of the order, cancelled ones included.
    pub fn paid_share(&self, items: &[OrderItem], item_id: Uuid) -> BigDecimal {
        let Some(item) = items.iter().find(|item| item.id == item_id) else {
            return BigDecimal::zero();
        };
        let share = item.line_total() - item.line_offer() - self.coupon_share(items, item_id);
        clamp_non_negative(share).round(2)
    }

    /// The line's part of the coupon discount.
    pub fn coupon_share(&self, items: &[OrderItem], item_id: Uuid) -> BigDecimal {
        self.coupon_allocation(items)
            .into_iter()
            .find(|(id, _)| *id == item_id)
            .map(|(_, share)| share)
            .unwrap_or_else(BigDecimal::zero)
    }

    /// Splits the coupon discount across lines in proportion to line totals.
    /// Each share is floored to cents and the leftover cents go to the lines
    /// with the largest remainders (ties by item id), so the shares always
    /// sum to the discount.
    pub fn coupon_allocation(&self, items: &[OrderItem]) -> Vec<(Uuid, BigDecimal)> {
        if self.total_amount.is_zero() || self.coupon_discount_amount.is_zero() {
            return items.iter().map(|item| (item.id, BigDecimal::zero())).collect();
        }

        let mut shares: Vec<(Uuid, BigDecimal, BigDecimal)> = items
            .iter()
            .map(|item| {
                let exact = self.coupon_discount_amount.clone() * item.line_total()
                    / self.total_amount.clone();
                let floored = exact.with_scale(2);
                let remainder = exact - floored.clone();
                (item.id, floored, remainder)
            })
            .collect();

        let allocated = shares
            .iter()
            .fold(BigDecimal::zero(), |acc, (_, floored, _)| acc + floored.clone());
        let mut leftover = self.coupon_discount_amount.clone() - allocated;

        let mut order: Vec<usize> = (0..shares.len()).collect();
        order.sort_by(|&a, &b| {
            shares[b]
                .2
                .cmp(&shares[a].2)
                .then_with(|| shares[a].0.cmp(&shares[b].0))
        });
        let cent = BigDecimal::from(1) / BigDecimal::from(100);
        for index in order {
            if leftover < cent {
                break;
            }
            shares[index].1 += cent.clone();
            leftover -= cent.clone();
        }

        shares
            .into_iter()
            .map(|(id, share, _)| (id, share))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub unit_offer: BigDecimal,
    pub status: ItemStatus,
    pub updated_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn new(order_id: Uuid, line: &PricedLine) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price.clone(),
            unit_offer: line.unit_offer.clone(),
            status: ItemStatus::Processing,
            updated_at: Utc::now(),
        }
    }

    pub fn line_total(&self) -> BigDecimal {
        self.unit_price.clone() * BigDecimal::from(self.quantity)
    }

    pub fn line_offer(&self) -> BigDecimal {
        self.unit_offer.clone() * BigDecimal::from(self.quantity)
    }
}

/// An order plus its lines, as returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// A catalog line with its price frozen at the moment it was read.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub unit_offer: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub total_amount: BigDecimal,
    pub coupon_discount: BigDecimal,
    pub product_offer_amount: BigDecimal,
    pub final_amount: BigDecimal,
}

/// Computes order totals from frozen prices, quantities and an optional
/// coupon percentage. Used unchanged by previews and placement.
pub fn compute_totals(lines: &[PricedLine], coupon_percentage: Option<i32>) -> OrderTotals {
    let total_amount = lines
        .iter()
        .map(|line| line.unit_price.clone() * BigDecimal::from(line.quantity))
        .fold(BigDecimal::zero(), |acc, x| acc + x);
    let product_offer_amount = lines
        .iter()
        .map(|line| line.unit_offer.clone() * BigDecimal::from(line.quantity))
        .fold(BigDecimal::zero(), |acc, x| acc + x);
    let coupon_discount = coupon_percentage
        .map(|pct| percentage_of(&total_amount, pct))
        .unwrap_or_else(BigDecimal::zero);
    let final_amount = clamp_non_negative(
        total_amount.clone() - coupon_discount.clone() - product_offer_amount.clone(),
    );

    OrderTotals {
        total_amount,
        coupon_discount,
        product_offer_amount,
        final_amount,
    }
}

/// `amount * percentage / 100`, rounded to cents.
pub fn percentage_of(amount: &BigDecimal, percentage: i32) -> BigDecimal {
    (amount.clone() * BigDecimal::from(percentage) / BigDecimal::from(100)).round(2)
}

fn clamp_non_negative(value: BigDecimal) -> BigDecimal {
    if value < BigDecimal::zero() {
        BigDecimal::zero()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, offer: i64, quantity: i32) -> PricedLine {
        PricedLine {
            product_id: Uuid::new_v4(),
            quantity,
            unit_price: BigDecimal::from(price),
            unit_offer: BigDecimal::from(offer),
        }
    }

    #[test]
    fn forward_path_moves_one_step_at_a_time() {
        let mut status = ItemStatus::Processing;
        while let Some(next) = status.next() {
            status = status.transition(next).unwrap();
        }
        assert_eq!(status, ItemStatus::Delivered);
    }

    #[test]
    fn forward_path_cannot_skip_states() {
        assert!(ItemStatus::Processing
            .transition(ItemStatus::Prepared)
            .is_err());
        assert!(ItemStatus::InPreparation
            .transition(ItemStatus::Delivered)
            .is_err());
        assert!(ItemStatus::Prepared
            .transition(ItemStatus::InPreparation)
            .is_err());
    }

    #[test]
    fn cancellation_only_before_prepared() {
        assert!(ItemStatus::Processing
            .transition(ItemStatus::Cancelled)
            .is_ok());
        assert!(ItemStatus::InPreparation
            .transition(ItemStatus::Cancelled)
            .is_ok());
        for status in [
            ItemStatus::Prepared,
            ItemStatus::OnTheWay,
            ItemStatus::Delivered,
            ItemStatus::Cancelled,
        ] {
            assert!(status.transition(ItemStatus::Cancelled).is_err());
        }
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for target in ItemStatus::ALL {
            assert!(ItemStatus::Delivered.transition(target).is_err());
            assert!(ItemStatus::Cancelled.transition(target).is_err());
        }
    }

    #[test]
    fn status_strings_round_trip() {
        for status in ItemStatus::ALL {
            assert_eq!(ItemStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ItemStatus::parse("shipped"), None);
    }

    #[test]
    fn totals_with_coupon_and_offer() {
        // 500 cart, 10% coupon, 20 of product offers
        let lines = vec![line(200, 10, 2), line(100, 0, 1)];
        let totals = compute_totals(&lines, Some(10));

        assert_eq!(totals.total_amount, BigDecimal::from(500));
        assert_eq!(totals.coupon_discount, BigDecimal::from(50));
        assert_eq!(totals.product_offer_amount, BigDecimal::from(20));
        assert_eq!(totals.final_amount, BigDecimal::from(430));
    }

    #[test]
    fn totals_without_coupon() {
        let totals = compute_totals(&[line(120, 20, 3)], None);
        assert_eq!(totals.total_amount, BigDecimal::from(360));
        assert_eq!(totals.coupon_discount, BigDecimal::zero());
        assert_eq!(totals.final_amount, BigDecimal::from(300));
    }

    #[test]
    fn paid_share_prorates_coupon() {
        let lines = vec![line(300, 0, 1), line(100, 10, 1)];
        let totals = compute_totals(&lines, None);
        let mut order = Order::new(Uuid::new_v4(), Uuid::new_v4(), &totals);
        order.attach_coupon("SAVE10", percentage_of(&order.total_amount, 10));

        let first = OrderItem::new(order.id, &lines[0]);
        let second = OrderItem::new(order.id, &lines[1]);

        let items = vec![first.clone(), second.clone()];

        // discount 40 split 30 / 10
        assert_eq!(order.paid_share(&items, first.id), BigDecimal::from(270));
        assert_eq!(order.paid_share(&items, second.id), BigDecimal::from(80));
        assert_eq!(order.final_amount, BigDecimal::from(350));
    }

    #[test]
    fn line_shares_sum_to_what_was_paid() {
        let price: BigDecimal = "10.05".parse().unwrap();
        let lines: Vec<PricedLine> = (0..3)
            .map(|_| PricedLine {
                product_id: Uuid::new_v4(),
                quantity: 1,
                unit_price: price.clone(),
                unit_offer: BigDecimal::zero(),
            })
            .collect();
        let totals = compute_totals(&lines, None);
        let mut order = Order::new(Uuid::new_v4(), Uuid::new_v4(), &totals);
        order.attach_coupon("SAVE10", percentage_of(&order.total_amount, 10));
        let items: Vec<OrderItem> = lines
            .iter()
            .map(|line| OrderItem::new(order.id, line))
            .collect();

        let coupon_total = order
            .coupon_allocation(&items)
            .into_iter()
            .fold(BigDecimal::zero(), |acc, (_, share)| acc + share);
        assert_eq!(coupon_total, order.coupon_discount_amount);

        let paid_total = items
            .iter()
            .map(|item| order.paid_share(&items, item.id))
            .fold(BigDecimal::zero(), |acc, share| acc + share);
        assert_eq!(paid_total, order.final_amount);
    }

    #[test]
    fn unknown_line_has_no_share() {
        let lines = vec![line(100, 0, 1)];
        let totals = compute_totals(&lines, None);
        let order = Order::new(Uuid::new_v4(), Uuid::new_v4(), &totals);
        let items = vec![OrderItem::new(order.id, &lines[0])];

        assert_eq!(order.paid_share(&items, Uuid::new_v4()), BigDecimal::zero());
    }

    #[test]
    fn order_visibility_by_initiator() {
        let totals = compute_totals(&[line(10, 0, 1)], None);
        let order = Order::new(Uuid::new_v4(), Uuid::new_v4(), &totals);

        assert!(order.visible_to(Initiator::User(order.user_id)));
        assert!(order.visible_to(Initiator::Restaurant(order.restaurant_id)));
        assert!(order.visible_to(Initiator::System));
        assert!(!order.visible_to(Initiator::User(Uuid::new_v4())));
    }
}
