//! Catalog and cart read models consumed by order placement.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub name: String,
    pub price: BigDecimal,
    /// Per-unit product offer deducted at checkout.
    pub offer_amount: BigDecimal,
    pub in_stock: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub user_id: Uuid,
    pub restaurant_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
}

/// A requested order line before prices are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

impl From<&CartItem> for CartLine {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id,
            quantity: item.quantity,
        }
    }
}
