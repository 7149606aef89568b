use axum::extract::{Path, State};
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiJson, ApiQuery, ApiResponse};
use crate::domain::{CartItem, ItemStatus, OrderDetails, OrderItem};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::{Actor, RestaurantActor, Role, UserActor};
use crate::services::Cancellation;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct RestaurantQuery {
    pub restaurant_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub restaurant_id: Uuid,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ItemRequest {
    pub order_id: Uuid,
    pub item_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct NextStatusRequest {
    pub order_id: Uuid,
    pub item_id: Uuid,
    /// Defaults to the next status on the forward path.
    #[serde(default)]
    pub status: Option<ItemStatus>,
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    UserActor(user_id): UserActor,
    ApiJson(body): ApiJson<AddToCartRequest>,
) -> AppResult<ApiResponse<CartItem>> {
    let item = state
        .orders
        .add_to_cart(user_id, body.product_id, body.quantity)
        .await?;
    Ok(ApiResponse::ok("product added to cart", item))
}

pub async fn cart(
    State(state): State<AppState>,
    UserActor(user_id): UserActor,
    ApiQuery(query): ApiQuery<RestaurantQuery>,
) -> AppResult<ApiResponse<Vec<CartItem>>> {
    let items = state.orders.cart(user_id, query.restaurant_id).await?;
    Ok(ApiResponse::ok("cart fetched", items))
}

pub async fn place_order(
    State(state): State<AppState>,
    UserActor(user_id): UserActor,
    ApiJson(body): ApiJson<PlaceOrderRequest>,
) -> AppResult<ApiResponse<OrderDetails>> {
    let coupon_code = body
        .coupon_code
        .map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty());
    let order = state
        .orders
        .place_order(user_id, body.restaurant_id, coupon_code)
        .await?;
    Ok(ApiResponse::ok("order placed", order))
}

pub async fn get_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<Uuid>,
) -> AppResult<ApiResponse<OrderDetails>> {
    let order = state.orders.get_order(actor.initiator(), order_id).await?;
    Ok(ApiResponse::ok("order fetched", order))
}

pub async fn order_history(
    State(state): State<AppState>,
    UserActor(user_id): UserActor,
) -> AppResult<ApiResponse<Vec<OrderDetails>>> {
    let orders = state.orders.order_history(user_id).await?;
    Ok(ApiResponse::ok("order history fetched", orders))
}

/// Cancels an item on behalf of the buyer, or of the platform when called
/// with the admin role.
pub async fn cancel_item(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(body): ApiJson<ItemRequest>,
) -> AppResult<ApiResponse<Cancellation>> {
    if actor.role == Role::Restaurant {
        return Err(AppError::Unauthorized(
            "restaurants advance items; cancellation is for buyers".to_string(),
        ));
    }
    let cancellation = state
        .orders
        .cancel_item(actor.initiator(), body.order_id, body.item_id)
        .await?;
    Ok(ApiResponse::ok("order item cancelled", cancellation))
}

pub async fn next_status(
    State(state): State<AppState>,
    RestaurantActor(restaurant_id): RestaurantActor,
    ApiJson(body): ApiJson<NextStatusRequest>,
) -> AppResult<ApiResponse<OrderItem>> {
    let item = state
        .orders
        .advance_item(restaurant_id, body.order_id, body.item_id, body.status)
        .await?;
    Ok(ApiResponse::ok(format!("order item is now {}", item.status), item))
}

pub async fn restaurant_history(
    State(state): State<AppState>,
    RestaurantActor(restaurant_id): RestaurantActor,
    Path(status): Path<String>,
) -> AppResult<ApiResponse<Vec<OrderItem>>> {
    let status = ItemStatus::parse(&status)
        .ok_or_else(|| AppError::Validation(format!("unknown order status '{}'", status)))?;
    let items = state.orders.restaurant_items(restaurant_id, status).await?;
    Ok(ApiResponse::ok("orders fetched", items))
}
