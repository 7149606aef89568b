use axum::extract::{Path, State};
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiJson, ApiQuery, ApiResponse};
use crate::domain::order::OrderTotals;
use crate::domain::{Coupon, CouponUpdate, NewCoupon, Order};
use crate::error::AppResult;
use crate::middleware::auth::UserActor;
use crate::validation::sanitize_string;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub restaurant_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ApplyCouponRequest {
    pub order_id: Uuid,
    pub coupon_code: String,
}

pub async fn create_coupon(
    State(state): State<AppState>,
    ApiJson(mut body): ApiJson<NewCoupon>,
) -> AppResult<ApiResponse<Coupon>> {
    body.code = sanitize_string(&body.code).to_uppercase();
    let coupon = state.coupons.create(body).await?;
    Ok(ApiResponse::ok("coupon created", coupon))
}

pub async fn update_coupon(
    State(state): State<AppState>,
    ApiJson(mut body): ApiJson<CouponUpdate>,
) -> AppResult<ApiResponse<Coupon>> {
    body.code = sanitize_string(&body.code).to_uppercase();
    let coupon = state.coupons.update(body).await?;
    Ok(ApiResponse::ok("coupon updated", coupon))
}

pub async fn list_coupons(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<Coupon>>> {
    let coupons = state.coupons.list().await?;
    Ok(ApiResponse::ok("coupons fetched", coupons))
}

/// Discount preview for the caller's cart at one restaurant.
pub async fn preview_coupon(
    State(state): State<AppState>,
    UserActor(user_id): UserActor,
    Path(code): Path<String>,
    ApiQuery(query): ApiQuery<PreviewQuery>,
) -> AppResult<ApiResponse<OrderTotals>> {
    let code = sanitize_string(&code).to_uppercase();
    let totals = state
        .coupons
        .preview(user_id, query.restaurant_id, &code)
        .await?;
    Ok(ApiResponse::ok("coupon can be applied", totals))
}

pub async fn apply_coupon(
    State(state): State<AppState>,
    UserActor(user_id): UserActor,
    ApiJson(body): ApiJson<ApplyCouponRequest>,
) -> AppResult<ApiResponse<Order>> {
    let code = sanitize_string(&body.coupon_code).to_uppercase();
    let order = state.coupons.apply(user_id, body.order_id, &code).await?;
    Ok(ApiResponse::ok("coupon applied", order))
}
