use axum::extract::State;

use super::ApiResponse;
use crate::domain::WalletStatement;
use crate::error::AppResult;
use crate::middleware::auth::{RestaurantActor, UserActor};
use crate::AppState;

pub async fn user_wallet(
    State(state): State<AppState>,
    user: UserActor,
) -> AppResult<ApiResponse<WalletStatement>> {
    let statement = state.wallet.statement(user.wallet()).await?;
    Ok(ApiResponse::ok("wallet fetched", statement))
}

pub async fn restaurant_wallet(
    State(state): State<AppState>,
    restaurant: RestaurantActor,
) -> AppResult<ApiResponse<WalletStatement>> {
    let statement = state.wallet.statement(restaurant.wallet()).await?;
    Ok(ApiResponse::ok("wallet fetched", statement))
}
