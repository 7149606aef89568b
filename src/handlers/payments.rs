use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::callback::VerifiedConfirmation;
use super::{ApiJson, ApiResponse};
use crate::domain::{FinalizeOutcome, Initiator, OrderDetails, PaymentMethod, PaymentRecord};
use crate::error::AppResult;
use crate::middleware::auth::{Actor, UserActor};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    pub order_id: Uuid,
    #[serde(default = "default_method")]
    pub method: PaymentMethod,
}

fn default_method() -> PaymentMethod {
    PaymentMethod::Online
}

#[derive(Debug, Serialize)]
pub struct ConfirmationResponse {
    #[serde(flatten)]
    pub outcome: FinalizeOutcome,
    pub order: OrderDetails,
}

pub async fn initiate_payment(
    State(state): State<AppState>,
    UserActor(user_id): UserActor,
    ApiJson(body): ApiJson<InitiatePaymentRequest>,
) -> AppResult<ApiResponse<PaymentRecord>> {
    let record = state
        .payments
        .initiate(user_id, body.order_id, body.method)
        .await?;
    Ok(ApiResponse::ok("payment initiated", record))
}

/// Synchronous confirmation relayed by the buyer's client after checkout.
/// Carries the same signed payload as the gateway callback.
pub async fn confirm_payment(
    State(state): State<AppState>,
    UserActor(user_id): UserActor,
    confirmation: VerifiedConfirmation,
) -> AppResult<ApiResponse<ConfirmationResponse>> {
    let outcome = state
        .payments
        .confirm(user_id, &confirmation.session_id, confirmation.status)
        .await?;
    let order = state
        .orders
        .get_order(Initiator::User(user_id), outcome.payment.order_id)
        .await?;

    let message = if outcome.replayed {
        "payment already finalized"
    } else {
        "payment finalized"
    };
    Ok(ApiResponse::ok(message, ConfirmationResponse { outcome, order }))
}

pub async fn order_payments(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<Uuid>,
) -> AppResult<ApiResponse<Vec<PaymentRecord>>> {
    let payments = state
        .payments
        .payments_for_order(actor.initiator(), order_id)
        .await?;
    Ok(ApiResponse::ok("payments fetched", payments))
}
