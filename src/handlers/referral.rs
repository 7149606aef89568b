use axum::extract::State;
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiJson, ApiQuery, ApiResponse};
use crate::domain::{ReferralRecord, ReferralStats};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::UserActor;
use crate::services::ClaimedReward;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    /// The user whose invitation the caller is redeeming. Omit to activate a
    /// referral registered at sign-up.
    #[serde(default)]
    pub referrer_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ClaimQuery {
    pub referee_id: Uuid,
}

pub async fn activate(
    State(state): State<AppState>,
    UserActor(user_id): UserActor,
    ApiJson(body): ApiJson<ActivateRequest>,
) -> AppResult<ApiResponse<ReferralRecord>> {
    let record = match body.referrer_id {
        Some(referrer_id) => state.referrals.enroll(referrer_id, user_id).await?,
        None => state.referrals.activate(user_id).await?,
    };
    Ok(ApiResponse::ok("referral activated", record))
}

/// Claims the reward for one of the caller's referees.
pub async fn claim(
    State(state): State<AppState>,
    UserActor(user_id): UserActor,
    ApiQuery(query): ApiQuery<ClaimQuery>,
) -> AppResult<ApiResponse<ClaimedReward>> {
    let record = state.referrals.get(query.referee_id).await?;
    if record.referrer_id != user_id {
        return Err(AppError::NotFound(format!(
            "referral for {} not found",
            query.referee_id
        )));
    }

    let claimed = state.referrals.claim_reward(query.referee_id).await?;
    Ok(ApiResponse::ok(
        format!("{} credited to wallet", claimed.entry.amount),
        claimed,
    ))
}

pub async fn stats(
    State(state): State<AppState>,
    UserActor(user_id): UserActor,
) -> AppResult<ApiResponse<ReferralStats>> {
    let stats = state.referrals.stats(user_id).await?;
    Ok(ApiResponse::ok("referral stats fetched", stats))
}
