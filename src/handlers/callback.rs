//! Signed payment confirmations from the gateway.

use axum::{
    async_trait,
    extract::{FromRequest, Request, State},
};
use serde::{Deserialize, Serialize};

use super::ApiResponse;
use crate::domain::{FinalizeOutcome, VerifiedStatus};
use crate::error::AppError;
use crate::gateway::signature::{verify, SIGNATURE_HEADER};
use crate::AppState;

const MAX_CALLBACK_BODY: usize = 64 * 1024;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConfirmationPayload {
    pub session_id: String,
    pub status: String,
}

/// A confirmation whose body carried a valid gateway signature. Only
/// verified statuses ever reach the reconciler.
#[derive(Debug)]
pub struct VerifiedConfirmation {
    pub session_id: String,
    pub status: VerifiedStatus,
}

#[async_trait]
impl FromRequest<AppState> for VerifiedConfirmation {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let signature = req
            .headers()
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                tracing::warn!("payment confirmation without signature");
                AppError::Unauthorized("missing gateway signature".to_string())
            })?;

        let body = axum::body::to_bytes(req.into_body(), MAX_CALLBACK_BODY)
            .await
            .map_err(|_| AppError::Validation("failed to read request body".to_string()))?;

        verify(&state.webhook_secret, &body, &signature).map_err(|e| {
            tracing::warn!(error = %e, "payment confirmation failed verification");
            AppError::Unauthorized("signature verification failed".to_string())
        })?;

        let payload: ConfirmationPayload = serde_json::from_slice(&body)
            .map_err(|e| AppError::Validation(format!("invalid confirmation payload: {}", e)))?;
        let status = VerifiedStatus::parse(payload.status.trim()).ok_or_else(|| {
            AppError::Validation(format!("unknown payment status '{}'", payload.status))
        })?;

        Ok(VerifiedConfirmation {
            session_id: payload.session_id,
            status,
        })
    }
}

/// Asynchronous gateway callback. Always acknowledges a verified payload,
/// including replays and sessions this service does not know, so the gateway
/// stops redelivering.
pub async fn payment_callback(
    State(state): State<AppState>,
    confirmation: VerifiedConfirmation,
) -> Result<ApiResponse<Option<FinalizeOutcome>>, AppError> {
    match state
        .payments
        .finalize(&confirmation.session_id, confirmation.status)
        .await
    {
        Ok(outcome) if outcome.replayed => Ok(ApiResponse::ok(
            "payment already finalized",
            Some(outcome),
        )),
        Ok(outcome) => Ok(ApiResponse::ok("payment finalized", Some(outcome))),
        Err(AppError::NotFound(_)) => Ok(ApiResponse::ok("unknown payment session ignored", None)),
        Err(e) => Err(e),
    }
}
