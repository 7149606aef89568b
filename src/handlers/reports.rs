use axum::extract::State;
use chrono::NaiveDate;
use serde::Deserialize;

use super::{ApiQuery, ApiResponse};
use crate::domain::PaymentStatus;
use crate::error::{AppError, AppResult};
use crate::services::OrderCountReport;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub from: NaiveDate,
    pub till: NaiveDate,
    #[serde(default)]
    pub payment_status: Option<String>,
}

pub async fn order_counts(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> AppResult<ApiResponse<OrderCountReport>> {
    let payment_status = match query.payment_status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(PaymentStatus::parse(raw).ok_or_else(|| {
            AppError::Validation(format!("unknown payment status '{}'", raw))
        })?),
    };

    let report = state
        .reports
        .order_counts(query.from, query.till, payment_status)
        .await?;
    Ok(ApiResponse::ok("order report generated", report))
}
