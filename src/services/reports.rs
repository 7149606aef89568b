use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::{ItemStatus, PaymentStatus};
use crate::error::{AppError, AppResult};
use crate::ports::Store;

/// Item counts per fulfillment status over a date range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderCountReport {
    pub from: NaiveDate,
    pub till: NaiveDate,
    pub payment_status: Option<PaymentStatus>,
    pub counts: BTreeMap<&'static str, i64>,
    pub total: i64,
}

#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn Store>,
}

impl ReportService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Counts order items by status for orders placed between `from` and
    /// `till`, both whole UTC days inclusive. Every status appears, with zero
    /// where nothing matched.
    pub async fn order_counts(
        &self,
        from: NaiveDate,
        till: NaiveDate,
        payment_status: Option<PaymentStatus>,
    ) -> AppResult<OrderCountReport> {
        if till < from {
            return Err(AppError::Validation(
                "till must not be earlier than from".to_string(),
            ));
        }

        let start = Utc.from_utc_datetime(&from.and_time(NaiveTime::MIN));
        let end = Utc.from_utc_datetime(&till.and_time(NaiveTime::MIN)) + chrono::Duration::days(1)
            - chrono::Duration::microseconds(1);

        let mut tx = self.store.begin().await?;
        let rows = tx.item_status_counts(start, end, payment_status).await?;

        let mut counts: BTreeMap<&'static str, i64> = ItemStatus::ALL
            .into_iter()
            .map(|status| (status.as_str(), 0))
            .collect();
        for (status, count) in rows {
            counts.insert(status.as_str(), count);
        }
        let total = counts.values().sum();

        Ok(OrderCountReport {
            from,
            till,
            payment_status,
            counts,
            total,
        })
    }
}
