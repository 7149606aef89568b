//! Payment records and their exactly-once finalization.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Pending,
    Succeeded,
    Failed,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Pending => "pending",
            PaymentState::Succeeded => "succeeded",
            PaymentState::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(PaymentState::Pending),
            "succeeded" => Some(PaymentState::Succeeded),
            "failed" => Some(PaymentState::Failed),
            _ => None,
        }
    }
}

/// A status that has already been authenticated by the gateway contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifiedStatus {
    Succeeded,
    Failed,
}

impl VerifiedStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "succeeded" => Some(VerifiedStatus::Succeeded),
            "failed" => Some(VerifiedStatus::Failed),
            _ => None,
        }
    }
}

impl From<VerifiedStatus> for PaymentState {
    fn from(status: VerifiedStatus) -> Self {
        match status {
            VerifiedStatus::Succeeded => PaymentState::Succeeded,
            VerifiedStatus::Failed => PaymentState::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Online,
    Wallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Online => "online",
            PaymentMethod::Wallet => "wallet",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "online" => Some(PaymentMethod::Online),
            "wallet" => Some(PaymentMethod::Wallet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub order_id: Uuid,
    pub gateway_session_id: String,
    pub method: PaymentMethod,
    pub amount: BigDecimal,
    pub status: PaymentState,
    pub checkout_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl PaymentRecord {
    pub fn pending(
        order_id: Uuid,
        gateway_session_id: String,
        amount: BigDecimal,
        checkout_url: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            gateway_session_id,
            method: PaymentMethod::Online,
            amount,
            status: PaymentState::Pending,
            checkout_url,
            created_at: Utc::now(),
            confirmed_at: None,
        }
    }

    /// A wallet payment settles in the same transaction that creates it.
    pub fn settled_from_wallet(order_id: Uuid, amount: BigDecimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id,
            gateway_session_id: format!("wallet_{}", Uuid::new_v4().simple()),
            method: PaymentMethod::Wallet,
            amount,
            status: PaymentState::Succeeded,
            checkout_url: None,
            created_at: now,
            confirmed_at: Some(now),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == PaymentState::Pending
    }

    /// Moves a pending record to its terminal state. Returns false when the
    /// record was already resolved, leaving it untouched.
    pub fn resolve(&mut self, status: VerifiedStatus, at: DateTime<Utc>) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.status = status.into();
        self.confirmed_at = Some(at);
        true
    }
}

/// Result of a finalize call. `replayed` marks a no-op on an already
/// resolved session.
#[derive(Debug, Clone, Serialize)]
pub struct FinalizeOutcome {
    pub payment: PaymentRecord,
    pub replayed: bool,
}
