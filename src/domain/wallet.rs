//! Wallet ledger entries. Balances are always derived from entries.

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    User,
    Restaurant,
}

impl ActorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorKind::User => "user",
            ActorKind::Restaurant => "restaurant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(ActorKind::User),
            "restaurant" => Some(ActorKind::Restaurant),
            _ => None,
        }
    }
}

/// The owner of a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorRef {
    pub kind: ActorKind,
    pub id: Uuid,
}

impl ActorRef {
    pub fn user(id: Uuid) -> Self {
        Self {
            kind: ActorKind::User,
            id,
        }
    }

    pub fn restaurant(id: Uuid) -> Self {
        Self {
            kind: ActorKind::Restaurant,
            id,
        }
    }
}

impl fmt::Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Credit,
    Debit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Credit => "credit",
            Direction::Debit => "debit",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "credit" => Some(Direction::Credit),
            "debit" => Some(Direction::Debit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletReason {
    Refund,
    CouponOffset,
    ReferralReward,
    OrderSettlement,
    OrderPayment,
}

impl WalletReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletReason::Refund => "refund",
            WalletReason::CouponOffset => "coupon_offset",
            WalletReason::ReferralReward => "referral_reward",
            WalletReason::OrderSettlement => "order_settlement",
            WalletReason::OrderPayment => "order_payment",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "refund" => Some(WalletReason::Refund),
            "coupon_offset" => Some(WalletReason::CouponOffset),
            "referral_reward" => Some(WalletReason::ReferralReward),
            "order_settlement" => Some(WalletReason::OrderSettlement),
            "order_payment" => Some(WalletReason::OrderPayment),
            _ => None,
        }
    }
}

/// One immutable ledger line. `amount` is always positive; the sign lives in
/// `direction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletEntry {
    pub id: Uuid,
    pub actor: ActorRef,
    pub amount: BigDecimal,
    pub direction: Direction,
    pub reason: WalletReason,
    pub reference_order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl WalletEntry {
    pub fn new(
        actor: ActorRef,
        amount: BigDecimal,
        direction: Direction,
        reason: WalletReason,
        reference_order_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor,
            amount,
            direction,
            reason,
            reference_order_id,
            created_at: Utc::now(),
        }
    }

    pub fn signed_amount(&self) -> BigDecimal {
        match self.direction {
            Direction::Credit => self.amount.clone(),
            Direction::Debit => -self.amount.clone(),
        }
    }
}

/// Σ credits − Σ debits.
pub fn balance_of<'a>(entries: impl IntoIterator<Item = &'a WalletEntry>) -> BigDecimal {
    entries
        .into_iter()
        .map(WalletEntry::signed_amount)
        .fold(BigDecimal::zero(), |acc, x| acc + x)
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletStatement {
    pub actor: ActorRef,
    pub balance: BigDecimal,
    pub entries: Vec<WalletEntry>,
}
