//! Referral relationships and their one-time reward.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralRecord {
    pub referee_id: Uuid,
    pub referrer_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    /// Set when the referee completes their first order.
    pub qualified_at: Option<DateTime<Utc>>,
    pub reward_claimed_at: Option<DateTime<Utc>>,
    pub reward_amount: Option<BigDecimal>,
}

impl ReferralRecord {
    pub fn new(referrer_id: Uuid, referee_id: Uuid) -> Self {
        Self {
            referee_id,
            referrer_id,
            created_at: Utc::now(),
            activated_at: None,
            qualified_at: None,
            reward_claimed_at: None,
            reward_amount: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.activated_at.is_some()
    }

    pub fn is_claimed(&self) -> bool {
        self.reward_claimed_at.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReferralStats {
    pub referees: usize,
    pub activated: usize,
    pub qualified: usize,
    pub claimed: usize,
    pub rewards_earned: BigDecimal,
}

impl ReferralStats {
    pub fn from_records(records: &[ReferralRecord]) -> Self {
        Self {
            referees: records.len(),
            activated: records.iter().filter(|r| r.is_active()).count(),
            qualified: records.iter().filter(|r| r.qualified_at.is_some()).count(),
            claimed: records.iter().filter(|r| r.is_claimed()).count(),
            rewards_earned: records
                .iter()
                .filter_map(|r| r.reward_amount.clone())
                .fold(BigDecimal::from(0), |acc, x| acc + x),
        }
    }
}
