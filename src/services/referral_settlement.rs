//! Referral activation and the referrer's one-time reward.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{ActorRef, ReferralRecord, ReferralStats, WalletEntry, WalletReason};
use crate::error::{AppError, AppResult};
use crate::ports::{Store, StoreTx};
use crate::services::wallet_ledger::credit_in;

#[derive(Debug, Clone, serde::Serialize)]
pub struct ClaimedReward {
    pub referral: ReferralRecord,
    pub entry: WalletEntry,
}

#[derive(Clone)]
pub struct ReferralSettlement {
    store: Arc<dyn Store>,
    reward_amount: BigDecimal,
}

impl ReferralSettlement {
    pub fn new(store: Arc<dyn Store>, reward_amount: BigDecimal) -> Self {
        Self {
            store,
            reward_amount,
        }
    }

    /// Records that `referee_id` signed up through `referrer_id`. The
    /// relationship starts inactive.
    pub async fn register(&self, referrer_id: Uuid, referee_id: Uuid) -> AppResult<ReferralRecord> {
        let mut tx = self.store.begin().await?;
        let record = register_in(tx.as_mut(), referrer_id, referee_id).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Registers and activates in one step, as a referee redeeming a
    /// referrer's invitation does.
    pub async fn enroll(&self, referrer_id: Uuid, referee_id: Uuid) -> AppResult<ReferralRecord> {
        let mut tx = self.store.begin().await?;
        let record = match tx.lock_referral(referee_id).await? {
            Some(existing) if existing.referrer_id != referrer_id => {
                return Err(AppError::Conflict(
                    "user was already referred by someone else".to_string(),
                ))
            }
            Some(existing) => existing,
            None => register_in(tx.as_mut(), referrer_id, referee_id).await?,
        };
        let record = activate_record(tx.as_mut(), record).await?;
        tx.commit().await?;
        Ok(record)
    }

    pub async fn activate(&self, referee_id: Uuid) -> AppResult<ReferralRecord> {
        let mut tx = self.store.begin().await?;
        let record = tx
            .lock_referral(referee_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("referral for {} not found", referee_id)))?;
        let record = activate_record(tx.as_mut(), record).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Credits the referrer once the referee has completed a first order.
    pub async fn claim_reward(&self, referee_id: Uuid) -> AppResult<ClaimedReward> {
        let mut tx = self.store.begin().await?;
        let mut record = tx
            .lock_referral(referee_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("referral for {} not found", referee_id)))?;

        if record.is_claimed() {
            return Err(AppError::Conflict("reward already claimed".to_string()));
        }
        if !record.is_active() {
            return Err(AppError::Conflict("referral is not active".to_string()));
        }
        if record.qualified_at.is_none() {
            return Err(AppError::Conflict(
                "referee has not completed a first order yet".to_string(),
            ));
        }

        let entry = credit_in(
            tx.as_mut(),
            ActorRef::user(record.referrer_id),
            self.reward_amount.clone(),
            WalletReason::ReferralReward,
            None,
        )
        .await?;

        record.reward_claimed_at = Some(entry.created_at);
        record.reward_amount = Some(entry.amount.clone());
        tx.update_referral(&record).await?;
        tx.commit().await?;

        tracing::info!(
            referee_id = %referee_id,
            referrer_id = %record.referrer_id,
            amount = %entry.amount,
            "referral reward claimed"
        );
        Ok(ClaimedReward {
            referral: record,
            entry,
        })
    }

    pub async fn get(&self, referee_id: Uuid) -> AppResult<ReferralRecord> {
        let mut tx = self.store.begin().await?;
        tx.get_referral(referee_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("referral for {} not found", referee_id)))
    }

    pub async fn stats(&self, referrer_id: Uuid) -> AppResult<ReferralStats> {
        let mut tx = self.store.begin().await?;
        let records = tx.referrals_by_referrer(referrer_id).await?;
        Ok(ReferralStats::from_records(&records))
    }
}

async fn register_in(
    tx: &mut dyn StoreTx,
    referrer_id: Uuid,
    referee_id: Uuid,
) -> AppResult<ReferralRecord> {
    if referrer_id == referee_id {
        return Err(AppError::Validation("users cannot refer themselves".to_string()));
    }
    let record = ReferralRecord::new(referrer_id, referee_id);
    tx.insert_referral(&record).await?;
    tracing::info!(referrer_id = %referrer_id, referee_id = %referee_id, "referral registered");
    Ok(record)
}

async fn activate_record(
    tx: &mut dyn StoreTx,
    mut record: ReferralRecord,
) -> AppResult<ReferralRecord> {
    if record.is_active() {
        return Err(AppError::Conflict("referral already activated".to_string()));
    }
    record.activated_at = Some(Utc::now());
    tx.update_referral(&record).await?;
    tracing::info!(referee_id = %record.referee_id, "referral activated");
    Ok(record)
}

/// Marks the referee's referral as qualified on their first completed order.
/// Users without a referral and already-qualified referrals are left alone.
pub(crate) async fn qualify_in(
    tx: &mut dyn StoreTx,
    referee_id: Uuid,
    at: DateTime<Utc>,
) -> AppResult<()> {
    let Some(mut record) = tx.lock_referral(referee_id).await? else {
        return Ok(());
    };
    if record.qualified_at.is_some() {
        return Ok(());
    }
    record.qualified_at = Some(at);
    tx.update_referral(&record).await?;
    tracing::info!(referee_id = %referee_id, "referral qualified");
    Ok(())
}
