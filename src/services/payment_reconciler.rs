//! Payment initiation and exactly-once finalization.
//!
//! A session is opened at the gateway before any row is locked, and finalize
//! only runs once a verified status is in hand, so no transaction here ever
//! waits on the network. Finalize keys on the unique session id and only
//! moves a record out of `pending`; any later delivery for the same session is
//! a successful no-op.

use bigdecimal::Zero;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    ActorRef, FinalizeOutcome, Initiator, Order, PaymentMethod, PaymentRecord, PaymentStatus,
    VerifiedStatus, WalletReason,
};
use crate::error::{AppError, AppResult};
use crate::gateway::PaymentGateway;
use crate::ports::{Store, StoreTx};
use crate::services::order_ledger::refund_cancelled_in;
use crate::services::wallet_ledger::debit_in;

#[derive(Clone)]
pub struct PaymentReconciler {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentReconciler {
    pub fn new(store: Arc<dyn Store>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { store, gateway }
    }

    /// Starts paying for an order. Re-initiating while a session is pending
    /// returns that session instead of opening another one.
    pub async fn initiate(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        method: PaymentMethod,
    ) -> AppResult<PaymentRecord> {
        let order = {
            let mut tx = self.store.begin().await?;
            let order = tx
                .get_order(order_id)
                .await?
                .filter(|o| o.user_id == user_id)
                .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))?;
            if let Some(existing) = check_payable(tx.as_mut(), &order).await? {
                return Ok(existing);
            }
            order
        };

        if method == PaymentMethod::Wallet || order.final_amount.is_zero() {
            return self.settle_without_gateway(order_id).await;
        }

        let session = self
            .gateway
            .initiate_session(order.id, &order.final_amount)
            .await?;

        let mut tx = self.store.begin().await?;
        let mut order = lock_existing_order(tx.as_mut(), order_id).await?;
        if let Some(existing) = check_payable(tx.as_mut(), &order).await? {
            tracing::warn!(
                order_id = %order_id,
                abandoned_session = %session.session_id,
                "payment initiated concurrently, returning the earlier session"
            );
            return Ok(existing);
        }

        let record = PaymentRecord::pending(
            order.id,
            session.session_id,
            order.final_amount.clone(),
            session.checkout_url,
        );
        tx.insert_payment(&record).await?;
        order.payment_status = PaymentStatus::Pending;
        tx.update_order(&order).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            session_id = %record.gateway_session_id,
            amount = %record.amount,
            "payment initiated"
        );
        Ok(record)
    }

    /// Pays from the buyer's wallet, or settles a zero-amount order, in one
    /// transaction. Lines already cancelled are refunded in the same
    /// transaction.
    async fn settle_without_gateway(&self, order_id: Uuid) -> AppResult<PaymentRecord> {
        let mut tx = self.store.begin().await?;
        let mut order = lock_existing_order(tx.as_mut(), order_id).await?;
        if let Some(existing) = check_payable(tx.as_mut(), &order).await? {
            return Ok(existing);
        }

        if !order.final_amount.is_zero() {
            debit_in(
                tx.as_mut(),
                ActorRef::user(order.user_id),
                order.final_amount.clone(),
                WalletReason::OrderPayment,
                Some(order.id),
            )
            .await?;
        }

        let record = PaymentRecord::settled_from_wallet(order.id, order.final_amount.clone());
        tx.insert_payment(&record).await?;
        order.payment_status = PaymentStatus::Paid;
        tx.update_order(&order).await?;
        refund_cancelled_in(tx.as_mut(), &order).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            session_id = %record.gateway_session_id,
            amount = %record.amount,
            "order paid from wallet"
        );
        Ok(record)
    }

    /// Applies a verified gateway status to the session's payment and order.
    pub async fn finalize(
        &self,
        session_id: &str,
        status: VerifiedStatus,
    ) -> AppResult<FinalizeOutcome> {
        self.finalize_for(None, session_id, status).await
    }

    /// Like [`finalize`](Self::finalize), but only for a session on one of
    /// `user_id`'s orders. Used by the buyer-facing confirmation.
    pub async fn confirm(
        &self,
        user_id: Uuid,
        session_id: &str,
        status: VerifiedStatus,
    ) -> AppResult<FinalizeOutcome> {
        self.finalize_for(Some(user_id), session_id, status).await
    }

    async fn finalize_for(
        &self,
        owner: Option<Uuid>,
        session_id: &str,
        status: VerifiedStatus,
    ) -> AppResult<FinalizeOutcome> {
        let mut tx = self.store.begin().await?;
        let mut record = match tx.lock_payment_by_session(session_id).await? {
            Some(record) => record,
            None => {
                tracing::warn!(session_id = %session_id, "finalize for unknown payment session");
                return Err(AppError::NotFound(format!(
                    "payment session {} not found",
                    session_id
                )));
            }
        };

        let mut order = lock_existing_order(tx.as_mut(), record.order_id).await?;
        if owner.is_some_and(|user_id| user_id != order.user_id) {
            return Err(AppError::NotFound(format!(
                "payment session {} not found",
                session_id
            )));
        }

        if !record.resolve(status, Utc::now()) {
            tracing::warn!(
                session_id = %session_id,
                recorded = record.status.as_str(),
                "payment already finalized, ignoring replay"
            );
            return Ok(FinalizeOutcome {
                payment: record,
                replayed: true,
            });
        }

        tx.update_payment(&record).await?;
        if order.payment_status != PaymentStatus::Paid {
            order.payment_status = match status {
                VerifiedStatus::Succeeded => PaymentStatus::Paid,
                VerifiedStatus::Failed => PaymentStatus::Failed,
            };
            tx.update_order(&order).await?;
            if order.payment_status == PaymentStatus::Paid {
                refund_cancelled_in(tx.as_mut(), &order).await?;
            }
        }
        tx.commit().await?;

        tracing::info!(
            session_id = %session_id,
            order_id = %order.id,
            status = record.status.as_str(),
            "payment finalized"
        );
        Ok(FinalizeOutcome {
            payment: record,
            replayed: false,
        })
    }

    pub async fn payments_for_order(
        &self,
        initiator: Initiator,
        order_id: Uuid,
    ) -> AppResult<Vec<PaymentRecord>> {
        let mut tx = self.store.begin().await?;
        tx.get_order(order_id)
            .await?
            .filter(|o| o.visible_to(initiator))
            .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))?;
        Ok(tx.payments_for_order(order_id).await?)
    }
}

async fn lock_existing_order(tx: &mut dyn StoreTx, order_id: Uuid) -> AppResult<Order> {
    tx.lock_order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))
}

/// Rejects paid orders and surfaces an already pending payment.
async fn check_payable(tx: &mut dyn StoreTx, order: &Order) -> AppResult<Option<PaymentRecord>> {
    if order.payment_status == PaymentStatus::Paid {
        return Err(AppError::Conflict("order already paid".to_string()));
    }
    Ok(tx.pending_payment_for_order(order.id).await?)
}
