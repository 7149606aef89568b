//! Append-only wallet ledger.
//!
//! Every append takes the owner's wallet lock, re-reads the balance inside the
//! same transaction and only then inserts, so the no-negative-balance check
//! can never race with another append for the same actor.

use bigdecimal::BigDecimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{ActorRef, Direction, WalletEntry, WalletReason, WalletStatement};
use crate::error::{AppError, AppResult};
use crate::ports::{Store, StoreTx};
use crate::validation::validate_positive_amount;

#[derive(Clone)]
pub struct WalletLedger {
    store: Arc<dyn Store>,
}

impl WalletLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn credit(
        &self,
        actor: ActorRef,
        amount: BigDecimal,
        reason: WalletReason,
        reference_order_id: Option<Uuid>,
    ) -> AppResult<WalletEntry> {
        let mut tx = self.store.begin().await?;
        let entry = credit_in(tx.as_mut(), actor, amount, reason, reference_order_id).await?;
        tx.commit().await?;
        Ok(entry)
    }

    pub async fn debit(
        &self,
        actor: ActorRef,
        amount: BigDecimal,
        reason: WalletReason,
        reference_order_id: Option<Uuid>,
    ) -> AppResult<WalletEntry> {
        let mut tx = self.store.begin().await?;
        let entry = debit_in(tx.as_mut(), actor, amount, reason, reference_order_id).await?;
        tx.commit().await?;
        Ok(entry)
    }

    pub async fn balance_of(&self, actor: ActorRef) -> AppResult<BigDecimal> {
        let mut tx = self.store.begin().await?;
        let balance = tx.wallet_balance(actor).await?;
        Ok(balance)
    }

    /// Entries plus the balance derived from exactly those entries.
    pub async fn statement(&self, actor: ActorRef) -> AppResult<WalletStatement> {
        let mut tx = self.store.begin().await?;
        let entries = tx.wallet_entries(actor).await?;
        let balance = crate::domain::wallet::balance_of(&entries);
        Ok(WalletStatement {
            actor,
            balance,
            entries,
        })
    }
}

/// Appends a credit inside a caller-owned transaction.
pub(crate) async fn credit_in(
    tx: &mut dyn StoreTx,
    actor: ActorRef,
    amount: BigDecimal,
    reason: WalletReason,
    reference_order_id: Option<Uuid>,
) -> AppResult<WalletEntry> {
    append(tx, actor, amount, Direction::Credit, reason, reference_order_id).await
}

/// Appends a debit inside a caller-owned transaction. Fails with a conflict
/// when the debit would take the balance below zero.
pub(crate) async fn debit_in(
    tx: &mut dyn StoreTx,
    actor: ActorRef,
    amount: BigDecimal,
    reason: WalletReason,
    reference_order_id: Option<Uuid>,
) -> AppResult<WalletEntry> {
    append(tx, actor, amount, Direction::Debit, reason, reference_order_id).await
}

async fn append(
    tx: &mut dyn StoreTx,
    actor: ActorRef,
    amount: BigDecimal,
    direction: Direction,
    reason: WalletReason,
    reference_order_id: Option<Uuid>,
) -> AppResult<WalletEntry> {
    let amount = amount.round(2);
    validate_positive_amount(&amount)?;

    tx.lock_wallet(actor).await?;
    if direction == Direction::Debit {
        let balance = tx.wallet_balance(actor).await?;
        if balance < amount {
            tracing::warn!(
                actor = %actor,
                balance = %balance,
                amount = %amount,
                "wallet debit rejected"
            );
            return Err(AppError::Conflict("insufficient wallet balance".to_string()));
        }
    }

    let entry = WalletEntry::new(actor, amount, direction, reason, reference_order_id);
    tx.insert_wallet_entry(&entry).await?;

    tracing::info!(
        actor = %actor,
        entry_id = %entry.id,
        amount = %entry.amount,
        direction = direction.as_str(),
        reason = reason.as_str(),
        "wallet entry appended"
    );
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;

    fn ledger() -> WalletLedger {
        WalletLedger::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn credit_then_debit_nets_out() {
        let ledger = ledger();
        let actor = ActorRef::user(Uuid::new_v4());

        ledger
            .credit(actor, BigDecimal::from(100), WalletReason::Refund, None)
            .await
            .unwrap();
        ledger
            .debit(actor, BigDecimal::from(30), WalletReason::OrderPayment, None)
            .await
            .unwrap();

        assert_eq!(ledger.balance_of(actor).await.unwrap(), BigDecimal::from(70));
        let statement = ledger.statement(actor).await.unwrap();
        assert_eq!(statement.entries.len(), 2);
        assert_eq!(statement.balance, BigDecimal::from(70));
    }

    #[tokio::test]
    async fn overdraft_is_a_conflict_and_appends_nothing() {
        let ledger = ledger();
        let actor = ActorRef::restaurant(Uuid::new_v4());

        let err = ledger
            .debit(actor, BigDecimal::from(1), WalletReason::OrderPayment, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert!(ledger.statement(actor).await.unwrap().entries.is_empty());
    }

    #[tokio::test]
    async fn non_positive_amounts_are_rejected() {
        let ledger = ledger();
        let actor = ActorRef::user(Uuid::new_v4());

        let err = ledger
            .credit(actor, BigDecimal::from(0), WalletReason::Refund, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn sub_cent_amounts_are_rejected() {
        let ledger = ledger();
        let actor = ActorRef::user(Uuid::new_v4());
        let dust: BigDecimal = "0.001".parse().unwrap();

        let err = ledger
            .credit(actor, dust, WalletReason::Refund, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(ledger.statement(actor).await.unwrap().entries.is_empty());
    }
}
