pub mod coupon_engine;
pub mod order_ledger;
pub mod payment_reconciler;
pub mod referral_settlement;
pub mod reports;
pub mod wallet_ledger;

pub use coupon_engine::CouponEngine;
pub use order_ledger::{Cancellation, OrderLedger};
pub use payment_reconciler::PaymentReconciler;
pub use referral_settlement::{ClaimedReward, ReferralSettlement};
pub use reports::{OrderCountReport, ReportService};
pub use wallet_ledger::WalletLedger;
