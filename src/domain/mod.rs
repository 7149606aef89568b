//! Framework-agnostic entities and rules of the settlement core.

pub mod catalog;
pub mod coupon;
pub mod order;
pub mod payment;
pub mod referral;
pub mod wallet;

pub use catalog::{CartItem, CartLine, Product};
pub use coupon::{Coupon, CouponPolicy, CouponRejection, CouponUpdate, CouponUsage, NewCoupon};
pub use order::{
    compute_totals, Initiator, ItemStatus, Order, OrderDetails, OrderItem, OrderTotals,
    PaymentStatus, PricedLine,
};
pub use payment::{FinalizeOutcome, PaymentMethod, PaymentRecord, PaymentState, VerifiedStatus};
pub use referral::{ReferralRecord, ReferralStats};
pub use wallet::{ActorKind, ActorRef, Direction, WalletEntry, WalletReason, WalletStatement};
