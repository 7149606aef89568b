//! Coupon inventory and per-user usage rules.

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::percentage_of;
use crate::validation::{validate_coupon_code, ValidationError, ValidationResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub percentage: i32,
    pub minimum_amount: BigDecimal,
    pub maximum_usage: i32,
    pub expiry: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponUsage {
    pub user_id: Uuid,
    pub coupon_code: String,
    pub usage_count: i32,
}

/// Why a known coupon cannot be used right now.
#[derive(Debug, Clone, PartialEq)]
pub enum CouponRejection {
    Expired,
    BelowMinimum(BigDecimal),
    UsageLimitReached,
}

impl Coupon {
    /// Checks expiry, minimum cart amount and the caller's usage count, in
    /// that order.
    pub fn check_usable(
        &self,
        usage_count: i32,
        cart_total: &BigDecimal,
        now: DateTime<Utc>,
    ) -> Result<(), CouponRejection> {
        if now > self.expiry {
            return Err(CouponRejection::Expired);
        }
        if cart_total < &self.minimum_amount {
            return Err(CouponRejection::BelowMinimum(self.minimum_amount.clone()));
        }
        if usage_count >= self.maximum_usage {
            return Err(CouponRejection::UsageLimitReached);
        }
        Ok(())
    }

    pub fn discount_for(&self, cart_total: &BigDecimal) -> BigDecimal {
        percentage_of(cart_total, self.percentage)
    }
}

/// Platform limits applied when coupons are created or edited.
#[derive(Debug, Clone)]
pub struct CouponPolicy {
    pub max_percentage: i32,
    pub min_validity: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCoupon {
    pub code: String,
    pub percentage: i32,
    pub minimum_amount: BigDecimal,
    pub maximum_usage: i32,
    pub expiry: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CouponUpdate {
    pub code: String,
    pub percentage: i32,
    pub maximum_usage: i32,
    pub expiry: DateTime<Utc>,
}

impl CouponPolicy {
    pub fn check_new(&self, coupon: &NewCoupon, now: DateTime<Utc>) -> ValidationResult {
        validate_coupon_code(&coupon.code)?;
        if coupon.minimum_amount < BigDecimal::zero() {
            return Err(ValidationError::new("minimum_amount", "must not be negative"));
        }
        self.check_terms(coupon.percentage, coupon.maximum_usage, coupon.expiry, now)
    }

    pub fn check_update(&self, update: &CouponUpdate, now: DateTime<Utc>) -> ValidationResult {
        validate_coupon_code(&update.code)?;
        self.check_terms(update.percentage, update.maximum_usage, update.expiry, now)
    }

    fn check_terms(
        &self,
        percentage: i32,
        maximum_usage: i32,
        expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ValidationResult {
        if percentage < 1 || percentage > self.max_percentage {
            return Err(ValidationError::new(
                "percentage",
                format!("must be between 1 and {}", self.max_percentage),
            ));
        }
        if maximum_usage < 1 {
            return Err(ValidationError::new("maximum_usage", "must be at least 1"));
        }
        if expiry < now + self.min_validity {
            return Err(ValidationError::new(
                "expiry",
                format!(
                    "must be at least {} hours in the future",
                    self.min_validity.num_hours()
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CouponPolicy {
        CouponPolicy {
            max_percentage: 70,
            min_validity: Duration::hours(12),
        }
    }

    fn coupon(minimum: i64, max_usage: i32) -> Coupon {
        Coupon {
            code: "SAVE10".to_string(),
            percentage: 10,
            minimum_amount: BigDecimal::from(minimum),
            maximum_usage: max_usage,
            expiry: Utc::now() + Duration::days(2),
            created_at: Utc::now(),
        }
    }

    fn new_coupon(percentage: i32, expiry: DateTime<Utc>) -> NewCoupon {
        NewCoupon {
            code: "FEAST20".to_string(),
            percentage,
            minimum_amount: BigDecimal::from(100),
            maximum_usage: 2,
            expiry,
        }
    }

    #[test]
    fn discount_is_percentage_of_cart() {
        let c = coupon(400, 1);
        assert_eq!(c.discount_for(&BigDecimal::from(500)), BigDecimal::from(50));
    }

    #[test]
    fn rejects_cart_below_minimum() {
        let c = coupon(400, 1);
        assert_eq!(
            c.check_usable(0, &BigDecimal::from(350), Utc::now()),
            Err(CouponRejection::BelowMinimum(BigDecimal::from(400)))
        );
    }

    #[test]
    fn rejects_expired_before_minimum() {
        let c = coupon(400, 1);
        let later = c.expiry + Duration::seconds(1);
        assert_eq!(
            c.check_usable(0, &BigDecimal::from(10), later),
            Err(CouponRejection::Expired)
        );
    }

    #[test]
    fn rejects_exhausted_usage() {
        let c = coupon(0, 2);
        assert!(c.check_usable(1, &BigDecimal::from(10), Utc::now()).is_ok());
        assert_eq!(
            c.check_usable(2, &BigDecimal::from(10), Utc::now()),
            Err(CouponRejection::UsageLimitReached)
        );
    }

    #[test]
    fn policy_caps_percentage() {
        let now = Utc::now();
        assert!(policy()
            .check_new(&new_coupon(70, now + Duration::days(1)), now)
            .is_ok());
        let err = policy()
            .check_new(&new_coupon(71, now + Duration::days(1)), now)
            .unwrap_err();
        assert_eq!(err.field, "percentage");
    }

    #[test]
    fn policy_requires_grace_window() {
        let now = Utc::now();
        let err = policy()
            .check_new(&new_coupon(10, now + Duration::hours(11)), now)
            .unwrap_err();
        assert_eq!(err.field, "expiry");
        assert!(policy()
            .check_new(&new_coupon(10, now + Duration::hours(12)), now)
            .is_ok());
    }
}
