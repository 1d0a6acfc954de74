//! Voucher: a discount definition with a global claim cap, plus the
//! discount application rule.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Welcome voucher parameters, fixed at issuance time.
pub const WELCOME_DISCOUNT_PERCENT: i64 = 15;
pub const WELCOME_MIN_PURCHASE: i64 = 100_000;
pub const WELCOME_MAX_DISCOUNT: i64 = 50_000;
pub const WELCOME_VALIDITY_DAYS: i64 = 30;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Voucher {
    pub id: Uuid,
    pub title: String,
    /// Globally unique, case-insensitively.
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    /// Percent when `discount_type` is percentage, minor units when fixed.
    pub discount_value: i64,
    pub min_purchase: i64,
    /// Cap on a percentage discount; 0 means uncapped.
    pub max_discount_value: i64,
    pub expiry_date: DateTime<Utc>,
    /// Maximum number of distinct users who may ever claim this voucher.
    pub max_use: u32,
    /// Monotonic; never exceeds `max_use`.
    pub claimed_count: u32,
    pub kind: VoucherKind,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VoucherKind {
    NewUser,
    Event,
}

impl Voucher {
    /// Builds the single-recipient welcome voucher issued at registration.
    /// `claimed_count` starts at 1: the voucher is considered claimed by its
    /// one intended recipient from the moment it exists.
    pub fn welcome(recipient_name: &str, code: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            title: format!("Welcome Voucher - {recipient_name}"),
            code,
            description: Some("Welcome aboard! Enjoy 15% off your first purchase.".to_string()),
            discount_type: DiscountType::Percentage,
            discount_value: WELCOME_DISCOUNT_PERCENT,
            min_purchase: WELCOME_MIN_PURCHASE,
            max_discount_value: WELCOME_MAX_DISCOUNT,
            expiry_date: now + Duration::days(WELCOME_VALIDITY_DAYS),
            max_use: 1,
            claimed_count: 1,
            kind: VoucherKind::NewUser,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date < now
    }

    pub fn remaining_claims(&self) -> u32 {
        self.max_use.saturating_sub(self.claimed_count)
    }

    /// Applies the discount rule to `price` (minor units).
    ///
    /// Fails with [`Error::BelowMinimumPurchase`] when the price does not
    /// reach `min_purchase`. Fixed vouchers discount by `discount_value`;
    /// percentage vouchers discount by `price * discount_value / 100`,
    /// capped at `max_discount_value` when that cap is nonzero. The final
    /// price never goes below 0.
    pub fn discounted_price(&self, price: i64) -> Result<i64> {
        if price < self.min_purchase {
            return Err(Error::BelowMinimumPurchase {
                price,
                min_purchase: self.min_purchase,
            });
        }
        let discount = match self.discount_type {
            DiscountType::Fixed => self.discount_value,
            DiscountType::Percentage => {
                let raw = price * self.discount_value / 100;
                if self.max_discount_value > 0 {
                    raw.min(self.max_discount_value)
                } else {
                    raw
                }
            }
        };
        Ok((price - discount).max(0))
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn percentage_voucher() -> Voucher {
        let now = Utc::now();
        Voucher {
            id: Uuid::now_v7(),
            title: "15% off".into(),
            code: "SAVE15".into(),
            description: None,
            discount_type: DiscountType::Percentage,
            discount_value: 15,
            min_purchase: 100_000,
            max_discount_value: 50_000,
            expiry_date: now + Duration::days(7),
            max_use: 100,
            claimed_count: 0,
            kind: VoucherKind::Event,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn percentage_discount_below_cap() {
        let v = percentage_voucher();
        // 15% of 100_000 = 15_000, below the 50_000 cap
        assert_eq!(v.discounted_price(100_000).unwrap(), 85_000);
    }

    #[test]
    fn percentage_discount_hits_cap() {
        let v = percentage_voucher();
        // 15% of 500_000 = 75_000, capped at 50_000
        assert_eq!(v.discounted_price(500_000).unwrap(), 450_000);
    }

    #[test]
    fn price_below_minimum_purchase_fails() {
        let v = percentage_voucher();
        assert!(matches!(
            v.discounted_price(50_000),
            Err(Error::BelowMinimumPurchase { price: 50_000, min_purchase: 100_000 })
        ));
    }

    #[test]
    fn zero_cap_means_uncapped() {
        let mut v = percentage_voucher();
        v.max_discount_value = 0;
        assert_eq!(v.discounted_price(500_000).unwrap(), 425_000);
    }

    #[test]
    fn fixed_discount_floors_at_zero() {
        let mut v = percentage_voucher();
        v.discount_type = DiscountType::Fixed;
        v.discount_value = 150_000;
        v.min_purchase = 0;
        assert_eq!(v.discounted_price(120_000).unwrap(), 0);
    }

    #[test]
    fn welcome_voucher_is_preclaimed() {
        let v = Voucher::welcome("Dina", "WELCOME-DINA-123456".into());
        assert_eq!(v.claimed_count, 1);
        assert_eq!(v.max_use, 1);
        assert_eq!(v.remaining_claims(), 0);
        assert_eq!(v.kind, VoucherKind::NewUser);
        assert!(!v.is_expired(Utc::now()));
    }
}
