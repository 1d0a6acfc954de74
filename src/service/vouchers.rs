//! Voucher issuance, claiming, and content management.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{DiscountType, User, Voucher, VoucherKind};
use crate::error::{Error, Result};
use crate::service::codes;
use crate::store::{ClaimOutcome, Store, VoucherQuery};

#[derive(Clone)]
pub struct VoucherService {
    store: Arc<dyn Store>,
}

/// Input for admin voucher creation.
#[derive(Clone, Debug, Deserialize)]
pub struct NewVoucher {
    pub title: String,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    #[serde(default)]
    pub min_purchase: i64,
    #[serde(default)]
    pub max_discount_value: i64,
    pub expiry_date: DateTime<Utc>,
    pub max_use: Option<u32>,
    pub kind: Option<VoucherKind>,
}

/// Partial update for admin voucher edits; absent fields keep their value.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct VoucherUpdate {
    pub title: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<i64>,
    pub min_purchase: Option<i64>,
    pub max_discount_value: Option<i64>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub max_use: Option<u32>,
    pub kind: Option<VoucherKind>,
    pub is_active: Option<bool>,
}

/// A user's claim record joined with the current voucher details.
#[derive(Clone, Debug, Serialize)]
pub struct ClaimedVoucher {
    #[serde(flatten)]
    pub voucher: Voucher,
    pub is_used: bool,
    pub claimed_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct DiscountQuote {
    pub discount: i64,
    pub final_price: i64,
}

fn validate_discount(discount_type: DiscountType, value: i64) -> Result<()> {
    if value <= 0 {
        return Err(Error::invalid("discount value must be greater than 0"));
    }
    if discount_type == DiscountType::Percentage && value > 100 {
        return Err(Error::invalid("percentage discount cannot exceed 100"));
    }
    Ok(())
}

fn validate_expiry(expiry: DateTime<Utc>) -> Result<()> {
    if expiry < Utc::now() {
        return Err(Error::invalid("expiry date must be in the future"));
    }
    Ok(())
}

impl VoucherService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Creates the single-use welcome voucher for a freshly registered user.
    /// The voucher is born pre-claimed (`claimed_count = 1`); the caller
    /// records the claim on the user document.
    pub async fn issue_welcome(&self, user: &User) -> Result<Voucher> {
        let code = codes::generate_unique_code(self.store.as_ref(), &user.name).await?;
        let voucher = Voucher::welcome(&user.name, code);
        self.store.insert_voucher(voucher.clone()).await?;
        tracing::info!(voucher_id = %voucher.id, user_id = %user.id, "welcome voucher issued");
        Ok(voucher)
    }

    pub async fn create(&self, input: NewVoucher) -> Result<Voucher> {
        if input.title.trim().is_empty() || input.code.trim().is_empty() {
            return Err(Error::invalid("title and code are required"));
        }
        validate_discount(input.discount_type, input.discount_value)?;
        validate_expiry(input.expiry_date)?;
        if input.min_purchase < 0 || input.max_discount_value < 0 {
            return Err(Error::invalid("purchase and discount bounds cannot be negative"));
        }
        let max_use = input.max_use.unwrap_or(1);
        if max_use == 0 {
            return Err(Error::invalid("max use must be at least 1"));
        }
        if self.store.voucher_by_code(&input.code).await?.is_some() {
            return Err(Error::conflict("code", &input.code));
        }

        let now = Utc::now();
        let voucher = Voucher {
            id: Uuid::now_v7(),
            title: input.title,
            code: input.code,
            description: input.description,
            discount_type: input.discount_type,
            discount_value: input.discount_value,
            min_purchase: input.min_purchase,
            max_discount_value: input.max_discount_value,
            expiry_date: input.expiry_date,
            max_use,
            claimed_count: 0,
            kind: input.kind.unwrap_or(VoucherKind::Event),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_voucher(voucher.clone()).await?;
        Ok(voucher)
    }

    pub async fn edit(&self, id: Uuid, update: VoucherUpdate) -> Result<Voucher> {
        let mut voucher = self.store.voucher(id).await?.ok_or(Error::NotFound("voucher"))?;

        // A patch obeys the same bounds as creation
        if let Some(title) = &update.title {
            if title.trim().is_empty() {
                return Err(Error::invalid("title cannot be empty"));
            }
        }
        if update.min_purchase.unwrap_or(0) < 0 || update.max_discount_value.unwrap_or(0) < 0 {
            return Err(Error::invalid("purchase and discount bounds cannot be negative"));
        }
        if let Some(code) = &update.code {
            if code.trim().is_empty() {
                return Err(Error::invalid("code cannot be empty"));
            }
            if !code.eq_ignore_ascii_case(&voucher.code) {
                if let Some(other) = self.store.voucher_by_code(code).await? {
                    if other.id != id {
                        return Err(Error::conflict("code", code));
                    }
                }
            }
        }
        let discount_type = update.discount_type.unwrap_or(voucher.discount_type);
        if let Some(value) = update.discount_value {
            validate_discount(discount_type, value)?;
        } else if update.discount_type.is_some() {
            validate_discount(discount_type, voucher.discount_value)?;
        }
        if let Some(expiry) = update.expiry_date {
            validate_expiry(expiry)?;
        }
        if let Some(max_use) = update.max_use {
            if max_use == 0 {
                return Err(Error::invalid("max use must be at least 1"));
            }
            if max_use < voucher.claimed_count {
                return Err(Error::invalid(format!(
                    "max use cannot drop below the {} claims already made",
                    voucher.claimed_count
                )));
            }
        }

        if let Some(title) = update.title {
            voucher.title = title;
        }
        if let Some(code) = update.code {
            voucher.code = code;
        }
        if let Some(description) = update.description {
            voucher.description = Some(description);
        }
        voucher.discount_type = discount_type;
        if let Some(value) = update.discount_value {
            voucher.discount_value = value;
        }
        if let Some(min) = update.min_purchase {
            voucher.min_purchase = min;
        }
        if let Some(max) = update.max_discount_value {
            voucher.max_discount_value = max;
        }
        if let Some(expiry) = update.expiry_date {
            voucher.expiry_date = expiry;
        }
        if let Some(max_use) = update.max_use {
            voucher.max_use = max_use;
        }
        if let Some(kind) = update.kind {
            voucher.kind = kind;
        }
        if let Some(active) = update.is_active {
            voucher.is_active = active;
        }
        voucher.touch();
        self.store.put_voucher(voucher.clone()).await?;
        Ok(voucher)
    }

    pub async fn toggle_active(&self, id: Uuid) -> Result<Voucher> {
        let mut voucher = self.store.voucher(id).await?.ok_or(Error::NotFound("voucher"))?;
        voucher.is_active = !voucher.is_active;
        voucher.touch();
        self.store.put_voucher(voucher.clone()).await?;
        Ok(voucher)
    }

    /// Deletes the voucher and sweeps its claim record from every user.
    /// Returns the number of users the sweep touched.
    pub async fn delete(&self, id: Uuid) -> Result<u64> {
        if !self.store.delete_voucher(id).await? {
            return Err(Error::NotFound("voucher"));
        }
        let touched = self.store.pull_claim_from_all(id).await?;
        tracing::info!(voucher_id = %id, users_touched = touched, "voucher deleted, claims swept");
        Ok(touched)
    }

    pub async fn get(&self, id: Uuid) -> Result<Voucher> {
        self.store.voucher(id).await?.ok_or(Error::NotFound("voucher"))
    }

    pub async fn list(&self, query: &VoucherQuery, limit: u32, offset: u64) -> Result<(Vec<Voucher>, u64)> {
        self.store.list_vouchers(query, limit, offset).await
    }

    /// Claims `voucher_id` for `user_id`.
    ///
    /// The claim record is pushed onto the user first (atomic, rejecting
    /// duplicates), then the global counter is raised through one atomic
    /// conditional increment. Losing the increment race compensates by
    /// pulling the record back off the user, so exactly one claimer wins the
    /// last slot and `claimed_count` never exceeds `max_use`.
    pub async fn claim(&self, user_id: Uuid, voucher_id: Uuid) -> Result<Voucher> {
        let voucher = self
            .store
            .voucher(voucher_id)
            .await?
            .ok_or(Error::NotFound("voucher"))?;
        if !voucher.is_active {
            return Err(Error::Inactive("voucher"));
        }
        if voucher.claimed_count >= voucher.max_use {
            return Err(Error::LimitReached);
        }

        self.store.push_claim(user_id, voucher_id).await?;

        match self.store.try_claim(voucher_id).await {
            Ok(ClaimOutcome::Claimed(v)) => {
                tracing::info!(voucher_id = %voucher_id, user_id = %user_id, "voucher claimed");
                Ok(v)
            }
            Ok(ClaimOutcome::LimitReached) => {
                self.store.pull_claim(user_id, voucher_id).await?;
                Err(Error::LimitReached)
            }
            Ok(ClaimOutcome::Inactive) => {
                self.store.pull_claim(user_id, voucher_id).await?;
                Err(Error::Inactive("voucher"))
            }
            Ok(ClaimOutcome::NotFound) => {
                self.store.pull_claim(user_id, voucher_id).await?;
                Err(Error::NotFound("voucher"))
            }
            Err(e) => {
                // The user record now holds a claim the counter does not
                // know about; undo it before surfacing the failure.
                if let Err(undo) = self.store.pull_claim(user_id, voucher_id).await {
                    tracing::error!(voucher_id = %voucher_id, user_id = %user_id, error = %undo, "claim rollback failed, manual reconciliation needed");
                }
                Err(e)
            }
        }
    }

    /// Every claim record the user holds, joined with current voucher
    /// details. No filtering by active or expiry status; the caller decides
    /// usability. Records whose voucher has since vanished are skipped.
    pub async fn claimed_vouchers(&self, user_id: Uuid) -> Result<Vec<ClaimedVoucher>> {
        let user = self.store.user(user_id).await?.ok_or(Error::NotFound("user"))?;
        let mut out = Vec::with_capacity(user.vouchers.len());
        for claim in &user.vouchers {
            if let Some(voucher) = self.store.voucher(claim.voucher_id).await? {
                out.push(ClaimedVoucher {
                    voucher,
                    is_used: claim.is_used,
                    claimed_at: claim.claimed_at,
                });
            }
        }
        Ok(out)
    }

    /// Prices `price` under the voucher with this code, rejecting vouchers
    /// that are inactive or past expiry.
    pub async fn quote(&self, code: &str, price: i64) -> Result<DiscountQuote> {
        let voucher = self
            .store
            .voucher_by_code(code)
            .await?
            .ok_or(Error::NotFound("voucher"))?;
        if !voucher.is_active {
            return Err(Error::Inactive("voucher"));
        }
        if voucher.is_expired(Utc::now()) {
            return Err(Error::invalid("voucher has expired"));
        }
        let final_price = voucher.discounted_price(price)?;
        Ok(DiscountQuote {
            discount: price - final_price,
            final_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn service() -> (VoucherService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (VoucherService::new(store.clone()), store)
    }

    fn new_voucher(code: &str, max_use: u32) -> NewVoucher {
        NewVoucher {
            title: "Flash Sale".into(),
            code: code.into(),
            description: None,
            discount_type: DiscountType::Percentage,
            discount_value: 15,
            min_purchase: 100_000,
            max_discount_value: 50_000,
            expiry_date: Utc::now() + Duration::days(7),
            max_use: Some(max_use),
            kind: None,
        }
    }

    async fn register_user(store: &MemoryStore, email: &str, phone: &str) -> Uuid {
        let user = User::new("Tester", email, phone);
        let id = user.id;
        store.insert_user(user).await.unwrap();
        id
    }

    #[tokio::test]
    async fn create_rejects_bad_inputs() {
        let (svc, _) = service();

        let mut v = new_voucher("BAD", 1);
        v.discount_value = 120;
        assert!(matches!(svc.create(v).await, Err(Error::Invalid(_))));

        let mut v = new_voucher("BAD", 1);
        v.expiry_date = Utc::now() - Duration::days(1);
        assert!(matches!(svc.create(v).await, Err(Error::Invalid(_))));

        let mut v = new_voucher("BAD", 1);
        v.discount_value = 0;
        assert!(matches!(svc.create(v).await, Err(Error::Invalid(_))));
    }

    #[tokio::test]
    async fn create_rejects_duplicate_code_case_insensitively() {
        let (svc, _) = service();
        svc.create(new_voucher("SAVE10", 5)).await.unwrap();
        let err = svc.create(new_voucher("save10", 5)).await.unwrap_err();
        assert!(matches!(err, Error::Conflict { field: "code", .. }));
    }

    #[tokio::test]
    async fn edit_revalidates_code_and_bounds() {
        let (svc, _) = service();
        let a = svc.create(new_voucher("FIRST", 5)).await.unwrap();
        let b = svc.create(new_voucher("SECOND", 5)).await.unwrap();

        let err = svc
            .edit(b.id, VoucherUpdate { code: Some("first".into()), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { field: "code", .. }));

        // Re-casing your own code is not a conflict
        let edited = svc
            .edit(a.id, VoucherUpdate { code: Some("First".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(edited.code, "First");

        let err = svc
            .edit(a.id, VoucherUpdate { discount_value: Some(150), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }

    #[tokio::test]
    async fn edit_rejects_blank_fields_and_negative_bounds() {
        let (svc, _) = service();
        let v = svc.create(new_voucher("STRICT", 5)).await.unwrap();

        let err = svc
            .edit(v.id, VoucherUpdate { code: Some("   ".into()), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));

        let err = svc
            .edit(v.id, VoucherUpdate { title: Some("".into()), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));

        let err = svc
            .edit(v.id, VoucherUpdate { min_purchase: Some(-1), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));

        let err = svc
            .edit(v.id, VoucherUpdate { max_discount_value: Some(-500), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));

        // Nothing above was persisted
        let stored = svc.get(v.id).await.unwrap();
        assert_eq!(stored.code, "STRICT");
        assert_eq!(stored.min_purchase, 100_000);
    }

    #[tokio::test]
    async fn edit_cannot_drop_max_use_below_claimed_count() {
        let (svc, store) = service();
        let v = svc.create(new_voucher("CAPPED", 3)).await.unwrap();
        let user = register_user(&store, "a@example.com", "0811").await;
        svc.claim(user, v.id).await.unwrap();

        let err = svc
            .edit(v.id, VoucherUpdate { max_use: Some(0), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }

    #[tokio::test]
    async fn claim_walks_the_failure_ladder() {
        let (svc, store) = service();
        let user = register_user(&store, "a@example.com", "0811").await;

        let missing = Uuid::now_v7();
        assert!(matches!(svc.claim(user, missing).await, Err(Error::NotFound("voucher"))));

        let v = svc.create(new_voucher("LADDER", 2)).await.unwrap();
        let off = svc.toggle_active(v.id).await.unwrap();
        assert!(!off.is_active);
        assert!(matches!(svc.claim(user, v.id).await, Err(Error::Inactive(_))));

        svc.toggle_active(v.id).await.unwrap();
        svc.claim(user, v.id).await.unwrap();
        assert!(matches!(svc.claim(user, v.id).await, Err(Error::AlreadyClaimed)));
    }

    #[tokio::test]
    async fn claim_limit_is_enforced() {
        let (svc, store) = service();
        let v = svc.create(new_voucher("ONEUSE", 1)).await.unwrap();
        let first = register_user(&store, "a@example.com", "0811").await;
        let second = register_user(&store, "b@example.com", "0812").await;

        svc.claim(first, v.id).await.unwrap();
        assert!(matches!(svc.claim(second, v.id).await, Err(Error::LimitReached)));

        // The loser keeps no claim record
        let user = store.user(second).await.unwrap().unwrap();
        assert!(user.vouchers.is_empty());
    }

    #[tokio::test]
    async fn concurrent_claims_never_overshoot_the_cap() {
        let (svc, store) = service();
        let v = svc.create(new_voucher("RACE", 1)).await.unwrap();
        let a = register_user(&store, "a@example.com", "0811").await;
        let b = register_user(&store, "b@example.com", "0812").await;

        let (ra, rb) = tokio::join!(svc.claim(a, v.id), svc.claim(b, v.id));
        let successes = [&ra, &rb].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);

        let stored = store.voucher(v.id).await.unwrap().unwrap();
        assert_eq!(stored.claimed_count, 1);
    }

    #[tokio::test]
    async fn delete_sweeps_claims_from_all_users() {
        let (svc, store) = service();
        let v = svc.create(new_voucher("SWEEP", 10)).await.unwrap();
        let a = register_user(&store, "a@example.com", "0811").await;
        let b = register_user(&store, "b@example.com", "0812").await;
        svc.claim(a, v.id).await.unwrap();
        svc.claim(b, v.id).await.unwrap();

        assert_eq!(svc.delete(v.id).await.unwrap(), 2);
        assert!(store.user(a).await.unwrap().unwrap().vouchers.is_empty());
        assert!(svc.claimed_vouchers(b).await.unwrap().is_empty());
        assert!(matches!(svc.delete(v.id).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn claimed_vouchers_join_current_details() {
        let (svc, store) = service();
        let v = svc.create(new_voucher("MINE", 5)).await.unwrap();
        let user = register_user(&store, "a@example.com", "0811").await;
        svc.claim(user, v.id).await.unwrap();

        let claimed = svc.claimed_vouchers(user).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].voucher.code, "MINE");
        assert!(!claimed[0].is_used);
    }

    #[tokio::test]
    async fn listing_filters_and_paginates() {
        let (svc, _) = service();
        for i in 0..3 {
            let mut v = new_voucher(&format!("EVENT{i}"), 5);
            v.title = format!("Payday Deal {i}");
            svc.create(v).await.unwrap();
        }
        let mut fixed = new_voucher("FIXED1", 5);
        fixed.discount_type = DiscountType::Fixed;
        fixed.discount_value = 20_000;
        fixed.title = "Clearance".into();
        svc.create(fixed).await.unwrap();

        let query = VoucherQuery { title: Some("payday".into()), ..Default::default() };
        let (page, total) = svc.list(&query, 2, 0).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);

        let query = VoucherQuery { discount_type: Some(DiscountType::Fixed), ..Default::default() };
        let (page, total) = svc.list(&query, 10, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].title, "Clearance");
    }

    #[tokio::test]
    async fn quote_applies_the_discount_rule() {
        let (svc, _) = service();
        svc.create(new_voucher("QUOTE", 5)).await.unwrap();

        let q = svc.quote("quote", 100_000).await.unwrap();
        assert_eq!(q.discount, 15_000);
        assert_eq!(q.final_price, 85_000);

        assert!(matches!(
            svc.quote("QUOTE", 50_000).await,
            Err(Error::BelowMinimumPurchase { .. })
        ));
        assert!(matches!(svc.quote("NOPE", 100_000).await, Err(Error::NotFound(_))));
    }
}
